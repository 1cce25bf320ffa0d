//! The template catalog: a closed, static mapping from template id to image
//! reference and resource/port profile.
//!
//! `resolve` is a pure lookup with no side effects and no network access.
//! There is no dynamic template registration; the set of templates is fixed at
//! compile time. Each entry also carries its build-context path directly, so
//! nothing downstream has to infer template identity from image-name text.

use crate::domain::error::WorkspaceError;

/// Container port inside the workspace that serves the browser IDE.
pub const IDE_PORT: u16 = 8080;

/// Working directory inside every workspace container; the persistent volume
/// is bound here.
pub const WORKSPACE_DIR: &str = "/workspace";

const BASE_ENV: &[&str] = &["SHELL=/bin/bash", "DEBIAN_FRONTEND=noninteractive"];

/// Every template runs code-server against the workspace directory; auth and
/// telemetry stay off because access control lives at the boundary layer.
const IDE_CMD: &[&str] = &[
    "code-server",
    "--bind-addr",
    "0.0.0.0:8080",
    "--auth",
    "none",
    "--disable-telemetry",
    WORKSPACE_DIR,
];

const MIB: i64 = 1024 * 1024;
const NANO_CPU: i64 = 1_000_000_000;

/// An auxiliary application port a multi-service template exposes besides the
/// IDE port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePort {
    /// Stable name the boundary layer surfaces, e.g. `"frontend"`.
    pub name: &'static str,
    /// Container-side port number.
    pub port: u16,
}

/// Immutable description of one workspace template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateProfile {
    pub id: &'static str,
    /// Image reference the template resolves to, e.g. `podbay-python:latest`.
    pub image: &'static str,
    /// Extra service ports beyond [`IDE_PORT`]; empty for single-service
    /// templates.
    pub service_ports: &'static [ServicePort],
    /// Host memory limit in bytes.
    pub memory_bytes: i64,
    /// CPU share in units of 1e-9 CPUs.
    pub nano_cpus: i64,
    /// Environment for the container's main process.
    pub env: &'static [&'static str],
    /// Entry command.
    pub entry_cmd: &'static [&'static str],
    /// Directory holding the template's `Dockerfile` and build files,
    /// relative to the process working directory.
    pub build_context: &'static str,
}

impl TemplateProfile {
    /// All container ports the template exposes, IDE port first.
    #[must_use]
    pub fn exposed_ports(&self) -> Vec<u16> {
        let mut ports = Vec::with_capacity(1 + self.service_ports.len());
        ports.push(IDE_PORT);
        ports.extend(self.service_ports.iter().map(|s| s.port));
        ports
    }
}

const TEMPLATES: &[TemplateProfile] = &[
    TemplateProfile {
        id: "python",
        image: "podbay-python:latest",
        service_ports: &[],
        memory_bytes: 512 * MIB,
        nano_cpus: NANO_CPU,
        env: BASE_ENV,
        entry_cmd: IDE_CMD,
        build_context: "docker/python",
    },
    TemplateProfile {
        id: "nodejs",
        image: "podbay-nodejs:latest",
        service_ports: &[],
        memory_bytes: 512 * MIB,
        nano_cpus: NANO_CPU,
        env: BASE_ENV,
        entry_cmd: IDE_CMD,
        build_context: "docker/nodejs",
    },
    TemplateProfile {
        id: "mern",
        image: "podbay-mern:latest",
        service_ports: &[
            ServicePort {
                name: "frontend",
                port: 3000,
            },
            ServicePort {
                name: "backend",
                port: 5000,
            },
        ],
        memory_bytes: 1024 * MIB,
        nano_cpus: 2 * NANO_CPU,
        env: BASE_ENV,
        entry_cmd: IDE_CMD,
        build_context: "docker/mern",
    },
];

/// The closed set of supported templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateCatalog {
    entries: &'static [TemplateProfile],
}

impl TemplateCatalog {
    /// Catalog of the built-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        Self { entries: TEMPLATES }
    }

    /// Resolve a template id to its profile.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::UnknownTemplate`] when the id is absent from
    /// the catalog.
    pub fn resolve(&self, template_id: &str) -> Result<&'static TemplateProfile, WorkspaceError> {
        self.entries
            .iter()
            .find(|t| t.id == template_id)
            .ok_or_else(|| WorkspaceError::UnknownTemplate {
                requested: template_id.to_string(),
                available: self.ids().join(", "),
            })
    }

    /// Supported template ids, in catalog order.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.entries.iter().map(|t| t.id).collect()
    }

    /// Name of a known auxiliary service port, across all templates.
    ///
    /// Resume has no template id to hand, so it recovers service names from
    /// the live port bindings via this reverse lookup.
    #[must_use]
    pub fn service_port_name(&self, port: u16) -> Option<&'static str> {
        self.entries
            .iter()
            .flat_map(|t| t.service_ports.iter())
            .find(|s| s.port == port)
            .map(|s| s.name)
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
