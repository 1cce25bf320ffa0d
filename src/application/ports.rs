//! Port trait definitions for the Application layer.
//!
//! Ports are the contracts the container-engine infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`.
//! All methods speak in resolved names (container, volume, image reference);
//! translating workspace ids into names is the services' job.

use std::collections::HashMap;
use std::path::Path;

use crate::domain::WorkspaceError;
use crate::domain::workspace::ExecOutput;

// ── Value Types ───────────────────────────────────────────────────────────────

/// Everything the engine needs to create one workspace container.
///
/// Each exposed port is mapped to an engine-chosen ephemeral host port; the
/// named volume is bound at `working_dir` so content survives stop/resume.
pub struct ContainerSpec<'a> {
    pub image: &'a str,
    pub volume: &'a str,
    pub working_dir: &'a str,
    pub exposed_ports: &'a [u16],
    pub memory_bytes: i64,
    pub nano_cpus: i64,
    pub env: &'a [&'a str],
    pub cmd: &'a [&'a str],
}

// ── Engine Port Traits ────────────────────────────────────────────────────────

/// Local image lookup and on-demand builds.
#[allow(async_fn_in_trait)]
pub trait ImageStore {
    /// Whether `reference` is among the locally known image tags.
    async fn image_exists(&self, reference: &str) -> Result<bool, WorkspaceError>;

    /// Build and tag `reference` from the build context at `context_dir`,
    /// blocking until the engine's progress stream signals completion.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::ImageBuildFailed`] carrying the engine's
    /// failure detail.
    async fn build_image(&self, reference: &str, context_dir: &Path) -> Result<(), WorkspaceError>;
}

/// Persistent per-workspace volumes.
#[allow(async_fn_in_trait)]
pub trait VolumeStore {
    /// Create the named volume; an already-existing volume is success.
    async fn ensure_volume(&self, name: &str) -> Result<(), WorkspaceError>;

    /// Remove the named volume.
    async fn remove_volume(&self, name: &str) -> Result<(), WorkspaceError>;
}

/// Container create/start/stop/remove and port inspection.
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// Create the named container; returns the engine-assigned container id.
    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec<'_>,
    ) -> Result<String, WorkspaceError>;

    /// Start a created or stopped container.
    async fn start_container(&self, name: &str) -> Result<(), WorkspaceError>;

    /// Stop a running container.
    async fn stop_container(&self, name: &str) -> Result<(), WorkspaceError>;

    /// Remove a container.
    async fn remove_container(&self, name: &str) -> Result<(), WorkspaceError>;

    /// Live `container port → host port` bindings from the engine's network
    /// settings. Ports the engine has not (yet) bound are absent from the map.
    async fn port_bindings(&self, name: &str) -> Result<HashMap<u16, u16>, WorkspaceError>;
}

/// Ad-hoc command execution inside a running container.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor {
    /// Run `cmd` verbatim (no shell interpretation) attached to stdout and
    /// stderr only, and return the combined output once the channel closes.
    /// A non-zero command exit status is not an error.
    async fn exec(&self, container: &str, cmd: &[String]) -> Result<ExecOutput, WorkspaceError>;
}

/// Composite trait: any type implementing all four engine sub-traits is a
/// `ContainerEngine`.
pub trait ContainerEngine: ImageStore + VolumeStore + ContainerRuntime + CommandExecutor {}

/// Blanket implementation for any full engine implementation.
impl<T> ContainerEngine for T where T: ImageStore + VolumeStore + ContainerRuntime + CommandExecutor {}
