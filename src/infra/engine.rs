//! Bollard-backed container engine.
//!
//! [`DockerConnector`] discovers a live engine transport and caches the
//! shared client handle; [`BollardEngine`] implements the application port
//! traits on top of it. The connector is an explicitly constructed object
//! passed into the engine, not a module-level global, and its lazy first
//! connection is guarded so concurrent first-callers run discovery once.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use bollard::container::{Config, CreateContainerOptions};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{BuildImageOptions, ListImagesOptions};
use bollard::models::{HostConfig, PortBinding};
use bollard::volume::CreateVolumeOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::application::ports::{
    CommandExecutor, ContainerRuntime, ContainerSpec, ImageStore, VolumeStore,
};
use crate::domain::WorkspaceError;
use crate::domain::workspace::ExecOutput;
use crate::infra::build_context::pack_build_context;

/// Liveness probe budget per transport candidate.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Per-request timeout handed to bollard when constructing a client.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Fixed build file name inside every template's build context.
const BUILD_FILE: &str = "Dockerfile";

// ── Transport discovery ───────────────────────────────────────────────────────

/// One way of reaching the engine daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// TCP endpoint, e.g. `http://localhost:2375`.
    Http(String),
    /// Local socket path (unix socket, or named pipe on windows).
    Socket(String),
    /// bollard's platform defaults, as a last resort.
    LocalDefaults,
}

impl Transport {
    fn connect(&self) -> Result<Docker, bollard::errors::Error> {
        match self {
            Self::Http(addr) => {
                Docker::connect_with_http(addr, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            #[cfg(unix)]
            Self::Socket(path) => {
                Docker::connect_with_socket(path, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            #[cfg(windows)]
            Self::Socket(path) => {
                Docker::connect_with_named_pipe(path, CLIENT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Self::LocalDefaults => Docker::connect_with_local_defaults(),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(addr) => write!(f, "http {addr}"),
            Self::Socket(path) => write!(f, "socket {path}"),
            Self::LocalDefaults => write!(f, "local defaults"),
        }
    }
}

/// Ordered transport candidates: `DOCKER_HOST` override first, then the local
/// TCP API, platform socket paths, and bollard's defaults.
#[must_use]
pub fn default_candidates() -> Vec<Transport> {
    let mut candidates = Vec::new();
    if let Ok(host) = std::env::var("DOCKER_HOST")
        && !host.is_empty()
    {
        candidates.push(parse_docker_host(&host));
    }
    candidates.push(Transport::Http("http://localhost:2375".to_string()));
    #[cfg(unix)]
    {
        candidates.push(Transport::Socket("/var/run/docker.sock".to_string()));
        if let Some(home) = dirs::home_dir() {
            candidates.push(Transport::Socket(
                home.join(".docker/run/docker.sock")
                    .to_string_lossy()
                    .into_owned(),
            ));
        }
    }
    #[cfg(windows)]
    candidates.push(Transport::Socket("//./pipe/docker_engine".to_string()));
    candidates.push(Transport::LocalDefaults);
    candidates
}

/// Interpret a `DOCKER_HOST` value as a transport candidate.
fn parse_docker_host(value: &str) -> Transport {
    if let Some(path) = value.strip_prefix("unix://") {
        Transport::Socket(path.to_string())
    } else if let Some(pipe) = value.strip_prefix("npipe://") {
        Transport::Socket(pipe.to_string())
    } else if let Some(rest) = value.strip_prefix("tcp://") {
        Transport::Http(format!("http://{rest}"))
    } else {
        Transport::Http(value.to_string())
    }
}

/// Process-wide engine connection: discovered once, reused by every
/// operation, re-discoverable after [`DockerConnector::invalidate`].
pub struct DockerConnector {
    candidates: Vec<Transport>,
    handle: RwLock<Option<Docker>>,
    init: Mutex<()>,
}

impl DockerConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::with_candidates(default_candidates())
    }

    #[must_use]
    pub fn with_candidates(candidates: Vec<Transport>) -> Self {
        Self {
            candidates,
            handle: RwLock::new(None),
            init: Mutex::new(()),
        }
    }

    /// Shared client handle, running transport discovery on first use.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::EngineUnreachable`] after every candidate
    /// has been tried without an answer.
    pub async fn client(&self) -> Result<Docker, WorkspaceError> {
        if let Some(docker) = self.handle.read().await.as_ref() {
            return Ok(docker.clone());
        }
        let _init = self.init.lock().await;
        // A concurrent first-caller may have finished discovery while we
        // waited on the guard.
        if let Some(docker) = self.handle.read().await.as_ref() {
            return Ok(docker.clone());
        }
        let docker = self.discover().await?;
        *self.handle.write().await = Some(docker.clone());
        Ok(docker)
    }

    /// Forget the cached handle so the next call re-runs discovery. Called
    /// by operations that observe a connectivity failure.
    pub async fn invalidate(&self) {
        *self.handle.write().await = None;
    }

    async fn discover(&self) -> Result<Docker, WorkspaceError> {
        for transport in &self.candidates {
            match transport.connect() {
                Ok(docker) => match tokio::time::timeout(PROBE_TIMEOUT, docker.ping()).await {
                    Ok(Ok(_)) => {
                        info!(%transport, "connected to container engine");
                        return Ok(docker);
                    }
                    Ok(Err(err)) => debug!(%transport, error = %err, "engine probe failed"),
                    Err(_) => debug!(%transport, "engine probe timed out"),
                },
                Err(err) => debug!(%transport, error = %err, "transport not constructible"),
            }
        }
        warn!(
            candidates = self.candidates.len(),
            "container engine unreachable on every transport"
        );
        Err(WorkspaceError::EngineUnreachable)
    }
}

impl Default for DockerConnector {
    fn default() -> Self {
        Self::new()
    }
}

// ── Error mapping ─────────────────────────────────────────────────────────────

/// HTTP status of an engine response error, `None` when the daemon never
/// answered (transport failure, timeout, or malformed response).
fn response_status(err: &bollard::errors::Error) -> Option<u16> {
    if let bollard::errors::Error::DockerResponseServerError { status_code, .. } = err {
        Some(*status_code)
    } else {
        None
    }
}

fn daemon_err(err: &bollard::errors::Error) -> WorkspaceError {
    match response_status(err) {
        None => WorkspaceError::EngineUnreachable,
        Some(_) => WorkspaceError::Engine(err.to_string()),
    }
}

fn container_err(name: &str, err: &bollard::errors::Error) -> WorkspaceError {
    match response_status(err) {
        Some(404) => WorkspaceError::ContainerNotFound(name.to_string()),
        _ => daemon_err(err),
    }
}

fn volume_err(name: &str, err: &bollard::errors::Error) -> WorkspaceError {
    match response_status(err) {
        None => WorkspaceError::EngineUnreachable,
        Some(_) => WorkspaceError::VolumeError {
            volume: name.to_string(),
            detail: err.to_string(),
        },
    }
}

fn start_err(name: &str, err: &bollard::errors::Error) -> WorkspaceError {
    match response_status(err) {
        Some(404) => WorkspaceError::ContainerNotFound(name.to_string()),
        None => WorkspaceError::EngineUnreachable,
        Some(_) => WorkspaceError::ContainerStartFailed {
            container: name.to_string(),
            detail: err.to_string(),
        },
    }
}

// ── Engine implementation ─────────────────────────────────────────────────────

/// The production engine: every port trait implemented against the Docker
/// API through the shared connector.
pub struct BollardEngine {
    connector: DockerConnector,
}

impl BollardEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(DockerConnector::new())
    }

    #[must_use]
    pub fn with_connector(connector: DockerConnector) -> Self {
        Self { connector }
    }

    async fn docker(&self) -> Result<Docker, WorkspaceError> {
        self.connector.client().await
    }

    /// Route a mapped operation error. Losing the daemon mid-operation drops
    /// the cached transport, so the next operation re-runs discovery instead
    /// of hammering a dead endpoint.
    async fn operation_err(&self, err: WorkspaceError) -> WorkspaceError {
        if matches!(err, WorkspaceError::EngineUnreachable) {
            debug!("engine stopped answering, dropping cached transport");
            self.connector.invalidate().await;
        }
        err
    }
}

impl Default for BollardEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageStore for BollardEngine {
    async fn image_exists(&self, reference: &str) -> Result<bool, WorkspaceError> {
        let docker = self.docker().await?;
        let images = match docker
            .list_images(Some(ListImagesOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
        {
            Ok(images) => images,
            Err(err) => return Err(self.operation_err(daemon_err(&err)).await),
        };
        Ok(images
            .iter()
            .any(|image| image.repo_tags.iter().any(|tag| tag == reference)))
    }

    async fn build_image(&self, reference: &str, context_dir: &Path) -> Result<(), WorkspaceError> {
        let docker = self.docker().await?;
        let context = pack_build_context(context_dir).map_err(|e| {
            WorkspaceError::ImageBuildFailed {
                image: reference.to_string(),
                detail: format!("packing build context {}: {e}", context_dir.display()),
            }
        })?;

        let options = BuildImageOptions {
            dockerfile: BUILD_FILE.to_string(),
            t: reference.to_string(),
            rm: true,
            ..Default::default()
        };
        // The build is blocking and unbounded in time; the progress stream
        // closes when the engine is done.
        let mut progress = docker.build_image(options, None, Some(context.into()));
        while let Some(update) = progress.next().await {
            let update = update.map_err(|e| WorkspaceError::ImageBuildFailed {
                image: reference.to_string(),
                detail: e.to_string(),
            })?;
            if let Some(error) = update.error {
                return Err(WorkspaceError::ImageBuildFailed {
                    image: reference.to_string(),
                    detail: error.trim().to_string(),
                });
            }
            if let Some(line) = update.stream {
                let line = line.trim();
                if !line.is_empty() {
                    debug!(image = reference, "build: {line}");
                }
            }
        }
        Ok(())
    }
}

impl VolumeStore for BollardEngine {
    async fn ensure_volume(&self, name: &str) -> Result<(), WorkspaceError> {
        let docker = self.docker().await?;
        match docker
            .create_volume(CreateVolumeOptions {
                name: name.to_string(),
                ..Default::default()
            })
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if response_status(&err) == Some(409) => {
                debug!(volume = name, "volume already exists, reusing");
                Ok(())
            }
            Err(err) => Err(self.operation_err(volume_err(name, &err)).await),
        }
    }

    async fn remove_volume(&self, name: &str) -> Result<(), WorkspaceError> {
        let docker = self.docker().await?;
        match docker.remove_volume(name, None).await {
            Ok(()) => Ok(()),
            Err(err) if response_status(&err) == Some(404) => {
                debug!(volume = name, "volume already gone");
                Ok(())
            }
            Err(err) => Err(self.operation_err(volume_err(name, &err)).await),
        }
    }
}

impl ContainerRuntime for BollardEngine {
    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerSpec<'_>,
    ) -> Result<String, WorkspaceError> {
        let docker = self.docker().await?;

        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .exposed_ports
            .iter()
            .map(|port| (format!("{port}/tcp"), HashMap::new()))
            .collect();
        // Host port "0" asks the engine for an ephemeral port at start time.
        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
            .exposed_ports
            .iter()
            .map(|port| {
                (
                    format!("{port}/tcp"),
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some("0".to_string()),
                    }]),
                )
            })
            .collect();

        let config = Config {
            image: Some(spec.image.to_string()),
            cmd: Some(spec.cmd.iter().map(ToString::to_string).collect()),
            env: Some(spec.env.iter().map(ToString::to_string).collect()),
            exposed_ports: Some(exposed_ports),
            working_dir: Some(spec.working_dir.to_string()),
            host_config: Some(HostConfig {
                binds: Some(vec![format!("{}:{}", spec.volume, spec.working_dir)]),
                port_bindings: Some(port_bindings),
                memory: Some(spec.memory_bytes),
                nano_cpus: Some(spec.nano_cpus),
                network_mode: Some("bridge".to_string()),
                auto_remove: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = match docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.to_string(),
                    ..Default::default()
                }),
                config,
            )
            .await
        {
            Ok(created) => created,
            Err(err) => {
                let mapped = match response_status(&err) {
                    None => WorkspaceError::EngineUnreachable,
                    Some(_) => WorkspaceError::ContainerStartFailed {
                        container: name.to_string(),
                        detail: err.to_string(),
                    },
                };
                return Err(self.operation_err(mapped).await);
            }
        };
        for warning in &created.warnings {
            warn!(container = name, warning, "engine warning on create");
        }
        Ok(created.id)
    }

    async fn start_container(&self, name: &str) -> Result<(), WorkspaceError> {
        let docker = self.docker().await?;
        match docker.start_container::<String>(name, None).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.operation_err(start_err(name, &err)).await),
        }
    }

    async fn stop_container(&self, name: &str) -> Result<(), WorkspaceError> {
        let docker = self.docker().await?;
        match docker.stop_container(name, None).await {
            Ok(()) => Ok(()),
            // 304: already stopped.
            Err(err) if response_status(&err) == Some(304) => Ok(()),
            Err(err) => Err(self.operation_err(container_err(name, &err)).await),
        }
    }

    async fn remove_container(&self, name: &str) -> Result<(), WorkspaceError> {
        let docker = self.docker().await?;
        match docker.remove_container(name, None).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.operation_err(container_err(name, &err)).await),
        }
    }

    async fn port_bindings(&self, name: &str) -> Result<HashMap<u16, u16>, WorkspaceError> {
        let docker = self.docker().await?;
        let info = match docker.inspect_container(name, None).await {
            Ok(info) => info,
            Err(err) => return Err(self.operation_err(container_err(name, &err)).await),
        };
        Ok(extract_port_map(
            info.network_settings.and_then(|ns| ns.ports),
        ))
    }
}

/// Flatten the engine's `"8080/tcp" → [{HostPort}]` map into
/// `container port → host port`, dropping entries with no materialized host
/// port; the resolver decides whether that is an error.
fn extract_port_map(
    ports: Option<HashMap<String, Option<Vec<PortBinding>>>>,
) -> HashMap<u16, u16> {
    let mut map = HashMap::new();
    for (key, bindings) in ports.unwrap_or_default() {
        let Some(container_port) = key
            .strip_suffix("/tcp")
            .and_then(|p| p.parse::<u16>().ok())
        else {
            continue;
        };
        let host_port = bindings
            .as_ref()
            .and_then(|list| list.first())
            .and_then(|binding| binding.host_port.as_ref())
            .and_then(|hp| hp.parse::<u16>().ok())
            .filter(|hp| *hp != 0);
        if let Some(host_port) = host_port {
            map.insert(container_port, host_port);
        }
    }
    map
}

impl CommandExecutor for BollardEngine {
    async fn exec(&self, container: &str, cmd: &[String]) -> Result<ExecOutput, WorkspaceError> {
        let docker = self.docker().await?;
        let created = match docker
            .create_exec(
                container,
                CreateExecOptions {
                    cmd: Some(cmd.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(created) => created,
            Err(err) => return Err(self.operation_err(container_err(container, &err)).await),
        };

        let mut combined = String::new();
        let started = match docker.start_exec(&created.id, None).await {
            Ok(started) => started,
            Err(err) => return Err(self.operation_err(container_err(container, &err)).await),
        };
        match started {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    match chunk {
                        Ok(log) => {
                            combined.push_str(&String::from_utf8_lossy(&log.into_bytes()));
                        }
                        Err(err) => {
                            return Err(self.operation_err(container_err(container, &err)).await);
                        }
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        // Best-effort: the exit code is informational, not a failure signal.
        let exit_code = docker
            .inspect_exec(&created.id)
            .await
            .ok()
            .and_then(|inspected| inspected.exit_code);
        Ok(ExecOutput {
            output: combined,
            exit_code,
        })
    }
}
