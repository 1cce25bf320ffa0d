//! Workspace lifecycle orchestration: launch, stop, resume, delete, exec.
//!
//! The manager treats the engine as the source of truth for container state;
//! there is no persisted state machine here, so nothing can drift. Every
//! operation holds the workspace's lease for its duration; operations on
//! different workspaces run fully concurrently.

use tracing::{info, warn};

use crate::application::ports::{ContainerEngine, ContainerSpec};
use crate::application::services::endpoints::{
    SettlePolicy, resolve_launch_endpoints, resolve_resumed_endpoints,
};
use crate::application::services::image::ensure_image;
use crate::application::services::locks::WorkspaceLocks;
use crate::domain::template::{TemplateCatalog, WORKSPACE_DIR};
use crate::domain::workspace::ExecOutput;
use crate::domain::{
    LaunchResult, WorkspaceEndpoints, WorkspaceError, container_name, validate_workspace_id,
    volume_name,
};

/// Orchestrates workspace containers against an injected engine.
pub struct WorkspaceManager<E> {
    engine: E,
    catalog: TemplateCatalog,
    settle: SettlePolicy,
    locks: WorkspaceLocks,
}

impl<E: ContainerEngine> WorkspaceManager<E> {
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self::with_policy(engine, SettlePolicy::default())
    }

    /// Manager with an explicit settle policy; tests use
    /// [`SettlePolicy::immediate`] to avoid real delays.
    #[must_use]
    pub fn with_policy(engine: E, settle: SettlePolicy) -> Self {
        Self {
            engine,
            catalog: TemplateCatalog::builtin(),
            settle,
            locks: WorkspaceLocks::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Launch a new workspace: ensure image and volume, create and start the
    /// container, then resolve every required port.
    ///
    /// # Errors
    ///
    /// `UnknownTemplate` and `InvalidWorkspaceId` fail before any engine
    /// call; `ImageBuildFailed`, `VolumeError`, `ContainerStartFailed`, and
    /// `PortNotBound` surface from the respective step.
    pub async fn launch(
        &self,
        workspace_id: &str,
        template_id: &str,
    ) -> Result<LaunchResult, WorkspaceError> {
        validate_workspace_id(workspace_id)?;
        let profile = self.catalog.resolve(template_id)?;
        let _lease = self.locks.acquire(workspace_id).await;

        ensure_image(&self.engine, profile).await?;

        let volume = volume_name(workspace_id);
        self.engine.ensure_volume(&volume).await?;

        let container = container_name(workspace_id);
        let exposed = profile.exposed_ports();
        let spec = ContainerSpec {
            image: profile.image,
            volume: &volume,
            working_dir: WORKSPACE_DIR,
            exposed_ports: &exposed,
            memory_bytes: profile.memory_bytes,
            nano_cpus: profile.nano_cpus,
            env: profile.env,
            cmd: profile.entry_cmd,
        };
        let container_id = self.engine.create_container(&container, &spec).await?;
        self.engine.start_container(&container).await?;

        let endpoints =
            resolve_launch_endpoints(&self.engine, &container, profile, self.settle).await?;
        info!(
            workspace = workspace_id,
            template = template_id,
            ide_url = endpoints.ide.url,
            "workspace launched"
        );
        Ok(LaunchResult {
            container_id,
            endpoints,
        })
    }

    /// Stop a running workspace container. No volume or image side effects.
    ///
    /// # Errors
    ///
    /// `ContainerNotFound` when no container exists for the id, or
    /// `EngineUnreachable`.
    pub async fn stop(&self, workspace_id: &str) -> Result<(), WorkspaceError> {
        validate_workspace_id(workspace_id)?;
        let _lease = self.locks.acquire(workspace_id).await;

        self.engine
            .stop_container(&container_name(workspace_id))
            .await
            .map_err(|e| for_workspace(e, workspace_id))?;
        info!(workspace = workspace_id, "workspace stopped");
        Ok(())
    }

    /// Resume a stopped workspace and re-resolve its ports; the engine may
    /// assign different host ports than the prior run.
    ///
    /// # Errors
    ///
    /// Fails the same way as launch's start step, plus `ContainerNotFound`.
    pub async fn resume(&self, workspace_id: &str) -> Result<WorkspaceEndpoints, WorkspaceError> {
        validate_workspace_id(workspace_id)?;
        let _lease = self.locks.acquire(workspace_id).await;

        let container = container_name(workspace_id);
        self.engine
            .start_container(&container)
            .await
            .map_err(|e| for_workspace(e, workspace_id))?;

        let endpoints =
            resolve_resumed_endpoints(&self.engine, &container, &self.catalog, self.settle)
                .await
                .map_err(|e| for_workspace(e, workspace_id))?;
        info!(
            workspace = workspace_id,
            ide_url = endpoints.ide.url,
            "workspace resumed"
        );
        Ok(endpoints)
    }

    /// Delete a workspace: best-effort stop, then remove the container and
    /// its volume. Step failures are logged, never re-raised: the workspace
    /// is gone from the caller's perspective regardless, which also makes
    /// delete idempotent.
    ///
    /// # Errors
    ///
    /// Only `InvalidWorkspaceId`; engine quirks do not block the caller.
    pub async fn delete(&self, workspace_id: &str) -> Result<(), WorkspaceError> {
        validate_workspace_id(workspace_id)?;
        {
            let _lease = self.locks.acquire(workspace_id).await;

            let container = container_name(workspace_id);
            if let Err(e) = self.engine.stop_container(&container).await {
                warn!(workspace = workspace_id, error = %e, "pre-delete stop failed; continuing");
            }
            if let Err(e) = self.engine.remove_container(&container).await {
                warn!(workspace = workspace_id, error = %e, "container removal failed; continuing");
            }
            if let Err(e) = self.engine.remove_volume(&volume_name(workspace_id)).await {
                warn!(workspace = workspace_id, error = %e, "volume removal failed; continuing");
            }
            info!(workspace = workspace_id, "workspace deleted");
        }
        self.locks.prune(workspace_id);
        Ok(())
    }

    /// Run an ad-hoc command inside the running workspace container and
    /// return its combined output. Requires a running container; not a state
    /// transition.
    ///
    /// # Errors
    ///
    /// `ContainerNotFound` or `EngineUnreachable`; a non-zero command exit
    /// status is not an error.
    pub async fn exec(
        &self,
        workspace_id: &str,
        cmd: &[String],
    ) -> Result<ExecOutput, WorkspaceError> {
        validate_workspace_id(workspace_id)?;
        let _lease = self.locks.acquire(workspace_id).await;

        self.engine
            .exec(&container_name(workspace_id), cmd)
            .await
            .map_err(|e| for_workspace(e, workspace_id))
    }
}

/// Rewrite a container-name-shaped `ContainerNotFound` so the caller sees the
/// workspace id they passed, not the derived engine name.
fn for_workspace(err: WorkspaceError, workspace_id: &str) -> WorkspaceError {
    match err {
        WorkspaceError::ContainerNotFound(_) => {
            WorkspaceError::ContainerNotFound(workspace_id.to_string())
        }
        other => other,
    }
}
