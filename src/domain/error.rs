//! Typed lifecycle error enum.
//!
//! Every component raises a specific variant rather than a generic failure so
//! the boundary layer can map each kind to a distinct remediation message.
//! All variants implement `thiserror::Error` and propagate with `?`.

use thiserror::Error;

/// Errors raised by workspace lifecycle operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// No transport candidate answered the liveness probe. Fatal for the
    /// request; never retried internally.
    #[error(
        "Container engine is not reachable. Start Docker and make sure its \
         API is enabled, then try again."
    )]
    EngineUnreachable,

    /// Caller asked for a template outside the closed catalog. Not retryable.
    #[error("Template '{requested}' is not supported. Available templates: {available}.")]
    UnknownTemplate { requested: String, available: String },

    /// The workspace id cannot be used as a container or volume name.
    #[error(
        "Invalid workspace id '{0}': ids must start with a letter or digit and \
         contain only letters, digits, '_', '.', or '-'."
    )]
    InvalidWorkspaceId(String),

    /// The engine reported a failure while building the template image.
    /// Retryable by the caller.
    #[error("Image build failed for '{image}': {detail}")]
    ImageBuildFailed { image: String, detail: String },

    /// Volume creation or removal failed for a reason other than
    /// "already exists". Retryable.
    #[error("Volume operation failed for '{volume}': {detail}")]
    VolumeError { volume: String, detail: String },

    /// Engine-level container create or start failure. Retryable.
    #[error("Failed to start workspace container '{container}': {detail}")]
    ContainerStartFailed { container: String, detail: String },

    /// The engine's network settings carried no host port for a declared
    /// container port after the settle window. Retryable with backoff.
    #[error(
        "No host port was bound for container port {port} on '{container}'. \
         Port allocation may still be settling; try again."
    )]
    PortNotBound { container: String, port: u16 },

    /// Operated on a workspace id with no live container. Not retryable
    /// without a prior launch.
    #[error("No container found for workspace '{0}'. Launch the workspace first.")]
    ContainerNotFound(String),

    /// Unexpected daemon response that fits no specific kind above.
    #[error("Container engine request failed: {0}")]
    Engine(String),
}

impl WorkspaceError {
    /// True for kinds the caller may retry without changing the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ImageBuildFailed { .. }
                | Self::VolumeError { .. }
                | Self::ContainerStartFailed { .. }
                | Self::PortNotBound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_template_names_the_catalog() {
        let err = WorkspaceError::UnknownTemplate {
            requested: "rails".into(),
            available: "python, nodejs, mern".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'rails'"), "requested id in: {msg}");
        assert!(msg.contains("python, nodejs, mern"), "catalog in: {msg}");
    }

    #[test]
    fn retryable_kinds() {
        assert!(
            WorkspaceError::PortNotBound {
                container: "podbay-w1".into(),
                port: 8080,
            }
            .is_retryable()
        );
        assert!(!WorkspaceError::EngineUnreachable.is_retryable());
        assert!(!WorkspaceError::ContainerNotFound("w1".into()).is_retryable());
    }
}
