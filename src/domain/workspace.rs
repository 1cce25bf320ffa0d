//! Workspace naming, validation, and boundary-facing result types.
//!
//! Container and volume names are deterministic functions of the workspace
//! id, so the same id always addresses the same underlying resources and no
//! separate index is needed to find them.

use serde::Serialize;

use crate::domain::error::WorkspaceError;

/// Prefix shared by all podbay container and volume names.
pub const NAME_PREFIX: &str = "podbay";

/// Engine names may be at most 63 characters; leave room for the prefix.
const MAX_ID_LEN: usize = 48;

/// Container name for a workspace id.
#[must_use]
pub fn container_name(workspace_id: &str) -> String {
    format!("{NAME_PREFIX}-{workspace_id}")
}

/// Volume name for a workspace id. Intentionally identical to the container
/// name; both live in separate engine namespaces.
#[must_use]
pub fn volume_name(workspace_id: &str) -> String {
    format!("{NAME_PREFIX}-{workspace_id}")
}

/// Validate that a caller-supplied workspace id can serve as an engine
/// container/volume name component.
///
/// # Errors
///
/// Returns [`WorkspaceError::InvalidWorkspaceId`] for empty, overlong, or
/// badly charactered ids.
pub fn validate_workspace_id(id: &str) -> Result<(), WorkspaceError> {
    let mut chars = id.chars();
    let valid_head = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid_head || !valid_tail || id.len() > MAX_ID_LEN {
        return Err(WorkspaceError::InvalidWorkspaceId(id.to_string()));
    }
    Ok(())
}

/// One resolved port mapping with its access URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub container_port: u16,
    pub host_port: u16,
    pub url: String,
}

impl Endpoint {
    /// Synthesize the loopback access URL for an engine-assigned host port.
    #[must_use]
    pub fn new(container_port: u16, host_port: u16) -> Self {
        Self {
            container_port,
            host_port,
            url: format!("http://localhost:{host_port}"),
        }
    }
}

/// A named auxiliary endpoint of a multi-service template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEndpoint {
    pub name: &'static str,
    #[serde(flatten)]
    pub endpoint: Endpoint,
}

/// Externally visible ports of a running workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceEndpoints {
    /// The interactive-IDE endpoint every workspace exposes.
    pub ide: Endpoint,
    /// Extra service endpoints, empty for single-service templates.
    pub services: Vec<ServiceEndpoint>,
}

/// Successful launch result forwarded by the boundary layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchResult {
    pub container_id: String,
    #[serde(flatten)]
    pub endpoints: WorkspaceEndpoints,
}

/// Captured result of an ad-hoc command run inside a workspace.
///
/// A non-zero exit code is not an error; callers decide what to make of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
    /// Combined stdout and stderr, in arrival order.
    pub output: String,
    /// Exit code when the engine reported one.
    pub exit_code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_deterministic_per_id() {
        assert_eq!(container_name("u1-173"), "podbay-u1-173");
        assert_eq!(volume_name("u1-173"), "podbay-u1-173");
        assert_eq!(container_name("u1-173"), container_name("u1-173"));
    }

    #[test]
    fn validate_accepts_typical_ids() {
        for id in ["u1-1718823", "alice.dev", "A9_b", "7x"] {
            assert!(validate_workspace_id(id).is_ok(), "id {id} should be valid");
        }
    }

    #[test]
    fn validate_rejects_bad_ids() {
        for id in ["", "-lead", ".lead", "has space", "sl/ash", "a!b"] {
            assert!(
                validate_workspace_id(id).is_err(),
                "id {id:?} should be rejected"
            );
        }
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(validate_workspace_id(&long).is_err());
    }

    #[test]
    fn endpoint_url_uses_loopback_host() {
        let ep = Endpoint::new(8080, 49213);
        assert_eq!(ep.url, "http://localhost:49213");
    }

    #[test]
    fn launch_result_serializes_flat_for_the_boundary_layer() {
        let result = LaunchResult {
            container_id: "abc123".into(),
            endpoints: WorkspaceEndpoints {
                ide: Endpoint::new(8080, 49213),
                services: vec![ServiceEndpoint {
                    name: "frontend",
                    endpoint: Endpoint::new(3000, 49214),
                }],
            },
        };
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["container_id"], "abc123");
        assert_eq!(json["ide"]["url"], "http://localhost:49213");
        assert_eq!(json["services"][0]["name"], "frontend");
        assert_eq!(json["services"][0]["host_port"], 49214);
    }
}
