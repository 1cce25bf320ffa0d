//! Domain layer: pure types, the template catalog, naming, and typed errors.
//!
//! This module has zero imports from `crate::infra`, `crate::application`,
//! `tokio`, `std::fs`, `std::process`, or `std::net`. All functions are
//! synchronous and take data in, returning data out.

pub mod error;
pub mod template;
pub mod workspace;

pub use error::WorkspaceError;
pub use template::{ServicePort, TemplateCatalog, TemplateProfile};
pub use workspace::{
    Endpoint, ExecOutput, LaunchResult, ServiceEndpoint, WorkspaceEndpoints, container_name,
    validate_workspace_id, volume_name,
};
