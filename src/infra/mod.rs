//! Infrastructure layer: the bollard-backed container engine.
//!
//! Concrete implementations of the application port traits plus engine
//! transport discovery. Imports from `crate::domain` and
//! `crate::application::ports` are allowed; nothing here leaks bollard types
//! upward.

pub mod build_context;
pub mod engine;

pub use engine::{BollardEngine, DockerConnector, Transport};
