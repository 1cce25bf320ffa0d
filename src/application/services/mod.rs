//! Application services: use-case orchestration.
//!
//! Each module composes domain logic with port trait calls. Services import
//! only from `crate::domain` and `crate::application::ports`, never from
//! `crate::infra`.

pub mod endpoints;
pub mod image;
pub mod lifecycle;
pub mod locks;
