//! Podbay library: lifecycle core for containerized development workspaces.
//!
//! The crate resolves a requested template to a runnable image, builds the
//! image on demand, launches a container with engine-chosen host ports and a
//! persistent volume, and later stops, resumes, deletes, or runs ad-hoc
//! commands inside it. The HTTP boundary layer that invokes these operations
//! lives outside this crate.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod domain;
pub mod infra;
