//! Port resolution: recover engine-assigned host ports after a container
//! starts and synthesize access URLs.
//!
//! Engines may take a moment to finalize bindings after start, so resolution
//! is a bounded poll loop over the container's network settings rather than a
//! single fixed wait. `PortNotBound` is raised only after genuine exhaustion
//! and is never silently defaulted.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::application::ports::ContainerRuntime;
use crate::domain::template::{IDE_PORT, TemplateCatalog, TemplateProfile};
use crate::domain::workspace::{Endpoint, ServiceEndpoint, WorkspaceEndpoints};
use crate::domain::WorkspaceError;

/// Bounded poll-until-ready policy for post-start port settling.
#[derive(Debug, Clone, Copy)]
pub struct SettlePolicy {
    /// Maximum number of inspections before giving up.
    pub attempts: u32,
    /// Pause between inspections.
    pub interval: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_millis(500),
        }
    }
}

impl SettlePolicy {
    /// Policy with no pauses, for tests.
    #[must_use]
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            interval: Duration::ZERO,
        }
    }
}

/// Resolve every port a freshly launched template must expose.
///
/// Launch only succeeds once the IDE port and all of the profile's service
/// ports carry host bindings.
///
/// # Errors
///
/// Returns [`WorkspaceError::PortNotBound`] for the first port still missing
/// after the poll budget, or any engine error from inspection.
pub async fn resolve_launch_endpoints(
    engine: &impl ContainerRuntime,
    container: &str,
    profile: &TemplateProfile,
    settle: SettlePolicy,
) -> Result<WorkspaceEndpoints, WorkspaceError> {
    let required = profile.exposed_ports();
    let bindings = poll_bindings(engine, container, &required, settle).await?;

    let ide = endpoint_for(&bindings, container, IDE_PORT)?;
    let mut services = Vec::with_capacity(profile.service_ports.len());
    for sp in profile.service_ports {
        services.push(ServiceEndpoint {
            name: sp.name,
            endpoint: endpoint_for(&bindings, container, sp.port)?,
        });
    }
    Ok(WorkspaceEndpoints { ide, services })
}

/// Resolve the endpoints of a resumed container.
///
/// Resume carries no template id, so only the IDE port is required; auxiliary
/// service ports are included when the live bindings show them, named via the
/// catalog's reverse lookup. Bindings may differ from the prior run; nothing
/// here assumes the original host ports survived the stop.
///
/// # Errors
///
/// Returns [`WorkspaceError::PortNotBound`] when the IDE port never binds, or
/// any engine error from inspection.
pub async fn resolve_resumed_endpoints(
    engine: &impl ContainerRuntime,
    container: &str,
    catalog: &TemplateCatalog,
    settle: SettlePolicy,
) -> Result<WorkspaceEndpoints, WorkspaceError> {
    let bindings = poll_bindings(engine, container, &[IDE_PORT], settle).await?;

    let ide = endpoint_for(&bindings, container, IDE_PORT)?;
    let mut services: Vec<ServiceEndpoint> = bindings
        .iter()
        .filter(|(port, _)| **port != IDE_PORT)
        .filter_map(|(port, host)| {
            catalog.service_port_name(*port).map(|name| ServiceEndpoint {
                name,
                endpoint: Endpoint::new(*port, *host),
            })
        })
        .collect();
    services.sort_by_key(|s| s.endpoint.container_port);
    Ok(WorkspaceEndpoints { ide, services })
}

/// Inspect repeatedly until all `required` container ports are bound or the
/// poll budget runs out; returns the last observed binding map either way.
async fn poll_bindings(
    engine: &impl ContainerRuntime,
    container: &str,
    required: &[u16],
    settle: SettlePolicy,
) -> Result<HashMap<u16, u16>, WorkspaceError> {
    let mut bindings = HashMap::new();
    for attempt in 1..=settle.attempts.max(1) {
        bindings = engine.port_bindings(container).await?;
        if required.iter().all(|p| bindings.contains_key(p)) {
            return Ok(bindings);
        }
        debug!(
            container,
            attempt,
            bound = bindings.len(),
            required = required.len(),
            "port bindings not yet settled"
        );
        if attempt < settle.attempts && !settle.interval.is_zero() {
            tokio::time::sleep(settle.interval).await;
        }
    }
    Ok(bindings)
}

fn endpoint_for(
    bindings: &HashMap<u16, u16>,
    container: &str,
    port: u16,
) -> Result<Endpoint, WorkspaceError> {
    bindings
        .get(&port)
        .map(|host| Endpoint::new(port, *host))
        .ok_or(WorkspaceError::PortNotBound {
            container: container.to_string(),
            port,
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::application::ports::ContainerSpec;

    /// Runtime stub that serves a sequence of binding maps, one per
    /// inspection, repeating the last.
    struct InspectSequence {
        responses: Vec<HashMap<u16, u16>>,
        calls: Mutex<usize>,
    }

    impl InspectSequence {
        fn new(responses: Vec<HashMap<u16, u16>>) -> Self {
            Self {
                responses,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("lock")
        }
    }

    impl ContainerRuntime for InspectSequence {
        async fn create_container(
            &self,
            _name: &str,
            _spec: &ContainerSpec<'_>,
        ) -> Result<String, WorkspaceError> {
            unreachable!("not expected")
        }
        async fn start_container(&self, _name: &str) -> Result<(), WorkspaceError> {
            unreachable!("not expected")
        }
        async fn stop_container(&self, _name: &str) -> Result<(), WorkspaceError> {
            unreachable!("not expected")
        }
        async fn remove_container(&self, _name: &str) -> Result<(), WorkspaceError> {
            unreachable!("not expected")
        }
        async fn port_bindings(&self, _name: &str) -> Result<HashMap<u16, u16>, WorkspaceError> {
            let mut calls = self.calls.lock().expect("lock");
            let idx = (*calls).min(self.responses.len() - 1);
            *calls += 1;
            Ok(self.responses[idx].clone())
        }
    }

    fn mern() -> &'static TemplateProfile {
        TemplateCatalog::builtin().resolve("mern").expect("mern")
    }

    fn python() -> &'static TemplateProfile {
        TemplateCatalog::builtin().resolve("python").expect("python")
    }

    #[tokio::test]
    async fn launch_resolution_waits_until_all_ports_bind() {
        let settled: HashMap<u16, u16> =
            [(8080, 49000), (3000, 49001), (5000, 49002)].into_iter().collect();
        let engine = InspectSequence::new(vec![
            HashMap::new(),
            [(8080, 49000)].into_iter().collect(),
            settled,
        ]);

        let endpoints =
            resolve_launch_endpoints(&engine, "podbay-w1", mern(), SettlePolicy::immediate(5))
                .await
                .expect("all ports bound on third inspect");

        assert_eq!(engine.calls(), 3);
        assert_eq!(endpoints.ide.host_port, 49000);
        assert_eq!(endpoints.ide.url, "http://localhost:49000");
        let hosts: Vec<u16> = endpoints
            .services
            .iter()
            .map(|s| s.endpoint.host_port)
            .collect();
        assert_eq!(hosts, vec![49001, 49002]);
    }

    #[tokio::test]
    async fn exhausted_poll_budget_names_the_missing_port() {
        let engine = InspectSequence::new(vec![[(8080, 49000)].into_iter().collect()]);

        let err =
            resolve_launch_endpoints(&engine, "podbay-w1", mern(), SettlePolicy::immediate(3))
                .await
                .expect_err("frontend port never binds");

        assert_eq!(engine.calls(), 3);
        match err {
            WorkspaceError::PortNotBound { container, port } => {
                assert_eq!(container, "podbay-w1");
                assert_eq!(port, 3000);
            }
            other => panic!("expected PortNotBound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_service_launch_needs_only_the_ide_port() {
        let engine = InspectSequence::new(vec![[(8080, 50123)].into_iter().collect()]);
        let endpoints =
            resolve_launch_endpoints(&engine, "podbay-w1", python(), SettlePolicy::immediate(1))
                .await
                .expect("ide bound");
        assert_eq!(endpoints.ide.host_port, 50123);
        assert!(endpoints.services.is_empty());
    }

    #[tokio::test]
    async fn resume_recovers_service_names_from_live_bindings() {
        let engine = InspectSequence::new(vec![
            [(8080, 51000), (3000, 51001), (5000, 51002)]
                .into_iter()
                .collect(),
        ]);
        let endpoints = resolve_resumed_endpoints(
            &engine,
            "podbay-w1",
            &TemplateCatalog::builtin(),
            SettlePolicy::immediate(1),
        )
        .await
        .expect("resumed");

        assert_eq!(endpoints.ide.host_port, 51000);
        assert_eq!(endpoints.services.len(), 2);
        assert_eq!(endpoints.services[0].name, "frontend");
        assert_eq!(endpoints.services[1].name, "backend");
    }

    #[tokio::test]
    async fn resume_of_single_service_workspace_has_no_extras() {
        let engine = InspectSequence::new(vec![[(8080, 51000)].into_iter().collect()]);
        let endpoints = resolve_resumed_endpoints(
            &engine,
            "podbay-w1",
            &TemplateCatalog::builtin(),
            SettlePolicy::immediate(1),
        )
        .await
        .expect("resumed");
        assert!(endpoints.services.is_empty());
    }
}
