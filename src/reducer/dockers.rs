use chrono::{DateTime, Utc};

use super::Outcome;
use crate::models::{
    ConflictResolution, ConflictingContainer, DockersState, PortConflict, ServiceInfo,
    ServiceLogs, ServiceOperation,
};
use crate::services::{effective_port, find_port_collision, normalize_services, suggest_port};

fn service<'a>(docker: &'a mut DockersState, service_id: &str) -> Result<&'a mut ServiceInfo, String> {
    docker
        .services
        .get_mut(service_id)
        .ok_or_else(|| format!("Unknown service: {service_id}"))
}

/// Replaces the inventory. In-flight operations and fetched logs survive for
/// services that are still reported; state tied to vanished ones is dropped.
pub(super) fn set_services(docker: &mut DockersState, services: Vec<ServiceInfo>) {
    let mut incoming = normalize_services(services);
    for (id, fresh) in incoming.iter_mut() {
        if let Some(old) = docker.services.get(id) {
            fresh.pending_operation = old.pending_operation;
            if fresh.logs.is_none() {
                fresh.logs = old.logs.clone();
            }
        }
    }
    docker.services = incoming;
    let known = &docker.services;
    docker.port_overrides.retain(|id, _| known.contains_key(id));
    if docker
        .pending_conflict
        .as_ref()
        .is_some_and(|c| !known.contains_key(&c.service_id))
    {
        docker.pending_conflict = None;
    }
    docker.refreshing = false;
}

pub(super) fn refresh_failed(docker: &mut DockersState, error: &str) -> Outcome {
    docker.refreshing = false;
    Err(format!("Failed to refresh services: {error}"))
}

fn ensure_idle(service: &ServiceInfo) -> Outcome {
    match service.pending_operation {
        Some(op) => Err(format!(
            "{} already has a {op:?} in progress",
            service.name
        )),
        None => Ok(()),
    }
}

/// Queues a start, or raises a port conflict when another running service
/// holds the port this one would bind.
pub(super) fn start(docker: &mut DockersState, service_id: &str) -> Outcome {
    ensure_idle(service(docker, service_id)?)?;
    if docker.has_pending_conflict_for(service_id) {
        return Err(format!("Resolve the port conflict for {service_id} first"));
    }
    if let Some(port) = effective_port(docker, service_id) {
        if let Some(other) = find_port_collision(docker, service_id, port) {
            let Some(suggested_port) = suggest_port(docker, port) else {
                return Err(format!(
                    "Port {port} is held by {} and no free port is left above it",
                    other.name
                ));
            };
            let conflict = PortConflict {
                service_id: service_id.to_string(),
                requested_port: port,
                suggested_port,
                conflicting_container: ConflictingContainer {
                    id: other.id.clone(),
                    name: other.name.clone(),
                },
            };
            set_port_conflict(docker, conflict)?;
            return Ok(());
        }
    }
    service(docker, service_id)?.pending_operation = Some(ServiceOperation::Start);
    Ok(())
}

pub(super) fn queue(docker: &mut DockersState, service_id: &str, op: ServiceOperation) -> Outcome {
    let service = service(docker, service_id)?;
    ensure_idle(service)?;
    service.pending_operation = Some(op);
    Ok(())
}

pub(super) fn operation_finished(docker: &mut DockersState, service_id: &str) {
    if let Some(service) = docker.services.get_mut(service_id) {
        service.pending_operation = None;
    }
}

pub(super) fn operation_failed(docker: &mut DockersState, service_id: &str, error: &str) -> Outcome {
    operation_finished(docker, service_id);
    Err(format!("{service_id}: {error}"))
}

pub(super) fn fetch_logs(docker: &mut DockersState, service_id: &str) -> Outcome {
    let service = service(docker, service_id)?;
    service.logs.get_or_insert_with(ServiceLogs::default).loading = true;
    Ok(())
}

/// Logs that arrive after a cancel are still useful, so they are kept.
pub(super) fn set_logs(
    docker: &mut DockersState,
    service_id: &str,
    content: &str,
    fetched_at: DateTime<Utc>,
) {
    if let Some(service) = docker.services.get_mut(service_id) {
        service.logs = Some(ServiceLogs {
            content: content.to_string(),
            loading: false,
            fetched_at: Some(fetched_at),
        });
    }
}

pub(super) fn logs_failed(docker: &mut DockersState, service_id: &str, error: &str) -> Outcome {
    cancel_logs(docker, service_id);
    Err(format!("Failed to fetch logs for {service_id}: {error}"))
}

pub(super) fn cancel_logs(docker: &mut DockersState, service_id: &str) {
    if let Some(logs) = docker
        .services
        .get_mut(service_id)
        .and_then(|s| s.logs.as_mut())
    {
        logs.loading = false;
    }
}

/// Only one conflict is pending at a time; later ones are ignored.
pub(super) fn set_port_conflict(docker: &mut DockersState, conflict: PortConflict) -> Outcome {
    if docker.pending_conflict.is_some() {
        return Ok(());
    }
    service(docker, &conflict.service_id)?.pending_operation = None;
    docker.pending_conflict = Some(conflict);
    Ok(())
}

/// Applies a resolution to the pending conflict and queues the start.
/// Resolutions for any other service are no-ops.
pub(super) fn resolve_port_conflict(
    docker: &mut DockersState,
    service_id: &str,
    resolution: &ConflictResolution,
) -> Outcome {
    let Some(conflict) = docker.pending_conflict.clone() else {
        return Ok(());
    };
    if conflict.service_id != service_id {
        return Ok(());
    }
    match resolution {
        ConflictResolution::UseSuggestedPort => {
            docker
                .port_overrides
                .insert(service_id.to_string(), conflict.suggested_port);
        }
        ConflictResolution::UseCustomPort { port } => {
            if let Some(other) = find_port_collision(docker, service_id, *port) {
                return Err(format!("Port {port} is in use by {}", other.name));
            }
            docker.port_overrides.insert(service_id.to_string(), *port);
        }
        ConflictResolution::StopConflictingContainer => {
            if let Some(other) = docker.services.get_mut(&conflict.conflicting_container.id) {
                other.pending_operation = Some(ServiceOperation::Stop);
            }
        }
    }
    docker.pending_conflict = None;
    service(docker, service_id)?.pending_operation = Some(ServiceOperation::Start);
    Ok(())
}

pub(super) fn cancel_port_conflict(docker: &mut DockersState, service_id: &str) {
    if docker.has_pending_conflict_for(service_id) {
        docker.pending_conflict = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceStatus;
    use chrono::TimeZone;

    fn svc(id: &str, port: Option<u16>, status: ServiceStatus) -> ServiceInfo {
        ServiceInfo {
            id: id.to_string(),
            name: id.to_string(),
            image: "postgres:16".to_string(),
            status,
            port,
            service_type: "database".to_string(),
            group: None,
            managed: true,
            pending_operation: None,
            logs: None,
        }
    }

    fn docker() -> DockersState {
        let mut docker = DockersState::default();
        set_services(
            &mut docker,
            vec![
                svc("db", Some(5432), ServiceStatus::Stopped),
                svc("other-db", Some(5432), ServiceStatus::Running),
                svc("cache", Some(6379), ServiceStatus::Stopped),
            ],
        );
        docker
    }

    #[test]
    fn start_without_collision_queues_operation() {
        let mut docker = docker();
        start(&mut docker, "cache").unwrap();
        assert_eq!(
            docker.service("cache").unwrap().pending_operation,
            Some(ServiceOperation::Start)
        );
        assert!(docker.pending_conflict.is_none());
    }

    #[test]
    fn start_with_collision_raises_conflict() {
        let mut docker = docker();
        start(&mut docker, "db").unwrap();
        let conflict = docker.pending_conflict.as_ref().unwrap();
        assert_eq!(conflict.requested_port, 5432);
        assert_eq!(conflict.suggested_port, 5433);
        assert_eq!(conflict.conflicting_container.id, "other-db");
        assert!(docker.service("db").unwrap().pending_operation.is_none());
    }

    #[test]
    fn start_is_refused_when_no_port_is_free() {
        let mut docker = DockersState::default();
        set_services(
            &mut docker,
            vec![
                svc("edge", Some(65535), ServiceStatus::Stopped),
                svc("proxy", Some(65535), ServiceStatus::Running),
            ],
        );
        let err = start(&mut docker, "edge").unwrap_err();
        assert!(err.contains("no free port"));
        assert!(docker.pending_conflict.is_none());
        assert!(docker.service("edge").unwrap().pending_operation.is_none());
    }

    #[test]
    fn second_conflict_is_ignored() {
        let mut docker = docker();
        start(&mut docker, "db").unwrap();
        let first = docker.pending_conflict.clone();
        set_port_conflict(
            &mut docker,
            PortConflict {
                service_id: "cache".to_string(),
                requested_port: 6379,
                suggested_port: 6380,
                conflicting_container: ConflictingContainer {
                    id: "x".to_string(),
                    name: "x".to_string(),
                },
            },
        )
        .unwrap();
        assert_eq!(docker.pending_conflict, first);
    }

    #[test]
    fn resolve_with_suggested_port_sets_override() {
        let mut docker = docker();
        start(&mut docker, "db").unwrap();
        resolve_port_conflict(&mut docker, "db", &ConflictResolution::UseSuggestedPort).unwrap();
        assert!(docker.pending_conflict.is_none());
        assert_eq!(docker.port_overrides.get("db"), Some(&5433));
        assert_eq!(
            docker.service("db").unwrap().pending_operation,
            Some(ServiceOperation::Start)
        );
    }

    #[test]
    fn resolve_for_other_service_is_noop() {
        let mut docker = docker();
        start(&mut docker, "db").unwrap();
        let before = docker.clone();
        resolve_port_conflict(&mut docker, "cache", &ConflictResolution::UseSuggestedPort)
            .unwrap();
        assert_eq!(docker, before);
    }

    #[test]
    fn custom_port_collision_keeps_conflict() {
        let mut docker = docker();
        start(&mut docker, "db").unwrap();
        let err = resolve_port_conflict(
            &mut docker,
            "db",
            &ConflictResolution::UseCustomPort { port: 5432 },
        )
        .unwrap_err();
        assert!(err.contains("5432"));
        assert!(docker.pending_conflict.is_some());
    }

    #[test]
    fn stop_conflicting_container_queues_both() {
        let mut docker = docker();
        start(&mut docker, "db").unwrap();
        resolve_port_conflict(
            &mut docker,
            "db",
            &ConflictResolution::StopConflictingContainer,
        )
        .unwrap();
        assert_eq!(
            docker.service("other-db").unwrap().pending_operation,
            Some(ServiceOperation::Stop)
        );
        assert_eq!(
            docker.service("db").unwrap().pending_operation,
            Some(ServiceOperation::Start)
        );
    }

    #[test]
    fn refresh_keeps_in_flight_state_and_prunes_vanished() {
        let mut docker = docker();
        queue(&mut docker, "cache", ServiceOperation::Restart).unwrap();
        docker.port_overrides.insert("db".to_string(), 5440);
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        set_logs(&mut docker, "cache", "ready", at);
        docker.refreshing = true;

        set_services(&mut docker, vec![svc("cache", Some(6379), ServiceStatus::Running)]);
        let cache = docker.service("cache").unwrap();
        assert_eq!(cache.pending_operation, Some(ServiceOperation::Restart));
        assert_eq!(cache.logs.as_ref().unwrap().content, "ready");
        assert!(docker.port_overrides.is_empty());
        assert!(!docker.refreshing);
    }

    #[test]
    fn busy_service_rejects_second_operation() {
        let mut docker = docker();
        queue(&mut docker, "cache", ServiceOperation::Stop).unwrap();
        assert!(queue(&mut docker, "cache", ServiceOperation::Restart).is_err());
        operation_finished(&mut docker, "cache");
        assert!(docker.service("cache").unwrap().pending_operation.is_none());
    }
}
