use std::collections::{BTreeMap, BTreeSet};

use crate::models::{DockersState, ServiceInfo};

pub const MIN_PORT: u16 = 1024;
pub const MAX_PORT: u16 = 65535;

/// Keys an incoming service list by id, keeping the first of any duplicates.
pub fn normalize_services(services: Vec<ServiceInfo>) -> BTreeMap<String, ServiceInfo> {
    let mut out = BTreeMap::new();
    for service in services {
        out.entry(service.id.clone()).or_insert(service);
    }
    out
}

/// The port a service binds: its override if one is set, else its declared port.
pub fn effective_port(state: &DockersState, service_id: &str) -> Option<u16> {
    state
        .port_overrides
        .get(service_id)
        .copied()
        .or_else(|| state.services.get(service_id).and_then(|s| s.port))
}

/// Another running service already bound to `port`, if any.
pub fn find_port_collision<'a>(
    state: &'a DockersState,
    service_id: &str,
    port: u16,
) -> Option<&'a ServiceInfo> {
    state.services.values().find(|other| {
        other.id != service_id
            && other.status.is_running()
            && effective_port(state, &other.id) == Some(port)
    })
}

/// First port above `requested` that no known service uses.
pub fn suggest_port(state: &DockersState, requested: u16) -> Option<u16> {
    let taken: BTreeSet<u16> = state
        .services
        .keys()
        .filter_map(|id| effective_port(state, id))
        .collect();
    let start = requested.saturating_add(1).max(MIN_PORT);
    (start..=MAX_PORT).find(|port| !taken.contains(port) && *port != requested)
}

/// Services bucketed by their `group` label; ungrouped ones sit under `None`.
pub fn group_services(state: &DockersState) -> BTreeMap<Option<&str>, Vec<&ServiceInfo>> {
    let mut groups: BTreeMap<Option<&str>, Vec<&ServiceInfo>> = BTreeMap::new();
    for service in state.services.values() {
        groups
            .entry(service.group.as_deref())
            .or_default()
            .push(service);
    }
    groups
}
