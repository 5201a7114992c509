use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Exited,
    Restarting,
    Paused,
    Created,
    #[default]
    Unknown,
}

impl ServiceStatus {
    /// Maps the `State` column reported by `docker ps`.
    pub fn from_docker_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "running" => ServiceStatus::Running,
            "exited" | "dead" => ServiceStatus::Exited,
            "restarting" => ServiceStatus::Restarting,
            "paused" => ServiceStatus::Paused,
            "created" => ServiceStatus::Created,
            "stopped" | "removing" => ServiceStatus::Stopped,
            _ => ServiceStatus::Unknown,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::Restarting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOperation {
    Start,
    Stop,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceLogs {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ServiceStatus,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(rename = "type", default)]
    pub service_type: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub pending_operation: Option<ServiceOperation>,
    #[serde(default)]
    pub logs: Option<ServiceLogs>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingContainer {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConflict {
    pub service_id: String,
    pub requested_port: u16,
    pub suggested_port: u16,
    pub conflicting_container: ConflictingContainer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictResolution {
    UseSuggestedPort,
    UseCustomPort { port: u16 },
    StopConflictingContainer,
}

impl ConflictResolution {
    /// Whether resolving frees the port by stopping the other container.
    pub fn stops_conflicting(&self) -> bool {
        matches!(self, ConflictResolution::StopConflictingContainer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DockersState {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceInfo>,
    #[serde(default)]
    pub pending_conflict: Option<PortConflict>,
    #[serde(default)]
    pub port_overrides: BTreeMap<String, u16>,
    #[serde(default)]
    pub refreshing: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl DockersState {
    pub fn service(&self, service_id: &str) -> Option<&ServiceInfo> {
        self.services.get(service_id)
    }

    pub fn has_pending_conflict_for(&self, service_id: &str) -> bool {
        self.pending_conflict
            .as_ref()
            .is_some_and(|c| c.service_id == service_id)
    }
}
