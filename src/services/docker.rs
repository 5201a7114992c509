use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::collaborators::{CollaboratorError, CollaboratorResult};
use crate::models::{ServiceInfo, ServiceStatus};

const LABEL_TYPE: &str = "devdeck.type";
const LABEL_GROUP: &str = "devdeck.group";
const LABEL_MANAGED: &str = "devdeck.managed";

#[async_trait::async_trait]
pub trait ContainerManager: Send + Sync {
    async fn list(&self) -> CollaboratorResult<Vec<ServiceInfo>>;

    /// Starts a container; `port` is the host port the caller resolved.
    async fn start(&self, id: &str, port: Option<u16>) -> CollaboratorResult<()>;

    async fn stop(&self, id: &str) -> CollaboratorResult<()>;

    async fn restart(&self, id: &str) -> CollaboratorResult<()>;

    async fn logs(&self, id: &str, tail: usize) -> CollaboratorResult<String>;
}

/// Drives the local `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names", default)]
    names: String,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Ports", default)]
    ports: String,
    #[serde(rename = "Labels", default)]
    labels: String,
}

fn host_port_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    // "0.0.0.0:5432->5432/tcp" or "[::]:5432->5432/tcp"
    PATTERN
        .get_or_init(|| Regex::new(r":(\d+)->").ok())
        .as_ref()
}

fn parse_labels(raw: &str) -> BTreeMap<&str, &str> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

fn parse_host_port(ports: &str) -> Option<u16> {
    host_port_pattern()?
        .captures(ports)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl PsLine {
    fn into_service(self) -> ServiceInfo {
        let labels = parse_labels(&self.labels);
        let service_type = labels
            .get(LABEL_TYPE)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "container".to_string());
        let group = labels.get(LABEL_GROUP).map(|s| s.to_string());
        let managed = labels
            .get(LABEL_MANAGED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let name = self
            .names
            .split(',')
            .next()
            .unwrap_or_default()
            .to_string();

        ServiceInfo {
            port: parse_host_port(&self.ports),
            status: ServiceStatus::from_docker_state(&self.state),
            id: self.id,
            name,
            image: self.image,
            service_type,
            group,
            managed,
            pending_operation: None,
            logs: None,
        }
    }
}

pub(crate) fn parse_ps_output(output: &str) -> CollaboratorResult<Vec<ServiceInfo>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<PsLine>(line)
                .map(PsLine::into_service)
                .map_err(|e| CollaboratorError::parse("docker ps", e.to_string()))
        })
        .collect()
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> CollaboratorResult<Vec<u8>> {
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CollaboratorError::spawn(&self.program, e))?;
        if !output.status.success() {
            return Err(CollaboratorError::failed(
                format!("{} {}", self.program, args.first().unwrap_or(&"")),
                output.status,
                &output.stderr,
            ));
        }
        Ok(output.stdout)
    }
}

#[async_trait::async_trait]
impl ContainerManager for DockerCli {
    async fn list(&self) -> CollaboratorResult<Vec<ServiceInfo>> {
        let stdout = self
            .run(&["ps", "-a", "--no-trunc", "--format", "{{json .}}"])
            .await?;
        parse_ps_output(&String::from_utf8_lossy(&stdout))
    }

    async fn start(&self, id: &str, port: Option<u16>) -> CollaboratorResult<()> {
        if let Some(port) = port {
            // `docker start` reuses the container's original bindings.
            tracing::debug!("Starting {} (requested host port {})", id, port);
        }
        self.run(&["start", id]).await.map(|_| ())
    }

    async fn stop(&self, id: &str) -> CollaboratorResult<()> {
        self.run(&["stop", id]).await.map(|_| ())
    }

    async fn restart(&self, id: &str) -> CollaboratorResult<()> {
        self.run(&["restart", id]).await.map(|_| ())
    }

    async fn logs(&self, id: &str, tail: usize) -> CollaboratorResult<String> {
        let tail = tail.to_string();
        let output = Command::new(&self.program)
            .args(["logs", "--tail", &tail, id])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CollaboratorError::spawn(&self.program, e))?;
        if !output.status.success() {
            return Err(CollaboratorError::failed(
                format!("{} logs", self.program),
                output.status,
                &output.stderr,
            ));
        }
        // Containers log to both streams.
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PS: &str = r#"{"ID":"abc123","Image":"postgres:16","Labels":"devdeck.type=database,devdeck.group=backend,devdeck.managed=true","Names":"db","Ports":"0.0.0.0:5432->5432/tcp, [::]:5432->5432/tcp","State":"running","Status":"Up 2 hours"}
{"ID":"def456","Image":"redis:7","Labels":"","Names":"cache,cache-alias","Ports":"","State":"exited","Status":"Exited (0) 3 days ago"}
"#;

    #[test]
    fn parses_ps_json_lines() {
        let services = parse_ps_output(PS).unwrap();
        assert_eq!(services.len(), 2);

        let db = &services[0];
        assert_eq!(db.id, "abc123");
        assert_eq!(db.name, "db");
        assert_eq!(db.port, Some(5432));
        assert_eq!(db.status, ServiceStatus::Running);
        assert_eq!(db.service_type, "database");
        assert_eq!(db.group.as_deref(), Some("backend"));
        assert!(db.managed);

        let cache = &services[1];
        assert_eq!(cache.name, "cache");
        assert_eq!(cache.port, None);
        assert_eq!(cache.status, ServiceStatus::Exited);
        assert_eq!(cache.service_type, "container");
        assert!(!cache.managed);
    }

    #[test]
    fn malformed_line_is_a_parse_error() {
        let err = parse_ps_output("not json").unwrap_err();
        assert!(matches!(err, CollaboratorError::Parse { .. }));
    }

    #[test]
    fn host_port_from_ipv6_binding() {
        assert_eq!(parse_host_port("[::]:8080->80/tcp"), Some(8080));
        assert_eq!(parse_host_port("80/tcp"), None);
    }
}
