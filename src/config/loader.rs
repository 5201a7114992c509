use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};
use crate::store::InvariantPolicy;

fn default_session_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devdeck")
        .join("session.json")
}

fn default_poll_interval_ms() -> u64 {
    2_500
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_ai_command() -> String {
    "claude".to_string()
}

fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Daily-rotated log files go here when set.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    #[serde(default = "default_ai_command")]
    pub ai_command: String,
    /// Extra arguments passed to every AI invocation, after the prompt.
    #[serde(default)]
    pub ai_args: Vec<String>,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default)]
    pub invariant_policy: Option<InvariantPolicy>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
            poll_interval_ms: default_poll_interval_ms(),
            log_dir: None,
            docker_bin: default_docker_bin(),
            ai_command: default_ai_command(),
            ai_args: Vec::new(),
            shell: default_shell(),
            invariant_policy: None,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        if path.exists() {
            Self::from_file(&path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    pub fn default_config_path() -> PathBuf {
        if let Some(config_path) = std::env::var_os("DEVDECK_CONFIG") {
            PathBuf::from(config_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("devdeck")
                .join("config.yaml")
        }
    }

    pub fn with_session_file(mut self, session_file: PathBuf) -> Self {
        self.session_file = session_file;
        self
    }

    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn with_log_dir(mut self, log_dir: PathBuf) -> Self {
        self.log_dir = Some(log_dir);
        self
    }

    pub fn with_invariant_policy(mut self, policy: InvariantPolicy) -> Self {
        self.invariant_policy = Some(policy);
        self
    }

    /// The configured interval, kept inside the supported polling window.
    pub fn clamped_poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
    }

    pub fn policy(&self) -> InvariantPolicy {
        self.invariant_policy.unwrap_or_default()
    }
}
