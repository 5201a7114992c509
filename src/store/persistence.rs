use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{AppState, STATE_VERSION};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is neither valid JSON ({json}) nor valid YAML ({yaml})")]
    Parse {
        path: PathBuf,
        json: String,
        yaml: String,
    },

    #[error("Failed to encode session as {format}: {message}")]
    Encode {
        format: SessionFormat,
        message: String,
    },
}

/// On-disk encoding, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFormat {
    Json,
    Yaml,
}

impl std::fmt::Display for SessionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionFormat::Json => write!(f, "json"),
            SessionFormat::Yaml => write!(f, "yaml"),
        }
    }
}

impl SessionFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => SessionFormat::Yaml,
            _ => SessionFormat::Json,
        }
    }

    pub fn encode(self, state: &AppState) -> Result<String, PersistenceError> {
        let encoded = match self {
            SessionFormat::Json => serde_json::to_string_pretty(state).map_err(|e| e.to_string()),
            SessionFormat::Yaml => serde_yaml::to_string(state).map_err(|e| e.to_string()),
        };
        encoded.map_err(|message| PersistenceError::Encode {
            format: self,
            message,
        })
    }
}

/// Parses a snapshot, trying JSON first and YAML second.
pub fn decode(path: &Path, text: &str) -> Result<AppState, PersistenceError> {
    let json = match serde_json::from_str::<AppState>(text) {
        Ok(state) => return Ok(state),
        Err(e) => e.to_string(),
    };
    serde_yaml::from_str::<AppState>(text).map_err(|e| PersistenceError::Parse {
        path: path.to_path_buf(),
        json,
        yaml: e.to_string(),
    })
}

/// Reads a snapshot. A schema version other than the current one is
/// reported but still loaded.
pub fn load(path: &Path) -> Result<AppState, PersistenceError> {
    let text = std::fs::read_to_string(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut state = decode(path, &text)?;
    if state.version != STATE_VERSION {
        tracing::warn!(
            "{} was written with state version {}, expected {}",
            path.display(),
            state.version,
            STATE_VERSION
        );
        state.version = STATE_VERSION;
    }
    Ok(state)
}

/// Writes a snapshot through a sibling temp file and a rename, so readers
/// never observe a half-written session.
pub fn save(path: &Path, state: &AppState) -> Result<(), PersistenceError> {
    let content = SessionFormat::from_path(path).encode(state)?;
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PersistenceError::Write { path, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err(parent))?;
    }
    let tmp_path = temp_path(path);
    std::fs::write(&tmp_path, content).map_err(write_err(&tmp_path))?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_err(path)(e));
    }
    tracing::debug!("Saved session to {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "session".into());
    name.push(".tmp");
    path.with_file_name(name)
}
