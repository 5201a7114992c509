use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use std::path::{Path, PathBuf};

use crate::config::Config;

#[derive(ClapArgs)]
pub struct Args {
    /// Session file to delete (defaults to the configured one)
    #[arg(short, long)]
    pub session: Option<PathBuf>,
}

/// Deletes the session file and any leftover temp file from an interrupted
/// save. Returns whether a session existed.
async fn reset_session(path: &Path) -> Result<bool> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if tokio::fs::try_exists(&tmp).await.unwrap_or(false) {
        tokio::fs::remove_file(&tmp)
            .await
            .with_context(|| format!("Failed to remove {:?}", tmp))?;
    }

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(false);
    }
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("Failed to remove session file: {:?}", path))?;
    Ok(true)
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let config = match args.session {
        Some(session) => config.with_session_file(session),
        None => config,
    };
    let path = config.session_file;
    if reset_session(&path).await? {
        tracing::info!("Removed session {}", path.display());
        println!("Session reset: {}", path.display());
    } else {
        println!("No session at {}", path.display());
    }
    Ok(())
}
