use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::action::Action;
use crate::config::Config;
use crate::models::AppState;
use crate::runtime::{Dispatcher, Runtime};
use crate::scheduler::Collaborators;
use crate::store::{InvariantPolicy, Store, StoreError};
use crate::utils::compute_path_hash;

#[derive(ClapArgs)]
pub struct Args {
    /// Session file to restore and save (defaults to the configured one)
    #[arg(short, long)]
    pub session: Option<PathBuf>,

    /// Do not poll containers in the background
    #[arg(long)]
    pub no_poll: bool,

    /// Container poll interval in milliseconds (clamped to 2000..=3000)
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Repair broken invariants instead of panicking, even in debug builds
    #[arg(long)]
    pub repair: bool,

    /// Print the committed state after every reply
    #[arg(long)]
    pub emit_state: bool,

    /// Stream every committed snapshot, including background job results
    #[arg(long)]
    pub follow: bool,

    /// Open a project directory before reading actions
    #[arg(long = "open", value_name = "DIR")]
    pub open: Vec<PathBuf>,
}

#[derive(Serialize)]
struct StateLine<'a> {
    state: &'a AppState,
}

/// One stdin line as a wire action. Blank lines and `#` comments are skipped.
fn parse_line(line: &str) -> Option<Result<serde_json::Value, String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line).map_err(|e| format!("Invalid JSON: {e}")))
}

fn reply(result: Result<(), String>) -> String {
    match result {
        Ok(()) => serde_json::json!({ "ok": true }).to_string(),
        Err(error) => serde_json::json!({ "error": error }).to_string(),
    }
}

/// `AddProject` for `dir`, keyed by a hash of its absolute path, unless a
/// project is already open there.
fn open_project_action(dir: &Path, state: &AppState) -> Option<Action> {
    let abs = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let path = abs.to_string_lossy().to_string();
    if state.projects.iter().any(|p| p.path == path) {
        return None;
    }
    let name = abs
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.clone());
    Some(Action::AddProject {
        id: compute_path_hash(&abs),
        name,
        path,
        main_branch: "main".to_string(),
    })
}

/// Folds the command-line overrides into the loaded config.
fn apply_overrides(args: &Args, mut config: Config) -> Config {
    if let Some(session) = &args.session {
        config = config.with_session_file(session.clone());
    }
    if let Some(interval) = args.poll_interval {
        config = config.with_poll_interval_ms(interval);
    }
    if args.repair {
        config = config.with_invariant_policy(InvariantPolicy::Repair);
    }
    config
}

fn prepare_store(config: &Config) -> Store {
    let mut store = Store::open(config.session_file.clone(), config.policy());

    let interval = config.clamped_poll_interval_ms();
    if store.state().settings.poll_interval_ms != interval {
        let mut settings = store.state().settings.clone();
        settings.poll_interval_ms = interval;
        store.dispatch(&Action::UpdateSettings { settings });
    }
    store
}

/// Opens each directory through the runtime so the scheduler sees the new
/// projects. Directories that are already open are skipped.
async fn open_projects(dispatcher: &Dispatcher, dirs: &[PathBuf]) -> Result<usize, StoreError> {
    let mut opened = 0;
    for dir in dirs {
        let state = dispatcher.snapshot().await?;
        if let Some(action) = open_project_action(dir, &state) {
            tracing::info!("Opening project {}", dir.display());
            dispatcher.dispatch(action).await?;
            opened += 1;
        }
    }
    Ok(opened)
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let config = apply_overrides(&args, config);
    let store = prepare_store(&config);
    let collaborators = Collaborators::system(
        &config.docker_bin,
        &config.ai_command,
        &config.ai_args,
        &config.shell,
    );
    let mut runtime = Runtime::new(store, collaborators);
    if args.no_poll {
        runtime = runtime.without_polling();
    }
    let (dispatcher, handle) = runtime.spawn();
    open_projects(&dispatcher, &args.open).await?;

    let printer = if args.follow {
        let mut subscription = dispatcher.subscribe().await?;
        let id = subscription.id;
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.receiver.recv().await {
                match serde_json::to_string(&StateLine { state: snapshot.as_ref() }) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::error!("Could not encode snapshot: {}", e),
                }
            }
        });
        Some((id, task))
    } else {
        None
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    tracing::debug!("stdin closed");
                    break;
                };
                let Some(parsed) = parse_line(&line) else {
                    continue;
                };
                let result = match parsed {
                    Ok(value) => dispatcher.dispatch_json(value).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e),
                };
                println!("{}", reply(result));
                if args.emit_state {
                    let state = dispatcher.state().await?;
                    println!("{}", serde_json::json!({ "state": state }));
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    // Detach the printer first so every snapshot it already holds is flushed.
    if let Some((id, task)) = printer {
        dispatcher.unsubscribe(id);
        let _ = dispatcher.snapshot().await;
        if let Err(e) = task.await {
            tracing::warn!("State printer failed: {}", e);
        }
    }
    if let Err(e) = dispatcher.shutdown().await {
        tracing::warn!("Runtime was already stopped: {}", e);
    }
    handle.await.context("Runtime task failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::reducer::reduce;
    use crate::scheduler::fakes::Fakes;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn parse_line_skips_blanks_and_comments() {
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# warm-up").is_none());
        assert!(parse_line(r#"{"type":"ClearError"}"#).unwrap().is_ok());
        let err = parse_line("{nope").unwrap().unwrap_err();
        assert!(err.starts_with("Invalid JSON"));
    }

    #[test]
    fn replies_are_single_json_lines() {
        assert_eq!(reply(Ok(())), r#"{"ok":true}"#);
        assert_eq!(
            reply(Err("Unknown action: Teleport".to_string())),
            r#"{"error":"Unknown action: Teleport"}"#
        );
    }

    #[test]
    fn open_project_uses_a_stable_id_and_skips_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("shop");
        std::fs::create_dir(&dir).unwrap();

        let action = open_project_action(&dir, &AppState::default()).unwrap();
        let Action::AddProject { id, name, .. } = &action else {
            panic!("expected AddProject, got {:?}", action);
        };
        assert_eq!(id.len(), 8);
        assert_eq!(id, &compute_path_hash(&dir));
        assert_eq!(name, "shop");

        let state = reduce(AppState::default(), &action);
        assert!(open_project_action(&dir, &state).is_none());
    }

    fn args(extra: &[&str]) -> Args {
        let cli = Cli::try_parse_from(["devdeck", "run"].iter().chain(extra)).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn overrides_replace_configured_values() {
        let config = apply_overrides(
            &args(&["--session", "/tmp/s.yaml", "--poll-interval", "2000", "--repair"]),
            Config::default(),
        );
        assert_eq!(config.session_file, PathBuf::from("/tmp/s.yaml"));
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.policy(), InvariantPolicy::Repair);

        let untouched = apply_overrides(&args(&[]), Config::default());
        assert_eq!(untouched, Config::default());
    }

    #[test]
    fn prepare_store_applies_config_interval() {
        let temp_dir = TempDir::new().unwrap();
        let session = temp_dir.path().join("session.json");
        let config = apply_overrides(
            &args(&["--session", session.to_str().unwrap(), "--poll-interval", "9000"]),
            Config::default(),
        );
        let store = prepare_store(&config);
        assert_eq!(store.state().settings.poll_interval_ms, 3_000);
        assert_eq!(store.session_file(), Some(session.as_path()));
    }

    #[tokio::test]
    async fn open_projects_goes_through_the_runtime_once_per_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("shop");
        std::fs::create_dir(&dir).unwrap();

        let fakes = Fakes::default();
        let (dispatcher, _handle) = Runtime::new(Store::default(), fakes.collaborators())
            .without_polling()
            .spawn();

        let opened = open_projects(&dispatcher, &[dir.clone(), dir.clone()])
            .await
            .unwrap();
        assert_eq!(opened, 1);

        let state = dispatcher.state().await.unwrap();
        assert_eq!(state["projects"].as_array().unwrap().len(), 1);
        assert_eq!(state["projects"][0]["id"], compute_path_hash(&dir));
    }
}
