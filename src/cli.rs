use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{convert, inspect, reset, run};

#[derive(Parser)]
#[command(name = "devdeck")]
#[command(about = "devdeck - Single-state workspace for projects, services and AI-assisted changes")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $DEVDECK_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write daily-rotated logs to this directory
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Host the runtime and read JSON actions from stdin
    Run(run::Args),

    /// Summarize a session file and check its invariants
    Inspect(inspect::Args),

    /// Re-encode a session file between JSON and YAML
    Convert(convert::Args),

    /// Delete the saved session
    Reset(reset::Args),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_with_global_config() {
        let cli = Cli::try_parse_from([
            "devdeck",
            "run",
            "--config",
            "/tmp/devdeck.yaml",
            "--no-poll",
            "--follow",
            "--log-dir",
            "/tmp/devdeck-logs",
            "--open",
            "/work/a",
            "--open",
            "/work/b",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/devdeck.yaml")));
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/devdeck-logs")));
        match cli.command {
            Commands::Run(args) => {
                assert!(args.no_poll);
                assert!(args.follow);
                assert!(!args.emit_state);
                assert_eq!(args.open.len(), 2);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn cli_parses_convert_and_inspect() {
        let cli = Cli::try_parse_from(["devdeck", "convert", "a.json", "b.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Convert(_)));

        let cli = Cli::try_parse_from(["devdeck", "inspect", "a.json", "--json"]).unwrap();
        match cli.command {
            Commands::Inspect(args) => assert!(args.json),
            _ => panic!("expected inspect"),
        }
    }

    #[test]
    fn cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["devdeck"]).is_err());
    }
}
