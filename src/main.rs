use anyhow::Result;
use clap::Parser;

mod action;
mod cli;
mod collaborators;
mod commands;
mod config;
mod explorer;
mod logging;
mod models;
mod reducer;
mod runtime;
mod scheduler;
mod services;
mod store;
mod utils;
mod workflow;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.clone())?;
    if let Some(log_dir) = cli.log_dir.clone() {
        config = config.with_log_dir(log_dir);
    }
    let _log_guard = logging::init(config.log_dir.as_deref())?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, config).await,
        Commands::Inspect(args) => commands::inspect::execute(args).await,
        Commands::Convert(args) => commands::convert::execute(args).await,
        Commands::Reset(args) => commands::reset::execute(args, config).await,
    }
}
