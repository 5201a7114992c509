use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use std::path::{Path, PathBuf};

use crate::store::{persistence, SessionFormat};

#[derive(ClapArgs)]
pub struct Args {
    /// Session file to read (JSON or YAML)
    pub input: PathBuf,

    /// Destination; the extension picks the format
    pub output: PathBuf,
}

/// Re-encodes `input` into `output`, returning both formats.
fn convert(input: &Path, output: &Path) -> Result<(SessionFormat, SessionFormat)> {
    if input == output {
        bail!("Input and output are the same file: {:?}", input);
    }
    let state = persistence::load(input)
        .with_context(|| format!("Failed to load session file: {:?}", input))?;
    persistence::save(output, &state)
        .with_context(|| format!("Failed to write session file: {:?}", output))?;
    Ok((SessionFormat::from_path(input), SessionFormat::from_path(output)))
}

pub async fn execute(args: Args) -> Result<()> {
    let (from, to) = convert(&args.input, &args.output)?;
    println!(
        "Converted {} ({}) -> {} ({})",
        args.input.display(),
        from,
        args.output.display(),
        to
    );
    Ok(())
}
