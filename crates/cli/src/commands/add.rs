use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use vantage_intel::registry::{NewTarget, SessionStore};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Targets to register: addresses or hostnames, comma lists allowed.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// File with one target per line. Blank lines and '#' comments skipped.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Working directory holding registry, reports, and config.
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,
}

pub fn execute(args: AddArgs) -> Result<()> {
    let mut values: Vec<String> = Vec::new();

    for raw in &args.targets {
        values.extend(
            raw.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from),
        );
    }

    if let Some(path) = &args.file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read target file {}", path.display()))?;
        values.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }

    if values.is_empty() {
        println!("{} No targets supplied; nothing registered.", "[-]".yellow());
        return Ok(());
    }

    let entries: Vec<NewTarget> = values
        .into_iter()
        .enumerate()
        .map(|(i, input_value)| NewTarget {
            name: format!("T_{i}"),
            input_value,
        })
        .collect();

    // append_targets creates and seals a missing registry under its lock.
    let store = SessionStore::open(&args.base_dir);
    let registered = store
        .append_targets(&entries)
        .context("target registration failed")?;

    println!(
        "{} Successfully registered {} targets.",
        "[+]".green(),
        registered
    );
    Ok(())
}
