use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use vantage_intel::registry::{SessionState, SessionStore};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Working directory holding registry, reports, and config.
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,
}

pub fn execute(args: StatusArgs) -> Result<()> {
    let store = SessionStore::open(&args.base_dir);

    match store.inspect_state() {
        SessionState::New => {
            println!("{} No registry session exists yet.", "[*]".blue());
        }
        SessionState::Healthy => {
            let rows = store.load_targets().context("registry read failed")?;
            println!(
                "{} Registry verified: {} targets on record.",
                "[+]".green(),
                rows.len()
            );
            for row in rows {
                println!(
                    "    {}  {}  {}  score={}",
                    row.id, row.input_value, row.scope_status, row.score
                );
            }
        }
        SessionState::Corrupted => {
            println!(
                "{} Registry corruption detected. Run `vantage run` to reinitialize.",
                "[!]".red().bold()
            );
        }
    }

    Ok(())
}
