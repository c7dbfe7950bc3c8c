use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use thiserror::Error;
use tracing::warn;

use vantage_intel::calculate_vms;
use vantage_intel::core::{AnalysisRecord, MaturityLabel, VmsResult};
use vantage_intel::llm::OpenAIProvider;
use vantage_intel::pipeline::{ProbeRunner, ReportPipeline, ScanMode};
use vantage_intel::policy::PolicyConfig;
use vantage_intel::registry::{
    SessionChoice, SessionDecision, SessionSignal, SessionStore,
};

#[derive(Debug, Error)]
#[error("raw socket access requires root; rerun with privileges")]
pub struct PrivilegeError;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Working directory holding registry, reports, and config.
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Governance policy document.
    #[arg(long, default_value = "config/ai_profile.json")]
    pub policy: PathBuf,

    /// External scan engine binary.
    #[arg(long, default_value = "bin/vantage-probe")]
    pub probe: PathBuf,

    /// Correlated analysis emitted by the logic engine.
    #[arg(long, default_value = "output/analysis_summary.json")]
    pub analysis: PathBuf,

    /// Restrict the probe to a single diagnostic port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Follow the baseline scan with high-speed enumeration.
    #[arg(long)]
    pub fuzz: bool,

    /// Reuse existing probe output instead of scanning.
    #[arg(long)]
    pub skip_probe: bool,
}

/// Interactive side of the session handshake.
struct StdinDecision;

impl SessionDecision for StdinDecision {
    fn resume_or_new(&self) -> SessionChoice {
        loop {
            match ask("[?] Existing registry found. (R)esume or (N)ew session? ") {
                Some(answer) if answer == "r" => return SessionChoice::Resume,
                Some(answer) if answer == "n" => return SessionChoice::New,
                Some(_) => println!("{} Invalid selection.", "[-]".yellow()),
                // Unreadable stdin: take the non-destructive path.
                None => return SessionChoice::Resume,
            }
        }
    }

    fn run_immediately(&self) -> bool {
        matches!(
            ask("[?] Pipeline all resumed targets now? (y/n): ").as_deref(),
            Some("y")
        )
    }
}

fn ask(prompt: &str) -> Option<String> {
    print!("{prompt}");
    io::stdout().flush().ok()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).ok()?;
    Some(line.trim().to_lowercase())
}

pub async fn execute(args: RunArgs) -> Result<()> {
    if !args.skip_probe && !nix::unistd::geteuid().is_root() {
        return Err(PrivilegeError.into());
    }

    let policy_path = args.base_dir.join(&args.policy);
    let mut policy = PolicyConfig::from_json_file(&policy_path)
        .with_context(|| format!("failed to load policy {}", policy_path.display()))?;

    // One-time credential capture, persisted before the pipeline proper
    // begins. The policy is immutable from here on.
    if policy.api_configuration.api_key.trim().is_empty() {
        if let Ok(key) = std::env::var("VANTAGE_API_KEY") {
            policy.api_configuration.api_key = key;
        } else if let Some(key) = ask("[?] Enter generation API key: ") {
            policy.api_configuration.api_key = key;
            policy.save_json(&policy_path).context("failed to persist API key")?;
            println!("{} API key saved to config.", "[+]".green());
        }
    }

    let store = SessionStore::open(&args.base_dir);
    let signal = store
        .resume_or_new(&StdinDecision)
        .context("session handshake failed")?;

    match signal {
        SessionSignal::New => {
            if store.load_targets().context("registry read failed")?.is_empty() {
                println!(
                    "{} Fresh session with no targets. Register some with `vantage add` first.",
                    "[*]".blue()
                );
                return Ok(());
            }
        }
        SessionSignal::Resumed => {
            println!("{} Session resumed; rerun when ready to pipeline.", "[+]".green());
            return Ok(());
        }
        SessionSignal::RunNow => {}
    }

    if !args.skip_probe {
        let runner = ProbeRunner::new(args.base_dir.join(&args.probe));
        let mode = match args.port {
            Some(port) => ScanMode::SinglePort(port),
            None => ScanMode::Full,
        };
        let exit = runner
            .run(store.csv_path(), mode)
            .context("scan engine invocation failed")?;
        if exit != 0 {
            warn!(exit, "scan engine exited non-zero; continuing best-effort");
        }

        if args.fuzz {
            println!("{} Launching high-speed enumeration...", "[*]".blue());
            runner
                .run(store.csv_path(), ScanMode::Enumeration)
                .context("enumeration invocation failed")?;
        }
    }

    println!("\n{}", "[*] STARTING SURGICAL INTELLIGENCE LAYER".cyan().bold());

    let analysis_path = args.base_dir.join(&args.analysis);
    let analysis_text = fs::read_to_string(&analysis_path)
        .with_context(|| format!("analysis file missing at {}", analysis_path.display()))?;
    let record: AnalysisRecord =
        serde_json::from_str(&analysis_text).context("analysis file is not valid JSON")?;

    let vms = calculate_vms(&record);
    store
        .record_score(vms.score)
        .context("failed to persist score")?;
    display_gauge(&vms);

    let node_count = store
        .load_targets()
        .context("registry read failed")?
        .len()
        .max(1);

    let provider = OpenAIProvider::new(&policy.api_configuration)
        .context("generation backend unavailable")?;
    let reports_dir = args.base_dir.join("reports");
    let pipeline = ReportPipeline::new(&policy, Arc::new(provider), reports_dir);

    let artifact = pipeline
        .run(&analysis_text, &vms, node_count)
        .await
        .context("intelligence reporting failed")?;

    println!(
        "\n{} Final intelligence report lodged in: {}",
        "[+]".green().bold(),
        artifact.path.display()
    );
    Ok(())
}

fn display_gauge(vms: &VmsResult) {
    let width = 20usize;
    let filled = (usize::from(vms.score) * width) / 100;
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(width - filled));
    let label = vms.label();
    let line = format!("[{bar}] {}/100 ({label})", vms.score);
    let colored_line = match label {
        MaturityLabel::Excellent => line.green(),
        MaturityLabel::Developing => line.yellow(),
        MaturityLabel::Critical => line.red(),
    };

    println!("\n{}", "Infrastructure Maturity Assessment (VMS)".bold());
    println!("{colored_line}");
    for finding in &vms.findings {
        println!("  └─ {finding}");
    }
}
