use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{add::AddArgs, run::RunArgs, status::StatusArgs};
use vantage_intel::policy::ConfigError;
use vantage_intel::registry::RegistryError;

#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "Policy-governed external posture assessment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register new scan targets.
    Add(AddArgs),

    /// Run the full pipeline: handshake, probe, score, report.
    Run(RunArgs),

    /// Inspect the registry session state.
    Status(StatusArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Add(args) => commands::add::execute(args),
        Commands::Status(args) => commands::status::execute(args),
        Commands::Run(args) => match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime.block_on(commands::run::execute(args)),
            Err(e) => Err(e.into()),
        },
    };

    if let Err(error) = outcome {
        eprintln!("{} {error:#}", "[!]".red().bold());
        std::process::exit(exit_code(&error));
    }
}

/// 0 on graceful completion, 30 when another live process holds the
/// registry, 2 for configuration or privilege failures, 1 otherwise.
fn exit_code(error: &anyhow::Error) -> i32 {
    if matches!(
        error.downcast_ref::<RegistryError>(),
        Some(RegistryError::LockHeld { .. })
    ) {
        return 30;
    }
    if error.downcast_ref::<ConfigError>().is_some()
        || error.downcast_ref::<commands::run::PrivilegeError>().is_some()
    {
        return 2;
    }
    1
}
