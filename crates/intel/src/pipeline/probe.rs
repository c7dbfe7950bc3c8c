use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use colored::Colorize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("scan engine binary not found at {0}")]
    MissingBinary(PathBuf),

    #[error("scan engine I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Aggressive discovery across all registered targets.
    Full,
    /// Targeted diagnostic against one port.
    SinglePort(u16),
    /// High-speed secondary enumeration.
    Enumeration,
}

/// Invokes the external scan engine against the registry and streams its
/// stdout line by line. The engine owns all probing; this side only
/// decorates the stream and propagates the exit code.
pub struct ProbeRunner {
    binary: PathBuf,
}

impl ProbeRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Blocks until the engine exits. A non-zero exit code is returned,
    /// not raised; only a missing binary is fatal.
    pub fn run(&self, registry_csv: &Path, mode: ScanMode) -> Result<i32, ProbeError> {
        if !self.binary.exists() {
            return Err(ProbeError::MissingBinary(self.binary.clone()));
        }

        let mut command = Command::new(&self.binary);
        command.arg("--registry").arg(registry_csv);
        match mode {
            ScanMode::Full => {}
            ScanMode::SinglePort(port) => {
                command.arg("--port").arg(port.to_string());
            }
            ScanMode::Enumeration => {
                command.arg("--fuzz");
            }
        }

        info!(binary = %self.binary.display(), ?mode, "launching scan engine");

        let mut child = command.stdout(Stdio::piped()).spawn()?;
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                echo_line(line?.trim_end());
            }
        }

        let status = child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }
}

fn echo_line(line: &str) {
    let lower = line.to_lowercase();
    if lower.contains("open port") {
        println!("    {} {}", "[PORT FOUND]".green().bold(), line);
    } else if lower.contains("os detected") || lower.contains("os details") {
        println!("    {} {}", "OS DETECTED:".cyan().bold(), line);
    } else {
        println!("  > {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_fatal_before_invocation() {
        let runner = ProbeRunner::new("/definitely/not/here/vantage-probe");
        let result = runner.run(Path::new("targets.csv"), ScanMode::Full);
        assert!(matches!(result, Err(ProbeError::MissingBinary(_))));
    }
}
