//! Pipeline orchestration.
//!
//! The ordering here is a hard contract: compile → redact → generate →
//! scrub → persist, non-reentrant per target. Generation never receives
//! un-redacted analysis, and nothing is persisted before the
//! post-generation re-scrub passes.

mod probe;
mod progress;

pub use probe::{ProbeError, ProbeRunner, ScanMode};
pub use progress::{estimate_for_payload, ProgressTicker};

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::core::VmsResult;
use crate::llm::{with_retries, GenerationProvider, GenerationRequest, RetryPolicy};
use crate::policy::{ConfigError, PolicyCompiler, PolicyConfig};
use crate::privacy::{self, PrivacyViolation};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Privacy(#[from] PrivacyViolation),

    #[error("report generation failed: {0}")]
    Generation(#[from] crate::llm::GenerationError),

    #[error("report persistence failed: {0}")]
    Io(#[from] std::io::Error),
}

/// The persisted report plus the audit handle for the instruction that
/// produced it.
#[derive(Debug)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub content: String,
    pub prompt_fingerprint: String,
}

pub struct ReportPipeline<'a> {
    policy: &'a PolicyConfig,
    provider: Arc<dyn GenerationProvider>,
    retry: RetryPolicy,
    report_dir: PathBuf,
}

impl<'a> ReportPipeline<'a> {
    pub fn new(
        policy: &'a PolicyConfig,
        provider: Arc<dyn GenerationProvider>,
        report_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            policy,
            provider,
            retry: RetryPolicy::standard(),
            report_dir: report_dir.into(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generates, scrubs, and persists one intelligence report.
    pub async fn run(
        &self,
        analysis_text: &str,
        vms: &VmsResult,
        node_count: usize,
    ) -> Result<ReportArtifact, PipelineError> {
        let compiler = PolicyCompiler::new(self.policy);
        let prompt = compiler.compile_active(vms.score, node_count, vms.edge_opacity)?;

        let payload = privacy::redact(analysis_text);
        // Fail closed before anything reaches the generation service.
        privacy::assert_clean(&payload)?;

        info!(
            score = vms.score,
            opacity = %vms.edge_opacity,
            node_count,
            fingerprint = %prompt.fingerprint,
            "dispatching generation request"
        );

        let ticker = ProgressTicker::start(estimate_for_payload(payload.lines().count()));
        let outcome = with_retries(&self.retry, || {
            let request = GenerationRequest {
                system_instruction: prompt.text.clone(),
                payload: format!("ANONYMIZED INFRASTRUCTURE DATA:\n{payload}"),
                temperature: self.policy.api_configuration.temperature,
                top_p: self.policy.api_configuration.top_p,
            };
            let provider = Arc::clone(&self.provider);
            async move { provider.generate(request).await }
        })
        .await;
        // Joined on every path; a late or wedged spinner must never leak.
        ticker.finish().await;
        let response = outcome?;

        let body = response.content.trim();
        if body.is_empty() {
            return Err(crate::llm::GenerationError::EmptyResponse.into());
        }

        let normalized = privacy::normalize_output(body);

        // The backend can echo identifiers it invented; scrub its output
        // exactly like ours before anything touches disk.
        let clean_body = privacy::redact(&normalized);
        privacy::assert_clean(&clean_body)?;

        // Footer goes on after the scrub: its HH:MM:SS time component
        // fits the IPv6 shape and would otherwise be rewritten.
        let clean = format!(
            "{}{}",
            clean_body.trim_end(),
            report_footer(Utc::now())
        );

        fs::create_dir_all(&self.report_dir)?;
        let path = self
            .report_dir
            .join(format!("vantage_report_{}.md", Utc::now().timestamp()));
        fs::write(&path, &clean)?;

        info!(path = %path.display(), "intelligence report lodged");

        Ok(ReportArtifact {
            path,
            content: clean,
            prompt_fingerprint: prompt.fingerprint,
        })
    }
}

fn report_footer(now: DateTime<Utc>) -> String {
    format!(
        "\n\n---\n*Generated by {} {} | {}*\n\
         > **NOTICE:** Findings are advisory and require manual validation before remediation.",
        crate::TOOL_NAME,
        crate::TOOL_VERSION,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}
