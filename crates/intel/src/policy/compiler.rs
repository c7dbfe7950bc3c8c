//! Compiles the governance policy plus engine signals into the
//! deterministic system instruction consumed by the generation service.
//!
//! Compilation is pure: the same policy, score, node count, and opacity
//! always produce byte-identical text, and the fingerprint makes that
//! auditable after the fact.

use sha2::{Digest, Sha256};

use crate::core::EdgeOpacity;
use crate::policy::config::{ConfigError, PolicyConfig, ProfileSpec};

/// Score at or below which the instruction escalates to a systemic
/// failure narrative.
const MELTDOWN_THRESHOLD: u8 = 15;

const SEMANTIC_GUARDRAILS: &str = "\
SEMANTIC GUARDRAILS:
1. Never assert the absence of a security control without direct evidence of absence.
2. Never name a vendor or provider unless it appears verbatim in the evidence.
3. Frame every exploitation path as a hypothesis, never as established fact.
4. Label any service identified only by port heuristics as unverified.";

const TABLE_RULES: &str = "\
TABLE FORMATTING RULES:
1. Every Markdown table row MUST end with '|'.
2. Table rationales max 2 sentences.
3. No spacing-based column alignment.";

const OPACITY_DISCLAIMER: &str = "\
SCORING DISCLAIMER:
Under intentional opacity the score is floored, not earned. Do not present \
concealed posture as verified strength, and do not present it as hidden weakness.";

/// Rendered instruction text plus a content fingerprint for audit
/// trails. Never persisted alongside raw identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPrompt {
    pub text: String,
    pub fingerprint: String,
}

pub struct PolicyCompiler<'a> {
    config: &'a PolicyConfig,
}

impl<'a> PolicyCompiler<'a> {
    pub fn new(config: &'a PolicyConfig) -> Self {
        Self { config }
    }

    pub fn select_tone(&self, score: u8, edge_opacity: EdgeOpacity) -> &'static str {
        if !self.config.strategic_metrics.tone_binding {
            return "Neutral advisory tone.";
        }
        if edge_opacity == EdgeOpacity::High {
            return "Opaque Posture: report on the limits of external verification, \
                    not on assumed weakness.";
        }
        if score >= 80 {
            "Defensive Excellence: focus on micro-optimizations."
        } else if score >= 50 {
            "Developing Posture: highlight missing hardening."
        } else {
            "Critical Exposure: demand foundational remediation."
        }
    }

    pub fn recommendation_limit(&self, score: u8) -> u32 {
        let policy = &self.config.recommendation_policy;
        if score >= 80 {
            policy.max_if_high_maturity
        } else if score >= 50 {
            policy.max_if_medium_maturity
        } else {
            policy.max_if_low_maturity
        }
    }

    /// Looks up the configured active profile and compiles it. A missing
    /// profile is a fatal configuration error, not recoverable at
    /// runtime.
    pub fn compile_active(
        &self,
        score: u8,
        node_count: usize,
        edge_opacity: EdgeOpacity,
    ) -> Result<CompiledPrompt, ConfigError> {
        let profile = self.config.active_profile_spec()?;
        Ok(self.compile(profile, score, node_count, edge_opacity))
    }

    pub fn compile(
        &self,
        profile: &ProfileSpec,
        score: u8,
        node_count: usize,
        edge_opacity: EdgeOpacity,
    ) -> CompiledPrompt {
        let audit_mode = if node_count <= 1 {
            "surgical single-node audit".to_string()
        } else {
            format!("fleet-wide posture review across {node_count} nodes")
        };

        let mut text = format!(
            "ROLE: {}\nFOCUS: {}\nFORMAT: {}\n\nAUDIT MODE: {}\n\n",
            profile.role, profile.focus, profile.format, audit_mode
        );

        if score <= MELTDOWN_THRESHOLD {
            text.push_str(
                "ESCALATION: Maturity is in meltdown range. Treat every observation \
                 as part of a single systemic failure narrative and order remediation \
                 by dependency, not by severity.\n\n",
            );
        }

        text.push_str(SEMANTIC_GUARDRAILS);
        text.push_str("\n\nGOVERNANCE CONSTRAINTS:\n");
        text.push_str(&self.render_constraints());
        text.push_str("\n\nEVIDENCE POLICY:\n");
        text.push_str(&self.render_evidence_policy());
        text.push_str(&format!(
            "\n\nSTRATEGIC CONTEXT: {}\nINFRASTRUCTURE MATURITY SCORE: {}/100\n\n\
             RECOMMENDATION LIMIT:\n- Maximum recommendations per finding: {}\n\n",
            self.select_tone(score, edge_opacity),
            score,
            self.recommendation_limit(score)
        ));
        text.push_str(TABLE_RULES);
        text.push_str("\n\n");
        text.push_str(OPACITY_DISCLAIMER);
        text.push('\n');

        let fingerprint = hex::encode(Sha256::digest(text.as_bytes()));
        CompiledPrompt { text, fingerprint }
    }

    fn render_constraints(&self) -> String {
        self.config
            .ai_constraints
            .iter()
            .map(|(key, value)| {
                format!("- {}: {}", key.replace('_', " ").to_uppercase(), value)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_evidence_policy(&self) -> String {
        let evidence = &self.config.evidence_policy;
        format!(
            "- Allowed Evidence Levels: {}\n- Manual Validation Required: {}",
            evidence.allowed_levels.join(", "),
            evidence.require_manual_validation_notice
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::config::EXAMPLE_CONFIG;

    fn config() -> PolicyConfig {
        serde_yaml::from_str(EXAMPLE_CONFIG).unwrap()
    }

    #[test]
    fn tone_follows_score_tiers() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);
        assert!(compiler
            .select_tone(85, EdgeOpacity::Low)
            .starts_with("Defensive Excellence"));
        assert!(compiler
            .select_tone(60, EdgeOpacity::Low)
            .starts_with("Developing Posture"));
        assert!(compiler
            .select_tone(20, EdgeOpacity::Low)
            .starts_with("Critical Exposure"));
    }

    #[test]
    fn high_opacity_overrides_score_tone() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);
        assert!(compiler
            .select_tone(95, EdgeOpacity::High)
            .starts_with("Opaque Posture"));
        assert!(compiler
            .select_tone(10, EdgeOpacity::High)
            .starts_with("Opaque Posture"));
    }

    #[test]
    fn disabled_tone_binding_is_neutral() {
        let mut config = config();
        config.strategic_metrics.tone_binding = false;
        let compiler = PolicyCompiler::new(&config);
        assert_eq!(
            compiler.select_tone(10, EdgeOpacity::High),
            "Neutral advisory tone."
        );
    }

    #[test]
    fn recommendation_limits_follow_tiers() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);
        assert_eq!(compiler.recommendation_limit(90), 1);
        assert_eq!(compiler.recommendation_limit(65), 3);
        assert_eq!(compiler.recommendation_limit(30), 5);
    }

    #[test]
    fn compilation_is_reproducible() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);
        let first = compiler.compile_active(45, 1, EdgeOpacity::Low).unwrap();
        let second = compiler.compile_active(45, 1, EdgeOpacity::Low).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.fingerprint.len(), 64);
    }

    #[test]
    fn different_scores_change_the_fingerprint() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);
        let low = compiler.compile_active(20, 1, EdgeOpacity::Low).unwrap();
        let high = compiler.compile_active(90, 1, EdgeOpacity::Low).unwrap();
        assert_ne!(low.fingerprint, high.fingerprint);
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);
        let prompt = compiler.compile_active(45, 3, EdgeOpacity::Low).unwrap();

        let positions: Vec<usize> = [
            "ROLE:",
            "AUDIT MODE:",
            "SEMANTIC GUARDRAILS:",
            "GOVERNANCE CONSTRAINTS:",
            "EVIDENCE POLICY:",
            "STRATEGIC CONTEXT:",
            "INFRASTRUCTURE MATURITY SCORE: 45/100",
            "RECOMMENDATION LIMIT:",
            "TABLE FORMATTING RULES:",
            "SCORING DISCLAIMER:",
        ]
        .iter()
        .map(|section| prompt.text.find(section).expect(section))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(prompt.text.contains("fleet-wide posture review across 3 nodes"));
    }

    #[test]
    fn meltdown_clause_appears_only_at_meltdown_scores() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);

        let meltdown = compiler.compile_active(15, 1, EdgeOpacity::Low).unwrap();
        assert!(meltdown.text.contains("ESCALATION: Maturity is in meltdown range"));
        assert!(meltdown.text.contains("surgical single-node audit"));

        let developing = compiler.compile_active(16, 1, EdgeOpacity::Low).unwrap();
        assert!(!developing.text.contains("ESCALATION:"));
    }

    #[test]
    fn missing_profile_fails_fast() {
        let mut config = config();
        config.active_profile = "absent".to_string();
        let compiler = PolicyCompiler::new(&config);
        assert!(matches!(
            compiler.compile_active(50, 1, EdgeOpacity::Low),
            Err(ConfigError::MissingProfile(_))
        ));
    }

    #[test]
    fn constraints_render_upper_spaced() {
        let config = config();
        let compiler = PolicyCompiler::new(&config);
        let prompt = compiler.compile_active(50, 1, EdgeOpacity::Low).unwrap();
        assert!(prompt.text.contains("- NO SPECULATION:"));
        assert!(prompt.text.contains("- NO REMEDIATION COMMANDS:"));
    }
}
