use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("active profile '{0}' not found in policy profiles")]
    MissingProfile(String),

    #[error("could not read policy document: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed policy document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed policy document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Governance policy for report generation. Loaded once per run and
/// treated as immutable for the duration of a pipeline execution; the
/// compiler borrows it rather than reading any process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_active_profile")]
    pub active_profile: String,

    pub profiles: HashMap<String, ProfileSpec>,

    /// Ordered so the compiled prompt is byte-reproducible.
    #[serde(default)]
    pub ai_constraints: BTreeMap<String, String>,

    #[serde(default)]
    pub evidence_policy: EvidencePolicy,

    #[serde(default)]
    pub recommendation_policy: RecommendationPolicy,

    #[serde(default)]
    pub strategic_metrics: StrategicMetrics,

    #[serde(default)]
    pub api_configuration: ApiConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub role: String,
    pub focus: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidencePolicy {
    pub allowed_levels: Vec<String>,
    pub require_manual_validation_notice: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationPolicy {
    pub max_if_high_maturity: u32,
    pub max_if_medium_maturity: u32,
    pub max_if_low_maturity: u32,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            max_if_high_maturity: 1,
            max_if_medium_maturity: 3,
            max_if_low_maturity: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategicMetrics {
    pub tone_binding: bool,
}

impl Default for StrategicMetrics {
    fn default() -> Self {
        Self { tone_binding: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfiguration {
    pub api_key: String,
    pub model_name: String,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ApiConfiguration {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_name: default_model_name(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            base_url: None,
        }
    }
}

fn default_active_profile() -> String {
    "strategic_architect".to_string()
}

fn default_model_name() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_top_p() -> f32 {
    0.95
}

impl PolicyConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn active_profile_spec(&self) -> Result<&ProfileSpec, ConfigError> {
        self.profiles
            .get(&self.active_profile)
            .ok_or_else(|| ConfigError::MissingProfile(self.active_profile.clone()))
    }
}

pub const EXAMPLE_CONFIG: &str = r#"
# Vantage governance policy

active_profile: strategic_architect

profiles:
  strategic_architect:
    role: "Strategic security architect advising an executive audience"
    focus: "Externally observable posture, maturity trajectory, and remediation sequencing"
    format: "Markdown with summary tables, one section per observation class"

ai_constraints:
  no_speculation: "Report only what the evidence supports"
  no_remediation_commands: "Describe remediation direction, never shell commands"

evidence_policy:
  allowed_levels:
    - observed
    - corroborated
  require_manual_validation_notice: true

recommendation_policy:
  max_if_high_maturity: 1
  max_if_medium_maturity: 3
  max_if_low_maturity: 5

strategic_metrics:
  tone_binding: true

api_configuration:
  model_name: gpt-4o
  temperature: 0.2
  top_p: 0.95
  # api_key: sk-...  # Optional, may be captured on first run instead
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_parses() {
        let config: PolicyConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.active_profile, "strategic_architect");
        assert!(config.active_profile_spec().is_ok());
        assert!(config.strategic_metrics.tone_binding);
        assert_eq!(config.recommendation_policy.max_if_low_maturity, 5);
    }

    #[test]
    fn minimal_document_fills_defaults() {
        let config: PolicyConfig = serde_json::from_str(
            r#"{"profiles": {"strategic_architect": {"role": "r", "focus": "f", "format": "m"}}}"#,
        )
        .unwrap();
        assert_eq!(config.active_profile, "strategic_architect");
        assert_eq!(config.recommendation_policy.max_if_medium_maturity, 3);
        assert_eq!(config.api_configuration.model_name, "gpt-4o");
        assert!(config.api_configuration.api_key.is_empty());
    }

    #[test]
    fn missing_active_profile_is_a_config_error() {
        let config: PolicyConfig = serde_json::from_str(
            r#"{"active_profile": "ghost", "profiles": {"other": {"role": "r", "focus": "f", "format": "m"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            config.active_profile_spec(),
            Err(ConfigError::MissingProfile(name)) if name == "ghost"
        ));
    }

    #[test]
    fn json_round_trip_preserves_constraint_order() {
        let config: PolicyConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let reparsed: PolicyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(
            config.ai_constraints.keys().collect::<Vec<_>>(),
            reparsed.ai_constraints.keys().collect::<Vec<_>>()
        );
    }
}
