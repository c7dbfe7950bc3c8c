use serde::{Deserialize, Serialize};

/// One target's correlated analysis, as emitted by the external
/// correlator. Treated as untrusted input: every field may be absent and
/// defaults to its most conservative value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisRecord {
    pub ports: String,
    pub services: String,
    pub banners: String,
    pub is_edge_protected: bool,
    pub defensive_density: String,
}

impl AnalysisRecord {
    /// Service names split out of the comma-separated services field,
    /// lowercased and trimmed.
    pub fn parsed_services(&self) -> Vec<String> {
        self.services
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Defensive density as a percentage. Strips a trailing `%`, parses
    /// the leading numeric token, and treats anything unparsable as 0.
    pub fn density_percent(&self) -> f64 {
        let trimmed = self.defensive_density.trim();
        let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        let token: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        token.parse().unwrap_or(0.0)
    }
}
