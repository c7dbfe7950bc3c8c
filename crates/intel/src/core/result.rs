use serde::{Deserialize, Serialize};
use std::fmt;

/// How much an intervening layer (proxy/CDN/filtering) hides the true
/// origin. `Low` means the origin is directly visible, `Medium` means
/// protected but attributable, `High` means deliberately
/// non-fingerprintable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeOpacity {
    Low,
    Medium,
    High,
}

impl fmt::Display for EdgeOpacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl EdgeOpacity {
    /// Minimum score an opaque target can be assigned. Concealment is not
    /// scored as weakness, so opaque postures get a floor rather than a
    /// deduction.
    pub fn score_floor(&self) -> Option<u8> {
        match self {
            Self::High => Some(70),
            Self::Medium => Some(60),
            Self::Low => None,
        }
    }
}

/// Deterministic infrastructure maturity score with its justifications.
/// Immutable once computed; scoring the same input twice yields an
/// identical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmsResult {
    pub score: u8,
    pub findings: Vec<String>,
    pub edge_opacity: EdgeOpacity,
}

impl VmsResult {
    pub fn label(&self) -> MaturityLabel {
        MaturityLabel::for_score(self.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaturityLabel {
    Excellent,
    Developing,
    Critical,
}

impl MaturityLabel {
    pub fn for_score(score: u8) -> Self {
        if score >= 80 {
            Self::Excellent
        } else if score >= 50 {
            Self::Developing
        } else {
            Self::Critical
        }
    }
}

impl fmt::Display for MaturityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "EXCELLENT"),
            Self::Developing => write!(f, "DEVELOPING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
