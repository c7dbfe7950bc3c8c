//! Deterministic infrastructure maturity scoring (VMS).
//!
//! ## Design Philosophy: Score What You Can Verify
//!
//! The engine is a pure function from one analysis record to a bounded
//! score with justifications. No network, no AI inference, no hidden
//! state: identical input always yields an identical result, which is
//! what makes the score auditable.
//!
//! Evaluation order matters and is fixed, because later steps depend on
//! the opacity classification made first:
//!
//! 1. Classify edge opacity. A non-fingerprintable edge (tcpwrapped on
//!    most common ports with no banners) is `High`; a declared
//!    reverse-proxy posture is `Medium`; everything else is `Low` and
//!    takes a direct-exposure deduction.
//! 2. Deduct for weak defensive density, but only at low opacity. Behind
//!    an opaque edge the origin is not visible, so internal density
//!    cannot be judged at all.
//! 3. Raise confidence-gated critical flags, again only at low opacity.
//!    A database exposed on its well-known port is asserted outright; a
//!    remote-execution surface is asserted only when the service naming
//!    is trustworthy. Heuristic-only attribution downgrades to an
//!    "unverified" note rather than a flag.
//! 4. Cap the score by the worst verified flag (caps combine by minimum).
//! 5. Apply the opacity floor. Concealment must not be rewarded with a
//!    low maturity score merely because nothing was observable.
//! 6. Clamp to 0..=100.

use crate::core::{AnalysisRecord, EdgeOpacity, VmsResult};

/// Ports whose combined presence under tcpwrapped suggests a deliberately
/// opaque edge. Matched as substrings of the ports field, so "8080" also
/// satisfies a lone "80" probe.
const COMMON_EDGE_PORTS: [&str; 4] = ["53", "80", "443", "8080"];

/// Service names the probe reports when it could not positively identify
/// what is listening.
const LOW_CONFIDENCE_SERVICES: [&str; 4] = ["ppp", "unknown", "rpcbind", "tcpwrapped"];

/// Application ports that commonly front remotely exploitable stacks.
const ELEVATED_APP_PORTS: [&str; 3] = ["3000", "8080", "8081"];

const DATABASE_EXPOSURE_CAP: i32 = 45;
const RCE_SURFACE_CAP: i32 = 35;

pub fn calculate_vms(analysis: &AnalysisRecord) -> VmsResult {
    let mut score: i32 = 100;
    let mut findings: Vec<String> = Vec::new();

    let services_lower = analysis.services.to_lowercase();
    let ports = analysis.ports.as_str();

    let tcpwrapped = services_lower.contains("tcpwrapped");
    let common_port_hits = COMMON_EDGE_PORTS
        .iter()
        .filter(|p| ports.contains(*p))
        .count();
    let high_opacity_edge =
        tcpwrapped && common_port_hits >= 3 && analysis.banners.trim().is_empty();

    let edge_opacity = if high_opacity_edge {
        findings.push(
            "High Edge Opacity Detected: non-fingerprintable edge surface".to_string(),
        );
        EdgeOpacity::High
    } else if analysis.is_edge_protected {
        findings.push("Edge / Reverse-Proxy Abstraction Detected".to_string());
        EdgeOpacity::Medium
    } else {
        score -= 25;
        findings.push("Direct Exposure: No Edge Protection (-25)".to_string());
        EdgeOpacity::Low
    };

    let mut exposed_database = false;
    let mut probable_rce_surface = false;

    if edge_opacity == EdgeOpacity::Low {
        let density = analysis.density_percent();
        if density == 0.0 {
            score -= 15;
            findings.push("No Defensive Tooling Observed (-15)".to_string());
        } else if density < 50.0 {
            score -= 8;
            findings.push("Sparse Defensive Coverage (-8)".to_string());
        }

        let parsed = analysis.parsed_services();
        let has_low_confidence_service = parsed
            .iter()
            .any(|s| LOW_CONFIDENCE_SERVICES.contains(&s.as_str()));

        if services_lower.contains("mongodb") || ports.contains("27017") {
            exposed_database = true;
            findings.push("CRITICAL: Database Service Directly Exposed".to_string());
        }

        let elevated_port_hit = ELEVATED_APP_PORTS.iter().any(|p| ports.contains(*p));
        if elevated_port_hit {
            if has_low_confidence_service {
                findings.push(
                    "Unverified Service Attribution: heuristic naming on elevated ports"
                        .to_string(),
                );
            } else {
                probable_rce_surface = true;
                findings.push(
                    "HIGH: Probable Remote Code Execution Surface".to_string(),
                );
            }
        }
    }

    let mut score_cap: i32 = 100;
    if exposed_database {
        score_cap = score_cap.min(DATABASE_EXPOSURE_CAP);
    }
    if probable_rce_surface {
        score_cap = score_cap.min(RCE_SURFACE_CAP);
    }

    let mut final_score = score.min(score_cap);
    if let Some(floor) = edge_opacity.score_floor() {
        final_score = final_score.max(i32::from(floor));
    }

    VmsResult {
        score: final_score.clamp(0, 100) as u8,
        findings,
        edge_opacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        ports: &str,
        services: &str,
        banners: &str,
        is_edge_protected: bool,
        defensive_density: &str,
    ) -> AnalysisRecord {
        AnalysisRecord {
            ports: ports.to_string(),
            services: services.to_string(),
            banners: banners.to_string(),
            is_edge_protected,
            defensive_density: defensive_density.to_string(),
        }
    }

    #[test]
    fn edge_protected_target_scores_clean() {
        let result = calculate_vms(&record("80,443", "https", "", true, ""));
        assert_eq!(result.edge_opacity, EdgeOpacity::Medium);
        assert_eq!(result.score, 100);
        assert_eq!(
            result.findings,
            vec!["Edge / Reverse-Proxy Abstraction Detected"]
        );
    }

    #[test]
    fn exposed_database_caps_the_score() {
        let result = calculate_vms(&record("27017", "mongodb", "", false, "0%"));
        assert_eq!(result.edge_opacity, EdgeOpacity::Low);
        // -25 direct exposure, -15 no density, then capped at 45.
        assert_eq!(result.score, 45);
        assert!(result
            .findings
            .iter()
            .any(|f| f.starts_with("CRITICAL: Database Service")));
    }

    #[test]
    fn tcpwrapped_common_ports_without_banners_is_high_opacity() {
        let result = calculate_vms(&record("53,80,443,8080", "tcpwrapped", "", false, ""));
        assert_eq!(result.edge_opacity, EdgeOpacity::High);
        assert_eq!(result.score, 100);
        assert!(result.findings[0].starts_with("High Edge Opacity Detected"));
    }

    #[test]
    fn scoring_is_deterministic() {
        let input = record("22,8080", "ssh,node", "OpenSSH 8.9", false, "30%");
        let first = calculate_vms(&input);
        let second = calculate_vms(&input);
        assert_eq!(first, second);
    }

    #[test]
    fn score_stays_in_range_for_hostile_input() {
        let inputs = [
            record("", "", "", false, ""),
            record("27017,3000", "mongodb,node", "", false, "0%"),
            record(&"9".repeat(4096), &"x,".repeat(512), "", false, "-12%"),
            record("80", "http", "", false, "banana%"),
        ];
        for input in &inputs {
            let result = calculate_vms(input);
            assert!(result.score <= 100, "ports: {:?}", input.ports);
        }
    }

    #[test]
    fn opacity_floors_hold() {
        let high = calculate_vms(&record("53,80,443", "tcpwrapped", "", false, "0%"));
        assert_eq!(high.edge_opacity, EdgeOpacity::High);
        assert!(high.score >= 70);

        let medium = calculate_vms(&record("443", "tcpwrapped", "", true, "0%"));
        assert_eq!(medium.edge_opacity, EdgeOpacity::Medium);
        assert!(medium.score >= 60);
    }

    #[test]
    fn low_confidence_service_never_raises_rce_flag() {
        // Elevated port evidence, but the only service attribution is
        // heuristic. Banners are non-empty so this stays out of the
        // high-opacity branch.
        let result = calculate_vms(&record("8080", "tcpwrapped", "filtered", false, "0%"));
        assert_eq!(result.edge_opacity, EdgeOpacity::Low);
        assert!(result
            .findings
            .iter()
            .any(|f| f.starts_with("Unverified Service Attribution")));
        assert!(!result
            .findings
            .iter()
            .any(|f| f.contains("Remote Code Execution")));
        // -25 exposure, -15 density, no cap.
        assert_eq!(result.score, 60);
    }

    #[test]
    fn verified_elevated_port_raises_rce_flag_and_cap() {
        let result = calculate_vms(&record("3000", "node", "Express", false, "80%"));
        assert_eq!(result.edge_opacity, EdgeOpacity::Low);
        assert!(result
            .findings
            .iter()
            .any(|f| f.contains("Remote Code Execution")));
        // -25 exposure only, then capped at 35.
        assert_eq!(result.score, 35);
    }

    #[test]
    fn sparse_density_takes_the_smaller_deduction() {
        let result = calculate_vms(&record("22", "ssh", "OpenSSH", false, "30%"));
        // -25 exposure, -8 sparse density.
        assert_eq!(result.score, 67);
        assert!(result
            .findings
            .iter()
            .any(|f| f.contains("Sparse Defensive Coverage")));
    }

    #[test]
    fn port_matching_is_substring_based() {
        // "8080" satisfies both the "80" and "8080" probes. Documented
        // behavior, pinned here so a rewrite does not silently change it.
        let result = calculate_vms(&record("8080", "tcpwrapped", "", false, ""));
        // Two common-port hits is below the high-opacity threshold of three.
        assert_eq!(result.edge_opacity, EdgeOpacity::Low);
    }

    #[test]
    fn both_caps_combine_via_minimum() {
        let result = calculate_vms(&record("27017,3000", "mongodb,node", "x", false, "90%"));
        // Database cap 45, RCE cap 35: the lower one wins, no stacking.
        assert_eq!(result.score, 35);
    }
}
