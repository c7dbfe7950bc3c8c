//! Post-generation cleanup.
//!
//! Generation backends repeat advisory markers, duplicate notice blocks,
//! emit runaway horizontal rules, and break their own tables. This pass
//! repairs all of that without weakening any governance constraint, and
//! rewrites exploitability assertions against low-confidence services
//! into qualified language.

use once_cell::sync::Lazy;
use regex::Regex;

const ADVISORY_NOTICE: &str =
    "> **NOTICE:** Findings are advisory and require manual validation before remediation.";

static ADVISORY_SPAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:ONLY_ADVISORY[_ ]?){3,}").expect("advisory pattern"));

static NOTICE_SPAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:> \*\*NOTICE:\*\* Findings are advisory and require manual validation before remediation\.\n?){2,}",
    )
    .expect("notice pattern")
});

static RULE_SPAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n-{10,}\n").expect("rule pattern"));

static BROKEN_RATIONALE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|\s*Rationale\s*\(\s*\|").expect("rationale pattern"));

static LOW_CONFIDENCE_ASSERTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:ppp|rpcbind|unknown)\b.*?(?:exploitable|vulnerable|dangerous)")
        .expect("assertion pattern")
});

static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" {5,}").expect("space pattern"));

static TRAILING_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\z").expect("trailing pattern"));

/// Full cleanup pass applied to generated text before persistence.
pub fn normalize_output(text: &str) -> String {
    let text = collapse_governance_noise(text);
    let text = repair_markdown_tables(&text);
    let text = qualify_low_confidence_assertions(&text);
    let text = SPACE_RUNS.replace_all(&text, " ");
    TRAILING_WHITESPACE.replace(&text, "\n").into_owned()
}

fn collapse_governance_noise(text: &str) -> String {
    let text = ADVISORY_SPAM.replace_all(text, "ONLY_ADVISORY");
    let text = NOTICE_SPAM.replace_all(&text, format!("{ADVISORY_NOTICE}\n"));
    RULE_SPAM.replace_all(&text, "\n---\n").into_owned()
}

/// Rewrites hard assertions about services the probe could not identify
/// into qualified language. Never assert exploitability from heuristic
/// naming.
fn qualify_low_confidence_assertions(text: &str) -> String {
    LOW_CONFIDENCE_ASSERTION
        .replace_all(text, "an unverified service with indeterminate risk")
        .into_owned()
}

/// Ensures every table row both starts and ends with a delimiter and
/// synthesizes a separator row under the first header row of each table.
fn repair_markdown_tables(text: &str) -> String {
    let text = BROKEN_RATIONALE_HEADER.replace_all(text, "| Rationale |");

    let mut fixed: Vec<String> = Vec::new();
    let mut header_seen = false;

    for line in text.lines() {
        if line.trim_start().starts_with('|') {
            let mut row = line.trim_end().to_string();
            if !row.ends_with('|') {
                row.push_str(" |");
            }

            if !header_seen {
                let col_count = row.matches('|').count().saturating_sub(1);
                fixed.push(row);
                fixed.push(format!("|{}", " --- |".repeat(col_count)));
                header_seen = true;
                continue;
            }
            fixed.push(row);
        } else {
            header_seen = false;
            fixed.push(line.to_string());
        }
    }

    fixed.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_spam_collapses() {
        let out = normalize_output("ONLY_ADVISORY ONLY_ADVISORY ONLY_ADVISORY ONLY_ADVISORY done");
        assert_eq!(out, "ONLY_ADVISORYdone");
    }

    #[test]
    fn duplicate_notice_blocks_deduplicate() {
        let input = format!(
            "report body\n{0}\n{0}\n{0}\n",
            "> **NOTICE:** Findings are advisory and require manual validation before remediation."
        );
        let out = normalize_output(&input);
        assert_eq!(out.matches("**NOTICE:**").count(), 1);
    }

    #[test]
    fn runaway_rules_become_standard_rules() {
        let out = normalize_output("above\n---------------\nbelow");
        assert!(out.contains("\n---\n"));
        assert!(!out.contains("----------"));
    }

    #[test]
    fn rows_gain_trailing_delimiters() {
        let out = normalize_output("| Port | State |\n| 443 | open");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "| Port | State |");
        assert_eq!(lines[1], "| --- | --- |");
        assert_eq!(lines[2], "| 443 | open |");
    }

    #[test]
    fn separator_is_synthesized_per_table() {
        let input = "| A | B |\n| 1 | 2 |\n\ntext\n\n| C | D |\n| 3 | 4 |";
        let out = normalize_output(input);
        assert_eq!(out.matches("| --- | --- |").count(), 2);
    }

    #[test]
    fn broken_rationale_header_is_repaired() {
        let out = normalize_output("| Rationale ( | other |");
        assert!(out.starts_with("| Rationale |"));
    }

    #[test]
    fn low_confidence_exploitability_is_qualified() {
        let out = normalize_output("The rpcbind endpoint is clearly exploitable today.");
        assert!(out.contains("an unverified service with indeterminate risk"));
        assert!(!out.contains("clearly exploitable"));
    }

    #[test]
    fn qualification_does_not_cross_lines() {
        let out = normalize_output("unknown service noted.\nThe portal is vulnerable.");
        assert!(out.contains("The portal is vulnerable."));
    }

    #[test]
    fn space_runs_collapse_and_output_ends_with_newline() {
        let out = normalize_output("a        b   c   ");
        assert_eq!(out, "a b   c\n");
    }
}
