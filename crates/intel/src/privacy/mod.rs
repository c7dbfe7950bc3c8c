//! Zero-knowledge boundary.
//!
//! No raw network identifier and no named infrastructure vendor may
//! cross into the generation service or the final artifact. [`redact`]
//! rewrites outgoing text, [`assert_clean`] re-scans and fails closed,
//! and [`normalize_output`] cleans up what the model sends back.

mod normalize;

pub use normalize::normalize_output;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Placeholder the generation service sees in place of any address. The
/// compiled instruction tells the model these tokens must not be
/// resolved.
pub const NODE_TOKEN: &str = "T_0";

static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 pattern"));

static IPV6: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9a-fA-F]{0,4}:){2,7}[0-9a-fA-F]{0,4}\b").expect("ipv6 pattern")
});

static VENDOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:cloudflare|akamai|fastly|imperva|aws|azure|gcp)\b")
        .expect("vendor pattern")
});

#[derive(Debug, Error)]
#[error("zero-knowledge violation: {0}")]
pub struct PrivacyViolation(pub String);

/// Replaces every IPv4- and IPv6-shaped token with [`NODE_TOKEN`] and
/// every whole-word vendor/CDN name with a generic phrase.
pub fn redact(text: &str) -> String {
    let text = IPV4.replace_all(text, NODE_TOKEN);
    let text = IPV6.replace_all(&text, NODE_TOKEN);
    VENDOR
        .replace_all(&text, "an opaque edge provider")
        .into_owned()
}

/// Re-scans for address shapes. Any survivor is a hard boundary
/// violation: the caller must abort rather than send or persist the
/// text.
pub fn assert_clean(text: &str) -> Result<(), PrivacyViolation> {
    if let Some(found) = IPV4.find(text) {
        return Err(PrivacyViolation(format!(
            "IPv4-shaped token survived redaction at offset {}",
            found.start()
        )));
    }
    if let Some(found) = IPV6.find(text) {
        return Err(PrivacyViolation(format!(
            "IPv6-shaped token survived redaction at offset {}",
            found.start()
        )));
    }
    Ok(())
}
