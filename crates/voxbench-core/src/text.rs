//! Text normalization applied before alignment.
//!
//! Reference and hypothesis must pass through the *same* normalizer before
//! scoring, otherwise casing and punctuation differences show up as spurious
//! edits. The policy itself is a collaborator seam: callers can plug in a
//! domain-specific normalizer (e.g. a full English number/punctuation
//! normalizer) via [`TextNormalizer`].

/// Normalization policy applied to both sides of an alignment.
pub trait TextNormalizer: Send + Sync {
    /// Normalize raw transcript text into scoring form.
    fn normalize(&self, text: &str) -> String;
}

/// Default normalizer: case folding, punctuation stripping, whitespace
/// collapse. Intra-word apostrophes are kept ("don't" stays one token).
pub struct BasicNormalizer;

impl TextNormalizer for BasicNormalizer {
    fn normalize(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch.is_alphanumeric() || ch == '\'' {
                for low in ch.to_lowercase() {
                    out.push(low);
                }
            } else {
                out.push(' ');
            }
        }
        // Strip apostrophes that are not intra-word
        let joined: Vec<String> = out
            .split_whitespace()
            .map(|w| w.trim_matches('\'').to_string())
            .filter(|w| !w.is_empty())
            .collect();
        joined.join(" ")
    }
}

/// Split normalized text into word tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}
