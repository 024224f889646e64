//! Word-error-rate alignment engine.
//!
//! Pipeline per scored pair:
//! 1. Normalize reference and hypothesis with the same [`TextNormalizer`]
//! 2. Levenshtein alignment over word tokens with full backtrace
//! 3. Derive counts (substitutions, deletions, insertions, hits), rates,
//!    and an ordered token-level diff
//!
//! Conventions: substitution and deletion rates are normalized by reference
//! length, insertion rate by hypothesis length, and
//! WER = (S + D + I) / reference length. A zero-length reference against a
//! non-empty hypothesis has no defined WER; it is reported as NaN rather
//! than raising.

use serde::{Deserialize, Serialize};

use crate::text::{tokenize, BasicNormalizer, TextNormalizer};

/// Edit classification for one diff token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditTag {
    /// Token matched on both sides.
    None,
    /// Reference token replaced by a different hypothesis token.
    Substituted,
    /// Token present only in the reference.
    Deleted,
    /// Token present only in the hypothesis.
    Inserted,
}

/// One entry of the ordered alignment trace.
///
/// Substituted entries render both sides as `"ref/hyp"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub token: String,
    pub tag: EditTag,
}

/// Full scoring outcome for one (reference, hypothesis) pair.
///
/// Serialization writes non-finite rates as `null`, matching the report
/// files.
#[derive(Debug, Clone, Serialize)]
pub struct WerReport {
    /// Normalized reference text.
    pub reference: String,
    /// Normalized hypothesis text.
    pub prediction: String,
    /// (S + D + I) / reference length. NaN when the reference is empty and
    /// the hypothesis is not.
    pub wer: f64,
    pub substitution_rate: f64,
    pub deletion_rate: f64,
    pub insertion_rate: f64,
    pub num_substitutions: usize,
    pub num_deletions: usize,
    pub num_insertions: usize,
    pub num_hits: usize,
    /// Left-to-right alignment trace.
    pub diff: Vec<DiffEntry>,
}

/// Scorer holding the normalization policy.
pub struct WerScorer {
    normalizer: Box<dyn TextNormalizer>,
}

impl Default for WerScorer {
    fn default() -> Self {
        Self::new(Box::new(BasicNormalizer))
    }
}

impl WerScorer {
    /// Create a scorer with a custom normalization policy.
    pub fn new(normalizer: Box<dyn TextNormalizer>) -> Self {
        Self { normalizer }
    }

    /// Score a reference/hypothesis pair.
    pub fn score(&self, reference: &str, hypothesis: &str) -> WerReport {
        let reference = self.normalizer.normalize(reference);
        let prediction = self.normalizer.normalize(hypothesis);

        let ref_tokens = tokenize(&reference);
        let hyp_tokens = tokenize(&prediction);

        let ops = align(&ref_tokens, &hyp_tokens);

        let mut num_substitutions = 0;
        let mut num_deletions = 0;
        let mut num_insertions = 0;
        let mut num_hits = 0;
        let mut diff = Vec::with_capacity(ops.len());

        for op in &ops {
            match *op {
                AlignOp::Hit(r, _) => {
                    num_hits += 1;
                    diff.push(DiffEntry {
                        token: ref_tokens[r].to_string(),
                        tag: EditTag::None,
                    });
                }
                AlignOp::Substitute(r, h) => {
                    num_substitutions += 1;
                    diff.push(DiffEntry {
                        token: format!("{}/{}", ref_tokens[r], hyp_tokens[h]),
                        tag: EditTag::Substituted,
                    });
                }
                AlignOp::Delete(r) => {
                    num_deletions += 1;
                    diff.push(DiffEntry {
                        token: ref_tokens[r].to_string(),
                        tag: EditTag::Deleted,
                    });
                }
                AlignOp::Insert(h) => {
                    num_insertions += 1;
                    diff.push(DiffEntry {
                        token: hyp_tokens[h].to_string(),
                        tag: EditTag::Inserted,
                    });
                }
            }
        }

        let ref_len = ref_tokens.len();
        let hyp_len = hyp_tokens.len();

        let (wer, substitution_rate, deletion_rate) = if ref_len > 0 {
            let n = ref_len as f64;
            (
                (num_substitutions + num_deletions + num_insertions) as f64 / n,
                num_substitutions as f64 / n,
                num_deletions as f64 / n,
            )
        } else if hyp_len == 0 {
            // Both empty: a perfect (if vacuous) transcription.
            (0.0, 0.0, 0.0)
        } else {
            // Undefined: edits exist but there is nothing to normalize by.
            (f64::NAN, f64::NAN, f64::NAN)
        };

        let insertion_rate = if hyp_len > 0 {
            num_insertions as f64 / hyp_len as f64
        } else {
            0.0
        };

        WerReport {
            reference,
            prediction,
            wer,
            substitution_rate,
            deletion_rate,
            insertion_rate,
            num_substitutions,
            num_deletions,
            num_insertions,
            num_hits,
            diff,
        }
    }
}

/// One step of the alignment backtrace, indices into the token slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlignOp {
    Hit(usize, usize),
    Substitute(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// Classic Levenshtein DP over word tokens with backtrace.
///
/// Ties prefer the diagonal move so that a mismatch aligns as one
/// substitution rather than a delete/insert pair.
fn align(ref_tokens: &[&str], hyp_tokens: &[&str]) -> Vec<AlignOp> {
    let n = ref_tokens.len();
    let m = hyp_tokens.len();

    // dist[i][j] = edit distance between ref[..i] and hyp[..j]
    let mut dist = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in dist.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        dist[0][j] = j;
    }

    for i in 1..=n {
        for j in 1..=m {
            let sub_cost = usize::from(ref_tokens[i - 1] != hyp_tokens[j - 1]);
            dist[i][j] = (dist[i - 1][j - 1] + sub_cost)
                .min(dist[i - 1][j] + 1)
                .min(dist[i][j - 1] + 1);
        }
    }

    // Backtrace from (n, m) to (0, 0), then reverse into reading order.
    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 {
            let sub_cost = usize::from(ref_tokens[i - 1] != hyp_tokens[j - 1]);
            if dist[i][j] == dist[i - 1][j - 1] + sub_cost {
                ops.push(if sub_cost == 0 {
                    AlignOp::Hit(i - 1, j - 1)
                } else {
                    AlignOp::Substitute(i - 1, j - 1)
                });
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && dist[i][j] == dist[i - 1][j] + 1 {
            ops.push(AlignOp::Delete(i - 1));
            i -= 1;
        } else {
            ops.push(AlignOp::Insert(j - 1));
            j -= 1;
        }
    }
    ops.reverse();
    ops
}
