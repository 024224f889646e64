//! Running per-target statistics.
//!
//! One [`RunningAggregate`] is owned by one target runner and extended after
//! every scored job. Means are recomputed exactly on query, never maintained
//! incrementally, so the running mean after k jobs is the arithmetic mean of
//! the first k recorded values.

/// Monotonically-extended accumulator for one target's run.
#[derive(Debug, Default)]
pub struct RunningAggregate {
    wers: Vec<f64>,
    cumulative_tokens: u64,
    cumulative_elapsed_secs: f64,
}

impl RunningAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scored job. NaN WERs (undefined metric) are kept out of the
    /// mean but token/time totals still count toward throughput.
    pub fn record(&mut self, wer: f64, tokens: u64, elapsed_secs: f64) {
        if !wer.is_nan() {
            self.wers.push(wer);
        }
        self.cumulative_tokens += tokens;
        self.cumulative_elapsed_secs += elapsed_secs;
    }

    /// Number of WER values recorded so far.
    pub fn len(&self) -> usize {
        self.wers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wers.is_empty()
    }

    /// Exact arithmetic mean over all WERs seen so far. `None` before the
    /// first scored job.
    pub fn mean_wer(&self) -> Option<f64> {
        if self.wers.is_empty() {
            return None;
        }
        Some(self.wers.iter().sum::<f64>() / self.wers.len() as f64)
    }

    /// Running throughput in tokens per second. `None` until some elapsed
    /// time has been recorded.
    pub fn throughput(&self) -> Option<f64> {
        if self.cumulative_elapsed_secs > 0.0 {
            Some(self.cumulative_tokens as f64 / self.cumulative_elapsed_secs)
        } else {
            None
        }
    }

    pub fn cumulative_tokens(&self) -> u64 {
        self.cumulative_tokens
    }

    pub fn cumulative_elapsed_secs(&self) -> f64 {
        self.cumulative_elapsed_secs
    }
}
