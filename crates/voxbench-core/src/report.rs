//! Report and artifact data model, plus checkpoint file I/O.
//!
//! # On-disk layout per run
//!
//! - `<out>/<target-id>_report.json`: final per-target report
//! - `<out>/<target-id>_checkpoint.json`: rolling snapshot of all reports
//!   produced so far, written every N completed jobs and deleted once the
//!   target's full job list finishes. Its presence after a run marks that
//!   target's run as incomplete.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::probe::ProbeReport;
use crate::wer::{DiffEntry, WerReport};

// ---------------------------------------------------------------------------
// Result artifact pulled from the target
// ---------------------------------------------------------------------------

/// Raw per-job artifact produced by the benchmark binary on the target.
///
/// Only the fields the engine consumes are modeled; unknown fields in the
/// artifact are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultArtifact {
    #[serde(rename = "testInfo")]
    pub test_info: TestInfo,
    #[serde(rename = "latencyStats")]
    pub latency_stats: LatencyStats,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestInfo {
    pub prediction: Prediction,
    #[serde(rename = "audioFile")]
    pub audio_file: String,
    pub timings: Timings,
    /// Optional delegation/runtime diagnostics (e.g. which compute backend
    /// the model actually ran on).
    #[serde(default)]
    pub delegation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Timings {
    #[serde(rename = "inputAudioSeconds")]
    pub input_audio_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatencyStats {
    pub measurements: LatencyMeasurements,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatencyMeasurements {
    #[serde(rename = "cumulativeTokens")]
    pub cumulative_tokens: u64,
    #[serde(rename = "timeElapsed")]
    pub time_elapsed: f64,
}

/// Hypothesis as emitted by the target: either already-joined text or a
/// token sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Text(String),
    Tokens(Vec<String>),
}

impl Prediction {
    /// Flatten into hypothesis text.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Tokens(t) => t.join(" "),
        }
    }
}

/// Parse a pulled artifact file.
pub fn parse_artifact(path: &Path) -> Result<ResultArtifact, crate::TargetError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map_err(|e| crate::TargetError::ResultMissing(format!("{}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// Per-job metric report
// ---------------------------------------------------------------------------

/// Device-health block merged from the resource probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Peak resident memory in KB observed during execution.
    pub peak_mem: Option<u64>,
    /// Post-execution thermal reading.
    pub cpu_temp: Option<f64>,
    /// Post-execution battery percentage.
    pub batt_level: Option<i64>,
}

impl From<&ProbeReport> for DeviceInfo {
    fn from(p: &ProbeReport) -> Self {
        Self {
            peak_mem: p.peak_mem_kb,
            cpu_temp: p.post.thermal,
            batt_level: p.post.battery,
        }
    }
}

/// One job's scored report. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReport {
    pub reference: String,
    /// Normalized hypothesis text.
    pub prediction: String,
    /// NaN (undefined metric) serializes as JSON null.
    #[serde(with = "nullable_f64")]
    pub wer: f64,
    pub file: String,
    #[serde(rename = "audioDuration")]
    pub audio_duration: f64,
    #[serde(rename = "substitutionRate", with = "nullable_f64")]
    pub substitution_rate: f64,
    #[serde(rename = "deletionRate", with = "nullable_f64")]
    pub deletion_rate: f64,
    #[serde(rename = "insertionRate")]
    pub insertion_rate: f64,
    #[serde(rename = "numSubstitutions")]
    pub num_substitutions: usize,
    #[serde(rename = "numDeletions")]
    pub num_deletions: usize,
    #[serde(rename = "numInsertions")]
    pub num_insertions: usize,
    #[serde(rename = "numHits")]
    pub num_hits: usize,
    /// Decoder tokens emitted, from the artifact's latency measurements.
    #[serde(rename = "cumulativeTokens")]
    pub cumulative_tokens: u64,
    /// Wall-clock execution seconds, from the artifact's latency measurements.
    #[serde(rename = "timeElapsed")]
    pub time_elapsed: f64,
    pub diff: Vec<DiffEntry>,
    #[serde(rename = "deviceInfo")]
    pub device_info: DeviceInfo,
}

impl MetricReport {
    /// Combine a scored pair with the artifact's latency data and the probe's
    /// device-health readings.
    pub fn assemble(
        wer: WerReport,
        file: impl Into<String>,
        audio_duration: f64,
        latency: &LatencyMeasurements,
        device_info: DeviceInfo,
    ) -> Self {
        Self {
            reference: wer.reference,
            prediction: wer.prediction,
            wer: wer.wer,
            file: file.into(),
            audio_duration,
            cumulative_tokens: latency.cumulative_tokens,
            time_elapsed: latency.time_elapsed,
            substitution_rate: wer.substitution_rate,
            deletion_rate: wer.deletion_rate,
            insertion_rate: wer.insertion_rate,
            num_substitutions: wer.num_substitutions,
            num_deletions: wer.num_deletions,
            num_insertions: wer.num_insertions,
            num_hits: wer.num_hits,
            diff: wer.diff,
            device_info,
        }
    }
}

/// Serialize NaN as null and read null back as NaN. serde_json writes NaN as
/// null anyway; the symmetric deserializer keeps checkpoint round-trips from
/// failing on undefined WERs.
mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_none()
        } else {
            s.serialize_some(v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

// ---------------------------------------------------------------------------
// Per-target report
// ---------------------------------------------------------------------------

/// Final report for one target's full job sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetReport {
    pub target_id: String,
    pub run_id: String,
    pub dataset: String,
    /// Jobs that produced a scored report.
    pub completed: usize,
    /// Jobs attempted but recorded as absent.
    pub skipped: usize,
    pub mean_wer: Option<f64>,
    /// Tokens per second over all completed jobs.
    pub throughput: Option<f64>,
    /// One entry per job attempted, in job-list order; `null` marks a job
    /// that yielded no result.
    pub reports: Vec<Option<MetricReport>>,
}

impl TargetReport {
    /// Path of this target's final report file under `dir`.
    pub fn path(dir: &Path, target_id: &str) -> PathBuf {
        dir.join(format!("{target_id}_report.json"))
    }

    /// Write the report file, creating `dir` if needed.
    pub fn write(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Self::path(dir, &self.target_id);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// Path of a target's checkpoint file under `dir`.
pub fn checkpoint_path(dir: &Path, target_id: &str) -> PathBuf {
    dir.join(format!("{target_id}_checkpoint.json"))
}

/// Snapshot all reports produced so far for one target.
pub fn write_checkpoint(
    dir: &Path,
    target_id: &str,
    reports: &[Option<MetricReport>],
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = checkpoint_path(dir, target_id);
    let json = serde_json::to_string_pretty(reports)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Load a checkpoint (for resumption inspection or the `report` command).
pub fn read_checkpoint(path: &Path) -> io::Result<Vec<Option<MetricReport>>> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Remove a target's checkpoint after its full sequence completed. Missing
/// files are fine: a short run may never have checkpointed.
pub fn remove_checkpoint(dir: &Path, target_id: &str) -> io::Result<()> {
    match fs::remove_file(checkpoint_path(dir, target_id)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
