//! Abstract remote execution target.
//!
//! The engine is agnostic to whether a target is a physical device, a
//! container, or the local host. It only requires the four transfer/exec
//! operations plus the device-health counters the resource probe samples.
//! Concrete adapters live in [`crate::adb`] and [`crate::local`].

use std::path::{Path, PathBuf};

use crate::error::TargetError;

/// Device-health counters sampled by the resource probe.
///
/// Every reading is best-effort: a counter that cannot be read on this
/// target (no battery on a server, sampling command failed) is `None`, never
/// an error. Probe health must not affect the job's execution path.
pub trait HealthSource {
    /// Battery charge percentage.
    fn battery_level(&self) -> Option<i64>;

    /// Thermal reading, highest relevant zone.
    fn thermal_reading(&self) -> Option<f64>;

    /// Resident memory in KB of the named process.
    fn process_rss_kb(&self, process: &str) -> Option<u64>;
}

/// Capability set of one execution target.
pub trait RemoteTarget: HealthSource + Send + Sync {
    /// Stable identifier: device serial, container handle, or host name.
    fn id(&self) -> &str;

    /// Whether the target is present and responsive right now. Checked at
    /// the start of every job, not just once per run.
    fn is_reachable(&self) -> bool;

    /// Copy a local asset into `remote_subdir` under the target's work root.
    fn push(&self, local: &Path, remote_subdir: &str) -> Result<(), TargetError>;

    /// Retrieve a remote file (path relative to the work root) to the host.
    /// Returns the local path of the retrieved copy.
    fn pull(&self, remote_file: &str) -> Result<PathBuf, TargetError>;

    /// Run a shell command on the target, returning its combined output.
    fn exec_shell(&self, command: &str) -> Result<String, TargetError>;

    /// Delete a file under the work root on the target. Consumed result
    /// artifacts are discarded this way so a later job cannot pick up stale
    /// output. Deleting a file that is already gone is not an error.
    fn remove(&self, remote_file: &str) -> Result<(), TargetError>;

    /// Shell command line that runs the benchmark binary on this target for
    /// one pushed audio asset. Each adapter knows its own environment
    /// (library paths, work root), so the invocation is built here rather
    /// than in the runner.
    fn benchmark_command(&self, test_bin: &str, audio_file: &str, model: &str) -> String;

    /// Snapshot descriptor for fleet discovery output.
    fn info(&self) -> TargetInfo {
        TargetInfo {
            id: self.id().to_string(),
            reachable: self.is_reachable(),
        }
    }
}

/// Immutable descriptor captured at fleet-discovery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub id: String,
    /// Whether the target answered discovery. Unreachable targets still get
    /// a worker so their failure shows up in the fleet result.
    pub reachable: bool,
}
