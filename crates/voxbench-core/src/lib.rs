//! # voxbench-core
//!
//! **Benchmark speech recognition across a fleet of devices at once.**
//!
//! `voxbench-core` drives a transcription binary over a set of execution
//! targets (Android devices over adb, or the local host), scores every
//! transcript against its reference with word error rate, and folds the
//! results into per-target reports.
//!
//! ## Quick Start
//!
//! ```no_run
//! use voxbench_core::{dispatch, load_jobs, LocalTarget, RemoteTarget, RunConfig, RunContext};
//!
//! let jobs = load_jobs("datasets/librispeech-10mins".as_ref()).unwrap();
//! let target = LocalTarget::new("work").unwrap();
//! let targets: Vec<&dyn RemoteTarget> = vec![&target];
//!
//! let ctx = RunContext::new(RunConfig::default());
//! let outcomes = dispatch(&targets, &jobs, &ctx);
//! for (id, outcome) in &outcomes {
//!     println!("{id}: {:?}", outcome.report().map(|r| r.mean_wer));
//! }
//! ```
//!
//! ## Architecture
//!
//! Jobs → Fleet dispatch (one worker per target) → per-job push/probe/
//! execute/pull → WER scoring → running aggregate → report files.
//!
//! Targets run their job lists sequentially; the fleet runs targets in
//! parallel. A failing job or a failing target never takes down the rest
//! of the run. While a job executes, a probe thread samples battery,
//! thermal, and peak process memory on the same target.
//!
//! Every execution backend implements the [`RemoteTarget`] trait. The
//! [`dispatch`] entry point owns the worker threads and returns one
//! [`TargetOutcome`] per target.

pub mod adb;
pub mod aggregate;
pub mod error;
pub mod fleet;
pub mod job;
pub mod local;
pub mod probe;
pub mod report;
pub mod runner;
pub mod target;
pub mod text;
pub mod wer;

pub use adb::{discover_devices, AdbTarget};
pub use aggregate::RunningAggregate;
pub use error::TargetError;
pub use fleet::{dispatch, TargetOutcome};
pub use job::{load_jobs, BenchmarkJob, AUDIO_EXTENSIONS};
pub use local::LocalTarget;
pub use probe::{probe_job, BoundarySample, ProbeReport, ProbeSignal};
pub use report::{
    checkpoint_path, parse_artifact, read_checkpoint, DeviceInfo, MetricReport, ResultArtifact,
    TargetReport,
};
pub use runner::{JobCounter, RunConfig, RunContext, TargetRunner};
pub use target::{HealthSource, RemoteTarget, TargetInfo};
pub use text::{tokenize, BasicNormalizer, TextNormalizer};
pub use wer::{DiffEntry, EditTag, WerReport, WerScorer};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
