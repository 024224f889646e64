//! Per-target job sequencing.
//!
//! One runner owns one target for the whole run and drives its job list
//! strictly in order: a target's hardware cannot safely run two jobs at
//! once, so job k+1 never starts before job k's probe and execution have
//! both finished. Per job: reachability check → push → probe overlapped
//! with remote execution → pull → score → aggregate. Every per-job failure
//! is absorbed here as an absent entry; the runner always proceeds to the
//! next job.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use crate::aggregate::RunningAggregate;
use crate::error::TargetError;
use crate::job::BenchmarkJob;
use crate::probe::{probe_job, ProbeReport, ProbeSignal, DEFAULT_POLL_INTERVAL};
use crate::report::{
    parse_artifact, remove_checkpoint, write_checkpoint, DeviceInfo, MetricReport, TargetReport,
};
use crate::target::RemoteTarget;
use crate::wer::WerScorer;

/// Parameters for one fleet run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory for report and checkpoint files.
    pub output_dir: std::path::PathBuf,
    /// Benchmark binary name on the target.
    pub test_bin: String,
    /// Model size argument passed to the binary.
    pub model: String,
    /// Artifact file the binary writes under the target's work root.
    pub artifact_name: String,
    /// Peak-memory polling interval.
    pub probe_interval: Duration,
    /// Checkpoint after every this many completed jobs.
    pub checkpoint_every: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: std::path::PathBuf::from("output"),
            test_bin: "whisperax_cli".to_string(),
            model: "tiny".to_string(),
            artifact_name: "output.json".to_string(),
            probe_interval: DEFAULT_POLL_INTERVAL,
            checkpoint_every: 10,
        }
    }
}

/// Fleet-wide job sequence counter for progress logging.
///
/// Increment-and-read under one lock: two workers can never observe the
/// same value.
#[derive(Debug, Default)]
pub struct JobCounter(Mutex<u64>);

impl JobCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number, unique across all targets.
    pub fn next(&self) -> u64 {
        let mut guard = self.0.lock().unwrap();
        *guard += 1;
        *guard
    }
}

/// State shared by all target workers of one run. Scoped to a single
/// dispatch invocation so repeated or parallel runs in one process never
/// share counters or stop flags.
#[derive(Debug)]
pub struct RunContext {
    pub config: RunConfig,
    pub counter: JobCounter,
    stop: AtomicBool,
    run_id: String,
}

impl RunContext {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            counter: JobCounter::new(),
            stop: AtomicBool::new(false),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Ask all workers to stop after their current job.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Drives one target through the whole job list.
pub struct TargetRunner<'a> {
    target: &'a dyn RemoteTarget,
    ctx: &'a RunContext,
    scorer: WerScorer,
    aggregate: RunningAggregate,
}

impl<'a> TargetRunner<'a> {
    pub fn new(target: &'a dyn RemoteTarget, ctx: &'a RunContext) -> Self {
        Self {
            target,
            ctx,
            scorer: WerScorer::default(),
            aggregate: RunningAggregate::new(),
        }
    }

    /// Run the full job sequence. The returned report list has exactly one
    /// entry per job attempted, absent results included.
    pub fn run(mut self, jobs: &[BenchmarkJob]) -> TargetReport {
        let id = self.target.id().to_string();
        let cfg = &self.ctx.config;

        let mut reports: Vec<Option<MetricReport>> = Vec::with_capacity(jobs.len());
        let mut completed = 0usize;
        let mut skipped = 0usize;
        let mut stopped_early = false;

        for job in jobs {
            if self.ctx.stop_requested() {
                log::info!("[{id}] stop requested, abandoning remaining jobs");
                stopped_early = true;
                break;
            }

            let seq = self.ctx.counter.next();
            log::info!("[{id}] job #{seq}: {}", job.file_name());

            match self.run_job(job) {
                Ok(report) => {
                    self.aggregate
                        .record(report.wer, report.cumulative_tokens, report.time_elapsed);
                    completed += 1;
                    reports.push(Some(report));
                    log::info!(
                        "[{id}] job #{seq} done (mean WER {}, {} tok/s)",
                        format_opt(self.aggregate.mean_wer()),
                        format_opt(self.aggregate.throughput()),
                    );
                    if completed % cfg.checkpoint_every == 0 {
                        if let Err(e) = write_checkpoint(&cfg.output_dir, &id, &reports) {
                            log::warn!("[{id}] checkpoint write failed: {e}");
                        }
                    }
                }
                Err(e) => {
                    skipped += 1;
                    reports.push(None);
                    log::warn!("[{id}] job #{seq} skipped ({}): {e}", e.kind());
                }
            }
        }

        // A checkpoint left on disk marks an incomplete sequence.
        if !stopped_early {
            if let Err(e) = remove_checkpoint(&cfg.output_dir, &id) {
                log::warn!("[{id}] checkpoint removal failed: {e}");
            }
        }

        TargetReport {
            target_id: id,
            run_id: self.ctx.run_id.clone(),
            dataset: jobs.first().map(|j| j.dataset.clone()).unwrap_or_default(),
            completed,
            skipped,
            mean_wer: self.aggregate.mean_wer(),
            throughput: self.aggregate.throughput(),
            reports,
        }
    }

    /// One job: Idle → Pushed → Probing+Executing → PulledResult → Scored.
    /// Any error short-circuits the remaining steps of this job only.
    fn run_job(&mut self, job: &BenchmarkJob) -> Result<MetricReport, TargetError> {
        let cfg = &self.ctx.config;

        if !self.target.is_reachable() {
            return Err(TargetError::Unreachable(self.target.id().to_string()));
        }

        self.target.push(&job.audio_path, "inputs")?;

        let (exec_result, probe) = self.execute_with_probe(&job.file_name());
        exec_result?;

        let local_artifact = self.target.pull(&cfg.artifact_name)?;
        let artifact = parse_artifact(&local_artifact);
        // The artifact is consumed either way: remove the pulled copy and
        // the remote original so a later job can't pick up stale results.
        if let Err(e) = fs::remove_file(&local_artifact) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("could not remove {}: {e}", local_artifact.display());
            }
        }
        if let Err(e) = self.target.remove(&cfg.artifact_name) {
            log::debug!("remote artifact cleanup failed: {e}");
        }
        let artifact = artifact?;

        let hypothesis = artifact.test_info.prediction.clone().into_text();
        let wer = self.scorer.score(&job.reference, &hypothesis);

        let file = if artifact.test_info.audio_file.is_empty() {
            job.file_name()
        } else {
            artifact.test_info.audio_file.clone()
        };

        Ok(MetricReport::assemble(
            wer,
            file,
            artifact.test_info.timings.input_audio_seconds,
            &artifact.latency_stats.measurements,
            DeviceInfo::from(&probe),
        ))
    }

    /// Overlap the remote invocation with the resource probe. The probe is
    /// always joined, so the boundary sample pair exists even when execution
    /// fails.
    fn execute_with_probe(&self, audio_file: &str) -> (Result<String, TargetError>, ProbeReport) {
        let cfg = &self.ctx.config;
        let signal = ProbeSignal::new();

        thread::scope(|s| {
            let probe_handle = s.spawn(|| {
                probe_job(
                    self.target,
                    &cfg.test_bin,
                    &signal,
                    cfg.probe_interval,
                )
            });

            let command = self
                .target
                .benchmark_command(&cfg.test_bin, audio_file, &cfg.model);
            signal.execution_started();
            let exec_result = self.target.exec_shell(&command);
            signal.execution_ended();

            let probe = probe_handle.join().unwrap_or(ProbeReport {
                pre: crate::probe::BoundarySample {
                    battery: None,
                    thermal: None,
                },
                post: crate::probe::BoundarySample {
                    battery: None,
                    thermal: None,
                },
                peak_mem_kb: None,
            });

            (exec_result, probe)
        })
    }
}

fn format_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.3}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::HealthSource;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;

    // -----------------------------------------------------------------------
    // Scripted mock target
    // -----------------------------------------------------------------------

    /// Target with a per-job script of artifact payloads and failure points.
    struct MockTarget {
        id: String,
        reachable: bool,
        work_dir: PathBuf,
        /// One entry per expected job: `Some(json)` is served on pull,
        /// `None` makes the pull fail.
        artifacts: Mutex<VecDeque<Option<String>>>,
        /// 1-based exec invocation that should fail, if any.
        fail_exec_on: Option<usize>,
        exec_calls: AtomicUsize,
        /// Checkpoint-file existence observed during each exec call.
        checkpoint_seen: Mutex<Vec<bool>>,
        checkpoint_path: PathBuf,
    }

    impl MockTarget {
        fn new(id: &str, work_dir: &Path, output_dir: &Path, artifacts: Vec<Option<String>>) -> Self {
            Self {
                id: id.to_string(),
                reachable: true,
                work_dir: work_dir.to_path_buf(),
                artifacts: Mutex::new(artifacts.into()),
                fail_exec_on: None,
                exec_calls: AtomicUsize::new(0),
                checkpoint_seen: Mutex::new(Vec::new()),
                checkpoint_path: crate::report::checkpoint_path(output_dir, id),
            }
        }
    }

    impl HealthSource for MockTarget {
        fn battery_level(&self) -> Option<i64> {
            Some(80)
        }
        fn thermal_reading(&self) -> Option<f64> {
            Some(39.5)
        }
        fn process_rss_kb(&self, _p: &str) -> Option<u64> {
            Some(250_000)
        }
    }

    impl RemoteTarget for MockTarget {
        fn id(&self) -> &str {
            &self.id
        }
        fn is_reachable(&self) -> bool {
            self.reachable
        }
        fn push(&self, local: &Path, _subdir: &str) -> Result<(), TargetError> {
            if local.exists() {
                Ok(())
            } else {
                Err(TargetError::Transfer("missing asset".into()))
            }
        }
        fn pull(&self, remote_file: &str) -> Result<std::path::PathBuf, TargetError> {
            let next = self.artifacts.lock().unwrap().pop_front().flatten();
            match next {
                Some(json) => {
                    let path = self.work_dir.join(format!("{}_{remote_file}", self.id));
                    fs::write(&path, json)?;
                    Ok(path)
                }
                None => Err(TargetError::Transfer("no artifact produced".into())),
            }
        }
        fn exec_shell(&self, _command: &str) -> Result<String, TargetError> {
            let call = self.exec_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.checkpoint_seen
                .lock()
                .unwrap()
                .push(self.checkpoint_path.exists());
            if self.fail_exec_on == Some(call) {
                return Err(TargetError::Execution("simulated crash".into()));
            }
            Ok(String::new())
        }
        fn remove(&self, _remote_file: &str) -> Result<(), TargetError> {
            Ok(())
        }
        fn benchmark_command(&self, test_bin: &str, audio_file: &str, model: &str) -> String {
            format!("{test_bin} {audio_file} {model}")
        }
    }

    fn artifact_json(prediction: &str, tokens: u64, elapsed: f64) -> String {
        format!(
            r#"{{
                "testInfo": {{
                    "prediction": "{prediction}",
                    "audioFile": "clip.mp3",
                    "timings": {{"inputAudioSeconds": 4.0}}
                }},
                "latencyStats": {{"measurements": {{"cumulativeTokens": {tokens}, "timeElapsed": {elapsed}}}}}
            }}"#
        )
    }

    fn make_jobs(dir: &Path, n: usize) -> Vec<BenchmarkJob> {
        (0..n)
            .map(|i| {
                let path = dir.join(format!("clip{i}.mp3"));
                fs::write(&path, b"audio").unwrap();
                BenchmarkJob {
                    audio_path: path,
                    dataset: "librispeech-10mins".to_string(),
                    reference: "the cat sat".to_string(),
                }
            })
            .collect()
    }

    fn test_ctx(output_dir: &Path, checkpoint_every: usize) -> RunContext {
        RunContext::new(RunConfig {
            output_dir: output_dir.to_path_buf(),
            checkpoint_every,
            probe_interval: Duration::from_millis(5),
            ..RunConfig::default()
        })
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[test]
    fn test_all_jobs_complete() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 3);
        let target = MockTarget::new(
            "dev1",
            tmp.path(),
            tmp.path(),
            vec![
                Some(artifact_json("the cat sat", 10, 1.0)),
                Some(artifact_json("a cat sat", 10, 1.0)),
                Some(artifact_json("the cat sat", 10, 2.0)),
            ],
        );
        let ctx = test_ctx(tmp.path(), 10);

        let report = TargetRunner::new(&target, &ctx).run(&jobs);

        assert_eq!(report.completed, 3);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.reports.len(), 3);
        assert!(report.reports.iter().all(|r| r.is_some()));
        // WERs: 0, 1/3, 0 → mean 1/9
        assert!((report.mean_wer.unwrap() - 1.0 / 9.0).abs() < 1e-9);
        // 30 tokens over 4 seconds
        assert!((report.throughput.unwrap() - 7.5).abs() < 1e-9);
        assert_eq!(report.dataset, "librispeech-10mins");
    }

    #[test]
    fn test_device_info_merged_from_probe() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 1);
        let target = MockTarget::new(
            "dev1",
            tmp.path(),
            tmp.path(),
            vec![Some(artifact_json("the cat sat", 5, 0.5))],
        );
        let ctx = test_ctx(tmp.path(), 10);

        let report = TargetRunner::new(&target, &ctx).run(&jobs);
        let job_report = report.reports[0].as_ref().unwrap();
        assert_eq!(job_report.device_info.batt_level, Some(80));
        assert_eq!(job_report.device_info.cpu_temp, Some(39.5));
        assert_eq!(job_report.device_info.peak_mem, Some(250_000));
    }

    #[test]
    fn test_pulled_artifact_is_consumed() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 1);
        let target = MockTarget::new(
            "dev1",
            tmp.path(),
            tmp.path(),
            vec![Some(artifact_json("the cat sat", 5, 0.5))],
        );
        let ctx = test_ctx(tmp.path(), 10);

        let _ = TargetRunner::new(&target, &ctx).run(&jobs);
        assert!(
            !tmp.path().join("dev1_output.json").exists(),
            "pulled artifact must be deleted after scoring"
        );
    }

    // -----------------------------------------------------------------------
    // Failure absorption
    // -----------------------------------------------------------------------

    #[test]
    fn test_unreachable_target_records_all_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 3);
        let mut target = MockTarget::new("gone", tmp.path(), tmp.path(), vec![]);
        target.reachable = false;
        let ctx = test_ctx(tmp.path(), 10);

        let report = TargetRunner::new(&target, &ctx).run(&jobs);
        assert_eq!(report.completed, 0);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.reports.len(), 3, "absent jobs are not omitted");
        assert!(report.reports.iter().all(|r| r.is_none()));
        assert_eq!(report.mean_wer, None);
    }

    #[test]
    fn test_exec_failure_skips_only_that_job() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 3);
        let mut target = MockTarget::new(
            "dev1",
            tmp.path(),
            tmp.path(),
            vec![
                Some(artifact_json("the cat sat", 10, 1.0)),
                // job 2's exec fails before pull; its artifact slot is unused
                Some(artifact_json("the cat sat", 10, 1.0)),
            ],
        );
        target.fail_exec_on = Some(2);
        let ctx = test_ctx(tmp.path(), 10);

        let report = TargetRunner::new(&target, &ctx).run(&jobs);
        assert_eq!(report.completed, 2);
        assert_eq!(report.skipped, 1);
        assert!(report.reports[0].is_some());
        assert!(report.reports[1].is_none());
        assert!(report.reports[2].is_some());
    }

    #[test]
    fn test_missing_artifact_records_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 2);
        let target = MockTarget::new(
            "dev1",
            tmp.path(),
            tmp.path(),
            vec![None, Some(artifact_json("the cat sat", 10, 1.0))],
        );
        let ctx = test_ctx(tmp.path(), 10);

        let report = TargetRunner::new(&target, &ctx).run(&jobs);
        assert!(report.reports[0].is_none());
        assert!(report.reports[1].is_some());
        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped, 1);
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    #[test]
    fn test_checkpoint_written_at_cadence_and_removed_on_success() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        let jobs = make_jobs(tmp.path(), 5);
        let artifacts = (0..5)
            .map(|_| Some(artifact_json("the cat sat", 10, 1.0)))
            .collect();
        let target = MockTarget::new("dev1", tmp.path(), &out, artifacts);
        let ctx = test_ctx(&out, 2);

        let report = TargetRunner::new(&target, &ctx).run(&jobs);
        assert_eq!(report.completed, 5);

        // Existence as observed at the start of each exec: the checkpoint
        // appears only once 2, then 4, jobs have completed.
        let seen = target.checkpoint_seen.lock().unwrap().clone();
        assert_eq!(seen, vec![false, false, true, true, true]);

        // Gone after the sequence completed.
        assert!(!crate::report::checkpoint_path(&out, "dev1").exists());
    }

    /// Target whose job execution asks the run to stop, as a Ctrl-C
    /// arriving while the job is in flight would.
    struct StoppingTarget<'a> {
        ctx: &'a RunContext,
        work_dir: PathBuf,
    }

    impl HealthSource for StoppingTarget<'_> {
        fn battery_level(&self) -> Option<i64> {
            Some(70)
        }
        fn thermal_reading(&self) -> Option<f64> {
            Some(35.0)
        }
        fn process_rss_kb(&self, _p: &str) -> Option<u64> {
            Some(100_000)
        }
    }

    impl RemoteTarget for StoppingTarget<'_> {
        fn id(&self) -> &str {
            "stopper"
        }
        fn is_reachable(&self) -> bool {
            true
        }
        fn push(&self, _local: &Path, _subdir: &str) -> Result<(), TargetError> {
            Ok(())
        }
        fn pull(&self, remote_file: &str) -> Result<std::path::PathBuf, TargetError> {
            let path = self.work_dir.join(format!("stopper_{remote_file}"));
            fs::write(&path, artifact_json("the cat sat", 10, 1.0))?;
            Ok(path)
        }
        fn exec_shell(&self, _command: &str) -> Result<String, TargetError> {
            self.ctx.request_stop();
            Ok(String::new())
        }
        fn remove(&self, _remote_file: &str) -> Result<(), TargetError> {
            Ok(())
        }
        fn benchmark_command(&self, test_bin: &str, audio_file: &str, model: &str) -> String {
            format!("{test_bin} {audio_file} {model}")
        }
    }

    #[test]
    fn test_stop_mid_run_finishes_job_and_keeps_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 3);
        let ctx = test_ctx(tmp.path(), 1);
        let target = StoppingTarget {
            ctx: &ctx,
            work_dir: tmp.path().to_path_buf(),
        };

        let report = TargetRunner::new(&target, &ctx).run(&jobs);

        // The stop lands while job 1 executes: that job runs to completion
        // and is scored, the remaining jobs are never attempted.
        assert_eq!(report.completed, 1);
        assert_eq!(report.reports.len(), 1);
        assert!(report.reports[0].is_some());
        assert!(
            crate::report::checkpoint_path(tmp.path(), "stopper").exists(),
            "a run stopped between jobs must leave its checkpoint on disk"
        );
    }

    #[test]
    fn test_checkpoint_survives_early_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let jobs = make_jobs(tmp.path(), 4);
        let artifacts = (0..4)
            .map(|_| Some(artifact_json("the cat sat", 10, 1.0)))
            .collect();
        let target = MockTarget::new("dev1", tmp.path(), tmp.path(), artifacts);
        let ctx = test_ctx(tmp.path(), 2);

        // Stop after the runner has started; simplest deterministic variant
        // is stopping before the run, then verifying no reports are attempted
        // and a pre-existing checkpoint is left alone.
        write_checkpoint(tmp.path(), "dev1", &[]).unwrap();
        ctx.request_stop();
        let report = TargetRunner::new(&target, &ctx).run(&jobs);
        assert!(report.reports.is_empty());
        assert!(
            crate::report::checkpoint_path(tmp.path(), "dev1").exists(),
            "an interrupted run must leave its checkpoint on disk"
        );
    }

    // -----------------------------------------------------------------------
    // Counter
    // -----------------------------------------------------------------------

    #[test]
    fn test_job_counter_never_repeats_across_threads() {
        let counter = JobCounter::new();
        let mut all: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| (0..100).map(|_| counter.next()).collect::<Vec<u64>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        all.sort_unstable();
        let before = all.len();
        all.dedup();
        assert_eq!(all.len(), before, "duplicate sequence numbers observed");
        assert_eq!(all.len(), 800);
    }
}

