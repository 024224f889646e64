//! Fleet-wide dispatch.
//!
//! One worker thread per target, all started under a single scope so the
//! dispatcher cannot return while any target is still working. Targets
//! share nothing but the run context; a panic inside one worker is caught
//! and recorded as that target's failure without disturbing the others.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crate::job::BenchmarkJob;
use crate::report::TargetReport;
use crate::runner::{RunContext, TargetRunner};
use crate::target::RemoteTarget;

/// Terminal state of one target's worker.
#[derive(Debug)]
pub enum TargetOutcome {
    /// The worker ran its full sequence (individual jobs may still have
    /// been skipped) and its report file is on disk.
    Completed(TargetReport),
    /// The worker panicked or could not persist its report.
    Failed(String),
}

impl TargetOutcome {
    pub fn report(&self) -> Option<&TargetReport> {
        match self {
            Self::Completed(r) => Some(r),
            Self::Failed(_) => None,
        }
    }
}

/// Run the whole job list on every target concurrently.
///
/// Each target works through `jobs` in order at its own pace. The returned
/// map has exactly one entry per target; an empty target list yields an
/// empty map without touching the filesystem.
pub fn dispatch(
    targets: &[&dyn RemoteTarget],
    jobs: &[BenchmarkJob],
    ctx: &RunContext,
) -> BTreeMap<String, TargetOutcome> {
    let outcomes: Vec<(String, TargetOutcome)> = thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|&target| {
                let id = target.id().to_string();
                let handle = scope.spawn(move || run_one(target, jobs, ctx));
                (id, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(id, handle)| {
                let outcome = match handle.join() {
                    Ok(outcome) => outcome,
                    // join() only fails on a panic the worker itself did not
                    // catch, e.g. inside catch_unwind's own bookkeeping.
                    Err(_) => TargetOutcome::Failed("worker thread panicked".to_string()),
                };
                if let TargetOutcome::Failed(reason) = &outcome {
                    log::error!("[{id}] target failed: {reason}");
                }
                (id, outcome)
            })
            .collect()
    });

    outcomes.into_iter().collect()
}

fn run_one(target: &dyn RemoteTarget, jobs: &[BenchmarkJob], ctx: &RunContext) -> TargetOutcome {
    let id = target.id().to_string();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let report = TargetRunner::new(target, ctx).run(jobs);
        match report.write(&ctx.config.output_dir) {
            Ok(path) => {
                log::info!("[{id}] report written to {}", path.display());
                TargetOutcome::Completed(report)
            }
            Err(e) => TargetOutcome::Failed(format!("report write failed: {e}")),
        }
    }));

    result.unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        TargetOutcome::Failed(reason)
    })
}
