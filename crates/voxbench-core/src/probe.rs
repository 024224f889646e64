//! Background device-health probe for one job.
//!
//! Protocol:
//! 1. Take one "pre" boundary sample (battery, thermal) immediately
//! 2. Block on a condition variable until execution is signalled in-flight
//! 3. Poll peak resident memory at a fixed interval, keeping the max reading
//! 4. On the execution-ended signal, take one "post" boundary sample
//!
//! The probe yields exactly two boundary samples per job no matter how the
//! job ends: a job that fails mid-execution, or finishes before the probe
//! ever wakes, still produces a (pre, post) pair. Failed readings are absent
//! values; the job's execution path never depends on probe health.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::target::HealthSource;

/// Default polling interval for the peak-memory loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// One boundary reading taken at a job edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySample {
    pub battery: Option<i64>,
    pub thermal: Option<f64>,
}

/// Everything the probe observed across one job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub pre: BoundarySample,
    pub post: BoundarySample,
    /// Maximum single RSS reading observed while execution was in flight.
    /// Absent if no reading succeeded (or execution ended before the first
    /// poll).
    pub peak_mem_kb: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Probe armed, execution not yet in flight.
    Armed,
    Executing,
    Done,
}

/// Producer/consumer handoff between the runner and the probe.
///
/// The runner signals [`execution_started`](Self::execution_started) once the
/// remote invocation is in flight and [`execution_ended`](Self::execution_ended)
/// when it returns (or fails). The probe blocks on the condition variable for
/// the start signal; busy-waiting would burn the common case where jobs run
/// far longer than the signal latency.
#[derive(Debug, Default)]
pub struct ProbeSignal {
    phase: Mutex<Phase>,
    cond: Condvar,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Armed
    }
}

impl ProbeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the remote invocation as in flight.
    pub fn execution_started(&self) {
        let mut phase = self.phase.lock().unwrap();
        if *phase == Phase::Armed {
            *phase = Phase::Executing;
        }
        self.cond.notify_all();
    }

    /// Mark execution as finished (normally or not). Also used to release an
    /// armed probe when the job dies before execution begins.
    pub fn execution_ended(&self) {
        let mut phase = self.phase.lock().unwrap();
        *phase = Phase::Done;
        self.cond.notify_all();
    }

    /// Block until execution starts (or the job is abandoned).
    fn wait_for_start(&self) -> Phase {
        let mut phase = self.phase.lock().unwrap();
        while *phase == Phase::Armed {
            phase = self.cond.wait(phase).unwrap();
        }
        *phase
    }

    /// Sleep one polling interval, waking early on the end signal. Returns
    /// true while execution is still in flight.
    fn still_executing_after(&self, interval: Duration) -> bool {
        let mut phase = self.phase.lock().unwrap();
        if *phase == Phase::Executing {
            let (guard, _timeout) = self.cond.wait_timeout(phase, interval).unwrap();
            phase = guard;
        }
        *phase == Phase::Executing
    }
}

/// Run the probe for one job. Intended to run on its own (scoped) thread,
/// overlapping the remote invocation on the runner's thread.
pub fn probe_job<H: HealthSource + ?Sized>(
    health: &H,
    process: &str,
    signal: &ProbeSignal,
    interval: Duration,
) -> ProbeReport {
    let pre = BoundarySample {
        battery: health.battery_level(),
        thermal: health.thermal_reading(),
    };

    let mut peak_mem_kb: Option<u64> = None;
    if signal.wait_for_start() == Phase::Executing {
        loop {
            if let Some(rss) = health.process_rss_kb(process) {
                peak_mem_kb = Some(peak_mem_kb.map_or(rss, |p| p.max(rss)));
            }
            if !signal.still_executing_after(interval) {
                break;
            }
        }
    }

    let post = BoundarySample {
        battery: health.battery_level(),
        thermal: health.thermal_reading(),
    };

    ProbeReport {
        pre,
        post,
        peak_mem_kb,
    }
}
