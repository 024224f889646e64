use std::path::Path;
use std::sync::Arc;

use voxbench_core::{dispatch, load_jobs, LocalTarget, RunConfig, RunContext, TargetOutcome};

use super::{as_target_refs, make_adb_targets};

pub struct RunCommandConfig<'a> {
    pub input: &'a str,
    pub output: &'a str,
    pub device_filter: Option<&'a str>,
    pub local: bool,
    pub test_bin: &'a str,
    pub model: &'a str,
    pub root_path: Option<&'a str>,
    pub checkpoint_every: usize,
}

pub fn run(cmd: RunCommandConfig<'_>) {
    let jobs = match load_jobs(Path::new(cmd.input)) {
        Ok(jobs) if jobs.is_empty() => {
            eprintln!("Error: no benchmark jobs found under {}", cmd.input);
            std::process::exit(1);
        }
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("Error loading dataset {}: {e}", cmd.input);
            std::process::exit(1);
        }
    };

    let host_work_dir = Path::new(cmd.output).join("pulled");
    if let Err(e) = std::fs::create_dir_all(&host_work_dir) {
        eprintln!("Error creating {}: {e}", host_work_dir.display());
        std::process::exit(1);
    }
    let adb_targets = if cmd.local {
        Vec::new()
    } else {
        let mut targets =
            make_adb_targets(&host_work_dir.display().to_string(), cmd.device_filter);
        if let Some(root) = cmd.root_path {
            targets = targets
                .into_iter()
                .map(|t| t.with_root_path(root))
                .collect();
        }
        targets
    };
    let local_target = if cmd.local {
        match LocalTarget::new(host_work_dir.join("localhost")) {
            Ok(t) => Some(t),
            Err(e) => {
                eprintln!("Error setting up local target: {e}");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let targets = as_target_refs(&adb_targets, local_target.as_ref());
    if targets.is_empty() {
        eprintln!("Error: no targets to run on (try `voxbench scan`, or --local)");
        std::process::exit(1);
    }

    let ctx = Arc::new(RunContext::new(RunConfig {
        output_dir: cmd.output.into(),
        test_bin: cmd.test_bin.to_string(),
        model: cmd.model.to_string(),
        checkpoint_every: cmd.checkpoint_every,
        ..RunConfig::default()
    }));

    // First Ctrl-C finishes in-flight jobs and checkpoints; a second one
    // kills the process the usual way.
    {
        let ctx = Arc::clone(&ctx);
        if let Err(e) = ctrlc::set_handler(move || {
            if ctx.stop_requested() {
                std::process::exit(130);
            }
            eprintln!("\nStopping after current jobs (Ctrl-C again to abort)...");
            ctx.request_stop();
        }) {
            log::warn!("could not install Ctrl-C handler: {e}");
        }
    }

    println!(
        "Run {} | {} job(s) x {} target(s) | model {}",
        ctx.run_id(),
        jobs.len(),
        targets.len(),
        cmd.model
    );

    let outcomes = dispatch(&targets, &jobs, &ctx);

    println!("\n{:<24} {:>9} {:>8} {:>10} {:>12}", "TARGET", "COMPLETED", "SKIPPED", "MEAN WER", "TOK/S");
    let mut failed = false;
    for (id, outcome) in &outcomes {
        match outcome {
            TargetOutcome::Completed(report) => {
                println!(
                    "{:<24} {:>9} {:>8} {:>10} {:>12}",
                    id,
                    report.completed,
                    report.skipped,
                    format_opt(report.mean_wer),
                    format_opt(report.throughput),
                );
            }
            TargetOutcome::Failed(reason) => {
                failed = true;
                println!("{id:<24} FAILED: {reason}");
            }
        }
    }
    println!("\nReports written to {}", cmd.output);

    if failed {
        std::process::exit(1);
    }
}

fn format_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.3}"))
}
