use std::fs;
use std::path::Path;

use voxbench_core::{MetricReport, TargetReport};

/// Summarize a report or checkpoint file. Checkpoints are bare report
/// lists; report files carry the target header as well.
pub fn run(path: &str) {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    };

    if let Ok(report) = serde_json::from_str::<TargetReport>(&raw) {
        println!(
            "Target {} | run {} | dataset {}",
            report.target_id, report.run_id, report.dataset
        );
        println!(
            "{} completed, {} skipped | mean WER {} | {} tok/s\n",
            report.completed,
            report.skipped,
            format_opt(report.mean_wer),
            format_opt(report.throughput),
        );
        print_jobs(&report.reports);
        return;
    }

    match serde_json::from_str::<Vec<Option<MetricReport>>>(&raw) {
        Ok(reports) => {
            let completed = reports.iter().filter(|r| r.is_some()).count();
            println!(
                "Checkpoint {} | {} job(s) recorded, {} completed\n",
                Path::new(path).display(),
                reports.len(),
                completed
            );
            print_jobs(&reports);
        }
        Err(e) => {
            eprintln!("Error: {path} is neither a report nor a checkpoint: {e}");
            std::process::exit(1);
        }
    }
}

fn print_jobs(reports: &[Option<MetricReport>]) {
    println!("{:<32} {:>8} {:>8} {:>10}", "FILE", "WER", "TOKENS", "ELAPSED");
    for (i, entry) in reports.iter().enumerate() {
        match entry {
            Some(r) => {
                let wer = if r.wer.is_nan() {
                    "n/a".to_string()
                } else {
                    format!("{:.3}", r.wer)
                };
                println!(
                    "{:<32} {:>8} {:>8} {:>9.1}s",
                    r.file, wer, r.cumulative_tokens, r.time_elapsed
                );
            }
            None => println!("job #{:<27} {:>8}", i + 1, "skipped"),
        }
    }
}

fn format_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |x| format!("{x:.3}"))
}
