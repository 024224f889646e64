//! Local-host adapter: runs the benchmark binary on the machine driving the
//! fleet. "Push" copies assets into a work directory, "pull" resolves files
//! inside it, and shell exec goes through `sh -c`. Health counters are
//! best-effort sysfs/ps reads; on hosts without a battery or thermal zone
//! they are simply absent.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::TargetError;
use crate::target::{HealthSource, RemoteTarget};

/// The host itself as an execution target.
pub struct LocalTarget {
    id: String,
    work_dir: PathBuf,
}

impl LocalTarget {
    /// Create a local target rooted at `work_dir`, creating it if needed.
    pub fn new(work_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let work_dir = work_dir.into();
        fs::create_dir_all(&work_dir)?;
        Ok(Self {
            id: "localhost".to_string(),
            work_dir,
        })
    }

    /// Override the target identifier. Needed when one host carries several
    /// work directories, since report files are named after the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

impl HealthSource for LocalTarget {
    fn battery_level(&self) -> Option<i64> {
        fs::read_to_string("/sys/class/power_supply/BAT0/capacity")
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    fn thermal_reading(&self) -> Option<f64> {
        // Millidegrees in sysfs; take the hottest zone, as on devices.
        let entries = fs::read_dir("/sys/class/thermal").ok()?;
        let mut highest: Option<f64> = None;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path().join("temp");
            if let Some(milli) = fs::read_to_string(&path)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
            {
                let celsius = milli / 1000.0;
                highest = Some(highest.map_or(celsius, |h: f64| h.max(celsius)));
            }
        }
        highest
    }

    fn process_rss_kb(&self, process: &str) -> Option<u64> {
        let output = Command::new("ps").args(["-eo", "rss=,comm="]).output().ok()?;
        parse_ps_rss(&String::from_utf8_lossy(&output.stdout), process)
    }
}

impl RemoteTarget for LocalTarget {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_reachable(&self) -> bool {
        self.work_dir.is_dir()
    }

    fn push(&self, local: &Path, remote_subdir: &str) -> Result<(), TargetError> {
        let dest_dir = self.work_dir.join(remote_subdir);
        fs::create_dir_all(&dest_dir)?;
        let name = local.file_name().ok_or_else(|| {
            TargetError::Transfer(format!("asset has no file name: {}", local.display()))
        })?;
        fs::copy(local, dest_dir.join(name))
            .map_err(|e| TargetError::Transfer(format!("{}: {e}", local.display())))?;
        Ok(())
    }

    fn pull(&self, remote_file: &str) -> Result<PathBuf, TargetError> {
        let path = self.work_dir.join(remote_file);
        if !path.exists() {
            return Err(TargetError::Transfer(format!(
                "no such file in work dir: {remote_file}"
            )));
        }
        Ok(path)
    }

    fn exec_shell(&self, command: &str) -> Result<String, TargetError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| TargetError::Execution(format!("sh: {e}")))?;
        if !output.status.success() {
            return Err(TargetError::Execution(format!(
                "command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn remove(&self, remote_file: &str) -> Result<(), TargetError> {
        match fs::remove_file(self.work_dir.join(remote_file)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn benchmark_command(&self, test_bin: &str, audio_file: &str, model: &str) -> String {
        format!(
            "{} {} {} debug",
            test_bin,
            self.work_dir.join("inputs").join(audio_file).display(),
            model
        )
    }
}

/// Find the largest RSS (KB) among processes whose command matches.
fn parse_ps_rss(ps_output: &str, process: &str) -> Option<u64> {
    let mut max: Option<u64> = None;
    for line in ps_output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(rss), Some(comm)) = (parts.next(), parts.next()) else {
            continue;
        };
        if !comm.contains(process) {
            continue;
        }
        if let Ok(kb) = rss.parse::<u64>() {
            max = Some(max.map_or(kb, |m| m.max(kb)));
        }
    }
    max
}
