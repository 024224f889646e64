//! Android device adapter over `adb`.
//!
//! Transfer and exec go through `adb -s <serial> push|pull|shell`; health
//! counters come from `dumpsys battery`, `dumpsys thermalservice` (highest
//! AP/CPU zone wins), and `dumpsys meminfo <bin>` (`TOTAL RSS:` column).
//! The output parsers are plain functions so they can be tested against
//! captured dumpsys text without a device attached.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::TargetError;
use crate::target::{HealthSource, RemoteTarget};

/// Default work root on the device for audio/model files.
pub const DEFAULT_ROOT_PATH: &str = "/sdcard/argmax/tflite";
/// Location of the pushed benchmark binary.
pub const DEFAULT_BIN_PATH: &str = "/data/local/tmp/bin";
/// Location of the pushed shared libraries.
pub const DEFAULT_LIB_PATH: &str = "/data/local/tmp/lib";

/// One attached Android device.
pub struct AdbTarget {
    serial: String,
    root_path: String,
    bin_path: String,
    lib_path: String,
    /// Host directory where pulled artifacts land.
    host_work_dir: PathBuf,
}

impl AdbTarget {
    pub fn new(serial: impl Into<String>, host_work_dir: impl Into<PathBuf>) -> Self {
        Self {
            serial: serial.into(),
            root_path: DEFAULT_ROOT_PATH.to_string(),
            bin_path: DEFAULT_BIN_PATH.to_string(),
            lib_path: DEFAULT_LIB_PATH.to_string(),
            host_work_dir: host_work_dir.into(),
        }
    }

    /// Override the on-device work root.
    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    /// Run `adb -s <serial> <args…>` and capture stdout.
    fn adb(&self, args: &[&str]) -> Result<String, TargetError> {
        let output = Command::new("adb")
            .arg("-s")
            .arg(&self.serial)
            .args(args)
            .output()
            .map_err(|e| TargetError::Execution(format!("adb: {e}")))?;
        if !output.status.success() {
            return Err(TargetError::Execution(format!(
                "adb {} exited with {}: {}",
                args.first().unwrap_or(&""),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl HealthSource for AdbTarget {
    fn battery_level(&self) -> Option<i64> {
        let out = self.exec_shell("dumpsys battery").ok()?;
        parse_battery_level(&out)
    }

    fn thermal_reading(&self) -> Option<f64> {
        let out = self.exec_shell("dumpsys thermalservice").ok()?;
        parse_thermal(&out)
    }

    fn process_rss_kb(&self, process: &str) -> Option<u64> {
        let out = self.exec_shell(&format!("dumpsys meminfo {process}")).ok()?;
        parse_total_rss(&out)
    }
}

impl RemoteTarget for AdbTarget {
    fn id(&self) -> &str {
        &self.serial
    }

    fn is_reachable(&self) -> bool {
        let Ok(output) = Command::new("adb").arg("devices").output() else {
            return false;
        };
        let listing = String::from_utf8_lossy(&output.stdout);
        parse_device_list(&listing).iter().any(|s| s == &self.serial)
    }

    fn push(&self, local: &Path, remote_subdir: &str) -> Result<(), TargetError> {
        if !local.exists() {
            return Err(TargetError::Transfer(format!(
                "local asset missing: {}",
                local.display()
            )));
        }
        let dest = format!("{}/{}/", self.root_path, remote_subdir);
        self.adb(&["push", &local.to_string_lossy(), &dest])
            .map_err(|e| TargetError::Transfer(e.to_string()))?;
        Ok(())
    }

    fn pull(&self, remote_file: &str) -> Result<PathBuf, TargetError> {
        let device_path = format!("{}/{}", self.root_path, remote_file);
        let host_path = self
            .host_work_dir
            .join(format!("{}_{}", self.serial, remote_file));
        self.adb(&["pull", &device_path, &host_path.to_string_lossy()])
            .map_err(|e| TargetError::Transfer(e.to_string()))?;
        if !host_path.exists() {
            return Err(TargetError::Transfer(format!(
                "pull produced no file at {}",
                host_path.display()
            )));
        }
        Ok(host_path)
    }

    fn exec_shell(&self, command: &str) -> Result<String, TargetError> {
        self.adb(&["shell", command])
    }

    fn remove(&self, remote_file: &str) -> Result<(), TargetError> {
        self.exec_shell(&format!("rm -f {}/{}", self.root_path, remote_file))
            .map(|_| ())
    }

    fn benchmark_command(&self, test_bin: &str, audio_file: &str, model: &str) -> String {
        let audio = format!("{}/inputs/{}", self.root_path, audio_file);
        format!(
            "cd {} && export LD_LIBRARY_PATH={} && {}/{} {} {} debug",
            self.root_path, self.lib_path, self.bin_path, test_bin, audio, model
        )
    }
}

/// Discover attached devices by parsing `adb devices`. An unreachable adb
/// binary yields an empty fleet, not an error: hosts without adb can still
/// run local benchmarks.
pub fn discover_devices() -> Vec<String> {
    match Command::new("adb").arg("devices").output() {
        Ok(output) => parse_device_list(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            log::warn!("adb not available: {e}");
            Vec::new()
        }
    }
}

/// Parse `adb devices` output into serials in the `device` state.
pub fn parse_device_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .skip_while(|l| !l.contains("attached"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Extract the battery percentage from `dumpsys battery` output.
pub fn parse_battery_level(out: &str) -> Option<i64> {
    out.lines()
        .find_map(|l| l.trim().strip_prefix("level:"))
        .and_then(|v| v.trim().parse().ok())
}

/// Extract the hottest AP/CPU temperature from `dumpsys thermalservice`
/// output.
pub fn parse_thermal(out: &str) -> Option<f64> {
    let mut highest: Option<f64> = None;
    for line in out.lines() {
        if !(line.contains("mName=AP") || line.contains("mName=CPU")) {
            continue;
        }
        let Some(idx) = line.find("mValue=") else {
            continue;
        };
        let rest = &line[idx + "mValue=".len()..];
        let value_str: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        if let Ok(v) = value_str.parse::<f64>() {
            highest = Some(highest.map_or(v, |h: f64| h.max(v)));
        }
    }
    highest
}

/// Extract the `TOTAL RSS:` value in KB from `dumpsys meminfo` output.
pub fn parse_total_rss(out: &str) -> Option<u64> {
    for line in out.lines() {
        if let Some(idx) = line.find("TOTAL RSS:") {
            let rest = &line[idx + "TOTAL RSS:".len()..];
            return rest.split_whitespace().next().and_then(|v| v.parse().ok());
        }
    }
    None
}
