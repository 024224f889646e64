pub mod report;
pub mod run;
pub mod scan;
pub mod score;

use voxbench_core::{discover_devices, AdbTarget, LocalTarget, RemoteTarget};

/// Build the target set for a run, filtering device serials by substring.
/// No filter (or "all") selects every discovered device.
pub fn make_adb_targets(host_work_dir: &str, serial_filter: Option<&str>) -> Vec<AdbTarget> {
    let serials = discover_devices();

    let selected: Vec<String> = match serial_filter {
        None => serials,
        Some("all") => serials,
        Some(filter) => {
            let wanted: Vec<&str> = filter.split(',').map(|s| s.trim()).collect();
            serials
                .into_iter()
                .filter(|s| wanted.iter().any(|w| s.contains(w)))
                .collect()
        }
    };

    selected
        .into_iter()
        .map(|serial| AdbTarget::new(serial, host_work_dir))
        .collect()
}

/// Collect trait-object references over both target kinds.
pub fn as_target_refs<'a>(
    adb: &'a [AdbTarget],
    local: Option<&'a LocalTarget>,
) -> Vec<&'a dyn RemoteTarget> {
    let mut refs: Vec<&dyn RemoteTarget> = adb.iter().map(|t| t as &dyn RemoteTarget).collect();
    if let Some(l) = local {
        refs.push(l);
    }
    refs
}

/// Read an argument that is either inline text or a path to a text file.
pub fn text_or_file(arg: &str) -> String {
    let path = std::path::Path::new(arg);
    if path.is_file() {
        match std::fs::read_to_string(path) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                eprintln!("Error reading {arg}: {e}");
                std::process::exit(1);
            }
        }
    } else {
        arg.to_string()
    }
}
