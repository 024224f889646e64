use voxbench_core::{discover_devices, AdbTarget, HealthSource, LocalTarget, RemoteTarget};

pub fn run(include_local: bool) {
    let serials = discover_devices();

    println!("Found {} connected device(s):\n", serials.len());
    for serial in &serials {
        let target = AdbTarget::new(serial.clone(), ".");
        let info = target.info();
        let status = if info.reachable { "\u{2705}" } else { "\u{26A0}\u{FE0F}" };
        let battery = target
            .battery_level()
            .map_or_else(|| "?".to_string(), |b| format!("{b}%"));
        let thermal = target
            .thermal_reading()
            .map_or_else(|| "?".to_string(), |t| format!("{t:.1}C"));
        println!("  {status} {serial:<24} battery {battery:<6} thermal {thermal}");
    }

    if serials.is_empty() {
        println!("  (none found)");
    }

    if include_local {
        match LocalTarget::new("work") {
            Ok(local) => {
                let battery = local
                    .battery_level()
                    .map_or_else(|| "n/a".to_string(), |b| format!("{b}%"));
                println!("\n  \u{1F5A5}\u{FE0F} {:<24} battery {battery}", local.id());
            }
            Err(e) => eprintln!("Could not set up local target: {e}"),
        }
    }
}
