//! CLI for voxbench — benchmark speech recognition across a device fleet.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voxbench")]
#[command(about = "voxbench — benchmark speech recognition across a device fleet")]
#[command(version = voxbench_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List execution targets visible from this host
    Scan {
        /// Include the local host as a target
        #[arg(long)]
        local: bool,
    },

    /// Run the benchmark over a dataset on every connected target
    Run {
        /// Dataset directory (with metadata.json) or a single audio file
        input: String,

        /// Directory for report and checkpoint files
        #[arg(long, default_value = "output")]
        output: String,

        /// Comma-separated device serial filter, or "all" for every device
        #[arg(long)]
        devices: Option<String>,

        /// Run on the local host instead of adb devices
        #[arg(long)]
        local: bool,

        /// Benchmark binary name on the target
        #[arg(long, default_value = "whisperax_cli")]
        test_bin: String,

        /// Model size argument passed to the binary
        #[arg(long, default_value = "tiny")]
        model: String,

        /// Override the on-device work root
        #[arg(long)]
        root_path: Option<String>,

        /// Checkpoint after every N completed jobs
        #[arg(long, default_value = "10")]
        checkpoint_every: usize,
    },

    /// Score a hypothesis transcript against a reference, offline
    Score {
        /// Reference transcript, or a path to a text file
        reference: String,

        /// Hypothesis transcript, or a path to a text file
        hypothesis: String,

        /// Print the full report as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Summarize a previously written report or checkpoint file
    Report {
        /// Path to a `<target>_report.json` or `<target>_checkpoint.json`
        path: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { local } => commands::scan::run(local),
        Commands::Run {
            input,
            output,
            devices,
            local,
            test_bin,
            model,
            root_path,
            checkpoint_every,
        } => commands::run::run(commands::run::RunCommandConfig {
            input: &input,
            output: &output,
            device_filter: devices.as_deref(),
            local,
            test_bin: &test_bin,
            model: &model,
            root_path: root_path.as_deref(),
            checkpoint_every,
        }),
        Commands::Score {
            reference,
            hypothesis,
            json,
        } => commands::score::run(&reference, &hypothesis, json),
        Commands::Report { path } => commands::report::run(&path),
    }
}
