use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the OAM topology workspace",
    long_about = "A unified CLI for synthesizing, planning and deploying the OAM topology,\n\
                  and for running CI checks in the workspace."
)]
struct Cli {
    /// Topology configuration passed through to oam_topology
    #[arg(long, env = "OAM_TOPOLOGY_CONFIG", default_value = "oam-topology.toml", global = true)]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration
    Check,
    /// Print the synthesized declaration manifest
    Synth {
        /// Output file path
        #[arg(long)]
        output: Option<String>,
    },
    /// Show what a deploy would change
    Plan,
    /// Deploy sinks, sink policies and links
    Deploy,
    /// Tear the topology down
    Destroy {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Synthesize the sample topology with placeholder-free test ids
    Synth,
    /// Run check + synth
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_topology(config: &str, args: &[&str]) {
    let mut cargo_args = vec![
        "run",
        "-p",
        "oam_topology_deploy",
        "--bin",
        "oam_topology",
        "--",
        "--config",
        config,
    ];
    cargo_args.extend_from_slice(args);
    run_cargo(&cargo_args);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test oam_topology_core");
    run_cargo(&["test", "-p", "oam_topology_core"]);

    step("Test oam_topology_deploy");
    run_cargo(&["test", "-p", "oam_topology_deploy"]);
}

fn ci_synth() {
    step("Synthesize CI fixture topology");
    run_topology("xtask/fixtures/ci-topology.toml", &["synth"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_str();

    match cli.command {
        Commands::Check => run_topology(config, &["check"]),
        Commands::Synth { output } => match output {
            Some(path) => run_topology(config, &["synth", "--output", &path]),
            None => run_topology(config, &["synth"]),
        },
        Commands::Plan => run_topology(config, &["plan"]),
        Commands::Deploy => run_topology(config, &["deploy"]),
        Commands::Destroy { dry_run } => {
            if dry_run {
                run_topology(config, &["destroy", "--dry-run"]);
            } else {
                run_topology(config, &["destroy"]);
            }
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Synth => ci_synth(),
                CiJob::All => {
                    ci_check();
                    ci_synth();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
