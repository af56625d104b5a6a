use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use oam_topology_core::manifest::{build_manifest, render_manifest};
use oam_topology_core::topology::{compute_topology, DeclarationSet};
use oam_topology_deploy::adapters::credentials::build_aws_registry;
use oam_topology_deploy::config::{load_topology, ConfigOverrides, DEFAULT_CONFIG_PATH};
use oam_topology_deploy::handlers::deploy::deploy_topology;
use oam_topology_deploy::handlers::destroy::destroy_topology;
use oam_topology_deploy::handlers::report::DeployReport;
use oam_topology_deploy::logging::{init_logging, LogFormat};

#[derive(Parser)]
#[command(
    name = "oam_topology",
    about = "Provision CloudWatch OAM sinks, sink policies and links across accounts",
    long_about = "Builds one sink and sink policy per region in the monitoring account and\n\
                  one link per source account and region, then reconciles them against AWS."
)]
struct Cli {
    /// Topology configuration file
    #[arg(long, env = "OAM_TOPOLOGY_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,
    /// Regions to use instead of the ones in the config file
    #[arg(long = "region", env = "OAM_TOPOLOGY_REGIONS", value_delimiter = ',', global = true)]
    regions: Vec<String>,
    /// Log output format (written to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and the declarations it produces
    Check,
    /// Print the synthesized declaration manifest as JSON
    Synth {
        /// Write the manifest to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show what a deploy would change without mutating anything
    Plan,
    /// Create or update sinks, sink policies and links
    Deploy,
    /// Delete links and sinks unless the removal policy is `retain`
    Destroy {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_declarations(cli: &Cli) -> Result<DeclarationSet, String> {
    let overrides = ConfigOverrides {
        regions: cli.regions.clone(),
    };
    let topology = load_topology(&cli.config, &overrides).map_err(|error| error.to_string())?;
    compute_topology(&topology).map_err(|error| format!("invalid topology: {error}"))
}

fn print_report(report: &DeployReport) -> Result<(), String> {
    let body = serde_json::to_string_pretty(report)
        .map_err(|error| format!("failed to serialize report: {error}"))?;
    println!("{body}");
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    let declarations = load_declarations(&cli)?;
    tracing::info!(
        component = "cli",
        event = "declarations_loaded",
        config = %cli.config.display(),
        project_id = %declarations.project_id,
        regions = declarations.sinks.len(),
        links = declarations.links.len(),
        fingerprint = %declarations.fingerprint(),
    );

    match cli.command {
        Commands::Check => {
            eprintln!(
                "ok: {} sinks, {} sink policies, {} links across {} credential contexts",
                declarations.sinks.len(),
                declarations.sink_policies.len(),
                declarations.links.len(),
                declarations.providers.len()
            );
            Ok(())
        }
        Commands::Synth { output } => {
            let body = render_manifest(&build_manifest(&declarations))
                .map_err(|error| format!("failed to render manifest: {error}"))?;
            match output {
                Some(path) => fs::write(&path, body)
                    .map_err(|error| format!("failed to write '{}': {error}", path.display())),
                None => {
                    println!("{body}");
                    Ok(())
                }
            }
        }
        Commands::Plan => {
            let registry = build_aws_registry(&declarations.providers).await;
            let report =
                deploy_topology(&declarations, &registry, true).map_err(|error| error.to_string())?;
            print_report(&report)
        }
        Commands::Deploy => {
            let registry = build_aws_registry(&declarations.providers).await;
            let report = deploy_topology(&declarations, &registry, false)
                .map_err(|error| error.to_string())?;
            print_report(&report)
        }
        Commands::Destroy { dry_run } => {
            let registry = build_aws_registry(&declarations.providers).await;
            let report = destroy_topology(&declarations, &registry, dry_run)
                .map_err(|error| error.to_string())?;
            print_report(&report)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!(component = "cli", event = "command_failed", error = %message);
            ExitCode::FAILURE
        }
    }
}
