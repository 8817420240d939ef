//! Journey CLI - end-to-end wallet journey verification
//!
//! Drives a live deployment through a complete user journey:
//! - Removes the previous run's test identity
//! - Waits until the services under test report ready
//! - Runs the journey's steps in order, threading tokens and identifiers
//! - Prints a per-step report and exits with the overall verdict

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod journeys;
mod output;
mod runner;

use config::HarnessConfig;
use error::{CliError, CliResult};
use journeys::{JourneyKind, JourneyPlan};
use output::{OutputFormat, Progress};
use serde::Serialize;
use tabled::Tabled;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// Journey CLI application
#[derive(Parser, Debug)]
#[command(name = "journey")]
#[command(about = "Journey - end-to-end wallet journey verification", long_about = None)]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "JOURNEY_CONFIG", global = true)]
    config: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments for the default `run` command
    #[command(flatten)]
    run: RunArgs,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a journey against the configured deployment (default)
    Run(RunArgs),

    /// List the known journeys and their steps
    Catalog,

    /// Show the effective configuration
    Config,
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Journey to run
    #[arg(short, long, value_enum)]
    journey: Option<JourneyKind>,

    /// Backend API base URL
    #[arg(long, env = "JOURNEY_API_URL")]
    api_url: Option<String>,

    /// MPC service base URL
    #[arg(long, env = "JOURNEY_MPC_URL")]
    mpc_url: Option<String>,

    /// Blockchain middleware base URL
    #[arg(long, env = "JOURNEY_BLOCKCHAIN_URL")]
    blockchain_url: Option<String>,

    /// Ethereum JSON-RPC URL
    #[arg(long, env = "JOURNEY_RPC_URL")]
    rpc_url: Option<String>,

    /// Frontend URL
    #[arg(long, env = "JOURNEY_FRONTEND_URL")]
    frontend_url: Option<String>,

    /// Readiness attempts per service
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Seconds between readiness attempts
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Fraction of steps that must pass, from 0.5 to 1.0
    #[arg(long)]
    pass_fraction: Option<f64>,

    /// Per-call timeout in seconds
    #[arg(long)]
    step_timeout_secs: Option<u64>,

    /// Skip the pretest cleanup
    #[arg(long)]
    no_cleanup: bool,

    /// Skip the availability gate
    #[arg(long)]
    no_probe: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(journey) = self.journey {
            config.run.journey = journey;
        }
        let targets = &mut config.targets;
        for (flag, target) in [
            (&self.api_url, &mut targets.api_url),
            (&self.mpc_url, &mut targets.mpc_url),
            (&self.blockchain_url, &mut targets.blockchain_url),
            (&self.rpc_url, &mut targets.rpc_url),
            (&self.frontend_url, &mut targets.frontend_url),
        ] {
            if let Some(url) = flag {
                *target = url.clone();
            }
        }
        if let Some(attempts) = self.max_attempts {
            config.probe.max_attempts = attempts;
        }
        if let Some(secs) = self.interval_secs {
            config.probe.interval_secs = secs;
        }
        if let Some(fraction) = self.pass_fraction {
            config.run.pass_fraction = Some(fraction);
        }
        if let Some(secs) = self.step_timeout_secs {
            config.run.step_timeout_secs = secs;
        }
        if self.no_cleanup {
            config.cleanup.enabled = false;
        }
        if self.no_probe {
            config.probe.enabled = false;
        }
    }
}

/// Table row for the journey catalog
#[derive(Debug, Serialize, Tabled)]
struct CatalogRow {
    journey: String,
    steps: String,
    gate: String,
    #[tabled(rename = "pass fraction")]
    pass_fraction: f64,
    description: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; stdout belongs to the report
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    tokio::select! {
        result = execute(cli) => match result {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => ExitCode::FAILURE,
            Err(e) => {
                output::print_error(&format!("{:#}", e));
                let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
                ExitCode::from(code)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            output::print_error("Interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

/// Returns the verdict of the command; informational commands always pass.
async fn execute(cli: Cli) -> anyhow::Result<bool> {
    let mut config = HarnessConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Run(cli.run)) {
        Commands::Run(args) => {
            args.apply(&mut config);
            config.validate()?;
            Ok(run_journey(&config, cli.output).await?)
        }
        Commands::Catalog => {
            print_catalog(&config, cli.output)?;
            Ok(true)
        }
        Commands::Config => {
            print_config(&config, cli.output)?;
            Ok(true)
        }
    }
}

async fn run_journey(config: &HarnessConfig, format: OutputFormat) -> CliResult<bool> {
    let plan = JourneyPlan::build(config.run.journey, config)?;
    let progress = Progress::new(format);
    if format.is_human() {
        output::print_info(&format!(
            "Running journey {} ({} steps)",
            plan.kind,
            plan.chain.len()
        ));
    }

    let probe = config
        .probe
        .enabled
        .then(|| config.probe.to_probe_config());
    let summary = runner::run(&plan, probe, &config.cleanup.identity, &progress).await?;

    output::print_summary(&summary, format)?;
    Ok(summary.aggregate.verdict)
}

fn print_catalog(config: &HarnessConfig, format: OutputFormat) -> CliResult<()> {
    let mut rows = Vec::with_capacity(JourneyKind::ALL.len());
    for kind in JourneyKind::ALL {
        let plan = JourneyPlan::build(kind, config)?;
        let steps: Vec<&str> = plan.chain.steps().iter().map(|s| s.name.as_str()).collect();
        let gate = plan.gate_resources();
        rows.push(CatalogRow {
            journey: kind.name().to_string(),
            steps: steps.join(" -> "),
            gate: if gate.is_empty() {
                "-".to_string()
            } else {
                gate.join(", ")
            },
            pass_fraction: plan.policy.fraction(),
            description: kind.describe().to_string(),
        });
    }
    output::print_output(rows, format)
}

fn print_config(config: &HarnessConfig, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => print!("{}", toml::to_string_pretty(config)?),
        _ => output::print_single(config, format)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_bare_invocation_runs() {
        let cli = Cli::try_parse_from(["journey", "--journey", "legacy", "--no-probe"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.journey, Some(JourneyKind::Legacy));
        assert!(cli.run.no_probe);
    }

    #[test]
    fn test_unknown_journey_rejected_by_parser() {
        let err = Cli::try_parse_from(["journey", "run", "--journey", "nightly"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);

        let cli = Cli::try_parse_from(["journey", "run", "--journey", "onboarding"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.journey, Some(JourneyKind::Onboarding));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "journey",
            "run",
            "--api-url",
            "http://api.test",
            "--max-attempts",
            "2",
            "--pass-fraction",
            "1.0",
            "--no-cleanup",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };

        let mut config = HarnessConfig::default();
        args.apply(&mut config);
        assert_eq!(config.targets.api_url, "http://api.test");
        assert_eq!(config.targets.mpc_url, "http://localhost:8081");
        assert_eq!(config.probe.max_attempts, 2);
        assert_eq!(config.run.pass_fraction, Some(1.0));
        assert!(!config.cleanup.enabled);
        assert!(config.probe.enabled);
    }
}
