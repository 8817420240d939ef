//! Output formatting utilities

use crate::error::CliResult;
use crate::runner::RunSummary;
use colored::*;
use journey_client::CleanupOutcome;
use journey_engine::{ChainObserver, StepDefinition};
use journey_probe::ProbeEvent;
use journey_types::{StepOutcome, StepRecord};
use serde::Serialize;
use tabled::{Table, Tabled};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Progress lines and a per-step table
    #[default]
    Table,
    /// JSON document
    Json,
    /// YAML document
    Yaml,
}

impl OutputFormat {
    pub fn is_human(&self) -> bool {
        matches!(self, OutputFormat::Table)
    }
}

/// Print a vector of items in the specified format
pub fn print_output<T: Serialize + Tabled>(data: Vec<T>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&data)?),
    }
    Ok(())
}

/// Print a single item as a document; human mode falls back to JSON
pub fn print_single<T: Serialize>(data: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(data)?)
        }
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(data)?),
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

fn colored_label(outcome: &StepOutcome) -> ColoredString {
    match outcome {
        StepOutcome::Success { .. } => "success".green(),
        StepOutcome::Degraded { .. } => "DEGRADED".yellow().bold(),
        StepOutcome::Skipped { .. } => "skipped".dimmed(),
        StepOutcome::Failed { .. } => "failed".red(),
    }
}

// ── Live progress ────────────────────────────────────────────────────

/// Human-readable progress, silent in document formats
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    enabled: bool,
}

impl Progress {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            enabled: format.is_human(),
        }
    }

    pub fn cleanup(&self, identity: &str, outcome: &CleanupOutcome) {
        if !self.enabled {
            return;
        }
        let message = format!("Cleanup of {}: {}", identity, outcome);
        match outcome {
            CleanupOutcome::Removed | CleanupOutcome::NotFound => print_success(&message),
            _ => print_warning(&format!("{} (continuing)", message)),
        }
    }

    pub fn gate(&self, resources: &[String], worst_case: Duration) {
        if self.enabled {
            print_info(&format!(
                "Waiting for {} (up to {}s each)",
                resources.join(", "),
                worst_case.as_secs()
            ));
        }
    }

    /// Print gate events until the prober's channel closes.
    pub fn listen(&self, mut events: broadcast::Receiver<ProbeEvent>) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => print_probe_event(&event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

fn print_probe_event(event: &ProbeEvent) {
    match event {
        ProbeEvent::Attempt {
            resource,
            attempt,
            max_attempts,
            result,
        } if !result.ready => {
            let why = result.message.as_deref().unwrap_or("not ready");
            println!(
                "  {} {} attempt {}/{}: {}",
                "…".dimmed(),
                resource,
                attempt,
                max_attempts,
                why.dimmed()
            );
        }
        ProbeEvent::Ready { resource, attempts } => {
            print_success(&format!("{} ready after {} attempt(s)", resource, attempts));
        }
        ProbeEvent::Exhausted { resource, attempts } => {
            print_error(&format!("{} not ready after {} attempts", resource, attempts));
        }
        _ => {}
    }
}

impl ChainObserver for Progress {
    fn step_started(&self, index: usize, step: &StepDefinition) {
        if self.enabled {
            println!(
                "{} [{}] {}",
                "▶".blue(),
                index + 1,
                step.name.bold()
            );
        }
    }

    fn step_finished(&self, _index: usize, record: &StepRecord) {
        if !self.enabled {
            return;
        }
        let detail = record.outcome.detail().unwrap_or_default();
        println!(
            "    {} {} {}",
            colored_label(&record.outcome),
            detail.dimmed(),
            format!("({} ms)", record.elapsed_ms).dimmed()
        );
    }
}

// ── Final report ─────────────────────────────────────────────────────

/// Table row for step display
#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    step: String,
    outcome: String,
    detail: String,
    #[tabled(rename = "ms")]
    elapsed_ms: u64,
}

impl StepRow {
    fn new(index: usize, record: &StepRecord) -> Self {
        let detail = match &record.outcome {
            StepOutcome::Success { payload } => payload.keys().cloned().collect::<Vec<_>>().join(", "),
            StepOutcome::Degraded { reason, .. } => format!("synthetic ({})", reason.short()),
            StepOutcome::Skipped { missing } => format!("missing {}", missing.join(", ")),
            StepOutcome::Failed { cause } => cause.to_string(),
        };
        Self {
            index: index + 1,
            step: record.step.clone(),
            outcome: record.outcome.label().to_string(),
            detail,
            elapsed_ms: record.elapsed_ms,
        }
    }
}

/// Print the whole run in the requested format
pub fn print_summary(summary: &RunSummary, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(summary)?);
            return Ok(());
        }
        OutputFormat::Table => {}
    }

    let report = &summary.report;
    let aggregate = &summary.aggregate;

    let rows: Vec<StepRow> = report
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| StepRow::new(i, r))
        .collect();
    println!();
    println!("{}", Table::new(rows));

    let degraded: Vec<String> = report
        .degraded()
        .map(|r| match &r.outcome {
            StepOutcome::Degraded { reason, .. } => format!("{} ({})", r.step, reason),
            _ => r.step.clone(),
        })
        .collect();
    if !degraded.is_empty() {
        print_warning(&format!(
            "{} of {} passing step(s) used synthetic values, not the real service:",
            degraded.len(),
            aggregate.passed
        ));
        for line in degraded {
            println!("    {} {}", "-".yellow(), line);
        }
    }

    print_info(&format!(
        "Journey {} ({}): {} succeeded, {} degraded, {} skipped, {} failed in {} ms",
        report.journey,
        report.run_id.short(),
        aggregate.succeeded,
        aggregate.degraded,
        aggregate.skipped,
        aggregate.failed,
        summary.duration_ms.unwrap_or_default(),
    ));

    let verdict = format!(
        "{}/{} steps passed (threshold {})",
        aggregate.passed, aggregate.total, aggregate.threshold
    );
    if aggregate.verdict {
        print_success(&format!("PASS: {}", verdict));
    } else {
        print_error(&format!("FAIL: {}", verdict));
    }
    Ok(())
}
