//! `staticpage render` — write both documents (the default command).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use staticpage_runtime::{
    init_tracing, start_blocking, ConversionOutcome, ExecOptions, ExecReport, LogFormat,
};

/// Arguments for `staticpage render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Directory to write the documents into.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Give up on the streaming render after this many milliseconds
    /// (waits indefinitely when omitted).
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Emit log lines as JSON.
    #[arg(long)]
    pub log_json: bool,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        init_tracing(if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        });

        let mut options = ExecOptions::new(&self.out_dir);
        if let Some(ms) = self.timeout_ms {
            options = options.ready_timeout(Duration::from_millis(ms));
        }

        let report = start_blocking(&options).context("could not start the renderer runtime")?;

        // Per-document failures are reported, not turned into an exit code.
        if self.json {
            let json = serde_json::to_string_pretty(&report).context("serialize report")?;
            println!("{json}");
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &ExecReport) {
    for conversion in &report.conversions {
        let path = conversion.path.display();
        let label = conversion.strategy.to_string();
        match &conversion.outcome {
            ConversionOutcome::Written { bytes, .. } => println!(
                "{} {label:<17} {path} ({bytes} bytes, {} ms)",
                "✓".green().bold(),
                conversion.elapsed_ms
            ),
            ConversionOutcome::Unchanged { .. } => {
                println!("{} {label:<17} {path} (unchanged)", "·".green())
            }
            ConversionOutcome::Failed { error } => {
                println!("{} {label:<17} {path}: {error}", "✗".red().bold())
            }
            ConversionOutcome::TimedOut { waited_ms } => println!(
                "{} {label:<17} {path}: not ready after {waited_ms} ms",
                "⏱".yellow().bold()
            ),
        }
        for err in &conversion.recovered_errors {
            println!("    {} {err}", "!".yellow());
        }
    }
}
