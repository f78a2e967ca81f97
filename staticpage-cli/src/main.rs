//! staticpage — publish the page as static HTML, rendered two ways.
//!
//! # Usage
//!
//! ```text
//! staticpage [--out-dir <dir>] [--timeout-ms <ms>] [--json] [--log-json]
//! staticpage render [--out-dir <dir>] [--timeout-ms <ms>] [--json] [--log-json]
//! staticpage diff [--out-dir <dir>]
//! ```
//!
//! With no arguments, writes `render-to-string.html` and
//! `render-with-pipeable-stream.html` into the current directory.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, render::RenderArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "staticpage",
    version,
    about = "Render the page to static HTML with a buffered and a streaming renderer",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render both documents (the default).
    Render(RenderArgs),

    /// Show a unified diff between the two written documents.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Render(args)) => args.run(),
        Some(Commands::Diff(args)) => args.run(),
        None => cli.render.run(),
    }
}
