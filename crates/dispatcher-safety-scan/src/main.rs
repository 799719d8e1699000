//! Standalone CLI for auditing a generated workflow module off to the side,
//! outside the generation manager's own screen-before-load pass.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dispatcher_safety_scan::screen_source;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "dispatcher-safety-scan", about = "Static safety screener for generated workflow modules")]
struct Cli {
    /// Path to the `.rs` source file to screen.
    path: PathBuf,

    /// Print the report as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    path: String,
    scanned_at: String,
    is_safe: bool,
    issues: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let source = std::fs::read_to_string(&cli.path)
        .with_context(|| format!("failed to read {}", cli.path.display()))?;

    let result = screen_source(&source);
    let report = Report {
        path: cli.path.display().to_string(),
        scanned_at: chrono::Utc::now().to_rfc3339(),
        is_safe: result.is_safe,
        issues: result.issues,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_safe {
        println!("\u{2713} {} is safe to load", report.path);
    } else {
        println!("\u{2717} {} failed the safety screen:", report.path);
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }

    if report.is_safe {
        Ok(())
    } else {
        std::process::exit(1)
    }
}
