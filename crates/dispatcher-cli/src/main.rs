//! dispatcher CLI — command-line front end for the tiered planning and
//! dispatch engine.
//!
//! Turns a natural-language request into classification, step-by-step
//! planning, and execution against the registered workflow catalog,
//! escalating to remote-model generation when no registered command fits.

mod commands;

use clap::{Parser, Subcommand};

/// dispatcher — tiered planning and dispatch engine
#[derive(Parser)]
#[command(name = "dispatcher", version, about = "Tiered planning and dispatch engine")]
pub struct Cli {
    /// Quick mode: run a request directly.
    /// Example: dispatcher -p "reply to the last email from alice"
    #[arg(short = 'p', long = "prompt")]
    prompt: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a natural-language request end to end
    Run {
        /// The request text
        request: String,
    },

    /// Print the deterministic command reference for every registered workflow
    List,

    /// Dispatch a single already-formed "namespace:name ..." command directly,
    /// bypassing the classifier and planner
    Exec {
        /// The command, e.g. "mail:list count:5"
        command: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let debug = std::env::var("DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    let default_filter = if debug {
        "dispatcher_core=debug,dispatcher_cli=debug"
    } else {
        "dispatcher_core=warn,dispatcher_cli=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let result = if let Some(request) = cli.prompt {
        commands::run::run(&request).await
    } else if let Some(command) = cli.command {
        match command {
            Commands::Run { request } => commands::run::run(&request).await,
            Commands::List => commands::list::run().await,
            Commands::Exec { command } => commands::exec::run(&command).await,
        }
    } else {
        use clap::CommandFactory;
        Cli::command().print_help().ok();
        println!();
        Ok(())
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
