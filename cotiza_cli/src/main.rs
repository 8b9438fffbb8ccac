use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "cotiza_cli=info,cotiza_core=info",
        1 => "cotiza_cli=debug,cotiza_core=debug",
        _ => "cotiza_cli=trace,cotiza_core=trace",
    }
}

/// Logs go to stderr so `--output json` stays machine-readable.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose)));
    let (plain, json) = if cli.log_json {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match &cli.command {
        Commands::Providers => providers::run(&cli).await,
        Commands::Search {
            query,
            sources,
            limit,
            max_results,
            plan,
        } => {
            search::run(
                &cli,
                query,
                sources.as_deref(),
                *limit,
                *max_results,
                plan.as_deref(),
            )
            .await
        }
        Commands::Quote {
            file,
            sources,
            plan,
        } => quote::run(&cli, file, sources.as_deref(), plan.as_deref()).await,
        Commands::Config { action } => config::run(&cli, action.clone()).await,
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(e.exit_code());
    }
}
