//! temotes - Fetch chat emotes from Twitch, BetterTTV, FrankerFaceZ and 7TV
//!
//! Prints the emotes of the selected providers as a JSON array on stdout.
//! Logs go to stderr; set `RUST_LOG` to change verbosity.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use temotes::aggregate::collect_emotes;
use temotes::cli::{Cli, RunConfig};
use temotes::config::TwitchCredentials;
use temotes::providers::{build_provider, EmoteProvider};

/// Installs the stderr log subscriber, `info` unless `RUST_LOG` says otherwise
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    let run = match RunConfig::from_cli(&cli, TwitchCredentials::from_env()) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("error: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    let cache = run.config.build_cache()?;
    let providers: Vec<Box<dyn EmoteProvider>> = run
        .providers
        .iter()
        .map(|&provider| build_provider(provider, cache.clone(), &run.config))
        .collect();

    let report = collect_emotes(&providers, run.scope).await;

    let json = if run.pretty {
        serde_json::to_string_pretty(&report.emotes)?
    } else {
        serde_json::to_string(&report.emotes)?
    };
    println!("{}", json);

    if !report.any_succeeded() {
        for failure in &report.failures {
            eprintln!("error: {}", failure);
        }
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
