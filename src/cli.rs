//! Command-line interface parsing for temotes
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a `RunConfig` describing which providers to query and how to cache.

use clap::Parser;
use std::time::Duration;
use thiserror::Error;

use crate::aggregate::EmoteScope;
use crate::cache::StalePolicy;
use crate::config::{Config, TtlConfig, TwitchCredentials};
use crate::providers::{Provider, TwitchUserId};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified provider name is not recognized
    #[error("Invalid provider: '{0}'. Valid providers: twitch, bttv, ffz, 7tv")]
    InvalidProvider(String),

    /// The request timeout must be positive
    #[error("Timeout must be at least one second")]
    ZeroTimeout,
}

/// temotes - Fetch chat emotes from Twitch, BetterTTV, FrankerFaceZ and 7TV
#[derive(Parser, Debug)]
#[command(name = "temotes")]
#[command(about = "Fetch global or channel chat emotes as JSON")]
#[command(version)]
pub struct Cli {
    /// Provider to query; repeat for several. Defaults to all of them
    ///
    /// Valid providers: twitch, bttv, ffz, 7tv
    #[arg(short, long = "provider", value_name = "PROVIDER")]
    pub providers: Vec<String>,

    /// Twitch broadcaster id; fetches that channel's emotes instead of global ones
    #[arg(short, long, value_name = "ID")]
    pub channel: Option<u64>,

    /// How long global emote sets stay cached, in seconds
    #[arg(long, value_name = "SECS")]
    pub global_ttl: Option<u64>,

    /// How long channel emote sets stay cached, in seconds
    #[arg(long, value_name = "SECS")]
    pub channel_ttl: Option<u64>,

    /// HTTP request timeout, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout: u64,

    /// Serve expired data when a refresh fails
    #[arg(long)]
    pub serve_stale: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Everything `main` needs to perform one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Providers to query, deduplicated, in the order given
    pub providers: Vec<Provider>,
    /// Global or channel emotes
    pub scope: EmoteScope,
    /// Whether to pretty-print JSON
    pub pretty: bool,
    /// Cache and transport configuration
    pub config: Config,
}

/// Parses a provider string argument into a Provider enum.
///
/// # Returns
/// * `Ok(Provider)` if the string matches a known provider
/// * `Err(CliError::InvalidProvider)` if it doesn't
pub fn parse_provider_arg(s: &str) -> Result<Provider, CliError> {
    Provider::from_str(s).ok_or_else(|| CliError::InvalidProvider(s.to_string()))
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments and credentials.
    ///
    /// # Returns
    /// * `Ok(RunConfig)` with defaults filled in for anything not given
    /// * `Err(CliError)` if a provider name or timeout is invalid
    pub fn from_cli(cli: &Cli, twitch: TwitchCredentials) -> Result<Self, CliError> {
        let providers = if cli.providers.is_empty() {
            Provider::ALL.to_vec()
        } else {
            let mut providers = Vec::new();
            for name in &cli.providers {
                let provider = parse_provider_arg(name)?;
                if !providers.contains(&provider) {
                    providers.push(provider);
                }
            }
            providers
        };

        if cli.timeout == 0 {
            return Err(CliError::ZeroTimeout);
        }

        let defaults = TtlConfig::default();
        let ttl = TtlConfig {
            global: cli
                .global_ttl
                .map(Duration::from_secs)
                .unwrap_or(defaults.global),
            channel: cli
                .channel_ttl
                .map(Duration::from_secs)
                .unwrap_or(defaults.channel),
        };

        let stale_policy = if cli.serve_stale {
            StalePolicy::ServeStaleOnError
        } else {
            StalePolicy::Strict
        };

        let scope = match cli.channel {
            Some(id) => EmoteScope::Channel(TwitchUserId(id)),
            None => EmoteScope::Global,
        };

        Ok(RunConfig {
            providers,
            scope,
            pretty: cli.pretty,
            config: Config {
                ttl,
                stale_policy,
                timeout: Duration::from_secs(cli.timeout),
                twitch,
            },
        })
    }
}
