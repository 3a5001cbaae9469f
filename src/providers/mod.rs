//! Core emote models and provider adapters
//!
//! This module contains the common emote representation every provider is
//! normalized into, and one client per third-party emote service.

pub mod bttv;
pub mod ffz;
pub mod seventv;
pub mod twitch;

pub use bttv::BttvClient;
pub use ffz::FfzClient;
pub use seventv::SevenTvClient;
pub use twitch::TwitchClient;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::{FetchCache, FetchError};
use crate::config::Config;

/// Third-party service an emote comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "twitch")]
    Twitch,
    #[serde(rename = "bttv")]
    Bttv,
    #[serde(rename = "ffz")]
    Ffz,
    #[serde(rename = "7tv")]
    SevenTv,
}

impl Provider {
    /// Every supported provider, in output order
    pub const ALL: [Provider; 4] = [
        Provider::Twitch,
        Provider::Bttv,
        Provider::Ffz,
        Provider::SevenTv,
    ];

    /// Parses a provider name (case-insensitive).
    ///
    /// Accepted names:
    /// - "twitch" -> Twitch
    /// - "bttv" | "betterttv" -> Bttv
    /// - "ffz" | "frankerfacez" -> Ffz
    /// - "7tv" | "seventv" -> SevenTv
    ///
    /// Returns `None` if the input doesn't match any provider.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Provider> {
        match s.to_lowercase().trim() {
            "twitch" => Some(Provider::Twitch),
            "bttv" | "betterttv" => Some(Provider::Bttv),
            "ffz" | "frankerfacez" => Some(Provider::Ffz),
            "7tv" | "seventv" => Some(Provider::SevenTv),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Twitch => "Twitch",
            Provider::Bttv => "BetterTTV",
            Provider::Ffz => "FrankerFaceZ",
            Provider::SevenTv => "7TV",
        };
        f.write_str(name)
    }
}

/// Image scale of an emote URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EmoteSize {
    #[serde(rename = "1x")]
    X1,
    #[serde(rename = "2x")]
    X2,
    #[serde(rename = "3x")]
    X3,
    #[serde(rename = "4x")]
    X4,
}

/// One image URL of an emote at a given scale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmoteUrl {
    pub size: EmoteSize,
    pub url: String,
}

impl EmoteUrl {
    pub fn new(size: EmoteSize, url: impl Into<String>) -> Self {
        Self {
            size,
            url: url.into(),
        }
    }
}

/// Provider-independent emote record
///
/// Fields are private so a constructed emote cannot change; read them through
/// the accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emote {
    provider: Provider,
    code: String,
    urls: Vec<EmoteUrl>,
    #[serde(default)]
    zero_width: bool,
}

impl Emote {
    /// Creates a regular (not zero-width) emote
    pub fn new(provider: Provider, code: impl Into<String>, urls: Vec<EmoteUrl>) -> Self {
        Self {
            provider,
            code: code.into(),
            urls,
            zero_width: false,
        }
    }

    /// Creates an emote with an explicit zero-width flag
    pub fn with_zero_width(
        provider: Provider,
        code: impl Into<String>,
        urls: Vec<EmoteUrl>,
        zero_width: bool,
    ) -> Self {
        Self {
            zero_width,
            ..Self::new(provider, code, urls)
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Text code typed in chat
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Image URLs, smallest scale first
    pub fn urls(&self) -> &[EmoteUrl] {
        &self.urls
    }

    /// URL for a specific scale, if the emote has one
    pub fn url_for(&self, size: EmoteSize) -> Option<&str> {
        self.urls
            .iter()
            .find(|u| u.size == size)
            .map(|u| u.url.as_str())
    }

    /// Whether the emote overlays the previous one instead of standing alone
    pub fn is_zero_width(&self) -> bool {
        self.zero_width
    }
}

/// Numeric Twitch user (broadcaster) id; every provider keys channels by it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TwitchUserId(pub u64);

impl fmt::Display for TwitchUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A provider record is missing data needed to build an emote
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Malformed {provider} emote {emote_id}: {reason}")]
pub struct MalformedRecordError {
    pub provider: Provider,
    pub emote_id: String,
    pub reason: String,
}

/// Errors that can occur when fetching emotes from a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure or non-2xx response
    #[error("Failed to fetch {provider} emotes: {source}")]
    Fetch {
        provider: Provider,
        #[source]
        source: FetchError,
    },

    /// Response body is not the JSON shape the provider documents
    #[error("Failed to parse {provider} response: {source}")]
    Parse {
        provider: Provider,
        #[source]
        source: serde_json::Error,
    },

    /// A single record lacks required fields
    #[error(transparent)]
    MalformedRecord(#[from] MalformedRecordError),
}

impl ProviderError {
    /// Provider the failure came from
    pub fn provider(&self) -> Provider {
        match self {
            ProviderError::Fetch { provider, .. } | ProviderError::Parse { provider, .. } => {
                *provider
            }
            ProviderError::MalformedRecord(err) => err.provider,
        }
    }
}

/// A source of global and per-channel emotes
#[async_trait]
pub trait EmoteProvider: Send + Sync {
    /// Which provider this client talks to
    fn provider(&self) -> Provider;

    /// Emotes usable in every channel
    async fn fetch_global_emotes(&self) -> Result<Vec<Emote>, ProviderError>;

    /// Emotes enabled for one channel
    async fn fetch_channel_emotes(&self, channel: TwitchUserId)
        -> Result<Vec<Emote>, ProviderError>;
}

/// Builds the client for `provider` on top of a shared cache
pub fn build_provider(
    provider: Provider,
    cache: Arc<FetchCache>,
    config: &Config,
) -> Box<dyn EmoteProvider> {
    match provider {
        Provider::Twitch => Box::new(TwitchClient::new(
            cache,
            config.twitch.clone(),
            config.ttl,
        )),
        Provider::Bttv => Box::new(BttvClient::new(cache, config.ttl)),
        Provider::Ffz => Box::new(FfzClient::new(cache, config.ttl)),
        Provider::SevenTv => Box::new(SevenTvClient::new(cache, config.ttl)),
    }
}

/// Decodes a cached response body
pub(crate) fn parse_json<T: DeserializeOwned>(
    provider: Provider,
    body: &[u8],
) -> Result<T, ProviderError> {
    serde_json::from_slice(body).map_err(|source| ProviderError::Parse { provider, source })
}

/// Wraps a transport failure with the provider it came from
pub(crate) fn fetch_failed(provider: Provider) -> impl FnOnce(FetchError) -> ProviderError {
    move |source| ProviderError::Fetch { provider, source }
}
