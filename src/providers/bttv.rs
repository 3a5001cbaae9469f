//! BetterTTV API client
//!
//! Fetches global and per-channel emotes from the BetterTTV v3 API and maps
//! them to the common emote representation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    fetch_failed, parse_json, Emote, EmoteProvider, EmoteSize, EmoteUrl, Provider, ProviderError,
    TwitchUserId,
};
use crate::cache::FetchCache;
use crate::config::TtlConfig;

/// Base URL for the BetterTTV API
const BTTV_API_BASE_URL: &str = "https://api.betterttv.net";

/// Base URL for BetterTTV emote images
const BTTV_CDN_BASE_URL: &str = "https://cdn.betterttv.net/emote";

/// Cache key for the global emote set
const GLOBAL_CACHE_KEY: &str = "bttv-global-emotes";

/// Emote codes BetterTTV renders as overlays
///
/// BetterTTV has no zero-width flag in its API; chat clients hardcode this list.
const ZERO_WIDTH_CODES: &[&str] = &[
    "SoSnowy", "IceCold", "SantaHat", "TopHat", "ReinDeer", "CandyCane", "cvMask", "cvHazmat",
];

/// A single emote record from the API
#[derive(Debug, Deserialize)]
struct BttvEmote {
    id: String,
    code: String,
}

/// Response of the per-channel endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelResponse {
    #[serde(default)]
    channel_emotes: Vec<BttvEmote>,
    #[serde(default)]
    shared_emotes: Vec<BttvEmote>,
}

/// Client for fetching emotes from BetterTTV
#[derive(Debug, Clone)]
pub struct BttvClient {
    cache: Arc<FetchCache>,
    base_url: String,
    ttl: TtlConfig,
}

impl BttvClient {
    /// Creates a client against the public BetterTTV API
    pub fn new(cache: Arc<FetchCache>, ttl: TtlConfig) -> Self {
        Self {
            cache,
            base_url: BTTV_API_BASE_URL.to_string(),
            ttl,
        }
    }

    /// Points the client at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn channel_cache_key(channel: TwitchUserId) -> String {
        format!("bttv-channel-emotes-{}", channel)
    }
}

#[async_trait]
impl EmoteProvider for BttvClient {
    fn provider(&self) -> Provider {
        Provider::Bttv
    }

    async fn fetch_global_emotes(&self) -> Result<Vec<Emote>, ProviderError> {
        let url = format!("{}/3/cached/emotes/global", self.base_url);
        let body = self
            .cache
            .fetch(GLOBAL_CACHE_KEY, &url, self.ttl.global)
            .await
            .map_err(fetch_failed(Provider::Bttv))?;

        parse_global_response(&body)
    }

    async fn fetch_channel_emotes(
        &self,
        channel: TwitchUserId,
    ) -> Result<Vec<Emote>, ProviderError> {
        let url = format!("{}/3/cached/users/twitch/{}", self.base_url, channel);
        let body = self
            .cache
            .fetch(&Self::channel_cache_key(channel), &url, self.ttl.channel)
            .await
            .map_err(fetch_failed(Provider::Bttv))?;

        parse_channel_response(&body)
    }
}

/// Parses the global endpoint's bare array of emotes
fn parse_global_response(body: &[u8]) -> Result<Vec<Emote>, ProviderError> {
    let emotes: Vec<BttvEmote> = parse_json(Provider::Bttv, body)?;
    Ok(emotes.iter().map(parse_emote).collect())
}

/// Parses the channel endpoint; channel emotes come before shared ones
fn parse_channel_response(body: &[u8]) -> Result<Vec<Emote>, ProviderError> {
    let response: ChannelResponse = parse_json(Provider::Bttv, body)?;
    Ok(response
        .channel_emotes
        .iter()
        .chain(response.shared_emotes.iter())
        .map(parse_emote)
        .collect())
}

fn parse_emote(emote: &BttvEmote) -> Emote {
    Emote::with_zero_width(
        Provider::Bttv,
        emote.code.clone(),
        emote_urls(&emote.id),
        is_zero_width(&emote.code),
    )
}

/// Builds the 1x/2x/3x CDN URLs for an emote id
pub fn emote_urls(id: &str) -> Vec<EmoteUrl> {
    [
        (EmoteSize::X1, "1x"),
        (EmoteSize::X2, "2x"),
        (EmoteSize::X3, "3x"),
    ]
    .into_iter()
    .map(|(size, scale)| EmoteUrl::new(size, format!("{}/{}/{}", BTTV_CDN_BASE_URL, id, scale)))
    .collect()
}

fn is_zero_width(code: &str) -> bool {
    ZERO_WIDTH_CODES.contains(&code)
}
