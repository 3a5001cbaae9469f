//! Twitch Helix emotes client
//!
//! Fetches global and per-channel emotes from the Helix chat emotes endpoints.
//! Requests carry the application's client id and bearer token.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    fetch_failed, parse_json, Emote, EmoteProvider, EmoteSize, EmoteUrl, MalformedRecordError,
    Provider, ProviderError, TwitchUserId,
};
use crate::cache::{FetchCache, FetchRequest};
use crate::config::{TtlConfig, TwitchCredentials};

/// Base URL for the Twitch API
const TWITCH_API_BASE_URL: &str = "https://api.twitch.tv";

/// Base URL for Twitch emote images
const TWITCH_CDN_BASE_URL: &str = "https://static-cdn.jtvnw.net/emoticons/v2";

/// Cache key for the global emote set
const GLOBAL_CACHE_KEY: &str = "twitch-global-emotes";

/// Theme preferred when an emote offers it
const PREFERRED_THEME: &str = "light";

/// A single emote record from Helix
#[derive(Debug, Deserialize)]
struct TwitchEmote {
    id: String,
    name: String,
    #[serde(default)]
    theme_mode: Vec<String>,
    #[serde(default)]
    scale: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmoteResponse {
    data: Vec<TwitchEmote>,
}

/// Client for fetching emotes from the Twitch Helix API
#[derive(Debug, Clone)]
pub struct TwitchClient {
    cache: Arc<FetchCache>,
    credentials: TwitchCredentials,
    base_url: String,
    ttl: TtlConfig,
}

impl TwitchClient {
    /// Creates a client against the public Helix API
    pub fn new(cache: Arc<FetchCache>, credentials: TwitchCredentials, ttl: TtlConfig) -> Self {
        Self {
            cache,
            credentials,
            base_url: TWITCH_API_BASE_URL.to_string(),
            ttl,
        }
    }

    /// Points the client at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builds an authenticated GET request
    fn request(&self, url: String) -> FetchRequest {
        FetchRequest::get(url)
            .with_header("Client-Id", self.credentials.client_id.clone())
            .with_header("Authorization", self.credentials.bearer())
    }

    async fn fetch_emotes(
        &self,
        key: &str,
        url: String,
        ttl: std::time::Duration,
    ) -> Result<Vec<Emote>, ProviderError> {
        let body = self
            .cache
            .fetch_request(key, &self.request(url), ttl)
            .await
            .map_err(fetch_failed(Provider::Twitch))?;

        parse_response(&body)
    }
}

#[async_trait]
impl EmoteProvider for TwitchClient {
    fn provider(&self) -> Provider {
        Provider::Twitch
    }

    async fn fetch_global_emotes(&self) -> Result<Vec<Emote>, ProviderError> {
        let url = format!("{}/helix/chat/emotes/global", self.base_url);
        self.fetch_emotes(GLOBAL_CACHE_KEY, url, self.ttl.global)
            .await
    }

    async fn fetch_channel_emotes(
        &self,
        channel: TwitchUserId,
    ) -> Result<Vec<Emote>, ProviderError> {
        let url = format!(
            "{}/helix/chat/emotes?broadcaster_id={}",
            self.base_url, channel
        );
        let key = format!("twitch-channel-emotes-{}", channel);
        self.fetch_emotes(&key, url, self.ttl.channel).await
    }
}

/// Parses a Helix emotes response
///
/// Fails on the first record that has no theme.
fn parse_response(body: &[u8]) -> Result<Vec<Emote>, ProviderError> {
    let response: EmoteResponse = parse_json(Provider::Twitch, body)?;
    let emotes = response
        .data
        .iter()
        .map(parse_emote)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(emotes)
}

fn parse_emote(emote: &TwitchEmote) -> Result<Emote, MalformedRecordError> {
    let theme = pick_theme(emote)?;
    let urls = emote
        .scale
        .iter()
        .map(|scale| {
            EmoteUrl::new(
                scale_to_size(scale),
                format!(
                    "{}/{}/default/{}/{}",
                    TWITCH_CDN_BASE_URL, emote.id, theme, scale
                ),
            )
        })
        .collect();

    Ok(Emote::new(Provider::Twitch, emote.name.clone(), urls))
}

/// Picks the light theme when offered, otherwise the first listed
fn pick_theme(emote: &TwitchEmote) -> Result<&str, MalformedRecordError> {
    if emote.theme_mode.iter().any(|t| t == PREFERRED_THEME) {
        return Ok(PREFERRED_THEME);
    }
    emote
        .theme_mode
        .first()
        .map(String::as_str)
        .ok_or_else(|| MalformedRecordError {
            provider: Provider::Twitch,
            emote_id: emote.id.clone(),
            reason: "no themes defined".to_string(),
        })
}

/// Maps a Helix scale string to an emote size
///
/// Twitch's largest scale ("3.0") is 4x the base size.
fn scale_to_size(scale: &str) -> EmoteSize {
    match scale {
        "1.0" => EmoteSize::X1,
        "2.0" => EmoteSize::X2,
        "3.0" => EmoteSize::X4,
        _ => EmoteSize::X1,
    }
}
