//! 7TV API client
//!
//! Fetches the global emote set and a channel's active emote set from the 7TV
//! v3 API.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    fetch_failed, parse_json, Emote, EmoteProvider, EmoteSize, EmoteUrl, Provider, ProviderError,
    TwitchUserId,
};
use crate::cache::FetchCache;
use crate::config::TtlConfig;

/// Base URL for the 7TV API
const SEVENTV_API_BASE_URL: &str = "https://7tv.io";

/// Base URL for 7TV emote images
const SEVENTV_CDN_BASE_URL: &str = "https://cdn.7tv.app/emote";

/// Cache key for the global emote set
const GLOBAL_CACHE_KEY: &str = "7tv-global-emotes";

/// Active-emote flag bit marking an overlay emote
const ZERO_WIDTH_FLAG: u32 = 1 << 0;

/// An emote as enabled in an emote set
#[derive(Debug, Deserialize)]
struct ActiveEmote {
    id: String,
    name: String,
    #[serde(default)]
    flags: u32,
}

#[derive(Debug, Deserialize)]
struct EmoteSet {
    #[serde(default)]
    emotes: Vec<ActiveEmote>,
}

/// Response of the user-connection endpoint
#[derive(Debug, Deserialize)]
struct UserResponse {
    /// Absent when the channel never picked an emote set
    #[serde(default)]
    emote_set: Option<EmoteSet>,
}

/// Client for fetching emotes from 7TV
#[derive(Debug, Clone)]
pub struct SevenTvClient {
    cache: Arc<FetchCache>,
    base_url: String,
    ttl: TtlConfig,
}

impl SevenTvClient {
    pub fn new(cache: Arc<FetchCache>, ttl: TtlConfig) -> Self {
        Self {
            cache,
            base_url: SEVENTV_API_BASE_URL.to_string(),
            ttl,
        }
    }

    /// Points the client at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmoteProvider for SevenTvClient {
    fn provider(&self) -> Provider {
        Provider::SevenTv
    }

    async fn fetch_global_emotes(&self) -> Result<Vec<Emote>, ProviderError> {
        let url = format!("{}/v3/emote-sets/global", self.base_url);
        let body = self
            .cache
            .fetch(GLOBAL_CACHE_KEY, &url, self.ttl.global)
            .await
            .map_err(fetch_failed(Provider::SevenTv))?;

        let set: EmoteSet = parse_json(Provider::SevenTv, &body)?;
        Ok(set.emotes.iter().map(parse_emote).collect())
    }

    async fn fetch_channel_emotes(
        &self,
        channel: TwitchUserId,
    ) -> Result<Vec<Emote>, ProviderError> {
        let url = format!("{}/v3/users/twitch/{}", self.base_url, channel);
        let key = format!("7tv-channel-emotes-{}", channel);
        let body = self
            .cache
            .fetch(&key, &url, self.ttl.channel)
            .await
            .map_err(fetch_failed(Provider::SevenTv))?;

        let user: UserResponse = parse_json(Provider::SevenTv, &body)?;
        Ok(user
            .emote_set
            .map(|set| set.emotes.iter().map(parse_emote).collect::<Vec<_>>())
            .unwrap_or_default())
    }
}

fn parse_emote(emote: &ActiveEmote) -> Emote {
    Emote::with_zero_width(
        Provider::SevenTv,
        emote.name.clone(),
        emote_urls(&emote.id),
        emote.flags & ZERO_WIDTH_FLAG != 0,
    )
}

/// Builds the 1x-4x WebP URLs for an emote id
pub fn emote_urls(id: &str) -> Vec<EmoteUrl> {
    [
        (EmoteSize::X1, "1x"),
        (EmoteSize::X2, "2x"),
        (EmoteSize::X3, "3x"),
        (EmoteSize::X4, "4x"),
    ]
    .into_iter()
    .map(|(size, scale)| {
        EmoteUrl::new(size, format!("{}/{}/{}.webp", SEVENTV_CDN_BASE_URL, id, scale))
    })
    .collect()
}
