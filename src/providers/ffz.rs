//! FrankerFaceZ API client

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{
    fetch_failed, parse_json, Emote, EmoteProvider, EmoteSize, EmoteUrl, MalformedRecordError,
    Provider, ProviderError, TwitchUserId,
};
use crate::cache::FetchCache;
use crate::config::TtlConfig;

const FFZ_API_BASE_URL: &str = "https://api.frankerfacez.com";
const FFZ_CDN_BASE_URL: &str = "https://cdn.frankerfacez.com/emote";
const GLOBAL_CACHE_KEY: &str = "ffz-global-emotes";

#[derive(Debug, Deserialize)]
struct FfzEmote {
    id: u64,
    name: String,
    /// Scale ("1", "2", "4") to image URL; only the keys matter
    #[serde(default)]
    urls: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Deserialize)]
struct FfzSet {
    #[serde(default)]
    emoticons: Vec<FfzEmote>,
}

#[derive(Debug, Deserialize)]
struct GlobalResponse {
    /// Set ids every user sees; other sets in `sets` are opt-in
    #[serde(default)]
    default_sets: Vec<u64>,
    #[serde(default)]
    sets: HashMap<String, FfzSet>,
}

#[derive(Debug, Deserialize)]
struct RoomResponse {
    #[serde(default)]
    sets: BTreeMap<String, FfzSet>,
}

/// Client for fetching emotes from FrankerFaceZ
#[derive(Debug, Clone)]
pub struct FfzClient {
    cache: Arc<FetchCache>,
    base_url: String,
    ttl: TtlConfig,
}

impl FfzClient {
    pub fn new(cache: Arc<FetchCache>, ttl: TtlConfig) -> Self {
        Self {
            cache,
            base_url: FFZ_API_BASE_URL.to_string(),
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
impl EmoteProvider for FfzClient {
    fn provider(&self) -> Provider {
        Provider::Ffz
    }

    async fn fetch_global_emotes(&self) -> Result<Vec<Emote>, ProviderError> {
        let url = format!("{}/v1/set/global", self.base_url);
        let body = self
            .cache
            .fetch(GLOBAL_CACHE_KEY, &url, self.ttl.global)
            .await
            .map_err(fetch_failed(Provider::Ffz))?;

        parse_global_response(&body)
    }

    async fn fetch_channel_emotes(
        &self,
        channel: TwitchUserId,
    ) -> Result<Vec<Emote>, ProviderError> {
        let url = format!("{}/v1/room/id/{}", self.base_url, channel);
        let key = format!("ffz-channel-emotes-{}", channel);
        let body = self
            .cache
            .fetch(&key, &url, self.ttl.channel)
            .await
            .map_err(fetch_failed(Provider::Ffz))?;

        parse_room_response(&body)
    }
}

fn parse_global_response(body: &[u8]) -> Result<Vec<Emote>, ProviderError> {
    let response: GlobalResponse = parse_json(Provider::Ffz, body)?;
    let mut emotes = Vec::new();
    for set_id in &response.default_sets {
        if let Some(set) = response.sets.get(&set_id.to_string()) {
            for emote in &set.emoticons {
                emotes.push(parse_emote(emote)?);
            }
        }
    }
    Ok(emotes)
}

fn parse_room_response(body: &[u8]) -> Result<Vec<Emote>, ProviderError> {
    let response: RoomResponse = parse_json(Provider::Ffz, body)?;
    let mut emotes = Vec::new();
    for set in response.sets.values() {
        for emote in &set.emoticons {
            emotes.push(parse_emote(emote)?);
        }
    }
    Ok(emotes)
}

fn parse_emote(emote: &FfzEmote) -> Result<Emote, MalformedRecordError> {
    let urls: Vec<EmoteUrl> = emote
        .urls
        .keys()
        .filter_map(|scale| scale_to_size(scale).map(|size| (size, scale)))
        .map(|(size, scale)| {
            EmoteUrl::new(size, format!("{}/{}/{}", FFZ_CDN_BASE_URL, emote.id, scale))
        })
        .collect();

    if urls.is_empty() {
        return Err(MalformedRecordError {
            provider: Provider::Ffz,
            emote_id: emote.id.to_string(),
            reason: "no image scales".to_string(),
        });
    }

    Ok(Emote::new(Provider::Ffz, emote.name.clone(), urls))
}

fn scale_to_size(scale: &str) -> Option<EmoteSize> {
    match scale {
        "1" => Some(EmoteSize::X1),
        "2" => Some(EmoteSize::X2),
        "4" => Some(EmoteSize::X4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReqwestTransport;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ffz_emote_json(id: u64, name: &str, scales: &[&str]) -> serde_json::Value {
        let urls: serde_json::Map<String, serde_json::Value> = scales
            .iter()
            .map(|s| {
                (
                    s.to_string(),
                    serde_json::Value::String(format!("https://cdn.frankerfacez.com/emote/{id}/{s}")),
                )
            })
            .collect();
        serde_json::json!({ "id": id, "name": name, "urls": urls })
    }

    #[test]
    fn test_parse_emote_urls_follow_declared_scales() {
        let emote: FfzEmote =
            serde_json::from_value(ffz_emote_json(9, "ZrehplaR", &["1", "2", "4"])).unwrap();

        let parsed = parse_emote(&emote).unwrap();

        assert_eq!(
            parsed.urls(),
            &[
                EmoteUrl::new(EmoteSize::X1, "https://cdn.frankerfacez.com/emote/9/1"),
                EmoteUrl::new(EmoteSize::X2, "https://cdn.frankerfacez.com/emote/9/2"),
                EmoteUrl::new(EmoteSize::X4, "https://cdn.frankerfacez.com/emote/9/4"),
            ]
        );
        assert!(!parsed.is_zero_width());
    }

    #[test]
    fn test_parse_emote_with_only_base_scale() {
        let emote: FfzEmote = serde_json::from_value(ffz_emote_json(3, "Small", &["1"])).unwrap();
        let parsed = parse_emote(&emote).unwrap();
        assert_eq!(parsed.urls().len(), 1);
    }

    #[test]
    fn test_parse_emote_without_scales_is_malformed() {
        let emote: FfzEmote = serde_json::from_value(ffz_emote_json(7, "Empty", &[])).unwrap();
        let err = parse_emote(&emote).unwrap_err();
        assert_eq!(err.emote_id, "7");
        assert_eq!(err.provider, Provider::Ffz);
    }

    #[test]
    fn test_parse_global_only_includes_default_sets() {
        let body = serde_json::to_vec(&serde_json::json!({
            "default_sets": [3],
            "sets": {
                "3": { "id": 3, "emoticons": [ffz_emote_json(1, "BeanieHipster", &["1", "2"])] },
                "4330": { "id": 4330, "emoticons": [ffz_emote_json(2, "OptIn", &["1"])] }
            },
            "users": {}
        }))
        .unwrap();

        let emotes = parse_global_response(&body).unwrap();

        assert_eq!(emotes.len(), 1);
        assert_eq!(emotes[0].code(), "BeanieHipster");
        assert_eq!(emotes[0].provider(), Provider::Ffz);
    }

    #[test]
    fn test_parse_room_includes_every_set() {
        let body = serde_json::to_vec(&serde_json::json!({
            "room": { "twitch_id": 22484632, "set": 1 },
            "sets": {
                "1": { "emoticons": [ffz_emote_json(10, "A", &["1"])] },
                "2": { "emoticons": [ffz_emote_json(11, "B", &["1", "2"])] }
            }
        }))
        .unwrap();

        let emotes = parse_room_response(&body).unwrap();

        let codes: Vec<&str> = emotes.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_fetch_channel_emotes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/room/id/22484632"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sets": { "1": { "emoticons": [ffz_emote_json(10, "forsenPls", &["1", "2", "4"])] } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(FetchCache::new(Arc::new(ReqwestTransport::new())));
        let client = FfzClient::new(cache.clone(), TtlConfig::default()).with_base_url(server.uri());

        let emotes = client
            .fetch_channel_emotes(TwitchUserId(22484632))
            .await
            .unwrap();
        let again = client
            .fetch_channel_emotes(TwitchUserId(22484632))
            .await
            .unwrap();

        assert_eq!(emotes, again);
        assert_eq!(emotes[0].code(), "forsenPls");
        assert!(cache.contains_fresh("ffz-channel-emotes-22484632"));
    }
}
