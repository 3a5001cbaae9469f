//! Fan-out over several providers
//!
//! Queries every selected provider concurrently and concatenates their emotes
//! in provider order. One provider failing does not affect the others; its
//! error is reported alongside the emotes that did arrive.

use futures::future::join_all;
use tracing::{info, warn};

use crate::providers::{Emote, EmoteProvider, Provider, ProviderError, TwitchUserId};

/// Which emote set to request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmoteScope {
    /// Emotes available everywhere
    Global,
    /// Emotes enabled in one channel
    Channel(TwitchUserId),
}

/// Outcome of a fan-out across providers
#[derive(Debug, Default)]
pub struct EmoteReport {
    /// Emotes from every provider that answered, in provider order
    pub emotes: Vec<Emote>,
    /// Providers that failed and why
    pub failures: Vec<ProviderError>,
    /// How many providers were asked
    pub queried: usize,
}

impl EmoteReport {
    /// Whether at least one provider answered
    pub fn any_succeeded(&self) -> bool {
        self.failures.len() < self.queried
    }

    /// Providers that failed, in provider order
    pub fn failed_providers(&self) -> Vec<Provider> {
        self.failures.iter().map(ProviderError::provider).collect()
    }
}

/// Fetches `scope` from every provider and gathers the results
pub async fn collect_emotes(
    providers: &[Box<dyn EmoteProvider>],
    scope: EmoteScope,
) -> EmoteReport {
    let results = join_all(providers.iter().map(|provider| async move {
        match scope {
            EmoteScope::Global => provider.fetch_global_emotes().await,
            EmoteScope::Channel(channel) => provider.fetch_channel_emotes(channel).await,
        }
    }))
    .await;

    let mut report = EmoteReport {
        queried: providers.len(),
        ..EmoteReport::default()
    };
    for (provider, result) in providers.iter().zip(results) {
        match result {
            Ok(emotes) => {
                info!(provider = %provider.provider(), count = emotes.len(), "fetched emotes");
                report.emotes.extend(emotes);
            }
            Err(err) => {
                warn!(provider = %provider.provider(), error = %err, "provider failed");
                report.failures.push(err);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchError;
    use crate::providers::{EmoteSize, EmoteUrl};
    use async_trait::async_trait;

    /// Provider returning canned results
    struct StaticProvider {
        provider: Provider,
        codes: Option<Vec<&'static str>>,
    }

    impl StaticProvider {
        fn ok(provider: Provider, codes: Vec<&'static str>) -> Box<dyn EmoteProvider> {
            Box::new(Self {
                provider,
                codes: Some(codes),
            })
        }

        fn failing(provider: Provider) -> Box<dyn EmoteProvider> {
            Box::new(Self {
                provider,
                codes: None,
            })
        }

        fn emotes(&self, prefix: &str) -> Result<Vec<Emote>, ProviderError> {
            match &self.codes {
                Some(codes) => Ok(codes
                    .iter()
                    .map(|code| {
                        Emote::new(
                            self.provider,
                            format!("{prefix}{code}"),
                            vec![EmoteUrl::new(EmoteSize::X1, "https://cdn/1x")],
                        )
                    })
                    .collect()),
                None => Err(ProviderError::Fetch {
                    provider: self.provider,
                    source: FetchError::Status {
                        url: "https://example.com".to_string(),
                        status: 503,
                    },
                }),
            }
        }
    }

    #[async_trait]
    impl EmoteProvider for StaticProvider {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn fetch_global_emotes(&self) -> Result<Vec<Emote>, ProviderError> {
            self.emotes("")
        }

        async fn fetch_channel_emotes(
            &self,
            channel: TwitchUserId,
        ) -> Result<Vec<Emote>, ProviderError> {
            self.emotes(&format!("{channel}:"))
        }
    }

    #[tokio::test]
    async fn test_collect_emotes_keeps_provider_order() {
        let providers = vec![
            StaticProvider::ok(Provider::Twitch, vec!["Kappa"]),
            StaticProvider::ok(Provider::Bttv, vec!["catJAM", "TopHat"]),
        ];

        let report = collect_emotes(&providers, EmoteScope::Global).await;

        let codes: Vec<&str> = report.emotes.iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec!["Kappa", "catJAM", "TopHat"]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_collect_emotes_does_not_dedup() {
        let providers = vec![
            StaticProvider::ok(Provider::Bttv, vec!["Same"]),
            StaticProvider::ok(Provider::SevenTv, vec!["Same"]),
        ];

        let report = collect_emotes(&providers, EmoteScope::Global).await;

        assert_eq!(report.emotes.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_emotes_reports_failures_and_continues() {
        let providers = vec![
            StaticProvider::failing(Provider::Twitch),
            StaticProvider::ok(Provider::Ffz, vec!["ZreknarF"]),
        ];

        let report = collect_emotes(&providers, EmoteScope::Channel(TwitchUserId(7))).await;

        assert_eq!(report.emotes.len(), 1);
        assert_eq!(report.emotes[0].code(), "7:ZreknarF");
        assert_eq!(report.failed_providers(), vec![Provider::Twitch]);
        assert_eq!(report.queried, 2);
        assert!(report.any_succeeded());
    }

    #[tokio::test]
    async fn test_collect_emotes_all_failed() {
        let providers = vec![
            StaticProvider::failing(Provider::Bttv),
            StaticProvider::failing(Provider::SevenTv),
        ];

        let report = collect_emotes(&providers, EmoteScope::Global).await;

        assert!(report.emotes.is_empty());
        assert_eq!(report.queried, 2);
        assert!(!report.any_succeeded());
    }

    #[tokio::test]
    async fn test_collect_emotes_with_no_providers() {
        let report = collect_emotes(&[], EmoteScope::Global).await;
        assert!(report.emotes.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(report.queried, 0);
        assert!(!report.any_succeeded());
    }
}
