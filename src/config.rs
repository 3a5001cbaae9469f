//! Runtime configuration: credentials, cache TTLs and transport settings

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::{FetchCache, ReqwestTransport, StalePolicy, DEFAULT_TIMEOUT};

/// Environment variable holding the Twitch application client id
pub const TWITCH_CLIENT_ID_VAR: &str = "TWITCH_CLIENT_ID";

/// Environment variable holding the Twitch app access token
pub const TWITCH_ACCESS_TOKEN_VAR: &str = "TWITCH_ACCESS_TOKEN";

/// Default TTL for global emote sets
pub const DEFAULT_GLOBAL_TTL: Duration = Duration::from_secs(60 * 60);

/// Default TTL for per-channel emote sets
pub const DEFAULT_CHANNEL_TTL: Duration = Duration::from_secs(5 * 60);

/// Errors that can occur while turning configuration into live objects
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// How long fetched emote sets stay fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlConfig {
    /// TTL for global emote sets
    pub global: Duration,
    /// TTL for per-channel emote sets
    pub channel: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            global: DEFAULT_GLOBAL_TTL,
            channel: DEFAULT_CHANNEL_TTL,
        }
    }
}

/// Credentials for the Twitch Helix API
///
/// Missing values are kept as empty strings; Twitch answers such requests
/// with 401, which surfaces as a fetch error.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TwitchCredentials {
    pub client_id: String,
    pub access_token: String,
}

impl fmt::Debug for TwitchCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitchCredentials")
            .field("client_id", &self.client_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl TwitchCredentials {
    pub fn new(client_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Reads `TWITCH_CLIENT_ID` and `TWITCH_ACCESS_TOKEN` from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads credentials through `lookup`, treating absent values as empty
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = lookup(TWITCH_CLIENT_ID_VAR).unwrap_or_default();
        let access_token = lookup(TWITCH_ACCESS_TOKEN_VAR).unwrap_or_default();
        let credentials = Self {
            client_id,
            access_token,
        };
        if !credentials.is_complete() {
            tracing::debug!("Twitch credentials incomplete; Twitch requests will be rejected");
        }
        credentials
    }

    /// Whether both values are present
    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.access_token.is_empty()
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Everything needed to build the cache and provider clients
#[derive(Debug, Clone)]
pub struct Config {
    /// Emote set TTLs
    pub ttl: TtlConfig,
    /// Whether stale data may stand in for a failed refresh
    pub stale_policy: StalePolicy,
    /// Per-request HTTP timeout
    pub timeout: Duration,
    /// Twitch API credentials
    pub twitch: TwitchCredentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl: TtlConfig::default(),
            stale_policy: StalePolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            twitch: TwitchCredentials::default(),
        }
    }
}

impl Config {
    /// Builds the process-wide fetch cache over a reqwest transport
    pub fn build_cache(&self) -> Result<Arc<FetchCache>, ConfigError> {
        let transport = ReqwestTransport::with_timeout(self.timeout)?;
        let cache = FetchCache::new(Arc::new(transport)).with_stale_policy(self.stale_policy);
        Ok(Arc::new(cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ttl_config_default() {
        let ttl = TtlConfig::default();
        assert_eq!(ttl.global, Duration::from_secs(3600));
        assert_eq!(ttl.channel, Duration::from_secs(300));
        assert!(ttl.channel < ttl.global);
    }

    #[test]
    fn test_credentials_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (TWITCH_CLIENT_ID_VAR, "client"),
            (TWITCH_ACCESS_TOKEN_VAR, "token"),
        ]);
        let creds = TwitchCredentials::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(creds.client_id, "client");
        assert_eq!(creds.access_token, "token");
        assert!(creds.is_complete());
        assert_eq!(creds.bearer(), "Bearer token");
    }

    #[test]
    fn test_credentials_missing_values_are_empty() {
        let creds = TwitchCredentials::from_lookup(|_| None);
        assert_eq!(creds, TwitchCredentials::default());
        assert!(!creds.is_complete());
        assert_eq!(creds.bearer(), "Bearer ");
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let creds = TwitchCredentials::new("client", "super-secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("client"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.ttl, TtlConfig::default());
        assert_eq!(config.stale_policy, StalePolicy::Strict);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_build_cache_applies_stale_policy() {
        let config = Config {
            stale_policy: StalePolicy::ServeStaleOnError,
            ..Default::default()
        };
        let cache = config.build_cache().expect("client should build");
        assert_eq!(cache.stale_policy(), StalePolicy::ServeStaleOnError);
        assert!(cache.is_empty());
    }
}
