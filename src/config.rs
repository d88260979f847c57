//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Poll interval used by waiting steps when none is configured
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Timeout for waiting steps that omit `timeout_ms`
pub const DEFAULT_TIMEOUT_MS: u64 = 8000;

/// Settle delay for text clicks that omit `safetyDelay_ms`
pub const DEFAULT_SETTLE_MS: u64 = 150;

/// Loaded specs stay cached this long (same window as a robots.txt cache)
pub const DEFAULT_SPEC_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval between polls in waiting steps, in milliseconds
    pub poll_interval_ms: u64,
    /// How long a loaded spec is reused before it is fetched again
    pub spec_cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            spec_cache_ttl_secs: DEFAULT_SPEC_CACHE_TTL_SECS,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `LABEL_SCRAPE_POLL_MS` and
    /// `LABEL_SCRAPE_CACHE_TTL_SECS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("LABEL_SCRAPE_POLL_MS") {
            config.poll_interval_ms = ms;
        }
        if let Some(secs) = env_u64("LABEL_SCRAPE_CACHE_TTL_SECS") {
            config.spec_cache_ttl_secs = secs;
        }
        config
    }

    pub fn poll_interval(&self) -> Duration {
        // a zero interval would spin the poll loop
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn spec_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.spec_cache_ttl_secs)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring non-numeric config value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.spec_cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"poll_interval_ms": 25}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 25);
        assert_eq!(config.spec_cache_ttl_secs, DEFAULT_SPEC_CACHE_TTL_SECS);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = EngineConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
