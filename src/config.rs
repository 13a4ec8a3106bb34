//! Environment-driven configuration.
//!
//! Read once at startup, after `.env` has been loaded. Provider keys keep
//! their conventional names; crate-specific knobs carry the `VERITY_`
//! prefix. A missing optional key disables the feature it gates and logs a
//! warning instead of failing startup.

use std::env;

use tracing::warn;

use crate::consensus::DEFAULT_VOTE_THRESHOLDS;

#[derive(Debug, Clone)]
pub struct VerityConfig {
    /// Directory holding the evidence cache artifacts.
    pub data_dir: String,
    /// Persist the cache synchronously after every accepted add.
    pub cache_auto_persist: bool,
    pub judge_url: Option<String>,
    pub judge_api_key: Option<String>,
    pub anchor_url: Option<String>,
    pub factcheck_api_key: Option<String>,
    pub newsapi_key: Option<String>,
    /// Vote counts that seal a consensus snapshot, ascending and unique.
    pub vote_thresholds: Vec<usize>,
    pub source_timeout_secs: u64,
    pub judge_max_attempts: u32,
    pub log_level: String,
}

impl Default for VerityConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            cache_auto_persist: false,
            judge_url: None,
            judge_api_key: None,
            anchor_url: None,
            factcheck_api_key: None,
            newsapi_key: None,
            vote_thresholds: DEFAULT_VOTE_THRESHOLDS.to_vec(),
            source_timeout_secs: 10,
            judge_max_attempts: 3,
            log_level: "info".to_string(),
        }
    }
}

impl VerityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let factcheck_api_key = optional("FACTCHECK_API_KEY");
        if factcheck_api_key.is_none() {
            warn!("FACTCHECK_API_KEY not set; fact-check search will be skipped");
        }
        let newsapi_key = optional("NEWSAPI_KEY");
        if newsapi_key.is_none() {
            warn!("NEWSAPI_KEY not set; news search will be skipped");
        }

        let vote_thresholds = match env::var("VERITY_VOTE_THRESHOLDS") {
            Ok(raw) => {
                let parsed = parse_thresholds(&raw);
                if parsed.is_empty() {
                    warn!("VERITY_VOTE_THRESHOLDS has no usable values; keeping defaults");
                    defaults.vote_thresholds.clone()
                } else {
                    parsed
                }
            }
            Err(_) => defaults.vote_thresholds.clone(),
        };

        Self {
            data_dir: env::var("VERITY_DATA_DIR").unwrap_or(defaults.data_dir),
            cache_auto_persist: env::var("VERITY_CACHE_AUTO_PERSIST")
                .map(|v| v == "1")
                .unwrap_or(defaults.cache_auto_persist),
            judge_url: optional("VERITY_JUDGE_URL"),
            judge_api_key: optional("VERITY_JUDGE_API_KEY"),
            anchor_url: optional("VERITY_ANCHOR_URL"),
            factcheck_api_key,
            newsapi_key,
            vote_thresholds,
            source_timeout_secs: env::var("VERITY_SOURCE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.source_timeout_secs),
            judge_max_attempts: env::var("VERITY_JUDGE_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.judge_max_attempts),
            log_level: env::var("VERITY_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Parse a comma-separated threshold list, dropping junk entries and
/// normalizing to an ascending, duplicate-free sequence.
fn parse_thresholds(raw: &str) -> Vec<usize> {
    let mut thresholds: Vec<usize> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .filter(|&n| n > 0)
        .collect();
    thresholds.sort_unstable();
    thresholds.dedup();
    thresholds
}
