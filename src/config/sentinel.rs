// src/config/sentinel.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::ingest::types::{parse_tickers, TickerSymbol};

pub const ENV_CONFIG_PATH: &str = "SENTINEL_CONFIG_PATH";
pub const ENV_NEWSAPI_KEY: &str = "NEWSAPI_KEY";
pub const DEFAULT_TOML_PATH: &str = "config/sentinel.toml";
pub const DEFAULT_JSON_PATH: &str = "config/sentinel.json";

/// Upper bound on concurrently processed tickers.
pub const MAX_CONCURRENCY: usize = 8;

fn default_tickers() -> Vec<String> {
    vec!["AAPL".into(), "TSLA".into()]
}
fn default_window_days() -> u32 {
    30
}
fn default_concurrency() -> usize {
    4
}
fn default_language() -> String {
    "en".into()
}
fn default_sort_by() -> String {
    "publishedAt".into()
}
fn default_page_size() -> u32 {
    20
}
fn default_api_key() -> String {
    "ENV".into()
}
fn default_price_ttl() -> u64 {
    3_600
}
fn default_news_ttl() -> u64 {
    1_800
}
fn default_max_chars() -> usize {
    512
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// "ENV" means: read from `NEWSAPI_KEY`.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            sort_by: default_sort_by(),
            page_size: default_page_size(),
            api_key: default_api_key(),
        }
    }
}

impl NewsConfig {
    pub fn resolved_api_key(&self) -> Result<String> {
        let raw = self.api_key.trim();
        if raw.eq_ignore_ascii_case("env") {
            let key = env::var(ENV_NEWSAPI_KEY)
                .map_err(|_| anyhow!("Missing {ENV_NEWSAPI_KEY} env var"))?;
            return Ok(key.trim().to_string());
        }
        Ok(raw.to_string())
    }
}

/// Freshness windows for provider responses; 0 disables a cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_price_ttl")]
    pub price_ttl_secs: u64,
    #[serde(default = "default_news_ttl")]
    pub news_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            price_ttl_secs: default_price_ttl(),
            news_ttl_secs: default_news_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Run model calls one at a time even if the model claims reentrancy.
    #[serde(default = "default_true")]
    pub serialize_calls: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            serialize_calls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
    #[serde(default = "default_window_days")]
    pub price_window_days: u32,
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            tickers: default_tickers(),
            price_window_days: default_window_days(),
            max_concurrency: default_concurrency(),
            news: NewsConfig::default(),
            cache: CacheConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// Load from an explicit path; TOML or JSON picked by extension.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: SentinelConfig = match ext.as_str() {
            "json" => serde_json::from_str(&data)
                .with_context(|| format!("parsing json config {}", path.display()))?,
            "toml" | "" => toml::from_str(&data)
                .with_context(|| format!("parsing toml config {}", path.display()))?,
            other => bail!("unsupported config format: .{other}"),
        };
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $SENTINEL_CONFIG_PATH
    /// 2) config/sentinel.toml
    /// 3) config/sentinel.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from_file(&pb);
        }
        for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        Ok(Self::default())
    }

    fn sanitized(mut self) -> Self {
        self.max_concurrency = self.max_concurrency.clamp(1, MAX_CONCURRENCY);
        self.price_window_days = self.price_window_days.max(1);
        self.classifier.max_chars = self.classifier.max_chars.max(1);
        self
    }

    pub fn ticker_symbols(&self) -> Vec<TickerSymbol> {
        parse_tickers(&self.tickers)
    }
}
