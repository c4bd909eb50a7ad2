// src/bootstrap.rs
//! Process-lifetime wiring: providers, freshness caches and the classifier
//! are built once here and shared by every run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::analyze::SentimentClassifier;
use crate::config::SentinelConfig;
use crate::ingest::cache::{CachedNewsSource, CachedPriceSource, SnapshotCache};
use crate::ingest::providers::{NewsApiProvider, YahooChartProvider};
use crate::ingest::types::{NewsSource, PriceSource};
use crate::pipeline::Orchestrator;
use crate::sentiment::{LexiconModel, SentimentModel};

pub struct SentinelRuntime {
    pub cfg: SentinelConfig,
    pub orchestrator: Orchestrator,
}

impl SentinelRuntime {
    /// Wire the real providers with the built-in lexicon model.
    pub fn from_config(cfg: SentinelConfig) -> Result<Self> {
        Self::with_model(cfg, Arc::new(LexiconModel::new()))
    }

    /// Wire the real providers around a caller-supplied model.
    pub fn with_model(cfg: SentinelConfig, model: Arc<dyn SentimentModel>) -> Result<Self> {
        let api_key = match cfg.news.resolved_api_key() {
            Ok(k) => k,
            Err(e) => {
                // Every ticker will end NO_NEWS_DATA, but prices still load.
                warn!(error = %e, "news api key unavailable");
                String::new()
            }
        };
        // Safe diagnostics: only key length, never the key
        info!(
            window_days = cfg.price_window_days,
            page_size = cfg.news.page_size,
            key_len = api_key.len(),
            model = model.name(),
            "sentinel config loaded"
        );

        let price_cache = Arc::new(SnapshotCache::new(Duration::from_secs(
            cfg.cache.price_ttl_secs,
        )));
        let news_cache = Arc::new(SnapshotCache::new(Duration::from_secs(
            cfg.cache.news_ttl_secs,
        )));

        let yahoo = YahooChartProvider::new(cfg.price_window_days).context("price provider")?;
        let newsapi = NewsApiProvider::new(api_key, &cfg.news).context("news provider")?;
        let prices: Arc<dyn PriceSource> = Arc::new(CachedPriceSource::new(yahoo, price_cache));
        let news: Arc<dyn NewsSource> = Arc::new(CachedNewsSource::new(newsapi, news_cache));

        let mut classifier =
            SentimentClassifier::new(model).with_max_chars(cfg.classifier.max_chars);
        if cfg.classifier.serialize_calls {
            classifier = classifier.serialized();
        }

        let orchestrator = Orchestrator::new(prices, news, Arc::new(classifier))
            .with_max_concurrency(cfg.max_concurrency);
        Ok(Self { cfg, orchestrator })
    }
}
