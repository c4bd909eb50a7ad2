//! Metric descriptions. The crate only emits through the `metrics` facade;
//! installing a recorder/exporter is left to the embedding application.

use metrics::{describe_counter, describe_histogram, Unit};
use once_cell::sync::OnceCell;

/// One-time registration so every series carries a description.
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_tickers_total", "Tickers processed by the orchestrator.");
        describe_counter!(
            "pipeline_ticker_failures_total",
            "Tickers that ended FAILED, by reason code."
        );
        describe_histogram!(
            "pipeline_run_ms",
            Unit::Milliseconds,
            "Wall-clock time of one orchestrator run."
        );
        describe_counter!("ingest_articles_total", "Articles kept by the news normalizer.");
        describe_counter!(
            "ingest_articles_dropped_total",
            "Articles dropped for lacking a usable title."
        );
        describe_counter!(
            "ingest_price_missing_total",
            "Requested tickers without a price sub-table."
        );
        describe_counter!("ingest_provider_errors_total", "Provider fetch/parse errors.");
        describe_histogram!(
            "ingest_fetch_ms",
            Unit::Milliseconds,
            "Provider call latency in milliseconds."
        );
        describe_counter!(
            "sentiment_fallback_total",
            "Classifications that fell back to NEUTRAL, by failure kind."
        );
        describe_counter!("fetch_cache_hits_total", "Provider responses served from cache.");
        describe_counter!("fetch_cache_misses_total", "Provider calls that missed the cache.");
    });
}
