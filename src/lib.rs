// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod bootstrap;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod sentiment;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{SentimentAggregator, SentimentClassifier, SentimentSummary};
pub use crate::ingest::types::{NewsSource, PriceSource, RawPriceTable, TickerSymbol};
pub use crate::model::{NewsArticle, PriceBar, PriceSeries, SentimentedArticle};
pub use crate::pipeline::{
    FailureKind, FailureReason, FailureRecord, Orchestrator, TickerOutcome, TickerResult,
    TickerState,
};
pub use crate::report::PipelineReport;
pub use crate::sentiment::{LexiconModel, Prediction, SentimentLabel, SentimentModel};

use anyhow::bail;
use tracing::info;

/// Load config (env path, then `config/`, then defaults), wire the runtime
/// and run once for `tickers`, or the configured tickers when empty.
/// Errors when neither names a ticker.
pub async fn run_once(tickers: &[TickerSymbol]) -> anyhow::Result<Vec<TickerOutcome>> {
    let cfg = config::SentinelConfig::load_default()?;
    let wanted = if tickers.is_empty() {
        cfg.ticker_symbols()
    } else {
        tickers.to_vec()
    };
    if wanted.is_empty() {
        bail!("no ticker symbols given (pass them as arguments or set `tickers` in config)");
    }
    let rt = bootstrap::SentinelRuntime::from_config(cfg)?;
    let out = rt.orchestrator.run(&wanted).await;
    info!(tickers = wanted.len(), "run finished");
    Ok(out)
}
