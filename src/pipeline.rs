//! # Pipeline orchestrator
//! Per request: one batched price fetch, then an independent per-ticker run
//! (news fetch, normalization, sentiment) with bounded concurrency.
//!
//! Each ticker walks `PENDING -> PRICE_FETCHED -> NEWS_FETCHED ->
//! SENTIMENT_SCORED -> COMPLETE`, or drops to `FAILED` with a reason. A
//! failure only ever affects its own ticker, and the output has exactly one
//! outcome per requested ticker, in request order.

use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use metrics::{counter, histogram};
use serde::Serialize;

use crate::analyze::{SentimentAggregator, SentimentClassifier, SentimentSummary};
use crate::config::sentinel::MAX_CONCURRENCY;
use crate::ingest::news::normalize_news;
use crate::ingest::prices::normalize_prices;
use crate::ingest::types::{NewsSource, PriceSource, TickerSymbol};
use crate::model::{PriceSeries, SentimentedArticle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickerState {
    Pending,
    PriceFetched,
    NewsFetched,
    SentimentScored,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FailureReason {
    #[serde(rename = "NO_PRICE_DATA")]
    NoPriceData,
    #[serde(rename = "NO_NEWS_DATA")]
    NoNewsData,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoPriceData => "NO_PRICE_DATA",
            Self::NoNewsData => "NO_NEWS_DATA",
        }
    }
}

/// What went wrong upstream; both kinds end the ticker the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Provider failed, timed out, or returned a malformed structure.
    UpstreamUnavailable,
    /// Provider answered with zero rows/articles.
    EmptyResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub ticker: TickerSymbol,
    pub reason: FailureReason,
    pub kind: FailureKind,
    /// Last state reached before failing.
    pub failed_after: TickerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerResult {
    pub ticker: TickerSymbol,
    pub prices: PriceSeries,
    pub articles: Vec<SentimentedArticle>,
    pub summary: SentimentSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickerOutcome {
    Complete(TickerResult),
    Failed(FailureRecord),
}

impl TickerOutcome {
    pub fn ticker(&self) -> &TickerSymbol {
        match self {
            Self::Complete(r) => &r.ticker,
            Self::Failed(f) => &f.ticker,
        }
    }

    pub fn state(&self) -> TickerState {
        match self {
            Self::Complete(_) => TickerState::Complete,
            Self::Failed(_) => TickerState::Failed,
        }
    }

    pub fn as_result(&self) -> Option<&TickerResult> {
        match self {
            Self::Complete(r) => Some(r),
            Self::Failed(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FailureRecord> {
        match self {
            Self::Failed(f) => Some(f),
            Self::Complete(_) => None,
        }
    }
}

/// Price stage failure: batch-wide when the whole fetch failed, otherwise
/// for the one ticker the provider could not fetch.
#[derive(Debug, Clone)]
struct StageFailure {
    kind: FailureKind,
    detail: String,
}

/// State tracker for one ticker's run.
struct TickerRun {
    ticker: TickerSymbol,
    state: TickerState,
}

impl TickerRun {
    fn new(ticker: TickerSymbol) -> Self {
        Self {
            ticker,
            state: TickerState::Pending,
        }
    }

    fn advance(&mut self, next: TickerState) {
        tracing::trace!(target: "pipeline", ticker = %self.ticker, from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    fn fail(self, reason: FailureReason, kind: FailureKind, detail: Option<String>) -> TickerOutcome {
        counter!("pipeline_ticker_failures_total", "reason" => reason.code()).increment(1);
        tracing::warn!(
            target: "pipeline",
            ticker = %self.ticker,
            reason = reason.code(),
            kind = ?kind,
            detail = detail.as_deref().unwrap_or(""),
            "ticker failed"
        );
        TickerOutcome::Failed(FailureRecord {
            ticker: self.ticker,
            reason,
            kind,
            failed_after: self.state,
            detail,
        })
    }
}

pub struct Orchestrator {
    prices: Arc<dyn PriceSource>,
    news: Arc<dyn NewsSource>,
    aggregator: SentimentAggregator,
    max_concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        news: Arc<dyn NewsSource>,
        classifier: Arc<SentimentClassifier>,
    ) -> Self {
        Self {
            prices,
            news,
            aggregator: SentimentAggregator::new(classifier),
            max_concurrency: 4,
        }
    }

    /// Clamped to `1..=8`.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// One outcome per requested ticker, in request order. Never fails as a whole.
    pub async fn run(&self, tickers: &[TickerSymbol]) -> Vec<TickerOutcome> {
        crate::metrics::describe_all();
        if tickers.is_empty() {
            return Vec::new();
        }
        let t0 = Instant::now();

        let price_stage = self.fetch_prices(tickers).await;
        let inputs: Vec<(TickerSymbol, Result<PriceSeries, StageFailure>)> = match price_stage {
            Ok(series) => tickers.iter().cloned().zip(series).collect(),
            Err(f) => tickers.iter().map(|t| (t.clone(), Err(f.clone()))).collect(),
        };

        let outcomes: Vec<TickerOutcome> = stream::iter(inputs)
            .map(|(ticker, prices)| self.run_ticker(ticker, prices))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        counter!("pipeline_tickers_total").increment(outcomes.len() as u64);
        histogram!("pipeline_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        outcomes
    }

    async fn fetch_prices(
        &self,
        tickers: &[TickerSymbol],
    ) -> Result<Vec<Result<PriceSeries, StageFailure>>, StageFailure> {
        let table = self.prices.fetch_price_history(tickers).await.map_err(|e| {
            tracing::warn!(target: "pipeline", error = ?e, provider = self.prices.name(), "price fetch failed");
            StageFailure {
                kind: FailureKind::UpstreamUnavailable,
                detail: format!("{e:#}"),
            }
        })?;
        let series = normalize_prices(&table, tickers).map_err(|e| {
            tracing::warn!(target: "pipeline", error = %e, provider = self.prices.name(), "malformed price table");
            StageFailure {
                kind: FailureKind::UpstreamUnavailable,
                detail: e.to_string(),
            }
        })?;

        // An empty series for a ticker the provider failed on is an outage,
        // not a symbol without data.
        Ok(series
            .into_iter()
            .map(|s| match table.unavailable.get(&s.ticker) {
                Some(detail) if s.is_empty() => Err(StageFailure {
                    kind: FailureKind::UpstreamUnavailable,
                    detail: detail.clone(),
                }),
                _ => Ok(s),
            })
            .collect())
    }

    async fn run_ticker(
        &self,
        ticker: TickerSymbol,
        prices: Result<PriceSeries, StageFailure>,
    ) -> TickerOutcome {
        let mut run = TickerRun::new(ticker.clone());

        let prices = match prices {
            Err(f) => return run.fail(FailureReason::NoPriceData, f.kind, Some(f.detail)),
            Ok(s) if s.is_empty() => {
                return run.fail(FailureReason::NoPriceData, FailureKind::EmptyResult, None)
            }
            Ok(s) => s,
        };
        run.advance(TickerState::PriceFetched);

        let raw = match self.news.fetch_news(ticker.as_str()).await {
            Ok(v) => v,
            Err(e) => {
                return run.fail(
                    FailureReason::NoNewsData,
                    FailureKind::UpstreamUnavailable,
                    Some(format!("{e:#}")),
                )
            }
        };
        let articles = normalize_news(&raw);
        if articles.is_empty() {
            return run.fail(FailureReason::NoNewsData, FailureKind::EmptyResult, None);
        }
        run.advance(TickerState::NewsFetched);

        let (articles, summary) = self.aggregator.aggregate_blocking(Arc::new(articles)).await;
        run.advance(TickerState::SentimentScored);

        tracing::info!(
            target: "pipeline",
            %ticker,
            bars = prices.len(),
            articles = articles.len(),
            dominant = summary.dominant().map(|l| l.as_str()).unwrap_or("-"),
            "ticker complete"
        );
        run.advance(TickerState::Complete);
        TickerOutcome::Complete(TickerResult {
            ticker,
            prices,
            articles,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(FailureReason::NoPriceData.code(), "NO_PRICE_DATA");
        assert_eq!(
            serde_json::to_value(FailureReason::NoNewsData).unwrap(),
            serde_json::json!("NO_NEWS_DATA")
        );
    }

    #[test]
    fn failed_outcome_serializes_with_status_tag() {
        let out = TickerOutcome::Failed(FailureRecord {
            ticker: TickerSymbol::new("ZZZZ").unwrap(),
            reason: FailureReason::NoPriceData,
            kind: FailureKind::EmptyResult,
            failed_after: TickerState::Pending,
            detail: None,
        });
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["status"], "FAILED");
        assert_eq!(v["ticker"], "ZZZZ");
        assert_eq!(v["reason"], "NO_PRICE_DATA");
        assert_eq!(v["failed_after"], "PENDING");
        assert!(v.get("detail").is_none());
    }

    #[test]
    fn concurrency_is_clamped() {
        struct Nothing;
        #[async_trait::async_trait]
        impl PriceSource for Nothing {
            async fn fetch_price_history(
                &self,
                _t: &[TickerSymbol],
            ) -> anyhow::Result<crate::ingest::types::RawPriceTable> {
                Ok(Default::default())
            }
            fn name(&self) -> &'static str {
                "nothing"
            }
        }
        #[async_trait::async_trait]
        impl NewsSource for Nothing {
            async fn fetch_news(&self, _q: &str) -> anyhow::Result<serde_json::Value> {
                Ok(serde_json::Value::Null)
            }
            fn name(&self) -> &'static str {
                "nothing"
            }
        }
        let classifier = Arc::new(SentimentClassifier::new(Arc::new(
            crate::sentiment::LexiconModel::new(),
        )));
        let o = Orchestrator::new(Arc::new(Nothing), Arc::new(Nothing), classifier);
        assert_eq!(o.with_max_concurrency(0).max_concurrency(), 1);
    }
}
