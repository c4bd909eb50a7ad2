// tests/pipeline_e2e.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use stock_sentinel::ingest::types::{parse_tickers, ColumnLabel, RawColumn};
use stock_sentinel::{
    FailureKind, FailureReason, LexiconModel, NewsSource, Orchestrator, PipelineReport,
    PriceSource, RawPriceTable, SentimentClassifier, TickerState, TickerSymbol,
};

/// Composite-label table for whichever requested tickers it knows about.
struct MockPrices {
    known: Vec<&'static str>,
    fail: bool,
}

#[async_trait]
impl PriceSource for MockPrices {
    async fn fetch_price_history(&self, tickers: &[TickerSymbol]) -> Result<RawPriceTable> {
        if self.fail {
            return Err(anyhow!("connection reset by peer"));
        }
        let index = vec![
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
        ];
        let mut columns = Vec::new();
        for t in tickers.iter().filter(|t| self.known.contains(&t.as_str())) {
            for (field, base) in [("Open", 100.0), ("High", 102.0), ("Low", 99.0), ("Close", 101.0), ("Volume", 1e6)] {
                columns.push(RawColumn {
                    label: ColumnLabel::composite(field, t.as_str()),
                    values: vec![Some(base), Some(base + 1.0)],
                });
            }
        }
        Ok(RawPriceTable {
            index_name: Some("Date".into()),
            index,
            columns,
            ..Default::default()
        })
    }

    fn name(&self) -> &'static str {
        "mock-prices"
    }
}

/// Canned responses by query; unknown queries error.
struct MockNews {
    responses: HashMap<&'static str, Value>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockNews {
    fn new(responses: HashMap<&'static str, Value>) -> Self {
        Self {
            responses,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NewsSource for MockNews {
    async fn fetch_news(&self, query: &str) -> Result<Value> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.responses
            .get(query)
            .cloned()
            .ok_or_else(|| anyhow!("news provider timed out for {query}"))
    }

    fn name(&self) -> &'static str {
        "mock-news"
    }
}

/// Loads what `inner` knows and reports `down` as failed fetches.
struct PartialPrices {
    inner: MockPrices,
    down: Vec<(&'static str, &'static str)>,
}

#[async_trait]
impl PriceSource for PartialPrices {
    async fn fetch_price_history(&self, tickers: &[TickerSymbol]) -> Result<RawPriceTable> {
        let mut table = self.inner.fetch_price_history(tickers).await?;
        for (t, err) in &self.down {
            if let Some(sym) = tickers.iter().find(|s| s.as_str() == *t) {
                table.unavailable.insert(sym.clone(), err.to_string());
            }
        }
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "partial-prices"
    }
}

fn articles(titles: &[&str]) -> Value {
    let items: Vec<Value> = titles
        .iter()
        .map(|t| json!({ "title": t, "source": { "name": "Wire" }, "publishedAt": "2025-06-03T10:00:00Z" }))
        .collect();
    json!({ "status": "ok", "articles": items })
}

fn orchestrator(prices: MockPrices, news: Arc<MockNews>) -> Orchestrator {
    let classifier = Arc::new(SentimentClassifier::new(Arc::new(LexiconModel::new())));
    Orchestrator::new(Arc::new(prices), news, classifier)
}

#[tokio::test]
async fn unknown_ticker_fails_while_known_completes() {
    let news = Arc::new(MockNews::new(HashMap::from([(
        "AAPL",
        articles(&["Apple beats earnings estimates", "Apple shares plunge after recall"]),
    )])));
    let orch = orchestrator(MockPrices { known: vec!["AAPL"], fail: false }, news);

    let out = orch.run(&parse_tickers(["AAPL", "ZZZZ"])).await;
    assert_eq!(out.len(), 2);

    let aapl = out[0].as_result().expect("AAPL completes");
    assert_eq!(aapl.ticker.as_str(), "AAPL");
    assert_eq!(aapl.prices.len(), 2);
    assert_eq!(aapl.articles.len(), 2);
    assert_eq!(aapl.summary.total(), 2);
    assert_eq!(aapl.summary.count("POSITIVE"), 1);
    assert_eq!(aapl.summary.count("NEGATIVE"), 1);

    let zzzz = out[1].as_failure().expect("ZZZZ fails");
    assert_eq!(zzzz.reason, FailureReason::NoPriceData);
    assert_eq!(zzzz.kind, FailureKind::EmptyResult);
    assert_eq!(zzzz.failed_after, TickerState::Pending);
}

#[tokio::test]
async fn news_provider_error_is_no_news_data() {
    let news = Arc::new(MockNews::new(HashMap::new()));
    let orch = orchestrator(MockPrices { known: vec!["TSLA"], fail: false }, news);

    let out = orch.run(&parse_tickers(["TSLA"])).await;
    let f = out[0].as_failure().unwrap();
    assert_eq!(f.reason, FailureReason::NoNewsData);
    assert_eq!(f.kind, FailureKind::UpstreamUnavailable);
    assert_eq!(f.failed_after, TickerState::PriceFetched);
    assert!(f.detail.as_deref().unwrap_or("").contains("timed out"));
}

#[tokio::test]
async fn zero_articles_is_an_empty_result() {
    let news = Arc::new(MockNews::new(HashMap::from([
        ("MSFT", json!({ "status": "ok", "articles": [] })),
        ("NVDA", json!({ "status": "ok", "articles": [{ "title": null }] })),
    ])));
    let orch = orchestrator(MockPrices { known: vec!["MSFT", "NVDA"], fail: false }, news);

    let out = orch.run(&parse_tickers(["MSFT", "NVDA"])).await;
    for o in &out {
        let f = o.as_failure().unwrap();
        assert_eq!(f.reason, FailureReason::NoNewsData);
        assert_eq!(f.kind, FailureKind::EmptyResult);
    }
}

#[tokio::test]
async fn price_provider_outage_fails_every_ticker() {
    let news = Arc::new(MockNews::new(HashMap::from([("AAPL", articles(&["x"]))])));
    let orch = orchestrator(MockPrices { known: vec!["AAPL"], fail: true }, news.clone());

    let out = orch.run(&parse_tickers(["AAPL", "TSLA"])).await;
    assert_eq!(out.len(), 2);
    for o in &out {
        let f = o.as_failure().unwrap();
        assert_eq!(f.reason, FailureReason::NoPriceData);
        assert_eq!(f.kind, FailureKind::UpstreamUnavailable);
    }
    // news never consulted without prices
    assert_eq!(news.max_in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_ticker_outage_keeps_its_error_while_others_complete() {
    let news = Arc::new(MockNews::new(HashMap::from([
        ("AAPL", articles(&["Apple beats estimates"])),
        ("TSLA", articles(&["Tesla deliveries surge"])),
    ])));
    let prices = PartialPrices {
        inner: MockPrices { known: vec!["TSLA"], fail: false },
        down: vec![("AAPL", "yahoo chart for AAPL: HTTP 503 Service Unavailable")],
    };
    let classifier = Arc::new(SentimentClassifier::new(Arc::new(LexiconModel::new())));
    let orch = Orchestrator::new(Arc::new(prices), news, classifier);

    let out = orch.run(&parse_tickers(["AAPL", "TSLA", "ZZZZ"])).await;
    assert_eq!(out.len(), 3);

    let aapl = out[0].as_failure().expect("AAPL fails");
    assert_eq!(aapl.reason, FailureReason::NoPriceData);
    assert_eq!(aapl.kind, FailureKind::UpstreamUnavailable);
    assert_eq!(aapl.failed_after, TickerState::Pending);
    assert!(aapl.detail.as_deref().unwrap_or("").contains("HTTP 503"));

    let tsla = out[1].as_result().expect("TSLA completes");
    assert_eq!(tsla.prices.len(), 2);
    assert_eq!(tsla.summary.total(), 1);

    // a symbol the provider simply does not know stays an empty result
    let zzzz = out[2].as_failure().unwrap();
    assert_eq!(zzzz.kind, FailureKind::EmptyResult);
    assert!(zzzz.detail.is_none());
}

#[tokio::test]
async fn outcomes_follow_request_order_and_report_adds_up() {
    let names = ["TSLA", "AAPL", "GOOGL", "AMZN", "META", "NFLX"];
    let responses: HashMap<&'static str, Value> = names
        .iter()
        .filter(|n| **n != "META")
        .map(|n| (*n, articles(&["Record growth this quarter"])))
        .collect();
    let news = Arc::new(MockNews::new(responses));
    let prices = MockPrices {
        known: names.iter().copied().filter(|n| *n != "NFLX").collect(),
        fail: false,
    };
    let orch = orchestrator(prices, news).with_max_concurrency(3);

    let tickers = parse_tickers(names);
    let out = orch.run(&tickers).await;
    let got: Vec<&str> = out.iter().map(|o| o.ticker().as_str()).collect();
    assert_eq!(got, names.to_vec());

    let report = PipelineReport::from_outcomes(&out);
    assert_eq!(report.requested, 6);
    assert_eq!(report.complete, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(report.failures_for(FailureReason::NoPriceData), 1);
    assert_eq!(report.failures_for(FailureReason::NoNewsData), 1);
    assert_eq!(report.overall.count("POSITIVE"), 4);
}

#[tokio::test]
async fn in_flight_tickers_stay_within_bound() {
    let names = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];
    let responses: HashMap<&'static str, Value> =
        names.iter().map(|n| (*n, articles(&["flat session"]))).collect();
    let mut news = MockNews::new(responses);
    news.delay = Duration::from_millis(20);
    let news = Arc::new(news);

    let prices = MockPrices { known: names.to_vec(), fail: false };
    let orch = orchestrator(prices, news.clone()).with_max_concurrency(2);

    let out = orch.run(&parse_tickers(names)).await;
    assert!(out.iter().all(|o| o.state() == TickerState::Complete));
    let peak = news.max_in_flight.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak in-flight was {peak}");
}

#[tokio::test]
async fn empty_request_yields_no_outcomes() {
    let news = Arc::new(MockNews::new(HashMap::new()));
    let orch = orchestrator(MockPrices { known: vec![], fail: false }, news);
    assert!(orch.run(&[]).await.is_empty());
}

#[tokio::test]
async fn completed_results_serialize_with_status() {
    let news = Arc::new(MockNews::new(HashMap::from([(
        "AAPL",
        articles(&["Apple beats estimates"]),
    )])));
    let orch = orchestrator(MockPrices { known: vec!["AAPL"], fail: false }, news);
    let out = orch.run(&parse_tickers(["aapl"])).await;

    let v = serde_json::to_value(&out).unwrap();
    assert_eq!(v[0]["status"], "COMPLETE");
    assert_eq!(v[0]["ticker"], "AAPL");
    assert_eq!(v[0]["summary"]["POSITIVE"], 1);
    assert_eq!(v[0]["articles"][0]["sentiment"], "POSITIVE");
    assert_eq!(v[0]["articles"][0]["title"], "Apple beats estimates");
}
