// src/ingest/providers/yahoo_chart.rs
//! Daily OHLCV from Yahoo's chart endpoint, assembled into a batched
//! `(field, ticker)` table on one shared date axis.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::ingest::types::{ColumnLabel, PriceSource, RawColumn, RawPriceTable, TickerSymbol};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Field names as Yahoo/yfinance spell them.
const FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Deserialize)]
struct Envelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<Meta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(rename = "gmtoffset", default)]
    gmt_offset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// One ticker's rows keyed by exchange-local trading date.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickerChart {
    /// date -> [open, high, low, close, volume]
    pub rows: BTreeMap<NaiveDate, [Option<f64>; 5]>,
}

impl TickerChart {
    fn from_result(res: ChartResult) -> Self {
        let offset = res.meta.map(|m| m.gmt_offset).unwrap_or(0);
        let q = res.indicators.quote.into_iter().next().unwrap_or_default();
        let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

        let mut rows = BTreeMap::new();
        for (i, ts) in res.timestamp.iter().enumerate() {
            let Some(date) = DateTime::<Utc>::from_timestamp(ts + offset, 0).map(|d| d.date_naive())
            else {
                continue;
            };
            // Same date twice (live session row): the later one wins.
            rows.insert(
                date,
                [at(&q.open, i), at(&q.high, i), at(&q.low, i), at(&q.close, i), at(&q.volume, i)],
            );
        }
        Self { rows }
    }
}

/// Merge per-ticker charts into one batched table. Tickers absent from
/// `charts` get no columns at all.
pub fn assemble_table(charts: &[(TickerSymbol, TickerChart)]) -> RawPriceTable {
    let index: Vec<NaiveDate> = charts
        .iter()
        .flat_map(|(_, c)| c.rows.keys().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut columns = Vec::with_capacity(FIELDS.len() * charts.len());
    for (f, field) in FIELDS.iter().enumerate() {
        for (ticker, chart) in charts {
            columns.push(RawColumn {
                label: ColumnLabel::composite(field, ticker.as_str()),
                values: index
                    .iter()
                    .map(|d| chart.rows.get(d).and_then(|r| r[f]))
                    .collect(),
            });
        }
    }

    RawPriceTable {
        index_name: Some("Date".to_string()),
        index,
        columns,
        ..Default::default()
    }
}

pub struct YahooChartProvider {
    http: reqwest::Client,
    window_days: u32,
}

impl YahooChartProvider {
    pub fn new(window_days: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; stock-sentinel/0.1)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building yahoo http client")?;
        Ok(Self {
            http,
            window_days: window_days.max(1),
        })
    }

    /// `Ok(None)` when Yahoo does not know the symbol.
    async fn fetch_one(&self, ticker: &TickerSymbol) -> Result<Option<TickerChart>> {
        let now = Utc::now().timestamp();
        let start = now - i64::from(self.window_days) * 86_400;
        let resp = self
            .http
            .get(format!("{CHART_URL}/{ticker}"))
            .query(&[
                ("period1", start.to_string()),
                ("period2", now.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("yahoo chart get() for {ticker}"))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(anyhow!("yahoo chart for {ticker}: HTTP {}", resp.status()));
        }
        let body: Envelope = resp
            .json()
            .await
            .with_context(|| format!("parsing yahoo chart json for {ticker}"))?;
        Ok(parse_envelope(body))
    }
}

fn parse_envelope(body: Envelope) -> Option<TickerChart> {
    if body.chart.error.as_ref().is_some_and(|e| !e.is_null()) {
        return None;
    }
    body.chart
        .result
        .and_then(|r| r.into_iter().next())
        .map(TickerChart::from_result)
        .filter(|c| !c.rows.is_empty())
}

/// Fold per-ticker fetch results into one table. Failed tickers are listed in
/// `unavailable`; the batch only errors when nothing came back and at least
/// one ticker failed.
fn collect_batch(results: Vec<(TickerSymbol, Result<Option<TickerChart>>)>) -> Result<RawPriceTable> {
    let mut charts = Vec::with_capacity(results.len());
    let mut failed = BTreeMap::new();
    let mut last_err = None;

    for (ticker, res) in results {
        match res {
            Ok(Some(chart)) => charts.push((ticker, chart)),
            Ok(None) => {
                tracing::debug!(target: "ingest", %ticker, "no chart data");
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = "yahoo", %ticker, "provider error");
                counter!("ingest_provider_errors_total", "provider" => "yahoo").increment(1);
                failed.insert(ticker, format!("{e:#}"));
                last_err = Some(e);
            }
        }
    }

    if charts.is_empty() {
        if let Some(e) = last_err {
            return Err(e);
        }
    }

    let mut table = assemble_table(&charts);
    table.unavailable = failed;
    Ok(table)
}

#[async_trait]
impl PriceSource for YahooChartProvider {
    async fn fetch_price_history(&self, tickers: &[TickerSymbol]) -> Result<RawPriceTable> {
        let t0 = std::time::Instant::now();
        let mut results = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            results.push((ticker.clone(), self.fetch_one(ticker).await));
        }
        let table = collect_batch(results)?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_fetch_ms", "provider" => "yahoo").record(ms);
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAPL_CHART: &str = r#"{
      "chart": {
        "result": [{
          "meta": { "symbol": "AAPL", "gmtoffset": -14400 },
          "timestamp": [1748871000, 1748957400],
          "indicators": { "quote": [{
            "open": [200.3, 201.4],
            "high": [202.1, 203.9],
            "low": [199.0, 200.5],
            "close": [201.7, 203.3],
            "volume": [35423300, null]
          }]}
        }],
        "error": null
      }
    }"#;

    const UNKNOWN_CHART: &str = r#"{
      "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found" } }
    }"#;

    #[test]
    fn envelope_parses_rows_by_local_date() {
        let env: Envelope = serde_json::from_str(AAPL_CHART).unwrap();
        let chart = parse_envelope(env).unwrap();
        assert_eq!(chart.rows.len(), 2);
        let first = chart.rows.values().next().unwrap();
        assert_eq!(first[3], Some(201.7));
        let second = chart.rows.values().nth(1).unwrap();
        assert_eq!(second[4], None);
    }

    #[test]
    fn unknown_symbol_has_no_chart() {
        let env: Envelope = serde_json::from_str(UNKNOWN_CHART).unwrap();
        assert!(parse_envelope(env).is_none());
    }

    #[test]
    fn assembled_table_is_composite_on_union_axis() {
        let d1 = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let mut a = TickerChart::default();
        a.rows.insert(d1, [Some(1.0), Some(2.0), Some(0.5), Some(1.5), Some(10.0)]);
        a.rows.insert(d2, [Some(1.5), Some(2.5), Some(1.0), Some(2.0), Some(11.0)]);
        let mut b = TickerChart::default();
        b.rows.insert(d2, [Some(9.0), Some(9.5), Some(8.5), Some(9.2), Some(5.0)]);

        let t = assemble_table(&[
            (TickerSymbol::new("AAPL").unwrap(), a),
            (TickerSymbol::new("TSLA").unwrap(), b),
        ]);
        assert_eq!(t.index, vec![d1, d2]);
        assert_eq!(t.columns.len(), 10);
        let tsla_close = t
            .columns
            .iter()
            .find(|c| c.label == ColumnLabel::composite("Close", "TSLA"))
            .unwrap();
        assert_eq!(tsla_close.values, vec![None, Some(9.2)]);
    }

    fn one_day_chart(close: f64) -> TickerChart {
        let mut c = TickerChart::default();
        let d = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        c.rows.insert(d, [None, None, None, Some(close), None]);
        c
    }

    #[test]
    fn failed_ticker_is_listed_beside_the_ones_that_loaded() {
        let aapl = TickerSymbol::new("AAPL").unwrap();
        let tsla = TickerSymbol::new("TSLA").unwrap();
        let zzzz = TickerSymbol::new("ZZZZ").unwrap();
        let t = collect_batch(vec![
            (aapl.clone(), Err(anyhow!("yahoo chart for AAPL: HTTP 503"))),
            (tsla.clone(), Ok(Some(one_day_chart(250.0)))),
            (zzzz.clone(), Ok(None)),
        ])
        .unwrap();

        assert!(t.is_partial());
        assert!(t.unavailable[&aapl].contains("HTTP 503"));
        // unknown symbols are not outages
        assert!(!t.unavailable.contains_key(&zzzz));
        assert!(t.columns.iter().any(|c| c.label == ColumnLabel::composite("Close", "TSLA")));
    }

    #[test]
    fn batch_with_nothing_but_errors_is_an_error() {
        let err = collect_batch(vec![
            (TickerSymbol::new("AAPL").unwrap(), Err(anyhow!("connect timeout"))),
            (TickerSymbol::new("ZZZZ").unwrap(), Ok(None)),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("connect timeout"));
    }
}
