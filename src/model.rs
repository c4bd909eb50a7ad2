//! Uniform per-request records produced by the normalizers.
//!
//! Everything here is built fresh for one request and handed upward; nothing
//! is persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ingest::types::{ColumnLabel, RawColumn, RawPriceTable, TickerSymbol};
use crate::sentiment::SentimentLabel;

/// One trading day. Only `close` is guaranteed; providers that send a
/// close-only table leave the other fields empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Daily bars of one ticker, dates strictly increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: TickerSymbol,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn empty(ticker: TickerSymbol) -> Self {
        Self {
            ticker,
            bars: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Percent change from the first to the last close of the window.
    pub fn change_pct(&self) -> Option<f64> {
        let first = self.bars.first()?.close;
        let last = self.bars.last()?.close;
        if first == 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }

    /// Back to the provider's single-ticker (simple label) shape.
    pub fn to_raw_table(&self) -> RawPriceTable {
        RawPriceTable {
            index_name: Some("date".to_string()),
            index: self.dates(),
            columns: vec![
                column("open", &self.bars, |b| b.open),
                column("high", &self.bars, |b| b.high),
                column("low", &self.bars, |b| b.low),
                column("close", &self.bars, |b| Some(b.close)),
                column("volume", &self.bars, |b| b.volume.map(|v| v as f64)),
            ],
            ..Default::default()
        }
    }
}

fn column(name: &str, bars: &[PriceBar], field: fn(&PriceBar) -> Option<f64>) -> RawColumn {
    RawColumn {
        label: ColumnLabel::simple(name),
        values: bars.iter().map(field).collect(),
    }
}

/// A news item with every field present. Optional upstream fields are
/// defaulted by the news normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    /// Verbatim provider timestamp (ISO 8601); formatting is left to display.
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    pub source: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentedArticle {
    #[serde(flatten)]
    pub article: NewsArticle,
    pub sentiment: SentimentLabel,
}
