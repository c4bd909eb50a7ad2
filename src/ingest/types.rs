// src/ingest/types.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Exchange symbol as supplied by the user. Uppercased and trimmed, never
/// checked against an exchange list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    /// Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let t = raw.trim().to_ascii_uppercase();
        if t.is_empty() {
            None
        } else {
            Some(Self(t))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a user list of symbols: blanks dropped, duplicates removed (first wins).
pub fn parse_tickers<I, S>(raw: I) -> Vec<TickerSymbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|s| TickerSymbol::new(s.as_ref()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Column label of a raw price table.
///
/// Single-ticker downloads carry plain field names (`"Close"`); batched
/// downloads carry `(field, ticker)` pairs (`["Close", "AAPL"]` in JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnLabel {
    Simple(String),
    Composite(String, String),
}

impl ColumnLabel {
    pub fn simple(field: &str) -> Self {
        Self::Simple(field.to_string())
    }

    pub fn composite(field: &str, ticker: &str) -> Self {
        Self::Composite(field.to_string(), ticker.to_string())
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(field) => f.write_str(field),
            Self::Composite(field, ticker) => write!(f, "({field}, {ticker})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumn {
    pub label: ColumnLabel,
    /// One cell per entry of the date axis; `None` is an empty cell.
    pub values: Vec<Option<f64>>,
}

/// Price response exactly as the provider shaped it: one shared date axis
/// and a flat list of labelled columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawPriceTable {
    /// Provider's name for the date axis (e.g. `"Date"`); informational only.
    #[serde(default)]
    pub index_name: Option<String>,
    pub index: Vec<NaiveDate>,
    pub columns: Vec<RawColumn>,
    /// Tickers the provider failed to fetch in this batch, with the error.
    /// Distinguishes an outage from a symbol that simply has no data.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unavailable: BTreeMap<TickerSymbol, String>,
}

impl RawPriceTable {
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// True when some ticker of the batch failed upstream.
    pub fn is_partial(&self) -> bool {
        !self.unavailable.is_empty()
    }
}

/// Price-data collaborator. One call may cover several tickers.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price_history(&self, tickers: &[TickerSymbol]) -> Result<RawPriceTable>;
    fn name(&self) -> &'static str;
}

/// News collaborator. `query` is a free-text search term (the ticker symbol).
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_news(&self, query: &str) -> Result<serde_json::Value>;
    fn name(&self) -> &'static str;
}
