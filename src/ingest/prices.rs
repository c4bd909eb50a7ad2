// src/ingest/prices.rs
//! Price table normalization: provider tables with either plain or
//! `(field, ticker)` column labels become one [`PriceSeries`] per ticker.
//!
//! The label shape is resolved once into a [`ColumnLayout`]; nothing
//! downstream of [`parse_layout`] looks at raw labels again.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use metrics::counter;

use crate::ingest::types::{ColumnLabel, RawPriceTable, TickerSymbol};
use crate::model::{PriceBar, PriceSeries};

/// Fields kept from a provider table (the date axis is implied).
pub const CANONICAL_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceTableError {
    #[error("price table mixes plain and (field, ticker) column labels")]
    MixedColumnLabels,
    #[error("column {label} has {got} cells for {expected} dates")]
    LengthMismatch {
        label: String,
        expected: usize,
        got: usize,
    },
    #[error("date axis is not strictly increasing at row {0}")]
    UnorderedDates(usize),
}

/// Canonical field name -> column cells.
pub type FieldColumns<'a> = BTreeMap<&'static str, &'a [Option<f64>]>;

/// Label shape of a provider table, decided once at ingestion.
#[derive(Debug, PartialEq)]
pub enum ColumnLayout<'a> {
    /// Single-ticker download with plain field names.
    Simple(FieldColumns<'a>),
    /// Batched download; keyed by uppercased ticker.
    Composite(BTreeMap<String, FieldColumns<'a>>),
}

/// Map a provider field name to its canonical name, or `None` to drop it
/// (e.g. `"Adj Close"`).
pub fn canonical_field(name: &str) -> Option<&'static str> {
    let lower = name.trim().to_ascii_lowercase();
    CANONICAL_FIELDS.iter().copied().find(|f| *f == lower)
}

/// Validate the table and resolve its label shape.
///
/// Duplicate columns (after case normalization) keep the first occurrence.
pub fn parse_layout(table: &RawPriceTable) -> Result<ColumnLayout<'_>, PriceTableError> {
    if let Some(pos) = table.index.windows(2).position(|w| w[0] >= w[1]) {
        return Err(PriceTableError::UnorderedDates(pos + 1));
    }
    for col in &table.columns {
        if col.values.len() != table.index.len() {
            return Err(PriceTableError::LengthMismatch {
                label: col.label.to_string(),
                expected: table.index.len(),
                got: col.values.len(),
            });
        }
    }

    let composite = table
        .columns
        .iter()
        .filter(|c| matches!(c.label, ColumnLabel::Composite(..)))
        .count();
    if composite > 0 && composite < table.columns.len() {
        return Err(PriceTableError::MixedColumnLabels);
    }

    if composite == 0 {
        let mut fields = FieldColumns::new();
        for col in &table.columns {
            if let ColumnLabel::Simple(name) = &col.label {
                if let Some(f) = canonical_field(name) {
                    fields.entry(f).or_insert(col.values.as_slice());
                }
            }
        }
        return Ok(ColumnLayout::Simple(fields));
    }

    let mut by_ticker: BTreeMap<String, FieldColumns<'_>> = BTreeMap::new();
    for col in &table.columns {
        if let ColumnLabel::Composite(name, ticker) = &col.label {
            let Some(f) = canonical_field(name) else {
                continue;
            };
            by_ticker
                .entry(ticker.trim().to_ascii_uppercase())
                .or_default()
                .entry(f)
                .or_insert(col.values.as_slice());
        }
    }
    Ok(ColumnLayout::Composite(by_ticker))
}

/// One series per requested ticker, in request order.
///
/// A ticker without a sub-table (delisted, misspelled) gets an empty series;
/// the caller decides what an empty series means. A plain-label table belongs
/// to the first requested ticker.
pub fn normalize_prices(
    table: &RawPriceTable,
    tickers: &[TickerSymbol],
) -> Result<Vec<PriceSeries>, PriceTableError> {
    let layout = parse_layout(table)?;
    let out = tickers
        .iter()
        .enumerate()
        .map(|(i, ticker)| {
            let fields = match &layout {
                ColumnLayout::Simple(fields) => (i == 0 && !fields.is_empty()).then_some(fields),
                ColumnLayout::Composite(map) => map.get(ticker.as_str()),
            };
            match fields {
                Some(fields) => build_series(ticker, &table.index, fields),
                None => {
                    counter!("ingest_price_missing_total").increment(1);
                    PriceSeries::empty(ticker.clone())
                }
            }
        })
        .collect();
    Ok(out)
}

/// Single-ticker convenience over [`normalize_prices`].
pub fn normalize_single(
    table: &RawPriceTable,
    ticker: &TickerSymbol,
) -> Result<PriceSeries, PriceTableError> {
    let mut v = normalize_prices(table, std::slice::from_ref(ticker))?;
    Ok(v.pop().unwrap_or_else(|| PriceSeries::empty(ticker.clone())))
}

/// Rows without a close are skipped; open/high/low/volume are optional and
/// stay empty when the provider sent no such column or cell.
fn build_series(ticker: &TickerSymbol, index: &[NaiveDate], fields: &FieldColumns<'_>) -> PriceSeries {
    let Some(close) = fields.get("close") else {
        tracing::warn!(target: "ingest", %ticker, "price sub-table has no close column");
        return PriceSeries::empty(ticker.clone());
    };
    let optional = |name: &str, row: usize| fields.get(name).and_then(|col| cell(col, row));

    let bars = index
        .iter()
        .enumerate()
        .filter_map(|(row, date)| {
            let close = cell(close, row)?;
            Some(PriceBar {
                date: *date,
                open: optional("open", row),
                high: optional("high", row),
                low: optional("low", row),
                close,
                volume: optional("volume", row).map(|v| v.max(0.0).round() as u64),
            })
        })
        .collect();

    PriceSeries {
        ticker: ticker.clone(),
        bars,
    }
}

/// Empty and NaN cells both read as missing.
fn cell(col: &[Option<f64>], row: usize) -> Option<f64> {
    col.get(row).copied().flatten().filter(|v| v.is_finite())
}
