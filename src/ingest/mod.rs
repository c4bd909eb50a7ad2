// src/ingest/mod.rs
//! Upstream side of the pipeline: collaborator traits, provider clients,
//! the freshness cache, and the two normalizers.

pub mod cache;
pub mod news;
pub mod prices;
pub mod providers;
pub mod types;

pub use cache::{CachedNewsSource, CachedPriceSource, SnapshotCache};
pub use news::{normalize_article, normalize_news};
pub use prices::{normalize_prices, normalize_single, parse_layout, ColumnLayout, PriceTableError};
pub use types::{
    parse_tickers, ColumnLabel, NewsSource, PriceSource, RawColumn, RawPriceTable, TickerSymbol,
};
