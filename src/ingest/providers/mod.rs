// src/ingest/providers/mod.rs
pub mod newsapi;
pub mod yahoo_chart;

pub use newsapi::NewsApiProvider;
pub use yahoo_chart::YahooChartProvider;
