// src/analyze/mod.rs
//! Sentiment stage: classifier adapter and per-ticker aggregation.

pub mod aggregate;
pub mod classifier;

pub use crate::analyze::aggregate::{SentimentAggregator, SentimentSummary};
pub use crate::analyze::classifier::{
    truncate_chars, ClassificationError, SentimentClassifier, DEFAULT_MAX_CHARS,
};
