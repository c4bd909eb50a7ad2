// src/config/mod.rs
pub mod sentinel;

pub use sentinel::{CacheConfig, ClassifierConfig, NewsConfig, SentinelConfig};
