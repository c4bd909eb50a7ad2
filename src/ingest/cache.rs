// src/ingest/cache.rs
//! Freshness-window cache for provider responses.
//!
//! [`SnapshotCache`] is injected by whoever builds the pipeline; the
//! `Cached*` wrappers consult it before delegating to the real provider.
//! The lock is never held across a provider call, and errors are never cached.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use metrics::counter;

use crate::ingest::types::{NewsSource, PriceSource, RawPriceTable, TickerSymbol};

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// TTL map with absolute expiry from insertion. A zero TTL disables it.
#[derive(Debug)]
pub struct SnapshotCache<K, V> {
    inner: Mutex<HashMap<K, Entry<V>>>,
    ttl: Duration,
}

impl<K: Eq + Hash, V: Clone> SnapshotCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_disabled(&self) -> bool {
        self.ttl.is_zero()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<V> {
        let map = self.lock();
        map.get(key)
            .filter(|e| Instant::now() < e.expires_at)
            .map(|e| e.value.clone())
    }

    /// Stores `value` and drops every entry that has already expired, so the
    /// map never outgrows the set of keys written within one TTL.
    pub fn put(&self, key: K, value: V) {
        if self.is_disabled() {
            return;
        }
        let now = Instant::now();
        let mut map = self.lock();
        map.retain(|_, e| e.expires_at > now);
        map.insert(key, Entry { value, expires_at: now + self.ttl });
    }

    /// Number of stored entries; expired ones linger until the next `put`.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for a ticker set: order-insensitive.
pub fn ticker_set_key(tickers: &[TickerSymbol]) -> String {
    let mut names: Vec<&str> = tickers.iter().map(|t| t.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    names.join(",")
}

pub struct CachedPriceSource<P: PriceSource> {
    inner: P,
    cache: Arc<SnapshotCache<String, RawPriceTable>>,
}

impl<P: PriceSource> CachedPriceSource<P> {
    pub fn new(inner: P, cache: Arc<SnapshotCache<String, RawPriceTable>>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait::async_trait]
impl<P: PriceSource> PriceSource for CachedPriceSource<P> {
    async fn fetch_price_history(&self, tickers: &[TickerSymbol]) -> Result<RawPriceTable> {
        let key = ticker_set_key(tickers);
        if let Some(hit) = self.cache.get(&key) {
            counter!("fetch_cache_hits_total", "kind" => "price").increment(1);
            tracing::debug!(target: "ingest", key = %key, "price cache hit");
            return Ok(hit);
        }
        counter!("fetch_cache_misses_total", "kind" => "price").increment(1);
        let fresh = self.inner.fetch_price_history(tickers).await?;
        // a table with failed tickers carries errors; those are not cached
        if fresh.is_partial() {
            tracing::debug!(target: "ingest", key = %key, "partial price table not cached");
        } else {
            self.cache.put(key, fresh.clone());
        }
        Ok(fresh)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

pub struct CachedNewsSource<N: NewsSource> {
    inner: N,
    cache: Arc<SnapshotCache<String, serde_json::Value>>,
}

impl<N: NewsSource> CachedNewsSource<N> {
    pub fn new(inner: N, cache: Arc<SnapshotCache<String, serde_json::Value>>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait::async_trait]
impl<N: NewsSource> NewsSource for CachedNewsSource<N> {
    async fn fetch_news(&self, query: &str) -> Result<serde_json::Value> {
        let key = query.trim().to_ascii_uppercase();
        if let Some(hit) = self.cache.get(&key) {
            counter!("fetch_cache_hits_total", "kind" => "news").increment(1);
            return Ok(hit);
        }
        counter!("fetch_cache_misses_total", "kind" => "news").increment(1);
        let fresh = self.inner.fetch_news(query).await?;
        self.cache.put(key, fresh.clone());
        Ok(fresh)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
