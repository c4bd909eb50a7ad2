// src/ingest/news.rs
use metrics::counter;
use serde_json::Value;

use crate::model::NewsArticle;

/// Source name used when the provider omits one.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Normalize a raw news response (`{"articles": [...]}`) into articles,
/// keeping provider order. Items without a string `title` are dropped; a
/// response without an `articles` array yields nothing.
pub fn normalize_news(raw: &Value) -> Vec<NewsArticle> {
    let Some(items) = raw.get("articles").and_then(Value::as_array) else {
        tracing::debug!(target: "ingest", "news response has no articles array");
        return Vec::new();
    };

    let out: Vec<NewsArticle> = items.iter().filter_map(normalize_article).collect();

    let dropped = items.len() - out.len();
    counter!("ingest_articles_total").increment(out.len() as u64);
    if dropped > 0 {
        counter!("ingest_articles_dropped_total").increment(dropped as u64);
        tracing::debug!(target: "ingest", dropped, kept = out.len(), "dropped untitled articles");
    }
    out
}

/// One raw item, or `None` when it has no usable title.
pub fn normalize_article(item: &Value) -> Option<NewsArticle> {
    let title = item.get("title")?.as_str()?.to_string();
    Some(NewsArticle {
        title,
        description: string_or_empty(item, "description"),
        published_at: string_or_empty(item, "publishedAt"),
        source: item
            .get("source")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_SOURCE)
            .to_string(),
        url: string_or_empty(item, "url"),
    })
}

fn string_or_empty(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
