// src/ingest/providers/newsapi.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;

use crate::config::NewsConfig;
use crate::ingest::types::NewsSource;

const EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";

/// NewsAPI `everything` search. The raw JSON body is returned untouched;
/// shaping it is the news normalizer's job.
pub struct NewsApiProvider {
    http: reqwest::Client,
    api_key: String,
    language: String,
    sort_by: String,
    page_size: u32,
}

impl NewsApiProvider {
    pub fn new(api_key: impl Into<String>, cfg: &NewsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("stock-sentinel/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building newsapi http client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            language: cfg.language.clone(),
            sort_by: cfg.sort_by.clone(),
            page_size: cfg.page_size.clamp(1, 100),
        })
    }
}

/// Turn a provider-level error body or status into an `Err`.
pub fn check_envelope(http_ok: bool, body: &Value) -> Result<()> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    if http_ok && status != "error" {
        return Ok(());
    }
    let code = body.get("code").and_then(Value::as_str).unwrap_or("unknown");
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    Err(anyhow!("newsapi error `{code}`: {message}"))
}

#[async_trait]
impl NewsSource for NewsApiProvider {
    async fn fetch_news(&self, query: &str) -> Result<Value> {
        if self.api_key.is_empty() {
            return Err(anyhow!("newsapi key is not configured"));
        }
        let t0 = std::time::Instant::now();

        let result = async {
            let resp = self
                .http
                .get(EVERYTHING_URL)
                .header("X-Api-Key", &self.api_key)
                .query(&[
                    ("q", query.to_string()),
                    ("language", self.language.clone()),
                    ("sortBy", self.sort_by.clone()),
                    ("pageSize", self.page_size.to_string()),
                ])
                .send()
                .await
                .context("newsapi get()")?;
            let http_ok = resp.status().is_success();
            let body: Value = resp.json().await.context("parsing newsapi json")?;
            check_envelope(http_ok, &body)?;
            Ok::<Value, anyhow::Error>(body)
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!(target: "ingest", error = ?e, provider = "newsapi", query, "provider error");
            counter!("ingest_provider_errors_total", "provider" => "newsapi").increment(1);
        }
        histogram!("ingest_fetch_ms", "provider" => "newsapi").record(t0.elapsed().as_secs_f64() * 1_000.0);
        result
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}
