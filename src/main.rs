//! stock-sentinel: one-shot CLI entrypoint.
//! Fetches prices and news for the given tickers (or the configured ones),
//! scores headline sentiment, and prints outcomes + report as JSON on stdout.
//! Logs go to stderr.

use serde_json::json;
use stock_sentinel::ingest::types::parse_tickers;
use stock_sentinel::{run_once, PipelineReport, TickerOutcome};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default; `SENTINEL_LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stock_sentinel=info,warn"));
    let json_logs = std::env::var("SENTINEL_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev (NEWSAPI_KEY, SENTINEL_CONFIG_PATH, RUST_LOG).
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcomes = run_once(&parse_tickers(&args)).await?;
    let report = PipelineReport::from_outcomes(&outcomes);

    for o in &outcomes {
        match o {
            TickerOutcome::Complete(r) => tracing::info!(
                ticker = %r.ticker,
                last_close = r.prices.last_close().unwrap_or_default(),
                articles = r.articles.len(),
                summary = ?r.summary,
                "ok"
            ),
            TickerOutcome::Failed(f) => tracing::warn!(
                ticker = %f.ticker,
                reason = f.reason.code(),
                "failed"
            ),
        }
    }

    let out = json!({ "results": outcomes, "report": report });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
