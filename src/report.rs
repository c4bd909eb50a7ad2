//! Run-level roll-up of per-ticker outcomes for display and logs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analyze::SentimentSummary;
use crate::pipeline::{FailureReason, TickerOutcome};

/// Compact per-ticker line for the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerLine {
    pub ticker: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<f64>,
    pub articles: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub requested: usize,
    pub complete: usize,
    pub failed: usize,
    /// Failure counts keyed by reason code.
    pub failures: BTreeMap<&'static str, usize>,
    /// Sentiment counts across all complete tickers.
    pub overall: SentimentSummary,
    pub lines: Vec<TickerLine>,
}

impl PipelineReport {
    pub fn from_outcomes(outcomes: &[TickerOutcome]) -> Self {
        let mut rep = Self {
            requested: outcomes.len(),
            ..Self::default()
        };

        for o in outcomes {
            match o {
                TickerOutcome::Complete(r) => {
                    rep.complete += 1;
                    rep.overall.merge(&r.summary);
                    rep.lines.push(TickerLine {
                        ticker: r.ticker.to_string(),
                        status: "COMPLETE",
                        last_close: r.prices.last_close(),
                        change_pct: r.prices.change_pct().map(round2),
                        articles: r.articles.len(),
                        dominant: r.summary.dominant().map(|l| l.to_string()),
                        reason: None,
                    });
                }
                TickerOutcome::Failed(f) => {
                    rep.failed += 1;
                    *rep.failures.entry(f.reason.code()).or_insert(0) += 1;
                    rep.lines.push(TickerLine {
                        ticker: f.ticker.to_string(),
                        status: "FAILED",
                        last_close: None,
                        change_pct: None,
                        articles: 0,
                        dominant: None,
                        reason: Some(f.reason.code()),
                    });
                }
            }
        }
        rep
    }

    pub fn failures_for(&self, reason: FailureReason) -> usize {
        self.failures.get(reason.code()).copied().unwrap_or(0)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
