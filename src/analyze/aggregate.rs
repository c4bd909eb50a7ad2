//! Per-ticker sentiment tally over article titles.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;

use crate::analyze::classifier::SentimentClassifier;
use crate::model::{NewsArticle, SentimentedArticle};
use crate::sentiment::SentimentLabel;

/// Label -> article count. Ordered by label so output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SentimentSummary(BTreeMap<SentimentLabel, usize>);

impl SentimentSummary {
    pub fn record(&mut self, label: &SentimentLabel) {
        *self.0.entry(label.clone()).or_insert(0) += 1;
    }

    pub fn count(&self, label: &str) -> usize {
        SentimentLabel::parse(label)
            .and_then(|l| self.0.get(&l).copied())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SentimentLabel, usize)> {
        self.0.iter().map(|(l, n)| (l, *n))
    }

    pub fn merge(&mut self, other: &SentimentSummary) {
        for (label, n) in other.iter() {
            *self.0.entry(label.clone()).or_insert(0) += n;
        }
    }

    /// Most frequent label; ties go to the label that sorts first.
    pub fn dominant(&self) -> Option<&SentimentLabel> {
        self.0
            .iter()
            .fold(None, |best: Option<(&SentimentLabel, usize)>, (l, n)| match best {
                Some((_, bn)) if bn >= *n => best,
                _ => Some((l, *n)),
            })
            .map(|(l, _)| l)
    }
}

/// Runs the classifier over a ticker's articles.
#[derive(Clone)]
pub struct SentimentAggregator {
    classifier: Arc<SentimentClassifier>,
}

impl SentimentAggregator {
    pub fn new(classifier: Arc<SentimentClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &SentimentClassifier {
        &self.classifier
    }

    /// Label every article by its title, in input order.
    /// The summary total always equals the number of articles.
    pub fn aggregate(&self, articles: &[NewsArticle]) -> (Vec<SentimentedArticle>, SentimentSummary) {
        let mut summary = SentimentSummary::default();
        let scored = articles
            .iter()
            .map(|a| {
                let sentiment = self.classifier.classify_text(&a.title);
                summary.record(&sentiment);
                SentimentedArticle {
                    article: a.clone(),
                    sentiment,
                }
            })
            .collect();
        (scored, summary)
    }

    /// Same as [`Self::aggregate`], on the blocking pool so inference does
    /// not stall the async workers. If the blocking task dies, every article
    /// is labeled NEUTRAL; classification is never attempted twice.
    pub async fn aggregate_blocking(
        &self,
        articles: Arc<Vec<NewsArticle>>,
    ) -> (Vec<SentimentedArticle>, SentimentSummary) {
        let this = self.clone();
        let shared = Arc::clone(&articles);
        match tokio::task::spawn_blocking(move || this.aggregate(&shared)).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(target: "sentiment", error = %e, articles = articles.len(), "blocking aggregation failed; labeling NEUTRAL");
                counter!("sentiment_fallback_total", "kind" => "join").increment(articles.len() as u64);
                neutral_fill(&articles)
            }
        }
    }
}

/// Every article NEUTRAL; same shape as a normal aggregation.
fn neutral_fill(articles: &[NewsArticle]) -> (Vec<SentimentedArticle>, SentimentSummary) {
    let neutral = SentimentLabel::neutral();
    let mut summary = SentimentSummary::default();
    let scored = articles
        .iter()
        .map(|a| {
            summary.record(&neutral);
            SentimentedArticle {
                article: a.clone(),
                sentiment: neutral.clone(),
            }
        })
        .collect();
    (scored, summary)
}
