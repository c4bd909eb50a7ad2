//! Sentiment labels and the model seam.
//!
//! A [`SentimentModel`] is any text -> label inference (a FinBERT-class
//! network, a remote endpoint, or the embedded [`LexiconModel`]). Callers go
//! through [`crate::analyze::classifier::SentimentClassifier`], never the
//! model directly.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).unwrap_or_default()
});

/// Classifier label, canonicalized to uppercase so the model's own
/// `neutral` and the pipeline fallback land in the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentimentLabel(String);

impl SentimentLabel {
    pub const NEUTRAL: &'static str = "NEUTRAL";
    pub const POSITIVE: &'static str = "POSITIVE";
    pub const NEGATIVE: &'static str = "NEGATIVE";

    /// Returns `None` for a blank label.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim().to_uppercase();
        if t.is_empty() {
            None
        } else {
            Some(Self(t))
        }
    }

    pub fn neutral() -> Self {
        Self(Self::NEUTRAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_neutral(&self) -> bool {
        self.0 == Self::NEUTRAL
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw model answer, shaped like a text-classification pipeline's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    #[serde(default)]
    pub score: Option<f32>,
}

/// Single-item, synchronous inference. Loaded once per process and shared.
pub trait SentimentModel: Send + Sync {
    fn predict(&self, text: &str) -> anyhow::Result<Prediction>;

    fn name(&self) -> &'static str;

    /// `false` if concurrent `predict` calls are unsafe; the classifier then
    /// serializes them.
    fn is_reentrant(&self) -> bool {
        true
    }
}

/// Deterministic financial-lexicon model. Stateless, hence reentrant.
#[derive(Debug, Clone, Default)]
pub struct LexiconModel;

impl LexiconModel {
    pub fn new() -> Self {
        Self
    }

    /// Lexicon score for a single token (0 when unknown).
    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// A negator within the 3 preceding tokens flips the sign of a word's score.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }
}

impl SentimentModel for LexiconModel {
    fn predict(&self, text: &str) -> anyhow::Result<Prediction> {
        let (score, tokens) = self.score_text(text);
        let label = match score {
            s if s > 0 => "positive",
            s if s < 0 => "negative",
            _ => "neutral",
        };
        // Crude confidence: share of tokens carrying the signal.
        let conf = if tokens == 0 {
            0.0
        } else {
            (score.unsigned_abs() as f32 / tokens as f32).min(1.0)
        };
        Ok(Prediction {
            label: label.to_string(),
            score: Some(conf),
        })
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Alphanumeric lower-case tokens.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

/// Single-token negators ("no longer" is covered by "no" after tokenization).
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "without" | "cannot" | "neither" | "nor" | "fails" | "failed"
    )
}
