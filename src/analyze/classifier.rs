//! Classifier adapter: truncation, input checks and the NEUTRAL fallback
//! around a shared [`SentimentModel`].
//!
//! [`SentimentClassifier::try_classify`] reports every failure as a
//! [`ClassificationError`]; [`SentimentClassifier::classify`] collapses all of
//! them to NEUTRAL and never fails or panics. No retries: one attempt per item.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use metrics::counter;

use crate::sentiment::{SentimentLabel, SentimentModel};

/// Longest input (in chars) handed to the model.
pub const DEFAULT_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("input is missing or not text")]
    Missing,
    #[error("input is empty")]
    EmptyInput,
    #[error("model `{model}` failed: {message}")]
    Model { model: &'static str, message: String },
    #[error("model `{0}` panicked")]
    Panicked(&'static str),
    #[error("model `{0}` returned an empty label")]
    EmptyLabel(&'static str),
}

impl ClassificationError {
    /// Short tag for metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::EmptyInput => "empty_input",
            Self::Model { .. } => "model_error",
            Self::Panicked(_) => "panic",
            Self::EmptyLabel(_) => "empty_label",
        }
    }
}

pub struct SentimentClassifier {
    model: Arc<dyn SentimentModel>,
    max_chars: usize,
    /// Present when model calls must run one at a time.
    gate: Option<Mutex<()>>,
}

impl SentimentClassifier {
    /// Serializes calls automatically when the model is not reentrant.
    pub fn new(model: Arc<dyn SentimentModel>) -> Self {
        let gate = (!model.is_reentrant()).then(|| Mutex::new(()));
        Self {
            model,
            max_chars: DEFAULT_MAX_CHARS,
            gate,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    /// Force one-at-a-time model calls regardless of what the model reports.
    pub fn serialized(mut self) -> Self {
        if self.gate.is_none() {
            self.gate = Some(Mutex::new(()));
        }
        self
    }

    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    /// `None` stands for upstream input that was not a string.
    pub fn try_classify(&self, text: Option<&str>) -> Result<SentimentLabel, ClassificationError> {
        let text = text.ok_or(ClassificationError::Missing)?;
        if text.trim().is_empty() {
            return Err(ClassificationError::EmptyInput);
        }
        let input = truncate_chars(text, self.max_chars);
        let name = self.model.name();

        let outcome = {
            let _guard = self
                .gate
                .as_ref()
                .map(|g| g.lock().unwrap_or_else(PoisonError::into_inner));
            panic::catch_unwind(AssertUnwindSafe(|| self.model.predict(input)))
        };

        match outcome {
            Err(_) => Err(ClassificationError::Panicked(name)),
            Ok(Err(e)) => Err(ClassificationError::Model {
                model: name,
                message: format!("{e:#}"),
            }),
            Ok(Ok(pred)) => {
                SentimentLabel::parse(&pred.label).ok_or(ClassificationError::EmptyLabel(name))
            }
        }
    }

    /// Total: any failure becomes NEUTRAL.
    pub fn classify(&self, text: Option<&str>) -> SentimentLabel {
        match self.try_classify(text) {
            Ok(label) => label,
            Err(e) => {
                counter!("sentiment_fallback_total", "kind" => e.kind()).increment(1);
                tracing::debug!(target: "sentiment", error = %e, "classification fell back to NEUTRAL");
                SentimentLabel::neutral()
            }
        }
    }

    pub fn classify_text(&self, text: &str) -> SentimentLabel {
        self.classify(Some(text))
    }
}

/// Right-truncate to at most `max` chars, always on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
