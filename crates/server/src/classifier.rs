//! Classifier collaborator seam
//!
//! The numeric classifier and tokenizer are external collaborators behind
//! the [`Classifier`] and [`ModelLoader`] traits. The service core only
//! depends on `predict_batch` over text and a loader that turns a model
//! source into classifier state.

use serde::{Deserialize, Serialize};
use sentiloop_common::{Result, SentiloopError};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sentiment polarity label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Negative => "negative",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single prediction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// Polarity label
    pub label: Label,

    /// Confidence score in [0, 1]
    pub score: f32,
}

/// Where a model was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Fine-tuned artifacts persisted on disk
    FineTuned(PathBuf),

    /// Pretrained baseline identified by name
    Pretrained(String),
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::FineTuned(path) => write!(f, "fine-tuned ({})", path.display()),
            ModelSource::Pretrained(id) => write!(f, "pretrained ({id})"),
        }
    }
}

/// A loaded classifier ready to serve batched predictions.
///
/// Implementations must return exactly one result per input text, in
/// input order.
pub trait Classifier: Send + Sync {
    fn predict_batch(&self, texts: &[String]) -> Result<Vec<Sentiment>>;
}

/// Loads classifier state from a model source
pub trait ModelLoader: Send + Sync {
    fn load(&self, source: &ModelSource) -> Result<Box<dyn Classifier>>;
}

/// Term-polarity classifier used as the built-in collaborator.
///
/// Scores text by summing signed term weights. The fine-tuned form reads
/// its term table from `lexicon.json` in the artifact directory, which
/// keeps the hot-swap path observable end to end without any claim of
/// prediction quality.
pub struct LexiconClassifier {
    terms: HashMap<String, f32>,
}

impl LexiconClassifier {
    pub fn new(terms: HashMap<String, f32>) -> Self {
        Self { terms }
    }

    /// Built-in baseline term table
    pub fn baseline() -> Self {
        let mut terms = HashMap::new();
        for word in [
            "good", "great", "excellent", "amazing", "love", "wonderful", "best", "happy",
            "fantastic", "nice",
        ] {
            terms.insert(word.to_string(), 1.0);
        }
        for word in [
            "bad", "terrible", "awful", "horrible", "hate", "worst", "poor", "sad",
            "disappointing", "broken",
        ] {
            terms.insert(word.to_string(), -1.0);
        }
        Self { terms }
    }

    fn score_text(&self, text: &str) -> Sentiment {
        let mut total = 0.0f32;
        let mut matched = 0u32;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            if let Some(weight) = self.terms.get(&token.to_lowercase()) {
                total += weight;
                matched += 1;
            }
        }

        if matched == 0 {
            // No signal; lean positive with no confidence margin
            return Sentiment {
                label: Label::Positive,
                score: 0.5,
            };
        }

        let label = if total >= 0.0 {
            Label::Positive
        } else {
            Label::Negative
        };
        let score = (0.5 + 0.5 * (total.abs() / matched as f32)).clamp(0.0, 1.0);
        Sentiment { label, score }
    }
}

impl Classifier for LexiconClassifier {
    fn predict_batch(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        Ok(texts.iter().map(|t| self.score_text(t)).collect())
    }
}

/// Loader producing [`LexiconClassifier`] instances
#[derive(Debug, Default)]
pub struct LexiconLoader;

impl LexiconLoader {
    pub fn new() -> Self {
        Self
    }

    fn load_lexicon(dir: &Path) -> Result<HashMap<String, f32>> {
        let path = dir.join("lexicon.json");
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SentiloopError::model_load(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let terms: HashMap<String, f32> = serde_json::from_str(&content).map_err(|e| {
            SentiloopError::model_load(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        if terms.is_empty() {
            return Err(SentiloopError::model_load(format!(
                "Lexicon {} contains no terms",
                path.display()
            )));
        }
        Ok(terms)
    }
}

impl ModelLoader for LexiconLoader {
    fn load(&self, source: &ModelSource) -> Result<Box<dyn Classifier>> {
        match source {
            ModelSource::FineTuned(dir) => {
                let terms = Self::load_lexicon(dir)?;
                info!(
                    "Loaded fine-tuned lexicon from {} ({} terms)",
                    dir.display(),
                    terms.len()
                );
                Ok(Box::new(LexiconClassifier::new(terms)))
            }
            ModelSource::Pretrained(id) => {
                info!("Loaded built-in baseline lexicon for {id}");
                Ok(Box::new(LexiconClassifier::baseline()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_scores_polarity() {
        let classifier = LexiconClassifier::baseline();
        let results = classifier
            .predict_batch(&["great product".to_string(), "terrible".to_string()])
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].label, Label::Positive);
        assert_eq!(results[1].label, Label::Negative);
        for result in &results {
            assert!(result.score >= 0.0 && result.score <= 1.0);
        }
    }

    #[test]
    fn test_no_signal_is_neutral_positive() {
        let classifier = LexiconClassifier::baseline();
        let results = classifier.predict_batch(&["ok".to_string()]).unwrap();
        assert_eq!(results[0].label, Label::Positive);
        assert_eq!(results[0].score, 0.5);
    }

    #[test]
    fn test_one_result_per_input() {
        let classifier = LexiconClassifier::baseline();
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        assert_eq!(classifier.predict_batch(&texts).unwrap().len(), 5);
    }

    #[test]
    fn test_label_serializes_lowercase() {
        let sentiment = Sentiment {
            label: Label::Negative,
            score: 0.9,
        };
        let json = serde_json::to_string(&sentiment).unwrap();
        assert!(json.contains("\"negative\""));
    }

    #[test]
    fn test_loader_reads_finetuned_lexicon() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lexicon.json"),
            r#"{"stellar": 1.0, "rubbish": -1.0}"#,
        )
        .unwrap();

        let loader = LexiconLoader::new();
        let classifier = loader
            .load(&ModelSource::FineTuned(dir.path().to_path_buf()))
            .unwrap();
        let results = classifier
            .predict_batch(&["stellar stuff".to_string()])
            .unwrap();
        assert_eq!(results[0].label, Label::Positive);
    }

    #[test]
    fn test_loader_fails_on_missing_lexicon() {
        let dir = tempfile::tempdir().unwrap();
        let loader = LexiconLoader::new();
        let result = loader.load(&ModelSource::FineTuned(dir.path().to_path_buf()));
        assert!(matches!(result, Err(SentiloopError::ModelLoad(_))));
    }

    #[test]
    fn test_loader_fails_on_malformed_lexicon() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lexicon.json"), "not json").unwrap();
        let loader = LexiconLoader::new();
        let result = loader.load(&ModelSource::FineTuned(dir.path().to_path_buf()));
        assert!(matches!(result, Err(SentiloopError::ModelLoad(_))));
    }
}
