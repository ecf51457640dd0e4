//! Semantic command routing
//!
//! Maps free-form utterances onto a fixed catalog of intents: every canonical
//! phrase is embedded once at startup, each incoming utterance is embedded and
//! compared by cosine similarity, and the best phrase wins if it clears the
//! confidence threshold. Below the threshold the utterance is handed to the
//! code-worthiness classifier and ultimately to the fallback responder.

pub mod catalog;
pub mod embedding;
pub mod worthiness;

pub use catalog::{default_catalog, normalize, IntentCatalog};
pub use embedding::{cosine_similarity, Embedder, HashEmbedder};
pub use worthiness::CodeWorthinessClassifier;

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Error type for routing failures
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Embedding computation failed: {0}")]
    Embedding(String),

    #[error("Phrase '{phrase}' registered for both '{first}' and '{second}'")]
    DuplicatePhrase {
        phrase: String,
        first: String,
        second: String,
    },

    #[error("Failed to read intent catalog {0}: {1}")]
    CatalogIo(String, #[source] std::io::Error),

    #[error("Failed to parse intent catalog: {0}")]
    CatalogParse(#[source] serde_json::Error),

    #[error("Intent catalog is empty")]
    EmptyCatalog,
}

/// Outcome of matching one utterance against the catalog
///
/// `label` is present only when `score` cleared the confidence threshold;
/// the score itself is kept either way, but callers must use it only for
/// diagnostics and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub label: Option<String>,
    pub score: f32,
}

impl MatchResult {
    /// Apply the confidence threshold to a best-scoring candidate.
    ///
    /// The boundary is inclusive: a score exactly at the threshold matches.
    pub fn from_best(label: &str, score: f32, threshold: f32) -> Self {
        if score >= threshold {
            Self {
                label: Some(label.to_string()),
                score,
            }
        } else {
            Self { label: None, score }
        }
    }

    pub fn rejected(score: f32) -> Self {
        Self { label: None, score }
    }

    pub fn is_match(&self) -> bool {
        self.label.is_some()
    }
}

/// One embedded canonical phrase
#[derive(Debug, Clone)]
struct IndexEntry {
    phrase: String,
    label: String,
    vector: Vec<f32>,
}

/// Pre-computed embeddings for every catalog phrase, in catalog order
pub struct PhraseEmbeddingIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
}

impl PhraseEmbeddingIndex {
    /// Embed every catalog phrase once
    pub fn build(catalog: &IntentCatalog, embedder: &dyn Embedder) -> Result<Self, RouterError> {
        if catalog.is_empty() {
            return Err(RouterError::EmptyCatalog);
        }
        let mut entries = Vec::with_capacity(catalog.phrase_count());
        for (label, phrase) in catalog.iter() {
            let vector = embedder.embed(phrase)?;
            entries.push(IndexEntry {
                phrase: phrase.to_string(),
                label: label.to_string(),
                vector,
            });
        }
        Ok(Self {
            entries,
            dimension: embedder.dimension(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embedding-similarity intent matcher
pub struct IntentMatcher {
    index: PhraseEmbeddingIndex,
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl IntentMatcher {
    pub fn new(
        catalog: &IntentCatalog,
        embedder: Arc<dyn Embedder>,
        threshold: f32,
    ) -> Result<Self, RouterError> {
        let index = PhraseEmbeddingIndex::build(catalog, embedder.as_ref())?;
        Ok(Self {
            index,
            embedder,
            threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Match one utterance against the catalog.
    ///
    /// Ties break to the first index entry at the maximum score, which is
    /// stable because the index order is fixed at startup. An embedding
    /// failure is fatal to the current turn and propagates.
    pub fn match_utterance(&self, utterance: &str) -> Result<MatchResult, RouterError> {
        let normalized = normalize(utterance);
        let query = self.embedder.embed(&normalized)?;

        let mut best: Option<(&IndexEntry, f32)> = None;
        for entry in &self.index.entries {
            let score = cosine_similarity(&query, &entry.vector);
            match best {
                // Strictly-greater keeps the first entry on ties
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((entry, score)),
            }
        }

        let (entry, score) = match best {
            Some(found) => found,
            None => return Ok(MatchResult::rejected(0.0)),
        };

        let result = MatchResult::from_best(&entry.label, score, self.threshold);
        if !result.is_match() {
            warn!(
                score,
                nearest = %entry.phrase,
                "Unrecognized or ambiguous command: '{}'", normalized
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matcher() -> IntentMatcher {
        let catalog = default_catalog();
        IntentMatcher::new(&catalog, Arc::new(HashEmbedder::default()), 0.55).unwrap()
    }

    #[test]
    fn test_index_parallel_to_catalog() {
        let catalog = default_catalog();
        let embedder = HashEmbedder::default();
        let index = PhraseEmbeddingIndex::build(&catalog, &embedder).unwrap();
        assert_eq!(index.len(), catalog.phrase_count());
        assert_eq!(index.dimension(), embedder.dimension());
        assert!(index
            .entries
            .iter()
            .all(|e| e.vector.len() == index.dimension()));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let catalog = IntentCatalog::new();
        let embedder = HashEmbedder::default();
        assert!(matches!(
            PhraseEmbeddingIndex::build(&catalog, &embedder),
            Err(RouterError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_threshold_boundary_inclusive() {
        let at = MatchResult::from_best("x", 0.55, 0.55);
        assert_eq!(at.label.as_deref(), Some("x"));

        let below = MatchResult::from_best("x", 0.549_999, 0.55);
        assert_eq!(below.label, None);
        assert!(below.score > 0.0);
    }

    #[test]
    fn test_volume_utterance_matches() {
        let result = matcher().match_utterance("Turn the volume up").unwrap();
        assert_eq!(result.label.as_deref(), Some("increase_volume"));
        assert!(result.score >= 0.55);
    }

    #[test]
    fn test_conversational_utterance_rejected() {
        let result = matcher()
            .match_utterance("what do you think about pizza")
            .unwrap();
        assert_eq!(result.label, None);
    }

    #[test]
    fn test_exact_phrase_is_full_score() {
        let result = matcher().match_utterance("take a screenshot").unwrap();
        assert_eq!(result.label.as_deref(), Some("take_screenshot"));
        assert!(result.score > 0.999);
    }

    #[test]
    fn test_tie_breaks_to_first_entry() {
        let mut catalog = IntentCatalog::new();
        // Same bag of words under two labels; "alpha" sorts first
        catalog.insert("alpha", ["green light on"]).unwrap();
        catalog.insert("beta", ["light on green"]).unwrap();
        let m = IntentMatcher::new(&catalog, Arc::new(HashEmbedder::default()), 0.55).unwrap();
        let result = m.match_utterance("green light on").unwrap();
        assert_eq!(result.label.as_deref(), Some("alpha"));
    }
}
