//! Importance scoring.
//!
//! ```text
//! importance = w_rel·relevance + w_rec·recency + w_freq·frequency + w_sent·sentiment
//! ```
//!
//! Every component lives on a `0..=10` scale. The weighted sum is clamped to
//! `[0, 10]` and truncated to a whole number, so promotion thresholds compare
//! integers. Default weights are `0.4 / 0.3 / 0.2 / 0.1`.

use std::sync::Arc;

use ordered_float::OrderedFloat;
use tracing::warn;

use crate::config::ScoringConfig;
use crate::embedding::{EmbeddingProvider, cosine_similarity};

/// Inputs to one importance computation.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    /// Text being scored.
    pub content: &'a str,
    /// Rendered context the content is compared against.
    pub context: &'a str,
    /// Minutes since the memory was written (or last accessed).
    pub recency_minutes: u64,
    /// Number of other memories with identical content.
    pub frequency: u32,
    /// Sentiment polarity in `[-1, 1]`.
    pub sentiment: f32,
}

/// Per-component view of a score, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Scaled maximum cosine similarity against the context.
    pub relevance: f32,
    /// Recency component.
    pub recency: f32,
    /// Frequency component.
    pub frequency: f32,
    /// Sentiment component.
    pub sentiment: f32,
    /// Final clamped, truncated importance.
    pub total: f32,
}

/// Computes memory importance from content, context and usage signals.
#[derive(Clone)]
pub struct ImportanceScorer {
    embedder: Arc<dyn EmbeddingProvider>,
    weights: ScoringConfig,
}

impl std::fmt::Debug for ImportanceScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportanceScorer")
            .field("embedder", &self.embedder.model_name())
            .field("weights", &self.weights)
            .finish()
    }
}

impl ImportanceScorer {
    /// Create a scorer using `embedder` for relevance.
    #[must_use]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, weights: ScoringConfig) -> Self {
        Self { embedder, weights }
    }

    /// Final importance in `[0, 10]`, truncated to a whole number.
    #[must_use]
    pub fn score(&self, inputs: &ScoreInputs<'_>) -> f32 {
        self.breakdown(inputs).total
    }

    /// Compute every component along with the total.
    #[must_use]
    pub fn breakdown(&self, inputs: &ScoreInputs<'_>) -> ScoreBreakdown {
        let relevance = self.relevance(inputs.content, inputs.context);
        let recency = recency_score(inputs.recency_minutes);
        let frequency = frequency_score(inputs.frequency);
        let sentiment = sentiment_score(inputs.sentiment);

        let w = &self.weights;
        let raw = w.relevance_weight * relevance
            + w.recency_weight * recency
            + w.frequency_weight * frequency
            + w.sentiment_weight * sentiment;

        ScoreBreakdown {
            relevance,
            recency,
            frequency,
            sentiment,
            total: raw.clamp(0.0, 10.0).trunc(),
        }
    }

    /// Ten times the best cosine similarity between `content` and any
    /// content line of `context`. Zero when nothing can be compared.
    #[must_use]
    pub fn relevance(&self, content: &str, context: &str) -> f32 {
        let lines = context_lines(context);
        if lines.is_empty() || content.trim().is_empty() {
            return 0.0;
        }

        let target = match self.embedder.embed(content) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Embedding failed for memory content, relevance = 0");
                return 0.0;
            }
        };
        let candidates = match self.embedder.embed_batch(&lines) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding failed for context lines, relevance = 0");
                return 0.0;
            }
        };

        candidates
            .iter()
            .map(|c| OrderedFloat(cosine_similarity(&target, c)))
            .max()
            .map_or(0.0, |best| (best.0 * 10.0).clamp(0.0, 10.0))
    }
}

/// `max(0, 10 - minutes / 10)` with integer division.
#[must_use]
pub fn recency_score(minutes: u64) -> f32 {
    let decayed = 10_u64.saturating_sub(minutes / 10);
    // At most 10, exact in f32.
    #[allow(clippy::cast_precision_loss)]
    let score = decayed as f32;
    score
}

/// `min(10, 2 * count)`.
#[must_use]
pub fn frequency_score(count: u32) -> f32 {
    let capped = count.saturating_mul(2).min(10);
    // At most 10, exact in f32.
    #[allow(clippy::cast_precision_loss)]
    let score = capped as f32;
    score
}

/// Maps polarity `[-1, 1]` onto `[0, 10]`.
#[must_use]
pub fn sentiment_score(sentiment: f32) -> f32 {
    if !sentiment.is_finite() {
        return 5.0;
    }
    ((sentiment + 1.0) * 5.0).clamp(0.0, 10.0)
}

/// Lines of a rendered context that carry content: non-empty and not a
/// section header (`=== ... ===`), a label ending in `:`, or a
/// parenthesised placeholder.
#[must_use]
pub fn context_lines(context: &str) -> Vec<&str> {
    context
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !(line.starts_with("===") && line.ends_with("===")))
        .filter(|line| !line.ends_with(':'))
        .filter(|line| !(line.starts_with('(') && line.ends_with(')')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingEmbeddingProvider, StubEmbeddingProvider};
    use crate::error::{Result, ReverieError};
    use crate::types::Embedding;

    struct FailingEmbedder;

    impl EmbeddingProvider for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Embedding> {
            Err(ReverieError::Embedding("model offline".into()))
        }
        fn dimensions(&self) -> usize {
            0
        }
        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn hashing_scorer() -> ImportanceScorer {
        ImportanceScorer::new(
            Arc::new(HashingEmbeddingProvider::default()),
            ScoringConfig::default(),
        )
    }

    fn inputs<'a>(content: &'a str, context: &'a str) -> ScoreInputs<'a> {
        ScoreInputs {
            content,
            context,
            recency_minutes: 0,
            frequency: 0,
            sentiment: 0.0,
        }
    }

    #[test]
    fn component_formulas() {
        assert!((recency_score(0) - 10.0).abs() < f32::EPSILON);
        assert!((recency_score(59) - 5.0).abs() < f32::EPSILON);
        assert!(recency_score(500).abs() < f32::EPSILON);
        assert!((frequency_score(3) - 6.0).abs() < f32::EPSILON);
        assert!((frequency_score(40) - 10.0).abs() < f32::EPSILON);
        assert!(sentiment_score(-1.0).abs() < f32::EPSILON);
        assert!((sentiment_score(0.0) - 5.0).abs() < f32::EPSILON);
        assert!((sentiment_score(3.0) - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unrelated_fresh_neutral_memory_scores_three() {
        // 0.3 * 10 + 0.1 * 5 = 3.5 -> 3
        let scorer = hashing_scorer();
        let score = scorer.score(&inputs("The mill wheel creaks", ""));
        assert!((score - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn memory_echoed_in_context_reaches_promotion_threshold() {
        // 0.4 * 10 + 0.3 * 10 + 0.1 * 5 = 7.5 -> 7
        let scorer = hashing_scorer();
        let context = "=== Short-Term Memories ===\nThe mill wheel creaks\n";
        let b = scorer.breakdown(&inputs("The mill wheel creaks", context));
        assert!(b.relevance > 9.9);
        assert!((b.total - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn label_lines_are_ignored() {
        let lines = context_lines(
            "=== Long-Term Memories ===\n(none available)\nSummary:\n\n  Ada: hello there \n",
        );
        assert_eq!(lines, vec!["Ada: hello there"]);
    }

    #[test]
    fn embedding_failure_yields_zero_relevance() {
        let scorer = ImportanceScorer::new(Arc::new(FailingEmbedder), ScoringConfig::default());
        assert!(scorer.relevance("anything", "some context line").abs() < f32::EPSILON);
    }

    #[test]
    fn zero_vectors_give_zero_relevance() {
        let scorer = ImportanceScorer::new(
            Arc::new(StubEmbeddingProvider::default()),
            ScoringConfig::default(),
        );
        assert!(scorer.relevance("a", "a").abs() < f32::EPSILON);
    }
}
