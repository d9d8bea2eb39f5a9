//! Lexical sentiment polarity.
//!
//! The engine only needs a single scalar in `[-1, 1]` per utterance. It is
//! consumed by the importance scorer and by the emotion tracker, and both
//! treat an analyzer failure as neutral through [`polarity_or_neutral`].

use tracing::warn;

use crate::embedding::tokenize;
use crate::error::Result;

/// Score the emotional polarity of a text.
pub trait SentimentAnalyzer: Send + Sync {
    /// Polarity in `[-1, 1]`: negative, neutral (`0`), or positive.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Sentiment`](crate::ReverieError::Sentiment)
    /// when the backing service cannot score the text.
    fn polarity(&self, text: &str) -> Result<f32>;
}

/// Query `analyzer`, falling back to `0.0` (and a warning) on failure.
pub fn polarity_or_neutral(analyzer: &dyn SentimentAnalyzer, text: &str) -> f32 {
    match analyzer.polarity(text) {
        Ok(p) if p.is_finite() => p.clamp(-1.0, 1.0),
        Ok(p) => {
            warn!(polarity = p, "Sentiment analyzer returned a non-finite value, using neutral");
            0.0
        }
        Err(e) => {
            warn!(error = %e, "Sentiment analysis failed, using neutral");
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Lexicon analyzer
// ---------------------------------------------------------------------------

const POSITIVE: &[(&str, f32)] = &[
    ("good", 0.7),
    ("great", 0.8),
    ("happy", 0.8),
    ("excellent", 1.0),
    ("joy", 0.8),
    ("love", 0.5),
    ("glad", 0.5),
    ("wonderful", 1.0),
    ("thanks", 0.2),
    ("thank", 0.2),
    ("calm", 0.3),
    ("hope", 0.4),
    ("excited", 0.4),
    ("nice", 0.6),
    ("fine", 0.4),
    ("success", 0.3),
    ("proud", 0.8),
    ("relieved", 0.4),
];

const NEGATIVE: &[(&str, f32)] = &[
    ("bad", -0.7),
    ("sad", -0.5),
    ("terrible", -1.0),
    ("awful", -1.0),
    ("hate", -0.8),
    ("angry", -0.5),
    ("panicking", -0.6),
    ("panic", -0.6),
    ("afraid", -0.6),
    ("scared", -0.5),
    ("worried", -0.5),
    ("stressed", -0.4),
    ("deadline", -0.1),
    ("fail", -0.5),
    ("failed", -0.5),
    ("lost", -0.3),
    ("hurt", -0.6),
    ("disgusting", -1.0),
    ("upset", -0.5),
];

const NEGATORS: &[&str] = &["not", "never", "no", "don't", "didn't", "isn't", "wasn't", "can't"];

/// Word-list sentiment analyzer.
///
/// Polarity is the mean of the scores of the lexicon words found in the
/// text; a preceding negator flips and halves a word's score. Texts with no
/// lexicon words are neutral. The analyzer never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    /// Create the analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn lookup(word: &str) -> Option<f32> {
        POSITIVE
            .iter()
            .chain(NEGATIVE.iter())
            .find(|(w, _)| *w == word)
            .map(|(_, score)| *score)
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn polarity(&self, text: &str) -> Result<f32> {
        let tokens = tokenize(text);
        let mut total = 0.0_f32;
        let mut matched = 0_u16;

        for (i, token) in tokens.iter().enumerate() {
            let Some(mut score) = Self::lookup(token) else {
                continue;
            };
            if i > 0 && NEGATORS.contains(&tokens[i - 1].as_str()) {
                score *= -0.5;
            }
            total += score;
            matched = matched.saturating_add(1);
        }

        if matched == 0 {
            return Ok(0.0);
        }
        Ok((total / f32::from(matched)).clamp(-1.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReverieError;

    struct Broken;

    impl SentimentAnalyzer for Broken {
        fn polarity(&self, _text: &str) -> Result<f32> {
            Err(ReverieError::Sentiment("service offline".into()))
        }
    }

    #[test]
    fn lexicon_scores_sign_of_text() {
        let s = LexiconSentiment::new();
        assert!(s.polarity("What a great and happy day").expect("polarity") > 0.0);
        assert!(s.polarity("I'm panicking about the deadline").expect("polarity") < 0.0);
        let neutral = s.polarity("The cart is parked by the well").expect("polarity");
        assert!(neutral.abs() < f32::EPSILON);
    }

    #[test]
    fn negation_flips_polarity() {
        let s = LexiconSentiment::new();
        assert!(s.polarity("this is not good").expect("polarity") < 0.0);
    }

    #[test]
    fn failures_fall_back_to_neutral() {
        assert!(polarity_or_neutral(&Broken, "anything").abs() < f32::EPSILON);
        assert!(polarity_or_neutral(&LexiconSentiment, "terrible awful").abs() <= 1.0);
    }
}
