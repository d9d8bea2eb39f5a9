//! Emotion self-report questionnaire.
//!
//! The model is shown the agent's memories and current emotion, then asked
//! to rate each of the eight basic emotions on a 1-5 scale, in an order
//! shuffled per call.

use std::fmt::Write as _;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use reverie_core::context::EMPTY_SECTION;
use reverie_core::emotion::EmotionDimension;
use reverie_core::{AgentId, EmotionVector};
use reverie_llm::prompt::questionnaire_prompt;

use crate::engine::Engine;
use crate::error::Result;

/// Number of answers a valid reply carries.
pub const QUESTION_COUNT: usize = EmotionDimension::ALL.len();

/// Standalone digits `1`-`5` in reply order.
///
/// A digit counts only when it is not part of a longer word or number,
/// so `10` and `a3` contribute nothing.
#[must_use]
pub fn parse_scale_answers(reply: &str) -> Vec<u8> {
    reply
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter_map(|token| match token.as_bytes() {
            [d @ b'1'..=b'5'] => Some(d - b'0'),
            _ => None,
        })
        .collect()
}

/// Map ratings back to dimensions through the question order, scaling
/// `1..=5` onto `0..=1`. `None` unless there is exactly one answer per
/// question.
#[must_use]
pub fn answers_to_vector(order: &[EmotionDimension], answers: &[u8]) -> Option<EmotionVector> {
    if order.len() != QUESTION_COUNT || answers.len() != QUESTION_COUNT {
        return None;
    }
    Some(
        order
            .iter()
            .zip(answers)
            .fold(EmotionVector::zero(), |v, (dim, s)| {
                v.with(*dim, f32::from(s.saturating_sub(1)) / 4.0)
            }),
    )
}

fn shuffled_dimensions() -> Vec<EmotionDimension> {
    let mut order = EmotionDimension::ALL.to_vec();
    order.shuffle(&mut rand::thread_rng());
    order
}

fn capitalized(dim: EmotionDimension) -> String {
    let name = dim.as_str();
    let mut chars = name.chars();
    chars
        .next()
        .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
        .unwrap_or_default()
}

impl Engine {
    /// Ask the model how `agent` feels, record the answer as a new emotion
    /// state and damp it. Returns the damped state, or `None` if generation
    /// failed or the reply did not carry exactly eight ratings.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store
    /// failures.
    pub async fn measure_emotion(&self, agent: &AgentId) -> Result<Option<EmotionVector>> {
        let scenario = self.questionnaire_scenario(agent)?;
        let order = shuffled_dimensions();
        let names: Vec<String> = order.iter().copied().map(capitalized).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let reply = match self.generate(&questionnaire_prompt(&scenario, &names)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(agent = %agent, error = %e, "Emotion questionnaire failed");
                return Ok(None);
            }
        };

        let answers = parse_scale_answers(&reply);
        let Some(measured) = answers_to_vector(&order, &answers) else {
            warn!(
                agent = %agent,
                answers = answers.len(),
                "Questionnaire reply needs exactly 8 ratings"
            );
            return Ok(None);
        };

        self.emotion.record(agent, measured)?;
        let adjusted = self.emotion.adjust(agent)?;
        debug!(agent = %agent, measured = %measured, "Emotion measured");
        Ok(Some(adjusted))
    }

    /// Memories and current emotion, in the context section layout.
    fn questionnaire_scenario(&self, agent: &AgentId) -> Result<String> {
        let limits = &self.config.memory;
        let short_term = self.memory.recent(agent, limits.recent_limit)?;
        let long_term = self.memory.top_facts(agent, limits.top_limit)?;
        let current = self.emotion.current(agent)?;

        let mut out = String::new();
        let sections = [("Short-Term Memories", &short_term), ("Long-Term Memories", &long_term)];
        for (title, items) in sections {
            let _ = writeln!(out, "=== {title} ===");
            if items.is_empty() {
                let _ = writeln!(out, "{EMPTY_SECTION}");
            }
            for (i, item) in items.iter().enumerate() {
                let _ = writeln!(out, "{}. {item}", i + 1);
            }
            out.push('\n');
        }
        let _ = write!(out, "=== Current Emotion State ===\n{current}");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_digits_only() {
        assert_eq!(parse_scale_answers("1. 3\nJoy: 4, 10 a2 (5)"), vec![1, 3, 4, 5]);
        assert_eq!(parse_scale_answers("0 6 7"), Vec::<u8>::new());
    }

    #[test]
    fn exactly_eight_answers_required() {
        let order = EmotionDimension::ALL.to_vec();
        assert!(answers_to_vector(&order, &[3; 7]).is_none());
        assert!(answers_to_vector(&order, &[3; 9]).is_none());
        let v = answers_to_vector(&order, &[1, 2, 3, 4, 5, 1, 1, 1]).expect("eight");
        assert!(v.joy.abs() < f32::EPSILON);
        assert!((v.trust - 0.25).abs() < f32::EPSILON);
        assert!((v.surprise - 0.75).abs() < f32::EPSILON);
        assert!((v.sadness - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn answers_follow_shuffled_order() {
        let mut order = EmotionDimension::ALL.to_vec();
        order.reverse();
        let v = answers_to_vector(&order, &[5, 1, 1, 1, 1, 1, 1, 1]).expect("eight");
        assert!((v.anticipation - 1.0).abs() < f32::EPSILON);
        assert!(v.joy.abs() < f32::EPSILON);
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut order = shuffled_dimensions();
        order.sort_by_key(|d| d.as_str());
        let mut all = EmotionDimension::ALL.to_vec();
        all.sort_by_key(|d| d.as_str());
        assert_eq!(order, all);
        assert_eq!(capitalized(EmotionDimension::Anticipation), "Anticipation");
    }
}
