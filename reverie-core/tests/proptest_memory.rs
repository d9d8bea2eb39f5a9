//! Property-based tests for memory and emotion invariants.

use std::sync::Arc;

use proptest::prelude::*;

use reverie_core::config::{MemoryConfig, ScoringConfig};
use reverie_core::embedding::{HashingEmbeddingProvider, StubEmbeddingProvider};
use reverie_core::metrics::EngineCounters;
use reverie_core::scoring::{ImportanceScorer, ScoreInputs};
use reverie_core::sentiment::LexiconSentiment;
use reverie_core::{AgentId, EmotionVector, MemoryStore, SqliteStore};

fn memory(capacity: usize) -> MemoryStore {
    MemoryStore::new(
        Arc::new(SqliteStore::open_in_memory().expect("open")),
        ImportanceScorer::new(Arc::new(StubEmbeddingProvider::default()), ScoringConfig::default()),
        Arc::new(LexiconSentiment::new()),
        MemoryConfig {
            short_term_capacity: capacity,
            ..MemoryConfig::default()
        },
        Arc::new(EngineCounters::new()),
    )
}

// ---------------------------------------------------------------------------
// Property: short-term size never exceeds capacity
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn short_term_respects_capacity(
        capacity in 1usize..8,
        inserts in prop::collection::vec((0usize..3, "[a-d]{1,3}"), 0..30),
    ) {
        let m = memory(capacity);
        let agents = [AgentId::new("A"), AgentId::new("B"), AgentId::new("C")];
        for (who, content) in &inserts {
            m.insert(&agents[*who], content, "").expect("insert");
            prop_assert!(m.short_term_records(&agents[*who]).expect("records").len() <= capacity);
        }
        for (i, agent) in agents.iter().enumerate() {
            let expected = inserts.iter().filter(|(w, _)| *w == i).count().min(capacity);
            prop_assert_eq!(m.short_term_records(agent).expect("records").len(), expected);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: damping
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn damping_leaves_mid_range_values_alone(v in 0.3f32..=0.7) {
        let damped = EmotionVector::from_array([v; 8]).damped(0.7, 0.2, 0.5);
        prop_assert_eq!(damped.to_array(), [v; 8]);
    }

    #[test]
    fn repeated_damping_approaches_target_from_above(v in 0.7001f32..=1.0, rounds in 1usize..50) {
        let mut x = EmotionVector::from_array([v; 8]);
        let mut prev = v;
        for _ in 0..rounds {
            x = x.damped(0.7, 0.2, 0.5);
            let now = x.joy;
            prop_assert!(now <= prev);
            prop_assert!(now >= 0.5);
            prev = now;
        }
    }

    #[test]
    fn damped_vector_stays_in_unit_range(values in prop::array::uniform8(-2.0f32..2.0)) {
        let damped = EmotionVector::from_array(values).damped(0.7, 0.2, 0.5);
        for x in damped.to_array() {
            prop_assert!((0.0..=1.0).contains(&x));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: importance is a whole number in [0, 10]
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn importance_is_bounded_and_whole(
        content in "[a-z ]{0,40}",
        context in "[a-z \n]{0,80}",
        minutes in 0u64..500,
        frequency in 0u32..100,
        sentiment in -5.0f32..5.0,
    ) {
        let scorer = ImportanceScorer::new(
            Arc::new(HashingEmbeddingProvider::default()),
            ScoringConfig::default(),
        );
        let total = scorer.score(&ScoreInputs {
            content: &content,
            context: &context,
            recency_minutes: minutes,
            frequency,
            sentiment,
        });
        prop_assert!((0.0..=10.0).contains(&total));
        prop_assert!((total - total.trunc()).abs() < f32::EPSILON);
    }
}
