//! Reverie benchmark suite.
//!
//! Hot paths exercised on every turn:
//!   importance_score_single ........ scoring one memory against a context
//!   insert_with_eviction ........... short-term insert at capacity
//!   context_assembly_full .......... three-section context render
//!   emotion_react .................. update + adjust cycle

use std::sync::Arc;

use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use reverie_core::config::{EmotionConfig, MemoryConfig, ScoringConfig};
use reverie_core::embedding::HashingEmbeddingProvider;
use reverie_core::metrics::EngineCounters;
use reverie_core::scoring::{ImportanceScorer, ScoreInputs};
use reverie_core::sentiment::LexiconSentiment;
use reverie_core::{
    AgentId, ContextAssembler, ContextLimits, ConversationId, ConversationTurn, EmotionTracker,
    MemoryStore, SqliteStore,
};

const CONTEXT: &str = "=== Short-Term Memories ===\n\
    The launch moved to Friday\n\
    Mina is worried about the deadline\n\n\
    === Long-Term Memories ===\n\
    Theo prefers small releases\n\n\
    === Conversation History ===\n\
    Mina: Can we still make it?\n";

struct Fixture {
    store: Arc<SqliteStore>,
    memory: Arc<MemoryStore>,
    counters: Arc<EngineCounters>,
}

fn fixture() -> Fixture {
    let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory store"));
    let counters = Arc::new(EngineCounters::new());
    let scorer = ImportanceScorer::new(
        Arc::new(HashingEmbeddingProvider::default()),
        ScoringConfig::default(),
    );
    let memory = Arc::new(MemoryStore::new(
        Arc::clone(&store),
        scorer,
        Arc::new(LexiconSentiment::new()),
        MemoryConfig::default(),
        Arc::clone(&counters),
    ));
    Fixture { store, memory, counters }
}

/// Benchmark: importance of one memory against a seven-line context.
fn bench_importance_score(c: &mut Criterion) {
    let scorer = ImportanceScorer::new(
        Arc::new(HashingEmbeddingProvider::default()),
        ScoringConfig::default(),
    );
    c.bench_function("importance_score_single", |b| {
        b.iter(|| {
            scorer.score(black_box(&ScoreInputs {
                content: "Mina is worried about the deadline",
                context: CONTEXT,
                recency_minutes: 5,
                frequency: 1,
                sentiment: -0.5,
            }))
        });
    });
}

/// Benchmark: inserting into a full short-term tier, forcing an eviction.
fn bench_insert_with_eviction(c: &mut Criterion) {
    let f = fixture();
    let agent = AgentId::new("bench");
    for i in 0..f.memory.config().short_term_capacity {
        f.memory.insert(&agent, &format!("warm-up memory {i}"), CONTEXT).expect("insert");
    }

    let mut i = 0_u64;
    c.bench_function("insert_with_eviction", |b| {
        b.iter(|| {
            i += 1;
            f.memory
                .insert(&agent, black_box(&format!("memory number {i}")), CONTEXT)
                .expect("insert")
        });
    });
}

/// Benchmark: context for an agent with full tiers and twenty logged turns.
fn bench_context_assembly(c: &mut Criterion) {
    let f = fixture();
    let agent = AgentId::new("bench");
    for i in 0..10 {
        f.memory.insert(&agent, &format!("short-term note {i}"), CONTEXT).expect("insert");
    }
    f.memory.promote(&agent).expect("promote");
    let conversation = ConversationId::new();
    for i in 0..20_u64 {
        f.store
            .append_turn(&ConversationTurn {
                conversation,
                turn_number: i + 1,
                speaker: "bench".into(),
                addressee: None,
                message: format!("line {i}"),
                occurred_at: Utc::now(),
            })
            .expect("append");
    }
    let assembler = ContextAssembler::new(Arc::clone(&f.memory), Arc::clone(&f.store));

    c.bench_function("context_assembly_full", |b| {
        b.iter(|| {
            assembler
                .assemble(black_box(&agent), ContextLimits::default())
                .expect("assemble")
        });
    });
}

/// Benchmark: one emotional reaction to an utterance.
fn bench_emotion_react(c: &mut Criterion) {
    let f = fixture();
    let tracker = EmotionTracker::new(
        Arc::clone(&f.store),
        Arc::new(LexiconSentiment::new()),
        EmotionConfig::default(),
        Arc::clone(&f.counters),
    );
    let agent = AgentId::new("bench");

    c.bench_function("emotion_react", |b| {
        b.iter(|| {
            tracker
                .react_to(&agent, black_box("I'm panicking about the deadline"))
                .expect("react")
        });
    });
}

criterion_group!(
    benches,
    bench_importance_score,
    bench_insert_with_eviction,
    bench_context_assembly,
    bench_emotion_react,
);
criterion_main!(benches);
