//! Reflections, maintenance cycles and the emotion questionnaire.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use common::{ScriptedGenerator, config, engine, engine_with};
use reverie_agents::{Collaborators, Engine, spawn_maintenance_loop};
use reverie_core::embedding::HashingEmbeddingProvider;
use reverie_core::sentiment::LexiconSentiment;
use reverie_core::{AgentId, ReflectionKind, SqliteStore, Tier};
use reverie_llm::{LlmError, TextGenerator};

#[tokio::test]
async fn lesson_reflection_with_empty_memory_is_stored() {
    let generator = Arc::new(ScriptedGenerator::replying("  Keep promises small.  "));
    let engine = engine(Arc::clone(&generator));
    let ada = AgentId::new("Ada");

    let record = engine.reflect(&ada, ReflectionKind::Lesson).await.expect("stored");
    assert_eq!(record.content, "Keep promises small.");
    assert!((record.importance - 10.0).abs() < f32::EPSILON);
    assert_eq!(record.tier, Tier::LongTerm);
    assert_eq!(record.reflection_kind, Some(ReflectionKind::Lesson));

    let prompt = &generator.prompts()[0];
    assert_eq!(prompt.matches("(none available)").count(), 2);
    assert!(prompt.contains("Type: lesson"));

    let set = engine.memory().reflections(&ada).expect("reflections");
    assert_eq!(set.lesson, "Keep promises small.");
    assert_eq!(set.summary, ReflectionKind::Summary.placeholder());
}

#[tokio::test]
async fn failed_or_empty_reflection_stores_nothing() {
    let generator =
        ScriptedGenerator::replying("   ").then(Err(LlmError::ConfigError("offline".into())));
    let engine = engine(Arc::new(generator));
    let ada = AgentId::new("Ada");

    assert!(engine.reflect(&ada, ReflectionKind::Summary).await.is_none());
    assert!(engine.reflect(&ada, ReflectionKind::Summary).await.is_none());
    assert!(engine.recent_memories(&ada, Tier::LongTerm).expect("ltm").is_empty());
    assert_eq!(engine.metrics().counters.reflections_failed, 2);
}

#[tokio::test]
async fn maintenance_cycle_reflects_every_periodic_kind() {
    let generator = ScriptedGenerator::replying("unused")
        .then(Ok("We talked about the launch."))
        .then(Ok("Ship a small slice first."))
        .then(Err(LlmError::ConfigError("quota".into())))
        .then(Ok("The launch will slip a week."));
    let engine = engine(Arc::new(generator));
    let ada = AgentId::new("Ada");
    engine.memory().insert(&ada, "The launch is next Friday", "").expect("insert");

    let report = engine.run_maintenance(&ada).await.expect("cycle");
    assert!(!report.skipped);
    assert_eq!(report.rescan.short_term, 1);
    assert_eq!(
        report.reflections,
        vec![ReflectionKind::Summary, ReflectionKind::Strategy, ReflectionKind::Prediction]
    );
    assert_eq!(report.failed_reflections, vec![ReflectionKind::Lesson]);

    let set = engine.memory().reflections(&ada).expect("reflections");
    assert_eq!(set.strategy, "Ship a small slice first.");
    assert_eq!(set.lesson, ReflectionKind::Lesson.placeholder());
    assert_eq!(engine.metrics().counters.maintenance_cycles, 1);
}

/// Signals when a call starts, then takes a while to answer.
struct SlowGenerator {
    entered: Notify,
}

#[async_trait]
impl TextGenerator for SlowGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.entered.notify_one();
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("Slow but steady.".into())
    }
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycle_for_same_agent_is_skipped() {
    let generator = Arc::new(SlowGenerator { entered: Notify::new() });
    let mut cfg = config();
    cfg.llm.request_timeout_ms = 60_000;
    let collaborators = Collaborators {
        generator: Arc::clone(&generator) as Arc<dyn TextGenerator>,
        embedder: Arc::new(HashingEmbeddingProvider::default()),
        sentiment: Arc::new(LexiconSentiment::new()),
    };
    let store = SqliteStore::open_in_memory().expect("store");
    let engine = Arc::new(Engine::new(cfg, store, collaborators).expect("engine"));
    let ada = AgentId::new("Ada");

    let running = {
        let engine = Arc::clone(&engine);
        let ada = ada.clone();
        tokio::spawn(async move { engine.run_maintenance(&ada).await })
    };
    generator.entered.notified().await;

    let second = engine.run_maintenance(&ada).await.expect("second");
    assert!(second.skipped);
    assert!(second.reflections.is_empty());

    // Another agent is not blocked.
    let bo = AgentId::new("Bo");
    let other = engine.run_maintenance(&bo);
    let first = running.await.expect("join").expect("first");
    assert!(!first.skipped);
    assert_eq!(first.reflections.len(), 4);
    assert!(!other.await.expect("other").skipped);

    assert_eq!(engine.metrics().counters.maintenance_skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn maintenance_loop_ticks_after_one_interval() {
    let engine = engine(Arc::new(ScriptedGenerator::replying("Noted.")));
    let ada = AgentId::new("Ada");

    let handle = spawn_maintenance_loop(Arc::clone(&engine), ada.clone(), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(engine.metrics().counters.maintenance_cycles, 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(engine.metrics().counters.maintenance_cycles, 1);

    handle.abort();
    assert!(handle.await.expect_err("aborted").is_cancelled());
}

#[tokio::test]
async fn disabled_maintenance_spawns_nothing() {
    let mut cfg = config();
    cfg.maintenance.enabled = false;
    let engine = engine_with(Arc::new(ScriptedGenerator::replying("Noted.")), cfg);
    assert!(engine.start_maintenance(AgentId::new("Ada")).is_none());
}

#[tokio::test]
async fn questionnaire_records_and_damps_measured_state() {
    let generator = Arc::new(ScriptedGenerator::replying("5 5 5 5 5 5 5 5"));
    let engine = engine(Arc::clone(&generator));
    let ada = AgentId::new("Ada");

    let measured = engine.measure_emotion(&ada).await.expect("measure").expect("eight answers");
    for dim in reverie_core::emotion::EmotionDimension::ALL {
        assert!((measured.get(dim) - 0.9).abs() < 1e-5, "{dim:?}");
    }
    assert_eq!(engine.emotion().history(&ada, 10).expect("history").len(), 2);

    let prompt = &generator.prompts()[0];
    assert!(prompt.starts_with("You can only reply with numbers from 1 to 5."));
    assert!(prompt.contains("=== Short-Term Memories ===\n(none available)\n"));
    assert!(prompt.contains("=== Current Emotion State ==="));
    assert!(prompt.contains("8. "));
}

#[tokio::test]
async fn partial_questionnaire_reply_changes_nothing() {
    let generator = ScriptedGenerator::replying("3, 4 and then I got bored");
    let engine = engine_with(Arc::new(generator), config());
    let ada = AgentId::new("Ada");

    assert!(engine.measure_emotion(&ada).await.expect("measure").is_none());
    assert!(engine.emotion().history(&ada, 10).expect("history").is_empty());
}
