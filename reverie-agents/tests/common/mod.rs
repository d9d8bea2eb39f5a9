//! Shared fixtures: a scripted generator and an in-memory engine.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use reverie_agents::{Collaborators, Engine};
use reverie_core::embedding::HashingEmbeddingProvider;
use reverie_core::sentiment::LexiconSentiment;
use reverie_core::{ReverieConfig, SqliteStore};
use reverie_llm::{LlmError, TextGenerator};

/// Replays queued results in order, then repeats `fallback`.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn replying(fallback: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(fallback.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with a non-retryable error once the script is spent.
    pub fn failing(reason: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Err(reason.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, next: Result<&str, LlmError>) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(next.map(str::to_string));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().expect("prompts lock").push(prompt.to_string());
        if let Some(next) = self.script.lock().expect("script lock").pop_front() {
            return next;
        }
        match &self.fallback {
            Ok(text) => Ok(text.clone()),
            Err(reason) => Err(LlmError::ConfigError(reason.clone())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn config() -> ReverieConfig {
    let mut config = ReverieConfig::default();
    config.llm.retry_delay_ms = 10;
    config
}

pub fn engine_with(generator: Arc<ScriptedGenerator>, config: ReverieConfig) -> Arc<Engine> {
    let collaborators = Collaborators {
        generator,
        embedder: Arc::new(HashingEmbeddingProvider::default()),
        sentiment: Arc::new(LexiconSentiment::new()),
    };
    let store = SqliteStore::open_in_memory().expect("open store");
    Arc::new(Engine::new(config, store, collaborators).expect("engine"))
}

pub fn engine(generator: Arc<ScriptedGenerator>) -> Arc<Engine> {
    engine_with(generator, config())
}

pub const REPLY: &str = "Thought process:\nThey need support.\n\nSpeech:\nLet's plan it together.";
