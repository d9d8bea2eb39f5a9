//! Conversation sessions and the turn pipeline.
//!
//! One turn: the receiver's context, reflections and emotion are assembled
//! into a prompt; the reply is generated and split into thought and speech;
//! the receiver reacts emotionally and remembers what it said; finally both
//! utterances are logged at two consecutive turn numbers.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use reverie_core::{AgentId, ConversationId, ConversationTurn, ERROR_SPEAKER, ThoughtRecord};
use reverie_llm::prompt::ConversationPrompt;
use reverie_llm::{LabeledReply, parse_labeled_reply};

use crate::engine::Engine;
use crate::error::Result;

/// A participant: identity plus the persona shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    /// Unique name.
    pub id: AgentId,
    /// Free-text persona.
    pub persona: String,
}

impl Agent {
    /// Create an agent.
    #[must_use]
    pub fn new(name: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(name),
            persona: persona.into(),
        }
    }
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// What the receiver said.
    pub speech: String,
    /// The receiver's private reasoning.
    pub thought: String,
    /// Turn number the next message will get.
    pub next_turn: u64,
}

/// A dialogue session. Owns its turn counter; turn numbers are unique and
/// increase by two per turn, successful or not.
pub struct Conversation {
    id: ConversationId,
    engine: Arc<Engine>,
    next_turn: Mutex<u64>,
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Conversation {
    /// A fresh session starting at turn 1.
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self::starting_at(engine, ConversationId::new(), 1)
    }

    /// Continue session `id` after its last logged turn.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store
    /// failures.
    pub fn resume(engine: Arc<Engine>, id: ConversationId) -> Result<Self> {
        let next = engine.store.last_turn_number(id)?.map_or(1, |n| n + 1);
        info!(conversation = %id, next_turn = next, "Conversation resumed");
        Ok(Self::starting_at(engine, id, next))
    }

    /// Session `id` whose next turn is `first_turn`.
    #[must_use]
    pub fn starting_at(engine: Arc<Engine>, id: ConversationId, first_turn: u64) -> Self {
        Self {
            id,
            engine,
            next_turn: Mutex::new(first_turn),
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// The number the next turn will get.
    pub async fn next_turn(&self) -> u64 {
        *self.next_turn.lock().await
    }

    /// Deliver `message` from `sender` to `receiver` and produce the reply.
    ///
    /// On success the message is logged at turn `n`, the reply at `n + 1`,
    /// the receiver's thought is recorded, and the outcome carries `n + 2`.
    /// On failure the counter still advances by two: the message is logged
    /// at `n` and an `Error` row with the error text at `n + 1`.
    ///
    /// # Errors
    /// Returns the generation or store error that ended the turn.
    pub async fn orchestrate_turn(
        &self,
        sender: &Agent,
        receiver: &Agent,
        message: &str,
    ) -> Result<TurnOutcome> {
        let start = Instant::now();
        let result = self.respond(sender, receiver, message).await;

        let mut counter = self.next_turn.lock().await;
        let n = *counter;
        *counter += 2;

        let outcome = result.and_then(|reply| {
            self.persist(sender, receiver, message, &reply, n).map(|()| reply)
        });

        match outcome {
            Ok(reply) => {
                drop(counter);
                self.engine.counters.turns_completed.fetch_add(1, Ordering::Relaxed);
                info!(
                    conversation = %self.id,
                    turn = n,
                    sender = %sender.id,
                    receiver = %receiver.id,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Turn completed"
                );
                Ok(TurnOutcome {
                    speech: reply.speech,
                    thought: reply.thought,
                    next_turn: n + 2,
                })
            }
            Err(e) => {
                self.log_failure(sender, receiver, message, n, &e.to_string());
                drop(counter);
                self.engine.counters.turns_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    conversation = %self.id,
                    turn = n,
                    sender = %sender.id,
                    receiver = %receiver.id,
                    error = %e,
                    "Turn failed"
                );
                Err(e)
            }
        }
    }

    /// Steps up to and including the receiver's reaction; nothing is logged.
    async fn respond(
        &self,
        sender: &Agent,
        receiver: &Agent,
        message: &str,
    ) -> Result<LabeledReply> {
        let engine = &self.engine;
        let context = engine.context(&receiver.id)?;
        let reflections = engine.memory.reflections(&receiver.id)?;
        let emotion = engine.current_emotion(&receiver.id)?.to_string();

        let prompt = ConversationPrompt {
            speaker: sender.id.as_str(),
            speaker_persona: &sender.persona,
            listener: receiver.id.as_str(),
            listener_persona: &receiver.persona,
            message,
            memory_context: &context,
            reflections: [
                reflections.summary.as_str(),
                reflections.strategy.as_str(),
                reflections.lesson.as_str(),
                reflections.prediction.as_str(),
            ],
            emotion: &emotion,
        }
        .render();

        let raw = engine.generate(&prompt).await?;
        let reply = parse_labeled_reply(&raw);

        engine.emotion.react_to(&receiver.id, message)?;
        engine.emotion.react_to(&receiver.id, &reply.speech)?;

        let remembered = if engine.config.memory.summarize_before_store {
            engine.summarizer().summarize(&reply.speech, &context).await
        } else {
            reply.speech.clone()
        };
        engine.memory.insert(&receiver.id, &remembered, &context)?;
        engine.memory.promote(&receiver.id)?;

        Ok(reply)
    }

    /// Message, reply and thought land together or not at all.
    fn persist(
        &self,
        sender: &Agent,
        receiver: &Agent,
        message: &str,
        reply: &LabeledReply,
        n: u64,
    ) -> Result<()> {
        self.engine.store.append_exchange(
            &self.turn(n, &sender.id, Some(&receiver.id), message),
            &self.turn(n + 1, &receiver.id, Some(&sender.id), &reply.speech),
            &ThoughtRecord {
                agent: receiver.id.clone(),
                conversation: self.id,
                turn_number: n + 1,
                thought: reply.thought.clone(),
                recorded_at: Utc::now(),
            },
        )?;
        Ok(())
    }

    /// Best effort: the original error is what the caller sees.
    fn log_failure(&self, sender: &Agent, receiver: &Agent, message: &str, n: u64, reason: &str) {
        let store = &self.engine.store;
        let message_row = self.turn(n, &sender.id, Some(&receiver.id), message);
        if let Err(e) = store.append_turn(&message_row) {
            warn!(
                conversation = %self.id,
                turn = n,
                error = %e,
                "Could not log message of failed turn"
            );
        }
        let error_row = ConversationTurn {
            speaker: ERROR_SPEAKER.to_string(),
            ..self.turn(n + 1, &receiver.id, Some(&sender.id), reason)
        };
        if let Err(e) = store.append_turn(&error_row) {
            warn!(conversation = %self.id, turn = n + 1, error = %e, "Could not log error row");
        }
    }

    fn turn(
        &self,
        n: u64,
        speaker: &AgentId,
        addressee: Option<&AgentId>,
        message: &str,
    ) -> ConversationTurn {
        ConversationTurn {
            conversation: self.id,
            turn_number: n,
            speaker: speaker.as_str().to_string(),
            addressee: addressee.cloned(),
            message: message.to_string(),
            occurred_at: Utc::now(),
        }
    }

    /// Every turn of this session, in order.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store
    /// failures.
    pub fn turns(&self) -> Result<Vec<ConversationTurn>> {
        Ok(self.engine.store.turns_in(self.id)?)
    }

    /// The last `limit` turns `agent` took part in, oldest first.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store
    /// failures.
    pub fn history(&self, agent: &AgentId, limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(self.engine.store.turns_involving(agent, limit)?)
    }

    /// The last `limit` thoughts of `agent`.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store
    /// failures.
    pub fn thought_log(&self, agent: &AgentId, limit: usize) -> Result<Vec<ThoughtRecord>> {
        Ok(self.engine.store.thoughts_for(agent, limit)?)
    }
}
