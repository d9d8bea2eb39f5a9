//! Emotion dynamics on an 8-dimensional Plutchik basis.
//!
//! Each agent's affect is an append-only series of [`EmotionState`] rows.
//! The *current* emotion is never stored: it is the per-dimension mean of
//! the most recent `window` rows. Two transitions append new rows:
//!
//! - [`EmotionTracker::update`] sets the single dimension an utterance maps
//!   to (positive → joy, negative → sadness, neutral → trust, unclassified
//!   → anticipation) to `(sentiment + 1) / 2`, keeping the other seven from
//!   the current average.
//! - [`EmotionTracker::adjust`] cools every dimension above the damping
//!   threshold toward the resting target: `v - (v - target) * alpha`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmotionConfig;
use crate::error::Result;
use crate::metrics::EngineCounters;
use crate::persistence::SqliteStore;
use crate::sentiment::{SentimentAnalyzer, polarity_or_neutral};
use crate::types::AgentId;

// ---------------------------------------------------------------------------
// Emotion vector
// ---------------------------------------------------------------------------

/// One of the eight Plutchik basic emotions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionDimension {
    /// Joy.
    Joy,
    /// Trust.
    Trust,
    /// Fear.
    Fear,
    /// Surprise.
    Surprise,
    /// Sadness.
    Sadness,
    /// Disgust.
    Disgust,
    /// Anger.
    Anger,
    /// Anticipation.
    Anticipation,
}

impl EmotionDimension {
    /// All dimensions in storage order.
    pub const ALL: [Self; 8] = [
        Self::Joy,
        Self::Trust,
        Self::Fear,
        Self::Surprise,
        Self::Sadness,
        Self::Disgust,
        Self::Anger,
        Self::Anticipation,
    ];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Trust => "trust",
            Self::Fear => "fear",
            Self::Surprise => "surprise",
            Self::Sadness => "sadness",
            Self::Disgust => "disgust",
            Self::Anger => "anger",
            Self::Anticipation => "anticipation",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Joy => 0,
            Self::Trust => 1,
            Self::Fear => 2,
            Self::Surprise => 3,
            Self::Sadness => 4,
            Self::Disgust => 5,
            Self::Anger => 6,
            Self::Anticipation => 7,
        }
    }
}

/// Intensities of the eight basic emotions, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionVector {
    /// Joy.
    pub joy: f32,
    /// Trust.
    pub trust: f32,
    /// Fear.
    pub fear: f32,
    /// Surprise.
    pub surprise: f32,
    /// Sadness.
    pub sadness: f32,
    /// Disgust.
    pub disgust: f32,
    /// Anger.
    pub anger: f32,
    /// Anticipation.
    pub anticipation: f32,
}

impl EmotionVector {
    /// The all-zero vector, returned for agents with no history.
    #[must_use]
    pub const fn zero() -> Self {
        Self::from_array([0.0; 8])
    }

    /// Build from values in [`EmotionDimension::ALL`] order, without clamping.
    #[must_use]
    pub const fn from_array(v: [f32; 8]) -> Self {
        Self {
            joy: v[0],
            trust: v[1],
            fear: v[2],
            surprise: v[3],
            sadness: v[4],
            disgust: v[5],
            anger: v[6],
            anticipation: v[7],
        }
    }

    /// Values in [`EmotionDimension::ALL`] order.
    #[must_use]
    pub const fn to_array(&self) -> [f32; 8] {
        [
            self.joy,
            self.trust,
            self.fear,
            self.surprise,
            self.sadness,
            self.disgust,
            self.anger,
            self.anticipation,
        ]
    }

    /// Intensity of one dimension.
    #[must_use]
    pub fn get(&self, dim: EmotionDimension) -> f32 {
        self.to_array()[dim.index()]
    }

    /// Set one dimension, clamped to `[0, 1]`.
    #[must_use]
    pub fn with(self, dim: EmotionDimension, value: f32) -> Self {
        let mut values = self.to_array();
        values[dim.index()] = clamp_unit(value);
        Self::from_array(values)
    }

    /// Every dimension clamped to `[0, 1]`; non-finite values become `0`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self::from_array(self.to_array().map(clamp_unit))
    }

    /// Per-dimension arithmetic mean, clamped. Zero vector for no input.
    #[must_use]
    pub fn mean<'a>(vectors: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut sum = [0.0_f32; 8];
        let mut n = 0_u32;
        for v in vectors {
            for (acc, x) in sum.iter_mut().zip(v.to_array()) {
                *acc += x;
            }
            n += 1;
        }
        if n == 0 {
            return Self::zero();
        }
        // Window sizes are small; the conversion is exact.
        #[allow(clippy::cast_precision_loss)]
        let count = n as f32;
        Self::from_array(sum.map(|total| total / count)).clamped()
    }

    /// Pull every dimension above `threshold` toward `target` by `alpha`;
    /// others are unchanged.
    #[must_use]
    pub fn damped(self, threshold: f32, alpha: f32, target: f32) -> Self {
        Self::from_array(self.to_array().map(|v| {
            if v > threshold {
                v - (v - target) * alpha
            } else {
                v
            }
        }))
        .clamped()
    }

    /// The strongest dimension, or `None` if every value is zero.
    #[must_use]
    pub fn dominant(&self) -> Option<EmotionDimension> {
        EmotionDimension::ALL
            .into_iter()
            .filter(|d| self.get(*d) > 0.0)
            .max_by(|a, b| self.get(*a).total_cmp(&self.get(*b)))
    }
}

impl fmt::Display for EmotionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dim) in EmotionDimension::ALL.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:.2}", dim.as_str(), self.get(dim))?;
        }
        Ok(())
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

/// One persisted emotion snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionState {
    /// Agent the snapshot belongs to.
    pub owner: AgentId,
    /// When it was appended.
    pub recorded_at: DateTime<Utc>,
    /// The eight intensities.
    pub vector: EmotionVector,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Classification of an utterance that triggers an emotion update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotionEvent {
    /// Positive sentiment.
    Positive,
    /// Negative sentiment.
    Negative,
    /// Exactly neutral sentiment.
    Neutral,
    /// An event the caller could not classify.
    Unclassified,
}

impl EmotionEvent {
    /// Classify by the sign of `sentiment`. NaN is unclassified.
    #[must_use]
    pub fn from_sentiment(sentiment: f32) -> Self {
        if sentiment > 0.0 {
            Self::Positive
        } else if sentiment < 0.0 {
            Self::Negative
        } else if sentiment == 0.0 {
            Self::Neutral
        } else {
            Self::Unclassified
        }
    }

    /// The dimension this event drives.
    #[must_use]
    pub const fn target(self) -> EmotionDimension {
        match self {
            Self::Positive => EmotionDimension::Joy,
            Self::Negative => EmotionDimension::Sadness,
            Self::Neutral => EmotionDimension::Trust,
            Self::Unclassified => EmotionDimension::Anticipation,
        }
    }
}

/// `(sentiment + 1) / 2` clamped to `[0, 1]`.
#[must_use]
pub fn intensity(sentiment: f32) -> f32 {
    clamp_unit((sentiment + 1.0) / 2.0)
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Appends and averages emotion states for every agent.
pub struct EmotionTracker {
    store: Arc<SqliteStore>,
    sentiment: Arc<dyn SentimentAnalyzer>,
    config: EmotionConfig,
    counters: Arc<EngineCounters>,
}

impl fmt::Debug for EmotionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmotionTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EmotionTracker {
    /// Create a tracker over `store`.
    #[must_use]
    pub fn new(
        store: Arc<SqliteStore>,
        sentiment: Arc<dyn SentimentAnalyzer>,
        config: EmotionConfig,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            store,
            sentiment,
            config,
            counters,
        }
    }

    /// Mean of the most recent `window` states; zero vector without history.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn current(&self, agent: &AgentId) -> Result<EmotionVector> {
        let recent = self.store.recent_emotions(agent, self.config.window)?;
        Ok(EmotionVector::mean(recent.iter().map(|s| &s.vector)))
    }

    /// Set the event's target dimension to the sentiment intensity on top
    /// of the current average and append the result.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn update(
        &self,
        agent: &AgentId,
        event: EmotionEvent,
        sentiment: f32,
    ) -> Result<EmotionVector> {
        let next = self.current(agent)?.with(event.target(), intensity(sentiment));
        self.store.append_emotion(agent, &next, Utc::now())?;
        self.counters.emotion_updates.fetch_add(1, Ordering::Relaxed);
        debug!(
            agent = %agent,
            event = ?event,
            dimension = event.target().as_str(),
            intensity = intensity(sentiment),
            "Emotion updated"
        );
        Ok(next)
    }

    /// Damp the current average toward the resting target and append it.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn adjust(&self, agent: &AgentId) -> Result<EmotionVector> {
        let c = &self.config;
        let next = self
            .current(agent)?
            .damped(c.damping_threshold, c.damping_alpha, c.damping_target);
        self.store.append_emotion(agent, &next, Utc::now())?;
        Ok(next)
    }

    /// Run one `update` + `adjust` cycle for an utterance the agent heard
    /// or said. Sentiment failures count as neutral.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn react_to(&self, agent: &AgentId, utterance: &str) -> Result<EmotionVector> {
        let sentiment = polarity_or_neutral(self.sentiment.as_ref(), utterance);
        self.update(agent, EmotionEvent::from_sentiment(sentiment), sentiment)?;
        self.adjust(agent)
    }

    /// Append an explicit state, e.g. a scenario seed or a measured state.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn record(&self, agent: &AgentId, vector: EmotionVector) -> Result<()> {
        self.store.append_emotion(agent, &vector.clamped(), Utc::now())
    }

    /// Mean of every state recorded within the last `window` of time.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn recall_since(&self, agent: &AgentId, window: Duration) -> Result<EmotionVector> {
        let states = self.store.emotions_since(agent, Utc::now() - window)?;
        Ok(EmotionVector::mean(states.iter().map(|s| &s.vector)))
    }

    /// The last `limit` states, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReverieError::Database`](crate::ReverieError::Database) on
    /// SQLite failures.
    pub fn history(&self, agent: &AgentId, limit: usize) -> Result<Vec<EmotionState>> {
        self.store.recent_emotions(agent, limit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
