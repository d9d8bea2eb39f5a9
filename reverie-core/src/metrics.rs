//! Runtime counters and latency tracking.
//!
//! Counters are plain `AtomicU64`s bumped on the hot path and read on
//! export. Generation latencies go into a fixed-size ring guarded by a
//! `parking_lot::Mutex`, which is only contended when percentiles are read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Counters (lock-free)
// ---------------------------------------------------------------------------

/// Atomic counters shared by every engine component.
#[derive(Debug)]
pub struct EngineCounters {
    /// Short-term memories written.
    pub memories_stored: AtomicU64,
    /// Short-term memories evicted for capacity.
    pub memories_evicted: AtomicU64,
    /// Short-term memories moved into long-term memory.
    pub memories_promoted: AtomicU64,
    /// Records whose importance was recomputed by a rescan.
    pub importance_rescored: AtomicU64,
    /// Emotion update transitions.
    pub emotion_updates: AtomicU64,
    /// Reflections stored.
    pub reflections_stored: AtomicU64,
    /// Reflection attempts that produced nothing.
    pub reflections_failed: AtomicU64,
    /// Conversation turns that completed.
    pub turns_completed: AtomicU64,
    /// Conversation turns that ended in an error row.
    pub turns_failed: AtomicU64,
    /// Maintenance cycles that ran.
    pub maintenance_cycles: AtomicU64,
    /// Maintenance cycles skipped because one was already running.
    pub maintenance_skipped: AtomicU64,
    /// Text-generation calls that returned text.
    pub llm_calls: AtomicU64,
    /// Text-generation calls that failed after retries.
    pub llm_failures: AtomicU64,
}

impl EngineCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            memories_stored: AtomicU64::new(0),
            memories_evicted: AtomicU64::new(0),
            memories_promoted: AtomicU64::new(0),
            importance_rescored: AtomicU64::new(0),
            emotion_updates: AtomicU64::new(0),
            reflections_stored: AtomicU64::new(0),
            reflections_failed: AtomicU64::new(0),
            turns_completed: AtomicU64::new(0),
            turns_failed: AtomicU64::new(0),
            maintenance_cycles: AtomicU64::new(0),
            maintenance_skipped: AtomicU64::new(0),
            llm_calls: AtomicU64::new(0),
            llm_failures: AtomicU64::new(0),
        }
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            memories_stored: load(&self.memories_stored),
            memories_evicted: load(&self.memories_evicted),
            memories_promoted: load(&self.memories_promoted),
            importance_rescored: load(&self.importance_rescored),
            emotion_updates: load(&self.emotion_updates),
            reflections_stored: load(&self.reflections_stored),
            reflections_failed: load(&self.reflections_failed),
            turns_completed: load(&self.turns_completed),
            turns_failed: load(&self.turns_failed),
            maintenance_cycles: load(&self.maintenance_cycles),
            maintenance_skipped: load(&self.maintenance_skipped),
            llm_calls: load(&self.llm_calls),
            llm_failures: load(&self.llm_failures),
        }
    }
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CounterSnapshot {
    pub memories_stored: u64,
    pub memories_evicted: u64,
    pub memories_promoted: u64,
    pub importance_rescored: u64,
    pub emotion_updates: u64,
    pub reflections_stored: u64,
    pub reflections_failed: u64,
    pub turns_completed: u64,
    pub turns_failed: u64,
    pub maintenance_cycles: u64,
    pub maintenance_skipped: u64,
    pub llm_calls: u64,
    pub llm_failures: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 13] = [
            ("memories_stored", "Short-term memories written", self.memories_stored),
            ("memories_evicted", "Short-term memories evicted", self.memories_evicted),
            ("memories_promoted", "Memories promoted to long-term", self.memories_promoted),
            ("importance_rescored", "Importance recalculations", self.importance_rescored),
            ("emotion_updates", "Emotion update transitions", self.emotion_updates),
            ("reflections_stored", "Reflections stored", self.reflections_stored),
            ("reflections_failed", "Reflection attempts without output", self.reflections_failed),
            ("turns_completed", "Conversation turns completed", self.turns_completed),
            ("turns_failed", "Conversation turns failed", self.turns_failed),
            ("maintenance_cycles", "Maintenance cycles run", self.maintenance_cycles),
            (
                "maintenance_skipped",
                "Overlapping maintenance cycles skipped",
                self.maintenance_skipped,
            ),
            ("llm_calls", "Successful text-generation calls", self.llm_calls),
            ("llm_failures", "Text-generation calls failed after retries", self.llm_failures),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP reverie_{name}_total {help}\n\
                 # TYPE reverie_{name}_total counter\n\
                 reverie_{name}_total {value}\n"
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Latency window
// ---------------------------------------------------------------------------

/// Ring buffer of the most recent call latencies.
#[derive(Debug)]
pub struct LatencyWindow {
    history: Mutex<LatencyHistory>,
}

#[derive(Debug)]
struct LatencyHistory {
    samples_ms: Vec<f64>,
    write_idx: usize,
    count: u64,
}

/// Percentiles over the recorded window, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyPercentiles {
    /// Median.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// Slowest sample.
    pub max: f64,
}

impl LatencyWindow {
    /// Track the last `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            history: Mutex::new(LatencyHistory {
                samples_ms: vec![0.0; capacity.max(1)],
                write_idx: 0,
                count: 0,
            }),
        }
    }

    /// Record one call duration.
    pub fn record(&self, elapsed: Duration) {
        let mut h = self.history.lock();
        let idx = h.write_idx;
        let len = h.samples_ms.len();
        h.samples_ms[idx] = elapsed.as_secs_f64() * 1000.0;
        h.write_idx = (idx + 1) % len;
        h.count += 1;
    }

    /// Total samples recorded since creation.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.history.lock().count
    }

    /// Percentiles over the samples currently in the window.
    #[must_use]
    pub fn percentiles(&self) -> LatencyPercentiles {
        let h = self.history.lock();
        let filled = usize::try_from(h.count).unwrap_or(usize::MAX).min(h.samples_ms.len());
        if filled == 0 {
            return LatencyPercentiles::default();
        }

        let mut sorted = h.samples_ms[..filled].to_vec();
        drop(h);
        sorted.sort_by(f64::total_cmp);

        let at = |q: usize| sorted[(filled * q / 100).min(filled - 1)];
        LatencyPercentiles {
            p50: at(50),
            p95: at(95),
            max: sorted[filled - 1],
        }
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(256)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
