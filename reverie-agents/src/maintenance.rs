//! The periodic maintenance cycle: rescan, promote, reflect.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use reverie_core::memory::RescanReport;
use reverie_core::{AgentId, ReflectionKind};

use crate::engine::Engine;
use crate::error::Result;

/// What one maintenance cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Another cycle for the same agent was already running; nothing was done.
    pub skipped: bool,
    /// Importance rescan outcome.
    pub rescan: RescanReport,
    /// Short-term records promoted.
    pub promoted: usize,
    /// Reflection kinds stored this cycle.
    pub reflections: Vec<ReflectionKind>,
    /// Reflection kinds that failed.
    pub failed_reflections: Vec<ReflectionKind>,
}

impl MaintenanceReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

impl Engine {
    /// Run one cycle for `agent`: assemble context, rescan importance
    /// against it, promote, then generate a summary, strategy, lesson and
    /// prediction.
    ///
    /// At most one cycle per agent runs at a time; an overlapping call
    /// returns a report with `skipped` set.
    ///
    /// # Errors
    /// Returns [`AgentError::Core`](crate::AgentError::Core) on store
    /// failures. Reflection failures are reported, not raised.
    pub async fn run_maintenance(&self, agent: &AgentId) -> Result<MaintenanceReport> {
        let lock = self.maintenance_lock(agent);
        let Ok(_guard) = lock.try_lock() else {
            self.counters.maintenance_skipped.fetch_add(1, Ordering::Relaxed);
            debug!(agent = %agent, "Maintenance already running, skipping");
            return Ok(MaintenanceReport::skipped());
        };

        let start = Instant::now();
        let context = self.context(agent)?;
        let rescan = self.memory.rescan_importance(agent, &context)?;
        let promoted = self.memory.promote(agent)?.len();

        let mut report = MaintenanceReport {
            skipped: false,
            rescan,
            promoted,
            ..MaintenanceReport::default()
        };
        for kind in ReflectionKind::PERIODIC {
            match self.reflect(agent, kind).await {
                Some(_) => report.reflections.push(kind),
                None => report.failed_reflections.push(kind),
            }
        }

        self.counters.maintenance_cycles.fetch_add(1, Ordering::Relaxed);
        info!(
            agent = %agent,
            rescored = rescan.short_term + rescan.long_term,
            changed = rescan.changed,
            promoted,
            reflections = report.reflections.len(),
            failed = report.failed_reflections.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Maintenance cycle complete"
        );
        Ok(report)
    }

    fn maintenance_lock(&self, agent: &AgentId) -> Arc<tokio::sync::Mutex<()>> {
        self.maintenance_locks
            .entry(agent.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

impl Engine {
    /// Start the loop for `agent` with the `[maintenance]` settings, or
    /// `None` when maintenance is disabled.
    #[must_use]
    pub fn start_maintenance(self: &Arc<Self>, agent: AgentId) -> Option<JoinHandle<()>> {
        let settings = &self.config.maintenance;
        if !settings.enabled {
            debug!(agent = %agent, "Maintenance disabled");
            return None;
        }
        let interval = Duration::from_secs(settings.interval_secs);
        Some(spawn_maintenance_loop(Arc::clone(self), agent, interval))
    }
}

/// Run [`Engine::run_maintenance`] for `agent` every `interval`, starting
/// one interval from now. Ticks missed while a cycle runs are skipped.
/// Abort the returned handle to stop the loop.
pub fn spawn_maintenance_loop(
    engine: Arc<Engine>,
    agent: AgentId,
    interval: Duration,
) -> JoinHandle<()> {
    let period = interval.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(agent = %agent, interval_ms = period.as_millis(), "Maintenance loop started");
        loop {
            ticker.tick().await;
            if let Err(e) = engine.run_maintenance(&agent).await {
                warn!(agent = %agent, error = %e, "Maintenance cycle failed");
            }
        }
    })
}
