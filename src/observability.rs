use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Decision-layer counters for one session
#[derive(Debug, Default)]
pub struct DecisionMetrics {
    pub ticks: AtomicU64,
    pub gesture_triggers: AtomicU64,
    pub actions_dispatched: AtomicU64,
    pub actions_suppressed: AtomicU64,
    pub stage_commands: AtomicU64,
    pub locks: AtomicU64,
    pub effector_failures: AtomicU64,
    pub force_unlocks: AtomicU64,
}

impl DecisionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trigger(&self) {
        self.gesture_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self, dispatched: bool) {
        if dispatched {
            self.actions_dispatched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.actions_suppressed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stage_command(&self, locked: bool) {
        self.stage_commands.fetch_add(1, Ordering::Relaxed);
        if locked {
            self.locks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_effector_failure(&self) {
        self.effector_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_force_unlock(&self) {
        self.force_unlocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            gesture_triggers: self.gesture_triggers.load(Ordering::Relaxed),
            actions_dispatched: self.actions_dispatched.load(Ordering::Relaxed),
            actions_suppressed: self.actions_suppressed.load(Ordering::Relaxed),
            stage_commands: self.stage_commands.load(Ordering::Relaxed),
            locks: self.locks.load(Ordering::Relaxed),
            effector_failures: self.effector_failures.load(Ordering::Relaxed),
            force_unlocks: self.force_unlocks.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.snapshot();
        info!(
            "Decision metrics: ticks={}, triggers={}, actions={}, suppressed={}, stage_commands={}, locks={}, effector_failures={}, force_unlocks={}",
            stats.ticks,
            stats.gesture_triggers,
            stats.actions_dispatched,
            stats.actions_suppressed,
            stats.stage_commands,
            stats.locks,
            stats.effector_failures,
            stats.force_unlocks
        );
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub gesture_triggers: u64,
    pub actions_dispatched: u64,
    pub actions_suppressed: u64,
    pub stage_commands: u64,
    pub locks: u64,
    pub effector_failures: u64,
    pub force_unlocks: u64,
}

/// Span wrapping everything one decision session does
pub fn create_session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!(
        "decision_session",
        session.id = session_id,
        otel.kind = "internal"
    )
}
