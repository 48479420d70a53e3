//! Edge-triggered gesture debouncing.
//!
//! Turns a stream of raw per-frame classifications into discrete
//! [`TriggeredGesture`] events: a class fires once after it has been active
//! for `activation_threshold` ticks, then stays silent until it has been
//! inactive for `release_threshold` ticks. Holding a pose for any length of
//! time therefore yields exactly one event.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::GestureConfig;
use crate::observation::GestureClass;

/// A gesture that has just crossed its activation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggeredGesture {
    pub class: GestureClass,
    pub timestamp: Instant,
}

/// Where a single gesture class is in its activate/fire/release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePhase {
    /// Free to fire once the activation threshold is reached
    #[default]
    Ready,
    /// Already fired for the current activation span
    Fired,
}

/// Debounce state for one gesture class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureState {
    pub last_raw_active: bool,
    pub consecutive_active: u32,
    pub consecutive_inactive: u32,
    pub phase: EdgePhase,
}

impl GestureState {
    /// Record an active tick; returns true when this tick fires the gesture.
    fn mark_active(&mut self, activation_threshold: u32) -> bool {
        self.last_raw_active = true;
        self.consecutive_active = self.consecutive_active.saturating_add(1);
        self.consecutive_inactive = 0;

        if self.consecutive_active >= activation_threshold && self.phase == EdgePhase::Ready {
            self.phase = EdgePhase::Fired;
            return true;
        }
        false
    }

    /// Record an inactive tick; re-arms the class once the release span is long enough.
    fn mark_inactive(&mut self, release_threshold: u32) {
        self.last_raw_active = false;
        self.consecutive_inactive = self.consecutive_inactive.saturating_add(1);

        if self.consecutive_inactive >= release_threshold {
            self.phase = EdgePhase::Ready;
            self.consecutive_active = 0;
        }
    }

    pub fn is_fired(&self) -> bool {
        self.phase == EdgePhase::Fired
    }
}

/// Per-class edge detector. One instance per session, fed once per tick.
#[derive(Debug, Clone)]
pub struct GestureEdgeDetector {
    activation_threshold: u32,
    release_threshold: u32,
    states: [GestureState; GestureClass::TRACKED_COUNT],
}

impl GestureEdgeDetector {
    pub fn new(config: &GestureConfig) -> Self {
        Self::with_thresholds(config.activation_threshold, config.release_threshold)
    }

    /// Thresholds below one tick are raised to one.
    pub fn with_thresholds(activation_threshold: u32, release_threshold: u32) -> Self {
        Self {
            activation_threshold: activation_threshold.max(1),
            release_threshold: release_threshold.max(1),
            states: Default::default(),
        }
    }

    /// Feed this tick's raw classification. The observed class counts as
    /// active and every other class as inactive; `None` makes all inactive.
    pub fn observe(&mut self, class: GestureClass, timestamp: Instant) -> Option<TriggeredGesture> {
        let active_slot = class.slot();
        let mut triggered = None;

        for (slot, state) in self.states.iter_mut().enumerate() {
            if Some(slot) == active_slot {
                if state.mark_active(self.activation_threshold) {
                    triggered = Some(TriggeredGesture { class, timestamp });
                }
            } else {
                let was_fired = state.is_fired();
                state.mark_inactive(self.release_threshold);
                if was_fired && !state.is_fired() {
                    debug!(gesture = %GestureClass::TRACKED[slot], "Gesture released");
                }
            }
        }

        if let Some(trigger) = &triggered {
            info!(
                gesture = %trigger.class,
                active_ticks = self.activation_threshold,
                "Gesture triggered"
            );
        }
        triggered
    }

    /// Debounce state for `class`; `None` for `GestureClass::None`.
    pub fn state(&self, class: GestureClass) -> Option<&GestureState> {
        class.slot().map(|slot| &self.states[slot])
    }

    pub fn activation_threshold(&self) -> u32 {
        self.activation_threshold
    }

    pub fn release_threshold(&self) -> u32 {
        self.release_threshold
    }

    pub fn reset(&mut self) {
        self.states = Default::default();
    }
}
