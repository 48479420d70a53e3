// Core types for the presence/identity security automaton

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Security stage of the workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Authorised user (or, without enrollment, any face) is present
    #[default]
    Monitoring,
    /// Grace period running; the blur effect is in progress
    Warning,
    /// Workstation locked; only an external unlock leaves this stage
    Locked,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitoring => "monitoring",
            Self::Warning => "warning",
            Self::Locked => "locked",
        }
    }

    /// Ordering used by the fail-closed checks: Monitoring < Warning < Locked.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Monitoring => 0,
            Self::Warning => 1,
            Self::Locked => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage transition commands sent to the lock effector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCommand {
    EnterWarning,
    ExitWarningToMonitoring,
    EnterLocked,
}

impl StageCommand {
    /// Stage the automaton is in after emitting this command.
    pub fn target_stage(&self) -> Stage {
        match self {
            Self::EnterWarning => Stage::Warning,
            Self::ExitWarningToMonitoring => Stage::Monitoring,
            Self::EnterLocked => Stage::Locked,
        }
    }
}

/// What an enrolled-identity mismatch escalates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Enter the warning stage at once, skipping the absence grace
    #[default]
    Warning,
    /// Lock at once
    Lock,
}

/// Why the current warning stage was entered. A mismatch seen during an
/// absence warning upgrades the cause; it never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCause {
    Absence,
    Mismatch,
}

/// Per-tick classification of the face signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceVerdict {
    /// Face present and either nothing is enrolled or the identity matches
    Confirmed,
    /// No face this tick
    Absent,
    /// Face present, identity enrolled, but the matcher gave no verdict
    Unconfirmed,
    /// Face present and the enrolled identity does not match
    Intruder,
}

/// Mutable automaton state, owned by [`super::SecurityAutomaton`] and
/// threaded through the state handlers as their context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityState {
    pub stage: Stage,
    pub absence_streak: u32,
    pub presence_streak: u32,
    pub warning_started_at: Option<Instant>,
    pub warning_cause: Option<WarningCause>,
    pub enrolled_identity_present: bool,
    pub(crate) pending: Option<StageCommand>,
}

impl SecurityState {
    pub fn new(enrolled_identity_present: bool) -> Self {
        Self {
            stage: Stage::Monitoring,
            absence_streak: 0,
            presence_streak: 0,
            warning_started_at: None,
            warning_cause: None,
            enrolled_identity_present,
            pending: None,
        }
    }

    pub(crate) fn reset_counters(&mut self) {
        self.absence_streak = 0;
        self.presence_streak = 0;
        self.warning_started_at = None;
        self.warning_cause = None;
    }
}

/// Maps warning progress onto the blur kernel strength the renderer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurRamp {
    pub min_strength: u32,
    pub max_strength: u32,
}

impl Default for BlurRamp {
    fn default() -> Self {
        Self {
            min_strength: 5,
            max_strength: 50,
        }
    }
}

impl BlurRamp {
    pub fn strength(&self, progress: f32) -> u32 {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let span = self.max_strength.saturating_sub(self.min_strength) as f32;
        self.min_strength + (progress * span) as u32
    }
}
