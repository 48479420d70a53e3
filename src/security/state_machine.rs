use statig::blocking::StateMachine;
use statig::prelude::*;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::{SecurityConfig, MIN_ABSENCE_GRACE_TICKS};
use crate::observation::{FrameObservation, IdentityMatch};

use super::types::{FaceVerdict, MismatchPolicy, SecurityState, Stage, StageCommand, WarningCause};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    Tick(FrameObservation),
    ForceUnlock,
}

/// Immutable tunables shared by every state handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub absence_grace_ticks: u32,
    pub warning_grace: Duration,
    pub mismatch_grace: Duration,
    pub identity_enrolled: bool,
    pub mismatch_policy: MismatchPolicy,
    pub recovery_ticks: u32,
}

impl SecurityPolicy {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            absence_grace_ticks: config.absence_grace_ticks.max(MIN_ABSENCE_GRACE_TICKS),
            warning_grace: config.warning_grace(),
            mismatch_grace: config.mismatch_grace(),
            identity_enrolled: config.identity_enrolled,
            mismatch_policy: config.mismatch_policy,
            recovery_ticks: config.recovery_ticks.max(1),
        }
    }

    pub fn classify(&self, observation: &FrameObservation) -> FaceVerdict {
        if !observation.face_present {
            return FaceVerdict::Absent;
        }
        if !self.identity_enrolled {
            return FaceVerdict::Confirmed;
        }
        match observation.normalized_identity() {
            IdentityMatch::Match => FaceVerdict::Confirmed,
            IdentityMatch::NoMatch => FaceVerdict::Intruder,
            IdentityMatch::UnknownNoFace => FaceVerdict::Unconfirmed,
        }
    }

    pub fn grace_for(&self, cause: Option<WarningCause>) -> Duration {
        match cause {
            Some(WarningCause::Mismatch) => self.mismatch_grace.min(self.warning_grace),
            _ => self.warning_grace,
        }
    }

    fn begin_warning(&self, context: &mut SecurityState, at: Instant, cause: WarningCause) {
        context.stage = Stage::Warning;
        context.warning_started_at = Some(at);
        context.warning_cause = Some(cause);
        context.presence_streak = 0;
        context.pending = Some(StageCommand::EnterWarning);
        tracing::warn!(
            cause = ?cause,
            absence_streak = context.absence_streak,
            grace_ms = self.grace_for(Some(cause)).as_millis() as u64,
            "Presence check failed, entering warning stage"
        );
    }

    fn lock(&self, context: &mut SecurityState, reason: &'static str) {
        context.stage = Stage::Locked;
        context.pending = Some(StageCommand::EnterLocked);
        tracing::warn!(
            reason = reason,
            cause = ?context.warning_cause,
            "Locking workstation"
        );
    }

    fn unlock(&self, context: &mut SecurityState) {
        let previous = context.stage;
        context.reset_counters();
        context.stage = Stage::Monitoring;
        tracing::info!(previous = %previous, "Forced unlock, back to monitoring");
    }
}

#[state_machine(initial = "State::monitoring()")]
impl SecurityPolicy {
    #[state]
    fn monitoring(&mut self, context: &mut SecurityState, event: &SecurityEvent) -> Outcome<State> {
        let observation = match event {
            SecurityEvent::Tick(observation) => observation,
            SecurityEvent::ForceUnlock => return Handled,
        };

        match self.classify(observation) {
            FaceVerdict::Confirmed => {
                context.absence_streak = 0;
                context.presence_streak = context.presence_streak.saturating_add(1);
                Handled
            }
            FaceVerdict::Absent | FaceVerdict::Unconfirmed => {
                context.presence_streak = 0;
                context.absence_streak = context.absence_streak.saturating_add(1);
                tracing::trace!(absence_streak = context.absence_streak, "Face not confirmed");
                if context.absence_streak >= self.absence_grace_ticks {
                    self.begin_warning(context, observation.timestamp, WarningCause::Absence);
                    Transition(State::warning())
                } else {
                    Handled
                }
            }
            FaceVerdict::Intruder => {
                context.presence_streak = 0;
                match self.mismatch_policy {
                    MismatchPolicy::Warning => {
                        self.begin_warning(context, observation.timestamp, WarningCause::Mismatch);
                        Transition(State::warning())
                    }
                    MismatchPolicy::Lock => {
                        context.warning_cause = Some(WarningCause::Mismatch);
                        self.lock(context, "identity mismatch");
                        Transition(State::locked())
                    }
                }
            }
        }
    }

    #[state]
    fn warning(&mut self, context: &mut SecurityState, event: &SecurityEvent) -> Outcome<State> {
        let observation = match event {
            SecurityEvent::Tick(observation) => observation,
            SecurityEvent::ForceUnlock => {
                self.unlock(context);
                return Transition(State::monitoring());
            }
        };

        let verdict = self.classify(observation);
        if verdict == FaceVerdict::Intruder {
            if context.warning_cause != Some(WarningCause::Mismatch) {
                tracing::warn!("Identity mismatch during warning, escalating cause");
            }
            context.warning_cause = Some(WarningCause::Mismatch);
            if self.mismatch_policy == MismatchPolicy::Lock {
                self.lock(context, "identity mismatch");
                return Transition(State::locked());
            }
        }

        let started_at = *context
            .warning_started_at
            .get_or_insert(observation.timestamp);
        let elapsed = observation.timestamp.saturating_duration_since(started_at);
        if elapsed >= self.grace_for(context.warning_cause) {
            self.lock(context, "warning grace expired");
            return Transition(State::locked());
        }

        if verdict == FaceVerdict::Confirmed {
            context.absence_streak = 0;
            context.presence_streak = context.presence_streak.saturating_add(1);
            if context.presence_streak >= self.recovery_ticks {
                context.reset_counters();
                context.presence_streak = 1;
                context.stage = Stage::Monitoring;
                context.pending = Some(StageCommand::ExitWarningToMonitoring);
                tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Authorised presence confirmed, cancelling warning"
                );
                return Transition(State::monitoring());
            }
        } else {
            context.presence_streak = 0;
            context.absence_streak = context.absence_streak.saturating_add(1);
        }
        Handled
    }

    #[state]
    fn locked(&mut self, context: &mut SecurityState, event: &SecurityEvent) -> Outcome<State> {
        match event {
            SecurityEvent::ForceUnlock => {
                self.unlock(context);
                Transition(State::monitoring())
            }
            SecurityEvent::Tick(_) => Handled,
        }
    }
}

/// Presence/identity security automaton.
///
/// Fed one [`FrameObservation`] per tick, it walks Monitoring → Warning →
/// Locked on absence or identity mismatch and only retreats from Warning
/// on a confirmed authorised face. `observe` never fails and never blocks;
/// timeouts are judged against the observation timestamps, so replaying the
/// same observations yields the same commands.
pub struct SecurityAutomaton {
    machine: StateMachine<SecurityPolicy>,
    policy: SecurityPolicy,
    state: SecurityState,
}

impl SecurityAutomaton {
    pub fn new(config: &SecurityConfig) -> Self {
        let policy = SecurityPolicy::from_config(config);
        Self {
            machine: policy.clone().state_machine(),
            state: SecurityState::new(policy.identity_enrolled),
            policy,
        }
    }

    pub fn observe(&mut self, observation: &FrameObservation) -> Option<StageCommand> {
        self.state.pending = None;
        self.machine
            .handle_with_context(&SecurityEvent::Tick(*observation), &mut self.state);
        self.state.pending.take()
    }

    /// Externally authorised unlock. Resets the stage to Monitoring and clears
    /// every counter; a no-op while already monitoring. Returns the stage the
    /// automaton was in before the call.
    pub fn force_unlock(&mut self) -> Stage {
        let previous = self.state.stage;
        self.state.pending = None;
        self.machine
            .handle_with_context(&SecurityEvent::ForceUnlock, &mut self.state);
        previous
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn state(&self) -> &SecurityState {
        &self.state
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Fraction of the active warning grace already spent, or `None` outside
    /// the warning stage.
    pub fn warning_progress(&self, now: Instant) -> Option<f32> {
        if self.state.stage != Stage::Warning {
            return None;
        }
        let started_at = self.state.warning_started_at?;
        let grace = self.policy.grace_for(self.state.warning_cause);
        if grace.is_zero() {
            return Some(1.0);
        }
        let elapsed = now.saturating_duration_since(started_at);
        Some((elapsed.as_secs_f32() / grace.as_secs_f32()).min(1.0))
    }
}

impl fmt::Debug for SecurityAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityAutomaton")
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish()
    }
}
