// Decision engine - one observation in, effector calls out

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::TutorConfig;
use crate::effectors::{self, Effector, EffectorError};
use crate::gestures::{ActionDispatcher, Dispatch, GestureEdgeDetector, TriggeredGesture};
use crate::observability::DecisionMetrics;
use crate::observation::FrameObservation;
use crate::security::{BlurRamp, SecurityAutomaton, Stage, StageCommand};

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub trigger: Option<TriggeredGesture>,
    pub dispatch: Option<Dispatch>,
    pub stage_command: Option<StageCommand>,
    pub stage: Stage,
    pub effector_errors: Vec<EffectorError>,
}

impl TickReport {
    pub fn is_quiet(&self) -> bool {
        self.trigger.is_none() && self.stage_command.is_none()
    }
}

/// Outcome of an externally authorised unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockReport {
    pub previous_stage: Stage,
    pub effector_error: Option<String>,
}

/// Serialized owner of the gesture detector, dispatcher and security
/// automaton. Every call runs to completion before the next one starts.
pub struct DecisionEngine<E: Effector = Box<dyn Effector>> {
    detector: GestureEdgeDetector,
    dispatcher: ActionDispatcher,
    automaton: SecurityAutomaton,
    effector: E,
    blur: BlurRamp,
    metrics: Arc<DecisionMetrics>,
}

impl DecisionEngine<Box<dyn Effector>> {
    /// Engine wired to the effector named in the configuration.
    pub fn from_config(config: &TutorConfig) -> Self {
        Self::new(config, effectors::from_config(&config.effectors))
    }
}

impl<E: Effector> DecisionEngine<E> {
    pub fn new(config: &TutorConfig, effector: E) -> Self {
        Self {
            detector: GestureEdgeDetector::new(&config.gestures),
            dispatcher: ActionDispatcher::new(&config.dispatch),
            automaton: SecurityAutomaton::new(&config.security),
            effector,
            blur: BlurRamp::default(),
            metrics: Arc::new(DecisionMetrics::new()),
        }
    }

    /// Process one observation.
    ///
    /// The security automaton runs before dispatch, so a gesture completing on
    /// the same tick the session locks is already suppressed. Stage changes
    /// reach the effector before actions. Effector failures are logged and
    /// reported but never roll back the decision state.
    pub fn tick(&mut self, observation: &FrameObservation) -> TickReport {
        self.metrics.record_tick();

        let trigger = self
            .detector
            .observe(observation.gesture_class, observation.timestamp);
        let stage_command = self.automaton.observe(observation);
        let stage = self.automaton.stage();

        let dispatch = trigger.map(|trigger| {
            self.metrics.record_trigger();
            let dispatch = self.dispatcher.dispatch(&trigger, stage);
            self.metrics
                .record_dispatch(matches!(dispatch, Dispatch::Action(_)));
            dispatch
        });

        let mut effector_errors = Vec::new();

        if let Some(command) = stage_command {
            let target = command.target_stage();
            self.metrics.record_stage_command(target == Stage::Locked);
            info!(command = ?command, stage = %target, "Stage command");
            if let Err(e) = self.effector.set_lock_stage(target) {
                error!(stage = %target, error = %e, "Effector failed to apply lock stage");
                effector_errors.push(e);
            }
        }

        if let Some(Dispatch::Action(kind)) = dispatch {
            if let Err(e) = self.effector.trigger_action(kind) {
                error!(action = %kind, error = %e, "Effector failed to perform action");
                effector_errors.push(e);
            }
        }

        for _ in &effector_errors {
            self.metrics.record_effector_failure();
        }

        TickReport {
            trigger,
            dispatch,
            stage_command,
            stage,
            effector_errors,
        }
    }

    /// Reset the security automaton to Monitoring. The effector is only told
    /// when the stage actually changed.
    pub fn force_unlock(&mut self) -> UnlockReport {
        self.metrics.record_force_unlock();
        let previous_stage = self.automaton.force_unlock();
        if previous_stage == Stage::Monitoring {
            debug!("Force unlock while monitoring, nothing to do");
            return UnlockReport {
                previous_stage,
                effector_error: None,
            };
        }

        info!(from = %previous_stage, "Force unlock");
        let effector_error = match self.effector.set_lock_stage(Stage::Monitoring) {
            Ok(()) => None,
            Err(e) => {
                error!(error = %e, "Effector failed to cancel lock stage");
                self.metrics.record_effector_failure();
                Some(e.to_string())
            }
        };

        UnlockReport {
            previous_stage,
            effector_error,
        }
    }

    pub fn stage(&self) -> Stage {
        self.automaton.stage()
    }

    pub fn control_enabled(&self) -> bool {
        self.dispatcher.control_enabled()
    }

    pub fn automaton(&self) -> &SecurityAutomaton {
        &self.automaton
    }

    pub fn detector(&self) -> &GestureEdgeDetector {
        &self.detector
    }

    /// Blur strength for the renderer while a warning is in progress.
    pub fn blur_strength(&self, now: Instant) -> Option<u32> {
        self.automaton
            .warning_progress(now)
            .map(|progress| self.blur.strength(progress))
    }

    pub fn metrics(&self) -> Arc<DecisionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn effector(&self) -> &E {
        &self.effector
    }

    pub fn effector_mut(&mut self) -> &mut E {
        &mut self.effector
    }

    pub fn into_effector(self) -> E {
        self.effector
    }
}
