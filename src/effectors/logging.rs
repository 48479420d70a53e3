use tracing::info;

use super::{Effect, Effector, EffectorError};
use crate::gestures::ActionKind;
use crate::security::Stage;

/// Effector that only logs, keeping a history of what it was asked to do.
#[derive(Debug, Default, Clone)]
pub struct LoggingEffector {
    history: Vec<Effect>,
}

impl LoggingEffector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[Effect] {
        &self.history
    }

    pub fn take_history(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.history)
    }

    /// Last lock stage requested, if any.
    pub fn lock_stage(&self) -> Option<Stage> {
        self.history.iter().rev().find_map(|effect| match effect {
            Effect::LockStage(stage) => Some(*stage),
            Effect::Action(_) => None,
        })
    }
}

impl Effector for LoggingEffector {
    fn trigger_action(&mut self, kind: ActionKind) -> Result<(), EffectorError> {
        info!(action = %kind, "Action requested");
        self.history.push(Effect::Action(kind));
        Ok(())
    }

    fn set_lock_stage(&mut self, stage: Stage) -> Result<(), EffectorError> {
        match stage {
            Stage::Monitoring => info!("Cancelling blur"),
            Stage::Warning => info!("Starting progressive blur"),
            Stage::Locked => info!("Locking session"),
        }
        self.history.push(Effect::LockStage(stage));
        Ok(())
    }
}
