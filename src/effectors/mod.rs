//! Effector capability interface
//!
//! The decision layer never touches the OS directly. Every visible effect
//! goes through [`Effector`], implemented per target platform:
//!
//! - [`LoggingEffector`] records effects and logs them (replay, dry runs)
//! - [`CommandEffector`] runs configured external programs
//!
//! # Testing with Mocks
//!
//! ```rust,ignore
//! let mut effector = MockEffector::new();
//! effector
//!     .expect_set_lock_stage()
//!     .with(eq(Stage::Locked))
//!     .times(1)
//!     .returning(|_| Ok(()));
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{EffectorConfig, EffectorKind};
use crate::gestures::ActionKind;
use crate::security::Stage;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

pub mod command;
pub mod logging;

pub use command::{CommandEffector, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use logging::LoggingEffector;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EffectorError {
    #[error("Command `{command}` exited with status {status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("Command not found: {command}")]
    CommandNotFound { command: String },
    #[error("Failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },
    #[error("Command `{command}` timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("All {attempts} lock commands failed")]
    AllCommandsFailed { attempts: usize },
    #[error("No command configured for {effect}")]
    NotConfigured { effect: String },
}

/// A single effect request, as recorded by [`LoggingEffector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "value", rename_all = "snake_case")]
pub enum Effect {
    Action(ActionKind),
    LockStage(Stage),
}

/// OS-level capability the engine drives.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Effector: Send {
    /// Perform a desktop action (media key, desktop switch, ...)
    fn trigger_action(&mut self, kind: ActionKind) -> Result<(), EffectorError>;

    /// Realise a lock stage: start blur, cancel blur, or lock the session
    fn set_lock_stage(&mut self, stage: Stage) -> Result<(), EffectorError>;
}

impl<E: Effector + ?Sized> Effector for Box<E> {
    fn trigger_action(&mut self, kind: ActionKind) -> Result<(), EffectorError> {
        (**self).trigger_action(kind)
    }

    fn set_lock_stage(&mut self, stage: Stage) -> Result<(), EffectorError> {
        (**self).set_lock_stage(stage)
    }
}

/// Build the effector selected by configuration.
pub fn from_config(config: &EffectorConfig) -> Box<dyn Effector> {
    match config.kind {
        EffectorKind::Logging => Box::new(LoggingEffector::new()),
        EffectorKind::Command => Box::new(CommandEffector::new(config.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_boxed_effector_forwards() {
        let mut mock = MockEffector::new();
        mock.expect_set_lock_stage()
            .with(eq(Stage::Warning))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_trigger_action()
            .with(eq(ActionKind::PlayPause))
            .times(1)
            .returning(|_| {
                Err(EffectorError::NotConfigured {
                    effect: "play_pause".to_string(),
                })
            });

        let mut boxed: Box<dyn Effector> = Box::new(mock);
        assert!(boxed.set_lock_stage(Stage::Warning).is_ok());
        assert!(boxed.trigger_action(ActionKind::PlayPause).is_err());
    }

    #[test]
    fn test_effect_serializes_tagged() {
        let json = serde_json::to_string(&Effect::LockStage(Stage::Locked)).unwrap();
        assert_eq!(json, r#"{"effect":"lock_stage","value":"locked"}"#);
    }

    #[test]
    fn test_error_messages() {
        let err = EffectorError::AllCommandsFailed { attempts: 4 };
        assert_eq!(err.to_string(), "All 4 lock commands failed");
    }
}
