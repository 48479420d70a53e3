// Single-consumer boundary in front of the decision engine
//
// Producers (frame source, unlock UI) may live on any task or thread; the
// engine itself is only ever touched by the one task spawned here, so ticks
// and unlocks are applied strictly in arrival order.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};

use crate::effectors::Effector;
use crate::engine::{DecisionEngine, TickReport, UnlockReport};
use crate::observability::{create_session_span, MetricsSnapshot};
use crate::observation::FrameObservation;
use crate::security::Stage;
use crate::telemetry::generate_session_id;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Decision engine has stopped")]
    EngineStopped,
}

#[derive(Debug)]
pub enum EngineInput {
    Observe {
        observation: FrameObservation,
        reply: Option<oneshot::Sender<TickReport>>,
    },
    ForceUnlock {
        reply: Option<oneshot::Sender<UnlockReport>>,
    },
}

/// Final state of a session, returned once every handle is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub final_stage: Stage,
    pub control_enabled: bool,
    pub metrics: MetricsSnapshot,
}

/// Cloneable sender side of the engine queue.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineInput>,
}

impl EngineHandle {
    /// Queue an observation without waiting for it to be processed.
    pub async fn observe(&self, observation: FrameObservation) -> Result<(), RuntimeError> {
        self.send(EngineInput::Observe {
            observation,
            reply: None,
        })
        .await
    }

    /// Queue an observation and wait for its report.
    pub async fn observe_and_wait(
        &self,
        observation: FrameObservation,
    ) -> Result<TickReport, RuntimeError> {
        let pending = self.submit(observation).await?;
        pending.await.map_err(|_| RuntimeError::EngineStopped)
    }

    /// Queue an observation and return the receiver its report will arrive
    /// on. Lets a producer keep several observations in flight.
    pub async fn submit(
        &self,
        observation: FrameObservation,
    ) -> Result<oneshot::Receiver<TickReport>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineInput::Observe {
            observation,
            reply: Some(tx),
        })
        .await?;
        Ok(rx)
    }

    /// Queue an unlock behind any observations already sent.
    pub async fn force_unlock(&self) -> Result<UnlockReport, RuntimeError> {
        let pending = self.submit_unlock().await?;
        pending.await.map_err(|_| RuntimeError::EngineStopped)
    }

    pub async fn submit_unlock(&self) -> Result<oneshot::Receiver<UnlockReport>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineInput::ForceUnlock { reply: Some(tx) }).await?;
        Ok(rx)
    }

    async fn send(&self, input: EngineInput) -> Result<(), RuntimeError> {
        self.sender
            .send(input)
            .await
            .map_err(|_| RuntimeError::EngineStopped)
    }
}

/// Move the engine onto its own task.
///
/// `capacity` bounds the queue; producers wait when it is full. The task ends
/// when every [`EngineHandle`] has been dropped.
pub fn spawn_engine<E>(
    engine: DecisionEngine<E>,
    capacity: usize,
) -> (EngineHandle, JoinHandle<SessionSummary>)
where
    E: Effector + 'static,
{
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let session_id = generate_session_id();
    let span = create_session_span(&session_id);

    let task = tokio::spawn(run_engine(engine, receiver, session_id).instrument(span));
    (EngineHandle { sender }, task)
}

async fn run_engine<E: Effector>(
    mut engine: DecisionEngine<E>,
    mut receiver: mpsc::Receiver<EngineInput>,
    session_id: String,
) -> SessionSummary {
    info!(session_id = %session_id, "Decision engine started");

    while let Some(input) = receiver.recv().await {
        match input {
            EngineInput::Observe { observation, reply } => {
                let report = engine.tick(&observation);
                if let Some(reply) = reply {
                    if reply.send(report).is_err() {
                        debug!("Tick report receiver dropped");
                    }
                }
            }
            EngineInput::ForceUnlock { reply } => {
                let report = engine.force_unlock();
                if let Some(reply) = reply {
                    if reply.send(report).is_err() {
                        debug!("Unlock report receiver dropped");
                    }
                }
            }
        }
    }

    let metrics = engine.metrics();
    metrics.log_stats();
    info!(session_id = %session_id, stage = %engine.stage(), "Decision engine stopped");

    SessionSummary {
        session_id,
        final_stage: engine.stage(),
        control_enabled: engine.control_enabled(),
        metrics: metrics.snapshot(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TutorConfig;
    use crate::effectors::LoggingEffector;
    use crate::security::StageCommand;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_observations_are_applied_in_order() {
        let engine = DecisionEngine::new(&TutorConfig::default(), LoggingEffector::new());
        let (handle, task) = spawn_engine(engine, 4);

        let start = Instant::now();
        for i in 1..10 {
            handle
                .observe(FrameObservation::empty(start + Duration::from_millis(100 * i)))
                .await
                .unwrap();
        }
        let report = handle
            .observe_and_wait(FrameObservation::empty(start + Duration::from_millis(1000)))
            .await
            .unwrap();
        assert_eq!(report.stage_command, Some(StageCommand::EnterWarning));

        let unlock = handle.force_unlock().await.unwrap();
        assert_eq!(unlock.previous_stage, Stage::Warning);

        drop(handle);
        let summary = task.await.unwrap();
        assert_eq!(summary.final_stage, Stage::Monitoring);
        assert_eq!(summary.metrics.ticks, 10);
        assert_eq!(summary.metrics.force_unlocks, 1);
    }

    #[tokio::test]
    async fn test_submitted_observations_queue_up_before_processing() {
        let engine = DecisionEngine::new(&TutorConfig::default(), LoggingEffector::new());
        let (handle, task) = spawn_engine(engine, 16);

        let start = Instant::now();
        let mut pending = Vec::new();
        for i in 1..=10 {
            let observation = FrameObservation::empty(start + Duration::from_millis(100 * i));
            pending.push(handle.submit(observation).await.unwrap());
        }
        let unlock = handle.submit_unlock().await.unwrap();
        // Eleven requests sit in the queue before the engine task has run
        assert_eq!(handle.sender.capacity(), 16 - 11);

        let mut commands = Vec::new();
        for report in pending {
            commands.push(report.await.unwrap().stage_command);
        }
        assert!(commands[..9].iter().all(Option::is_none));
        assert_eq!(commands[9], Some(StageCommand::EnterWarning));
        assert_eq!(unlock.await.unwrap().previous_stage, Stage::Warning);

        drop(handle);
        let summary = task.await.unwrap();
        assert_eq!(summary.metrics.ticks, 10);
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_engine() {
        let engine = DecisionEngine::new(&TutorConfig::default(), LoggingEffector::new());
        let (handle, task) = spawn_engine(engine, 1);
        task.abort();
        let _ = task.await;

        let result = handle.observe(FrameObservation::empty(Instant::now())).await;
        assert_eq!(result, Err(RuntimeError::EngineStopped));
    }
}
