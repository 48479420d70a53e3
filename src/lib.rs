// Tutor Guard Library - gesture debouncing and presence-based locking
// This exposes the decision layer for the CLI, integration tests and embedders

pub mod observation;
pub mod gestures;
pub mod security;
pub mod effectors;
pub mod engine;
pub mod runtime;
pub mod replay;
pub mod config;
pub mod telemetry;
pub mod observability;

// Re-export key types for easy access
pub use observation::{FrameObservation, GestureClass, IdentityMatch};
pub use gestures::{ActionDispatcher, ActionKind, Dispatch, GestureEdgeDetector, TriggeredGesture};
pub use security::{SecurityAutomaton, Stage, StageCommand};
pub use effectors::{CommandEffector, Effector, EffectorError, LoggingEffector};
pub use engine::{DecisionEngine, TickReport, UnlockReport};
pub use runtime::{spawn_engine, EngineHandle, EngineInput, SessionSummary};
pub use replay::{read_log, replay, ObservationRecord, ReplayEvent, ReplayOutcome};
pub use config::{ConfigError, TutorConfig};
pub use telemetry::{init_telemetry, generate_session_id};
pub use observability::{DecisionMetrics, MetricsSnapshot, create_session_span};
