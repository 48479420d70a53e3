// Gesture handling: per-class edge detection and action dispatch

pub mod edge_detector;
pub mod dispatcher;

pub use edge_detector::{EdgePhase, GestureEdgeDetector, GestureState, TriggeredGesture};
pub use dispatcher::{ActionDispatcher, ActionKind, Dispatch, Suppression};
