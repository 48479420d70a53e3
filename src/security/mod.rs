// Presence/Identity Security Automaton
//
// Converts per-frame face presence and identity signals into a staged lock
// sequence: monitoring -> warning (progressive blur) -> locked.

pub mod types;
pub mod state_machine;


pub use types::{BlurRamp, FaceVerdict, MismatchPolicy, SecurityState, Stage, StageCommand, WarningCause};
pub use state_machine::{SecurityAutomaton, SecurityEvent, SecurityPolicy};
