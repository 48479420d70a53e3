//! Offline replay of recorded observation logs.
//!
//! Logs are JSON lines, one observation per line:
//!
//! ```text
//! {"t_ms": 0, "gesture": "open_palm", "face_present": true, "identity": "match"}
//! {"t_ms": 100, "face_present": false}
//! {"t_ms": 5000, "force_unlock": true}
//! ```
//!
//! Missing fields take their idle value (no gesture, no face). Because every
//! timeout is judged from `t_ms`, replaying a log always yields the same events.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TutorConfig;
use crate::effectors::LoggingEffector;
use crate::engine::{DecisionEngine, TickReport};
use crate::gestures::{ActionKind, Dispatch, Suppression};
use crate::observability::MetricsSnapshot;
use crate::observation::{FrameObservation, GestureClass, IdentityMatch};
use crate::security::{Stage, StageCommand};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Line {line}: read failed: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

/// One line of an observation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub t_ms: u64,
    #[serde(default)]
    pub gesture: GestureClass,
    #[serde(default)]
    pub face_present: bool,
    #[serde(default)]
    pub identity: IdentityMatch,
    /// Apply an authorised unlock at this instant instead of an observation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force_unlock: bool,
}

impl ObservationRecord {
    pub fn to_observation(&self, origin: Instant) -> FrameObservation {
        FrameObservation::new(
            origin + Duration::from_millis(self.t_ms),
            self.gesture,
            self.face_present,
            self.identity,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEventKind {
    Trigger { gesture: GestureClass },
    Action { action: ActionKind },
    Suppressed { gesture: GestureClass, reason: Suppression },
    StageCommand { command: StageCommand, stage: Stage },
    ForceUnlock { previous_stage: Stage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayEvent {
    pub t_ms: u64,
    #[serde(flatten)]
    pub kind: ReplayEventKind,
}

impl fmt::Display for ReplayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}ms  ", self.t_ms)?;
        match self.kind {
            ReplayEventKind::Trigger { gesture } => write!(f, "gesture  {gesture} triggered"),
            ReplayEventKind::Action { action } => write!(f, "action   {action}"),
            ReplayEventKind::Suppressed { gesture, reason } => {
                write!(f, "ignored  {gesture} ({reason:?})")
            }
            ReplayEventKind::StageCommand { command, stage } => {
                write!(f, "stage    {stage} ({command:?})")
            }
            ReplayEventKind::ForceUnlock { previous_stage } => {
                write!(f, "unlock   from {previous_stage}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayOutcome {
    pub events: Vec<ReplayEvent>,
    pub final_stage: Stage,
    pub metrics: MetricsSnapshot,
}

pub fn read_log(path: &Path) -> Result<Vec<ObservationRecord>, ReplayError> {
    let file = File::open(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_log(BufReader::new(file))
}

/// Parse JSON lines. Blank lines and `#` comments are skipped; line numbers in
/// errors are 1-based.
pub fn parse_log<R: BufRead>(reader: R) -> Result<Vec<ObservationRecord>, ReplayError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| ReplayError::Read {
            line: line_no,
            source,
        })?;
        if let Some(record) = parse_line(&line, line_no)? {
            records.push(record);
        }
    }
    debug!(records = records.len(), "Parsed observation log");
    Ok(records)
}

/// Parse a single log line; `None` for blank and comment lines.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<ObservationRecord>, ReplayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| ReplayError::Parse {
            line: line_no,
            source,
        })
}

/// Events a single tick produced, in emission order.
pub fn tick_events(t_ms: u64, report: &TickReport) -> Vec<ReplayEvent> {
    let mut events = Vec::new();
    if let Some(command) = report.stage_command {
        events.push(ReplayEvent {
            t_ms,
            kind: ReplayEventKind::StageCommand {
                command,
                stage: command.target_stage(),
            },
        });
    }
    if let Some(trigger) = report.trigger {
        events.push(ReplayEvent {
            t_ms,
            kind: ReplayEventKind::Trigger {
                gesture: trigger.class,
            },
        });
        match report.dispatch {
            Some(Dispatch::Action(action)) => events.push(ReplayEvent {
                t_ms,
                kind: ReplayEventKind::Action { action },
            }),
            Some(Dispatch::Suppressed(reason)) => events.push(ReplayEvent {
                t_ms,
                kind: ReplayEventKind::Suppressed {
                    gesture: trigger.class,
                    reason,
                },
            }),
            None => {}
        }
    }
    events
}

/// Run records through a fresh engine with a logging effector.
pub fn replay(records: &[ObservationRecord], config: &TutorConfig) -> ReplayOutcome {
    let mut engine = DecisionEngine::new(config, LoggingEffector::new());
    let origin = Instant::now();
    let mut events = Vec::new();

    for record in records {
        let t_ms = record.t_ms;
        if record.force_unlock {
            let report = engine.force_unlock();
            events.push(ReplayEvent {
                t_ms,
                kind: ReplayEventKind::ForceUnlock {
                    previous_stage: report.previous_stage,
                },
            });
            continue;
        }

        let report = engine.tick(&record.to_observation(origin));
        events.extend(tick_events(t_ms, &report));
    }

    let metrics = engine.metrics().snapshot();
    info!(
        records = records.len(),
        events = events.len(),
        stage = %engine.stage(),
        "Replay finished"
    );

    ReplayOutcome {
        events,
        final_stage: engine.stage(),
        metrics,
    }
}
