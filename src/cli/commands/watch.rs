use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use tutor_guard::config::TutorConfig;
use tutor_guard::engine::{DecisionEngine, TickReport, UnlockReport};
use tutor_guard::replay::{parse_line, tick_events, ReplayEvent, ReplayEventKind};
use tutor_guard::runtime::{spawn_engine, RuntimeError};

pub struct WatchCommand {
    pub input: Option<PathBuf>,
    pub queue: usize,
}

impl WatchCommand {
    pub fn new(input: Option<PathBuf>, queue: usize) -> Self {
        Self { input, queue }
    }

    pub async fn execute(&self, config: &TutorConfig) -> Result<()> {
        match &self.input {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                self.run(config, BufReader::new(file)).await
            }
            None => self.run(config, BufReader::new(tokio::io::stdin())).await,
        }
    }

    async fn run<R: AsyncBufRead + Unpin>(&self, config: &TutorConfig, reader: R) -> Result<()> {
        let engine = DecisionEngine::from_config(config);
        let (handle, task) = spawn_engine(engine, self.queue);
        let origin = Instant::now();

        // Reports are printed by a separate task so the reader can keep up
        // to `queue` observations in flight.
        let (pending_tx, pending_rx) = mpsc::channel(self.queue.max(1));
        let printer = tokio::spawn(print_reports(pending_rx));

        let mut lines = reader.lines();
        let mut line_no = 0;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            // A live stream keeps going past one bad frame.
            let record = match parse_line(&line, line_no) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed observation");
                    continue;
                }
            };

            let pending = if record.force_unlock {
                Pending::Unlock {
                    t_ms: record.t_ms,
                    report: handle.submit_unlock().await?,
                }
            } else {
                Pending::Tick {
                    t_ms: record.t_ms,
                    report: handle.submit(record.to_observation(origin)).await?,
                }
            };
            if pending_tx.send(pending).await.is_err() {
                break;
            }
        }

        drop(pending_tx);
        drop(handle);
        printer.await??;
        let summary = task.await?;
        println!("{}", serde_json::to_string(&summary)?);
        Ok(())
    }
}

enum Pending {
    Tick {
        t_ms: u64,
        report: oneshot::Receiver<TickReport>,
    },
    Unlock {
        t_ms: u64,
        report: oneshot::Receiver<UnlockReport>,
    },
}

/// Print reports in submission order as the engine produces them.
async fn print_reports(mut pending: mpsc::Receiver<Pending>) -> Result<(), RuntimeError> {
    while let Some(next) = pending.recv().await {
        match next {
            Pending::Tick { t_ms, report } => {
                let report = report.await.map_err(|_| RuntimeError::EngineStopped)?;
                for event in tick_events(t_ms, &report) {
                    println!("{event}");
                }
                for error in &report.effector_errors {
                    eprintln!("effector error: {error}");
                }
            }
            Pending::Unlock { t_ms, report } => {
                let report = report.await.map_err(|_| RuntimeError::EngineStopped)?;
                let event = ReplayEvent {
                    t_ms,
                    kind: ReplayEventKind::ForceUnlock {
                        previous_stage: report.previous_stage,
                    },
                };
                println!("{event}");
            }
        }
    }
    Ok(())
}
