//! Command-backed effector
//!
//! Runs the external programs named in [`EffectorConfig`]. Lock requests walk
//! the configured lock commands in order and stop at the first one that
//! succeeds, so one config can cover several desktop environments. A command
//! still running after `command_timeout_seconds` is killed, and a killed lock
//! command counts as a failed attempt.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::{Effector, EffectorError};
use crate::config::EffectorConfig;
use crate::gestures::ActionKind;
use crate::security::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status_code == 0
    }
}

/// Trait for executing external commands
///
/// Lets the effector run without depending on `std::process::Command`
/// directly, so tests can script the outcomes.
pub trait CommandRunner: Send {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EffectorError>;
}

/// Real implementation using std::process::Command
///
/// Children that outlive `timeout` are killed and reported as
/// [`EffectorError::Timeout`], so one wedged program cannot hold up the
/// engine.
#[derive(Debug, Clone, Copy)]
pub struct ProcessCommandRunner {
    timeout: Duration,
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for a pipe to drain once the child has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

impl ProcessCommandRunner {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ProcessCommandRunner {
    fn default() -> Self {
        Self::with_timeout(EffectorConfig::default().command_timeout())
    }
}

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EffectorError> {
        let spawn_error = |e: std::io::Error| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EffectorError::CommandNotFound {
                    command: program.to_string(),
                }
            } else {
                EffectorError::Spawn {
                    command: program.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Drained off-thread: a daemonising locker may keep the pipes open
        // long after the process we spawned has exited.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let now = Instant::now();
                    if now >= deadline {
                        if let Err(e) = child.kill() {
                            warn!(command = %program, error = %e, "Failed to kill timed out command");
                        }
                        let _ = child.wait();
                        return Err(EffectorError::Timeout {
                            command: program.to_string(),
                            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                        });
                    }
                    thread::sleep(POLL_INTERVAL.min(deadline - now));
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(spawn_error(e));
                }
            }
        };

        Ok(CommandOutput {
            status_code: status.code().unwrap_or(-1),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn drain<P: Read + Send + 'static>(mut pipe: P) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

fn collect(pipe: Option<mpsc::Receiver<String>>) -> String {
    pipe.and_then(|rx| rx.recv_timeout(DRAIN_GRACE).ok())
        .unwrap_or_default()
}

pub struct CommandEffector<R: CommandRunner = ProcessCommandRunner> {
    config: EffectorConfig,
    runner: R,
}

impl CommandEffector<ProcessCommandRunner> {
    pub fn new(config: EffectorConfig) -> Self {
        let runner = ProcessCommandRunner::with_timeout(config.command_timeout());
        Self::with_runner(config, runner)
    }
}

impl<R: CommandRunner> CommandEffector<R> {
    pub fn with_runner(config: EffectorConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn action_command(&self, kind: ActionKind) -> &str {
        match kind {
            ActionKind::ToggleControlMode => &self.config.toggle_control_mode,
            ActionKind::PlayPause => &self.config.play_pause,
            ActionKind::SwitchDesktop => &self.config.switch_desktop,
            ActionKind::VolumeAdjust => &self.config.volume_adjust,
        }
    }

    /// Run one whitespace-separated command line. Blank lines are a no-op.
    fn run_line(&self, line: &str) -> Result<(), EffectorError> {
        let mut parts = line.split_whitespace();
        let Some(program) = parts.next() else {
            return Ok(());
        };
        let args: Vec<&str> = parts.collect();

        debug!(command = %line, "Running effector command");
        let output = self.runner.run(program, &args)?;
        if !output.success() {
            return Err(EffectorError::CommandFailed {
                command: line.to_string(),
                status: Some(output.status_code),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    fn lock(&self) -> Result<(), EffectorError> {
        let candidates: Vec<&String> = self
            .config
            .lock_commands
            .iter()
            .filter(|line| !line.trim().is_empty())
            .collect();

        if candidates.is_empty() {
            return Err(EffectorError::NotConfigured {
                effect: "lock".to_string(),
            });
        }

        for line in &candidates {
            match self.run_line(line) {
                Ok(()) => return Ok(()),
                Err(e) => warn!(command = %line, error = %e, "Lock command failed, trying next"),
            }
        }

        error!(attempts = candidates.len(), "No lock command succeeded");
        Err(EffectorError::AllCommandsFailed {
            attempts: candidates.len(),
        })
    }
}

impl<R: CommandRunner> Effector for CommandEffector<R> {
    fn trigger_action(&mut self, kind: ActionKind) -> Result<(), EffectorError> {
        self.run_line(self.action_command(kind))
    }

    fn set_lock_stage(&mut self, stage: Stage) -> Result<(), EffectorError> {
        match stage {
            Stage::Monitoring => self.run_line(&self.config.monitoring_command),
            Stage::Warning => self.run_line(&self.config.warning_command),
            Stage::Locked => self.lock(),
        }
    }
}
