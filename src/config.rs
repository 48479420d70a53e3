use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::security::MismatchPolicy;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "tutor.toml";

/// Prefix for environment overrides, e.g. `TUTOR__SECURITY__ABSENCE_GRACE_TICKS=20`.
pub const ENV_PREFIX: &str = "TUTOR";

/// A single dropped frame must never start the warning stage.
pub const MIN_ABSENCE_GRACE_TICKS: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Configuration file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("Invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main configuration structure for the decision layer
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Gesture debounce tunables
    pub gestures: GestureConfig,
    /// Presence/identity automaton tunables
    pub security: SecurityConfig,
    /// Gesture-to-action dispatch settings
    pub dispatch: DispatchConfig,
    /// Which effector to drive and how
    pub effectors: EffectorConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Consecutive active ticks before a gesture triggers
    pub activation_threshold: u32,
    /// Consecutive inactive ticks before a fired gesture can trigger again
    pub release_threshold: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 8,
            release_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Consecutive face-absent ticks tolerated before the warning stage
    pub absence_grace_ticks: u32,
    /// Seconds spent in the warning stage before locking
    pub warning_grace_seconds: f64,
    /// Whether an identity template has been enrolled
    pub identity_enrolled: bool,
    /// What an enrolled-identity mismatch escalates to
    pub mismatch_policy: MismatchPolicy,
    /// Shortened warning grace used when the warning was caused by a mismatch
    pub mismatch_grace_seconds: Option<f64>,
    /// Consecutive confirmed ticks needed to leave the warning stage
    pub recovery_ticks: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            absence_grace_ticks: 10,
            warning_grace_seconds: 1.5,
            identity_enrolled: false,
            mismatch_policy: MismatchPolicy::Warning,
            mismatch_grace_seconds: None,
            recovery_ticks: 1,
        }
    }
}

impl SecurityConfig {
    pub fn warning_grace(&self) -> Duration {
        seconds(self.warning_grace_seconds)
    }

    /// Grace applied once a mismatch has been seen during the warning.
    pub fn mismatch_grace(&self) -> Duration {
        self.mismatch_grace_seconds
            .map(seconds)
            .unwrap_or_else(|| self.warning_grace())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum spacing between two dispatched actions
    pub action_cooldown_seconds: f64,
    /// Whether gesture control mode starts enabled
    pub control_enabled_at_start: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            action_cooldown_seconds: 0.7,
            control_enabled_at_start: false,
        }
    }
}

impl DispatchConfig {
    pub fn action_cooldown(&self) -> Duration {
        seconds(self.action_cooldown_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectorKind {
    /// Log every effect through `tracing` and touch nothing else
    #[default]
    Logging,
    /// Run the configured external programs
    Command,
}

/// Command lines for the command effector, split on whitespace before
/// spawning. An empty string means "no-op".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EffectorConfig {
    pub kind: EffectorKind,
    pub toggle_control_mode: String,
    pub play_pause: String,
    pub switch_desktop: String,
    pub volume_adjust: String,
    /// Run when the warning stage begins (e.g. start a blur overlay)
    pub warning_command: String,
    /// Run when the warning stage is cancelled
    pub monitoring_command: String,
    /// Lock commands tried in order until one succeeds
    pub lock_commands: Vec<String>,
    /// Seconds a command may run before it is killed and counted as failed
    pub command_timeout_seconds: f64,
}

impl Default for EffectorConfig {
    fn default() -> Self {
        Self {
            kind: EffectorKind::Logging,
            toggle_control_mode: String::new(),
            play_pause: "playerctl play-pause".to_string(),
            switch_desktop: "xdotool key ctrl+alt+Right".to_string(),
            volume_adjust: "pactl set-sink-volume @DEFAULT_SINK@ +5%".to_string(),
            warning_command: String::new(),
            monitoring_command: String::new(),
            lock_commands: vec![
                "gnome-screensaver-command -l".to_string(),
                "xdg-screensaver lock".to_string(),
                "i3lock -c 000000".to_string(),
                "slock".to_string(),
            ],
            command_timeout_seconds: 5.0,
        }
    }
}

impl EffectorConfig {
    pub fn command_timeout(&self) -> Duration {
        seconds(self.command_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (overridden by RUST_LOG when set)
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TutorConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (`path`, or `tutor.toml` when present)
    /// 3. Environment variables (prefixed with `TUTOR__`)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&TutorConfig::default())?);

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                builder = builder.add_source(File::from(path));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let tutor_config: TutorConfig = builder.build()?.try_deserialize()?;
        tutor_config.validate()?;
        Ok(tutor_config)
    }

    /// Parse a TOML document on top of the defaults, without touching the
    /// environment.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let tutor_config: TutorConfig = Config::builder()
            .add_source(Config::try_from(&TutorConfig::default())?)
            .add_source(File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        tutor_config.validate()?;
        Ok(tutor_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gestures.activation_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "gestures.activation_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.gestures.release_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "gestures.release_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.security.absence_grace_ticks < MIN_ABSENCE_GRACE_TICKS {
            return Err(ConfigError::Invalid {
                field: "security.absence_grace_ticks",
                reason: format!("must be at least {MIN_ABSENCE_GRACE_TICKS}"),
            });
        }
        if self.security.recovery_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "security.recovery_ticks",
                reason: "must be at least 1".to_string(),
            });
        }
        check_seconds("security.warning_grace_seconds", self.security.warning_grace_seconds)?;
        if let Some(grace) = self.security.mismatch_grace_seconds {
            check_seconds("security.mismatch_grace_seconds", grace)?;
        }
        check_seconds(
            "dispatch.action_cooldown_seconds",
            self.dispatch.action_cooldown_seconds,
        )?;
        check_seconds(
            "effectors.command_timeout_seconds",
            self.effectors.command_timeout_seconds,
        )?;
        if self.effectors.command_timeout_seconds == 0.0 {
            return Err(ConfigError::Invalid {
                field: "effectors.command_timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.effectors.kind == EffectorKind::Command
            && self.effectors.lock_commands.iter().all(|c| c.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                field: "effectors.lock_commands",
                reason: "command effector needs at least one lock command".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<(), ConfigError> {
        if Path::new(".env").exists() {
            dotenvy::dotenv().map_err(|e| ConfigError::Invalid {
                field: ".env",
                reason: e.to_string(),
            })?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be a non-negative number of seconds, got {value}"),
        });
    }
    if Duration::try_from_secs_f64(value).is_err() {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("is too large to represent as a duration, got {value}"),
        });
    }
    Ok(())
}

/// Seconds to `Duration`; values `validate` would reject clamp to zero.
pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
