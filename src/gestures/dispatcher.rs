use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::DispatchConfig;
use crate::observation::GestureClass;
use crate::security::Stage;

use super::edge_detector::TriggeredGesture;

/// Desktop actions a triggered gesture can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ToggleControlMode,
    PlayPause,
    SwitchDesktop,
    VolumeAdjust,
}

impl ActionKind {
    pub fn for_gesture(class: GestureClass) -> Option<Self> {
        match class {
            GestureClass::OpenPalm => Some(Self::ToggleControlMode),
            GestureClass::Fist => Some(Self::PlayPause),
            GestureClass::Point => Some(Self::SwitchDesktop),
            GestureClass::Pinch => Some(Self::VolumeAdjust),
            GestureClass::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToggleControlMode => "toggle_control_mode",
            Self::PlayPause => "play_pause",
            Self::SwitchDesktop => "switch_desktop",
            Self::VolumeAdjust => "volume_adjust",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a trigger did not become an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suppression {
    Locked,
    ControlDisabled,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Action(ActionKind),
    Suppressed(Suppression),
}

/// Maps triggered gestures onto actions.
///
/// Open palm flips control mode and is always honoured; the other gestures
/// only act while control mode is on. Nothing is dispatched while the
/// workstation is locked, and two dispatches are never closer than the
/// configured cooldown.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    control_enabled: bool,
    cooldown: Duration,
    last_dispatch: Option<Instant>,
}

impl ActionDispatcher {
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            control_enabled: config.control_enabled_at_start,
            cooldown: config.action_cooldown(),
            last_dispatch: None,
        }
    }

    pub fn dispatch(&mut self, trigger: &TriggeredGesture, stage: Stage) -> Dispatch {
        let Some(action) = ActionKind::for_gesture(trigger.class) else {
            return Dispatch::Suppressed(Suppression::ControlDisabled);
        };

        if stage == Stage::Locked {
            debug!(gesture = %trigger.class, "Ignoring gesture while locked");
            return Dispatch::Suppressed(Suppression::Locked);
        }

        if let Some(last) = self.last_dispatch {
            if trigger.timestamp.saturating_duration_since(last) < self.cooldown {
                debug!(gesture = %trigger.class, "Gesture inside action cooldown");
                return Dispatch::Suppressed(Suppression::Cooldown);
            }
        }

        if action != ActionKind::ToggleControlMode && !self.control_enabled {
            debug!(gesture = %trigger.class, "Control mode disabled, ignoring gesture");
            return Dispatch::Suppressed(Suppression::ControlDisabled);
        }

        if action == ActionKind::ToggleControlMode {
            self.control_enabled = !self.control_enabled;
            info!(enabled = self.control_enabled, "Control mode toggled");
        }
        self.last_dispatch = Some(trigger.timestamp);
        info!(gesture = %trigger.class, action = %action, "Dispatching action");
        Dispatch::Action(action)
    }

    pub fn control_enabled(&self) -> bool {
        self.control_enabled
    }
}
