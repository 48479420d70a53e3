//! Per-frame observations handed to the decision layer.
//!
//! The vision collaborators (hand landmark classifier, face detector, face
//! matcher) produce one [`FrameObservation`] per sampling tick. Values are
//! immutable once built and are never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Raw per-frame gesture classification.
///
/// Anything the classifier reports that is not one of the four known poses
/// collapses into [`GestureClass::None`], so an unknown label can never
/// activate a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GestureClass {
    #[default]
    None,
    OpenPalm,
    Fist,
    Point,
    Pinch,
}

impl GestureClass {
    pub const TRACKED_COUNT: usize = 4;

    /// Every class the edge detector tracks (excludes `None`).
    pub const TRACKED: [GestureClass; Self::TRACKED_COUNT] = [
        GestureClass::OpenPalm,
        GestureClass::Fist,
        GestureClass::Point,
        GestureClass::Pinch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OpenPalm => "open_palm",
            Self::Fist => "fist",
            Self::Point => "point",
            Self::Pinch => "pinch",
        }
    }

    /// Parse a classifier label. Accepts `open_palm`, `OPEN_PALM` and
    /// `open-palm` spellings; unrecognised labels (including the
    /// classifier's `NO_HAND`) map to `None`.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "open_palm" | "openpalm" => Self::OpenPalm,
            "fist" => Self::Fist,
            "point" => Self::Point,
            "pinch" => Self::Pinch,
            _ => Self::None,
        }
    }

    /// Map a numeric class code (as emitted by some classifiers) onto the
    /// enumerated set. Out-of-range codes become `None`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::OpenPalm,
            2 => Self::Fist,
            3 => Self::Point,
            4 => Self::Pinch,
            _ => Self::None,
        }
    }

    /// Position of this class in [`GestureClass::TRACKED`].
    pub(crate) fn slot(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::OpenPalm => Some(0),
            Self::Fist => Some(1),
            Self::Point => Some(2),
            Self::Pinch => Some(3),
        }
    }
}

impl From<String> for GestureClass {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<GestureClass> for String {
    fn from(class: GestureClass) -> Self {
        class.as_str().to_string()
    }
}

impl fmt::Display for GestureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing the visible face against the enrolled template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMatch {
    /// No face to compare (or nothing enrolled to compare against).
    #[default]
    UnknownNoFace,
    Match,
    NoMatch,
}

/// One tick's worth of vision output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameObservation {
    pub timestamp: Instant,
    pub gesture_class: GestureClass,
    pub face_present: bool,
    pub face_identity_match: IdentityMatch,
}

impl FrameObservation {
    pub fn new(
        timestamp: Instant,
        gesture_class: GestureClass,
        face_present: bool,
        face_identity_match: IdentityMatch,
    ) -> Self {
        Self {
            timestamp,
            gesture_class,
            face_present,
            face_identity_match,
        }
    }

    /// An observation with no hand pose and no face.
    pub fn empty(timestamp: Instant) -> Self {
        Self::new(timestamp, GestureClass::None, false, IdentityMatch::UnknownNoFace)
    }

    /// Identity result with the `face_present = false` inconsistency removed.
    ///
    /// A match verdict without a detected face is meaningless, so it is
    /// downgraded to `UnknownNoFace` instead of being rejected.
    pub fn normalized_identity(&self) -> IdentityMatch {
        if self.face_present {
            self.face_identity_match
        } else {
            IdentityMatch::UnknownNoFace
        }
    }

    /// Copy of this observation with [`Self::normalized_identity`] applied.
    pub fn normalized(&self) -> Self {
        Self {
            face_identity_match: self.normalized_identity(),
            ..*self
        }
    }
}
