//! Error taxonomy for the engine.
//!
//! Per-frame errors are recoverable and swallowed at the tick boundary;
//! only [`DetectorError::Init`] is meant to reach the user.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    /// The detector could not be brought up at all. Gameplay is blocked.
    #[error("detector failed to initialise: {0}")]
    Init(String),

    /// The detector failed for this frame only.
    #[error("detection failed: {0}")]
    Frame(String),

    #[error("detector I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed detector record at line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl DetectorError {
    /// True when the error only affects the current frame.
    pub fn is_transient(&self) -> bool {
        matches!(self, DetectorError::Frame(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("hand has {0} landmarks, expected 21")]
    TooFewPoints(usize),

    #[error("landmark {0} is not finite")]
    NonFinite(usize),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GestureError {
    #[error("engage threshold {engage} must be below release threshold {release}")]
    InvertedThresholds { engage: f32, release: f32 },
}

#[derive(Error, Debug)]
pub enum HapticError {
    #[error("haptics unavailable")]
    Unavailable,

    #[error("haptic write failed: {0}")]
    Io(#[from] std::io::Error),
}
