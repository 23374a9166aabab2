//! Per-mode gesture semantics and physics behind one interface.

pub mod arcade;
pub mod garden;
pub mod guitar;
pub mod painter;
pub mod wallball;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::actions::ActionSink;
use crate::config::Profile;
use crate::gestures::{FrameInput, GestureEvent, GestureSet};
use crate::interaction::{InteractionState, WorldMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Garden,
    Arcade,
    WallBall,
    Guitar,
    Painter,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Garden,
        Mode::Arcade,
        Mode::WallBall,
        Mode::Guitar,
        Mode::Painter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Garden => "garden",
            Mode::Arcade => "arcade",
            Mode::WallBall => "wallball",
            Mode::Guitar => "guitar",
            Mode::Painter => "painter",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "garden" => Ok(Mode::Garden),
            "arcade" => Ok(Mode::Arcade),
            "wallball" | "wall-ball" | "wall_ball" => Ok(Mode::WallBall),
            "guitar" => Ok(Mode::Guitar),
            "painter" | "paint" => Ok(Mode::Painter),
            other => Err(format!(
                "unknown mode '{other}' (expected garden, arcade, wallball, guitar or painter)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModeStatus {
    pub objects: usize,
    pub particles: usize,
    pub score: u32,
}

/// Inputs to one physics step.
pub struct StepFrame<'a> {
    pub now_ms: u64,
    /// Clamped physics step in seconds.
    pub dt: f32,
    pub events: &'a [GestureEvent],
    pub state: &'a mut InteractionState,
    pub sink: &'a mut dyn ActionSink,
}

pub trait ModeHandler {
    fn mode(&self) -> Mode;

    /// Generic gestures this mode listens to.
    fn gestures(&self) -> GestureSet;

    /// Mode-specific discrete gestures. Runs after the generic classifier.
    fn classify(
        &mut self,
        input: &FrameInput<'_>,
        state: &mut InteractionState,
        events: &mut Vec<GestureEvent>,
    );

    fn step(&mut self, frame: &mut StepFrame<'_>);

    /// Empty every object collection. Must be idempotent.
    fn reset(&mut self, now_ms: u64);

    fn reconfigure(&mut self, profile: &Profile);

    fn status(&self) -> ModeStatus;
}

pub fn create_handler(mode: Mode, profile: &Profile, now_ms: u64) -> Box<dyn ModeHandler> {
    let mapping = WorldMapping::new(&profile.world);
    let seed = profile.world.seed;
    match mode {
        Mode::Garden => Box::new(garden::Garden::new(profile.garden.clone(), seed)),
        Mode::Arcade => Box::new(arcade::Arcade::new(
            profile.arcade.clone(),
            mapping,
            seed,
            now_ms,
        )),
        Mode::WallBall => Box::new(wallball::WallBall::new(
            profile.wallball.clone(),
            seed,
            now_ms,
        )),
        Mode::Guitar => Box::new(guitar::Guitar::new(profile.guitar.clone(), mapping, seed)),
        Mode::Painter => Box::new(painter::Painter::new(profile.painter.clone(), seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_parse_back() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>(), Ok(mode));
        }
        assert_eq!("Wall-Ball".parse::<Mode>(), Ok(Mode::WallBall));
        assert!("bowling".parse::<Mode>().is_err());
    }

    #[test]
    fn every_handler_reports_its_mode() {
        let profile = Profile::default();
        for mode in Mode::ALL {
            assert_eq!(create_handler(mode, &profile, 0).mode(), mode);
        }
    }
}
