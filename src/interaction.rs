//! The shared interaction record and the view/world coordinate mapping.
//!
//! One writer per field per tick: the classifier owns the input-derived
//! fields, the painter owns `active_color` and `cursors`, the arcade
//! classifier owns `is_pointing`.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("colour '{s}' must start with '#'"))?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("colour '{s}' must look like #rrggbb"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("colour '{s}': {e}"))
        };
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

/// Maps detector space onto the mirrored view and the 3D world.
#[derive(Debug, Clone, Copy)]
pub struct WorldMapping {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl WorldMapping {
    pub fn new(world: &World) -> Self {
        Self {
            width: world.width,
            height: world.height,
            depth: world.depth,
        }
    }

    /// Mirrored view coordinates: x grows to the player's right, y down.
    pub fn to_view(&self, raw: Vec3) -> Vec2 {
        Vec2::new(1.0 - raw.x, raw.y)
    }

    /// World coordinates: x right, y up from the floor, z away from the camera.
    pub fn to_world(&self, raw: Vec3) -> Vec3 {
        Vec3::new(
            (0.5 - raw.x) * self.width,
            (1.0 - raw.y) * self.height,
            -raw.z * self.depth,
        )
    }

    /// Inverse of [`to_view`](Self::to_view) followed by [`to_world`](Self::to_world) at zero depth.
    pub fn view_to_world(&self, view: Vec2) -> Vec3 {
        self.to_world(Vec3::new(1.0 - view.x, view.y, 0.0))
    }
}

/// One brush sample produced this frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaintCursor {
    pub position: Vec2,
    pub color: Color,
    pub size: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionState {
    /// Mirrored index fingertip in world space; the pointer for every mode.
    pub cursor: Vec3,
    /// The same fingertip in mirrored view space.
    pub pointer: Vec2,
    pub palm: Vec3,
    pub is_hovering: bool,
    pub is_grabbing: bool,
    pub is_pointing: bool,
    pub is_painting: bool,
    /// Smoothed cursor velocity in world units per second.
    pub velocity: Vec3,
    /// Thumb-to-index distance over hand scale; infinite with no hand.
    pub pinch_ratio: f32,
    pub active_color: Color,
    /// Brush samples for the current frame only.
    pub cursors: Vec<PaintCursor>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            cursor: Vec3::ZERO,
            pointer: Vec2::splat(0.5),
            palm: Vec3::ZERO,
            is_hovering: false,
            is_grabbing: false,
            is_pointing: false,
            is_painting: false,
            velocity: Vec3::ZERO,
            pinch_ratio: f32::INFINITY,
            active_color: Color::WHITE,
            cursors: Vec::new(),
        }
    }
}

impl InteractionState {
    /// Drop every input-derived flag, as on hand loss or a mode switch.
    pub fn release_all(&mut self) {
        self.is_hovering = false;
        self.is_grabbing = false;
        self.is_pointing = false;
        self.is_painting = false;
        self.pinch_ratio = f32::INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_round_trips_through_hex() {
        let c: Color = "#3399ff".parse().unwrap();
        assert_eq!(c, Color::rgb(0x33, 0x99, 0xff));
        assert_eq!(c.to_string(), "#3399ff");
        assert!("3399ff".parse::<Color>().is_err());
        assert!("#zz99ff".parse::<Color>().is_err());
    }

    #[test]
    fn non_ascii_colour_is_an_error_not_a_panic() {
        assert!("#aé123".parse::<Color>().is_err());
        assert!("#ééé".parse::<Color>().is_err());
        assert!("#+1+2+3".parse::<Color>().is_err());
    }

    #[test]
    fn mapping_mirrors_x_and_flips_y() {
        let map = WorldMapping::new(&World::default());
        let raw = Vec3::new(0.25, 0.25, 0.0);
        assert_eq!(map.to_view(raw), Vec2::new(0.75, 0.25));
        let w = map.to_world(raw);
        assert!((w.x - 1.0).abs() < 1e-6);
        assert!((w.y - 2.25).abs() < 1e-6);
        let back = map.view_to_world(Vec2::new(0.75, 0.25));
        assert!(back.distance(w) < 1e-6);
    }
}
