//! Hand landmark frames as delivered by the detector.
//!
//! Points are in normalised image space: x right, y down, z relative depth.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::LandmarkError;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// (mcp, pip, tip) for the four non-thumb fingers, index first.
pub const FINGERS: [(usize, usize, usize); 4] = [
    (INDEX_MCP, INDEX_PIP, INDEX_TIP),
    (MIDDLE_MCP, MIDDLE_PIP, MIDDLE_TIP),
    (RING_MCP, RING_PIP, RING_TIP),
    (PINKY_MCP, PINKY_PIP, PINKY_TIP),
];

/// One hand exactly as the detector reported it. Not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawHand {
    pub points: Vec<[f32; 3]>,
}

/// A validated 21-point hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandLandmarks {
    points: [Vec3; LANDMARK_COUNT],
}

impl TryFrom<&RawHand> for HandLandmarks {
    type Error = LandmarkError;

    fn try_from(raw: &RawHand) -> Result<Self, Self::Error> {
        if raw.points.len() < LANDMARK_COUNT {
            return Err(LandmarkError::TooFewPoints(raw.points.len()));
        }
        let mut points = [Vec3::ZERO; LANDMARK_COUNT];
        for (i, p) in raw.points.iter().take(LANDMARK_COUNT).enumerate() {
            let v = Vec3::from_array(*p);
            if !v.is_finite() {
                return Err(LandmarkError::NonFinite(i));
            }
            points[i] = v;
        }
        Ok(Self { points })
    }
}

impl HandLandmarks {
    pub fn point(&self, idx: usize) -> Vec3 {
        self.points[idx]
    }

    pub fn wrist(&self) -> Vec3 {
        self.points[WRIST]
    }

    /// Wrist to index knuckle, floored so thresholds never divide by zero.
    pub fn hand_scale(&self, min_scale: f32) -> f32 {
        self.points[WRIST]
            .distance(self.points[INDEX_MCP])
            .max(min_scale)
    }

    /// Centroid of wrist, index knuckle and pinky knuckle.
    pub fn palm_center(&self) -> Vec3 {
        (self.points[WRIST] + self.points[INDEX_MCP] + self.points[PINKY_MCP]) / 3.0
    }
}

/// Put the hand that continues the previous primary hand first.
///
/// With `stable` unset, or without a previous wrist, detector order wins.
pub fn order_hands(hands: &mut [HandLandmarks], previous_wrist: Option<Vec3>, stable: bool) {
    if !stable || hands.len() < 2 {
        return;
    }
    if let Some(prev) = previous_wrist {
        if hands[1].wrist().distance(prev) < hands[0].wrist().distance(prev) {
            hands.swap(0, 1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThumbPose {
    /// Thumb held out to the side.
    Away,
    /// Thumb folded onto the index knuckle.
    Tucked,
    /// Thumb tip beside the index tip, gap given in hand-scale units.
    Pinch(f32),
}

/// Builds plausible synthetic hands, used by the demo detector and tests.
///
/// Geometry is expressed in "units" of roughly one wrist-to-knuckle length.
#[derive(Debug, Clone)]
pub struct HandPoseBuilder {
    wrist: Vec2,
    unit: f32,
    depth: f32,
    extended: [bool; 4],
    thumb: ThumbPose,
}

const MCP_OFFSETS: [Vec2; 4] = [
    Vec2::new(-0.3, -0.95),
    Vec2::new(-0.05, -1.0),
    Vec2::new(0.18, -0.95),
    Vec2::new(0.38, -0.85),
];

impl Default for HandPoseBuilder {
    fn default() -> Self {
        Self::open()
    }
}

impl HandPoseBuilder {
    pub fn open() -> Self {
        Self {
            wrist: Vec2::new(0.5, 0.8),
            unit: 0.12,
            depth: 0.0,
            extended: [true; 4],
            thumb: ThumbPose::Away,
        }
    }

    pub fn fist() -> Self {
        Self {
            extended: [false; 4],
            thumb: ThumbPose::Tucked,
            ..Self::open()
        }
    }

    /// Index out, other fingers curled, thumb cocked.
    pub fn finger_gun() -> Self {
        Self {
            extended: [true, false, false, false],
            ..Self::open()
        }
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.wrist = Vec2::new(x, y);
        self
    }

    pub fn unit(mut self, unit: f32) -> Self {
        self.unit = unit;
        self
    }

    pub fn depth(mut self, z: f32) -> Self {
        self.depth = z;
        self
    }

    pub fn thumb(mut self, thumb: ThumbPose) -> Self {
        self.thumb = thumb;
        self
    }

    pub fn pinch(self, gap: f32) -> Self {
        self.thumb(ThumbPose::Pinch(gap))
    }

    /// Move the whole hand so the index fingertip lands on `(x, y)`.
    pub fn index_tip_at(mut self, x: f32, y: f32) -> Self {
        let offset = self.finger_offsets(0)[2] * self.unit;
        self.wrist = Vec2::new(x, y) - offset;
        self
    }

    /// Wrist-to-index-knuckle distance of the built hand.
    pub fn scale(&self) -> f32 {
        MCP_OFFSETS[0].length() * self.unit
    }

    fn finger_offsets(&self, finger: usize) -> [Vec2; 3] {
        let mcp = MCP_OFFSETS[finger];
        if self.extended[finger] {
            [
                mcp + Vec2::new(0.0, -0.45),
                mcp + Vec2::new(0.0, -0.75),
                mcp + Vec2::new(0.0, -1.0),
            ]
        } else {
            [
                mcp + Vec2::new(0.0, -0.35),
                mcp + Vec2::new(0.0, -0.15),
                mcp + Vec2::new(0.0, 0.3),
            ]
        }
    }

    pub fn build(&self) -> RawHand {
        let mut rel = [Vec2::ZERO; LANDMARK_COUNT];
        rel[THUMB_CMC] = Vec2::new(-0.35, -0.25);
        rel[THUMB_MCP] = Vec2::new(-0.6, -0.45);
        rel[THUMB_IP] = Vec2::new(-0.8, -0.6);
        for (finger, (mcp, pip, tip)) in FINGERS.iter().enumerate() {
            let [p, d, t] = self.finger_offsets(finger);
            rel[*mcp] = MCP_OFFSETS[finger];
            rel[*pip] = p;
            rel[*pip + 1] = d;
            rel[*tip] = t;
        }

        let mut points: Vec<[f32; 3]> = rel
            .iter()
            .map(|r| {
                let p = self.wrist + *r * self.unit;
                [p.x, p.y, self.depth]
            })
            .collect();

        let thumb_tip = match self.thumb {
            ThumbPose::Away => self.wrist + Vec2::new(-1.0, -0.75) * self.unit,
            ThumbPose::Tucked => self.wrist + Vec2::new(-0.35, -0.8) * self.unit,
            ThumbPose::Pinch(gap) => {
                let index_tip = self.wrist + rel[INDEX_TIP] * self.unit;
                index_tip - Vec2::new(gap * self.scale(), 0.0)
            }
        };
        points[THUMB_TIP] = [thumb_tip.x, thumb_tip.y, self.depth];
        RawHand { points }
    }

    pub fn landmarks(&self) -> HandLandmarks {
        // Built hands always carry 21 finite points.
        let mut points = [Vec3::ZERO; LANDMARK_COUNT];
        for (dst, src) in points.iter_mut().zip(self.build().points) {
            *dst = Vec3::from_array(src);
        }
        HandLandmarks { points }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hand_is_rejected() {
        let raw = RawHand {
            points: vec![[0.5, 0.5, 0.0]; 12],
        };
        assert_eq!(
            HandLandmarks::try_from(&raw),
            Err(LandmarkError::TooFewPoints(12))
        );
    }

    #[test]
    fn nan_point_is_rejected() {
        let mut raw = HandPoseBuilder::open().build();
        raw.points[7][1] = f32::NAN;
        assert_eq!(
            HandLandmarks::try_from(&raw),
            Err(LandmarkError::NonFinite(7))
        );
    }

    #[test]
    fn degenerate_scale_is_floored() {
        let raw = RawHand {
            points: vec![[0.5, 0.5, 0.0]; LANDMARK_COUNT],
        };
        let hand = HandLandmarks::try_from(&raw).unwrap();
        assert_eq!(hand.hand_scale(1e-4), 1e-4);
    }

    #[test]
    fn builder_pinch_gap_is_in_hand_scale_units() {
        let hand = HandPoseBuilder::open().pinch(0.2).landmarks();
        let scale = hand.hand_scale(1e-4);
        let gap = hand.point(THUMB_TIP).distance(hand.point(INDEX_TIP));
        assert!((gap / scale - 0.2).abs() < 1e-4);
    }

    #[test]
    fn index_tip_lands_where_asked() {
        let hand = HandPoseBuilder::open().index_tip_at(0.3, 0.4).landmarks();
        let tip = hand.point(INDEX_TIP);
        assert!((tip.x - 0.3).abs() < 1e-5);
        assert!((tip.y - 0.4).abs() < 1e-5);
    }

    #[test]
    fn stable_ordering_follows_previous_wrist() {
        let left = HandPoseBuilder::open().at(0.2, 0.8).landmarks();
        let right = HandPoseBuilder::open().at(0.8, 0.8).landmarks();
        let mut hands = [left, right];
        order_hands(&mut hands, Some(Vec3::new(0.78, 0.8, 0.0)), true);
        assert_eq!(hands[0], right);

        let mut positional = [left, right];
        order_hands(&mut positional, Some(Vec3::new(0.78, 0.8, 0.0)), false);
        assert_eq!(positional[0], left);
    }
}
