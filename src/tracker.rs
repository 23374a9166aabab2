//! Adaptive landmark smoothing and velocity estimation for the primary hand.

use glam::{Vec2, Vec3};

use crate::config::Smoothing;
use crate::interaction::WorldMapping;
use crate::landmarks::{HandLandmarks, INDEX_TIP, MIDDLE_TIP, RING_TIP, THUMB_TIP};

/// True when the step from `prev` to `target` must snap instead of blend.
pub fn needs_snap(prev: Vec3, target: Vec3, dt: f32, cfg: &Smoothing) -> bool {
    dt > cfg.max_dt || prev.distance(target) >= cfg.teleport_distance
}

/// Blend factor for a move of `distance` over `dt` seconds.
///
/// Faster motion gets a larger alpha (less smoothing).
pub fn blend_alpha(distance: f32, dt: f32, cfg: &Smoothing) -> f32 {
    let speed = distance / dt.max(cfg.min_dt);
    (cfg.min_alpha + speed * cfg.speed_gain).clamp(cfg.min_alpha, cfg.max_alpha)
}

/// One adaptive exponential smoothing step.
///
/// `None` means there is no previous value (first sighting or after hand
/// loss) and the target is taken as is.
pub fn smooth_point(prev: Option<Vec3>, target: Vec3, dt: f32, cfg: &Smoothing) -> Vec3 {
    let Some(prev) = prev else {
        return target;
    };
    if needs_snap(prev, target, dt, cfg) {
        return target;
    }
    let alpha = blend_alpha(prev.distance(target), dt, cfg);
    prev.lerp(target, alpha)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothedPoint(Option<Vec3>);

impl SmoothedPoint {
    pub fn update(&mut self, target: Vec3, dt: f32, cfg: &Smoothing) -> Vec3 {
        let next = smooth_point(self.0, target, dt, cfg);
        self.0 = Some(next);
        next
    }

    pub fn get(&self) -> Option<Vec3> {
        self.0
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}

/// The smoothed subset of the primary hand, in detector space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedHand {
    pub index_tip: Vec3,
    pub middle_tip: Vec3,
    pub ring_tip: Vec3,
    pub thumb_tip: Vec3,
    pub palm: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct SmoothedLandmarkSet {
    index_tip: SmoothedPoint,
    middle_tip: SmoothedPoint,
    ring_tip: SmoothedPoint,
    thumb_tip: SmoothedPoint,
    palm: SmoothedPoint,
}

impl SmoothedLandmarkSet {
    pub fn update(&mut self, hand: &HandLandmarks, dt: f32, cfg: &Smoothing) -> TrackedHand {
        TrackedHand {
            index_tip: self.index_tip.update(hand.point(INDEX_TIP), dt, cfg),
            middle_tip: self.middle_tip.update(hand.point(MIDDLE_TIP), dt, cfg),
            ring_tip: self.ring_tip.update(hand.point(RING_TIP), dt, cfg),
            thumb_tip: self.thumb_tip.update(hand.point(THUMB_TIP), dt, cfg),
            palm: self.palm.update(hand.palm_center(), dt, cfg),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Finite-difference velocity, itself exponentially smoothed.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityTracker {
    prev: Option<Vec3>,
    velocity: Vec3,
}

impl VelocityTracker {
    /// Feed a new position. A discontinuity (teleport) re-baselines
    /// without producing a velocity spike.
    pub fn update(&mut self, pos: Vec3, dt: f32, continuous: bool, cfg: &Smoothing) -> Vec3 {
        if let (Some(prev), true) = (self.prev, continuous) {
            let raw = (pos - prev) / dt.max(cfg.min_dt);
            self.velocity = self.velocity.lerp(raw, cfg.velocity_alpha);
        }
        self.prev = Some(pos);
        self.velocity
    }

    /// Geometric decay while the hand is missing.
    pub fn decay(&mut self, factor: f32) -> Vec3 {
        self.prev = None;
        self.velocity *= factor;
        if self.velocity.length_squared() < 1e-8 {
            self.velocity = Vec3::ZERO;
        }
        self.velocity
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Smoothing plus world-space cursor velocity and view-space palm velocity.
#[derive(Debug, Clone)]
pub struct HandTracker {
    cfg: Smoothing,
    mapping: WorldMapping,
    points: SmoothedLandmarkSet,
    cursor_velocity: VelocityTracker,
    palm_velocity: VelocityTracker,
    last: Option<TrackedHand>,
}

impl HandTracker {
    pub fn new(cfg: Smoothing, mapping: WorldMapping) -> Self {
        Self {
            cfg,
            mapping,
            points: SmoothedLandmarkSet::default(),
            cursor_velocity: VelocityTracker::default(),
            palm_velocity: VelocityTracker::default(),
            last: None,
        }
    }

    pub fn reconfigure(&mut self, cfg: Smoothing, mapping: WorldMapping) {
        self.cfg = cfg;
        self.mapping = mapping;
    }

    /// Advance one frame. `None` marks a frame without a usable hand.
    pub fn update(&mut self, hand: Option<&HandLandmarks>, dt: f32) -> Option<TrackedHand> {
        let Some(hand) = hand else {
            self.points.clear();
            self.last = None;
            self.cursor_velocity.decay(self.cfg.velocity_decay);
            self.palm_velocity.decay(self.cfg.velocity_decay);
            return None;
        };

        let continuous = self
            .last
            .is_some_and(|prev| !needs_snap(prev.index_tip, hand.point(INDEX_TIP), dt, &self.cfg));
        let tracked = self.points.update(hand, dt, &self.cfg);

        let cursor = self.mapping.to_world(tracked.index_tip);
        self.cursor_velocity
            .update(cursor, dt, continuous, &self.cfg);
        let palm = self.mapping.to_view(tracked.palm).extend(0.0);
        self.palm_velocity.update(palm, dt, continuous, &self.cfg);

        self.last = Some(tracked);
        Some(tracked)
    }

    pub fn cursor_velocity(&self) -> Vec3 {
        self.cursor_velocity.velocity()
    }

    /// Palm velocity in mirrored view units per second.
    pub fn palm_velocity(&self) -> Vec2 {
        self.palm_velocity.velocity().truncate()
    }

    pub fn reset(&mut self) {
        self.points.clear();
        self.cursor_velocity.reset();
        self.palm_velocity.reset();
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Smoothing {
        Smoothing::default()
    }

    fn strictly_between(prev: Vec3, out: Vec3, target: Vec3) -> bool {
        let total = prev.distance(target);
        let a = prev.distance(out);
        let b = out.distance(target);
        a > 0.0 && b > 0.0 && (a + b - total).abs() < 1e-5
    }

    #[test]
    fn sub_teleport_moves_never_overshoot() {
        let cfg = cfg();
        let prev = Vec3::new(0.4, 0.4, 0.0);
        for step in 1..40 {
            let d = cfg.teleport_distance * step as f32 / 40.0;
            for dir in [Vec3::X, Vec3::Y, Vec3::new(0.6, -0.8, 0.0), Vec3::Z] {
                let target = prev + dir * d;
                for dt in [0.001, 0.008, 0.016, 0.033, 0.1, 0.25] {
                    let out = smooth_point(Some(prev), target, dt, &cfg);
                    assert!(
                        strictly_between(prev, out, target),
                        "d={d} dt={dt} out={out:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn teleport_snaps_exactly() {
        let cfg = cfg();
        let prev = Vec3::new(0.1, 0.1, 0.0);
        let at_threshold = prev + Vec3::X * cfg.teleport_distance;
        assert_eq!(smooth_point(Some(prev), at_threshold, 0.016, &cfg), at_threshold);
        let far = Vec3::new(0.9, 0.9, 0.0);
        assert_eq!(smooth_point(Some(prev), far, 0.016, &cfg), far);
    }

    #[test]
    fn long_gap_snaps_instead_of_extrapolating() {
        let cfg = cfg();
        let prev = Vec3::new(0.5, 0.5, 0.0);
        let target = Vec3::new(0.52, 0.5, 0.0);
        assert_eq!(smooth_point(Some(prev), target, cfg.max_dt + 0.5, &cfg), target);
    }

    #[test]
    fn zero_dt_is_floored() {
        let cfg = cfg();
        let prev = Vec3::new(0.5, 0.5, 0.0);
        let target = Vec3::new(0.51, 0.5, 0.0);
        let out = smooth_point(Some(prev), target, 0.0, &cfg);
        assert!(out.is_finite());
        assert!(strictly_between(prev, out, target));
    }

    #[test]
    fn faster_motion_is_smoothed_less() {
        let cfg = cfg();
        let slow = blend_alpha(0.001, 0.016, &cfg);
        let fast = blend_alpha(0.1, 0.016, &cfg);
        assert!(fast > slow);
        assert!(slow >= cfg.min_alpha && fast <= cfg.max_alpha);
    }

    #[test]
    fn first_sighting_is_taken_verbatim() {
        let target = Vec3::new(0.3, 0.2, -0.1);
        assert_eq!(smooth_point(None, target, 0.016, &cfg()), target);
    }

    #[test]
    fn velocity_decays_monotonically_to_zero() {
        let cfg = cfg();
        let mut v = VelocityTracker::default();
        let mut pos = Vec3::ZERO;
        for _ in 0..10 {
            pos += Vec3::new(0.05, 0.02, 0.0);
            v.update(pos, 0.016, true, &cfg);
        }
        let mut last = v.velocity().length();
        assert!(last > 0.0);
        for _ in 0..200 {
            let now = v.decay(cfg.velocity_decay).length();
            assert!(now <= last);
            last = now;
        }
        assert_eq!(last, 0.0);
    }

    #[test]
    fn discontinuity_does_not_spike_velocity() {
        let cfg = cfg();
        let mut v = VelocityTracker::default();
        v.update(Vec3::ZERO, 0.016, true, &cfg);
        let out = v.update(Vec3::new(3.0, 0.0, 0.0), 0.016, false, &cfg);
        assert_eq!(out, Vec3::ZERO);
    }

    #[test]
    fn hand_loss_clears_points_and_decays_velocity() {
        use crate::config::World;
        use crate::landmarks::HandPoseBuilder;

        let mut tracker = HandTracker::new(cfg(), WorldMapping::new(&World::default()));
        for i in 0..10 {
            let hand = HandPoseBuilder::open()
                .at(0.4 + i as f32 * 0.01, 0.8)
                .landmarks();
            tracker.update(Some(&hand), 0.016);
        }
        let moving = tracker.cursor_velocity().length();
        assert!(moving > 0.0);
        assert!(tracker.update(None, 0.016).is_none());
        assert!(tracker.cursor_velocity().length() < moving);

        let far = HandPoseBuilder::open().at(0.9, 0.3).landmarks();
        let tracked = tracker.update(Some(&far), 0.016).unwrap();
        assert_eq!(tracked.index_tip, far.point(INDEX_TIP));
    }
}
