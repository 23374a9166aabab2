//! Finger-gun shooting gallery with drifting targets.

use glam::{Vec2, Vec3};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Mode, ModeHandler, ModeStatus, StepFrame};
use crate::actions::{ActionSink, Effect, SoundCue};
use crate::config::{self, Profile};
use crate::gestures::{Cooldown, FrameInput, GestureEvent, GestureSet};
use crate::interaction::{Color, InteractionState, WorldMapping};
use crate::physics::ParticlePool;

const BURST: Color = Color::rgb(0x55, 0xff, 0xee);

/// Lowest target centre above the floor.
const FLOOR_MARGIN: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub position: Vec3,
    pub velocity: Vec3,
}

pub struct Arcade {
    cfg: config::Arcade,
    mapping: WorldMapping,
    targets: Vec<Target>,
    particles: ParticlePool,
    shoot: Cooldown,
    /// Cleared by a shot, set again once the thumb is cocked.
    armed: bool,
    next_spawn_ms: u64,
    score: u32,
    rng: StdRng,
}

impl Arcade {
    pub fn new(cfg: config::Arcade, mapping: WorldMapping, seed: u64, now_ms: u64) -> Self {
        Self {
            shoot: Cooldown::new(cfg.shoot_cooldown_ms),
            next_spawn_ms: now_ms,
            mapping,
            targets: Vec::new(),
            particles: ParticlePool::new(256),
            armed: false,
            score: 0,
            rng: StdRng::seed_from_u64(seed),
            cfg,
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn place_target(&mut self, x: f32, y: f32) {
        self.targets.push(Target {
            position: Vec3::new(x, y, self.cfg.target_depth),
            velocity: Vec3::ZERO,
        });
    }

    /// Aim point: the cursor pushed onto the target plane.
    fn aim(&self, cursor: Vec3) -> Vec3 {
        Vec3::new(cursor.x, cursor.y, self.cfg.target_depth)
    }

    fn in_sights(&self, target: &Target, aim: Vec3) -> bool {
        target.position.truncate().distance(aim.truncate()) < self.cfg.target_radius + self.cfg.aim_radius
    }

    fn bounds(&self) -> (Vec2, Vec2) {
        let half = 0.5 * self.mapping.width - self.cfg.target_radius;
        (
            Vec2::new(-half, FLOOR_MARGIN),
            Vec2::new(half, self.mapping.height - self.cfg.target_radius),
        )
    }

    fn spawn_target(&mut self) {
        let (lo, hi) = self.bounds();
        if lo.x >= hi.x || lo.y >= hi.y {
            return;
        }
        let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
        let position = Vec3::new(
            self.rng.random_range(lo.x..hi.x),
            self.rng.random_range(lo.y..hi.y),
            self.cfg.target_depth,
        );
        let velocity = Vec3::new(angle.cos(), angle.sin(), 0.0) * self.cfg.target_speed;
        self.targets.push(Target { position, velocity });
    }

    fn resolve_shot(&mut self, at: Vec3, sink: &mut dyn ActionSink) {
        sink.sound(SoundCue::Shot, at);
        let before = self.targets.len();
        let mut destroyed = Vec::new();
        let cfg = &self.cfg;
        self.targets.retain(|t| {
            let hit = t.position.truncate().distance(at.truncate()) < cfg.target_radius + cfg.aim_radius;
            if hit {
                destroyed.push(t.position);
            }
            !hit
        });
        if destroyed.is_empty() {
            sink.sound(SoundCue::DryFire, at);
            return;
        }
        debug!("shot destroyed {} of {before} targets", destroyed.len());
        for position in destroyed {
            self.score += self.cfg.score_value;
            sink.sound(SoundCue::TargetPing, position);
            sink.effect(Effect::Particles {
                at: position,
                color: BURST,
                count: self.cfg.burst_particles,
            });
            self.particles.burst(
                &mut self.rng,
                position,
                BURST,
                self.cfg.burst_particles,
                2.5,
                None,
            );
        }
    }

    fn drift(&mut self, dt: f32) {
        let (lo, hi) = self.bounds();
        for t in &mut self.targets {
            t.position += t.velocity * dt;
            if (t.position.x < lo.x && t.velocity.x < 0.0) || (t.position.x > hi.x && t.velocity.x > 0.0) {
                t.velocity.x = -t.velocity.x;
            }
            if (t.position.y < lo.y && t.velocity.y < 0.0) || (t.position.y > hi.y && t.velocity.y > 0.0) {
                t.velocity.y = -t.velocity.y;
            }
        }
    }
}

impl ModeHandler for Arcade {
    fn mode(&self) -> Mode {
        Mode::Arcade
    }

    fn gestures(&self) -> GestureSet {
        GestureSet {
            clap: true,
            ..GestureSet::NONE
        }
    }

    fn classify(
        &mut self,
        input: &FrameInput<'_>,
        state: &mut InteractionState,
        events: &mut Vec<GestureEvent>,
    ) {
        let Some(pose) = input.pose else {
            if state.is_pointing {
                state.is_pointing = false;
                events.push(GestureEvent::PointEnd);
            }
            self.armed = false;
            return;
        };

        if !state.is_pointing && pose.is_finger_gun() {
            state.is_pointing = true;
            self.armed = true;
            events.push(GestureEvent::PointStart);
        } else if state.is_pointing && !pose.is_gun_grip() {
            state.is_pointing = false;
            self.armed = false;
            events.push(GestureEvent::PointEnd);
            return;
        }
        if !state.is_pointing {
            return;
        }

        if pose.thumb_away {
            self.armed = true;
        } else if self.armed
            && pose.thumb_to_index_base < self.cfg.hammer_ratio
            && self.shoot.try_fire(input.now_ms)
        {
            self.armed = false;
            let at = self.aim(state.cursor);
            let hit = self.targets.iter().any(|t| self.in_sights(t, at));
            events.push(GestureEvent::Shoot { at, hit });
        }
    }

    fn step(&mut self, frame: &mut StepFrame<'_>) {
        for event in frame.events {
            if let GestureEvent::Shoot { at, .. } = event {
                self.resolve_shot(*at, frame.sink);
            }
        }
        self.drift(frame.dt);
        if self.targets.len() < self.cfg.max_targets && frame.now_ms >= self.next_spawn_ms {
            self.spawn_target();
            self.next_spawn_ms = frame.now_ms + self.cfg.spawn_interval_ms;
        }
        self.particles.step(frame.dt);
    }

    fn reset(&mut self, now_ms: u64) {
        self.targets.clear();
        self.particles.clear();
        self.next_spawn_ms = now_ms + self.cfg.spawn_interval_ms;
    }

    fn reconfigure(&mut self, profile: &Profile) {
        self.cfg = profile.arcade.clone();
        self.mapping = WorldMapping::new(&profile.world);
        self.shoot = Cooldown::new(self.cfg.shoot_cooldown_ms);
    }

    fn status(&self) -> ModeStatus {
        ModeStatus {
            objects: self.targets.len(),
            particles: self.particles.len(),
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Recorder;
    use crate::config::World;
    use crate::gestures::HandPose;

    fn gun(thumb_to_index_base: f32) -> HandPose {
        HandPose {
            scale: 0.12,
            pinch_ratio: 1.2,
            thumb_to_index_base,
            thumb_away: thumb_to_index_base > 0.5,
            extended: [true, false, false, false],
            curled: [false, true, true, true],
        }
    }

    fn input(now_ms: u64, pose: Option<&HandPose>) -> FrameInput<'_> {
        FrameInput {
            now_ms,
            dt: 0.016,
            primary: None,
            secondary: None,
            tracked: None,
            pose,
            cursor_velocity: Vec3::ZERO,
            palm_velocity: Vec2::ZERO,
        }
    }

    fn arcade() -> Arcade {
        let cfg = config::Arcade {
            max_targets: 0,
            ..config::Arcade::default()
        };
        Arcade::new(cfg, WorldMapping::new(&World::default()), 3, 0)
    }

    #[test]
    fn hammer_drop_fires_once_per_cock() {
        let mut a = arcade();
        a.place_target(0.5, 1.5);
        let mut state = InteractionState {
            cursor: Vec3::new(0.55, 1.5, 0.0),
            ..InteractionState::default()
        };
        let mut events = Vec::new();

        let cocked = gun(0.8);
        let dropped = gun(0.1);
        a.classify(&input(0, Some(&cocked)), &mut state, &mut events);
        assert_eq!(events, vec![GestureEvent::PointStart]);
        assert!(state.is_pointing);

        events.clear();
        a.classify(&input(100, Some(&dropped)), &mut state, &mut events);
        a.classify(&input(400, Some(&dropped)), &mut state, &mut events);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GestureEvent::Shoot { hit: true, .. }));
        assert!(state.is_pointing);

        events.clear();
        a.classify(&input(500, Some(&cocked)), &mut state, &mut events);
        a.classify(&input(600, Some(&dropped)), &mut state, &mut events);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn shot_respects_cooldown() {
        let mut a = arcade();
        let mut state = InteractionState::default();
        let mut events = Vec::new();
        let cocked = gun(0.8);
        let dropped = gun(0.1);
        for (t, pose) in [(0, &cocked), (10, &dropped), (20, &cocked), (30, &dropped)] {
            a.classify(&input(t, Some(pose)), &mut state, &mut events);
        }
        let shots = events
            .iter()
            .filter(|e| matches!(e, GestureEvent::Shoot { .. }))
            .count();
        assert_eq!(shots, 1);
    }

    #[test]
    fn open_hand_ends_pointing() {
        let mut a = arcade();
        let mut state = InteractionState::default();
        let mut events = Vec::new();
        a.classify(&input(0, Some(&gun(0.8))), &mut state, &mut events);
        let open = HandPose {
            extended: [true; 4],
            curled: [false; 4],
            ..gun(0.8)
        };
        a.classify(&input(16, Some(&open)), &mut state, &mut events);
        assert_eq!(events, vec![GestureEvent::PointStart, GestureEvent::PointEnd]);
        assert!(!state.is_pointing);

        a.classify(&input(32, Some(&gun(0.8))), &mut state, &mut events);
        a.classify(&input(48, None), &mut state, &mut events);
        assert_eq!(events.last(), Some(&GestureEvent::PointEnd));
    }

    #[test]
    fn shot_destroys_targets_within_radius() {
        let mut a = arcade();
        a.place_target(0.0, 1.0);
        a.place_target(0.3, 1.0);
        a.place_target(1.5, 2.5);
        let mut sink = Recorder::default();
        let mut state = InteractionState::default();
        let events = [GestureEvent::Shoot {
            at: Vec3::new(0.1, 1.0, -2.0),
            hit: true,
        }];
        a.step(&mut StepFrame {
            now_ms: 0,
            dt: 0.016,
            events: &events,
            state: &mut state,
            sink: &mut sink,
        });
        assert_eq!(a.targets().len(), 1);
        assert_eq!(a.status().score, 2 * a.cfg.score_value);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::TargetPing), 2);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::DryFire), 0);
    }

    #[test]
    fn miss_plays_dry_fire() {
        let mut a = arcade();
        let mut sink = Recorder::default();
        a.resolve_shot(Vec3::new(0.0, 1.0, -2.0), &mut sink);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::DryFire), 1);
        assert_eq!(a.status().score, 0);
    }

    #[test]
    fn targets_spawn_on_a_timer_and_stay_in_bounds() {
        let cfg = config::Arcade::default();
        let mut a = Arcade::new(cfg.clone(), WorldMapping::new(&World::default()), 9, 0);
        let mut sink = Recorder::default();
        let mut state = InteractionState::default();
        for k in 0..600u64 {
            a.step(&mut StepFrame {
                now_ms: k * 16,
                dt: 0.016,
                events: &[],
                state: &mut state,
                sink: &mut sink,
            });
        }
        assert_eq!(a.targets().len(), cfg.max_targets);
        let (lo, hi) = a.bounds();
        for t in a.targets() {
            assert!(t.position.x >= lo.x - 0.05 && t.position.x <= hi.x + 0.05);
            assert!(t.position.y >= lo.y - 0.05 && t.position.y <= hi.y + 0.05);
        }
    }

    #[test]
    fn reset_is_idempotent() {
        let mut a = arcade();
        a.place_target(0.0, 1.0);
        a.reset(10);
        assert!(a.targets().is_empty());
        a.reset(10);
        assert!(a.targets().is_empty());
    }
}
