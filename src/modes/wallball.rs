//! Slap or throw a ball at targets on the back wall.

use glam::{Vec2, Vec3};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Mode, ModeHandler, ModeStatus, StepFrame};
use crate::actions::{ActionSink, Effect, SoundCue};
use crate::config::{self, Profile};
use crate::gestures::{Cooldown, FrameInput, GestureEvent, GestureSet, PinchRole};
use crate::interaction::{Color, InteractionState};
use crate::physics::{self, GRAVITY_DIR, ParticlePool};

const FLASH: Color = Color::rgb(0xff, 0xee, 0x88);
const TARGET: Color = Color::rgb(0xff, 0x44, 0x44);

/// Below this speed a flying ball counts as idle.
const IDLE_SPEED: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallState {
    /// Parked at the rest position, no gravity.
    Resting,
    Held,
    Flying,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub position: Vec3,
    pub velocity: Vec3,
    pub state: BallState,
}

/// Circle painted on the back wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallTarget {
    pub center: Vec2,
}

pub struct WallBall {
    cfg: config::WallBall,
    ball: Ball,
    targets: Vec<WallTarget>,
    particles: ParticlePool,
    slap: Cooldown,
    next_spawn_ms: u64,
    last_active_ms: u64,
    score: u32,
    rng: StdRng,
}

impl WallBall {
    pub fn new(cfg: config::WallBall, seed: u64, now_ms: u64) -> Self {
        let mut wb = Self {
            ball: Ball {
                position: Vec3::from(cfg.rest_position),
                velocity: Vec3::ZERO,
                state: BallState::Resting,
            },
            targets: Vec::new(),
            particles: ParticlePool::new(192),
            slap: Cooldown::new(cfg.slap_cooldown_ms),
            next_spawn_ms: now_ms,
            last_active_ms: now_ms,
            score: 0,
            rng: StdRng::seed_from_u64(seed),
            cfg,
        };
        while wb.targets.len() < wb.cfg.max_targets {
            wb.spawn_target();
        }
        wb
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn targets(&self) -> &[WallTarget] {
        &self.targets
    }

    pub fn place_target(&mut self, center: Vec2) {
        self.targets.push(WallTarget { center });
    }

    fn spawn_target(&mut self) {
        let r = self.cfg.target_radius;
        let hw = (self.cfg.room_half_width - r).max(0.0);
        let top = (self.cfg.ceiling - r).max(r + 0.3);
        let center = Vec2::new(
            if hw > 0.0 {
                self.rng.random_range(-hw..hw)
            } else {
                0.0
            },
            self.rng.random_range(r + 0.3..=top),
        );
        self.targets.push(WallTarget { center });
    }

    fn return_to_rest(&mut self, now_ms: u64) {
        self.ball.position = Vec3::from(self.cfg.rest_position);
        self.ball.velocity = Vec3::ZERO;
        self.ball.state = BallState::Resting;
        self.last_active_ms = now_ms;
    }

    fn handle_hand(&mut self, frame: &mut StepFrame<'_>) -> bool {
        let state = &*frame.state;
        let mut released = false;
        for event in frame.events {
            if *event == GestureEvent::Release && self.ball.state == BallState::Held {
                self.ball.velocity = state.velocity * self.cfg.throw_force;
                self.ball.state = BallState::Flying;
                released = true;
                debug!("ball thrown at {:?}", self.ball.velocity);
            }
        }
        if released {
            self.last_active_ms = frame.now_ms;
            return true;
        }

        let near = state.is_hovering
            && state.cursor.distance(self.ball.position) <= self.cfg.grab_range;
        if state.is_grabbing && near && self.ball.state != BallState::Held {
            self.ball.state = BallState::Held;
        }
        if self.ball.state == BallState::Held {
            if state.is_grabbing {
                self.ball.position = state.cursor;
                self.ball.velocity = Vec3::ZERO;
            } else {
                self.ball.state = BallState::Flying;
                self.ball.velocity = state.velocity * self.cfg.throw_force;
                released = true;
            }
            self.last_active_ms = frame.now_ms;
            return released;
        }

        if state.is_hovering
            && !state.is_grabbing
            && state.cursor.distance(self.ball.position) <= self.cfg.slap_radius
            && state.velocity.length() > self.cfg.slap_speed
            && self.slap.try_fire(frame.now_ms)
        {
            self.ball.velocity = state.velocity * self.cfg.slap_power;
            self.ball.state = BallState::Flying;
            released = true;
        }
        released
    }

    fn fly(&mut self, dt: f32, now_ms: u64, sink: &mut dyn ActionSink) {
        let cfg = &self.cfg;
        let ball = &mut self.ball;
        physics::integrate(
            &mut ball.position,
            &mut ball.velocity,
            GRAVITY_DIR * cfg.gravity,
            dt,
        );
        ball.velocity *= physics::drag_factor(cfg.drag, dt);

        let r = cfg.ball_radius;
        if ball.position.y < r && ball.velocity.y < 0.0 {
            ball.position.y = r;
            ball.velocity.y = physics::bounce(ball.velocity.y, cfg.floor_restitution);
        }
        if ball.position.y > cfg.ceiling - r && ball.velocity.y > 0.0 {
            ball.position.y = cfg.ceiling - r;
            ball.velocity.y = physics::bounce(ball.velocity.y, cfg.wall_restitution);
        }
        let side = cfg.room_half_width - r;
        if ball.position.x.abs() > side && ball.position.x * ball.velocity.x > 0.0 {
            ball.position.x = side.copysign(ball.position.x);
            ball.velocity.x = physics::bounce(ball.velocity.x, cfg.wall_restitution);
        }

        let wall = cfg.back_wall + r;
        let mut wall_hit = None;
        if ball.position.z < wall && ball.velocity.z < 0.0 {
            ball.position.z = wall;
            ball.velocity.z = physics::bounce(ball.velocity.z, cfg.wall_restitution);
            wall_hit = Some(ball.position);
        }
        if ball.velocity.length() > IDLE_SPEED {
            self.last_active_ms = now_ms;
        }

        if let Some(at) = wall_hit {
            self.wall_impact(at, sink);
        }

        if self.ball.position.z > self.cfg.front_limit {
            debug!("ball left the room");
            self.return_to_rest(now_ms);
        } else if now_ms.saturating_sub(self.last_active_ms) >= self.cfg.idle_reset_ms {
            debug!("ball idle, returning to rest");
            self.return_to_rest(now_ms);
        }
    }

    fn wall_impact(&mut self, at: Vec3, sink: &mut dyn ActionSink) {
        let spot = at.truncate();
        let hit = self
            .targets
            .iter()
            .position(|t| t.center.distance(spot) <= self.cfg.target_radius);
        match hit {
            Some(i) => {
                let target = self.targets.swap_remove(i);
                self.score += self.cfg.score_value;
                let center = target.center.extend(at.z);
                sink.sound(SoundCue::TargetPing, center);
                sink.effect(Effect::ImpactFlash { at: center, color: FLASH });
                self.particles
                    .burst(&mut self.rng, center, TARGET, 20, 3.0, Some(self.cfg.gravity));
                self.spawn_target();
            }
            None => {
                sink.sound(SoundCue::WallThud, at);
                sink.effect(Effect::Dust {
                    at,
                    intensity: self.ball.velocity.z.abs(),
                });
            }
        }
    }
}

impl ModeHandler for WallBall {
    fn mode(&self) -> Mode {
        Mode::WallBall
    }

    fn gestures(&self) -> GestureSet {
        GestureSet {
            pinch: PinchRole::Grab,
            clap: true,
            ..GestureSet::NONE
        }
    }

    fn classify(&mut self, _: &FrameInput<'_>, _: &mut InteractionState, _: &mut Vec<GestureEvent>) {}

    fn step(&mut self, frame: &mut StepFrame<'_>) {
        let launched = self.handle_hand(frame);
        if self.ball.state == BallState::Flying && !launched {
            self.fly(frame.dt, frame.now_ms, frame.sink);
        }

        if self.targets.len() < self.cfg.max_targets && frame.now_ms >= self.next_spawn_ms {
            self.spawn_target();
            self.next_spawn_ms = frame.now_ms + self.cfg.spawn_interval_ms;
        }
        self.particles.step(frame.dt);
    }

    fn reset(&mut self, now_ms: u64) {
        self.targets.clear();
        self.particles.clear();
        self.return_to_rest(now_ms);
        self.next_spawn_ms = now_ms + self.cfg.spawn_interval_ms;
    }

    fn reconfigure(&mut self, profile: &Profile) {
        self.cfg = profile.wallball.clone();
        self.slap = Cooldown::new(self.cfg.slap_cooldown_ms);
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

    const DT: f32 = 1.0 / 60.0;

    fn empty_court() -> WallBall {
        let cfg = config::WallBall {
            max_targets: 0,
            ..config::WallBall::default()
        };
        WallBall::new(cfg, 5, 0)
    }

    fn step(wb: &mut WallBall, now_ms: u64, state: &mut InteractionState, events: &[GestureEvent], sink: &mut Recorder) {
        wb.step(&mut StepFrame {
            now_ms,
            dt: DT,
            events,
            state,
            sink,
        });
    }

    #[test]
    fn grabbed_ball_tracks_cursor_and_throws_with_hand_velocity() {
        let mut wb = empty_court();
        assert_eq!(wb.ball().position, Vec3::new(0.0, 1.0, 0.0));
        let mut sink = Recorder::default();
        let mut state = InteractionState {
            cursor: Vec3::new(0.2, 1.1, 0.0),
            is_hovering: true,
            is_grabbing: true,
            ..InteractionState::default()
        };
        step(&mut wb, 0, &mut state, &[GestureEvent::GrabStart], &mut sink);
        assert_eq!(wb.ball().state, BallState::Held);
        assert_eq!(wb.ball().position, state.cursor);

        for (i, x) in [0.3, 0.4, 0.5].into_iter().enumerate() {
            state.cursor = Vec3::new(x, 1.2, -0.1);
            step(&mut wb, 16 * (i as u64 + 1), &mut state, &[], &mut sink);
            assert_eq!(wb.ball().position, state.cursor);
        }

        let hand = Vec3::new(1.0, 2.0, -3.0);
        state.is_grabbing = false;
        state.velocity = hand;
        step(&mut wb, 64, &mut state, &[GestureEvent::Release], &mut sink);
        assert_eq!(wb.ball().state, BallState::Flying);
        assert_eq!(wb.ball().velocity, hand * wb.cfg.throw_force);

        state.is_hovering = false;
        let mut vy = wb.ball().velocity.y;
        for k in 0..5u64 {
            step(&mut wb, 80 + 16 * k, &mut state, &[], &mut sink);
            assert!(wb.ball().velocity.y < vy);
            vy = wb.ball().velocity.y;
        }
    }

    #[test]
    fn pinch_out_of_range_does_not_grab() {
        let mut wb = empty_court();
        let mut sink = Recorder::default();
        let mut state = InteractionState {
            cursor: Vec3::new(1.5, 1.0, 0.0),
            is_hovering: true,
            is_grabbing: true,
            ..InteractionState::default()
        };
        step(&mut wb, 0, &mut state, &[GestureEvent::GrabStart], &mut sink);
        assert_eq!(wb.ball().state, BallState::Resting);
    }

    #[test]
    fn fast_hand_slaps_the_ball() {
        let mut wb = empty_court();
        let mut sink = Recorder::default();
        let mut state = InteractionState {
            cursor: Vec3::new(0.1, 1.0, 0.0),
            is_hovering: true,
            velocity: Vec3::new(0.0, 0.5, -4.0),
            ..InteractionState::default()
        };
        step(&mut wb, 0, &mut state, &[], &mut sink);
        assert_eq!(wb.ball().state, BallState::Flying);
        assert_eq!(wb.ball().velocity, state.velocity * wb.cfg.slap_power);
    }

    #[test]
    fn target_hit_scores_and_respawns() {
        let mut wb = empty_court();
        wb.cfg.max_targets = 1;
        wb.place_target(Vec2::new(0.0, 1.0));
        wb.ball = Ball {
            position: Vec3::new(0.0, 1.0, wb.cfg.back_wall + 0.2),
            velocity: Vec3::new(0.0, 0.0, -8.0),
            state: BallState::Flying,
        };
        let mut sink = Recorder::default();
        let mut state = InteractionState::default();
        step(&mut wb, 10, &mut state, &[], &mut sink);

        assert_eq!(wb.status().score, wb.cfg.score_value);
        assert_eq!(wb.targets().len(), 1);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::TargetPing), 1);
        assert!(wb.ball().velocity.z > 0.0);
    }

    #[test]
    fn wall_miss_is_a_dead_bounce() {
        let mut wb = empty_court();
        wb.ball = Ball {
            position: Vec3::new(1.5, 3.0, wb.cfg.back_wall + 0.2),
            velocity: Vec3::new(0.0, 0.0, -8.0),
            state: BallState::Flying,
        };
        let mut sink = Recorder::default();
        let mut state = InteractionState::default();
        step(&mut wb, 10, &mut state, &[], &mut sink);
        assert_eq!(wb.status().score, 0);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::WallThud), 1);
    }

    #[test]
    fn ball_leaving_the_room_returns_to_rest() {
        let mut wb = empty_court();
        wb.ball = Ball {
            position: Vec3::new(0.0, 1.5, wb.cfg.front_limit - 0.01),
            velocity: Vec3::new(0.0, 0.0, 5.0),
            state: BallState::Flying,
        };
        let mut sink = Recorder::default();
        let mut state = InteractionState::default();
        step(&mut wb, 10, &mut state, &[], &mut sink);
        assert_eq!(wb.ball().state, BallState::Resting);
        assert_eq!(wb.ball().position, Vec3::from(wb.cfg.rest_position));
    }

    #[test]
    fn reset_twice_leaves_no_targets() {
        let mut wb = WallBall::new(config::WallBall::default(), 1, 0);
        assert_eq!(wb.status().objects, 3);
        wb.reset(100);
        assert_eq!(wb.status().objects, 0);
        wb.reset(100);
        assert_eq!(wb.status().objects, 0);
        assert_eq!(wb.ball().state, BallState::Resting);
    }
}
