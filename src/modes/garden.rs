//! Grab, throw and plant flowers.

use glam::Vec3;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Mode, ModeHandler, ModeStatus, StepFrame};
use crate::actions::{Effect, SoundCue};
use crate::config::{self, Profile};
use crate::gestures::{FrameInput, GestureEvent, GestureSet, PinchRole};
use crate::interaction::{Color, InteractionState};
use crate::physics::{self, GRAVITY_DIR, ParticlePool};

const PETAL: Color = Color::rgb(0xff, 0x88, 0xcc);
const SOIL: Color = Color::rgb(0x8b, 0x5a, 0x2b);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowerState {
    Resting,
    Held,
    Flying,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flower {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: f32,
    pub angular_velocity: f32,
    pub mass: f32,
    /// Heavier flowers get less drag and keep their momentum.
    pub drag: f32,
    /// Proportional to 1/sqrt(mass): lighter flowers bounce higher.
    pub restitution: f32,
    pub state: FlowerState,
}

impl Flower {
    pub fn new(position: Vec3, mass: f32, cfg: &config::Garden) -> Self {
        let state = if position.y > cfg.flower_radius + 1e-3 {
            FlowerState::Flying
        } else {
            FlowerState::Resting
        };
        Self {
            position,
            velocity: Vec3::ZERO,
            rotation: 0.0,
            angular_velocity: 0.0,
            mass,
            drag: cfg.base_drag / mass,
            restitution: (cfg.base_restitution / mass.sqrt()).min(0.95),
            state,
        }
    }

    /// Restitution for an impact at `speed`; harder hits lose more.
    pub fn effective_restitution(&self, speed: f32, impact_damping: f32) -> f32 {
        self.restitution / (1.0 + speed * impact_damping)
    }
}

struct Impact {
    at: Vec3,
    speed: f32,
}

pub struct Garden {
    cfg: config::Garden,
    flowers: Vec<Flower>,
    particles: ParticlePool,
    rng: StdRng,
}

impl Garden {
    pub fn new(cfg: config::Garden, seed: u64) -> Self {
        Self {
            cfg,
            flowers: Vec::new(),
            particles: ParticlePool::new(256),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn flowers(&self) -> &[Flower] {
        &self.flowers
    }

    /// Spawn a flower unless the population cap is reached.
    pub fn spawn(&mut self, position: Vec3, mass: f32) -> Option<usize> {
        if self.flowers.len() >= self.cfg.max_flowers {
            return None;
        }
        let mass = mass.clamp(self.cfg.min_mass, self.cfg.max_mass);
        self.flowers.push(Flower::new(position, mass, &self.cfg));
        Some(self.flowers.len() - 1)
    }

    fn random_mass(&mut self) -> f32 {
        if self.cfg.min_mass < self.cfg.max_mass {
            self.rng.random_range(self.cfg.min_mass..self.cfg.max_mass)
        } else {
            self.cfg.min_mass
        }
    }

    fn held_index(&self) -> Option<usize> {
        self.flowers.iter().position(|f| f.state == FlowerState::Held)
    }

    fn grab_nearest(&mut self, cursor: Vec3) {
        let nearest = self
            .flowers
            .iter()
            .enumerate()
            .map(|(i, f)| (i, f.position.distance(cursor)))
            .filter(|(_, d)| *d <= self.cfg.grab_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((i, _)) = nearest {
            self.flowers[i].state = FlowerState::Held;
        }
    }

    fn throw_held(&mut self, hand_velocity: Vec3) {
        let Some(i) = self.held_index() else {
            return;
        };
        let f = &mut self.flowers[i];
        let mut v = hand_velocity * self.cfg.throw_power;
        v.y = v.y.max(self.cfg.min_throw_up);
        f.velocity = v;
        f.angular_velocity = -2.0 * v.x;
        f.state = FlowerState::Flying;
    }

    fn plant(&mut self, at: Vec3, sink: &mut dyn crate::actions::ActionSink) {
        let ground = Vec3::new(at.x, self.cfg.flower_radius, at.z);
        let mass = self.random_mass();
        if self.spawn(ground, mass).is_some() {
            sink.sound(SoundCue::PlantChime, ground);
            sink.effect(Effect::Ripple {
                at: ground,
                color: PETAL,
                intensity: 0.5,
            });
        } else {
            debug!("garden full, plant ignored");
        }
    }

    fn bloom(&mut self, impact: &Impact, sink: &mut dyn crate::actions::ActionSink) {
        let mut spawned = 0;
        for _ in 0..self.cfg.bloom_count {
            let angle = self.rng.random_range(0.0..std::f32::consts::TAU);
            let r = self.rng.random_range(0.3..1.0) * self.cfg.bloom_radius;
            let at = Vec3::new(
                impact.at.x + r * angle.cos(),
                self.cfg.flower_radius,
                impact.at.z + r * angle.sin(),
            );
            let mass = self.random_mass();
            if self.spawn(at, mass).is_none() {
                break;
            }
            spawned += 1;
        }
        if spawned > 0 {
            sink.sound(SoundCue::Bloom, impact.at);
            sink.effect(Effect::Ripple {
                at: impact.at,
                color: PETAL,
                intensity: impact.speed / self.cfg.bloom_speed,
            });
            self.particles
                .burst(&mut self.rng, impact.at, PETAL, 12, 2.5, Some(self.cfg.gravity));
        }
    }

    /// A swipe scatters a bloom on the ground below the cursor.
    fn swipe_bloom(&mut self, cursor: Vec3, sink: &mut dyn crate::actions::ActionSink) {
        let impact = Impact {
            at: Vec3::new(cursor.x, self.cfg.flower_radius, cursor.z),
            speed: self.cfg.bloom_speed,
        };
        self.bloom(&impact, sink);
    }

    fn integrate(&mut self, cursor: Vec3, dt: f32) -> Vec<Impact> {
        let cfg = &self.cfg;
        let mut impacts = Vec::new();
        for f in &mut self.flowers {
            match f.state {
                FlowerState::Held => {
                    let k = cfg.grab_stiffness / f.mass;
                    let a = physics::spring_accel(f.position, f.velocity, cursor, k);
                    physics::integrate(&mut f.position, &mut f.velocity, a, dt);
                }
                FlowerState::Flying => {
                    physics::integrate(
                        &mut f.position,
                        &mut f.velocity,
                        GRAVITY_DIR * cfg.gravity,
                        dt,
                    );
                    f.velocity *= physics::drag_factor(f.drag, dt);
                    f.rotation += f.angular_velocity * dt;

                    if f.position.y <= cfg.flower_radius && f.velocity.y < 0.0 {
                        f.position.y = cfg.flower_radius;
                        let speed = -f.velocity.y;
                        if speed > cfg.settle_speed {
                            let e = f.effective_restitution(speed, cfg.impact_damping);
                            f.velocity.y = physics::bounce(f.velocity.y, e);
                            f.angular_velocity *= 0.5;
                            impacts.push(Impact {
                                at: f.position,
                                speed,
                            });
                        } else {
                            f.velocity.y = 0.0;
                            f.state = FlowerState::Resting;
                        }
                    }
                }
                FlowerState::Resting => {
                    let friction = physics::drag_factor(cfg.ground_friction, dt);
                    f.velocity.x *= friction;
                    f.velocity.z *= friction;
                    f.velocity.y = 0.0;
                    f.angular_velocity *= friction;
                    f.position += f.velocity * dt;
                    f.position.y = cfg.flower_radius;
                    f.rotation += f.angular_velocity * dt;
                }
            }
        }
        impacts
    }

    fn cull(&mut self) {
        let limit = self.cfg.cull_distance;
        self.flowers.retain(|f| {
            f.state == FlowerState::Held
                || (f.position.x.abs() <= limit
                    && f.position.z.abs() <= limit
                    && f.position.y >= -limit)
        });
    }
}

impl ModeHandler for Garden {
    fn mode(&self) -> Mode {
        Mode::Garden
    }

    fn gestures(&self) -> GestureSet {
        GestureSet {
            pinch: PinchRole::Grab,
            plant: true,
            clap: true,
            swipe: true,
            save: false,
        }
    }

    fn classify(&mut self, _: &FrameInput<'_>, _: &mut InteractionState, _: &mut Vec<GestureEvent>) {}

    fn step(&mut self, frame: &mut StepFrame<'_>) {
        for event in frame.events {
            match event {
                GestureEvent::GrabStart => self.grab_nearest(frame.state.cursor),
                GestureEvent::Release => self.throw_held(frame.state.velocity),
                GestureEvent::Plant { at } => self.plant(*at, frame.sink),
                GestureEvent::Swipe { direction } => {
                    debug!("swipe {direction:?}: bloom under the cursor");
                    self.swipe_bloom(frame.state.cursor, frame.sink);
                }
                _ => {}
            }
        }
        if !frame.state.is_grabbing && self.held_index().is_some() {
            self.throw_held(frame.state.velocity);
        }

        for impact in self.integrate(frame.state.cursor, frame.dt) {
            frame.sink.effect(Effect::Dust {
                at: impact.at,
                intensity: impact.speed,
            });
            if impact.speed >= self.cfg.bloom_speed {
                self.bloom(&impact, frame.sink);
            } else {
                self.particles
                    .burst(&mut self.rng, impact.at, SOIL, 4, 0.8, Some(self.cfg.gravity));
            }
        }
        self.cull();
        self.particles.step(frame.dt);
    }

    fn reset(&mut self, _now_ms: u64) {
        self.flowers.clear();
        self.particles.clear();
    }

    fn reconfigure(&mut self, profile: &Profile) {
        self.cfg = profile.garden.clone();
    }

    fn status(&self) -> ModeStatus {
        ModeStatus {
            objects: self.flowers.len(),
            particles: self.particles.len(),
            score: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Recorder;
    use crate::gestures::SwipeDirection;

    const DT: f32 = 1.0 / 60.0;

    fn step(garden: &mut Garden, state: &mut InteractionState, events: &[GestureEvent], sink: &mut Recorder) {
        let mut frame = StepFrame {
            now_ms: 0,
            dt: DT,
            events,
            state,
            sink,
        };
        garden.step(&mut frame);
    }

    /// Drop one flower and return (impact speed, peak height after first bounce).
    fn drop_and_measure(mass: f32) -> (f32, f32) {
        let mut garden = Garden::new(config::Garden::default(), 1);
        garden.spawn(Vec3::new(0.0, 1.0, 0.0), mass).unwrap();
        let mut state = InteractionState::default();
        let mut sink = Recorder::default();
        let mut impact = None;
        let mut peak = 0.0f32;
        for _ in 0..240 {
            let before = garden.flowers()[0].velocity.y;
            step(&mut garden, &mut state, &[], &mut sink);
            let f = &garden.flowers()[0];
            if impact.is_none() && before < 0.0 && f.velocity.y > 0.0 {
                impact = Some(-before);
            }
            if impact.is_some() {
                if f.velocity.y < 0.0 && peak > 0.0 {
                    break;
                }
                peak = peak.max(f.position.y);
            }
        }
        (impact.unwrap(), peak)
    }

    #[test]
    fn lighter_flowers_bounce_relatively_higher() {
        let cfg = config::Garden::default();
        let light = Flower::new(Vec3::Y, 0.5, &cfg);
        let heavy = Flower::new(Vec3::Y, 2.0, &cfg);
        assert!(light.restitution > heavy.restitution);
        assert!((light.restitution / heavy.restitution - 2.0).abs() < 1e-4);
        assert!(light.drag > heavy.drag);

        let (light_impact, light_peak) = drop_and_measure(0.5);
        let (heavy_impact, heavy_peak) = drop_and_measure(2.0);
        assert!(light_peak / light_impact > heavy_peak / heavy_impact);
    }

    #[test]
    fn held_flower_follows_cursor_and_heavier_lags() {
        let mut garden = Garden::new(config::Garden::default(), 1);
        garden.spawn(Vec3::new(0.0, 0.1, 0.0), 0.5).unwrap();
        garden.spawn(Vec3::new(0.05, 0.1, 0.0), 2.0).unwrap();
        garden.flowers[0].state = FlowerState::Held;
        garden.flowers[1].state = FlowerState::Held;

        let mut state = InteractionState {
            cursor: Vec3::new(0.5, 1.0, 0.0),
            is_grabbing: true,
            ..InteractionState::default()
        };
        let mut sink = Recorder::default();
        for _ in 0..6 {
            step(&mut garden, &mut state, &[], &mut sink);
        }
        let light = garden.flowers[0].position.distance(state.cursor);
        let heavy = garden.flowers[1].position.distance(state.cursor);
        assert!(light < heavy);

        for _ in 0..120 {
            step(&mut garden, &mut state, &[], &mut sink);
        }
        assert!(garden.flowers[0].position.distance(state.cursor) < 0.02);
    }

    #[test]
    fn release_throws_with_hand_velocity_and_minimum_lift() {
        let cfg = config::Garden::default();
        let mut garden = Garden::new(cfg.clone(), 1);
        garden.spawn(Vec3::new(0.0, 0.1, 0.0), 1.0).unwrap();
        let mut state = InteractionState {
            cursor: Vec3::new(0.0, 0.1, 0.0),
            is_grabbing: true,
            ..InteractionState::default()
        };
        let mut sink = Recorder::default();
        step(&mut garden, &mut state, &[GestureEvent::GrabStart], &mut sink);
        assert_eq!(garden.flowers[0].state, FlowerState::Held);

        garden.throw_held(Vec3::new(2.0, 0.0, -1.0));
        let f = &garden.flowers[0];
        assert_eq!(f.state, FlowerState::Flying);
        assert_eq!(f.velocity.x, 2.0 * cfg.throw_power);
        assert_eq!(f.velocity.z, -cfg.throw_power);
        assert_eq!(f.velocity.y, cfg.min_throw_up);
    }

    #[test]
    fn grab_ignores_flowers_out_of_reach() {
        let mut garden = Garden::new(config::Garden::default(), 1);
        garden.spawn(Vec3::new(1.5, 0.1, 0.0), 1.0).unwrap();
        garden.grab_nearest(Vec3::new(-1.0, 0.1, 0.0));
        assert_eq!(garden.flowers[0].state, FlowerState::Resting);
    }

    #[test]
    fn hard_landing_blooms_up_to_the_cap() {
        let cfg = config::Garden {
            max_flowers: 2,
            ..config::Garden::default()
        };
        let mut garden = Garden::new(cfg, 3);
        let i = garden.spawn(Vec3::new(0.0, 0.5, 0.0), 2.0).unwrap();
        garden.flowers[i].velocity = Vec3::new(0.0, -8.0, 0.0);
        let mut state = InteractionState::default();
        let mut sink = Recorder::default();
        for _ in 0..10 {
            step(&mut garden, &mut state, &[], &mut sink);
        }
        assert_eq!(garden.flowers().len(), 2);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::Bloom), 1);
    }

    #[test]
    fn swipe_blooms_under_the_cursor_until_full() {
        let cfg = config::Garden {
            bloom_count: 2,
            max_flowers: 3,
            ..config::Garden::default()
        };
        let mut garden = Garden::new(cfg, 5);
        let mut state = InteractionState {
            cursor: Vec3::new(1.0, 1.5, -0.5),
            ..InteractionState::default()
        };
        let mut sink = Recorder::default();
        let swipe = GestureEvent::Swipe {
            direction: SwipeDirection::Right,
        };

        step(&mut garden, &mut state, &[swipe.clone()], &mut sink);
        assert_eq!(garden.flowers().len(), 2);
        for f in garden.flowers() {
            assert_eq!(f.state, FlowerState::Resting);
            assert_eq!(f.position.y, garden.cfg.flower_radius);
            assert!(f.position.distance(Vec3::new(1.0, 0.1, -0.5)) <= garden.cfg.bloom_radius + 1e-3);
        }
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::Bloom), 1);

        step(&mut garden, &mut state, &[swipe.clone()], &mut sink);
        assert_eq!(garden.flowers().len(), 3);
        step(&mut garden, &mut state, &[swipe], &mut sink);
        assert_eq!(garden.flowers().len(), 3);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::Bloom), 2);
    }

    #[test]
    fn plant_spawns_on_the_ground() {
        let mut garden = Garden::new(config::Garden::default(), 1);
        let mut state = InteractionState::default();
        let mut sink = Recorder::default();
        let plant = GestureEvent::Plant {
            at: Vec3::new(0.3, 1.7, -0.2),
        };
        step(&mut garden, &mut state, &[plant], &mut sink);
        let f = &garden.flowers()[0];
        assert_eq!(f.state, FlowerState::Resting);
        assert_eq!(f.position.y, garden.cfg.flower_radius);
        assert_eq!(sink.count_sounds(|c| *c == SoundCue::PlantChime), 1);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut garden = Garden::new(config::Garden::default(), 1);
        garden.spawn(Vec3::new(0.0, 0.1, 0.0), 1.0).unwrap();
        garden.reset(0);
        assert!(garden.flowers().is_empty());
        garden.reset(0);
        assert!(garden.flowers().is_empty());
    }
}
