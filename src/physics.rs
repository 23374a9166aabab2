//! Integration helpers and the particle pool shared by the modes.
//!
//! All stepping is semi-implicit Euler: velocity first, then position.

use glam::Vec3;
use rand::Rng;

use crate::interaction::Color;

pub const GRAVITY_DIR: Vec3 = Vec3::NEG_Y;

/// v += a*dt; p += v*dt.
pub fn integrate(position: &mut Vec3, velocity: &mut Vec3, accel: Vec3, dt: f32) {
    *velocity += accel * dt;
    *position += *velocity * dt;
}

/// Linear drag as a per-step velocity scale, never negative.
pub fn drag_factor(drag: f32, dt: f32) -> f32 {
    (1.0 - drag * dt).max(0.0)
}

/// Acceleration of a critically damped spring pulling `position` to `target`.
pub fn spring_accel(position: Vec3, velocity: Vec3, target: Vec3, stiffness: f32) -> Vec3 {
    let damping = 2.0 * stiffness.sqrt();
    (target - position) * stiffness - velocity * damping
}

/// Reflect one velocity component with energy loss.
pub fn bounce(component: f32, restitution: f32) -> f32 {
    -component * restitution
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: Color,
    /// Remaining life in [0, 1].
    pub life: f32,
    /// Life lost per second.
    pub decay: f32,
    pub gravity: Option<f32>,
}

impl Particle {
    /// Advance; returns false once the particle has expired.
    pub fn step(&mut self, dt: f32) -> bool {
        let accel = self.gravity.map_or(Vec3::ZERO, |g| GRAVITY_DIR * g);
        integrate(&mut self.position, &mut self.velocity, accel, dt);
        self.life -= self.decay * dt;
        self.life > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    cap: usize,
}

impl ParticlePool {
    pub fn new(cap: usize) -> Self {
        Self {
            particles: Vec::with_capacity(cap),
            cap,
        }
    }

    /// Spray `count` particles outward from `at`, oldest evicted past the cap.
    pub fn burst(
        &mut self,
        rng: &mut impl Rng,
        at: Vec3,
        color: Color,
        count: usize,
        speed: f32,
        gravity: Option<f32>,
    ) {
        for _ in 0..count {
            let dir = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            )
            .normalize_or_zero();
            if self.particles.len() >= self.cap {
                self.particles.remove(0);
            }
            self.particles.push(Particle {
                position: at,
                velocity: dir * speed * rng.random_range(0.5..1.0),
                color,
                life: 1.0,
                decay: rng.random_range(1.2..2.0),
                gravity,
            });
        }
    }

    pub fn step(&mut self, dt: f32) {
        self.particles.retain_mut(|p| p.step(dt));
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn semi_implicit_euler_updates_velocity_first() {
        let mut p = Vec3::ZERO;
        let mut v = Vec3::ZERO;
        integrate(&mut p, &mut v, Vec3::new(0.0, -10.0, 0.0), 0.1);
        assert_eq!(v, Vec3::new(0.0, -1.0, 0.0));
        assert!((p.y + 0.1).abs() < 1e-6);
    }

    #[test]
    fn spring_settles_without_overshoot() {
        let target = Vec3::new(1.0, 0.0, 0.0);
        let mut p = Vec3::ZERO;
        let mut v = Vec3::ZERO;
        for _ in 0..240 {
            let a = spring_accel(p, v, target, 60.0);
            integrate(&mut p, &mut v, a, 1.0 / 60.0);
            assert!(p.x <= 1.0 + 1e-3);
        }
        assert!(p.distance(target) < 1e-2);
    }

    #[test]
    fn particles_expire() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = ParticlePool::new(8);
        pool.burst(&mut rng, Vec3::ZERO, Color::WHITE, 12, 2.0, Some(9.8));
        assert_eq!(pool.len(), 8);
        for _ in 0..120 {
            pool.step(1.0 / 60.0);
        }
        assert!(pool.is_empty());
    }
}
