//! Freehand painting on the mirrored view plane.

use glam::Vec2;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Mode, ModeHandler, ModeStatus, StepFrame};
use crate::actions::Effect;
use crate::config::{self, Profile};
use crate::gestures::{Cooldown, FrameInput, GestureEvent, GestureSet, PinchRole};
use crate::interaction::{Color, InteractionState, PaintCursor};

/// Smallest fraction of the full brush at the very start of a stroke.
const MIN_TAPER: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub position: Vec2,
    pub color: Color,
    pub size: f32,
    pub rotation: f32,
}

/// Evenly spaced points from `from` (exclusive) to `to` (inclusive).
///
/// Never more than `max_steps` points; a move shorter than `step` yields
/// just `to`.
pub fn interpolate(from: Vec2, to: Vec2, step: f32, max_steps: usize) -> Vec<Vec2> {
    let d = from.distance(to);
    if d <= step {
        return vec![to];
    }
    let n = ((d / step).ceil() as usize).clamp(1, max_steps.max(1));
    (1..=n).map(|i| from.lerp(to, i as f32 / n as f32)).collect()
}

pub struct Painter {
    cfg: config::Painter,
    canvas: Vec<Splat>,
    last_point: Option<Vec2>,
    stroke_start_ms: Option<u64>,
    color_change: Cooldown,
    snapshots: usize,
    rng: StdRng,
}

impl Painter {
    pub fn new(cfg: config::Painter, seed: u64) -> Self {
        Self {
            color_change: Cooldown::new(cfg.color_cooldown_ms),
            canvas: Vec::new(),
            last_point: None,
            stroke_start_ms: None,
            snapshots: 0,
            rng: StdRng::seed_from_u64(seed),
            cfg,
        }
    }

    pub fn canvas(&self) -> &[Splat] {
        &self.canvas
    }

    pub fn over_palette(&self, pointer: Vec2) -> bool {
        pointer.x < self.cfg.palette_width
    }

    fn swatch_at(&self, y: f32) -> Option<Color> {
        let n = self.cfg.palette.len();
        if n == 0 {
            return None;
        }
        let i = ((y.clamp(0.0, 1.0) * n as f32) as usize).min(n - 1);
        self.cfg.palette.get(i).copied()
    }

    fn brush_size(&self, now_ms: u64, pinch_ratio: f32) -> f32 {
        let elapsed = self
            .stroke_start_ms
            .map_or(0, |t| now_ms.saturating_sub(t));
        let taper = if self.cfg.taper_ms == 0 {
            1.0
        } else {
            (elapsed as f32 / self.cfg.taper_ms as f32).clamp(MIN_TAPER, 1.0)
        };
        let engage = self.cfg.paint_engage;
        let pressure = ((engage - pinch_ratio) / engage).clamp(0.0, 1.0);
        self.cfg.base_size * taper * (1.0 + 0.5 * pressure)
    }

    fn end_stroke(&mut self) {
        self.last_point = None;
        self.stroke_start_ms = None;
    }
}

impl ModeHandler for Painter {
    fn mode(&self) -> Mode {
        Mode::Painter
    }

    fn gestures(&self) -> GestureSet {
        GestureSet {
            pinch: PinchRole::Paint,
            save: true,
            ..GestureSet::NONE
        }
    }

    fn classify(
        &mut self,
        input: &FrameInput<'_>,
        state: &mut InteractionState,
        events: &mut Vec<GestureEvent>,
    ) {
        if !state.is_hovering || !state.is_painting || !self.over_palette(state.pointer) {
            return;
        }
        let Some(color) = self.swatch_at(state.pointer.y) else {
            return;
        };
        if color != state.active_color && self.color_change.try_fire(input.now_ms) {
            events.push(GestureEvent::ColorChange { color });
        }
    }

    fn step(&mut self, frame: &mut StepFrame<'_>) {
        let state = &mut *frame.state;
        state.cursors.clear();
        for event in frame.events {
            match event {
                GestureEvent::ColorChange { color } => {
                    debug!("brush colour {color}");
                    state.active_color = *color;
                }
                GestureEvent::SaveSnapshot => {
                    self.snapshots += 1;
                    info!("snapshot {} with {} marks", self.snapshots, self.canvas.len());
                }
                _ => {}
            }
        }

        if !(state.is_painting && state.is_hovering) || self.over_palette(state.pointer) {
            self.end_stroke();
            return;
        }

        let now = frame.now_ms;
        self.stroke_start_ms.get_or_insert(now);
        let to = state.pointer;
        let marks = match self.last_point {
            Some(from) => interpolate(from, to, self.cfg.step, self.cfg.max_steps),
            None => vec![to],
        };
        self.last_point = Some(to);

        let size = self.brush_size(now, state.pinch_ratio);
        let color = state.active_color;
        for position in marks {
            let rotation = self.rng.random_range(0.0..std::f32::consts::TAU);
            state.cursors.push(PaintCursor {
                position,
                color,
                size,
            });
            self.canvas.push(Splat {
                position,
                color,
                size,
                rotation,
            });
            frame.sink.effect(Effect::Splat {
                at: position,
                color,
                size,
                rotation,
            });
        }
    }

    fn reset(&mut self, _now_ms: u64) {
        self.canvas.clear();
        self.end_stroke();
    }

    fn reconfigure(&mut self, profile: &Profile) {
        self.cfg = profile.painter.clone();
        self.color_change = Cooldown::new(self.cfg.color_cooldown_ms);
    }

    fn status(&self) -> ModeStatus {
        ModeStatus {
            objects: self.canvas.len(),
            particles: 0,
            score: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Recorder;
    use glam::Vec3;

    fn painting(x: f32, y: f32) -> InteractionState {
        InteractionState {
            is_hovering: true,
            is_painting: true,
            pointer: Vec2::new(x, y),
            pinch_ratio: 0.1,
            active_color: Color::rgb(0x33, 0x99, 0xff),
            ..InteractionState::default()
        }
    }

    fn step(p: &mut Painter, now_ms: u64, state: &mut InteractionState, events: &[GestureEvent]) -> Recorder {
        let mut sink = Recorder::default();
        p.step(&mut StepFrame {
            now_ms,
            dt: 0.016,
            events,
            state,
            sink: &mut sink,
        });
        sink
    }

    fn input(now_ms: u64) -> FrameInput<'static> {
        FrameInput {
            now_ms,
            dt: 0.016,
            primary: None,
            secondary: None,
            tracked: None,
            pose: None,
            cursor_velocity: Vec3::ZERO,
            palm_velocity: Vec2::ZERO,
        }
    }

    #[test]
    fn fast_stroke_is_filled_in() {
        let cfg = config::Painter::default();
        let mut p = Painter::new(cfg.clone(), 1);
        let mut state = painting(0.2, 0.2);
        step(&mut p, 0, &mut state, &[]);
        state.pointer = Vec2::new(0.2, 0.4);
        step(&mut p, 16, &mut state, &[]);

        let marks = &state.cursors;
        assert!(marks.len() > 1);
        for pair in marks.windows(2) {
            assert!(pair[0].position.distance(pair[1].position) <= cfg.step + 1e-5);
        }
        assert!(marks.iter().all(|m| m.color == state.active_color));
        let end = marks.last().map(|m| m.position).unwrap();
        assert!(end.distance(Vec2::new(0.2, 0.4)) < 1e-6);
        assert_eq!(p.canvas().len(), 1 + marks.len());
    }

    #[test]
    fn interpolation_is_capped() {
        let pts = interpolate(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.001, 64);
        assert_eq!(pts.len(), 64);
        assert_eq!(interpolate(Vec2::ZERO, Vec2::new(0.005, 0.0), 0.01, 64).len(), 1);
    }

    #[test]
    fn palette_strip_suppresses_paint_and_picks_colour() {
        let cfg = config::Painter::default();
        let mut p = Painter::new(cfg.clone(), 1);
        let mut state = painting(0.05, 0.5);
        let mut events = Vec::new();
        p.classify(&input(0), &mut state, &mut events);
        assert_eq!(events, vec![GestureEvent::ColorChange { color: cfg.palette[2] }]);

        step(&mut p, 0, &mut state, &events);
        assert!(state.cursors.is_empty());
        assert!(p.canvas().is_empty());
        assert_eq!(state.active_color, cfg.palette[2]);

        events.clear();
        state.pointer.y = 0.9;
        p.classify(&input(100), &mut state, &mut events);
        assert!(events.is_empty());
        p.classify(&input(700), &mut state, &mut events);
        assert_eq!(events, vec![GestureEvent::ColorChange { color: cfg.palette[4] }]);
    }

    #[test]
    fn stroke_tapers_in() {
        let mut p = Painter::new(config::Painter::default(), 1);
        let mut state = painting(0.5, 0.5);
        step(&mut p, 0, &mut state, &[]);
        let first = state.cursors[0].size;
        state.pointer.x += 0.005;
        step(&mut p, 400, &mut state, &[]);
        let later = state.cursors[0].size;
        assert!(first < later);
    }

    #[test]
    fn lifting_the_pinch_breaks_the_stroke() {
        let mut p = Painter::new(config::Painter::default(), 1);
        let mut state = painting(0.3, 0.3);
        step(&mut p, 0, &mut state, &[]);
        state.is_painting = false;
        step(&mut p, 16, &mut state, &[]);
        assert!(state.cursors.is_empty());

        state.is_painting = true;
        state.pointer = Vec2::new(0.8, 0.8);
        step(&mut p, 32, &mut state, &[]);
        assert_eq!(state.cursors.len(), 1);
    }

    #[test]
    fn clap_is_not_a_painter_gesture() {
        let p = Painter::new(config::Painter::default(), 1);
        assert!(!p.gestures().clap);
    }

    #[test]
    fn reset_clears_canvas_idempotently() {
        let mut p = Painter::new(config::Painter::default(), 1);
        let mut state = painting(0.5, 0.5);
        step(&mut p, 0, &mut state, &[]);
        assert!(!p.canvas().is_empty());
        p.reset(10);
        assert!(p.canvas().is_empty());
        p.reset(10);
        assert!(p.canvas().is_empty());
    }
}
