//! Air guitar: a 6x8 fretboard laid over part of the view.

use glam::{Vec2, Vec3};
use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{Mode, ModeHandler, ModeStatus, StepFrame};
use crate::actions::SoundCue;
use crate::config::{self, Profile};
use crate::gestures::{Cooldown, FrameInput, GestureEvent, GestureSet, PinchRole, SwipeDirection};
use crate::interaction::{Color, InteractionState, WorldMapping};
use crate::physics::ParticlePool;

pub const STRINGS: usize = 6;
pub const FRETS: usize = 8;

const SPARK: Color = Color::rgb(0xff, 0xdd, 0x55);

/// Equal-tempered pitch of `fret` semitones above the open string.
pub fn note_frequency(open: f32, fret: u8) -> f32 {
    open * 2f32.powf(f32::from(fret) / 12.0)
}

/// Grid cell under a view-space point, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub fret: u8,
    pub string: u8,
}

#[derive(Debug, Clone, Copy)]
pub struct Fretboard {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl Fretboard {
    pub fn new(region: [f32; 4]) -> Self {
        let [x0, y0, x1, y1] = region;
        Self { x0, y0, x1, y1 }
    }

    /// Strings run across x, frets down y.
    pub fn cell_at(&self, p: Vec2) -> Option<Cell> {
        if p.x < self.x0 || p.x >= self.x1 || p.y < self.y0 || p.y >= self.y1 {
            return None;
        }
        let u = (p.x - self.x0) / (self.x1 - self.x0);
        let v = (p.y - self.y0) / (self.y1 - self.y0);
        let string = ((u * STRINGS as f32) as usize).min(STRINGS - 1) + 1;
        let fret = ((v * FRETS as f32) as usize).min(FRETS - 1) + 1;
        Some(Cell {
            fret: fret as u8,
            string: string as u8,
        })
    }

    pub fn cell_center(&self, cell: Cell) -> Vec2 {
        let w = (self.x1 - self.x0) / STRINGS as f32;
        let h = (self.y1 - self.y0) / FRETS as f32;
        Vec2::new(
            self.x0 + (f32::from(cell.string) - 0.5) * w,
            self.y0 + (f32::from(cell.fret) - 0.5) * h,
        )
    }
}

pub struct Guitar {
    cfg: config::Guitar,
    board: Fretboard,
    mapping: WorldMapping,
    note: Cooldown,
    strum: Cooldown,
    strum_until: u64,
    particles: ParticlePool,
    rng: StdRng,
}

impl Guitar {
    pub fn new(cfg: config::Guitar, mapping: WorldMapping, seed: u64) -> Self {
        Self {
            board: Fretboard::new(cfg.region),
            note: Cooldown::new(cfg.note_cooldown_ms),
            strum: Cooldown::new(cfg.strum_cooldown_ms),
            strum_until: 0,
            particles: ParticlePool::new(128),
            rng: StdRng::seed_from_u64(seed),
            mapping,
            cfg,
        }
    }

    pub fn fretboard(&self) -> &Fretboard {
        &self.board
    }

    /// Open frequency of the 0-based string `idx`, if the profile tunes it.
    fn open_string(&self, idx: usize) -> Option<f32> {
        let open = self.cfg.open_strings.get(idx).copied();
        if open.is_none() {
            debug!("string {} has no tuning, skipped", idx + 1);
        }
        open
    }

    fn pluck(&mut self, at: Vec3, frame_sink: &mut dyn crate::actions::ActionSink, cell: Cell) {
        let Some(open) = self.open_string(usize::from(cell.string.max(1)) - 1) else {
            return;
        };
        let frequency = note_frequency(open, cell.fret);
        frame_sink.sound(
            SoundCue::NotePluck {
                frequency,
                delay_ms: 0,
            },
            at,
        );
        self.particles.burst(&mut self.rng, at, SPARK, 6, 1.2, None);
    }

    fn strum_all(&mut self, at: Vec3, sink: &mut dyn crate::actions::ActionSink, direction: SwipeDirection) {
        let order: Vec<usize> = match direction {
            SwipeDirection::Right | SwipeDirection::Down => (0..STRINGS).rev().collect(),
            SwipeDirection::Left | SwipeDirection::Up => (0..STRINGS).collect(),
        };
        for (i, s) in order.into_iter().enumerate() {
            let Some(frequency) = self.open_string(s) else {
                continue;
            };
            sink.sound(
                SoundCue::NotePluck {
                    frequency,
                    delay_ms: i as u32 * self.cfg.strum_stagger_ms,
                },
                at,
            );
        }
        self.particles.burst(&mut self.rng, at, SPARK, 18, 2.0, None);
    }
}

impl ModeHandler for Guitar {
    fn mode(&self) -> Mode {
        Mode::Guitar
    }

    fn gestures(&self) -> GestureSet {
        GestureSet {
            pinch: PinchRole::Fret,
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
        if !state.is_hovering {
            return;
        }
        let Some(cell) = self.board.cell_at(state.pointer) else {
            return;
        };
        let now = input.now_ms;

        let vx = state.velocity.x;
        if vx.abs() > self.cfg.strum_speed && self.strum.try_fire(now) {
            let direction = if vx > 0.0 {
                SwipeDirection::Right
            } else {
                SwipeDirection::Left
            };
            debug!("strum {direction:?} at {vx:.2}");
            self.strum_until = now + self.cfg.strum_window_ms;
            events.push(GestureEvent::Strum { direction });
            return;
        }
        if now < self.strum_until {
            return;
        }

        if state.pinch_ratio < self.cfg.fret_pinch_ratio && self.note.try_fire(now) {
            events.push(GestureEvent::PlayNote {
                fret: cell.fret,
                string: cell.string,
            });
        }
    }

    fn step(&mut self, frame: &mut StepFrame<'_>) {
        for event in frame.events {
            match event {
                GestureEvent::PlayNote { fret, string } => {
                    let cell = Cell {
                        fret: *fret,
                        string: *string,
                    };
                    let at = self.mapping.view_to_world(self.board.cell_center(cell));
                    self.pluck(at, frame.sink, cell);
                }
                GestureEvent::Strum { direction } => {
                    self.strum_all(frame.state.cursor, frame.sink, *direction);
                }
                _ => {}
            }
        }
        self.particles.step(frame.dt);
    }

    fn reset(&mut self, _now_ms: u64) {
        self.particles.clear();
        self.strum_until = 0;
    }

    fn reconfigure(&mut self, profile: &Profile) {
        self.cfg = profile.guitar.clone();
        self.board = Fretboard::new(self.cfg.region);
        self.note = Cooldown::new(self.cfg.note_cooldown_ms);
        self.strum = Cooldown::new(self.cfg.strum_cooldown_ms);
        self.mapping = WorldMapping::new(&profile.world);
    }

    fn status(&self) -> ModeStatus {
        ModeStatus {
            objects: 0,
            particles: self.particles.len(),
            score: 0,
        }
    }
}
