//! Output side of the engine: discrete events, visual effects, sound cues
//! and haptic pulses.

use glam::{Vec2, Vec3};
use log::trace;
use serde::Serialize;
use std::io::Write;

use crate::error::HapticError;
use crate::gestures::GestureEvent;
use crate::interaction::Color;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "kebab-case")]
pub enum Effect {
    Particles { at: Vec3, color: Color, count: usize },
    Ripple { at: Vec3, color: Color, intensity: f32 },
    Dust { at: Vec3, intensity: f32 },
    ImpactFlash { at: Vec3, color: Color },
    Splat { at: Vec2, color: Color, size: f32, rotation: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cue", rename_all = "kebab-case")]
pub enum SoundCue {
    WallThud,
    TargetPing,
    NotePluck { frequency: f32, delay_ms: u32 },
    PlantChime,
    Bloom,
    Shot,
    DryFire,
    ResetWhoosh,
}

pub trait ActionSink {
    fn emit(&mut self, event: &GestureEvent);
    fn effect(&mut self, effect: Effect);
    fn sound(&mut self, cue: SoundCue, at: Vec3);
    /// Best effort; callers ignore failures.
    fn haptic(&mut self, pattern_ms: &[u32]) -> Result<(), HapticError>;

    /// Timestamp for everything written until the next call.
    fn set_clock(&mut self, _now_ms: u64) {}
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Line<'a> {
    Event {
        t: u64,
        #[serde(flatten)]
        event: &'a GestureEvent,
    },
    Effect {
        t: u64,
        #[serde(flatten)]
        effect: &'a Effect,
    },
    Sound {
        t: u64,
        at: Vec3,
        #[serde(flatten)]
        cue: &'a SoundCue,
    },
}

/// Writes one JSON object per line. Effects can be muted to keep the
/// stream readable.
pub struct JsonLinesSink<W: Write> {
    out: W,
    with_effects: bool,
    clock_ms: u64,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W, with_effects: bool) -> Self {
        Self {
            out,
            with_effects,
            clock_ms: 0,
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }

    fn write_line(&mut self, line: &Line<'_>) {
        let res = serde_json::to_string(line)
            .map_err(std::io::Error::from)
            .and_then(|s| writeln!(self.out, "{s}"));
        match res {
            Ok(()) => self.written += 1,
            Err(e) => log::error!("event sink write failed: {e}"),
        }
    }
}

impl<W: Write> ActionSink for JsonLinesSink<W> {
    fn emit(&mut self, event: &GestureEvent) {
        self.write_line(&Line::Event {
            t: self.clock_ms,
            event,
        });
    }

    fn effect(&mut self, effect: Effect) {
        if self.with_effects {
            self.write_line(&Line::Effect {
                t: self.clock_ms,
                effect: &effect,
            });
        }
    }

    fn sound(&mut self, cue: SoundCue, at: Vec3) {
        self.write_line(&Line::Sound {
            t: self.clock_ms,
            at,
            cue: &cue,
        });
    }

    fn haptic(&mut self, pattern_ms: &[u32]) -> Result<(), HapticError> {
        trace!("haptic {pattern_ms:?} requested, no actuator");
        Err(HapticError::Unavailable)
    }

    fn set_clock(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
    }
}

/// Collects everything in memory.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Vec<GestureEvent>,
    pub effects: Vec<Effect>,
    pub sounds: Vec<(SoundCue, Vec3)>,
    pub haptics: Vec<Vec<u32>>,
}

impl Recorder {
    pub fn count_events(&self, pred: impl Fn(&GestureEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn count_sounds(&self, pred: impl Fn(&SoundCue) -> bool) -> usize {
        self.sounds.iter().filter(|(c, _)| pred(c)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.effects.clear();
        self.sounds.clear();
        self.haptics.clear();
    }
}

impl ActionSink for Recorder {
    fn emit(&mut self, event: &GestureEvent) {
        self.events.push(event.clone());
    }

    fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn sound(&mut self, cue: SoundCue, at: Vec3) {
        self.sounds.push((cue, at));
    }

    fn haptic(&mut self, pattern_ms: &[u32]) -> Result<(), HapticError> {
        self.haptics.push(pattern_ms.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_carry_event_payloads() {
        let mut sink = JsonLinesSink::new(Vec::new(), false);
        sink.set_clock(120);
        sink.emit(&GestureEvent::PlayNote { fret: 3, string: 2 });
        sink.effect(Effect::Dust {
            at: Vec3::ZERO,
            intensity: 1.0,
        });
        sink.sound(SoundCue::WallThud, Vec3::ZERO);
        assert_eq!(sink.written(), 2);

        let text = String::from_utf8(sink.out).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["kind"], "event");
        assert_eq!(first["event"], "play-note");
        assert_eq!(first["fret"], 3);
        assert_eq!(first["string"], 2);
        assert_eq!(first["t"], 120);

        let second: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(second["cue"], "wall-thud");
    }

    #[test]
    fn haptics_fail_softly_without_device() {
        let mut sink = JsonLinesSink::new(Vec::new(), true);
        assert!(sink.haptic(&[20]).is_err());
        assert_eq!(sink.written(), 0);
    }
}
