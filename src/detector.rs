//! Landmark sources. The host builds a detector once and hands it to the
//! session; the engine never owns one.

use glam::Vec2;
use log::info;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::DetectorError;
use crate::landmarks::{HandPoseBuilder, RawHand, ThumbPose};
use crate::modes::Mode;

pub trait LandmarkDetector {
    /// Hands visible at `timestamp_ms` (session relative).
    fn detect(&mut self, timestamp_ms: u64) -> Result<Vec<RawHand>, DetectorError>;

    /// True once the source has nothing more to play.
    fn exhausted(&self) -> bool;
}

#[derive(Deserialize)]
struct Record {
    t: u64,
    #[serde(default)]
    hands: Vec<RawHand>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
enum Sample {
    Hands(Vec<RawHand>),
    Failure(String),
}

/// Plays back a JSON-lines recording.
///
/// Each line is `{"t": ms, "hands": [[[x, y, z], ...21], ...]}` or
/// `{"t": ms, "error": "..."}`. Blank lines and `#` comments are skipped.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    frames: Vec<(u64, Sample)>,
    cursor: usize,
    last_query: u64,
}

impl ReplayDetector {
    pub fn open(path: &Path) -> Result<Self, DetectorError> {
        let text = fs::read_to_string(path)
            .map_err(|e| DetectorError::Init(format!("{}: {e}", path.display())))?;
        let det = Self::from_jsonl(&text)?;
        info!(
            "replay: {} frames over {} ms from {}",
            det.len(),
            det.duration_ms(),
            path.display()
        );
        Ok(det)
    }

    pub fn from_jsonl(text: &str) -> Result<Self, DetectorError> {
        let mut frames = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let rec: Record = serde_json::from_str(line)
                .map_err(|source| DetectorError::Record { line: i + 1, source })?;
            let sample = match rec.error {
                Some(msg) => Sample::Failure(msg),
                None => Sample::Hands(rec.hands),
            };
            frames.push((rec.t, sample));
        }
        if frames.is_empty() {
            return Err(DetectorError::Init("recording has no frames".into()));
        }
        frames.sort_by_key(|(t, _)| *t);
        Ok(Self {
            frames,
            cursor: 0,
            last_query: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.frames.last().map_or(0, |(t, _)| *t)
    }
}

impl LandmarkDetector for ReplayDetector {
    fn detect(&mut self, timestamp_ms: u64) -> Result<Vec<RawHand>, DetectorError> {
        if timestamp_ms < self.last_query {
            self.cursor = 0;
        }
        self.last_query = timestamp_ms;
        while self.cursor + 1 < self.frames.len() && self.frames[self.cursor + 1].0 <= timestamp_ms {
            self.cursor += 1;
        }
        let Some((t, sample)) = self.frames.get(self.cursor) else {
            return Ok(Vec::new());
        };
        if *t > timestamp_ms {
            return Ok(Vec::new());
        }
        match sample {
            Sample::Hands(hands) => Ok(hands.clone()),
            Sample::Failure(msg) => Err(DetectorError::Frame(msg.clone())),
        }
    }

    fn exhausted(&self) -> bool {
        self.last_query > self.duration_ms()
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Open,
    Pinch,
    Gun,
    GunFired,
}

/// One leg of a scripted performance: the index tip glides from `from` to
/// `to` (raw detector coordinates) over `duration_ms`.
#[derive(Debug, Clone, Copy)]
struct Segment {
    duration_ms: u64,
    shape: Shape,
    from: Vec2,
    to: Vec2,
    /// Wrist of an open second hand, if one is shown.
    second: Option<Vec2>,
}

const fn seg(duration_ms: u64, shape: Shape, from: (f32, f32), to: (f32, f32)) -> Segment {
    Segment {
        duration_ms,
        shape,
        from: Vec2::new(from.0, from.1),
        to: Vec2::new(to.0, to.1),
        second: None,
    }
}

const fn still(duration_ms: u64, shape: Shape, at: (f32, f32)) -> Segment {
    seg(duration_ms, shape, at, at)
}

fn script(mode: Mode) -> Vec<Segment> {
    match mode {
        Mode::Garden => vec![
            Segment {
                second: Some(Vec2::new(0.56, 0.78)),
                ..still(800, Shape::Open, (0.46, 0.55))
            },
            still(600, Shape::Open, (0.5, 0.93)),
            still(600, Shape::Pinch, (0.5, 0.93)),
            seg(400, Shape::Pinch, (0.5, 0.93), (0.35, 0.45)),
            still(1200, Shape::Open, (0.35, 0.45)),
            seg(200, Shape::Open, (0.3, 0.5), (0.75, 0.5)),
            still(600, Shape::Open, (0.75, 0.5)),
        ],
        Mode::Arcade => vec![
            seg(1200, Shape::Gun, (0.3, 0.4), (0.7, 0.4)),
            still(200, Shape::GunFired, (0.7, 0.4)),
            seg(800, Shape::Gun, (0.7, 0.4), (0.5, 0.3)),
            still(200, Shape::GunFired, (0.5, 0.3)),
            still(400, Shape::Open, (0.5, 0.3)),
        ],
        Mode::WallBall => vec![
            still(500, Shape::Open, (0.5, 0.667)),
            still(500, Shape::Pinch, (0.5, 0.667)),
            seg(250, Shape::Pinch, (0.5, 0.667), (0.45, 0.35)),
            still(1500, Shape::Open, (0.45, 0.35)),
        ],
        Mode::Guitar => vec![
            still(400, Shape::Pinch, (0.35, 0.3)),
            seg(300, Shape::Open, (0.35, 0.3), (0.25, 0.5)),
            still(400, Shape::Pinch, (0.25, 0.5)),
            seg(100, Shape::Open, (0.4, 0.6), (0.1, 0.6)),
            still(500, Shape::Open, (0.1, 0.6)),
        ],
        Mode::Painter => vec![
            still(300, Shape::Open, (0.5, 0.5)),
            seg(1500, Shape::Pinch, (0.5, 0.3), (0.3, 0.6)),
            still(300, Shape::Open, (0.5, 0.5)),
            still(400, Shape::Pinch, (0.95, 0.3)),
            still(300, Shape::Open, (0.6, 0.6)),
            seg(1000, Shape::Pinch, (0.6, 0.6), (0.4, 0.4)),
            still(1200, Shape::Open, (0.4, 0.4)),
        ],
    }
}

/// Deterministic looping hand performance for `handplay demo`.
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    segments: Vec<Segment>,
    loop_ms: u64,
    duration_ms: Option<u64>,
    last_query: u64,
}

impl ScriptedDetector {
    pub fn for_mode(mode: Mode) -> Self {
        let segments = script(mode);
        let loop_ms = segments.iter().map(|s| s.duration_ms).sum();
        Self {
            segments,
            loop_ms,
            duration_ms: None,
            last_query: 0,
        }
    }

    /// Stop after `ms` of session time.
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn loop_ms(&self) -> u64 {
        self.loop_ms
    }

    fn hands_at(&self, t: u64) -> Vec<RawHand> {
        let mut local = t % self.loop_ms.max(1);
        for s in &self.segments {
            if local < s.duration_ms {
                let progress = local as f32 / s.duration_ms.max(1) as f32;
                let tip = s.from.lerp(s.to, progress);
                let builder = match s.shape {
                    Shape::Open => HandPoseBuilder::open(),
                    Shape::Pinch => HandPoseBuilder::open().pinch(0.1),
                    Shape::Gun => HandPoseBuilder::finger_gun(),
                    Shape::GunFired => HandPoseBuilder::finger_gun().thumb(ThumbPose::Tucked),
                };
                let mut hands = vec![builder.index_tip_at(tip.x, tip.y).build()];
                if let Some(w) = s.second {
                    hands.push(HandPoseBuilder::open().at(w.x, w.y).build());
                }
                return hands;
            }
            local -= s.duration_ms;
        }
        Vec::new()
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, timestamp_ms: u64) -> Result<Vec<RawHand>, DetectorError> {
        self.last_query = timestamp_ms;
        Ok(self.hands_at(timestamp_ms))
    }

    fn exhausted(&self) -> bool {
        self.duration_ms.is_some_and(|d| self.last_query >= d)
    }
}
