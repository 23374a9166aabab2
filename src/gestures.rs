use glam::{Vec2, Vec3};
use log::debug;
use serde::Serialize;

use crate::config::{Gestures, Painter};
use crate::error::GestureError;
use crate::interaction::{Color, InteractionState, WorldMapping};
use crate::landmarks::{FINGERS, HandLandmarks, INDEX_MCP, WRIST};
use crate::tracker::TrackedHand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Discrete events handed to the event sink, tagged by `event` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum GestureEvent {
    GrabStart,
    Release,
    PaintStart,
    PaintEnd,
    PointStart,
    PointEnd,
    Plant { at: Vec3 },
    Shoot { at: Vec3, hit: bool },
    Strum { direction: SwipeDirection },
    PlayNote { fret: u8, string: u8 },
    Swipe { direction: SwipeDirection },
    ColorChange { color: Color },
    SaveSnapshot,
    Reset,
}

/// What a binary pinch means in the active mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchRole {
    None,
    Grab,
    Paint,
    /// Read as a raw ratio by the mode, no latch.
    Fret,
}

/// The generic gestures a mode listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureSet {
    pub pinch: PinchRole,
    pub plant: bool,
    pub clap: bool,
    pub swipe: bool,
    pub save: bool,
}

impl GestureSet {
    pub const NONE: GestureSet = GestureSet {
        pinch: PinchRole::None,
        plant: false,
        clap: false,
        swipe: false,
        save: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Engaged,
    Released,
}

/// Two-threshold latch. Engages below `engage`, releases above `release`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    engage: f32,
    release: f32,
    engaged: bool,
}

impl Hysteresis {
    pub fn new(engage: f32, release: f32) -> Result<Self, GestureError> {
        if !(engage < release) {
            return Err(GestureError::InvertedThresholds { engage, release });
        }
        Ok(Self {
            engage,
            release,
            engaged: false,
        })
    }

    /// Feed the current distance; `None` means the hand is gone.
    pub fn update(&mut self, value: Option<f32>) -> Option<Transition> {
        match (self.engaged, value) {
            (false, Some(v)) if v < self.engage => {
                self.engaged = true;
                Some(Transition::Engaged)
            }
            (true, Some(v)) if v > self.release => {
                self.engaged = false;
                Some(Transition::Released)
            }
            (true, None) => {
                self.engaged = false;
                Some(Transition::Released)
            }
            _ => None,
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn thresholds(&self) -> (f32, f32) {
        (self.engage, self.release)
    }

    pub fn reset(&mut self) {
        self.engaged = false;
    }
}

/// Per-event debounce. Timestamps that run backwards never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    cooldown_ms: u64,
    last_fired: Option<u64>,
}

impl Cooldown {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_fired: None,
        }
    }

    pub fn ready(&self, now_ms: u64) -> bool {
        match self.last_fired {
            None => true,
            Some(t) => now_ms >= t && now_ms - t >= self.cooldown_ms,
        }
    }

    /// Fire if the cooldown has elapsed, recording `now_ms`.
    pub fn try_fire(&mut self, now_ms: u64) -> bool {
        if self.ready(now_ms) {
            self.last_fired = Some(now_ms);
            true
        } else {
            false
        }
    }

    pub fn last_fired(&self) -> Option<u64> {
        self.last_fired
    }

    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

/// Tracks how long a condition has been continuously true.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldTimer {
    since: Option<u64>,
}

impl HoldTimer {
    pub fn update(&mut self, active: bool, now_ms: u64) -> u64 {
        if !active {
            self.since = None;
            return 0;
        }
        let since = *self.since.get_or_insert(now_ms);
        now_ms.saturating_sub(since)
    }

    pub fn reset(&mut self) {
        self.since = None;
    }
}

/// Hand-scale-normalised shape of the primary hand for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    pub scale: f32,
    /// Smoothed thumb-to-index distance over scale.
    pub pinch_ratio: f32,
    /// Raw thumb tip to index knuckle over scale.
    pub thumb_to_index_base: f32,
    pub thumb_away: bool,
    /// Index, middle, ring, pinky.
    pub extended: [bool; 4],
    pub curled: [bool; 4],
}

impl HandPose {
    pub fn measure(hand: &HandLandmarks, tracked: &TrackedHand, cfg: &Gestures) -> Self {
        let scale = hand.hand_scale(cfg.min_hand_scale);
        let wrist = hand.point(WRIST);
        let palm = hand.palm_center();

        let mut extended = [false; 4];
        let mut curled = [false; 4];
        for (i, (_, pip, tip)) in FINGERS.iter().enumerate() {
            let tip_wrist = hand.point(*tip).distance(wrist);
            let pip_wrist = hand.point(*pip).distance(wrist);
            extended[i] = tip_wrist > pip_wrist * cfg.extend_ratio;
            curled[i] = tip_wrist < pip_wrist * cfg.curl_ratio
                && hand.point(*tip).distance(palm) < cfg.curl_palm_ratio * scale;
        }

        let thumb_to_index_base = tracked.thumb_tip.distance(hand.point(INDEX_MCP)) / scale;
        Self {
            scale,
            pinch_ratio: tracked.thumb_tip.distance(tracked.index_tip) / scale,
            thumb_to_index_base,
            thumb_away: thumb_to_index_base > cfg.thumb_away_ratio,
            extended,
            curled,
        }
    }

    /// Index out, middle/ring/pinky curled. Thumb not considered.
    pub fn is_gun_grip(&self) -> bool {
        self.extended[0] && self.curled[1] && self.curled[2] && self.curled[3]
    }

    pub fn is_finger_gun(&self) -> bool {
        self.is_gun_grip() && self.thumb_away
    }

    pub fn is_open_palm(&self) -> bool {
        self.extended.iter().all(|e| *e) && self.thumb_away
    }
}

/// Distance and closing speed between the two wrists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoHandSample {
    /// Wrist distance over mean hand scale.
    pub distance: f32,
    /// Hand scales per second; positive while the hands approach.
    pub closing_speed: f32,
    pub midpoint: Vec3,
    pub wrists: [Vec3; 2],
    pub scale: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TwoHandTracker {
    prev_distance: Option<f32>,
}

impl TwoHandTracker {
    pub fn update(
        &mut self,
        a: &HandLandmarks,
        b: &HandLandmarks,
        dt: f32,
        cfg: &Gestures,
    ) -> TwoHandSample {
        let scale = 0.5 * (a.hand_scale(cfg.min_hand_scale) + b.hand_scale(cfg.min_hand_scale));
        let distance = a.wrist().distance(b.wrist()) / scale;
        let closing_speed = match self.prev_distance {
            Some(prev) => (prev - distance) / dt.max(1e-3),
            None => 0.0,
        };
        self.prev_distance = Some(distance);
        TwoHandSample {
            distance,
            closing_speed,
            midpoint: 0.5 * (a.palm_center() + b.palm_center()),
            wrists: [a.wrist(), b.wrist()],
            scale,
        }
    }

    /// Forget the previous distance so reacquisition starts from zero speed.
    pub fn reset(&mut self) {
        self.prev_distance = None;
    }

    pub fn has_history(&self) -> bool {
        self.prev_distance.is_some()
    }
}

impl TwoHandSample {
    pub fn is_clasp(&self, cfg: &Gestures) -> bool {
        self.distance < cfg.clasp_distance && self.closing_speed.abs() < cfg.clasp_max_speed
    }

    /// Fast closing, away from the frame edges, wrists level.
    pub fn is_clap(&self, cfg: &Gestures) -> bool {
        let inside = |p: Vec3| {
            (cfg.edge_margin..=1.0 - cfg.edge_margin).contains(&p.x)
                && (cfg.edge_margin..=1.0 - cfg.edge_margin).contains(&p.y)
        };
        let level = (self.wrists[0].y - self.wrists[1].y).abs() / self.scale < cfg.align_tolerance;
        self.closing_speed > cfg.clap_speed
            && self.distance < cfg.clap_distance
            && self.wrists.iter().all(|w| inside(*w))
            && level
    }
}

pub fn swipe_direction(palm_velocity: Vec2, min_speed: f32) -> Option<SwipeDirection> {
    if palm_velocity.length() < min_speed {
        return None;
    }
    Some(if palm_velocity.x.abs() >= palm_velocity.y.abs() {
        if palm_velocity.x > 0.0 {
            SwipeDirection::Right
        } else {
            SwipeDirection::Left
        }
    } else if palm_velocity.y > 0.0 {
        SwipeDirection::Down
    } else {
        SwipeDirection::Up
    })
}

/// Everything the classifiers may read for one tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub now_ms: u64,
    pub dt: f32,
    pub primary: Option<&'a HandLandmarks>,
    pub secondary: Option<&'a HandLandmarks>,
    pub tracked: Option<&'a TrackedHand>,
    pub pose: Option<&'a HandPose>,
    pub cursor_velocity: Vec3,
    pub palm_velocity: Vec2,
}

/// Mode-independent part of gesture classification.
///
/// Writes the input-derived fields of [`InteractionState`] and emits the
/// generic events the active mode subscribes to.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    cfg: Gestures,
    mapping: WorldMapping,
    grab: Hysteresis,
    paint: Hysteresis,
    two_hands: TwoHandTracker,
    plant: Cooldown,
    clap: Cooldown,
    swipe: Cooldown,
    save: Cooldown,
    save_hold_ms: u64,
    palm_hold: HoldTimer,
}

impl GestureClassifier {
    pub fn new(cfg: &Gestures, painter: &Painter, mapping: WorldMapping) -> Result<Self, GestureError> {
        Ok(Self {
            grab: Hysteresis::new(cfg.pinch_engage, cfg.pinch_release)?,
            paint: Hysteresis::new(painter.paint_engage, painter.paint_release)?,
            two_hands: TwoHandTracker::default(),
            plant: Cooldown::new(cfg.plant_cooldown_ms),
            clap: Cooldown::new(cfg.reset_cooldown_ms),
            swipe: Cooldown::new(cfg.swipe_cooldown_ms),
            save: Cooldown::new(painter.save_cooldown_ms),
            save_hold_ms: painter.save_hold_ms,
            palm_hold: HoldTimer::default(),
            cfg: cfg.clone(),
            mapping,
        })
    }

    pub fn classify(
        &mut self,
        input: &FrameInput<'_>,
        gestures: GestureSet,
        state: &mut InteractionState,
        events: &mut Vec<GestureEvent>,
    ) {
        match (input.tracked, input.pose) {
            (Some(tracked), Some(pose)) => {
                state.is_hovering = true;
                state.cursor = self.mapping.to_world(tracked.index_tip);
                state.pointer = self.mapping.to_view(tracked.index_tip);
                state.palm = self.mapping.to_world(tracked.palm);
                state.pinch_ratio = pose.pinch_ratio;
            }
            _ => {
                state.is_hovering = false;
                state.pinch_ratio = f32::INFINITY;
            }
        }
        state.velocity = input.cursor_velocity;

        let pinch = input.pose.map(|p| p.pinch_ratio);
        let (grab_in, paint_in) = match gestures.pinch {
            PinchRole::Grab => (pinch, None),
            PinchRole::Paint => (None, pinch),
            PinchRole::None | PinchRole::Fret => (None, None),
        };
        match self.grab.update(grab_in) {
            Some(Transition::Engaged) => events.push(GestureEvent::GrabStart),
            Some(Transition::Released) => events.push(GestureEvent::Release),
            None => {}
        }
        match self.paint.update(paint_in) {
            Some(Transition::Engaged) => events.push(GestureEvent::PaintStart),
            Some(Transition::Released) => events.push(GestureEvent::PaintEnd),
            None => {}
        }
        state.is_grabbing = self.grab.is_engaged();
        state.is_painting = self.paint.is_engaged();

        self.classify_two_hands(input, gestures, events);

        if gestures.swipe && input.pose.is_some() {
            if let Some(direction) = swipe_direction(input.palm_velocity, self.cfg.swipe_speed) {
                if self.swipe.try_fire(input.now_ms) {
                    events.push(GestureEvent::Swipe { direction });
                }
            }
        }

        let open = gestures.save && input.pose.is_some_and(|p| p.is_open_palm());
        if self.palm_hold.update(open, input.now_ms) >= self.save_hold_ms
            && self.save.try_fire(input.now_ms)
        {
            self.palm_hold.reset();
            events.push(GestureEvent::SaveSnapshot);
        }
    }

    fn classify_two_hands(
        &mut self,
        input: &FrameInput<'_>,
        gestures: GestureSet,
        events: &mut Vec<GestureEvent>,
    ) {
        let (Some(a), Some(b)) = (input.primary, input.secondary) else {
            self.two_hands.reset();
            return;
        };
        let warm = self.two_hands.has_history();
        let sample = self.two_hands.update(a, b, input.dt, &self.cfg);
        if !warm {
            return;
        }

        if gestures.clap && sample.is_clap(&self.cfg) {
            if self.clap.try_fire(input.now_ms) {
                debug!(
                    "clap: distance {:.2} closing {:.2}",
                    sample.distance, sample.closing_speed
                );
                events.push(GestureEvent::Reset);
            }
        } else if gestures.plant && sample.is_clasp(&self.cfg) && self.plant.try_fire(input.now_ms)
        {
            let at = self.mapping.to_world(sample.midpoint);
            events.push(GestureEvent::Plant { at });
        }
    }

    /// Take over latch, cooldown and two-hand state from `previous`, so a
    /// profile swap mid-gesture neither re-fires a start nor loses a release.
    pub fn carry_state_from(&mut self, previous: &GestureClassifier) {
        self.grab.engaged = previous.grab.engaged;
        self.paint.engaged = previous.paint.engaged;
        self.two_hands = previous.two_hands.clone();
        for (mine, theirs) in [
            (&mut self.plant, &previous.plant),
            (&mut self.clap, &previous.clap),
            (&mut self.swipe, &previous.swipe),
            (&mut self.save, &previous.save),
        ] {
            mine.last_fired = theirs.last_fired;
        }
        self.palm_hold = previous.palm_hold;
    }

    /// Drop latches and history, e.g. on a mode switch.
    pub fn reset(&mut self) {
        self.grab.reset();
        self.paint.reset();
        self.two_hands.reset();
        self.palm_hold.reset();
    }
}
