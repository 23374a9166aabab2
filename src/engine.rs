//! One tick: detection result in, events/effects/sounds out.
//!
//! Order within a tick is fixed: smoothing, generic classification, mode
//! classification, event dispatch, physics. Physics reads what
//! classification wrote on the same [`InteractionState`].

use glam::Vec3;
use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::actions::{ActionSink, SoundCue};
use crate::config::Profile;
use crate::error::{DetectorError, GestureError};
use crate::gestures::{FrameInput, GestureClassifier, GestureEvent, HandPose};
use crate::interaction::{InteractionState, WorldMapping};
use crate::landmarks::{HandLandmarks, RawHand, order_hands};
use crate::modes::{Mode, ModeHandler, ModeStatus, StepFrame, create_handler};
use crate::tracker::HandTracker;

/// Step used for the very first tick, before any interval is known.
const FIRST_TICK_DT: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub mode: Mode,
    pub frames: u64,
    pub hovering: bool,
    pub grabbing: bool,
    pub pointing: bool,
    pub painting: bool,
    pub detector_error_streak: u32,
    #[serde(flatten)]
    pub mode_status: ModeStatus,
}

pub struct Engine {
    profile: Profile,
    tracker: HandTracker,
    classifier: GestureClassifier,
    handler: Box<dyn ModeHandler>,
    state: InteractionState,
    last_tick_ms: Option<u64>,
    primary_wrist: Option<Vec3>,
    error_streak: u32,
    pending_reset: bool,
    frames: u64,
    last_events: Vec<GestureEvent>,
}

impl Engine {
    pub fn new(profile: Profile, mode: Mode, now_ms: u64) -> Result<Self, GestureError> {
        let mapping = WorldMapping::new(&profile.world);
        let classifier = GestureClassifier::new(&profile.gestures, &profile.painter, mapping)?;
        Ok(Self {
            tracker: HandTracker::new(profile.smoothing.clone(), mapping),
            handler: create_handler(mode, &profile, now_ms),
            classifier,
            profile,
            state: InteractionState::default(),
            last_tick_ms: None,
            primary_wrist: None,
            error_streak: 0,
            pending_reset: false,
            frames: 0,
            last_events: Vec::new(),
        })
    }

    pub fn mode(&self) -> Mode {
        self.handler.mode()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn handler(&self) -> &dyn ModeHandler {
        self.handler.as_ref()
    }

    /// Events fired by the most recent tick.
    pub fn last_events(&self) -> &[GestureEvent] {
        &self.last_events
    }

    /// Swap the active mode. Object collections and gesture latches start
    /// empty; the tracker keeps its smoothing history.
    pub fn set_mode(&mut self, mode: Mode, now_ms: u64) {
        info!("mode {} -> {mode}", self.handler.mode());
        self.handler = create_handler(mode, &self.profile, now_ms);
        self.classifier.reset();
        self.state.release_all();
        self.state.cursors.clear();
    }

    /// Queue the dedicated reset; applied on the next tick.
    pub fn request_reset(&mut self) {
        self.pending_reset = true;
    }

    /// Apply a new profile between ticks. On error nothing changes.
    pub fn apply_profile(&mut self, profile: Profile) -> Result<(), GestureError> {
        let mapping = WorldMapping::new(&profile.world);
        let mut classifier = GestureClassifier::new(&profile.gestures, &profile.painter, mapping)?;
        classifier.carry_state_from(&self.classifier);
        self.classifier = classifier;
        self.tracker.reconfigure(profile.smoothing.clone(), mapping);
        self.handler.reconfigure(&profile);
        self.profile = profile;
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            mode: self.handler.mode(),
            frames: self.frames,
            hovering: self.state.is_hovering,
            grabbing: self.state.is_grabbing,
            pointing: self.state.is_pointing,
            painting: self.state.is_painting,
            detector_error_streak: self.error_streak,
            mode_status: self.handler.status(),
        }
    }

    fn frame_dt(&mut self, now_ms: u64) -> f32 {
        let dt = match self.last_tick_ms {
            Some(prev) => now_ms.saturating_sub(prev) as f32 / 1000.0,
            None => FIRST_TICK_DT,
        };
        self.last_tick_ms = Some(now_ms);
        dt
    }

    fn accept_hands(&mut self, detection: Result<Vec<RawHand>, DetectorError>) -> Vec<HandLandmarks> {
        let raw = match detection {
            Ok(raw) => {
                if self.error_streak > 0 {
                    debug!("detector recovered after {} failed frames", self.error_streak);
                }
                self.error_streak = 0;
                raw
            }
            Err(e) => {
                self.error_streak += 1;
                if self.error_streak == 1 {
                    warn!("detector error, treating frame as empty: {e}");
                } else {
                    debug!("detector error ({} in a row): {e}", self.error_streak);
                }
                Vec::new()
            }
        };

        raw.iter()
            .filter_map(|r| match HandLandmarks::try_from(r) {
                Ok(hand) => Some(hand),
                Err(e) => {
                    debug!("skipping malformed hand: {e}");
                    None
                }
            })
            .collect()
    }

    /// Run one frame. Never fails: detector errors count as "no hand".
    pub fn tick(
        &mut self,
        now_ms: u64,
        detection: Result<Vec<RawHand>, DetectorError>,
        sink: &mut dyn ActionSink,
    ) -> &[GestureEvent] {
        let dt = self.frame_dt(now_ms);
        let mut hands = self.accept_hands(detection);
        order_hands(&mut hands, self.primary_wrist, self.profile.world.stable_primary);
        let primary = hands.first();
        self.primary_wrist = primary.map(|h| h.wrist());

        let tracked = self.tracker.update(primary, dt);
        let pose = match (primary, tracked.as_ref()) {
            (Some(hand), Some(t)) => Some(HandPose::measure(hand, t, &self.profile.gestures)),
            _ => None,
        };
        let input = FrameInput {
            now_ms,
            dt,
            primary,
            secondary: hands.get(1),
            tracked: tracked.as_ref(),
            pose: pose.as_ref(),
            cursor_velocity: self.tracker.cursor_velocity(),
            palm_velocity: self.tracker.palm_velocity(),
        };

        let mut events = Vec::new();
        let gestures = self.handler.gestures();
        self.classifier
            .classify(&input, gestures, &mut self.state, &mut events);
        self.handler.classify(&input, &mut self.state, &mut events);
        if std::mem::take(&mut self.pending_reset) {
            events.push(GestureEvent::Reset);
        }

        sink.set_clock(now_ms);
        for event in &events {
            sink.emit(event);
            match event {
                GestureEvent::GrabStart | GestureEvent::PaintStart | GestureEvent::PointStart => {
                    if let Err(e) = sink.haptic(&[self.profile.gestures.haptic_pulse_ms]) {
                        trace!("haptic skipped: {e}");
                    }
                }
                GestureEvent::Reset => {
                    self.handler.reset(now_ms);
                    sink.sound(SoundCue::ResetWhoosh, self.state.cursor);
                    info!("{} reset", self.handler.mode());
                }
                _ => debug!("event {event:?}"),
            }
        }

        let physics_dt = dt.min(self.profile.world.max_physics_dt);
        self.handler.step(&mut StepFrame {
            now_ms,
            dt: physics_dt,
            events: &events,
            state: &mut self.state,
            sink,
        });

        self.frames += 1;
        self.last_events = events;
        &self.last_events
    }
}
