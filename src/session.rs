//! The frame loop: pacing, cancellation, control socket and profile reload.
//!
//! Everything runs on the calling thread. The control socket and the
//! profile watcher are drained between ticks, so the engine is never
//! touched concurrently.

use anyhow::Result;
use log::{debug, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
    },
    thread,
    time::{Duration, Instant},
};

use crate::actions::ActionSink;
use crate::config::{Profile, ProfileStore};
use crate::detector::LandmarkDetector;
use crate::engine::{Engine, EngineStatus};
use crate::ipc::{ControlRequest, ControlServer};
use crate::modes::Mode;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: Mode,
    pub fps: u32,
    /// Pace ticks against the wall clock. Off, time advances one frame
    /// per tick with no sleeping.
    pub realtime: bool,
    /// Serve the control socket at this path.
    pub control: Option<PathBuf>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Garden,
            fps: 30,
            realtime: true,
            control: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub events: usize,
    pub elapsed_ms: u64,
    pub status: EngineStatus,
}

/// Raise `flag` on SIGINT or SIGTERM.
pub fn shutdown_on_signals(flag: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("signal {sig}: shutting down after this tick");
            flag.store(true, Ordering::SeqCst);
        }
    });
    Ok(())
}

struct ProfileWatch {
    store: ProfileStore,
    rx: Receiver<notify::Result<notify::Event>>,
    _watcher: RecommendedWatcher,
}

impl ProfileWatch {
    fn start(store: ProfileStore) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        // Editors often replace the file, so watch the directory.
        watcher.watch(&store.profiles_dir, RecursiveMode::NonRecursive)?;
        info!("watching {} for changes", store.active_path().display());
        Ok(Self {
            store,
            rx,
            _watcher: watcher,
        })
    }

    /// The reloaded profile, if the active file changed and still parses.
    fn poll(&mut self) -> Option<Profile> {
        let active = self.store.active_path();
        let mut touched = false;
        while let Ok(res) = self.rx.try_recv() {
            match res {
                Ok(ev) => {
                    let relevant = matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_));
                    if relevant && ev.paths.iter().any(|p| p.file_name() == active.file_name()) {
                        touched = true;
                    }
                }
                Err(e) => warn!("profile watch error: {e}"),
            }
        }
        if !touched {
            return None;
        }
        match self.store.reload() {
            Ok(()) => Some(self.store.profile.clone()),
            Err(e) => {
                warn!("profile reload rejected, keeping last good: {e}");
                None
            }
        }
    }
}

fn handle_request(
    engine: &mut Engine,
    req: ControlRequest,
    now_ms: u64,
    shutdown: &AtomicBool,
) -> serde_json::Value {
    match req {
        ControlRequest::Status => match serde_json::to_value(engine.status()) {
            Ok(data) => serde_json::json!({"ok": true, "data": data}),
            Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
        },
        ControlRequest::Mode { mode } => match mode.parse::<Mode>() {
            Ok(mode) => {
                engine.set_mode(mode, now_ms);
                serde_json::json!({"ok": true, "data": {"mode": mode}})
            }
            Err(e) => serde_json::json!({"ok": false, "error": e}),
        },
        ControlRequest::Reset => {
            engine.request_reset();
            serde_json::json!({"ok": true, "data": "reset queued"})
        }
        ControlRequest::Shutdown => {
            shutdown.store(true, Ordering::SeqCst);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
    }
}

/// Drive `detector` until it runs dry or `shutdown` is raised.
///
/// With a `store`, edits to the active profile are applied between ticks.
pub fn run_session(
    detector: &mut dyn LandmarkDetector,
    profile: Profile,
    store: Option<ProfileStore>,
    opts: &SessionOptions,
    sink: &mut dyn ActionSink,
    shutdown: Arc<AtomicBool>,
) -> Result<SessionSummary> {
    let fps = opts.fps.max(1);
    let frame = Duration::from_secs_f64(1.0 / f64::from(fps));
    let mut engine = Engine::new(profile, opts.mode, 0)?;
    let control = opts.control.clone().map(ControlServer::bind).transpose()?;
    let mut watch = match store {
        Some(store) => match ProfileWatch::start(store) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("profile hot reload disabled: {e}");
                None
            }
        },
        None => None,
    };

    info!("session: mode {} at {fps} fps", opts.mode);
    let start = Instant::now();
    let mut tick: u64 = 0;
    let mut events = 0;
    let mut now_ms = 0;

    while !shutdown.load(Ordering::SeqCst) {
        now_ms = if opts.realtime {
            start.elapsed().as_millis() as u64
        } else {
            tick * 1000 / u64::from(fps)
        };
        if detector.exhausted() {
            info!("session: detector exhausted");
            break;
        }

        let detection = detector.detect(now_ms);
        if shutdown.load(Ordering::SeqCst) {
            debug!("session: discarding detection after shutdown");
            break;
        }
        events += engine.tick(now_ms, detection, sink).len();

        if let Some(server) = &control {
            server.poll(|req| handle_request(&mut engine, req, now_ms, &shutdown));
        }
        if let Some(profile) = watch.as_mut().and_then(ProfileWatch::poll) {
            match engine.apply_profile(profile) {
                Ok(()) => info!("profile reloaded"),
                Err(e) => warn!("profile reload rejected, keeping last good: {e}"),
            }
        }

        tick += 1;
        if opts.realtime {
            let due = frame * tick as u32;
            if let Some(wait) = due.checked_sub(start.elapsed()) {
                thread::sleep(wait);
            }
        }
    }

    let summary = SessionSummary {
        frames: tick,
        events,
        elapsed_ms: now_ms,
        status: engine.status(),
    };
    info!(
        "session: {} frames, {} events, score {}",
        summary.frames, summary.events, summary.status.mode_status.score
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Recorder;
    use crate::detector::ScriptedDetector;

    fn offline(mode: Mode) -> SessionOptions {
        SessionOptions {
            mode,
            fps: 60,
            realtime: false,
            control: None,
        }
    }

    #[test]
    fn session_stops_when_detector_runs_dry() {
        let mut det = ScriptedDetector::for_mode(Mode::Painter).with_duration(2000);
        let mut sink = Recorder::default();
        let summary = run_session(
            &mut det,
            Profile::default(),
            None,
            &offline(Mode::Painter),
            &mut sink,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        // ticks at 0, 16, ..., 2000 ms
        assert_eq!(summary.frames, 121);
        assert!(summary.events > 0);
        assert_eq!(summary.events, sink.events.len());
    }

    #[test]
    fn raised_flag_prevents_any_tick() {
        let mut det = ScriptedDetector::for_mode(Mode::Garden);
        let mut sink = Recorder::default();
        let summary = run_session(
            &mut det,
            Profile::default(),
            None,
            &offline(Mode::Garden),
            &mut sink,
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();
        assert_eq!(summary.frames, 0);
    }

    #[test]
    fn control_requests_mutate_the_engine() {
        let mut engine = Engine::new(Profile::default(), Mode::Garden, 0).unwrap();
        let flag = AtomicBool::new(false);
        let r = handle_request(
            &mut engine,
            ControlRequest::Mode {
                mode: "guitar".into(),
            },
            0,
            &flag,
        );
        assert_eq!(r["ok"], true);
        assert_eq!(engine.mode(), Mode::Guitar);

        let r = handle_request(&mut engine, ControlRequest::Mode { mode: "x".into() }, 0, &flag);
        assert_eq!(r["ok"], false);

        let r = handle_request(&mut engine, ControlRequest::Status, 0, &flag);
        assert_eq!(r["data"]["mode"], "guitar");

        handle_request(&mut engine, ControlRequest::Shutdown, 0, &flag);
        assert!(flag.load(Ordering::SeqCst));
    }
}
