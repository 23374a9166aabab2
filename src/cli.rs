use anyhow::{Result, anyhow};
use log::warn;
use pico_args::Arguments;
use std::{
    env,
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
    sync::{Arc, atomic::AtomicBool},
};

use handplay::actions::JsonLinesSink;
use handplay::config::{Profile, ProfileStore};
use handplay::detector::{LandmarkDetector, ReplayDetector, ScriptedDetector};
use handplay::ipc;
use handplay::modes::Mode;
use handplay::session::{self, SessionOptions, SessionSummary};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // Read by main before logging starts
    pargs.contains("-v");
    pargs.contains("--verbose");

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let mode: Option<Mode> = pargs.opt_value_from_str("--mode")?;
            let fps: Option<u32> = pargs.opt_value_from_str("--fps")?;
            let profile: Option<String> = pargs.opt_value_from_str("--profile")?;
            let events: Option<PathBuf> = pargs.opt_value_from_str("--events")?;
            let effects = pargs.contains("--effects");
            let fast = pargs.contains("--fast");
            let no_control = pargs.contains("--no-control");
            let recording: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handplay run <recording.jsonl> [--mode M] ..."))?;

            let mut detector = ReplayDetector::open(&recording)?;
            let opts = SessionOptions {
                mode: mode.unwrap_or(Mode::Garden),
                fps: fps.unwrap_or(30),
                realtime: !fast,
                control: control_path(no_control)?,
            };
            let summary = drive(&mut detector, profile.as_deref(), &opts, events, effects)?;
            print_summary(&summary);
            Ok(())
        }

        Some("demo") => {
            let mode: Option<Mode> = pargs.opt_value_from_str("--mode")?;
            let seconds: Option<u64> = pargs.opt_value_from_str("--seconds")?;
            let fps: Option<u32> = pargs.opt_value_from_str("--fps")?;
            let profile: Option<String> = pargs.opt_value_from_str("--profile")?;
            let effects = pargs.contains("--effects");
            let fast = pargs.contains("--fast");
            let no_control = pargs.contains("--no-control");

            let mode = mode.unwrap_or(Mode::Garden);
            let mut detector = ScriptedDetector::for_mode(mode);
            if let Some(s) = seconds {
                detector = detector.with_duration(s * 1000);
            } else if fast {
                // one pass of the script when nothing paces it
                let once = detector.loop_ms();
                detector = detector.with_duration(once);
            }
            let opts = SessionOptions {
                mode,
                fps: fps.unwrap_or(30),
                realtime: !fast,
                control: control_path(no_control)?,
            };
            let summary = drive(&mut detector, profile.as_deref(), &opts, None, effects)?;
            print_summary(&summary);
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reset") => {
            let r = ipc::client_request(serde_json::json!({"op":"reset"}))?;
            print_response(&r);
            Ok(())
        }

        Some("mode") => {
            let mode: Mode = pargs
                .free_from_str()
                .map_err(|e| anyhow!("usage: handplay mode <mode>: {e}"))?;
            let r = ipc::client_request(serde_json::json!({"op":"mode","mode":mode}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handplay use <profile_name>"))?;
            let mut store = ProfileStore::load_or_install_default()?;
            store.set_active(&name)?;
            println!("ok: active profile is now {name}");
            println!("a running session picks it up on its next reload");
            Ok(())
        }

        Some("list") => {
            let store = ProfileStore::load_or_install_default()?;
            for name in store.list_profiles() {
                let mark = if name == store.active_name { '*' } else { ' ' };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("check") => {
            let file: Option<PathBuf> = pargs.free_from_str().ok();
            let path = match file {
                Some(p) => p,
                None => ProfileStore::load_or_install_default()?.active_path(),
            };
            Profile::from_path(&path)?;
            println!("ok: {}", path.display());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn control_path(disabled: bool) -> Result<Option<PathBuf>> {
    if disabled {
        return Ok(None);
    }
    Ok(Some(ipc::socket_path()?))
}

/// Resolve the profile, wire signals and a sink, and run one session.
fn drive(
    detector: &mut dyn LandmarkDetector,
    profile_name: Option<&str>,
    opts: &SessionOptions,
    events: Option<PathBuf>,
    effects: bool,
) -> Result<SessionSummary> {
    let (profile, store) = match ProfileStore::load_or_install_default() {
        Ok(mut store) => {
            if let Some(name) = profile_name {
                store.select(name)?;
            }
            (store.profile.clone(), Some(store))
        }
        Err(e) if profile_name.is_none() => {
            warn!("profile store unavailable, using built-in defaults: {e}");
            (Profile::builtin()?, None)
        }
        Err(e) => return Err(e),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    session::shutdown_on_signals(shutdown.clone())?;

    match events {
        Some(path) => {
            let file = File::create(&path)
                .map_err(|e| anyhow!("failed to create {}: {e}", path.display()))?;
            let mut sink = JsonLinesSink::new(BufWriter::new(file), effects);
            let summary = session::run_session(detector, profile, store, opts, &mut sink, shutdown)?;
            sink.flush()?;
            Ok(summary)
        }
        None => {
            let mut sink = JsonLinesSink::new(io::stdout().lock(), effects);
            let summary = session::run_session(detector, profile, store, opts, &mut sink, shutdown)?;
            sink.flush()?;
            Ok(summary)
        }
    }
}

fn print_help() {
    println!(
        r#"handplay - hand-gesture playground engine

USAGE:
  handplay help [command]                 Show general or command-specific help
  handplay run <recording.jsonl>          Replay recorded landmarks through a mode
  handplay demo                           Play a scripted hand performance
  handplay status                         Show the running session's state
  handplay mode <mode>                    Switch the running session's mode
  handplay reset                          Queue a scene reset
  handplay stop                           Stop the running session
  handplay use <name>                     Switch active profile
  handplay list                           List profiles
  handplay check [file]                   Validate a profile

MODES:
  garden, arcade, wallball, guitar, painter

FLAGS:
  -v, --verbose                           Debug logging (RUST_LOG overrides)

TIPS:
  - Profiles: ~/.config/handplay/profiles
  - Active profile pointer: ~/.config/handplay/active
  - Control socket: ~/.local/run/handplay.sock
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: handplay run <recording.jsonl> [--mode M] [--fps N] [--profile NAME]\n                    [--events FILE] [--effects] [--fast] [--no-control]\nReplays a JSON-lines landmark recording. Events go to stdout unless --events is given.\n--fast ticks as quickly as possible instead of at the frame rate."
        ),
        "demo" => println!(
            "usage: handplay demo [--mode M] [--seconds S] [--fps N] [--profile NAME] [--effects] [--fast] [--no-control]\nLoops a scripted performance for the mode until stopped or S seconds pass."
        ),
        "stop" => println!("usage: handplay stop\nStops the running session after its current frame."),
        "status" => println!(
            "usage: handplay status\nShows mode, frame count, interaction flags, objects and score."
        ),
        "mode" => println!(
            "usage: handplay mode <mode>\nSwitches mode; the new mode starts from a fresh scene."
        ),
        "reset" => println!("usage: handplay reset\nClears the scene on the next frame."),
        "use" => {
            println!("usage: handplay use <name>\nSwitches active profile to <name>.")
        }
        "list" => {
            println!("usage: handplay list\nLists available profiles; marks active with '*'.")
        }
        "check" => println!(
            "usage: handplay check [file]\nValidates a profile file, or the active profile."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

fn print_summary(summary: &SessionSummary) {
    let text = serde_json::to_string_pretty(summary).unwrap_or_default();
    let mut err = io::stderr().lock();
    let _ = writeln!(err, "{text}");
}
