use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::interaction::Color;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: Option<String>,
}

/// World geometry shared by every mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct World {
    /// Width of the play space mapped from the full camera width.
    pub width: f32,
    /// Height mapped from the full camera height; y = 0 is the floor.
    pub height: f32,
    /// Scale from detector depth to world z.
    pub depth: f32,
    /// Match the primary hand to the previous one by wrist proximity.
    pub stable_primary: bool,
    /// Upper bound on the physics step in seconds.
    pub max_physics_dt: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Smoothing {
    pub min_alpha: f32,
    pub max_alpha: f32,
    /// Alpha gained per unit of speed (normalised units per second).
    pub speed_gain: f32,
    /// Jumps at or above this distance snap instead of blending.
    pub teleport_distance: f32,
    pub min_dt: f32,
    /// Gaps longer than this are treated as a teleport.
    pub max_dt: f32,
    pub velocity_alpha: f32,
    /// Per-frame velocity multiplier while no hand is visible.
    pub velocity_decay: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Gestures {
    pub pinch_engage: f32,
    pub pinch_release: f32,
    pub min_hand_scale: f32,
    pub extend_ratio: f32,
    pub curl_ratio: f32,
    pub curl_palm_ratio: f32,
    pub thumb_away_ratio: f32,
    pub clasp_distance: f32,
    pub clasp_max_speed: f32,
    pub clap_distance: f32,
    pub clap_speed: f32,
    pub edge_margin: f32,
    pub align_tolerance: f32,
    pub swipe_speed: f32,
    pub plant_cooldown_ms: u64,
    pub reset_cooldown_ms: u64,
    pub swipe_cooldown_ms: u64,
    pub haptic_pulse_ms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Garden {
    pub gravity: f32,
    pub flower_radius: f32,
    pub min_mass: f32,
    pub max_mass: f32,
    pub grab_radius: f32,
    pub grab_stiffness: f32,
    pub throw_power: f32,
    pub min_throw_up: f32,
    pub base_drag: f32,
    pub base_restitution: f32,
    pub impact_damping: f32,
    pub settle_speed: f32,
    pub ground_friction: f32,
    pub bloom_speed: f32,
    pub bloom_count: usize,
    pub bloom_radius: f32,
    pub max_flowers: usize,
    pub cull_distance: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Arcade {
    pub aim_radius: f32,
    pub hammer_ratio: f32,
    pub shoot_cooldown_ms: u64,
    pub max_targets: usize,
    pub spawn_interval_ms: u64,
    pub target_radius: f32,
    pub target_speed: f32,
    pub target_depth: f32,
    pub score_value: u32,
    pub burst_particles: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WallBall {
    pub gravity: f32,
    pub drag: f32,
    pub ball_radius: f32,
    pub rest_position: [f32; 3],
    pub grab_range: f32,
    pub throw_force: f32,
    pub slap_radius: f32,
    pub slap_speed: f32,
    pub slap_power: f32,
    pub slap_cooldown_ms: u64,
    pub floor_restitution: f32,
    pub wall_restitution: f32,
    pub room_half_width: f32,
    pub ceiling: f32,
    pub back_wall: f32,
    pub front_limit: f32,
    pub idle_reset_ms: u64,
    pub max_targets: usize,
    pub target_radius: f32,
    pub spawn_interval_ms: u64,
    pub score_value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Guitar {
    /// Fretboard rectangle in mirrored view space: [x0, y0, x1, y1].
    pub region: [f32; 4],
    pub fret_pinch_ratio: f32,
    pub note_cooldown_ms: u64,
    pub strum_speed: f32,
    pub strum_cooldown_ms: u64,
    pub strum_window_ms: u64,
    pub strum_stagger_ms: u32,
    /// Open-string frequencies in Hz, string 1 first.
    pub open_strings: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Painter {
    pub paint_engage: f32,
    pub paint_release: f32,
    /// Distance between interpolated marks in view units.
    pub step: f32,
    pub max_steps: usize,
    /// Width of the palette strip on the left edge of the view.
    pub palette_width: f32,
    pub palette: Vec<Color>,
    pub color_cooldown_ms: u64,
    pub base_size: f32,
    pub taper_ms: u64,
    pub save_hold_ms: u64,
    pub save_cooldown_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub meta: Meta,
    pub world: World,
    pub smoothing: Smoothing,
    pub gestures: Gestures,
    pub garden: Garden,
    pub arcade: Arcade,
    pub wallball: WallBall,
    pub guitar: Guitar,
    pub painter: Painter,
}

impl Default for World {
    fn default() -> Self {
        Self {
            width: 4.0,
            height: 3.0,
            depth: 2.0,
            stable_primary: true,
            max_physics_dt: 0.05,
            seed: 7,
        }
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            min_alpha: 0.25,
            max_alpha: 0.85,
            speed_gain: 0.5,
            teleport_distance: 0.2,
            min_dt: 0.001,
            max_dt: 0.25,
            velocity_alpha: 0.35,
            velocity_decay: 0.85,
        }
    }
}

impl Default for Gestures {
    fn default() -> Self {
        Self {
            pinch_engage: 0.35,
            pinch_release: 0.55,
            min_hand_scale: 1e-4,
            extend_ratio: 1.1,
            curl_ratio: 0.9,
            curl_palm_ratio: 0.8,
            thumb_away_ratio: 0.5,
            clasp_distance: 1.0,
            clasp_max_speed: 1.5,
            clap_distance: 1.5,
            clap_speed: 4.0,
            edge_margin: 0.1,
            align_tolerance: 1.0,
            swipe_speed: 1.8,
            plant_cooldown_ms: 1500,
            reset_cooldown_ms: 1500,
            swipe_cooldown_ms: 800,
            haptic_pulse_ms: 20,
        }
    }
}

impl Default for Garden {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            flower_radius: 0.1,
            min_mass: 0.5,
            max_mass: 2.0,
            grab_radius: 0.5,
            grab_stiffness: 120.0,
            throw_power: 1.2,
            min_throw_up: 1.5,
            base_drag: 0.4,
            base_restitution: 0.6,
            impact_damping: 0.05,
            settle_speed: 0.6,
            ground_friction: 4.0,
            bloom_speed: 5.0,
            bloom_count: 2,
            bloom_radius: 0.5,
            max_flowers: 30,
            cull_distance: 12.0,
        }
    }
}

impl Default for Arcade {
    fn default() -> Self {
        Self {
            aim_radius: 0.15,
            hammer_ratio: 0.3,
            shoot_cooldown_ms: 250,
            max_targets: 5,
            spawn_interval_ms: 900,
            target_radius: 0.2,
            target_speed: 0.4,
            target_depth: -2.0,
            score_value: 10,
            burst_particles: 16,
        }
    }
}

impl Default for WallBall {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            drag: 0.1,
            ball_radius: 0.15,
            rest_position: [0.0, 1.0, 0.0],
            grab_range: 0.4,
            throw_force: 1.5,
            slap_radius: 0.35,
            slap_speed: 2.5,
            slap_power: 1.2,
            slap_cooldown_ms: 200,
            floor_restitution: 0.7,
            wall_restitution: 0.8,
            room_half_width: 2.0,
            ceiling: 4.0,
            back_wall: -6.0,
            front_limit: 2.0,
            idle_reset_ms: 4000,
            max_targets: 3,
            target_radius: 0.5,
            spawn_interval_ms: 1200,
            score_value: 25,
        }
    }
}

impl Default for Guitar {
    fn default() -> Self {
        Self {
            region: [0.55, 0.15, 0.95, 0.85],
            fret_pinch_ratio: 0.45,
            note_cooldown_ms: 150,
            strum_speed: 3.0,
            strum_cooldown_ms: 300,
            strum_window_ms: 300,
            strum_stagger_ms: 30,
            open_strings: vec![329.63, 246.94, 196.0, 146.83, 110.0, 82.41],
        }
    }
}

impl Default for Painter {
    fn default() -> Self {
        Self {
            paint_engage: 0.3,
            paint_release: 0.5,
            step: 0.01,
            max_steps: 64,
            palette_width: 0.1,
            palette: vec![
                Color::rgb(0xff, 0x33, 0x66),
                Color::rgb(0xff, 0xcc, 0x00),
                Color::rgb(0x33, 0xcc, 0x66),
                Color::rgb(0x33, 0x99, 0xff),
                Color::rgb(0xff, 0xff, 0xff),
            ],
            color_cooldown_ms: 600,
            base_size: 0.02,
            taper_ms: 200,
            save_hold_ms: 1000,
            save_cooldown_ms: 1500,
        }
    }
}

impl Profile {
    pub fn from_toml(text: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(text)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Self::from_toml(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_toml(default_profile_text())
    }
}

/// On-disk profile store, `~/.config/handplay`.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("no home directory"))?;
    Ok(dirs.home_dir().join(".config").join("handplay"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open(config_dir()?)
    }

    /// Open (and seed if needed) a store rooted at `config_dir`.
    pub fn open(config_dir: PathBuf) -> Result<Self> {
        let profiles_dir = config_dir.join("profiles");
        fs::create_dir_all(&profiles_dir)?;

        let def_path = profiles_dir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = config_dir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = Profile::from_path(&profiles_dir.join(format!("{active_name}.toml")))?;

        Ok(Self {
            active_name,
            profile,
            config_dir,
            profiles_dir,
            active_ptr,
        })
    }

    pub fn active_path(&self) -> PathBuf {
        self.profile_path(&self.active_name)
    }

    fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    /// Re-read the active profile; the previous one is kept on error.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = Profile::from_path(&self.active_path())?;
        Ok(())
    }

    /// Switch to `name` for this process only; the pointer file is untouched.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        self.profile = Profile::from_path(&p)?;
        self.active_name = name.to_string();
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.select(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }
}

fn check_hysteresis(section: &str, engage: f32, release: f32) -> Result<()> {
    if !(engage > 0.0 && engage < release) {
        return Err(anyhow!(
            "{section}: engage ({engage}) must be positive and below release ({release})"
        ));
    }
    Ok(())
}

fn check_positive(name: &str, v: f32) -> Result<()> {
    if !(v.is_finite() && v > 0.0) {
        return Err(anyhow!("{name} must be a positive number, got {v}"));
    }
    Ok(())
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    let s = &p.smoothing;
    for (name, alpha) in [
        ("smoothing.min_alpha", s.min_alpha),
        ("smoothing.max_alpha", s.max_alpha),
        ("smoothing.velocity_alpha", s.velocity_alpha),
        ("smoothing.velocity_decay", s.velocity_decay),
    ] {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(anyhow!("{name} must be in (0,1), got {alpha}"));
        }
    }
    if s.min_alpha > s.max_alpha {
        return Err(anyhow!("smoothing.min_alpha must not exceed max_alpha"));
    }
    check_positive("smoothing.teleport_distance", s.teleport_distance)?;
    check_positive("smoothing.min_dt", s.min_dt)?;
    if s.max_dt <= s.min_dt {
        return Err(anyhow!("smoothing.max_dt must exceed min_dt"));
    }

    check_hysteresis("gestures.pinch", p.gestures.pinch_engage, p.gestures.pinch_release)?;
    check_hysteresis("painter.paint", p.painter.paint_engage, p.painter.paint_release)?;
    check_positive("gestures.min_hand_scale", p.gestures.min_hand_scale)?;
    check_positive("world.max_physics_dt", p.world.max_physics_dt)?;
    check_positive("painter.step", p.painter.step)?;

    for (name, ms) in [
        ("gestures.plant_cooldown_ms", p.gestures.plant_cooldown_ms),
        ("gestures.reset_cooldown_ms", p.gestures.reset_cooldown_ms),
        ("gestures.swipe_cooldown_ms", p.gestures.swipe_cooldown_ms),
        ("arcade.shoot_cooldown_ms", p.arcade.shoot_cooldown_ms),
        ("wallball.slap_cooldown_ms", p.wallball.slap_cooldown_ms),
        ("guitar.note_cooldown_ms", p.guitar.note_cooldown_ms),
        ("guitar.strum_cooldown_ms", p.guitar.strum_cooldown_ms),
        ("painter.color_cooldown_ms", p.painter.color_cooldown_ms),
        ("painter.save_cooldown_ms", p.painter.save_cooldown_ms),
    ] {
        if ms == 0 {
            return Err(anyhow!("{name} must be a positive duration"));
        }
    }

    if p.guitar.open_strings.len() != crate::modes::guitar::STRINGS {
        return Err(anyhow!(
            "guitar.open_strings needs {} entries, got {}",
            crate::modes::guitar::STRINGS,
            p.guitar.open_strings.len()
        ));
    }
    let [x0, y0, x1, y1] = p.guitar.region;
    if !(x0 < x1 && y0 < y1) {
        return Err(anyhow!("guitar.region must be [x0, y0, x1, y1] with x0<x1, y0<y1"));
    }
    if p.painter.palette.is_empty() {
        return Err(anyhow!("painter.palette must not be empty"));
    }
    if p.garden.min_mass <= 0.0 || p.garden.min_mass > p.garden.max_mass {
        return Err(anyhow!("garden mass range must satisfy 0 < min_mass <= max_mass"));
    }
    Ok(())
}
