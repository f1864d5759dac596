use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::{Color, ScreenPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigPathError {
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    MissingHomeDirectory,
}

const APP_DIR: &str = "markup-canvas";
const APP_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_ZOOM_MIN: f64 = 0.2;
pub const DEFAULT_ZOOM_MAX: f64 = 5.0;
pub const DEFAULT_WHEEL_ZOOM_SENSITIVITY: f64 = 0.0015;
pub const DEFAULT_HIT_PADDING: f64 = 4.0;
pub const DEFAULT_BRUSH_SIZE: u32 = 6;

/// Engine settings from `config.json`. Every field falls back to its default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub zoom_min: f64,
    pub zoom_max: f64,
    pub wheel_zoom_sensitivity: f64,
    pub hit_padding: f64,
    pub initial_offset: (f64, f64),
    pub default_color: Color,
    pub default_brush_size: u32,
    pub highlight_color: Color,
    pub highlight_extra_width: u32,
    pub badge_radius: f64,
    pub badge_color: Color,
    pub badge_text_color: Color,
    pub badge_font_size: f32,
    pub font_paths: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zoom_min: DEFAULT_ZOOM_MIN,
            zoom_max: DEFAULT_ZOOM_MAX,
            wheel_zoom_sensitivity: DEFAULT_WHEEL_ZOOM_SENSITIVITY,
            hit_padding: DEFAULT_HIT_PADDING,
            initial_offset: (20.0, 20.0),
            default_color: Color::new(0xFF, 0x2D, 0x55),
            default_brush_size: DEFAULT_BRUSH_SIZE,
            highlight_color: Color::new(0x06, 0xB6, 0xD4),
            highlight_extra_width: 6,
            badge_radius: 8.0,
            badge_color: Color::new(0x0D, 0x8D, 0xEA),
            badge_text_color: Color::new(0xFF, 0xFF, 0xFF),
            badge_font_size: 10.0,
            font_paths: default_font_paths(),
        }
    }
}

impl EngineConfig {
    pub fn initial_offset(&self) -> ScreenPoint {
        ScreenPoint::new(self.initial_offset.0, self.initial_offset.1)
    }

    /// Repairs out-of-range values so the rest of the engine can rely on them.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.zoom_min.is_finite() && self.zoom_min > 0.0) {
            self.zoom_min = defaults.zoom_min;
        }
        if !(self.zoom_max.is_finite() && self.zoom_max > 0.0) {
            self.zoom_max = defaults.zoom_max;
        }
        if self.zoom_min > self.zoom_max {
            std::mem::swap(&mut self.zoom_min, &mut self.zoom_max);
        }
        if !(self.wheel_zoom_sensitivity.is_finite() && self.wheel_zoom_sensitivity > 0.0) {
            self.wheel_zoom_sensitivity = defaults.wheel_zoom_sensitivity;
        }
        if !(self.hit_padding.is_finite() && self.hit_padding >= 0.0) {
            self.hit_padding = defaults.hit_padding;
        }
        if !(self.badge_radius.is_finite() && self.badge_radius > 0.0) {
            self.badge_radius = defaults.badge_radius;
        }
        if !(self.badge_font_size.is_finite() && self.badge_font_size > 0.0) {
            self.badge_font_size = defaults.badge_font_size;
        }
        self.default_brush_size = crate::state::clamp_brush_size(self.default_brush_size);
        self
    }
}

fn default_font_paths() -> Vec<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

pub fn load_engine_config() -> EngineConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_engine_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_engine_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> EngineConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return EngineConfig::default(),
    };
    if !path.exists() {
        return EngineConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => parse_engine_config(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            EngineConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            EngineConfig::default()
        }
    }
}

pub fn parse_engine_config(contents: &str) -> Result<EngineConfig, serde_json::Error> {
    serde_json::from_str::<EngineConfig>(contents).map(EngineConfig::normalized)
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
