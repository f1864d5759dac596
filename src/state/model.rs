use std::fmt;

use crate::config::EngineConfig;
use crate::geometry::Color;

pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 32;

/// Preset colors offered by the tool palette; any other hex color is accepted too.
pub const SWATCHES: [Color; 8] = [
    Color::new(0xFF, 0x2D, 0x55),
    Color::new(0x10, 0xB9, 0x81),
    Color::new(0x0D, 0x8D, 0xEA),
    Color::new(0xF5, 0x9E, 0x0B),
    Color::new(0xEF, 0x44, 0x44),
    Color::new(0xA8, 0x55, 0xF7),
    Color::new(0x11, 0x18, 0x27),
    Color::new(0xFF, 0xFF, 0xFF),
];

pub fn clamp_brush_size(size: u32) -> u32 {
    size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    #[default]
    Select,
    Pan,
    Draw,
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Select => "select",
            Self::Pan => "pan",
            Self::Draw => "draw",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorHint {
    Default,
    Grab,
    Grabbing,
    Crosshair,
}

impl CursorHint {
    pub fn for_mode(mode: ToolMode, gesture_active: bool) -> Self {
        match mode {
            ToolMode::Select => Self::Default,
            ToolMode::Pan if gesture_active => Self::Grabbing,
            ToolMode::Pan => Self::Grab,
            ToolMode::Draw => Self::Crosshair,
        }
    }

    pub const fn as_css(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Grab => "grab",
            Self::Grabbing => "grabbing",
            Self::Crosshair => "crosshair",
        }
    }
}

/// Brush settings applied to strokes drawn from now on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolOptions {
    color: Color,
    brush_size: u32,
    palette_open: bool,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ToolOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            color: config.default_color,
            brush_size: clamp_brush_size(config.default_brush_size),
            palette_open: true,
        }
    }

    pub const fn color(&self) -> Color {
        self.color
    }

    pub const fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub const fn palette_open(&self) -> bool {
        self.palette_open
    }

    /// Returns true when the value actually changed.
    pub fn set_color(&mut self, color: Color) -> bool {
        let changed = self.color != color;
        self.color = color;
        changed
    }

    pub fn set_brush_size(&mut self, size: u32) -> bool {
        let size = clamp_brush_size(size);
        let changed = self.brush_size != size;
        self.brush_size = size;
        changed
    }

    pub fn toggle_palette(&mut self) -> bool {
        self.palette_open = !self.palette_open;
        self.palette_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brush_size_is_clamped_to_slider_range() {
        assert_eq!(clamp_brush_size(0), 1);
        assert_eq!(clamp_brush_size(12), 12);
        assert_eq!(clamp_brush_size(200), 32);

        let mut options = ToolOptions::default();
        assert_eq!(options.brush_size(), 6);
        assert!(options.set_brush_size(99));
        assert_eq!(options.brush_size(), MAX_BRUSH_SIZE);
        assert!(!options.set_brush_size(40));
    }

    #[test]
    fn default_options_use_first_swatch() {
        let options = ToolOptions::default();
        assert_eq!(options.color(), SWATCHES[0]);
        assert_eq!(options.color().to_string(), "#ff2d55");
        assert!(options.palette_open());
    }

    #[test]
    fn cursor_follows_mode_and_pan_gesture() {
        assert_eq!(CursorHint::for_mode(ToolMode::Select, true).as_css(), "default");
        assert_eq!(CursorHint::for_mode(ToolMode::Pan, false).as_css(), "grab");
        assert_eq!(CursorHint::for_mode(ToolMode::Pan, true).as_css(), "grabbing");
        assert_eq!(CursorHint::for_mode(ToolMode::Draw, false).as_css(), "crosshair");
    }

    #[test]
    fn palette_toggle_flips_visibility() {
        let mut options = ToolOptions::default();
        assert!(!options.toggle_palette());
        assert!(options.toggle_palette());
    }
}
