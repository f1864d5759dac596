//! Display list for the annotation overlay.
//!
//! The scene is rebuilt from scratch whenever anything visible changes; hosts
//! either replay the commands on their own canvas or call [`rasterize`].

mod raster;

use crate::comments::CommentLinker;
use crate::config::EngineConfig;
use crate::geometry::{Color, ImagePoint};
use crate::markup::{StrokeId, StrokeRecord, MIN_STROKE_POINTS};

pub use raster::{load_badge_font, rasterize, RenderError};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Open polyline with round caps and joins.
    Polyline {
        points: Vec<ImagePoint>,
        color: Color,
        width: f64,
    },
    /// Filled comment-count circle, with the count when non-zero.
    Badge {
        center: ImagePoint,
        radius: f64,
        fill: Color,
        label: Option<String>,
        text_color: Color,
        font_size: f32,
    },
}

/// Commands in back-to-front order on a canvas the size of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    pub commands: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub highlight_color: Color,
    pub highlight_extra_width: u32,
    pub badge_radius: f64,
    pub badge_color: Color,
    pub badge_text_color: Color,
    pub badge_font_size: f32,
}

impl RenderStyle {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            highlight_color: config.highlight_color,
            highlight_extra_width: config.highlight_extra_width,
            badge_radius: config.badge_radius,
            badge_color: config.badge_color,
            badge_text_color: config.badge_text_color,
            badge_font_size: config.badge_font_size,
        }
    }

    pub fn highlight_width(&self, stroke_size: u32) -> f64 {
        f64::from(stroke_size.saturating_add(self.highlight_extra_width).max(2))
    }
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// The stroke currently being drawn.
#[derive(Debug, Clone, Copy)]
pub struct InProgressStroke<'a> {
    pub path: &'a [ImagePoint],
    pub color: Color,
    pub size: u32,
}

pub struct SceneInput<'a> {
    pub width: u32,
    pub height: u32,
    pub strokes: &'a [StrokeRecord],
    pub comments: &'a CommentLinker,
    pub selected: Option<&'a StrokeId>,
    pub in_progress: Option<InProgressStroke<'a>>,
}

pub fn build_scene(input: SceneInput<'_>, style: &RenderStyle) -> Scene {
    let mut commands = Vec::with_capacity(input.strokes.len() * 2 + 2);

    // the highlight is composited beneath everything so the stroke itself stays on top
    if let Some(selected) = input
        .selected
        .and_then(|id| input.strokes.iter().find(|stroke| &stroke.id == id))
    {
        push_polyline(
            &mut commands,
            &selected.path,
            style.highlight_color,
            style.highlight_width(selected.size),
        );
    }

    for stroke in input.strokes {
        push_polyline(
            &mut commands,
            &stroke.path,
            stroke.color,
            f64::from(stroke.size),
        );
        let count = input.comments.count_for(&stroke.id);
        commands.push(DrawCommand::Badge {
            center: stroke.bbox.center(),
            radius: style.badge_radius,
            fill: style.badge_color,
            label: (count > 0).then(|| count.to_string()),
            text_color: style.badge_text_color,
            font_size: style.badge_font_size,
        });
    }

    if let Some(current) = input.in_progress {
        push_polyline(&mut commands, current.path, current.color, f64::from(current.size));
    }

    Scene {
        width: input.width,
        height: input.height,
        commands,
    }
}

fn push_polyline(commands: &mut Vec<DrawCommand>, path: &[ImagePoint], color: Color, width: f64) {
    if path.len() < MIN_STROKE_POINTS {
        return;
    }
    commands.push(DrawCommand::Polyline {
        points: path.to_vec(),
        color,
        width,
    });
}
