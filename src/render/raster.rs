use std::path::PathBuf;

use ab_glyph::{Font, FontArc, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use thiserror::Error;
use tiny_skia::{
    FillRule, IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

use super::{DrawCommand, Scene};
use crate::geometry::{Color, ImagePoint};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("cannot allocate a {width}x{height} canvas")]
    Allocation { width: u32, height: u32 },
    #[error("cannot build {0} path")]
    InvalidPath(&'static str),
}

/// Draws `scene` onto a transparent canvas, in display-list order.
///
/// Badge numerals need a font; without one only the circles are drawn.
pub fn rasterize(scene: &Scene, font: Option<&FontArc>) -> Result<RgbaImage, RenderError> {
    let allocation = RenderError::Allocation {
        width: scene.width,
        height: scene.height,
    };
    let mut pixmap = Pixmap::new(scene.width, scene.height).ok_or_else(|| allocation.clone())?;

    for command in &scene.commands {
        match command {
            DrawCommand::Polyline {
                points,
                color,
                width,
            } => stroke_polyline(&mut pixmap, points, *color, *width),
            DrawCommand::Badge {
                center,
                radius,
                fill,
                label,
                text_color,
                font_size,
            } => {
                fill_circle(&mut pixmap, *center, *radius, *fill)?;
                if let (Some(font), Some(label)) = (font, label) {
                    draw_label(&mut pixmap, *center, label, *text_color, *font_size, font);
                }
            }
        }
    }

    let bytes = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect();
    RgbaImage::from_raw(scene.width, scene.height, bytes).ok_or(allocation)
}

fn paint_for(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    let (r, g, b, a) = color.rgba();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn stroke_polyline(pixmap: &mut Pixmap, points: &[ImagePoint], color: Color, width: f64) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for point in rest {
        pb.line_to(point.x as f32, point.y as f32);
    }
    let Some(path) = pb.finish() else {
        tracing::debug!(points = points.len(), "skipping degenerate polyline");
        return;
    };
    let stroke = Stroke {
        width: width as f32,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Default::default()
    };
    pixmap.stroke_path(&path, &paint_for(color), &stroke, Transform::identity(), None);
}

fn fill_circle(
    pixmap: &mut Pixmap,
    center: ImagePoint,
    radius: f64,
    color: Color,
) -> Result<(), RenderError> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(RenderError::InvalidPath("badge"));
    }
    let path = PathBuilder::from_circle(center.x as f32, center.y as f32, radius as f32)
        .ok_or(RenderError::InvalidPath("badge"))?;
    pixmap.fill_path(
        &path,
        &paint_for(color),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    Ok(())
}

/// Composites `label` centered on `center`.
///
/// The text is laid out on its own transparent tile first. Blending glyph
/// coverage onto transparent black with a premultiplied color leaves the tile
/// premultiplied, so it can be drawn straight onto the pixmap.
fn draw_label(
    pixmap: &mut Pixmap,
    center: ImagePoint,
    label: &str,
    color: Color,
    font_size: f32,
    font: &FontArc,
) {
    let (text_width, text_height) = text_size(font_size, font, label);
    let ascent = font.as_scaled(font_size).ascent();
    let line_height = font.as_scaled(font_size).height().ceil().max(1.0) as u32;

    let mut tile = RgbaImage::new(text_width + 2, line_height + 1);
    let (r, g, b, a) = color.rgba();
    let premultiply = |channel: u8| ((u16::from(channel) * u16::from(a) + 127) / 255) as u8;
    draw_text_mut(
        &mut tile,
        Rgba([premultiply(r), premultiply(g), premultiply(b), a]),
        0,
        0,
        font_size,
        font,
        label,
    );

    let Some(size) = IntSize::from_wh(tile.width(), tile.height()) else {
        return;
    };
    let Some(tile) = Pixmap::from_vec(tile.into_raw(), size) else {
        return;
    };
    // glyph tops sit at `ascent - height` below the tile origin
    let x = (center.x - f64::from(text_width) / 2.0).round() as i32;
    let y = (center.y - f64::from(ascent) + f64::from(text_height) / 2.0).round() as i32;
    pixmap.draw_pixmap(
        x,
        y,
        tile.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// First readable font among `candidates`.
pub fn load_badge_font(candidates: &[PathBuf]) -> Option<FontArc> {
    for path in candidates {
        if let Ok(bytes) = std::fs::read(path) {
            if let Ok(font) = FontArc::try_from_vec(bytes) {
                tracing::debug!(path = %path.display(), "loaded badge font");
                return Some(font);
            }
        }
    }
    tracing::debug!("no badge font found; numerals will be skipped");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(image: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
        image.get_pixel(x, y).0
    }

    #[test]
    fn rasterized_canvas_matches_scene_size_and_stays_transparent() {
        let scene = Scene {
            width: 64,
            height: 32,
            commands: Vec::new(),
        };
        let image = rasterize(&scene, None).expect("empty scene should rasterize");
        assert_eq!(image.dimensions(), (64, 32));
        assert_eq!(pixel(&image, 10, 10), [0, 0, 0, 0]);
    }

    #[test]
    fn polyline_and_badge_paint_their_colors() {
        let scene = Scene {
            width: 60,
            height: 60,
            commands: vec![
                DrawCommand::Polyline {
                    points: vec![ImagePoint::new(5.0, 10.0), ImagePoint::new(55.0, 10.0)],
                    color: Color::new(0xFF, 0, 0),
                    width: 6.0,
                },
                DrawCommand::Badge {
                    center: ImagePoint::new(30.0, 40.0),
                    radius: 8.0,
                    fill: Color::new(0x0D, 0x8D, 0xEA),
                    label: None,
                    text_color: Color::new(0xFF, 0xFF, 0xFF),
                    font_size: 10.0,
                },
            ],
        };
        let image = rasterize(&scene, None).expect("scene should rasterize");
        assert_eq!(pixel(&image, 30, 10), [0xFF, 0, 0, 0xFF]);
        assert_eq!(pixel(&image, 30, 40), [0x0D, 0x8D, 0xEA, 0xFF]);
        assert_eq!(pixel(&image, 30, 25)[3], 0);
    }

    #[test]
    fn zero_sized_scene_is_an_allocation_error() {
        let scene = Scene {
            width: 0,
            height: 10,
            commands: Vec::new(),
        };
        assert_eq!(
            rasterize(&scene, None),
            Err(RenderError::Allocation {
                width: 0,
                height: 10
            })
        );
    }

    #[test]
    fn non_positive_badge_radius_is_rejected() {
        let scene = Scene {
            width: 10,
            height: 10,
            commands: vec![DrawCommand::Badge {
                center: ImagePoint::new(5.0, 5.0),
                radius: 0.0,
                fill: Color::new(0, 0, 0),
                label: Some("2".into()),
                text_color: Color::new(0xFF, 0xFF, 0xFF),
                font_size: 10.0,
            }],
        };
        assert_eq!(
            rasterize(&scene, None),
            Err(RenderError::InvalidPath("badge"))
        );
    }

    #[test]
    fn later_polyline_covers_earlier_badge_and_its_numeral() {
        let font = load_badge_font(&crate::config::EngineConfig::default().font_paths);
        let scene = Scene {
            width: 40,
            height: 40,
            commands: vec![
                DrawCommand::Badge {
                    center: ImagePoint::new(20.0, 20.0),
                    radius: 10.0,
                    fill: Color::new(0x0D, 0x8D, 0xEA),
                    label: Some("8".into()),
                    text_color: Color::new(0xFF, 0xFF, 0xFF),
                    font_size: 16.0,
                },
                DrawCommand::Polyline {
                    points: vec![ImagePoint::new(0.0, 20.0), ImagePoint::new(40.0, 20.0)],
                    color: Color::new(0xFF, 0, 0),
                    width: 14.0,
                },
            ],
        };
        let image = rasterize(&scene, font.as_ref()).expect("scene should rasterize");
        for x in 12..=28 {
            for y in 15..=25 {
                assert_eq!(pixel(&image, x, y), [0xFF, 0, 0, 0xFF], "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn badge_numeral_is_drawn_inside_the_badge() {
        let Some(font) = load_badge_font(&crate::config::EngineConfig::default().font_paths) else {
            return;
        };
        let scene = Scene {
            width: 40,
            height: 40,
            commands: vec![DrawCommand::Badge {
                center: ImagePoint::new(20.0, 20.0),
                radius: 12.0,
                fill: Color::new(0, 0, 0),
                label: Some("8".into()),
                text_color: Color::new(0xFF, 0xFF, 0xFF),
                font_size: 16.0,
            }],
        };
        let image = rasterize(&scene, Some(&font)).expect("scene should rasterize");
        let lit = (10..30)
            .flat_map(|x| (10..30).map(move |y| (x, y)))
            .filter(|&(x, y)| pixel(&image, x, y)[0] > 0x80)
            .count();
        assert!(lit > 0, "numeral should brighten some badge pixels");
        assert_eq!(pixel(&image, 1, 1)[3], 0);
    }

    #[test]
    fn missing_fonts_yield_none() {
        assert!(load_badge_font(&[PathBuf::from("/nonexistent/font.ttf")]).is_none());
    }
}
