//! Pan/zoom transform between screen pixels and image pixels.
//!
//! The image origin sits at `offset` on screen and image pixels are scaled by
//! `zoom`, so `screen = offset + image * zoom`.

use crate::config::{EngineConfig, DEFAULT_ZOOM_MAX, DEFAULT_ZOOM_MIN};
use crate::geometry::{ImagePoint, ScreenPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl ZoomLimits {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.min;
        }
        zoom.clamp(self.min, self.max)
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self::new(DEFAULT_ZOOM_MIN, DEFAULT_ZOOM_MAX)
    }
}

/// Measured size of the on-screen viewport element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

impl ViewportSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_measured(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    zoom: f64,
    offset: ScreenPoint,
    limits: ZoomLimits,
    size: Option<ViewportSize>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomLimits::default(), ScreenPoint::default())
    }
}

impl Viewport {
    pub fn new(limits: ZoomLimits, offset: ScreenPoint) -> Self {
        Self {
            zoom: limits.clamp(1.0),
            offset,
            limits,
            size: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            ZoomLimits::new(config.zoom_min, config.zoom_max),
            config.initial_offset(),
        )
    }

    pub const fn zoom(&self) -> f64 {
        self.zoom
    }

    pub const fn offset(&self) -> ScreenPoint {
        self.offset
    }

    pub const fn limits(&self) -> ZoomLimits {
        self.limits
    }

    pub const fn size(&self) -> Option<ViewportSize> {
        self.size
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    pub fn set_size(&mut self, size: ViewportSize) {
        self.size = Some(size);
    }

    pub(crate) fn set_offset(&mut self, offset: ScreenPoint) {
        self.offset = offset;
    }

    pub fn to_image_space(&self, screen: ScreenPoint) -> ImagePoint {
        ImagePoint::new(
            (screen.x - self.offset.x) / self.zoom,
            (screen.y - self.offset.y) / self.zoom,
        )
    }

    pub fn to_screen_space(&self, image: ImagePoint) -> ScreenPoint {
        ScreenPoint::new(
            self.offset.x + image.x * self.zoom,
            self.offset.y + image.y * self.zoom,
        )
    }

    /// Sets the zoom while keeping the image point under `focal` fixed on screen.
    ///
    /// Without an explicit focal point the viewport center is used; if the
    /// viewport has never been measured only the zoom changes.
    pub fn zoom_at(&mut self, new_zoom: f64, focal: Option<ScreenPoint>) {
        let next_zoom = self.limits.clamp(new_zoom);
        let Some(focal) = focal.or_else(|| self.size.map(|size| size.center())) else {
            self.zoom = next_zoom;
            return;
        };
        let anchor = self.to_image_space(focal);
        self.offset = ScreenPoint::new(
            focal.x - anchor.x * next_zoom,
            focal.y - anchor.y * next_zoom,
        );
        self.zoom = next_zoom;
    }

    /// Multiplicative wheel zoom: each tick scales by `exp(-delta_y * sensitivity)`.
    pub fn wheel_zoom(&mut self, delta_y: f64, pointer: ScreenPoint, sensitivity: f64) {
        let factor = (-delta_y * sensitivity).exp();
        self.zoom_at(self.zoom * factor, Some(pointer));
    }

    pub fn pan_by(&mut self, delta_x: f64, delta_y: f64) {
        self.offset = self.offset.offset_by(delta_x, delta_y);
    }

    /// Largest zoom (within limits) that shows the whole image, centered in the viewport.
    pub fn fit_to_viewport(
        &mut self,
        image_width: f64,
        image_height: f64,
        viewport_width: f64,
        viewport_height: f64,
    ) {
        if image_width <= 0.0 || image_height <= 0.0 {
            return;
        }
        let zoom = self
            .limits
            .clamp((viewport_width / image_width).min(viewport_height / image_height));
        self.zoom = zoom;
        self.offset = ScreenPoint::new(
            (viewport_width - image_width * zoom) / 2.0,
            (viewport_height - image_height * zoom) / 2.0,
        );
    }

    /// CSS transform applied to the image container (`transform-origin: 0 0`).
    pub fn css_transform(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            self.offset.x, self.offset.y, self.zoom
        )
    }
}
