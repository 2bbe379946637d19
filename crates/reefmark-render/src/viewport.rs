//! Pan/zoom state mapping screen pixels to image pixels.
//!
//! `screen = (image - origin) * scale`, so `origin` is the image point shown
//! at the top-left corner of the surface.

use glam::{Affine2, Vec2};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    /// Exponent step per wheel notch.
    pub zoom_intensity: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            zoom_intensity: 0.2,
            min_scale: 1e-3,
            max_scale: 1e3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub config: ViewportConfig,
    scale: f32,
    origin: Vec2,
    screen: Vec2,
    image: Vec2,
}

impl Viewport {
    pub fn new(config: ViewportConfig, screen_width: u32, screen_height: u32) -> Self {
        Self {
            config,
            scale: 1.0,
            origin: Vec2::ZERO,
            screen: Vec2::new(screen_width as f32, screen_height as f32),
            image: Vec2::ZERO,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn screen_size(&self) -> Vec2 {
        self.screen
    }

    pub fn set_view(&mut self, scale: f32, origin: Vec2) {
        self.scale = scale.clamp(self.config.min_scale, self.config.max_scale);
        self.origin = origin;
    }

    /// Zoom around `mouse` (screen pixels) by one wheel notch. Scrolling up
    /// (`delta_y < 0`) zooms in; `delta_y == 0` does nothing. The image point
    /// under the cursor stays put.
    pub fn zoom_at(&mut self, mouse: Vec2, delta_y: f32) -> bool {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return false;
        }
        let wheel = if delta_y < 0.0 { 1.0 } else { -1.0 };
        self.zoom_by(mouse, (wheel * self.config.zoom_intensity).exp())
    }

    /// Zoom by `factor` keeping the image point under `anchor` fixed.
    pub fn zoom_by(&mut self, anchor: Vec2, factor: f32) -> bool {
        let target = (self.scale * factor).clamp(self.config.min_scale, self.config.max_scale);
        if target == self.scale {
            return false;
        }
        let zoom = target / self.scale;
        self.origin -= anchor / (self.scale * zoom) - anchor / self.scale;
        self.scale = target;
        true
    }

    /// One step in or out around the surface center.
    pub fn zoom_step(&mut self, zoom_in: bool) -> bool {
        let wheel = if zoom_in { 1.0 } else { -1.0 };
        self.zoom_by(self.screen / 2.0, (wheel * self.config.zoom_intensity).exp())
    }

    /// Drag by `delta` screen pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.origin -= delta / self.scale;
    }

    /// Fit the image inside the surface and center it.
    pub fn reset_viewpoint(&mut self) {
        if self.image.x <= 0.0 || self.image.y <= 0.0 || self.screen.x <= 0.0 || self.screen.y <= 0.0 {
            self.scale = 1.0;
            self.origin = Vec2::ZERO;
            return;
        }
        let fit = self.screen / self.image;
        self.scale = fit.x.min(fit.y);
        let offset = (self.screen - self.image * self.scale) / 2.0;
        self.origin = -offset / self.scale;
        debug!(scale = self.scale, origin = ?self.origin, "Viewpoint reset");
    }

    /// Show a new image, fitted to the surface.
    pub fn set_image_size(&mut self, width: u32, height: u32) {
        self.image = Vec2::new(width as f32, height as f32);
        self.reset_viewpoint();
    }

    /// The surface changed size; the view is refitted.
    pub fn resize(&mut self, screen_width: u32, screen_height: u32) {
        self.screen = Vec2::new(screen_width as f32, screen_height as f32);
        self.reset_viewpoint();
    }

    #[inline]
    pub fn screen_to_image(&self, p: Vec2) -> Vec2 {
        p / self.scale + self.origin
    }

    #[inline]
    pub fn image_to_screen(&self, p: Vec2) -> Vec2 {
        (p - self.origin) * self.scale
    }

    /// Image-to-screen transform: scale, then translate by `-origin`.
    pub fn transform(&self) -> Affine2 {
        Affine2::from_scale(Vec2::splat(self.scale)) * Affine2::from_translation(-self.origin)
    }
}
