//! CPU compositor: rasterizes annotation layers and resamples them through
//! the viewport.
//!
//! Layers are rebuilt only when the data behind them changes
//! ([`Compositor::update_masks`], [`Compositor::update_overlay`]); drawing a
//! tick only resamples them.

use glam::Vec2;
use rayon::prelude::*;
use reefmark_core::category::PREDICTED_ID;
use reefmark_core::color::palette;
use reefmark_core::{Color, Frame, Mask, MaskId, Prompt, Status, Taxonomy};
use tracing::{debug, warn};

use crate::raster::{blend_over, RasterBuffer};
use crate::viewport::Viewport;

/// Configuration for the compositor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    /// Opacity of the mask-color layer.
    pub mask_opacity: f32,
    pub show_masks: bool,
    /// Bleached border stamp radius as a fraction of `min(width, height)`.
    pub border_radius_factor: f32,
    /// Badge font size as a fraction of `min(width, height)`.
    pub label_font_factor: f32,
    pub label_font_max: f32,
    /// Surface color outside the image.
    pub background: Color,
    /// Screen radius of prompt markers.
    pub prompt_marker_radius: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            mask_opacity: 0.6,
            show_masks: true,
            border_radius_factor: 0.003,
            label_font_factor: 0.04,
            label_font_max: 40.0,
            background: Color::new(0.12, 0.12, 0.12, 1.0),
            prompt_marker_radius: 5.0,
        }
    }
}

/// Transient drawing on top of the annotations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overlay<'a> {
    /// Prompt preview, drawn in the prompt color at mask opacity.
    pub preview: Option<&'a Mask>,
    pub prompts: &'a [Prompt],
    /// Opposite corners of the quadrat being placed.
    pub quadrat: Option<(Vec2, Vec2)>,
}

pub struct Compositor {
    config: CompositorConfig,
    image: RasterBuffer,
    masks: RasterBuffer,
    labels: RasterBuffer,
    overlay: RasterBuffer,
}

impl Compositor {
    pub fn new(config: CompositorConfig, image: RasterBuffer) -> Self {
        let (w, h) = (image.width(), image.height());
        Self {
            config,
            image,
            masks: RasterBuffer::new(w, h),
            labels: RasterBuffer::new(w, h),
            overlay: RasterBuffer::new(w, h),
        }
    }

    /// Replace the base image; every layer is cleared to its size.
    pub fn set_image(&mut self, image: RasterBuffer) {
        let (w, h) = (image.width(), image.height());
        self.image = image;
        self.masks = RasterBuffer::new(w, h);
        self.labels = RasterBuffer::new(w, h);
        self.overlay = RasterBuffer::new(w, h);
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CompositorConfig {
        &mut self.config
    }

    pub fn image(&self) -> &RasterBuffer {
        &self.image
    }

    pub fn mask_layer(&self) -> &RasterBuffer {
        &self.masks
    }

    pub fn label_layer(&self) -> &RasterBuffer {
        &self.labels
    }

    pub fn overlay_layer(&self) -> &RasterBuffer {
        &self.overlay
    }

    pub fn set_show_masks(&mut self, show: bool) {
        self.config.show_masks = show;
    }

    pub fn toggle_masks(&mut self) -> bool {
        self.config.show_masks = !self.config.show_masks;
        self.config.show_masks
    }

    fn fits(&self, frame: &Frame) -> bool {
        if (frame.width(), frame.height()) != (self.image.width(), self.image.height()) {
            warn!(
                frame = ?(frame.width(), frame.height()),
                image = ?(self.image.width(), self.image.height()),
                "Frame and image sizes differ, skipping layer rebuild"
            );
            return false;
        }
        true
    }

    /// Rebuild the mask-color layer (with bleached borders) and the label layer.
    pub fn update_masks(&mut self, frame: &Frame, taxonomy: &Taxonomy, selected: &[MaskId]) {
        if !self.fits(frame) {
            return;
        }
        self.draw_mask_colors(frame, taxonomy, selected);
        self.draw_borders(frame, taxonomy);
        self.draw_labels(frame, taxonomy);
        debug!(masks = frame.masks().len(), selected = selected.len(), "Mask layers rebuilt");
    }

    fn draw_mask_colors(&mut self, frame: &Frame, taxonomy: &Taxonomy, selected: &[MaskId]) {
        self.masks.clear(Color::TRANSPARENT);
        let layer = self.masks.pixels_mut();
        for mask in frame.masks().iter().filter(|m| m.visible) {
            let color = if selected.contains(&mask.id()) {
                palette::FOCUS
            } else {
                taxonomy.mask_color(mask.category_id)
            };
            let rgba = color.with_alpha(1.0).to_rgba8();
            for (px, &bit) in layer.iter_mut().zip(mask.bitmap()) {
                if bit == 1 {
                    *px = rgba;
                }
            }
        }
    }

    fn draw_borders(&mut self, frame: &Frame, taxonomy: &Taxonomy) {
        let (w, h) = (frame.width() as i64, frame.height() as i64);
        let radius = w.min(h) as f32 * self.config.border_radius_factor;
        for mask in frame.masks().iter().filter(|m| m.visible) {
            let bleached = taxonomy
                .get(mask.category_id)
                .is_some_and(|c| c.status == Status::Bleached);
            if !bleached {
                continue;
            }
            let color = taxonomy.border_color(mask.category_id);
            for y in 0..h {
                for x in 0..w {
                    if is_border(mask, x, y) {
                        self.masks
                            .fill_circle(Vec2::new(x as f32 + 0.5, y as f32 + 0.5), radius, color);
                    }
                }
            }
        }
    }

    /// Badge font size for an image of this size.
    pub fn label_font_size(&self, width: u32, height: u32) -> f32 {
        (width.min(height) as f32 * self.config.label_font_factor)
            .floor()
            .min(self.config.label_font_max)
    }

    fn draw_labels(&mut self, frame: &Frame, taxonomy: &Taxonomy) {
        self.labels.clear(Color::TRANSPARENT);
        let font_size = self.label_font_size(frame.width(), frame.height());
        let radius = font_size * 0.7;
        for mask in frame.masks().iter().filter(|m| m.visible) {
            if mask.category_id == PREDICTED_ID {
                continue;
            }
            let Some(center) = mask.centroid() else {
                continue;
            };
            let Some(category) = taxonomy.get(mask.category_id) else {
                warn!(mask = mask.id(), category = mask.category_id, "Label for unknown category skipped");
                continue;
            };
            let icon = category.icon_name();
            let badge = center + Vec2::new(radius / 2.0, -radius / 2.0);
            self.labels
                .fill_circle(badge, radius, taxonomy.mask_color(category.id));
            self.labels.stroke_circle(badge, radius, 1.0, Color::WHITE);
            let glyph = font_size / icon.chars().count().max(1) as f32;
            self.labels
                .draw_text(center, &icon, glyph, taxonomy.text_color(category.id));
        }
    }

    /// Rebuild the overlay: preview fill, prompt markers, quadrat outline.
    pub fn update_overlay(&mut self, overlay: Overlay<'_>) {
        self.overlay.clear(Color::TRANSPARENT);
        if let Some(preview) = overlay.preview {
            if (preview.width(), preview.height()) == (self.overlay.width(), self.overlay.height()) {
                let rgba = palette::PROMPT
                    .with_alpha(self.config.mask_opacity)
                    .to_rgba8();
                for (px, &bit) in self.overlay.pixels_mut().iter_mut().zip(preview.bitmap()) {
                    if bit == 1 {
                        *px = rgba;
                    }
                }
            }
        }
        let marker = self.marker_radius();
        for prompt in overlay.prompts {
            let center = Vec2::new(prompt.x as f32 + 0.5, prompt.y as f32 + 0.5);
            self.overlay.fill_circle(center, marker, prompt.color());
            self.overlay.stroke_circle(center, marker, 1.0, Color::WHITE);
        }
        if let Some((a, b)) = overlay.quadrat {
            let line = (self.image.width().min(self.image.height()) / 300).max(1);
            self.overlay.stroke_rect(a, b, line, palette::FOCUS);
        }
    }

    /// Prompt markers scale with the image so they stay visible when fitted.
    fn marker_radius(&self) -> f32 {
        let short = self.image.width().min(self.image.height()) as f32;
        (short / 200.0).max(self.config.prompt_marker_radius.min(short / 4.0))
    }

    /// Compose one tick onto `surface`: background, image, then (when masks
    /// are shown) the mask layer at `mask_opacity` and the label layer, then
    /// the overlay. Rows are filled in parallel.
    pub fn draw(&self, viewport: &Viewport, surface: &mut RasterBuffer) {
        let background = self.config.background.to_rgba8();
        let show_masks = self.config.show_masks;
        let opacity = self.config.mask_opacity;
        let width = surface.width() as usize;
        if width == 0 {
            return;
        }

        surface
            .bytes_mut()
            .par_chunks_mut(width * 4)
            .enumerate()
            .for_each(|(sy, row)| {
                let row: &mut [[u8; 4]] = bytemuck::cast_slice_mut(row);
                for (sx, out) in row.iter_mut().enumerate() {
                    let p = viewport.screen_to_image(Vec2::new(sx as f32 + 0.5, sy as f32 + 0.5));
                    let (ix, iy) = (p.x.floor() as i64, p.y.floor() as i64);
                    let Some(base) = self.image.get(ix, iy) else {
                        *out = background;
                        continue;
                    };
                    let mut px = blend_over(background, base, 1.0);
                    if show_masks {
                        if let Some(m) = self.masks.get(ix, iy) {
                            px = blend_over(px, m, opacity);
                        }
                        if let Some(l) = self.labels.get(ix, iy) {
                            px = blend_over(px, l, 1.0);
                        }
                    }
                    if let Some(o) = self.overlay.get(ix, iy) {
                        px = blend_over(px, o, 1.0);
                    }
                    *out = px;
                }
            });
    }
}

/// Foreground pixel with a 4-neighbor that is background or outside the image.
fn is_border(mask: &Mask, x: i64, y: i64) -> bool {
    mask.contains_pixel(x, y)
        && [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .any(|(nx, ny)| !mask.contains_pixel(nx, ny))
}
