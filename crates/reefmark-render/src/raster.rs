//! RGBA8 raster buffers with the few drawing primitives the layers need.

use std::path::Path;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use glam::Vec2;
use reefmark_core::{Color, ReefError, Result};

/// Tightly packed RGBA8 image, row-major, no padding.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let mut buffer = Self::new(width, height);
        buffer.clear(color);
        buffer
    }

    /// Wrap existing RGBA8 bytes.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ReefError::DimensionMismatch(format!(
                "RGBA buffer has {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Eight vertical color bars, used when no image file is available.
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255],
            [255, 255, 0, 255],
            [0, 255, 255, 255],
            [0, 255, 0, 255],
            [255, 0, 255, 255],
            [255, 0, 0, 255],
            [0, 0, 255, 255],
            [0, 0, 0, 255],
        ];
        let mut buffer = Self::new(width, height);
        for y in 0..height {
            let row = buffer.row_mut(y);
            for (x, px) in row.iter_mut().enumerate() {
                *px = BARS[x * 8 / width as usize];
            }
        }
        buffer
    }

    /// Decode an image file (PNG or JPEG) to RGBA8.
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .map_err(|e| ReefError::Serialization(format!("Failed to read {}: {}", path.display(), e)))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba8(width, height, img.into_raw())
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        image::save_buffer(path, &self.data, self.width, self.height, image::ColorType::Rgba8)
            .map_err(|e| ReefError::Serialization(format!("Failed to write {}: {}", path.display(), e)))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn pixels_mut(&mut self) -> &mut [[u8; 4]] {
        bytemuck::cast_slice_mut(&mut self.data)
    }

    #[inline]
    pub fn row(&self, y: u32) -> &[[u8; 4]] {
        let w = self.width as usize;
        &self.pixels()[y as usize * w..(y as usize + 1) * w]
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [[u8; 4]] {
        let w = self.width as usize;
        &mut self.pixels_mut()[y as usize * w..(y as usize + 1) * w]
    }

    /// Pixel at `(x, y)`, `None` out of bounds.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<[u8; 4]> {
        self.index(x, y).map(|i| self.pixels()[i])
    }

    /// Overwrite one pixel; out-of-bounds writes are ignored.
    #[inline]
    pub fn put(&mut self, x: i64, y: i64, rgba: [u8; 4]) {
        if let Some(i) = self.index(x, y) {
            self.pixels_mut()[i] = rgba;
        }
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn clear(&mut self, color: Color) {
        let rgba = color.to_rgba8();
        self.pixels_mut().fill(rgba);
    }

    /// Fill every pixel whose center lies within `radius` of `center`. A
    /// radius below half a pixel still covers the pixel under the center.
    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        let rgba = color.to_rgba8();
        let r = radius.max(0.5);
        self.for_each_in_box(center, r, |buffer, x, y, d| {
            if d <= r {
                buffer.put(x, y, rgba);
            }
        });
    }

    /// Ring of `line_width` pixels centered on the circle's edge.
    pub fn stroke_circle(&mut self, center: Vec2, radius: f32, line_width: f32, color: Color) {
        let rgba = color.to_rgba8();
        let half = line_width.max(1.0) / 2.0;
        self.for_each_in_box(center, radius + half, |buffer, x, y, d| {
            if (d - radius).abs() <= half {
                buffer.put(x, y, rgba);
            }
        });
    }

    fn for_each_in_box(&mut self, center: Vec2, extent: f32, mut f: impl FnMut(&mut Self, i64, i64, f32)) {
        let x0 = (center.x - extent).floor() as i64;
        let x1 = (center.x + extent).ceil() as i64;
        let y0 = (center.y - extent).floor() as i64;
        let y1 = (center.y + extent).ceil() as i64;
        for y in y0.max(0)..=y1.min(self.height as i64 - 1) {
            for x in x0.max(0)..=x1.min(self.width as i64 - 1) {
                let d = Vec2::new(x as f32 + 0.5, y as f32 + 0.5).distance(center);
                f(self, x, y, d);
            }
        }
    }

    /// Outline an axis-aligned rectangle given two opposite corners.
    pub fn stroke_rect(&mut self, a: Vec2, b: Vec2, line_width: u32, color: Color) {
        let rgba = color.to_rgba8();
        let (min, max) = (a.min(b), a.max(b));
        let (x0, y0) = (min.x.floor() as i64, min.y.floor() as i64);
        let (x1, y1) = (max.x.floor() as i64, max.y.floor() as i64);
        let lw = line_width.max(1) as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let on_edge = x - x0 < lw || x1 - x < lw || y - y0 < lw || y1 - y < lw;
                if on_edge {
                    self.put(x, y, rgba);
                }
            }
        }
    }

    /// Draw `text` with its left edge at `origin.x` and its baseline at
    /// `origin.y`, each glyph `size` pixels square.
    pub fn draw_text(&mut self, origin: Vec2, text: &str, size: f32, color: Color) {
        let rgba = color.to_rgba8();
        let cell = size.max(1.0).round() as i64;
        let top = origin.y.round() as i64 - cell;
        let mut left = origin.x.round() as i64;
        for ch in text.chars() {
            let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
                left += cell;
                continue;
            };
            for ty in 0..cell {
                let bits = glyph[(ty * 8 / cell) as usize];
                for tx in 0..cell {
                    if (bits >> (tx * 8 / cell)) & 1 == 1 {
                        self.put(left + tx, top + ty, rgba);
                    }
                }
            }
            left += cell;
        }
    }
}

/// Source-over blend of `src` onto `dst`, with `src` alpha scaled by `opacity`.
#[inline]
pub fn blend_over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let a = (src[3] as f32 / 255.0) * opacity;
    if a <= 0.0 {
        return dst;
    }
    let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
    let out_a = a + (dst[3] as f32 / 255.0) * (1.0 - a);
    [
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ]
}
