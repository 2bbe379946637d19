//! Display colors and the category palettes.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{ReefError, Result};

/// RGBA color with 32-bit float components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Create a new color from RGBA components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from 8-bit RGBA values.
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Create an opaque color from a palette entry.
    #[inline]
    pub fn from_rgb8([r, g, b]: [u8; 3]) -> Self {
        Self::from_rgba8(r, g, b, 255)
    }

    /// Parse `#rgb` or `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let bad = || ReefError::Serialization(format!("Invalid hex color: {hex:?}"));
        let parse = |s: &str| u8::from_str_radix(s, 16).map_err(|_| bad());
        if !digits.is_ascii() {
            return Err(bad());
        }

        match digits.len() {
            3 => {
                let mut rgb = [0u8; 3];
                for (i, c) in digits.chars().enumerate() {
                    let v = c.to_digit(16).ok_or_else(bad)? as u8;
                    rgb[i] = v * 17;
                }
                Ok(Self::from_rgb8(rgb))
            }
            6 => Ok(Self::from_rgb8([
                parse(&digits[0..2])?,
                parse(&digits[2..4])?,
                parse(&digits[4..6])?,
            ])),
            _ => Err(bad()),
        }
    }

    /// Convert to 8-bit RGBA, rounding to the nearest step.
    #[inline]
    pub fn to_rgba8(self) -> [u8; 4] {
        [
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.a.clamp(0.0, 1.0) * 255.0).round() as u8,
        ]
    }

    /// `#rrggbb`, alpha dropped.
    pub fn to_hex(self) -> String {
        let [r, g, b, _] = self.to_rgba8();
        format!("#{r:02X}{g:02X}{b:02X}")
    }

    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    // Common colors
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);
}

/// Fixed colors and per-supercategory palettes.
pub mod palette {
    use super::Color;

    /// Masks whose category is still the model prediction.
    pub const PREDICTED: Color = Color::RED;
    /// Live prompt preview (`#1491FF`).
    pub const PROMPT: Color = Color::new(20.0 / 255.0, 145.0 / 255.0, 1.0, 1.0);
    pub const DEFAULT_TEXT: Color = Color::WHITE;
    /// Selected masks.
    pub const FOCUS: Color = Color::BLUE;
    /// `#D3D3D3`
    pub const BLEACHED_BORDER: Color = Color::new(211.0 / 255.0, 211.0 / 255.0, 211.0 / 255.0, 1.0);
    pub const DEAD_BORDER: Color = Color::BLACK;
    pub const POSITIVE_POINT: Color = Color::GREEN;
    pub const NEGATIVE_POINT: Color = Color::RED;

    /// Mask fill colors, indexed by `supercategory_id % LEN`.
    pub const MASK_COLORS: [[u8; 3]; 21] = [
        [0x00, 0x00, 0x00],
        [0xF6, 0xC3, 0xCB],
        [0xFF, 0xA5, 0x00],
        [0x22, 0x54, 0x37],
        [0xF7, 0xD9, 0x41],
        [0x73, 0xFB, 0xFE],
        [0x9E, 0xFC, 0xD6],
        [0x2B, 0x00, 0xF7],
        [0xF2, 0xAA, 0x34],
        [0xEF, 0x7C, 0x76],
        [0xBA, 0xDF, 0xE5],
        [0xBE, 0xD9, 0x66],
        [0xCC, 0xE1, 0xFD],
        [0xF1, 0x88, 0xE9],
        [0x6C, 0xFB, 0x45],
        [0x7F, 0xCB, 0xAC],
        [0xC9, 0xBF, 0xB6],
        [0x16, 0x32, 0x63],
        [0x75, 0x16, 0x08],
        [0x54, 0xAF, 0xAA],
        [0x5F, 0x0F, 0x63],
    ];

    const W: [u8; 3] = [0xFF, 0xFF, 0xFF];
    const K: [u8; 3] = [0x00, 0x00, 0x00];

    /// Label text colors chosen for contrast against `MASK_COLORS`.
    pub const TEXT_COLORS: [[u8; 3]; 21] = [
        W, K, W, W, K, K, K, W, K, K, K, K, K, K, K, K, K, W, W, W, W,
    ];

    pub const LEN: usize = MASK_COLORS.len();

    /// Palette slot for a supercategory id. Negative ids wrap like positive ones.
    #[inline]
    pub fn slot(supercategory_id: i32) -> usize {
        supercategory_id.rem_euclid(LEN as i32) as usize
    }

    pub fn mask_color(supercategory_id: i32) -> Color {
        Color::from_rgb8(MASK_COLORS[slot(supercategory_id)])
    }

    pub fn text_color(supercategory_id: i32) -> Color {
        Color::from_rgb8(TEXT_COLORS[slot(supercategory_id)])
    }
}
