//! Annotation masks.
//!
//! A mask is stored run-length encoded. The decoded bitmap is materialized on
//! first access and kept for the life of the mask; the encoding never changes
//! after construction, only `category_id` and `visible` do.

use std::fmt;
use std::sync::OnceLock;

use glam::Vec2;
use tracing::error;

use crate::category::CategoryId;
use crate::error::{ReefError, Result};
use crate::rle;

/// Mask identifier, unique within a frame.
pub type MaskId = u32;

pub struct Mask {
    id: MaskId,
    pub category_id: CategoryId,
    pub visible: bool,
    width: u32,
    height: u32,
    area: usize,
    rle: Vec<u32>,
    decoded: OnceLock<Vec<u8>>,
}

impl Mask {
    /// Create a mask from runs, checking they cover `width * height` pixels.
    pub fn new(
        id: MaskId,
        category_id: CategoryId,
        width: u32,
        height: u32,
        rle: Vec<u32>,
    ) -> Result<Self> {
        let expected = width as usize * height as usize;
        let actual = rle::covered_pixels(&rle);
        if actual != expected {
            return Err(ReefError::InvalidRle { expected, actual });
        }
        Ok(Self {
            id,
            category_id,
            visible: true,
            width,
            height,
            area: rle::foreground_area(&rle),
            rle,
            decoded: OnceLock::new(),
        })
    }

    /// Create a mask from a `width * height` bitmap (nonzero = foreground).
    pub fn from_bitmap(
        id: MaskId,
        category_id: CategoryId,
        width: u32,
        height: u32,
        bitmap: Vec<u8>,
    ) -> Result<Self> {
        if bitmap.len() != width as usize * height as usize {
            return Err(ReefError::DimensionMismatch(format!(
                "bitmap has {} pixels, expected {width}x{height}",
                bitmap.len()
            )));
        }
        let rle = rle::encode(&bitmap);
        let normalized: Vec<u8> = bitmap.into_iter().map(|px| (px != 0) as u8).collect();
        let mut mask = Self::new(id, category_id, width, height, rle)?;
        mask.decoded = OnceLock::from(normalized);
        Ok(mask)
    }

    /// Same mask under a new id.
    pub fn with_id(mut self, id: MaskId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> MaskId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Foreground pixel count.
    pub fn area(&self) -> usize {
        self.area
    }

    pub fn is_empty(&self) -> bool {
        self.area == 0
    }

    pub fn rle(&self) -> &[u32] {
        &self.rle
    }

    /// Decoded 0/1 bitmap in raster order.
    pub fn bitmap(&self) -> &[u8] {
        self.decoded.get_or_init(|| {
            rle::decode(&self.rle, self.width, self.height).unwrap_or_else(|e| {
                error!(mask = self.id, error = %e, "Mask runs no longer decode");
                vec![rle::BACKGROUND; self.width as usize * self.height as usize]
            })
        })
    }

    /// Whether pixel `(x, y)` is foreground. Out-of-bounds pixels are not.
    pub fn contains_pixel(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return false;
        }
        self.bitmap()[y as usize * self.width as usize + x as usize] == rle::FOREGROUND
    }

    /// Floored mean foreground coordinate, `None` for an empty mask.
    pub fn centroid(&self) -> Option<Vec2> {
        if self.area == 0 {
            return None;
        }
        let w = self.width as usize;
        let (mut sx, mut sy) = (0u64, 0u64);
        for (i, _) in self
            .bitmap()
            .iter()
            .enumerate()
            .filter(|&(_, &px)| px == rle::FOREGROUND)
        {
            sx += (i % w) as u64;
            sy += (i / w) as u64;
        }
        let n = self.area as u64;
        Some(Vec2::new((sx / n) as f32, (sy / n) as f32))
    }
}

impl Clone for Mask {
    /// Copies drop the decoded cache; it is rebuilt on demand.
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            category_id: self.category_id,
            visible: self.visible,
            width: self.width,
            height: self.height,
            area: self.area,
            rle: self.rle.clone(),
            decoded: OnceLock::new(),
        }
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.category_id == other.category_id
            && self.visible == other.visible
            && self.width == other.width
            && self.height == other.height
            && self.rle == other.rle
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mask")
            .field("id", &self.id)
            .field("category_id", &self.category_id)
            .field("visible", &self.visible)
            .field("size", &(self.width, self.height))
            .field("area", &self.area)
            .field("runs", &self.rle.len())
            .finish()
    }
}
