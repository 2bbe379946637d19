//! A frame is one image of the project together with its masks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::CategoryId;
use crate::error::{ReefError, Result};
use crate::mask::{Mask, MaskId};

/// Where the frame's image lives and its position in the project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageRef {
    pub image_name: String,
    pub image_path: String,
    pub idx: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub image: ImageRef,
    width: u32,
    height: u32,
    masks: Vec<Mask>,
}

impl Frame {
    pub fn new(image: ImageRef, width: u32, height: u32) -> Self {
        Self {
            image,
            width,
            height,
            masks: Vec::new(),
        }
    }

    /// Build a frame from already-decoded masks, validating each one.
    pub fn with_masks(image: ImageRef, width: u32, height: u32, masks: Vec<Mask>) -> Result<Self> {
        let mut frame = Self::new(image, width, height);
        for mask in masks {
            frame.add_mask(mask)?;
        }
        Ok(frame)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn mask(&self, id: MaskId) -> Option<&Mask> {
        self.masks.iter().find(|m| m.id() == id)
    }

    pub fn mask_mut(&mut self, id: MaskId) -> Option<&mut Mask> {
        self.masks.iter_mut().find(|m| m.id() == id)
    }

    /// Id for the next mask: one past the current maximum. Fails once the
    /// maximum is `MaskId::MAX`.
    pub fn next_mask_id(&self) -> Result<MaskId> {
        match self.masks.iter().map(Mask::id).max() {
            None => Ok(0),
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| ReefError::Internal(format!("No mask id left after {max}"))),
        }
    }

    /// Append a mask. Its size must match the frame and its id must be unused.
    pub fn add_mask(&mut self, mask: Mask) -> Result<MaskId> {
        if mask.width() != self.width || mask.height() != self.height {
            return Err(ReefError::DimensionMismatch(format!(
                "mask is {}x{}, frame is {}x{}",
                mask.width(),
                mask.height(),
                self.width,
                self.height
            )));
        }
        if self.mask(mask.id()).is_some() {
            return Err(ReefError::Internal(format!("Duplicate mask id {}", mask.id())));
        }
        let id = mask.id();
        self.masks.push(mask);
        Ok(id)
    }

    /// Append masks from another source, renumbering them after the current
    /// maximum id. Returns the new ids.
    pub fn merge_masks(&mut self, masks: Vec<Mask>) -> Result<Vec<MaskId>> {
        let mut ids = Vec::with_capacity(masks.len());
        for mask in masks {
            let id = self.next_mask_id()?;
            ids.push(self.add_mask(mask.with_id(id))?);
        }
        debug!(added = ids.len(), total = self.masks.len(), "Masks merged");
        Ok(ids)
    }

    /// Remove the listed masks; unknown ids are ignored.
    pub fn remove_masks(&mut self, ids: &[MaskId]) -> Vec<Mask> {
        let (removed, kept): (Vec<Mask>, Vec<Mask>) = std::mem::take(&mut self.masks)
            .into_iter()
            .partition(|m| ids.contains(&m.id()));
        self.masks = kept;
        removed
    }

    /// Ids of every mask whose foreground covers `(x, y)`.
    pub fn masks_at(&self, x: i64, y: i64) -> Vec<MaskId> {
        self.masks
            .iter()
            .filter(|m| m.contains_pixel(x, y))
            .map(|m| m.id())
            .collect()
    }

    /// Assign `category` to the listed masks. Returns how many changed.
    pub fn set_category(&mut self, ids: &[MaskId], category: CategoryId) -> usize {
        let mut changed = 0;
        for mask in self.masks.iter_mut().filter(|m| ids.contains(&m.id())) {
            if mask.category_id != category {
                mask.category_id = category;
                changed += 1;
            }
        }
        changed
    }

    /// Move every mask labeled `from` to `to`.
    pub fn reassign_category(&mut self, from: CategoryId, to: CategoryId) -> usize {
        let ids: Vec<_> = self
            .masks
            .iter()
            .filter(|m| m.category_id == from)
            .map(|m| m.id())
            .collect();
        self.set_category(&ids, to)
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }
}
