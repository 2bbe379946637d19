//! The set of masks the user has selected.

use std::collections::BTreeSet;

use reefmark_core::{Frame, MaskId};

/// Selected mask ids. Never touches the frame or the taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionManager {
    selected: BTreeSet<MaskId>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one mask in or out of the selection. Returns whether it is now selected.
    pub fn toggle(&mut self, id: MaskId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    pub fn select(&mut self, id: MaskId) {
        self.selected.insert(id);
    }

    pub fn deselect(&mut self, id: MaskId) {
        self.selected.remove(&id);
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: MaskId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Selected ids in ascending order.
    pub fn ids(&self) -> Vec<MaskId> {
        self.selected.iter().copied().collect()
    }

    /// Forget ids that are no longer in `frame`.
    pub fn retain_existing(&mut self, frame: &Frame) {
        self.selected.retain(|id| frame.mask(*id).is_some());
    }
}
