//! Snapshot-based undo/redo.
//!
//! Each entry is a full copy of the frame and the category list taken before
//! a mutation. Undo and redo exchange the live state for a stored record, so
//! the caller passes in a snapshot of what is currently on screen.

use std::collections::VecDeque;

use reefmark_core::{Category, Frame, Taxonomy};
use tracing::debug;

/// Undo depth used by the editor.
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// A deep copy of the editable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub frame: Frame,
    pub categories: Vec<Category>,
}

impl Record {
    /// Copy the current frame and categories. Nothing is shared with the live state.
    pub fn capture(frame: &Frame, taxonomy: &Taxonomy) -> Self {
        Self {
            frame: frame.clone(),
            categories: taxonomy.to_list(),
        }
    }
}

/// Bounded undo/redo stacks.
#[derive(Debug)]
pub struct HistoryManager {
    /// Records to restore on undo (most recent last).
    undo: VecDeque<Record>,
    /// Records to restore on redo (most recent last).
    redo: Vec<Record>,
    capacity: usize,
}

impl HistoryManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(capacity + 1),
            redo: Vec::new(),
            capacity,
        }
    }

    /// Store the pre-mutation snapshot. Clears redo; evicts the oldest record
    /// once more than `capacity` are held.
    pub fn record(&mut self, record: Record) {
        self.redo.clear();
        self.push_undo(record);
    }

    fn push_undo(&mut self, record: Record) {
        self.undo.push_back(record);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
            debug!(capacity = self.capacity, "History full, dropped oldest record");
        }
    }

    /// Step back. `current` is the live state, kept for redo. Returns `None`
    /// without touching either stack when there is nothing to undo.
    pub fn undo(&mut self, current: Record) -> Option<Record> {
        let record = self.undo.pop_back()?;
        self.redo.push(current);
        Some(record)
    }

    /// Step forward again. Mirrors [`undo`](Self::undo).
    pub fn redo(&mut self, current: Record) -> Option<Record> {
        let record = self.redo.pop()?;
        self.push_undo(current);
        Some(record)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

// ── Tests ───────────────────────────────────────────────────────
