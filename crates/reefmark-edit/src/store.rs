//! Persistence and export contracts, plus an in-memory project store.
//!
//! The editor never talks to disk or a backend directly. It holds an
//! `Arc<dyn ProjectStore>` and awaits the futures it returns off the draw path.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use reefmark_core::{Category, ReefError, Result, StatusInfo};
use serde_json::json;
use tracing::{debug, info};

use crate::serialization::{DatasetFile, FrameResponse, ProjectInfo};

/// Future returned by every collaborator call.
pub type StoreFuture<T> = BoxFuture<'static, Result<T>>;

/// Source and sink of project frames.
pub trait ProjectStore: Send + Sync {
    /// Open a project and return its gallery and taxonomy.
    fn load_project(&self, path: PathBuf) -> StoreFuture<ProjectInfo>;
    fn current_data(&self) -> StoreFuture<FrameResponse>;
    fn data_by_index(&self, idx: usize) -> StoreFuture<FrameResponse>;
    fn next_data(&self) -> StoreFuture<FrameResponse>;
    fn prev_data(&self) -> StoreFuture<FrameResponse>;
    /// Persist one frame (with its category and status lists).
    fn save_data(&self, data: FrameResponse) -> StoreFuture<()>;
    /// Write the whole project to `path`.
    fn save_dataset(&self, path: PathBuf) -> StoreFuture<()>;
}

/// What an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportKind {
    Images,
    AnnotatedImages,
    Coco,
    Excel,
    Charts,
}

pub trait Exporter: Send + Sync {
    fn export(&self, kind: ExportKind, output: PathBuf) -> StoreFuture<()>;
}

// ── In-memory store ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct StoreState {
    frames: Vec<FrameResponse>,
    cursor: usize,
    categories: Vec<Category>,
    statuses: Vec<StatusInfo>,
}

impl StoreState {
    fn frame_at(&mut self, idx: usize) -> Result<FrameResponse> {
        let frame = self.frames.get(idx).cloned().ok_or_else(|| {
            ReefError::Internal(format!("No frame at index {idx} ({} frames)", self.frames.len()))
        })?;
        self.cursor = idx;
        Ok(frame)
    }

    fn dataset(&self) -> DatasetFile {
        DatasetFile::new(self.categories.clone(), self.statuses.clone(), self.frames.clone())
    }

    fn replace(&mut self, dataset: DatasetFile) {
        self.categories = dataset.category_info;
        self.statuses = dataset.status_info;
        self.frames = dataset.frames;
        for (i, frame) in self.frames.iter_mut().enumerate() {
            frame.idx = i;
        }
        self.cursor = 0;
    }
}

/// A [`ProjectStore`] holding every frame in memory. Navigation clamps at
/// the first and last frame.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: DatasetFile) -> Self {
        let store = Self::new();
        store.state.lock().replace(dataset);
        store
    }

    pub fn len(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    /// Snapshot of everything stored.
    pub fn dataset(&self) -> DatasetFile {
        self.state.lock().dataset()
    }

    fn with_state<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T>,
    ) -> StoreFuture<T> {
        let mut state = self.state.lock();
        future::ready(f(&mut *state)).boxed()
    }
}

impl ProjectStore for InMemoryStore {
    fn load_project(&self, path: PathBuf) -> StoreFuture<ProjectInfo> {
        self.with_state(|state| {
            let dataset = DatasetFile::load_from_file(&path)?;
            state.replace(dataset);
            info!(path = %path.display(), frames = state.frames.len(), "Project loaded");
            let dataset = state.dataset();
            Ok(ProjectInfo {
                gallery: dataset.gallery(),
                category_info: dataset.category_info,
                status_info: dataset.status_info,
            })
        })
    }

    fn current_data(&self) -> StoreFuture<FrameResponse> {
        self.with_state(|state| {
            let cursor = state.cursor;
            state.frame_at(cursor)
        })
    }

    fn data_by_index(&self, idx: usize) -> StoreFuture<FrameResponse> {
        self.with_state(|state| state.frame_at(idx))
    }

    fn next_data(&self) -> StoreFuture<FrameResponse> {
        self.with_state(|state| {
            let last = state.frames.len().saturating_sub(1);
            let idx = (state.cursor + 1).min(last);
            state.frame_at(idx)
        })
    }

    fn prev_data(&self) -> StoreFuture<FrameResponse> {
        self.with_state(|state| {
            let idx = state.cursor.saturating_sub(1);
            state.frame_at(idx)
        })
    }

    fn save_data(&self, mut data: FrameResponse) -> StoreFuture<()> {
        self.with_state(move |state| {
            let idx = data.idx;
            if idx >= state.frames.len() {
                return Err(ReefError::Internal(format!("Cannot save frame {idx}: out of range")));
            }
            if let Some(categories) = data.category_info.take() {
                state.categories = categories;
            }
            if let Some(statuses) = data.status_info.take() {
                state.statuses = statuses;
            }
            debug!(idx, masks = data.segmentation.annotations.len(), "Frame saved");
            state.frames[idx] = data;
            Ok(())
        })
    }

    fn save_dataset(&self, path: PathBuf) -> StoreFuture<()> {
        self.with_state(move |state| {
            state.dataset().save_to_file(&path)?;
            info!(path = %path.display(), frames = state.frames.len(), "Dataset written");
            Ok(())
        })
    }
}

impl Exporter for InMemoryStore {
    /// Only COCO export is available without the backend.
    fn export(&self, kind: ExportKind, output: PathBuf) -> StoreFuture<()> {
        self.with_state(move |state| {
            if kind != ExportKind::Coco {
                return Err(ReefError::Unsupported(format!("{kind:?} export")));
            }
            let coco = coco_document(state);
            let data = serde_json::to_vec_pretty(&coco)
                .map_err(|e| ReefError::Serialization(format!("Failed to serialize COCO: {}", e)))?;
            std::fs::write(&output, data)?;
            info!(path = %output.display(), "COCO export written");
            Ok(())
        })
    }
}

fn coco_document(state: &StoreState) -> serde_json::Value {
    let images: Vec<_> = state
        .frames
        .iter()
        .map(|f| {
            json!({
                "id": f.idx,
                "file_name": f.image_name,
                "width": f.segmentation.images.width,
                "height": f.segmentation.images.height,
            })
        })
        .collect();

    let mut next_id = 0usize;
    let mut annotations = Vec::new();
    for frame in &state.frames {
        for ann in &frame.segmentation.annotations {
            annotations.push(json!({
                "id": next_id,
                "image_id": frame.idx,
                "category_id": ann.category_id,
                "area": ann.area,
                "segmentation": { "size": ann.segmentation.size, "counts": ann.rle },
                "iscrowd": 0,
            }));
            next_id += 1;
        }
    }

    let categories: Vec<_> = state
        .categories
        .iter()
        .map(|c| json!({ "id": c.id, "name": c.name, "supercategory": c.supercategory_name }))
        .collect();

    json!({ "images": images, "annotations": annotations, "categories": categories })
}
