//! Reefmark Edit - Editing state around the annotation model
//!
//! Bounded undo/redo over whole-frame snapshots, the mask selection set, the
//! JSON wire format exchanged with the project backend, and the persistence
//! and export contracts the editor talks to.

pub mod history;
pub mod selection;
pub mod serialization;
pub mod store;

pub use history::{HistoryManager, Record, DEFAULT_HISTORY_SIZE};
pub use selection::SelectionManager;
pub use serialization::{
    AnnotationJson, DatasetFile, FrameResponse, GalleryItem, ImageSize, MaskSize, ProjectInfo,
    SegmentationJson,
};
pub use store::{ExportKind, Exporter, InMemoryStore, ProjectStore, StoreFuture};
