//! JSON wire format shared with the project backend.
//!
//! A frame travels as a [`FrameResponse`]; a whole project on disk is a
//! versioned [`DatasetFile`].

use std::path::Path;

use reefmark_core::category::PROMPT_PREVIEW_ID;
use reefmark_core::{
    Category, CategoryId, Frame, ImageRef, Mask, MaskId, ReefError, Result, StatusInfo, Taxonomy,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Current dataset schema version.
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// `size` is `[height, width]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskSize {
    pub size: [u32; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationJson {
    pub id: MaskId,
    pub category_id: CategoryId,
    pub area: usize,
    pub segmentation: MaskSize,
    pub rle: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationJson {
    pub images: ImageSize,
    #[serde(default)]
    pub annotations: Vec<AnnotationJson>,
}

/// One frame as exchanged with the backend. Saves carry the category and
/// status lists along with the masks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResponse {
    pub image_name: String,
    pub image_path: String,
    pub idx: usize,
    pub segmentation: SegmentationJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_info: Option<Vec<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_info: Option<Vec<StatusInfo>>,
}

impl FrameResponse {
    /// Decode into a frame. Fails on the first mask whose runs are malformed.
    pub fn to_frame(&self) -> Result<Frame> {
        let ImageSize { width, height } = self.segmentation.images;
        let image = ImageRef {
            image_name: self.image_name.clone(),
            image_path: self.image_path.clone(),
            idx: self.idx,
        };
        let mut frame = Frame::new(image, width, height);
        for ann in &self.segmentation.annotations {
            let [h, w] = ann.segmentation.size;
            if (w, h) != (width, height) {
                return Err(ReefError::DimensionMismatch(format!(
                    "annotation {} is {w}x{h}, image is {width}x{height}",
                    ann.id
                )));
            }
            let mask = Mask::new(ann.id, ann.category_id, width, height, ann.rle.clone())?;
            if mask.area() != ann.area {
                warn!(mask = ann.id, stored = ann.area, actual = mask.area(), "Stored area disagrees with runs");
            }
            frame.add_mask(mask)?;
        }
        Ok(frame)
    }

    /// Encode a frame for saving, with the taxonomy attached. Prompt previews
    /// are never written.
    pub fn from_frame(frame: &Frame, taxonomy: &Taxonomy) -> Self {
        let (width, height) = (frame.width(), frame.height());
        let annotations = frame
            .masks()
            .iter()
            .filter(|m| m.category_id != PROMPT_PREVIEW_ID)
            .map(|m| AnnotationJson {
                id: m.id(),
                category_id: m.category_id,
                area: m.area(),
                segmentation: MaskSize { size: [height, width] },
                rle: m.rle().to_vec(),
            })
            .collect();
        Self {
            image_name: frame.image.image_name.clone(),
            image_path: frame.image.image_path.clone(),
            idx: frame.image.idx,
            segmentation: SegmentationJson {
                images: ImageSize { width, height },
                annotations,
            },
            category_info: Some(taxonomy.to_list()),
            status_info: Some(taxonomy.statuses().to_vec()),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| ReefError::Serialization(format!("Failed to serialize frame: {}", e)))
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| ReefError::Serialization(format!("Failed to parse frame: {}", e)))
    }
}

/// Entry in the project gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub image_name: String,
    pub image_path: String,
    pub idx: usize,
}

/// Result of opening a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub gallery: Vec<GalleryItem>,
    pub category_info: Vec<Category>,
    #[serde(default)]
    pub status_info: Vec<StatusInfo>,
}

/// A whole project on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFile {
    pub version: u32,
    #[serde(default)]
    pub category_info: Vec<Category>,
    #[serde(default)]
    pub status_info: Vec<StatusInfo>,
    pub frames: Vec<FrameResponse>,
}

impl DatasetFile {
    pub fn new(category_info: Vec<Category>, status_info: Vec<StatusInfo>, frames: Vec<FrameResponse>) -> Self {
        Self {
            version: CURRENT_VERSION,
            category_info,
            status_info,
            frames,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| ReefError::Serialization(format!("Failed to serialize dataset: {}", e)))
    }

    /// Parse a dataset, rejecting files written by a newer schema.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| ReefError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if version > CURRENT_VERSION {
            return Err(ReefError::Serialization(format!(
                "Dataset version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let mut dataset: Self = serde_json::from_value(raw)
            .map_err(|e| ReefError::Serialization(format!("Failed to parse dataset: {}", e)))?;
        dataset.version = CURRENT_VERSION;
        Ok(dataset)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    pub fn gallery(&self) -> Vec<GalleryItem> {
        self.frames
            .iter()
            .map(|f| GalleryItem {
                image_name: f.image_name.clone(),
                image_path: f.image_path.clone(),
                idx: f.idx,
            })
            .collect()
    }
}
