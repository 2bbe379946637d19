//! Contract for the segmentation and depth service.

use futures::future::BoxFuture;
use reefmark_core::{Mask, Prompt};
use serde::{Deserialize, Serialize};

use crate::error::AiResult;
use crate::quadrat::{Quadrat, QuadratDepth};

/// Future returned by every inference call.
pub type InferenceFuture<T> = BoxFuture<'static, AiResult<T>>;

/// Settings forwarded to automatic coral detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoralDetectionConfig {
    /// Project index of the image to run on.
    pub image_idx: usize,
    pub image_path: String,
    /// Model-specific options, passed through untouched.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Remote (or local) inference backend.
///
/// Calls return immediately; the editor applies results when the futures
/// resolve. Implementations must be cheap to share behind an `Arc`.
pub trait InferenceClient: Send + Sync {
    /// Segment the object indicated by `prompts` in a `width x height` image.
    fn request_mask_from_prompts(
        &self,
        prompts: Vec<Prompt>,
        width: u32,
        height: u32,
    ) -> InferenceFuture<Mask>;

    /// Detect corals on a whole image.
    fn request_coral_detection(&self, config: CoralDetectionConfig) -> InferenceFuture<Vec<Mask>>;

    fn request_quadrat_depth(&self, quadrat: Quadrat) -> InferenceFuture<QuadratDepth>;

    /// The editor switched to a new RGBA8 image. Remote services already have
    /// the file and ignore this.
    fn image_loaded(&self, _width: u32, _height: u32, _rgba: &[u8]) {}
}
