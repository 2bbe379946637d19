//! Reefmark AI - Assisted segmentation
//!
//! - The contract for the remote inference service (prompt masks, coral
//!   detection, quadrat depth)
//! - The prompt-based mask creator that keeps only the newest preview
//! - A CPU color-similarity segmenter used when no service is configured

pub mod client;
pub mod error;
pub mod local;
pub mod mask_creator;
pub mod quadrat;

pub use client::{CoralDetectionConfig, InferenceClient, InferenceFuture};
pub use error::{AiError, AiResult};
pub use local::{LocalSegmenter, SourceImage};
pub use mask_creator::{PreviewRequest, PromptMaskCreator};
pub use quadrat::{Quadrat, QuadratDepth, QuadratDepthResponse};
