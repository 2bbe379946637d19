//! CPU fallback segmenter.
//!
//! Grows a region from each positive click over 4-connected pixels whose color
//! is close to the clicked color, refusing pixels close to any negative click.
//! Detection and depth need the real service and report `Unsupported`.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::{self, FutureExt};
use parking_lot::RwLock;
use reefmark_core::category::PREDICTED_ID;
use reefmark_core::{Mask, Prompt};
use tracing::{debug, info, warn};

use crate::client::{CoralDetectionConfig, InferenceClient, InferenceFuture};
use crate::error::{AiError, AiResult};
use crate::quadrat::{Quadrat, QuadratDepth};

/// Squared RGB distance under which two colors count as the same region.
pub const DEFAULT_COLOR_THRESHOLD: u32 = 40 * 40;

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> AiResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AiError::PreprocessError(format!(
                "RGBA buffer has {} bytes, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    fn rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let base = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[base], self.pixels[base + 1], self.pixels[base + 2]])
    }
}

/// [`InferenceClient`] that segments on the CPU from the loaded image.
#[derive(Debug, Clone)]
pub struct LocalSegmenter {
    image: Arc<RwLock<Option<Arc<SourceImage>>>>,
    threshold: u32,
}

impl LocalSegmenter {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_COLOR_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            image: Arc::new(RwLock::new(None)),
            threshold,
        }
    }

    /// Image subsequent requests segment.
    pub fn set_image(&self, image: SourceImage) {
        info!(width = image.width, height = image.height, "Local segmenter image set");
        *self.image.write() = Some(Arc::new(image));
    }

    fn current_image(&self) -> AiResult<Arc<SourceImage>> {
        self.image
            .read()
            .clone()
            .ok_or_else(|| AiError::PreprocessError("No image loaded".into()))
    }
}

impl Default for LocalSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceClient for LocalSegmenter {
    fn request_mask_from_prompts(
        &self,
        prompts: Vec<Prompt>,
        width: u32,
        height: u32,
    ) -> InferenceFuture<Mask> {
        let image = self.current_image();
        let threshold = self.threshold;
        async move {
            let image = image?;
            if (image.width, image.height) != (width, height) {
                return Err(AiError::PreprocessError(format!(
                    "image is {}x{}, request is {width}x{height}",
                    image.width, image.height
                )));
            }
            let bitmap = grow_regions(&image, &prompts, threshold)?;
            Ok(Mask::from_bitmap(0, PREDICTED_ID, width, height, bitmap)?)
        }
        .boxed()
    }

    fn request_coral_detection(&self, _config: CoralDetectionConfig) -> InferenceFuture<Vec<Mask>> {
        future::ready(Err(AiError::Unsupported("coral detection needs the inference service".into())))
            .boxed()
    }

    fn request_quadrat_depth(&self, _quadrat: Quadrat) -> InferenceFuture<QuadratDepth> {
        future::ready(Err(AiError::Unsupported("depth estimation needs the inference service".into())))
            .boxed()
    }

    fn image_loaded(&self, width: u32, height: u32, rgba: &[u8]) {
        match SourceImage::new(width, height, rgba.to_vec()) {
            Ok(image) => self.set_image(image),
            Err(e) => warn!(error = %e, "Ignoring malformed source image"),
        }
    }
}

fn color_distance(a: &[u8; 3], b: &[u8; 3]) -> u32 {
    let dr = (a[0] as i32 - b[0] as i32).unsigned_abs();
    let dg = (a[1] as i32 - b[1] as i32).unsigned_abs();
    let db = (a[2] as i32 - b[2] as i32).unsigned_abs();
    dr * dr + dg * dg + db * db
}

fn prompt_color(image: &SourceImage, prompt: &Prompt) -> Option<[u8; 3]> {
    if prompt.x < 0 || prompt.y < 0 {
        return None;
    }
    image.rgb(prompt.x as u32, prompt.y as u32)
}

fn grow_regions(image: &SourceImage, prompts: &[Prompt], threshold: u32) -> AiResult<Vec<u8>> {
    let (w, h) = (image.width, image.height);
    let seeds: Vec<(u32, u32, [u8; 3])> = prompts
        .iter()
        .filter(|p| p.is_positive())
        .filter_map(|p| prompt_color(image, p).map(|c| (p.x as u32, p.y as u32, c)))
        .collect();
    if seeds.is_empty() {
        return Err(AiError::PreprocessError(
            "At least one positive prompt inside the image is required".into(),
        ));
    }
    let negatives: Vec<[u8; 3]> = prompts
        .iter()
        .filter(|p| !p.is_positive())
        .filter_map(|p| prompt_color(image, p))
        .collect();

    let mut bitmap = vec![0u8; w as usize * h as usize];
    let mut queue = VecDeque::new();
    for &(sx, sy, seed) in &seeds {
        queue.push_back((sx, sy));
        while let Some((x, y)) = queue.pop_front() {
            let idx = y as usize * w as usize + x as usize;
            if bitmap[idx] != 0 {
                continue;
            }
            let Some(px) = image.rgb(x, y) else { continue };
            if color_distance(&px, &seed) >= threshold
                || negatives.iter().any(|n| color_distance(&px, n) < threshold)
            {
                continue;
            }
            bitmap[idx] = 1;
            if x > 0 {
                queue.push_back((x - 1, y));
            }
            if y > 0 {
                queue.push_back((x, y - 1));
            }
            if x + 1 < w {
                queue.push_back((x + 1, y));
            }
            if y + 1 < h {
                queue.push_back((x, y + 1));
            }
        }
    }
    debug!(
        seeds = seeds.len(),
        negatives = negatives.len(),
        area = bitmap.iter().filter(|&&b| b == 1).count(),
        "Local segmentation done"
    );
    Ok(bitmap)
}
