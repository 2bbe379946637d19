//! Fixtures and mock collaborators shared by the integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use parking_lot::Mutex;
use reefmark_ai::{AiError, CoralDetectionConfig, InferenceClient, InferenceFuture, Quadrat, QuadratDepth};
use reefmark_core::category::PREDICTED_ID;
use reefmark_core::{CategoryId, Frame, ImageRef, Mask, MaskId, Prompt, Taxonomy};
use reefmark_edit::{DatasetFile, FrameResponse};
use reefmark_editor::{EditorSession, KeyEvent, Modifiers, SessionConfig};

pub const W: u32 = 20;
pub const H: u32 = 20;

// ── Fixtures ───────────────────────────────────────────────────

/// Mask covering `[x0, x1) x [y0, y1)` of a `W x H` image.
pub fn rect_mask(id: MaskId, category: CategoryId, x0: u32, y0: u32, x1: u32, y1: u32) -> Mask {
    let mut bitmap = vec![0u8; (W * H) as usize];
    for y in y0..y1 {
        for x in x0..x1 {
            bitmap[(y * W + x) as usize] = 1;
        }
    }
    Mask::from_bitmap(id, category, W, H, bitmap).unwrap()
}

pub fn frame(idx: usize, masks: Vec<Mask>) -> Frame {
    let image = ImageRef {
        image_name: format!("reef_{idx:03}.jpg"),
        image_path: String::new(),
        idx,
    };
    Frame::with_masks(image, W, H, masks).unwrap()
}

/// Two unassigned, non-overlapping masks: 0 at the top left, 1 at the bottom
/// right.
pub fn two_masks() -> Vec<Mask> {
    vec![
        rect_mask(0, PREDICTED_ID, 0, 0, 6, 6),
        rect_mask(1, PREDICTED_ID, 10, 10, 16, 16),
    ]
}

pub fn session_with(config: SessionConfig) -> EditorSession {
    let mut session = EditorSession::new(config, W, H);
    session.load_frame(frame(0, two_masks()), None);
    session
}

/// Session on a `W x H` surface, so screen and image pixels coincide.
pub fn session() -> EditorSession {
    session_with(SessionConfig::default())
}

/// Dataset of `n` frames sharing one coral category.
pub fn dataset(n: usize) -> DatasetFile {
    let mut taxonomy = Taxonomy::new();
    taxonomy.add_coral_category("Porites").unwrap();
    let frames = (0..n)
        .map(|idx| FrameResponse::from_frame(&frame(idx, two_masks()), &taxonomy))
        .collect();
    DatasetFile::new(taxonomy.to_list(), Vec::new(), frames)
}

pub fn key(id: u64, k: &str) -> KeyEvent {
    KeyEvent::new(id, k, Modifiers::NONE)
}

pub fn ctrl(id: u64, k: &str) -> KeyEvent {
    KeyEvent::new(id, k, Modifiers::CTRL)
}

// ── Mock inference ─────────────────────────────────────────────

/// Scriptable inference service. Preview answers are masks whose area equals
/// the number of prompts they were asked for, so tests can tell which
/// request an answer belongs to.
#[derive(Default)]
pub struct MockInference {
    prompt_calls: AtomicUsize,
    detection_calls: AtomicUsize,
    depth_requests: Mutex<Vec<Quadrat>>,
    delays_ms: Mutex<VecDeque<u64>>,
    failing: AtomicBool,
    crashing: AtomicBool,
    detections: Mutex<Vec<Mask>>,
}

impl MockInference {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delay the answer to the next prompt request.
    pub fn delay_next(&self, ms: u64) {
        self.delays_ms.lock().push_back(ms);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make detection tasks panic instead of answering.
    pub fn set_crashing(&self, crashing: bool) {
        self.crashing.store(crashing, Ordering::SeqCst);
    }

    pub fn set_detections(&self, masks: Vec<Mask>) {
        *self.detections.lock() = masks;
    }

    pub fn prompt_calls(&self) -> usize {
        self.prompt_calls.load(Ordering::SeqCst)
    }

    pub fn detection_calls(&self) -> usize {
        self.detection_calls.load(Ordering::SeqCst)
    }

    pub fn depth_requests(&self) -> Vec<Quadrat> {
        self.depth_requests.lock().clone()
    }

    fn failure(&self) -> Option<AiError> {
        self.failing
            .load(Ordering::SeqCst)
            .then(|| AiError::RequestFailed("service unavailable".into()))
    }
}

fn answer(prompts: &[Prompt], width: u32, height: u32) -> Mask {
    let mut bitmap = vec![0u8; (width * height) as usize];
    for px in bitmap.iter_mut().take(prompts.len()) {
        *px = 1;
    }
    Mask::from_bitmap(0, PREDICTED_ID, width, height, bitmap).unwrap()
}

impl InferenceClient for MockInference {
    fn request_mask_from_prompts(
        &self,
        prompts: Vec<Prompt>,
        width: u32,
        height: u32,
    ) -> InferenceFuture<Mask> {
        self.prompt_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms.lock().pop_front().unwrap_or(0);
        let failure = self.failure();
        async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match failure {
                Some(e) => Err(e),
                None => Ok(answer(&prompts, width, height)),
            }
        }
        .boxed()
    }

    fn request_coral_detection(&self, _config: CoralDetectionConfig) -> InferenceFuture<Vec<Mask>> {
        self.detection_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.failure() {
            Some(e) => Err(e),
            None => Ok(self.detections.lock().clone()),
        };
        let crashing = self.crashing.load(Ordering::SeqCst);
        async move {
            if crashing {
                panic!("detector crashed");
            }
            result
        }
        .boxed()
    }

    fn request_quadrat_depth(&self, quadrat: Quadrat) -> InferenceFuture<QuadratDepth> {
        self.depth_requests.lock().push(quadrat);
        async move {
            Ok(QuadratDepth {
                depth_vis_path: "depth/vis_000.png".into(),
                rows: 2,
                cols: 3,
                depth: vec![10, 12, 14, 11, 13, 40],
            })
        }
        .boxed()
    }
}
