//! Prompt-based mask creation.
//!
//! Every change to the prompt list bumps a version. A preview request carries
//! the version it was issued for, and a response is only applied if that
//! version is still current, so late answers to superseded prompt lists are
//! dropped.

use reefmark_core::category::PROMPT_PREVIEW_ID;
use reefmark_core::{CategoryId, Mask, MaskId, Prompt};
use tracing::{debug, warn};

/// A preview the caller should ask the inference service for.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRequest {
    pub version: u64,
    pub prompts: Vec<Prompt>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
pub struct PromptMaskCreator {
    prompts: Vec<Prompt>,
    preview: Option<Mask>,
    version: u64,
    width: u32,
    height: u32,
}

impl PromptMaskCreator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Switch to a new image size, discarding prompts and preview.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.clear_prompts();
        self.width = width;
        self.height = height;
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn preview(&self) -> Option<&Mask> {
        self.preview.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn has_prompts(&self) -> bool {
        !self.prompts.is_empty()
    }

    /// Whether `version` is the one a response would currently be applied for.
    pub fn is_current(&self, version: u64) -> bool {
        version == self.version && self.has_prompts()
    }

    fn request(&mut self) -> Option<PreviewRequest> {
        self.version += 1;
        if self.prompts.is_empty() {
            self.preview = None;
            return None;
        }
        Some(PreviewRequest {
            version: self.version,
            prompts: self.prompts.clone(),
            width: self.width,
            height: self.height,
        })
    }

    /// Append a prompt. Always yields a new preview request.
    pub fn add_prompt(&mut self, prompt: Prompt) -> Option<PreviewRequest> {
        self.prompts.push(prompt);
        debug!(prompts = self.prompts.len(), label = ?prompt.label, "Prompt added");
        self.request()
    }

    /// Drop the newest prompt. A no-op on an empty list; removing the last
    /// prompt clears the preview without a request.
    pub fn undo_prompt(&mut self) -> Option<PreviewRequest> {
        self.prompts.pop()?;
        self.request()
    }

    /// Forget all prompts and the preview. Never yields a request.
    pub fn clear_prompts(&mut self) {
        self.prompts.clear();
        self.preview = None;
        self.version += 1;
    }

    /// Install a preview answered for `version`. Returns false when the
    /// response is stale or does not fit the image.
    pub fn apply_preview(&mut self, version: u64, mut mask: Mask) -> bool {
        if !self.is_current(version) {
            debug!(version, current = self.version, "Dropping stale preview");
            return false;
        }
        if mask.width() != self.width || mask.height() != self.height {
            warn!(
                got = ?(mask.width(), mask.height()),
                expected = ?(self.width, self.height),
                "Preview size does not match image"
            );
            return false;
        }
        mask.category_id = PROMPT_PREVIEW_ID;
        self.preview = Some(mask);
        true
    }

    /// Turn the preview into a permanent mask with the given id and category,
    /// then clear the prompt state. Returns `None` and changes nothing when
    /// there is no preview yet.
    pub fn confirm(&mut self, id: MaskId, category: CategoryId) -> Option<Mask> {
        let mut mask = self.preview.take()?.with_id(id);
        mask.category_id = category;
        mask.visible = true;
        self.clear_prompts();
        Some(mask)
    }
}
