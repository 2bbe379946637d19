//! Click prompts for assisted mask creation.

use serde::{Deserialize, Serialize};

use crate::color::{palette, Color};

/// Whether a click marks the object or the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PromptLabel {
    Negative,
    Positive,
}

impl TryFrom<u8> for PromptLabel {
    type Error = String;

    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Negative),
            1 => Ok(Self::Positive),
            other => Err(format!("unknown prompt label {other}")),
        }
    }
}

impl From<PromptLabel> for u8 {
    fn from(label: PromptLabel) -> Self {
        match label {
            PromptLabel::Negative => 0,
            PromptLabel::Positive => 1,
        }
    }
}

/// A click in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(rename = "imageX")]
    pub x: i32,
    #[serde(rename = "imageY")]
    pub y: i32,
    pub label: PromptLabel,
}

impl Prompt {
    pub fn positive(x: i32, y: i32) -> Self {
        Self { x, y, label: PromptLabel::Positive }
    }

    pub fn negative(x: i32, y: i32) -> Self {
        Self { x, y, label: PromptLabel::Negative }
    }

    pub fn is_positive(&self) -> bool {
        self.label == PromptLabel::Positive
    }

    /// Marker color drawn at the click point.
    pub fn color(&self) -> Color {
        match self.label {
            PromptLabel::Positive => palette::POSITIVE_POINT,
            PromptLabel::Negative => palette::NEGATIVE_POINT,
        }
    }
}
