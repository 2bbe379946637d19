//! Reefmark Core - Foundation types for coral image annotation
//!
//! This crate provides the data model shared by every other Reefmark crate:
//! - Run-length mask codec
//! - Category taxonomy with coral health statuses and display palettes
//! - Masks and frames (one image plus its annotations)
//! - Click prompts used for assisted mask creation

pub mod category;
pub mod color;
pub mod error;
pub mod frame;
pub mod mask;
pub mod prompt;
pub mod rle;

pub use category::{Category, CategoryId, NewCategory, Status, StatusInfo, Taxonomy};
pub use color::Color;
pub use error::{ReefError, Result};
pub use frame::{Frame, ImageRef};
pub use mask::{Mask, MaskId};
pub use prompt::{Prompt, PromptLabel};

pub use glam::Vec2;
