//! Quadrats and the depth map the service returns for them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, AiResult};

/// Axis-aligned rectangle in image pixels, corners as placed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quadrat {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Quadrat {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Same rectangle with `(x1, y1)` top-left and `(x2, y2)` bottom-right.
    pub fn normalized(&self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.abs_diff(self.x2)
    }

    pub fn height(&self) -> u32 {
        self.y1.abs_diff(self.y2)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Raw depth response. Every field is required; they are optional here so a
/// missing one is reported by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadratDepthResponse {
    pub depth_vis_path: Option<String>,
    pub encoded_depth: Option<String>,
    pub rows: Option<usize>,
    pub cols: Option<usize>,
}

/// Decoded depth map: one byte per cell, `rows * cols` cells row-major.
/// Serializes in the wire shape, with the cells base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuadratDepthResponse", into = "QuadratDepthResponse")]
pub struct QuadratDepth {
    pub depth_vis_path: String,
    pub rows: usize,
    pub cols: usize,
    pub depth: Vec<u8>,
}

impl QuadratDepthResponse {
    /// Check every field is present and decode the depth bytes.
    pub fn decode(self) -> AiResult<QuadratDepth> {
        let missing = |field: &str| AiError::MalformedResponse(format!("{field} is missing"));
        let depth_vis_path = self.depth_vis_path.ok_or_else(|| missing("depth_vis_path"))?;
        let encoded = self.encoded_depth.ok_or_else(|| missing("encoded_depth"))?;
        let rows = self.rows.ok_or_else(|| missing("rows"))?;
        let cols = self.cols.ok_or_else(|| missing("cols"))?;

        let depth = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| AiError::MalformedResponse(format!("encoded_depth is not base64: {e}")))?;
        let cells = rows
            .checked_mul(cols)
            .ok_or_else(|| AiError::MalformedResponse(format!("{rows}x{cols} depth map is too large")))?;
        if depth.len() != cells {
            return Err(AiError::MalformedResponse(format!(
                "depth has {} cells, expected {rows}x{cols}",
                depth.len()
            )));
        }
        Ok(QuadratDepth {
            depth_vis_path,
            rows,
            cols,
            depth,
        })
    }
}

impl TryFrom<QuadratDepthResponse> for QuadratDepth {
    type Error = AiError;

    fn try_from(response: QuadratDepthResponse) -> AiResult<Self> {
        response.decode()
    }
}

impl From<QuadratDepth> for QuadratDepthResponse {
    fn from(depth: QuadratDepth) -> Self {
        depth.to_response()
    }
}

impl QuadratDepth {
    /// Encode back to the wire shape.
    pub fn to_response(&self) -> QuadratDepthResponse {
        QuadratDepthResponse {
            depth_vis_path: Some(self.depth_vis_path.clone()),
            encoded_depth: Some(STANDARD.encode(&self.depth)),
            rows: Some(self.rows),
            cols: Some(self.cols),
        }
    }

    pub fn at(&self, row: usize, col: usize) -> Option<u8> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.depth.get(row * self.cols + col).copied()
    }

    /// Max minus min depth; zero for an empty map.
    pub fn height_range(&self) -> u8 {
        let max = self.depth.iter().copied().max().unwrap_or(0);
        let min = self.depth.iter().copied().min().unwrap_or(0);
        max - min
    }
}
