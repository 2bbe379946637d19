//! Run-length codec for binary masks.
//!
//! Runs alternate background/foreground in raster order and always start with a
//! background run, which is zero-length when the first pixel is foreground.

use crate::error::{ReefError, Result};

/// Background pixel value in a decoded bitmap.
pub const BACKGROUND: u8 = 0;
/// Foreground pixel value in a decoded bitmap.
pub const FOREGROUND: u8 = 1;

/// Expand `runs` into a `width * height` bitmap of 0/1 values.
///
/// Fails if the runs do not cover exactly `width * height` pixels.
pub fn decode(runs: &[u32], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = width as usize * height as usize;
    let actual = covered_pixels(runs);
    if actual != expected {
        return Err(ReefError::InvalidRle { expected, actual });
    }

    let mut bitmap = Vec::with_capacity(expected);
    let mut value = BACKGROUND;
    for &run in runs {
        bitmap.resize(bitmap.len() + run as usize, value);
        value ^= 1;
    }
    Ok(bitmap)
}

/// Compress a 0/1 bitmap. Any nonzero byte counts as foreground.
pub fn encode(bitmap: &[u8]) -> Vec<u32> {
    let mut runs = Vec::new();
    let Some(&first) = bitmap.first() else {
        return runs;
    };

    let mut current = first != BACKGROUND;
    if current {
        runs.push(0);
    }
    let mut len = 0u32;
    for &px in bitmap {
        let fg = px != BACKGROUND;
        if fg == current {
            len += 1;
        } else {
            runs.push(len);
            current = fg;
            len = 1;
        }
    }
    runs.push(len);
    runs
}

/// Number of foreground pixels, read straight from the runs.
pub fn foreground_area(runs: &[u32]) -> usize {
    runs.iter().skip(1).step_by(2).map(|&r| r as usize).sum()
}

/// Total pixels the runs describe.
pub fn covered_pixels(runs: &[u32]) -> usize {
    runs.iter().map(|&r| r as usize).sum()
}
