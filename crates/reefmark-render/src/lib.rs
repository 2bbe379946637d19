//! Reefmark Render - CPU compositing of annotated images
//!
//! The compositor keeps one RGBA layer per concern (base image, mask colors
//! with bleached borders, category badges, and the prompt/quadrat overlay)
//! and resamples them through the pan/zoom viewport onto a screen surface
//! every draw tick.

pub mod compositor;
pub mod raster;
pub mod viewport;

pub use compositor::{Compositor, CompositorConfig, Overlay};
pub use raster::RasterBuffer;
pub use viewport::{Viewport, ViewportConfig};
