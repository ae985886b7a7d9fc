//! creditwipe core - foundation types for the credit remover
//!
//! This crate provides the types shared by every other crate:
//! - Frame buffers and pixel formats
//! - Binary inpaint masks
//! - Pixel geometry and crop boxes
//! - Operator parameter snapshots
//! - Frame rates
//! - Configuration and the error taxonomy

pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod mask;
pub mod params;
pub mod time;

pub use config::{ExportConfig, StudioConfig, DEFAULT_CACHE_CAPACITY};
pub use error::{Result, WipeError};
pub use frame::{FrameBuffer, PixelFormat, SharedFrameBuffer};
pub use geometry::{CropRect, Rect};
pub use mask::{Mask, MASK_OFF, MASK_ON};
pub use params::{
    DisplayMode, DisplayParameters, DrawParameters, HsvBand, MaskMode, MaskParameters,
    RenderJobParameters, Zoom, DEFAULT_INPAINT_RADIUS,
};
pub use time::FrameRate;
