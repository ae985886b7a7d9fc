//! creditwipe effects - CPU image processing for mask building and preview
//!
//! Provides the pixel primitives (HSV conversion, range threshold, dilation,
//! crop and resize), inpainting, the mask renderer and combiner, and the
//! viewport mapping used by the preview's zoom stage.

pub mod inpaint;
pub mod mask_combine;
pub mod mask_render;
pub mod primitives;
pub mod viewport;

#[cfg(test)]
mod properties;

pub use inpaint::inpaint;
pub use mask_combine::MaskCombiner;
pub use mask_render::MaskRenderer;
pub use viewport::ViewportMapper;
