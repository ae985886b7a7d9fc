//! Layer combination.

use creditwipe_core::{Mask, MaskMode};

/// Stacks a mask layer over the selection built by the layers beneath it.
pub struct MaskCombiner;

impl MaskCombiner {
    /// Combine `top` with the optional `bottom` selection.
    ///
    /// - `Include` adds `top` to the selection: `top | bottom`.
    /// - `Exclude` removes `top` from it: `!top & bottom`.
    ///
    /// Without a bottom layer the result is `top` or `!top` respectively.
    ///
    /// # Panics
    /// Panics if both layers are present and differ in size.
    pub fn combine(mode: MaskMode, top: &Mask, bottom: Option<&Mask>) -> Mask {
        match (mode, bottom) {
            (MaskMode::Include, None) => top.clone(),
            (MaskMode::Include, Some(bottom)) => top.or(bottom),
            (MaskMode::Exclude, None) => top.invert(),
            (MaskMode::Exclude, Some(bottom)) => top.invert().and(bottom),
        }
    }
}
