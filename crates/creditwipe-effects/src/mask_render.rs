//! Chroma/crop mask rendering.

use crate::primitives::{dilate, in_range, rgb_to_hsv};
use creditwipe_core::{FrameBuffer, Mask, MaskParameters};

/// Turns a reference frame and a layer's parameters into a binary mask.
pub struct MaskRenderer;

impl MaskRenderer {
    /// Render the selection for one layer.
    ///
    /// The pipeline is: normalize the crop box, threshold the frame in HSV,
    /// grow the threshold by `grow`, then keep only what falls inside the
    /// crop box. The mask always has the frame's size. HSV bands are used
    /// as given, so an inverted band selects nothing.
    pub fn render(frame: &FrameBuffer, params: &MaskParameters) -> Mask {
        let crop = params.crop.normalize(frame.width, frame.height);

        let hsv = rgb_to_hsv(frame);
        let threshold = in_range(&hsv, [params.hue, params.sat, params.val]);
        let grown = if params.grow > 0 {
            dilate(&threshold, params.grow)
        } else {
            threshold
        };

        let region = Mask::from_rect(frame.width, frame.height, crop);
        grown.and(&region)
    }
}
