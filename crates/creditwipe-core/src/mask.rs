//! Binary inpaint masks.
//!
//! A mask is a single-channel image where 255 marks pixels to inpaint and 0
//! marks pixels to keep. Masks are tightly packed (no row padding) so that
//! bitwise combination is a straight zip over the buffer.

use crate::geometry::Rect;

/// Value of a selected mask pixel.
pub const MASK_ON: u8 = 255;
/// Value of an unselected mask pixel.
pub const MASK_OFF: u8 = 0;

/// A single-channel 0/255 mask image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Mask {
    /// A mask with nothing selected.
    pub fn empty(width: u32, height: u32) -> Self {
        Self::filled(width, height, MASK_OFF)
    }

    /// A mask with every pixel selected.
    pub fn full(width: u32, height: u32) -> Self {
        Self::filled(width, height, MASK_ON)
    }

    fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap raw mask values. Any non-zero value is treated as selected.
    /// Returns `None` if the length does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        let data = data
            .into_iter()
            .map(|v| if v != 0 { MASK_ON } else { MASK_OFF })
            .collect();
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// A mask selecting exactly the pixels inside `rect`.
    pub fn from_rect(width: u32, height: u32, rect: Rect) -> Self {
        let mut mask = Self::empty(width, height);
        let Some(rect) = rect.intersection(Rect::new(0, 0, width, height)) else {
            return mask;
        };
        for y in rect.y..rect.bottom() {
            let start = (y * width + rect.x) as usize;
            mask.data[start..start + rect.width as usize].fill(MASK_ON);
        }
        mask
    }

    /// Raw values, row-major, `width * height` bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw values. Callers must only write 0 or 255.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// One row of the mask.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize] != MASK_OFF
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, selected: bool) {
        self.data[(y * self.width + x) as usize] = if selected { MASK_ON } else { MASK_OFF };
    }

    /// Number of selected pixels.
    pub fn selected_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != MASK_OFF).count()
    }

    pub fn is_all_selected(&self) -> bool {
        self.data.iter().all(|&v| v == MASK_ON)
    }

    pub fn is_all_clear(&self) -> bool {
        self.data.iter().all(|&v| v == MASK_OFF)
    }

    /// True if every pixel selected in `self` is also selected in `other`.
    pub fn is_subset_of(&self, other: &Mask) -> bool {
        self.same_size(other)
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(&a, &b)| a == MASK_OFF || b != MASK_OFF)
    }

    #[inline]
    pub fn same_size(&self, other: &Mask) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Bitwise AND.
    ///
    /// # Panics
    /// Panics if the masks differ in size.
    pub fn and(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a & b)
    }

    /// Bitwise OR.
    ///
    /// # Panics
    /// Panics if the masks differ in size.
    pub fn or(&self, other: &Mask) -> Mask {
        self.zip_with(other, |a, b| a | b)
    }

    /// Bitwise NOT.
    pub fn invert(&self) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| !v).collect(),
        }
    }

    fn zip_with(&self, other: &Mask, op: impl Fn(u8, u8) -> u8) -> Mask {
        assert!(
            self.same_size(other),
            "mask size mismatch: {}x{} vs {}x{}",
            self.width,
            self.height,
            other.width,
            other.height
        );
        Mask {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| op(a, b))
                .collect(),
        }
    }
}
