use std::ops::{Index, IndexMut};

use crate::{LercError, LercErrorCode, Result};

/// One decoded pixel: `cnt > 0` marks it valid, `z` is its value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CntZ {
    pub cnt: f32,
    pub z: f32,
}

impl CntZ {
    pub const fn new(cnt: f32, z: f32) -> Self {
        Self { cnt, z }
    }

    pub fn is_valid(self) -> bool {
        self.cnt > 0.0
    }
}

/// Row-major grid of [`CntZ`] pixels.
///
/// Resizing always zero-fills, so every pixel reads `(0, 0)` until written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CntZImage {
    width: usize,
    height: usize,
    data: Vec<CntZ>,
}

impl CntZImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(width: usize, height: usize) -> Result<Self> {
        let mut image = Self::new();
        image.resize(width, height)?;
        Ok(image)
    }

    /// Resizes to `width` x `height` and sets every pixel to `(0, 0)`.
    ///
    /// The allocation is kept when the pixel count shrinks or stays equal.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(LercError::new(
                LercErrorCode::InvalidDimensions,
                format!("Image dimensions must be > 0, got {width}x{height}."),
            ));
        }
        let size = width.checked_mul(height).ok_or_else(|| {
            LercError::new(
                LercErrorCode::InvalidDimensions,
                format!("Image dimensions {width}x{height} overflow."),
            )
        })?;

        self.data.clear();
        self.data.resize(size, CntZ::default());
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.width = 0;
        self.height = 0;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[CntZ] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [CntZ] {
        &mut self.data
    }

    pub fn get_pixel(&self, row: usize, col: usize) -> CntZ {
        self[(row, col)]
    }

    pub fn set_pixel(&mut self, row: usize, col: usize, pixel: CntZ) {
        self[(row, col)] = pixel;
    }

    /// Pixels `col0..col1` of `row`.
    pub fn row_span_mut(&mut self, row: usize, col0: usize, col1: usize) -> &mut [CntZ] {
        let start = row * self.width;
        &mut self.data[start + col0..start + col1]
    }

    pub fn count_valid(&self) -> usize {
        self.data.iter().filter(|px| px.is_valid()).count()
    }

    pub fn valid_mask(&self) -> Vec<bool> {
        self.data.iter().map(|px| px.is_valid()).collect()
    }
}

impl Index<(usize, usize)> for CntZImage {
    type Output = CntZ;

    fn index(&self, (row, col): (usize, usize)) -> &CntZ {
        &self.data[row * self.width + col]
    }
}

impl IndexMut<(usize, usize)> for CntZImage {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut CntZ {
        &mut self.data[row * self.width + col]
    }
}
