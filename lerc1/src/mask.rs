//! Validity masks stored as run-length encoded bitmaps.
//!
//! RLE stream: a sequence of signed 16-bit little-endian counts. A positive
//! count is followed by that many literal bytes, a negative count by one byte
//! repeated `-count` times. The count `-32768` ends the stream.

use crate::cursor::ByteCursor;
use crate::{LercError, LercErrorCode, Result};

const RLE_END_OF_STREAM: i16 = i16::MIN;

/// Dense validity bitmap, one bit per pixel in row-major order, MSB first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    width: usize,
    height: usize,
    bits: Vec<u8>,
}

impl BitMask {
    /// All pixels start out invalid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![0; (width * height).div_ceil(8)],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn bits_mut(&mut self) -> &mut [u8] {
        &mut self.bits
    }

    pub fn is_valid(&self, k: usize) -> bool {
        self.bits[k >> 3] & (0x80 >> (k & 7)) != 0
    }

    pub fn set_valid(&mut self, k: usize, valid: bool) {
        let bit = 0x80 >> (k & 7);
        if valid {
            self.bits[k >> 3] |= bit;
        } else {
            self.bits[k >> 3] &= !bit;
        }
    }
}

/// Decompresses a compressed count plane into a validity mask.
pub trait MaskDecompressor {
    fn decompress(&self, compressed: &[u8], width: usize, height: usize) -> Result<BitMask>;
}

/// The RLE mask codec used by `CntZImage` count planes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RleMaskDecompressor;

impl MaskDecompressor for RleMaskDecompressor {
    fn decompress(&self, compressed: &[u8], width: usize, height: usize) -> Result<BitMask> {
        let mut mask = BitMask::new(width, height);
        rle_decompress(compressed, mask.bits_mut())?;
        Ok(mask)
    }
}

/// Expands an RLE stream into `out`. Runs that would overflow `out` are an
/// error, a stream that ends early leaves the remaining bytes untouched.
pub fn rle_decompress(compressed: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut cursor = ByteCursor::new(compressed);
    let mut dst = 0_usize;

    loop {
        let count = cursor
            .read_i16_le("RLE count")
            .map_err(|err| mask_error(err.message))?;
        if count == RLE_END_OF_STREAM {
            break;
        }

        let run_len = usize::from(count.unsigned_abs());
        if dst + run_len > out.len() {
            return Err(mask_error(format!(
                "RLE run of {run_len} bytes overflows {}-byte mask at offset {dst}.",
                out.len()
            )));
        }

        if count > 0 {
            let literal = cursor
                .take(run_len, "RLE literal run")
                .map_err(|err| mask_error(err.message))?;
            out[dst..dst + run_len].copy_from_slice(literal);
        } else {
            let byte = cursor
                .read_u8("RLE repeated byte")
                .map_err(|err| mask_error(err.message))?;
            out[dst..dst + run_len].fill(byte);
        }
        dst += run_len;
    }

    Ok(dst)
}

fn mask_error(message: impl Into<String>) -> LercError {
    LercError::new(LercErrorCode::MaskDecompressionFailed, message)
}
