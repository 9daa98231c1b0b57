//! Decoder for LERC1 `CntZImage` blobs.
//!
//! A blob holds a count plane (per-pixel validity or weight) and a value plane,
//! each either constant or split into tiles compressed independently. Values
//! are quantized with step `2 * max_z_error`, so every decoded value lies
//! within `max_z_error` of the original.

use std::fmt;

pub mod bit_stuffer;
mod blob;
mod consts;
mod cursor;
mod decoder;
mod image;
pub mod mask;
mod tiles;

pub use blob::{decompress_blob, unwrap_blob, BlobWrapping};
pub use consts::{
    CNT_Z_TYPE_CODE, CURRENT_VERSION, HEADER_LENGTH, MAX_DIMENSION, MIN_BLOB_LENGTH,
    MIN_SUPPORTED_VERSION, TYPE_STRING,
};
pub use cursor::ByteCursor;
pub use decoder::{compute_num_bytes_needed_to_read_header, read_header, CntZDecoder};
pub use image::{CntZ, CntZImage};
pub use mask::{BitMask, MaskDecompressor, RleMaskDecompressor};
pub use tiles::num_bytes_flt;

/// Fixed header of a `CntZImage` blob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterHeader {
    pub version: i32,
    pub type_code: i32,
    pub width: usize,
    pub height: usize,
    /// Error bound the blob was encoded with.
    pub max_z_error: f64,
}

/// Controls how much of a blob [`CntZDecoder::decode`] reads and the loosest error
/// bound it accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    /// Loosest error bound the caller accepts.
    pub max_z_error: f64,
    /// Stop after validating the header.
    pub header_only: bool,
    /// Decode only the value plane into an image whose count plane is
    /// already in place.
    pub value_only: bool,
}

impl DecodeOptions {
    pub fn new(max_z_error: f64) -> Self {
        Self {
            max_z_error,
            header_only: false,
            value_only: false,
        }
    }

    pub fn header_only(mut self) -> Self {
        self.header_only = true;
        self
    }

    pub fn value_only(mut self) -> Self {
        self.value_only = true;
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::new(f64::INFINITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LercErrorCode {
    FormatMismatch,
    VersionUnsupported,
    DimensionTooLarge,
    InvalidDimensions,
    ErrorToleranceViolated,
    InvalidPlaneHeader,
    CorruptTileFlag,
    CorruptBitStuffing,
    TruncatedInput,
    MaskDecompressionFailed,
    BufferMismatch,
    DecompressionFailed,
    SizeLimitExceeded,
}

impl LercErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FormatMismatch => "FORMAT_MISMATCH",
            Self::VersionUnsupported => "VERSION_UNSUPPORTED",
            Self::DimensionTooLarge => "DIMENSION_TOO_LARGE",
            Self::InvalidDimensions => "INVALID_DIMENSIONS",
            Self::ErrorToleranceViolated => "ERROR_TOLERANCE_VIOLATED",
            Self::InvalidPlaneHeader => "INVALID_PLANE_HEADER",
            Self::CorruptTileFlag => "CORRUPT_TILE_FLAG",
            Self::CorruptBitStuffing => "CORRUPT_BIT_STUFFING",
            Self::TruncatedInput => "TRUNCATED_INPUT",
            Self::MaskDecompressionFailed => "MASK_DECOMPRESSION_FAILED",
            Self::BufferMismatch => "BUFFER_MISMATCH",
            Self::DecompressionFailed => "DECOMPRESSION_FAILED",
            Self::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for LercErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LercError {
    pub code: LercErrorCode,
    pub message: String,
}

impl LercError {
    pub fn new(code: LercErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for LercError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LercError {}

pub type Result<T> = std::result::Result<T, LercError>;

/// Reads the header of a (possibly zlib-wrapped) blob without decoding pixels.
pub fn inspect_header(bytes: &[u8]) -> Result<RasterHeader> {
    let blob = unwrap_blob(bytes)?;
    read_header(&mut ByteCursor::new(&blob), f64::INFINITY)
}

/// Decodes a complete (possibly zlib-wrapped) blob into a new image.
pub fn decode_cntz_image(bytes: &[u8], max_z_error: f64) -> Result<CntZImage> {
    let blob = unwrap_blob(bytes)?;
    let mut image = CntZImage::new();
    CntZDecoder::new().decode(
        &mut ByteCursor::new(&blob),
        &mut image,
        &DecodeOptions::new(max_z_error),
    )?;
    Ok(image)
}
