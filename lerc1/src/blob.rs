use std::borrow::Cow;
use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::consts::TYPE_STRING;
use crate::{LercError, LercErrorCode, Result};

/// Outer wrapping of a stored `CntZImage` blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlobWrapping {
    #[default]
    None,
    Zlib,
}

impl BlobWrapping {
    /// A blob starting with the type string is bare; otherwise a valid zlib
    /// stream header (deflate method, check bits) marks it as wrapped.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(TYPE_STRING) {
            return Self::None;
        }
        match bytes {
            [cmf, flg, ..] if cmf & 0x0f == 8 && u16::from_be_bytes([*cmf, *flg]) % 31 == 0 => {
                Self::Zlib
            }
            _ => Self::None,
        }
    }
}

/// Returns the bare blob, inflating it first when it is zlib-wrapped.
pub fn unwrap_blob(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    decompress_blob(BlobWrapping::detect(bytes), bytes)
}

pub fn decompress_blob(wrapping: BlobWrapping, bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    match wrapping {
        BlobWrapping::None => Ok(Cow::Borrowed(bytes)),
        BlobWrapping::Zlib => {
            let mut decoder = ZlibDecoder::new(bytes);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(|err| {
                LercError::new(
                    LercErrorCode::DecompressionFailed,
                    format!("Could not inflate zlib-wrapped blob: {err}"),
                )
            })?;
            tracing::debug!(
                compressed = bytes.len(),
                inflated = out.len(),
                "inflated zlib-wrapped blob"
            );
            Ok(Cow::Owned(out))
        }
    }
}
