use crate::consts::{
    CNT_Z_TYPE_CODE, CURRENT_VERSION, HEADER_LENGTH, MAX_DIMENSION, MIN_SUPPORTED_VERSION,
    PLANE_HEADER_LENGTH, TYPE_STRING,
};
use crate::cursor::ByteCursor;
use crate::image::CntZImage;
use crate::mask::{MaskDecompressor, RleMaskDecompressor};
use crate::tiles::{read_cnt_tile, read_z_tile, tile_grid, ZTileParams};
use crate::{DecodeOptions, LercError, LercErrorCode, RasterHeader, Result};

/// Number of bytes a header-only decode consumes.
///
/// This is the fixed header alone. The smallest complete blob is larger:
/// see [`MIN_BLOB_LENGTH`](crate::MIN_BLOB_LENGTH).
pub fn compute_num_bytes_needed_to_read_header() -> usize {
    HEADER_LENGTH
}

/// Parses and validates the fixed header.
///
/// `max_z_error` is the loosest error the caller accepts; blobs encoded with a
/// looser bound are rejected.
pub fn read_header(cursor: &mut ByteCursor<'_>, max_z_error: f64) -> Result<RasterHeader> {
    let type_string = cursor.take(TYPE_STRING.len(), "type string")?;
    if type_string != TYPE_STRING {
        return Err(LercError::new(
            LercErrorCode::FormatMismatch,
            format!(
                "Invalid type string {:?}.",
                String::from_utf8_lossy(type_string)
            ),
        ));
    }

    let version = cursor.read_i32_le("version")?;
    let type_code = cursor.read_i32_le("type")?;
    let height = cursor.read_i32_le("height")?;
    let width = cursor.read_i32_le("width")?;
    let max_z_error_in_file = cursor.read_f64_le("max z error")?;

    if !(MIN_SUPPORTED_VERSION..=CURRENT_VERSION).contains(&version) {
        return Err(LercError::new(
            LercErrorCode::VersionUnsupported,
            format!(
                "Unsupported version {version}, expected {MIN_SUPPORTED_VERSION}..={CURRENT_VERSION}."
            ),
        ));
    }

    if type_code != CNT_Z_TYPE_CODE {
        return Err(LercError::new(
            LercErrorCode::FormatMismatch,
            format!("Unexpected image type {type_code}, expected {CNT_Z_TYPE_CODE}."),
        ));
    }

    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(LercError::new(
            LercErrorCode::DimensionTooLarge,
            format!("Dimensions {width}x{height} exceed {MAX_DIMENSION}."),
        ));
    }

    if width <= 0 || height <= 0 {
        return Err(LercError::new(
            LercErrorCode::InvalidDimensions,
            format!("Dimensions must be > 0, got {width}x{height}."),
        ));
    }

    if max_z_error_in_file > max_z_error {
        return Err(LercError::new(
            LercErrorCode::ErrorToleranceViolated,
            format!(
                "Blob was encoded with max error {max_z_error_in_file}, caller allows {max_z_error}."
            ),
        ));
    }

    let header = RasterHeader {
        version,
        type_code,
        width: width as usize,
        height: height as usize,
        max_z_error: max_z_error_in_file,
    };
    tracing::debug!(
        version,
        width = header.width,
        height = header.height,
        max_z_error = max_z_error_in_file,
        "CntZImage header"
    );
    Ok(header)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlaneHeader {
    num_tiles_vert: usize,
    num_tiles_hori: usize,
    num_bytes: usize,
    max_val_in_plane: f32,
}

impl PlaneHeader {
    fn read(cursor: &mut ByteCursor<'_>, plane: &str) -> Result<Self> {
        let header_bytes = cursor.take(PLANE_HEADER_LENGTH, "plane header")?;
        let mut fields = ByteCursor::new(header_bytes);
        let num_tiles_vert = fields.read_i32_le("numTilesVert")?;
        let num_tiles_hori = fields.read_i32_le("numTilesHori")?;
        let num_bytes = fields.read_i32_le("numBytes")?;
        let max_val_in_plane = fields.read_f32_le("maxValInImg")?;

        if num_tiles_vert < 0 || num_tiles_hori < 0 || num_bytes < 0 {
            return Err(LercError::new(
                LercErrorCode::InvalidPlaneHeader,
                format!(
                    "Negative field in {plane} plane header: tiles {num_tiles_vert}x{num_tiles_hori}, {num_bytes} bytes."
                ),
            ));
        }
        if (num_tiles_vert == 0) != (num_tiles_hori == 0) {
            return Err(LercError::new(
                LercErrorCode::InvalidPlaneHeader,
                format!(
                    "Inconsistent tiling {num_tiles_vert}x{num_tiles_hori} in {plane} plane header."
                ),
            ));
        }

        Ok(Self {
            num_tiles_vert: num_tiles_vert as usize,
            num_tiles_hori: num_tiles_hori as usize,
            num_bytes: num_bytes as usize,
            max_val_in_plane,
        })
    }

    fn is_tiled(&self) -> bool {
        self.num_tiles_vert > 0
    }
}

/// Decoder for `CntZImage` blobs.
///
/// Owns the per-session scratch state: the bit-stuffer buffer reused across
/// tiles and the mask-elision flag. Both are reset by every [`decode`] call.
///
/// [`decode`]: CntZDecoder::decode
#[derive(Debug, Clone, Default)]
pub struct CntZDecoder<M = RleMaskDecompressor> {
    mask_decompressor: M,
    scratch: Vec<u32>,
    can_ignore_mask: bool,
}

impl CntZDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: MaskDecompressor> CntZDecoder<M> {
    pub fn with_mask_decompressor(mask_decompressor: M) -> Self {
        Self {
            mask_decompressor,
            scratch: Vec::new(),
            can_ignore_mask: false,
        }
    }

    /// True when the last count plane decoded to a constant positive count,
    /// letting the value plane skip per-pixel validity checks.
    pub fn can_ignore_mask(&self) -> bool {
        self.can_ignore_mask
    }

    /// Decodes one blob from `cursor` into `image`.
    ///
    /// Without [`DecodeOptions::value_only`] the image is resized to the
    /// header dimensions and zero-filled first. With it, `image` must already
    /// hold the count plane of a blob with the same dimensions. With
    /// [`DecodeOptions::header_only`] nothing past the header is read and
    /// `image` is left untouched.
    ///
    /// On error `image` holds unspecified (but initialized) pixels.
    pub fn decode(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        image: &mut CntZImage,
        options: &DecodeOptions,
    ) -> Result<RasterHeader> {
        self.scratch.clear();
        self.can_ignore_mask = false;
        let result = self.decode_planes(cursor, image, options);
        self.scratch.clear();
        result
    }

    fn decode_planes(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        image: &mut CntZImage,
        options: &DecodeOptions,
    ) -> Result<RasterHeader> {
        let header = read_header(cursor, options.max_z_error)?;
        if options.header_only {
            return Ok(header);
        }

        if options.value_only {
            if image.width() != header.width || image.height() != header.height {
                return Err(LercError::new(
                    LercErrorCode::BufferMismatch,
                    format!(
                        "Value-only decode of a {}x{} blob into a {}x{} image.",
                        header.width,
                        header.height,
                        image.width(),
                        image.height()
                    ),
                ));
            }
        } else {
            image.resize(header.width, header.height)?;
            self.read_cnt_plane(cursor, image)?;
        }

        self.read_z_plane(cursor, image, header.max_z_error)?;
        Ok(header)
    }

    fn read_cnt_plane(&mut self, cursor: &mut ByteCursor<'_>, image: &mut CntZImage) -> Result<()> {
        let plane = PlaneHeader::read(cursor, "count")?;
        let block = cursor.take(plane.num_bytes, "count plane")?;

        if plane.is_tiled() {
            tracing::debug!(
                tiles_vert = plane.num_tiles_vert,
                tiles_hori = plane.num_tiles_hori,
                num_bytes = plane.num_bytes,
                "count plane: tiled"
            );
            let mut block_cursor = ByteCursor::new(block);
            for tile in tile_grid(
                image.height(),
                image.width(),
                plane.num_tiles_vert,
                plane.num_tiles_hori,
            ) {
                read_cnt_tile(&mut block_cursor, image, tile, &mut self.scratch)?;
            }
            warn_on_unread_bytes("count", &block_cursor);
        } else if plane.num_bytes == 0 {
            tracing::debug!(cnt = plane.max_val_in_plane, "count plane: constant");
            for px in image.data_mut() {
                px.cnt = plane.max_val_in_plane;
            }
            if plane.max_val_in_plane > 0.0 {
                self.can_ignore_mask = true;
            }
        } else {
            tracing::debug!(num_bytes = plane.num_bytes, "count plane: RLE mask");
            let mask = self
                .mask_decompressor
                .decompress(block, image.width(), image.height())?;
            for (k, px) in image.data_mut().iter_mut().enumerate() {
                px.cnt = if mask.is_valid(k) { 1.0 } else { 0.0 };
            }
        }

        Ok(())
    }

    fn read_z_plane(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        image: &mut CntZImage,
        max_z_error_in_file: f64,
    ) -> Result<()> {
        let plane = PlaneHeader::read(cursor, "value")?;
        let block = cursor.take(plane.num_bytes, "value plane")?;

        if !plane.is_tiled() {
            if plane.num_bytes > 0 {
                return Err(LercError::new(
                    LercErrorCode::InvalidPlaneHeader,
                    "Value plane cannot be mask-compressed.",
                ));
            }
            tracing::debug!(z = plane.max_val_in_plane, "value plane: constant");
            for px in image.data_mut().iter_mut().filter(|px| px.cnt > 0.0) {
                px.z = plane.max_val_in_plane;
            }
            return Ok(());
        }

        tracing::debug!(
            tiles_vert = plane.num_tiles_vert,
            tiles_hori = plane.num_tiles_hori,
            num_bytes = plane.num_bytes,
            ignore_mask = self.can_ignore_mask,
            "value plane: tiled"
        );
        let params = ZTileParams {
            max_z_error_in_file,
            max_z_in_plane: plane.max_val_in_plane,
            ignore_mask: self.can_ignore_mask,
        };
        let mut block_cursor = ByteCursor::new(block);
        for tile in tile_grid(
            image.height(),
            image.width(),
            plane.num_tiles_vert,
            plane.num_tiles_hori,
        ) {
            read_z_tile(&mut block_cursor, image, tile, &mut self.scratch, params)?;
        }
        warn_on_unread_bytes("value", &block_cursor);
        Ok(())
    }
}

fn warn_on_unread_bytes(plane: &str, block_cursor: &ByteCursor<'_>) {
    if !block_cursor.is_empty() {
        tracing::warn!(
            plane,
            unread = block_cursor.remaining(),
            "tiles did not consume the whole plane block"
        );
    }
}
