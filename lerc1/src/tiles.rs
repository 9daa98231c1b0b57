//! Tile grid geometry and per-tile decoding for the count and value planes.

use crate::bit_stuffer;
use crate::consts::{
    CNT_FLAG_MINUS_ONE, CNT_FLAG_PLUS_ONE, CNT_FLAG_RAW, CNT_FLAG_ZERO, FLAG_MODE_MASK,
    Z_MODE_CONST, Z_MODE_RAW, Z_MODE_ZERO,
};
use crate::cursor::ByteCursor;
use crate::image::{CntZ, CntZImage};
use crate::{LercError, LercErrorCode, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tile {
    pub row0: usize,
    pub row1: usize,
    pub col0: usize,
    pub col1: usize,
}

impl Tile {
    pub fn num_pixels(&self) -> usize {
        (self.row1 - self.row0) * (self.col1 - self.col0)
    }
}

/// Tiles of a `height` x `width` plane in row-major order.
///
/// The uniform tiles are `height / num_tiles_vert` x `width / num_tiles_hori`;
/// one extra row and column of tiles covers the remainder. Empty tiles are
/// not yielded. Both tile counts must be > 0.
///
/// Cost is bounded by the number of non-empty tiles: when the uniform tile
/// size in a direction is zero only the remainder index is visited, so a
/// header declaring huge tile counts over a small image stays cheap.
pub(crate) fn tile_grid(
    height: usize,
    width: usize,
    num_tiles_vert: usize,
    num_tiles_hori: usize,
) -> impl Iterator<Item = Tile> {
    let tile_h = height / num_tiles_vert;
    let tile_w = width / num_tiles_hori;
    let first_row_tile = if tile_h == 0 { num_tiles_vert } else { 0 };
    let first_col_tile = if tile_w == 0 { num_tiles_hori } else { 0 };

    (first_row_tile..=num_tiles_vert)
        .map(move |i_tile| {
            let h = if i_tile == num_tiles_vert {
                height % num_tiles_vert
            } else {
                tile_h
            };
            (i_tile * tile_h, h)
        })
        .filter(|&(_, h)| h > 0)
        .flat_map(move |(row0, h)| {
            (first_col_tile..=num_tiles_hori).filter_map(move |j_tile| {
                let col0 = j_tile * tile_w;
                let w = if j_tile == num_tiles_hori {
                    width % num_tiles_hori
                } else {
                    tile_w
                };

                (w > 0).then_some(Tile {
                    row0,
                    row1: row0 + h,
                    col0,
                    col1: col0 + w,
                })
            })
        })
}

/// Parameters shared by every value tile of one plane.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ZTileParams {
    pub max_z_error_in_file: f64,
    pub max_z_in_plane: f32,
    pub ignore_mask: bool,
}

pub(crate) fn read_cnt_tile(
    cursor: &mut ByteCursor<'_>,
    image: &mut CntZImage,
    tile: Tile,
    scratch: &mut Vec<u32>,
) -> Result<()> {
    let flag = cursor.read_u8("count tile flag")?;
    tracing::trace!(?tile, flag, "count tile");

    match flag {
        // Relies on the zero-filled image.
        CNT_FLAG_ZERO => return Ok(()),
        CNT_FLAG_MINUS_ONE | CNT_FLAG_PLUS_ONE => {
            let cnt = if flag == CNT_FLAG_MINUS_ONE { -1.0 } else { 1.0 };
            for row in tile.row0..tile.row1 {
                image
                    .row_span_mut(row, tile.col0, tile.col1)
                    .fill(CntZ::new(cnt, 0.0));
            }
            return Ok(());
        }
        _ => {}
    }

    if flag & FLAG_MODE_MASK > CNT_FLAG_PLUS_ONE {
        return Err(LercError::new(
            LercErrorCode::CorruptTileFlag,
            format!("Invalid count tile flag 0x{flag:02x}."),
        ));
    }

    let num_pixels = tile.num_pixels();
    if flag == CNT_FLAG_RAW {
        let raw = cursor.take(num_pixels * 4, "raw count tile")?;
        let mut values = raw
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        for row in tile.row0..tile.row1 {
            for (px, cnt) in image
                .row_span_mut(row, tile.col0, tile.col1)
                .iter_mut()
                .zip(values.by_ref())
            {
                px.cnt = cnt;
            }
        }
        return Ok(());
    }

    let offset = read_flt(cursor, offset_width(flag >> 6)?)?;
    bit_stuffer::read(cursor, scratch, num_pixels)?;
    if scratch.len() < num_pixels {
        return Err(too_few_values(scratch.len(), num_pixels));
    }

    let mut values = scratch.iter();
    for row in tile.row0..tile.row1 {
        for (px, value) in image
            .row_span_mut(row, tile.col0, tile.col1)
            .iter_mut()
            .zip(values.by_ref())
        {
            px.cnt = offset + *value as f32;
        }
    }
    Ok(())
}

pub(crate) fn read_z_tile(
    cursor: &mut ByteCursor<'_>,
    image: &mut CntZImage,
    tile: Tile,
    scratch: &mut Vec<u32>,
    params: ZTileParams,
) -> Result<()> {
    let flag = cursor.read_u8("value tile flag")?;
    let bits67 = flag >> 6;
    let mode = flag & FLAG_MODE_MASK;
    tracing::trace!(?tile, flag, "value tile");

    if mode == Z_MODE_ZERO {
        for_each_valid(image, tile, |px| px.z = 0.0);
        return Ok(());
    }

    if mode > Z_MODE_CONST {
        return Err(LercError::new(
            LercErrorCode::CorruptTileFlag,
            format!("Invalid value tile flag 0x{flag:02x}."),
        ));
    }

    if mode == Z_MODE_RAW {
        for row in tile.row0..tile.row1 {
            for px in image.row_span_mut(row, tile.col0, tile.col1) {
                if px.cnt > 0.0 {
                    px.z = cursor.read_f32_le("raw value")?;
                }
            }
        }
        return Ok(());
    }

    let offset = read_flt(cursor, offset_width(bits67)?)?;
    if mode == Z_MODE_CONST {
        for_each_valid(image, tile, |px| px.z = offset);
        return Ok(());
    }

    bit_stuffer::read(cursor, scratch, tile.num_pixels())?;

    let inv_scale = 2.0 * params.max_z_error_in_file;
    let max_z = params.max_z_in_plane;
    let mut values = scratch.iter();
    let mut consumed = 0_usize;
    for row in tile.row0..tile.row1 {
        for px in image.row_span_mut(row, tile.col0, tile.col1) {
            if params.ignore_mask || px.cnt > 0.0 {
                let value = values
                    .next()
                    .ok_or_else(|| too_few_values(consumed, consumed + 1))?;
                consumed += 1;
                let z = (f64::from(offset) + f64::from(*value) * inv_scale) as f32;
                // Quantization must not push a value past the plane maximum.
                px.z = if max_z < z { max_z } else { z };
            }
        }
    }
    Ok(())
}

/// Byte width of a float offset for the selector in flag bits 6-7.
fn offset_width(bits67: u8) -> Result<usize> {
    match bits67 {
        0 => Ok(4),
        1 => Ok(2),
        2 => Ok(1),
        _ => Err(LercError::new(
            LercErrorCode::CorruptTileFlag,
            "Tile flag selects a reserved offset width.",
        )),
    }
}

fn read_flt(cursor: &mut ByteCursor<'_>, width: usize) -> Result<f32> {
    match width {
        1 => cursor.read_i8("tile offset").map(f32::from),
        2 => cursor.read_i16_le("tile offset").map(f32::from),
        _ => cursor.read_f32_le("tile offset"),
    }
}

/// Smallest of 1, 2 or 4 bytes that stores `z` as a tile offset without loss:
/// 1 if it survives truncation to `i8`, 2 if it survives truncation to `i16`.
pub fn num_bytes_flt(z: f32) -> usize {
    let s = z as i32 as i16;
    let c = s as i8;
    if f32::from(c) == z {
        1
    } else if f32::from(s) == z {
        2
    } else {
        4
    }
}

fn for_each_valid(image: &mut CntZImage, tile: Tile, mut f: impl FnMut(&mut CntZ)) {
    for row in tile.row0..tile.row1 {
        for px in image.row_span_mut(row, tile.col0, tile.col1) {
            if px.cnt > 0.0 {
                f(px);
            }
        }
    }
}

fn too_few_values(got: usize, needed: usize) -> LercError {
    LercError::new(
        LercErrorCode::CorruptBitStuffing,
        format!("Bit-stuffed tile holds {got} values, {needed} needed."),
    )
}
