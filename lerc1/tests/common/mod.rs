//! Blob construction helpers shared by the integration tests.
#![allow(dead_code)]

use lerc1_cntz::{bit_stuffer, num_bytes_flt, CNT_Z_TYPE_CODE, CURRENT_VERSION, TYPE_STRING};

pub struct BlobBuilder {
    bytes: Vec<u8>,
}

impl BlobBuilder {
    pub fn new(width: i32, height: i32, max_z_error: f64) -> Self {
        Self::with_header(CURRENT_VERSION, CNT_Z_TYPE_CODE, width, height, max_z_error)
    }

    pub fn with_header(
        version: i32,
        type_code: i32,
        width: i32,
        height: i32,
        max_z_error: f64,
    ) -> Self {
        let mut bytes = TYPE_STRING.to_vec();
        bytes.extend_from_slice(&version.to_le_bytes());
        bytes.extend_from_slice(&type_code.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&max_z_error.to_le_bytes());
        Self { bytes }
    }

    /// Appends a plane whose declared byte count is the payload length.
    pub fn plane(
        self,
        num_tiles_vert: i32,
        num_tiles_hori: i32,
        max_val: f32,
        payload: &[u8],
    ) -> Self {
        let num_bytes = payload.len() as i32;
        self.plane_with_num_bytes(num_tiles_vert, num_tiles_hori, num_bytes, max_val, payload)
    }

    pub fn plane_with_num_bytes(
        mut self,
        num_tiles_vert: i32,
        num_tiles_hori: i32,
        num_bytes: i32,
        max_val: f32,
        payload: &[u8],
    ) -> Self {
        self.bytes.extend_from_slice(&num_tiles_vert.to_le_bytes());
        self.bytes.extend_from_slice(&num_tiles_hori.to_le_bytes());
        self.bytes.extend_from_slice(&num_bytes.to_le_bytes());
        self.bytes.extend_from_slice(&max_val.to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Appends a float offset using the smallest width that stores it exactly and
/// returns the flag bits 6-7 selecting that width.
pub fn push_offset(out: &mut Vec<u8>, offset: f32) -> u8 {
    match num_bytes_flt(offset) {
        1 => {
            out.push(offset as i8 as u8);
            2 << 6
        }
        2 => {
            out.extend_from_slice(&(offset as i16).to_le_bytes());
            1 << 6
        }
        _ => {
            out.extend_from_slice(&offset.to_le_bytes());
            0
        }
    }
}

/// Tile with flag mode `mode`, a float offset and a bit-stuffed array.
pub fn bit_stuffed_tile(mode: u8, offset: f32, values: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    let bits67 = push_offset(&mut body, offset);
    bit_stuffer::write(values, &mut body).expect("bit stuff tile values");

    let mut tile = vec![mode | bits67];
    tile.extend_from_slice(&body);
    tile
}

/// Run-length encodes `bytes` as literal runs only.
pub fn rle_literal(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in bytes.chunks(i16::MAX as usize) {
        out.extend_from_slice(&(chunk.len() as i16).to_le_bytes());
        out.extend_from_slice(chunk);
    }
    out.extend_from_slice(&i16::MIN.to_le_bytes());
    out
}

/// MSB-first validity bitmap.
pub fn pack_mask(valid: &[bool]) -> Vec<u8> {
    let mut bits = vec![0_u8; valid.len().div_ceil(8)];
    for (k, _) in valid.iter().enumerate().filter(|(_, v)| **v) {
        bits[k >> 3] |= 0x80 >> (k & 7);
    }
    bits
}

/// Tile rectangles `(row0, row1, col0, col1)` in decode order.
pub fn tile_rects(
    height: usize,
    width: usize,
    tiles_vert: usize,
    tiles_hori: usize,
) -> Vec<(usize, usize, usize, usize)> {
    let tile_h = height / tiles_vert;
    let tile_w = width / tiles_hori;
    let mut rects = Vec::new();
    for i in 0..=tiles_vert {
        let h = if i == tiles_vert { height % tiles_vert } else { tile_h };
        for j in 0..=tiles_hori {
            let w = if j == tiles_hori { width % tiles_hori } else { tile_w };
            if h > 0 && w > 0 {
                rects.push((i * tile_h, i * tile_h + h, j * tile_w, j * tile_w + w));
            }
        }
    }
    rects
}

/// Minimal lossy encoder: RLE mask count plane (or constant when every pixel
/// is valid) and a tiled, bit-stuffed value plane.
pub fn encode_quantized(
    width: usize,
    height: usize,
    valid: &[bool],
    values: &[f32],
    max_z_error: f64,
    tiles_vert: usize,
    tiles_hori: usize,
) -> Vec<u8> {
    let mut builder = BlobBuilder::new(width as i32, height as i32, max_z_error);
    builder = if valid.iter().all(|v| *v) {
        builder.plane(0, 0, 1.0, &[])
    } else {
        builder.plane(0, 0, 1.0, &rle_literal(&pack_mask(valid)))
    };

    let max_z = values
        .iter()
        .zip(valid)
        .filter(|(_, v)| **v)
        .map(|(z, _)| *z)
        .fold(f32::MIN, f32::max);

    let mut payload = Vec::new();
    for (row0, row1, col0, col1) in tile_rects(height, width, tiles_vert, tiles_hori) {
        let tile_values: Vec<f32> = (row0..row1)
            .flat_map(|row| (col0..col1).map(move |col| row * width + col))
            .filter(|k| valid[*k])
            .map(|k| values[k])
            .collect();

        if tile_values.is_empty() {
            payload.push(2);
            continue;
        }

        let z_min = tile_values.iter().copied().fold(f32::MAX, f32::min);
        let quantized: Vec<u32> = tile_values
            .iter()
            .map(|z| {
                let steps = (f64::from(*z) - f64::from(z_min)) / (2.0 * max_z_error);
                (steps + 0.5).floor() as u32
            })
            .collect();
        payload.extend_from_slice(&bit_stuffed_tile(1, z_min, &quantized));
    }

    builder
        .plane(tiles_vert as i32, tiles_hori as i32, max_z, &payload)
        .finish()
}
