//! Arrays of unsigned integers packed at the minimal uniform bit width.
//!
//! Layout: one header byte (bits 0-5 hold the bit width, bits 6-7 select the
//! width of the element count field), the element count, then the values
//! packed MSB-first into little-endian 32-bit words. The unused low-order
//! bytes of the last word are not stored.

use crate::cursor::ByteCursor;
use crate::{LercError, LercErrorCode, Result};

/// Slack an encoder should allocate beyond [`compute_num_bytes_needed`].
pub const EXTRA_BYTES_TO_ALLOCATE: usize = 3;

const MAX_NUM_BITS: u32 = 31;

/// Exact number of bytes [`write`] produces for `num_elem` values whose
/// maximum is `max_elem`.
pub fn compute_num_bytes_needed(num_elem: u32, max_elem: u32) -> usize {
    let num_bits = bit_width(max_elem);
    let num_uints = num_uints(num_elem as usize, num_bits);
    1 + num_bytes_uint(num_elem) + num_uints * 4
        - num_tail_bytes_not_needed(num_elem as usize, num_bits)
}

/// Reads one bit-stuffed array into `data`, replacing its contents.
///
/// `max_elements` bounds the element count taken from the stream so a corrupt
/// count cannot trigger an oversized allocation.
pub fn read(
    cursor: &mut ByteCursor<'_>,
    data: &mut Vec<u32>,
    max_elements: usize,
) -> Result<()> {
    let header = cursor.read_u8("bit stuffer header")?;
    let count_width = count_field_width(header >> 6)?;
    let num_bits = u32::from(header & 63);
    let num_elements = read_uint(cursor, count_width)? as usize;

    if num_bits > MAX_NUM_BITS {
        return Err(LercError::new(
            LercErrorCode::CorruptBitStuffing,
            format!("Bit width {num_bits} exceeds {MAX_NUM_BITS}."),
        ));
    }
    if num_elements > max_elements {
        return Err(LercError::new(
            LercErrorCode::CorruptBitStuffing,
            format!("Element count {num_elements} exceeds the {max_elements} expected."),
        ));
    }

    data.clear();
    data.resize(num_elements, 0);

    let num_uints = num_uints(num_elements, num_bits);
    if num_uints == 0 {
        return Ok(());
    }

    let tail = num_tail_bytes_not_needed(num_elements, num_bits);
    let packed = cursor.take(num_uints * 4 - tail, "bit-stuffed values")?;
    let word = |idx: usize| -> u32 {
        let start = idx * 4;
        if idx + 1 < num_uints {
            let mut arr = [0_u8; 4];
            arr.copy_from_slice(&packed[start..start + 4]);
            u32::from_le_bytes(arr)
        } else {
            let mut arr = [0_u8; 4];
            arr[..4 - tail].copy_from_slice(&packed[start..]);
            u32::from_le_bytes(arr) << (8 * tail)
        }
    };

    let mut src = 0_usize;
    let mut bit_pos = 0_u32;
    for dst in data.iter_mut() {
        let current = word(src);
        if 32 - bit_pos >= num_bits {
            *dst = (current << bit_pos) >> (32 - num_bits);
            bit_pos += num_bits;
            if bit_pos == 32 {
                bit_pos = 0;
                src += 1;
            }
        } else {
            let high = (current << bit_pos) >> (32 - num_bits);
            src += 1;
            bit_pos -= 32 - num_bits;
            *dst = high | (word(src) >> (32 - bit_pos));
        }
    }

    Ok(())
}

/// Appends `data` to `out` in bit-stuffed form.
pub fn write(data: &[u32], out: &mut Vec<u8>) -> Result<()> {
    let num_elements = u32::try_from(data.len()).map_err(|_| {
        LercError::new(
            LercErrorCode::SizeLimitExceeded,
            format!("Cannot bit-stuff {} elements.", data.len()),
        )
    })?;
    let max_elem = data.iter().copied().max().unwrap_or(0);
    let num_bits = bit_width(max_elem);
    if num_bits > MAX_NUM_BITS {
        return Err(LercError::new(
            LercErrorCode::SizeLimitExceeded,
            format!("Value {max_elem} needs more than {MAX_NUM_BITS} bits."),
        ));
    }

    let count_width = num_bytes_uint(num_elements);
    let bits67 = if count_width == 4 { 0 } else { 3 - count_width as u8 };
    out.push(num_bits as u8 | (bits67 << 6));
    write_uint(out, num_elements, count_width);

    let num_uints = num_uints(data.len(), num_bits);
    if num_uints == 0 {
        return Ok(());
    }

    let mut words = vec![0_u32; num_uints];
    let mut dst = 0_usize;
    let mut bit_pos = 0_u32;
    for &value in data {
        if 32 - bit_pos >= num_bits {
            words[dst] |= value << (32 - bit_pos - num_bits);
            bit_pos += num_bits;
            if bit_pos == 32 {
                dst += 1;
                bit_pos = 0;
            }
        } else {
            bit_pos = bit_pos + num_bits - 32;
            words[dst] |= value >> bit_pos;
            dst += 1;
            words[dst] |= value << (32 - bit_pos);
        }
    }

    let tail = num_tail_bytes_not_needed(data.len(), num_bits);
    if let Some(last) = words.last_mut() {
        *last >>= 8 * tail;
    }

    for word in &words[..num_uints - 1] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&words[num_uints - 1].to_le_bytes()[..4 - tail]);
    Ok(())
}

/// Width in bytes of an unsigned count field: 1, 2, or 4.
pub fn num_bytes_uint(k: u32) -> usize {
    if k < 256 {
        1
    } else if k < (1 << 16) {
        2
    } else {
        4
    }
}

fn bit_width(max_elem: u32) -> u32 {
    32 - max_elem.leading_zeros()
}

fn num_uints(num_elements: usize, num_bits: u32) -> usize {
    ((num_elements as u64 * u64::from(num_bits)).div_ceil(32)) as usize
}

fn num_tail_bytes_not_needed(num_elements: usize, num_bits: u32) -> usize {
    let num_bits_tail = (num_elements as u64 * u64::from(num_bits)) & 31;
    let num_bytes_tail = ((num_bits_tail + 7) >> 3) as usize;
    if num_bytes_tail > 0 {
        4 - num_bytes_tail
    } else {
        0
    }
}

fn count_field_width(bits67: u8) -> Result<usize> {
    match bits67 {
        0 => Ok(4),
        1 => Ok(2),
        2 => Ok(1),
        _ => Err(LercError::new(
            LercErrorCode::CorruptBitStuffing,
            "Bit stuffer header uses reserved count width.",
        )),
    }
}

fn read_uint(cursor: &mut ByteCursor<'_>, width: usize) -> Result<u32> {
    match width {
        1 => cursor.read_u8("bit stuffer count").map(u32::from),
        2 => cursor.read_u16_le("bit stuffer count").map(u32::from),
        _ => cursor.read_u32_le("bit stuffer count"),
    }
}

fn write_uint(out: &mut Vec<u8>, k: u32, width: usize) {
    match width {
        1 => out.push(k as u8),
        2 => out.extend_from_slice(&(k as u16).to_le_bytes()),
        _ => out.extend_from_slice(&k.to_le_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn read_all(bytes: &[u8], max_elements: usize) -> Result<(Vec<u32>, usize)> {
        let mut cursor = ByteCursor::new(bytes);
        let mut data = Vec::new();
        read(&mut cursor, &mut data, max_elements)?;
        Ok((data, cursor.position()))
    }

    #[test]
    fn packs_msb_first_into_little_endian_words() {
        let mut out = Vec::new();
        write(&[1, 2, 3], &mut out).expect("write");

        // 2 bits per value, 1-byte count, 6 data bits fit in one stored byte.
        assert_eq!(out, vec![0x82, 3, 0b0110_1100]);
        assert_eq!(compute_num_bytes_needed(3, 3), out.len());

        let (data, consumed) = read_all(&out, 3).expect("read");
        assert_eq!(data, vec![1, 2, 3]);
        assert_eq!(consumed, out.len());
    }

    #[test]
    fn values_straddle_word_boundaries() {
        let data: Vec<u32> = (0..37).map(|i| (i * 977) % 2000).collect();
        let mut out = Vec::new();
        write(&data, &mut out).expect("write");
        assert_eq!(compute_num_bytes_needed(37, 1999), out.len());

        out.extend_from_slice(&[0xEE; 5]);
        let (decoded, consumed) = read_all(&out, 64).expect("read");
        assert_eq!(decoded, data);
        assert_eq!(consumed, out.len() - 5);
    }

    #[test]
    fn all_zero_values_store_no_payload() {
        let mut out = Vec::new();
        write(&[0; 300], &mut out).expect("write");
        assert_eq!(out, vec![0x40, 0x2C, 0x01]);

        let (decoded, consumed) = read_all(&out, 300).expect("read");
        assert_eq!(decoded, vec![0; 300]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn count_field_width_follows_magnitude() {
        assert_eq!(num_bytes_uint(255), 1);
        assert_eq!(num_bytes_uint(256), 2);
        assert_eq!(num_bytes_uint(65_535), 2);
        assert_eq!(num_bytes_uint(65_536), 4);
        assert_eq!(compute_num_bytes_needed(70_000, 0), 1 + 4);
    }

    #[test]
    fn rejects_wide_bit_width() {
        let err = read_all(&[0x80 | 32, 1, 0, 0, 0, 0], 1).expect_err("32 bits");
        assert_eq!(err.code, LercErrorCode::CorruptBitStuffing);

        let mut out = Vec::new();
        let err = write(&[u32::MAX], &mut out).expect_err("too wide to write");
        assert_eq!(err.code, LercErrorCode::SizeLimitExceeded);
    }

    #[test]
    fn rejects_reserved_count_width() {
        let err = read_all(&[0xC1, 1, 0], 4).expect_err("bits67 = 3");
        assert_eq!(err.code, LercErrorCode::CorruptBitStuffing);
    }

    #[test]
    fn rejects_counts_beyond_limit() {
        let mut out = Vec::new();
        write(&[5; 10], &mut out).expect("write");
        let err = read_all(&out, 9).expect_err("too many elements");
        assert_eq!(err.code, LercErrorCode::CorruptBitStuffing);
    }

    #[test]
    fn truncated_payload_is_reported() {
        let mut out = Vec::new();
        write(&[7; 16], &mut out).expect("write");
        out.pop();
        let err = read_all(&out, 16).expect_err("truncated");
        assert_eq!(err.code, LercErrorCode::TruncatedInput);
    }

    proptest! {
        #[test]
        fn read_inverts_write(data in prop::collection::vec(0_u32..(1 << 31), 0..200)) {
            let mut out = Vec::new();
            write(&data, &mut out).expect("write");
            let max_elem = data.iter().copied().max().unwrap_or(0);
            prop_assert_eq!(out.len(), compute_num_bytes_needed(data.len() as u32, max_elem));

            let (decoded, consumed) = read_all(&out, data.len()).expect("read");
            prop_assert_eq!(decoded, data);
            prop_assert_eq!(consumed, out.len());
        }
    }
}
