use crate::{LercError, LercErrorCode, Result};

/// Bounds-checked little-endian reader over a borrowed byte span.
///
/// Every read either consumes exactly the bytes it interprets or fails with
/// [`LercErrorCode::TruncatedInput`] and leaves the position unchanged.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                LercError::new(
                    LercErrorCode::TruncatedInput,
                    format!(
                        "Could not read {what}: need {len} bytes at offset {}, {} remaining.",
                        self.pos,
                        self.remaining()
                    ),
                )
            })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn skip(&mut self, len: usize, what: &str) -> Result<()> {
        self.take(len, what).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let bytes = self.take(N, what)?;
        let mut arr = [0_u8; N];
        arr.copy_from_slice(bytes);
        Ok(arr)
    }

    pub fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.read_array::<1>(what)?[0])
    }

    pub fn read_i8(&mut self, what: &str) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_u16_le(&mut self, what: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_i16_le(&mut self, what: &str) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_u32_le(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_i32_le(&mut self, what: &str) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_f32_le(&mut self, what: &str) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array(what)?))
    }

    pub fn read_f64_le(&mut self, what: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array(what)?))
    }
}
