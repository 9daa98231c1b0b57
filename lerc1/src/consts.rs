pub const TYPE_STRING: &[u8; 10] = b"CntZImage ";
pub const CURRENT_VERSION: i32 = 11;
pub const MIN_SUPPORTED_VERSION: i32 = 11;
pub const CNT_Z_TYPE_CODE: i32 = 8;
pub const MAX_DIMENSION: i32 = 20_000;

/// Type string, version, type, height, width (i32 each) and max error (f64).
pub const HEADER_LENGTH: usize = TYPE_STRING.len() + 4 * 4 + 8;

/// numTilesVert, numTilesHori, numBytes (i32 each) and maxValInPlane (f32).
pub(crate) const PLANE_HEADER_LENGTH: usize = 3 * 4 + 4;

/// Header, both plane headers and one tile flag byte: the smallest blob a
/// full decode can accept.
pub const MIN_BLOB_LENGTH: usize = HEADER_LENGTH + 2 * PLANE_HEADER_LENGTH + 1;

pub(crate) const FLAG_MODE_MASK: u8 = 63;

pub(crate) const CNT_FLAG_RAW: u8 = 0;
pub(crate) const CNT_FLAG_ZERO: u8 = 2;
pub(crate) const CNT_FLAG_MINUS_ONE: u8 = 3;
pub(crate) const CNT_FLAG_PLUS_ONE: u8 = 4;

pub(crate) const Z_MODE_RAW: u8 = 0;
pub(crate) const Z_MODE_ZERO: u8 = 2;
pub(crate) const Z_MODE_CONST: u8 = 3;
