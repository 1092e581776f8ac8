//! Byte-slice utilities for bounds-oriented parsing.
//!
//! These helpers read little-endian primitives out of `&[u8]` at fixed offsets and return
//! `None` instead of panicking when the range is out of bounds. Callers map the `None` to
//! whatever error (or default) fits the structure they are parsing.
//!
//! Example (fixed-size record parsing):
//!
//! ```ignore
//! use crate::utils::bytes;
//!
//! let entries = bytes::read_u16_le(buf, eocd + 10)?;
//! let cd_offset = bytes::read_u32_le(buf, eocd + 16)?;
//! ```

use byteorder::{ByteOrder, LittleEndian};

/// Borrow `len` bytes at `offset`.
pub(crate) fn slice(buf: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    buf.get(offset..end)
}

/// Read `N` raw bytes at `offset`.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    slice(buf, offset, N)?.try_into().ok()
}

/// Read a 4-byte signature at `offset` (e.g. `PK\x03\x04`).
pub(crate) fn read_sig(buf: &[u8], offset: usize) -> Option<[u8; 4]> {
    read_array::<4>(buf, offset)
}

/// Read a `u16` (little-endian) at `offset`.
pub(crate) fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    slice(buf, offset, 2).map(LittleEndian::read_u16)
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    slice(buf, offset, 4).map(LittleEndian::read_u32)
}

/// Read an `i32` (little-endian) at `offset`.
pub(crate) fn read_i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    slice(buf, offset, 4).map(LittleEndian::read_i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reads_little_endian_fields() {
        let buf = [0x50, 0x4B, 0x05, 0x06, 0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(read_sig(&buf, 0), Some(*b"PK\x05\x06"));
        assert_eq!(read_u16_le(&buf, 0), Some(0x4B50));
        assert_eq!(read_u32_le(&buf, 0), Some(0x0605_4B50));
        assert_eq!(read_i32_le(&buf, 4), Some(-1));
    }

    #[test]
    fn test_out_of_bounds_reads_are_none() {
        let buf = [0u8; 6];
        assert_eq!(read_u32_le(&buf, 3), None);
        assert_eq!(read_u16_le(&buf, 5), None);
        assert_eq!(slice(&buf, usize::MAX, 2), None);
        assert_eq!(slice(&buf, 6, 0), Some(&[][..]));
    }
}
