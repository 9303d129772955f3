//! EBML primitives: variable-length integers and element framing.
//!
//! An element is `id + size + payload`. Sizes are variable-length integers
//! where the count of leading zero bits in the first byte gives the number of
//! extra bytes that follow. Writers here only produce sizes of 1 to 4 bytes;
//! readers accept the full 1 to 8 byte range so that files from other muxers
//! (which like 8-byte sizes) can be walked.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ContainerStructureError, EncodingOverflowError};

pub mod ids;
pub mod reader;

/// Widest size field [`encode_var_int`] will produce.
pub const MAX_VAR_INT_WIDTH: usize = 4;

/// Widest variable-length integer the format allows.
pub const MAX_DECODE_WIDTH: usize = 8;

/// Reserved "unknown size" marker, used for a Segment whose length is not
/// known when its header is written.
pub const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// A decoded variable-length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt {
    pub value: u64,
    /// Number of bytes the integer occupied in the stream.
    pub length: usize,
}

impl VarInt {
    /// All data bits set is the reserved "unknown size" value.
    pub fn is_unknown(&self) -> bool {
        self.value == all_ones(self.length)
    }
}

fn all_ones(width: usize) -> u64 {
    (1u64 << (7 * width)) - 1
}

/// Largest value that fits in `width` bytes. The all-ones pattern is reserved.
pub fn max_value_for_width(width: usize) -> u64 {
    all_ones(width) - 1
}

/// Encodes `value` in the smallest width between 1 and 4 bytes.
pub fn encode_var_int(value: u64) -> Result<Vec<u8>, EncodingOverflowError> {
    let width = (1..=MAX_VAR_INT_WIDTH)
        .find(|&width| value <= max_value_for_width(width))
        .ok_or(EncodingOverflowError {
            value,
            width: MAX_VAR_INT_WIDTH,
        })?;

    encode_var_int_with_width(value, width)
}

/// Encodes `value` in exactly `width` bytes.
///
/// Used when an existing size field is rewritten and should keep its width,
/// so `width` may go up to 8 here.
pub fn encode_var_int_with_width(
    value: u64,
    width: usize,
) -> Result<Vec<u8>, EncodingOverflowError> {
    if !(1..=MAX_DECODE_WIDTH).contains(&width) || value > max_value_for_width(width) {
        return Err(EncodingOverflowError { value, width });
    }

    let marked = value | (1u64 << (7 * width));
    Ok(marked.to_be_bytes()[8 - width..].to_vec())
}

/// Decodes the variable-length integer starting at `bytes[offset]`, with the
/// length marker bit removed.
pub fn decode_var_int(bytes: &[u8], offset: usize) -> Result<VarInt, ContainerStructureError> {
    let first = *bytes
        .get(offset)
        .ok_or(ContainerStructureError::Truncated { offset })?;

    if first == 0 {
        return Err(ContainerStructureError::InvalidVarInt { offset });
    }

    let length = first.leading_zeros() as usize + 1;
    let rest = bytes
        .get(offset + 1..offset + length)
        .ok_or(ContainerStructureError::Truncated { offset })?;

    let mask = 0xFFu8.checked_shr(length as u32).unwrap_or(0);
    let value = rest
        .iter()
        .fold(u64::from(first & mask), |acc, byte| (acc << 8) | u64::from(*byte));

    Ok(VarInt { value, length })
}

/// Appends `id + size + payload` to `buf`.
pub fn put_element(
    buf: &mut BytesMut,
    id: &[u8],
    payload: &[u8],
) -> Result<(), EncodingOverflowError> {
    let size = encode_var_int(payload.len() as u64)?;
    buf.reserve(id.len() + size.len() + payload.len());
    buf.put_slice(id);
    buf.put_slice(&size);
    buf.put_slice(payload);
    Ok(())
}

/// Frames `payload` as a single element.
pub fn encode_element(id: &[u8], payload: &[u8]) -> Result<Bytes, EncodingOverflowError> {
    let mut buf = BytesMut::new();
    put_element(&mut buf, id, payload)?;
    Ok(buf.freeze())
}

/// Big-endian unsigned integer with leading zero bytes dropped (at least one
/// byte is kept).
pub fn uint_payload(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = (value.leading_zeros() as usize / 8).min(7);
    bytes[skip..].to_vec()
}

pub fn put_uint(buf: &mut BytesMut, id: &[u8], value: u64) -> Result<(), EncodingOverflowError> {
    put_element(buf, id, &uint_payload(value))
}

pub fn put_float(buf: &mut BytesMut, id: &[u8], value: f64) -> Result<(), EncodingOverflowError> {
    put_element(buf, id, &value.to_be_bytes())
}

pub fn put_string(buf: &mut BytesMut, id: &[u8], value: &str) -> Result<(), EncodingOverflowError> {
    put_element(buf, id, value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_int_widths() {
        assert_eq!(encode_var_int(0).unwrap(), [0x80]);
        assert_eq!(encode_var_int(126).unwrap(), [0xFE]);
        assert_eq!(encode_var_int(127).unwrap(), [0x40, 0x7F]);
        assert_eq!(encode_var_int(0x3FFE).unwrap(), [0x7F, 0xFE]);
        assert_eq!(encode_var_int(0x3FFF).unwrap(), [0x20, 0x3F, 0xFF]);
        assert_eq!(encode_var_int(0x1F_FFFE).unwrap(), [0x3F, 0xFF, 0xFE]);
        assert_eq!(encode_var_int(0x1F_FFFF).unwrap(), [0x10, 0x1F, 0xFF, 0xFF]);
        assert_eq!(
            encode_var_int(0x0FFF_FFFE).unwrap(),
            [0x1F, 0xFF, 0xFF, 0xFE]
        );
    }

    #[test]
    fn var_int_overflow_is_reported() {
        let err = encode_var_int(0x0FFF_FFFF).unwrap_err();
        assert_eq!(
            err,
            EncodingOverflowError {
                value: 0x0FFF_FFFF,
                width: 4
            }
        );
        assert!(encode_var_int_with_width(200, 1).is_err());
        assert!(encode_var_int_with_width(1, 0).is_err());
        assert!(encode_var_int_with_width(1, 9).is_err());
    }

    #[test]
    fn fixed_width_encoding_keeps_width() {
        assert_eq!(encode_var_int_with_width(2, 2).unwrap(), [0x40, 0x02]);
        assert_eq!(
            encode_var_int_with_width(5, 8).unwrap(),
            [0x01, 0, 0, 0, 0, 0, 0, 0x05]
        );
    }

    #[test]
    fn decode_reads_marker_length() {
        assert_eq!(
            decode_var_int(&[0x82], 0).unwrap(),
            VarInt { value: 2, length: 1 }
        );
        assert_eq!(
            decode_var_int(&[0x00, 0x40, 0x02], 1).unwrap(),
            VarInt { value: 2, length: 2 }
        );
        assert_eq!(
            decode_var_int(&[0x10, 0x00, 0x00, 0x02], 0).unwrap(),
            VarInt { value: 2, length: 4 }
        );

        let unknown = decode_var_int(&UNKNOWN_SIZE, 0).unwrap();
        assert_eq!(unknown.length, 8);
        assert!(unknown.is_unknown());
        assert!(!decode_var_int(&[0xFE], 0).unwrap().is_unknown());
        assert!(decode_var_int(&[0xFF], 0).unwrap().is_unknown());
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert_eq!(
            decode_var_int(&[0x00, 0x81], 0),
            Err(ContainerStructureError::InvalidVarInt { offset: 0 })
        );
        assert_eq!(
            decode_var_int(&[0x40], 0),
            Err(ContainerStructureError::Truncated { offset: 0 })
        );
        assert_eq!(
            decode_var_int(&[], 0),
            Err(ContainerStructureError::Truncated { offset: 0 })
        );
    }

    #[test]
    fn element_framing() {
        let element = encode_element(&ids::DURATION, &[1, 2, 3]).unwrap();
        assert_eq!(&element[..], &[0x44, 0x89, 0x83, 1, 2, 3]);

        let empty = encode_element(&ids::VOID, &[]).unwrap();
        assert_eq!(&empty[..], &[0xEC, 0x80]);
    }

    #[test]
    fn uint_payload_is_minimal() {
        assert_eq!(uint_payload(0), [0]);
        assert_eq!(uint_payload(1), [1]);
        assert_eq!(uint_payload(0x100), [1, 0]);
        assert_eq!(uint_payload(1_000_000), [0x0F, 0x42, 0x40]);
        assert_eq!(uint_payload(u64::MAX), [0xFF; 8]);
    }
}
