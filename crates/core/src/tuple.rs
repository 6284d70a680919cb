//! Encoding of the tuple marker stored on xmax documents.
//!
//! A marker identifies a superseded row version together with the command that
//! superseded it. It is the concatenation of four unsigned [Base-128 varints],
//! in the order `block`, `offset`, `xid`, `cmin`.
//!
//! Unsigned integers are split into 7-bit chunks, with the least significant
//! chunk first. Each chunk is placed in the low 7 bits of a byte; non-terminal
//! bytes have the high bit set.
//!
//! [Base-128 varints]: https://protobuf.dev/programming-guides/encoding/#varints

use base64::Engine as _;
use trackwrite_primitives::{CommandId, RowLocation, TxId};

use crate::error::TupleDecodeError;

/// Smallest possible encoding: four single-byte varints.
pub const MIN_ENCODED_LEN: usize = 4;

/// Largest possible encoding: `u32` varints take up to 5 bytes, `u64` up to 10.
pub const MAX_ENCODED_LEN: usize = 5 + 5 + 10 + 5;

/// The decoded contents of a [`TupleMarker`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TupleFields {
    pub location: RowLocation,
    pub xid: TxId,
    pub cmin: CommandId,
}

/// An encoded tuple marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleMarker(Vec<u8>);

impl TupleMarker {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The marker as stored in a JSON document.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }

    pub fn decode(&self) -> Result<TupleFields, TupleDecodeError> {
        decode_tuple(&self.0)
    }
}

impl From<TupleFields> for TupleMarker {
    fn from(fields: TupleFields) -> Self {
        encode_tuple(fields.xid, fields.cmin, fields.location)
    }
}

/// Encode the marker for the row version at `location`, superseded by command
/// `cmin` of transaction `xid`.
pub fn encode_tuple(xid: TxId, cmin: CommandId, location: RowLocation) -> TupleMarker {
    let mut buf = Vec::with_capacity(MAX_ENCODED_LEN);
    encode_varint(location.block.into(), &mut buf);
    encode_varint(location.offset.into(), &mut buf);
    encode_varint(xid.get(), &mut buf);
    encode_varint(cmin.get().into(), &mut buf);
    TupleMarker(buf)
}

/// Decode a marker produced by [`encode_tuple`].
///
/// The whole input must be consumed.
pub fn decode_tuple(mut bytes: &[u8]) -> Result<TupleFields, TupleDecodeError> {
    let buf = &mut bytes;
    let block = decode_u32(buf, "block")?;
    let offset = decode_u32(buf, "offset")?;
    let xid = decode_varint(buf, "xid")?;
    let cmin = decode_u32(buf, "cmin")?;
    if !buf.is_empty() {
        return Err(TupleDecodeError::TrailingBytes(buf.len()));
    }
    Ok(TupleFields {
        location: RowLocation::new(block, offset),
        xid: TxId(xid),
        cmin: CommandId(cmin),
    })
}

/// Decode a base64 encoded marker, as found in an xmax document.
pub fn decode_tuple_base64(encoded: &str) -> Result<TupleFields, TupleDecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    decode_tuple(&bytes)
}

#[inline]
fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            out.push(value as u8);
            break;
        } else {
            out.push(((value & 0x7f) | 0x80) as u8);
            value >>= 7;
        }
    }
}

#[inline]
fn decode_varint(buf: &mut &[u8], field: &'static str) -> Result<u64, TupleDecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let (&byte, rest) = buf.split_first().ok_or(TupleDecodeError::Truncated { field })?;
        *buf = rest;
        let chunk = u64::from(byte & 0x7f);
        // The tenth byte of a u64 may only carry the single remaining bit.
        if (shift == 63 && chunk > 1) || shift > 63 {
            return Err(TupleDecodeError::Overflow { field });
        }
        result |= chunk << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

fn decode_u32(buf: &mut &[u8], field: &'static str) -> Result<u32, TupleDecodeError> {
    decode_varint(buf, field)?
        .try_into()
        .map_err(|_| TupleDecodeError::Overflow { field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(xid: u64, cmin: u32, block: u32, offset: u32) -> TupleMarker {
        encode_tuple(TxId(xid), CommandId(cmin), RowLocation::new(block, offset))
    }

    #[test]
    fn small_values_take_one_byte_each() {
        let marker = encode(200, 2, 5, 3);
        assert_eq!(marker.as_bytes(), &[5, 3, 0xc8, 0x01, 2]);
        assert_eq!(encode(0, 0, 0, 0).as_bytes().len(), MIN_ENCODED_LEN);
    }

    #[test]
    fn maximum_values_fit_the_bound() {
        let marker = encode(u64::MAX, u32::MAX, u32::MAX, u32::MAX);
        assert_eq!(marker.as_bytes().len(), MAX_ENCODED_LEN);
        let fields = marker.decode().unwrap();
        assert_eq!(fields.xid, TxId(u64::MAX));
        assert_eq!(fields.cmin, CommandId(u32::MAX));
        assert_eq!(fields.location, RowLocation::new(u32::MAX, u32::MAX));
    }

    #[test]
    fn typical_row_store_values_fit_eighteen_bytes() {
        let marker = encode(u64::from(u32::MAX), (1 << 14) - 1, (1 << 28) - 1, (1 << 28) - 1);
        assert!(marker.as_bytes().len() <= 18);
    }

    #[test]
    fn rejects_truncated_input() {
        let marker = encode(300, 1, 1, 1);
        let bytes = marker.as_bytes();
        assert_eq!(
            decode_tuple(&bytes[..bytes.len() - 1]),
            Err(TupleDecodeError::Truncated { field: "cmin" })
        );
        assert_eq!(decode_tuple(&[]), Err(TupleDecodeError::Truncated { field: "block" }));
        // A dangling continuation bit.
        assert_eq!(decode_tuple(&[0x80]), Err(TupleDecodeError::Truncated { field: "block" }));
    }

    #[test]
    fn rejects_oversized_fields_and_trailing_bytes() {
        // 2^32 does not fit a block number.
        assert_eq!(
            decode_tuple(&[0x80, 0x80, 0x80, 0x80, 0x10, 0, 0, 0]),
            Err(TupleDecodeError::Overflow { field: "block" })
        );
        let mut bytes = encode(1, 1, 1, 1).as_bytes().to_vec();
        bytes.push(7);
        assert_eq!(decode_tuple(&bytes), Err(TupleDecodeError::TrailingBytes(1)));
    }

    #[test]
    fn base64_roundtrip() {
        let marker = encode(200, 2, 5, 3);
        let fields = decode_tuple_base64(&marker.to_base64()).unwrap();
        assert_eq!(TupleMarker::from(fields), marker);
    }

    proptest! {
        #[test]
        fn tuple_roundtrip(xid in any::<u64>(), cmin in any::<u32>(), block in any::<u32>(), offset in any::<u32>()) {
            let marker = encode(xid, cmin, block, offset);
            prop_assert!(marker.as_bytes().len() >= MIN_ENCODED_LEN);
            prop_assert!(marker.as_bytes().len() <= MAX_ENCODED_LEN);
            prop_assert_eq!(marker.clone(), encode(xid, cmin, block, offset));
            let fields = marker.decode().unwrap();
            prop_assert_eq!(fields.xid, TxId(xid));
            prop_assert_eq!(fields.cmin, CommandId(cmin));
            prop_assert_eq!(fields.location, RowLocation::new(block, offset));
        }
    }
}
