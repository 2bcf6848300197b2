//! Tag-based binary codec for the remote input wire format.
//!
//! Every value on the wire is preceded by a one-byte type tag.  Dictionaries
//! and arrays have no length prefix; each scope is closed by an explicit
//! end marker (tag 0).  Strings are NUL-terminated rather than length-prefixed.
//!
//! ```text
//! root       = 0x01 entry* 0x00
//! entry      = tag name NUL payload           (named value inside a dictionary)
//! element    = tag payload                    (unnamed value inside an array)
//! dictionary = entry* 0x00                    (payload of tag 0x02)
//! array      = element* 0x00                  (payload of tag 0x06)
//! ```
//!
//! | Tag | Type        | Payload                                   |
//! |-----|-------------|-------------------------------------------|
//! | 0   | End marker  | none                                      |
//! | 1   | Root dict   | entries, terminated by 0                  |
//! | 2   | Dictionary  | entries, terminated by 0                  |
//! | 3   | Integer     | 4 bytes, big-endian, signed               |
//! | 4   | Boolean     | 1 byte (0 or non-zero)                    |
//! | 5   | String      | UTF-8 bytes + one NUL                     |
//! | 6   | Array       | self-tagged elements, terminated by 0     |
//! | 7   | Binary      | 4-byte big-endian length + raw bytes      |
//! | 8   | Byte        | 1 byte                                    |
//! | 9   | Number      | IEEE-754 double, 8 bytes, big-endian      |
//!
//! # Two layers (for beginners)
//!
//! The codec is split in two:
//!
//! - A generic **value tree** ([`Value`]) that knows nothing about packets.
//!   [`encode_root`] and [`decode_root`] turn a list of named values into
//!   bytes and back.  This layer is where all the byte-level rules live.
//!
//! - A **typed mapping** in [`crate::protocol::packet`] that converts a
//!   [`Packet`] to and from the value tree.  Unknown field names are parsed by
//!   the first layer (so the cursor stays aligned) and then simply ignored by
//!   the second, which is what gives the protocol forward compatibility.

use thiserror::Error;

use crate::protocol::packet::Packet;

/// Type tag bytes.  These values are fixed by the remote server and must
/// never change.
pub mod tag {
    pub const END: u8 = 0;
    pub const ROOT: u8 = 1;
    pub const DICTIONARY: u8 = 2;
    pub const INTEGER: u8 = 3;
    pub const BOOLEAN: u8 = 4;
    pub const STRING: u8 = 5;
    pub const ARRAY: u8 = 6;
    pub const BINARY: u8 = 7;
    pub const BYTE: u8 = 8;
    pub const NUMBER: u8 = 9;
}

/// Maximum nesting of dictionaries and arrays accepted by the decoder.
///
/// Real packets nest four or five levels deep.  The limit keeps a corrupt or
/// hostile stream from exhausting the stack through unbounded recursion.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Errors that can occur during packet encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The input ended in the middle of a value.
    #[error("truncated input: need {needed} more byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// A tag byte that is not in the tag table, or not valid at this position.
    #[error("unknown or misplaced type tag 0x{tag:02X} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    /// A string ran to the end of the buffer without a NUL terminator.
    #[error("string at offset {offset} has no NUL terminator")]
    UnterminatedString { offset: usize },

    /// The bytes of a string are not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// An outbound string contains a NUL byte and cannot be terminated safely.
    #[error("string contains an embedded NUL byte: {0:?}")]
    EmbeddedNul(String),

    /// The first byte of a packet is not the root dictionary tag.
    #[error("expected root dictionary tag 0x01, found 0x{0:02X}")]
    MissingRoot(u8),

    /// Bytes remain after the root dictionary was closed.
    #[error("{0} trailing byte(s) after the root dictionary")]
    TrailingBytes(usize),

    /// Dictionaries and arrays are nested deeper than [`MAX_NESTING_DEPTH`].
    #[error("nesting deeper than {MAX_NESTING_DEPTH} levels")]
    NestingTooDeep,

    /// A binary blob is too large for the 32-bit length field.
    #[error("binary value of {0} bytes exceeds the 32-bit length field")]
    BinaryTooLarge(usize),

    /// A known field carries a value of the wrong type.
    #[error("field {field:?} has unexpected type tag 0x{tag:02X}")]
    FieldType { field: String, tag: u8 },

    /// A field required by a nested structure is absent.
    #[error("missing required field {0:?}")]
    MissingField(&'static str),
}

// ── Value tree ────────────────────────────────────────────────────────────────

/// A decoded wire value.
///
/// Dictionaries keep their entries in wire order; names are not required to
/// be unique (the typed layer lets the last occurrence win).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Dictionary(Vec<(String, Value)>),
    Array(Vec<Value>),
    Integer(i32),
    Boolean(bool),
    String(String),
    Binary(Vec<u8>),
    Byte(u8),
    Number(f64),
}

impl Value {
    /// Returns the type tag this value is written with.
    pub fn tag(&self) -> u8 {
        match self {
            Value::Dictionary(_) => tag::DICTIONARY,
            Value::Array(_) => tag::ARRAY,
            Value::Integer(_) => tag::INTEGER,
            Value::Boolean(_) => tag::BOOLEAN,
            Value::String(_) => tag::STRING,
            Value::Binary(_) => tag::BINARY,
            Value::Byte(_) => tag::BYTE,
            Value::Number(_) => tag::NUMBER,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Packet`] into its wire form (without the frame header).
///
/// # Errors
///
/// Returns [`ProtocolError::EmbeddedNul`] if any string contains a NUL byte
/// and [`ProtocolError::BinaryTooLarge`] for blobs above 4 GiB.
///
/// # Examples
///
/// ```rust
/// use remote_core::protocol::codec::{decode_packet, encode_packet};
/// use remote_core::protocol::packet::Packet;
///
/// let packet = Packet::keep_alive();
/// let bytes = encode_packet(&packet).unwrap();
/// assert_eq!(decode_packet(&bytes).unwrap(), packet);
/// ```
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    encode_root(&packet.to_entries())
}

/// Decodes one [`Packet`] from a complete frame payload.
///
/// The whole slice must be consumed; trailing bytes are an error.
///
/// # Errors
///
/// Returns [`ProtocolError`] for truncated input, unknown tags, malformed
/// strings, or known fields with the wrong type.
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, ProtocolError> {
    let entries = decode_root(bytes)?;
    Packet::from_entries(entries)
}

/// Writes a root dictionary containing `entries`.
///
/// # Errors
///
/// See [`encode_packet`].
pub fn encode_root(entries: &[(String, Value)]) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::with_capacity(64);
    buf.push(tag::ROOT);
    write_entries(&mut buf, entries)?;
    Ok(buf)
}

/// Reads a root dictionary and returns its entries in wire order.
///
/// # Errors
///
/// See [`decode_packet`].
pub fn decode_root(bytes: &[u8]) -> Result<Vec<(String, Value)>, ProtocolError> {
    let mut reader = Reader::new(bytes);
    let first = reader.byte()?;
    if first != tag::ROOT {
        return Err(ProtocolError::MissingRoot(first));
    }
    let entries = reader.entries(1)?;
    let remaining = reader.remaining();
    if remaining != 0 {
        return Err(ProtocolError::TrailingBytes(remaining));
    }
    Ok(entries)
}

// ── Encoding ──────────────────────────────────────────────────────────────────

fn write_entries(buf: &mut Vec<u8>, entries: &[(String, Value)]) -> Result<(), ProtocolError> {
    for (name, value) in entries {
        buf.push(value.tag());
        write_cstr(buf, name)?;
        write_payload(buf, value)?;
    }
    buf.push(tag::END);
    Ok(())
}

fn write_payload(buf: &mut Vec<u8>, value: &Value) -> Result<(), ProtocolError> {
    match value {
        Value::Dictionary(entries) => write_entries(buf, entries)?,
        Value::Array(items) => {
            for item in items {
                buf.push(item.tag());
                write_payload(buf, item)?;
            }
            buf.push(tag::END);
        }
        Value::Integer(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Boolean(b) => buf.push(u8::from(*b)),
        Value::String(s) => write_cstr(buf, s)?,
        Value::Binary(data) => {
            let len =
                u32::try_from(data.len()).map_err(|_| ProtocolError::BinaryTooLarge(data.len()))?;
            buf.extend_from_slice(&len.to_be_bytes());
            buf.extend_from_slice(data);
        }
        Value::Byte(b) => buf.push(*b),
        Value::Number(n) => buf.extend_from_slice(&n.to_be_bytes()),
    }
    Ok(())
}

/// Writes UTF-8 bytes followed by a single NUL terminator.
fn write_cstr(buf: &mut Vec<u8>, s: &str) -> Result<(), ProtocolError> {
    if s.as_bytes().contains(&0) {
        return Err(ProtocolError::EmbeddedNul(s.to_string()));
    }
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    Ok(())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

/// Cursor over an input buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Scans for the NUL terminator instead of trusting any length field.
    fn cstr(&mut self) -> Result<String, ProtocolError> {
        let start = self.pos;
        let rest = &self.buf[start..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::UnterminatedString { offset: start })?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|_| ProtocolError::InvalidUtf8 { offset: start })?
            .to_string();
        self.pos = start + nul + 1;
        Ok(s)
    }

    /// Reads named entries up to and including the closing end marker.
    fn entries(&mut self, depth: usize) -> Result<Vec<(String, Value)>, ProtocolError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ProtocolError::NestingTooDeep);
        }
        let mut entries = Vec::new();
        loop {
            let tag_offset = self.pos;
            let tag = self.byte()?;
            if tag == tag::END {
                return Ok(entries);
            }
            let name = self.cstr()?;
            let value = self.payload(tag, tag_offset, depth)?;
            entries.push((name, value));
        }
    }

    fn payload(&mut self, tag: u8, tag_offset: usize, depth: usize) -> Result<Value, ProtocolError> {
        let value = match tag {
            tag::DICTIONARY => Value::Dictionary(self.entries(depth + 1)?),
            tag::ARRAY => {
                if depth + 1 > MAX_NESTING_DEPTH {
                    return Err(ProtocolError::NestingTooDeep);
                }
                let mut items = Vec::new();
                loop {
                    let item_offset = self.pos;
                    let item_tag = self.byte()?;
                    if item_tag == tag::END {
                        break;
                    }
                    items.push(self.payload(item_tag, item_offset, depth + 1)?);
                }
                Value::Array(items)
            }
            tag::INTEGER => Value::Integer(i32::from_be_bytes(self.array::<4>()?)),
            tag::BOOLEAN => Value::Boolean(self.byte()? != 0),
            tag::STRING => Value::String(self.cstr()?),
            tag::BINARY => {
                let len = u32::from_be_bytes(self.array::<4>()?) as usize;
                Value::Binary(self.take(len)?.to_vec())
            }
            tag::BYTE => Value::Byte(self.byte()?),
            tag::NUMBER => Value::Number(f64::from_be_bytes(self.array::<8>()?)),
            other => {
                return Err(ProtocolError::UnknownTag {
                    tag: other,
                    offset: tag_offset,
                })
            }
        };
        Ok(value)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, value: Value) -> (String, Value) {
        (name.to_string(), value)
    }

    #[test]
    fn test_encode_root_with_no_entries_is_root_tag_and_end_marker() {
        let bytes = encode_root(&[]).unwrap();
        assert_eq!(bytes, vec![tag::ROOT, tag::END]);
    }

    #[test]
    fn test_encode_integer_entry_is_big_endian() {
        // Arrange
        let entries = vec![entry("V", Value::Integer(0x0102_0304))];

        // Act
        let bytes = encode_root(&entries).unwrap();

        // Assert
        assert_eq!(
            bytes,
            vec![tag::ROOT, tag::INTEGER, b'V', 0, 0x01, 0x02, 0x03, 0x04, tag::END]
        );
    }

    #[test]
    fn test_encode_string_entry_is_nul_terminated_without_length_prefix() {
        let bytes = encode_root(&[entry("S", Value::String("ab".into()))]).unwrap();
        assert_eq!(
            bytes,
            vec![tag::ROOT, tag::STRING, b'S', 0, b'a', b'b', 0, tag::END]
        );
    }

    #[test]
    fn test_encode_binary_entry_has_four_byte_length() {
        let bytes = encode_root(&[entry("B", Value::Binary(vec![0xAA, 0xBB]))]).unwrap();
        assert_eq!(
            bytes,
            vec![tag::ROOT, tag::BINARY, b'B', 0, 0, 0, 0, 2, 0xAA, 0xBB, tag::END]
        );
    }

    #[test]
    fn test_encode_array_elements_are_tagged_but_unnamed() {
        let bytes = encode_root(&[entry(
            "A",
            Value::Array(vec![Value::Byte(7), Value::Boolean(true)]),
        )])
        .unwrap();
        assert_eq!(
            bytes,
            vec![
                tag::ROOT,
                tag::ARRAY,
                b'A',
                0,
                tag::BYTE,
                7,
                tag::BOOLEAN,
                1,
                tag::END,
                tag::END
            ]
        );
    }

    #[test]
    fn test_encode_rejects_embedded_nul_in_value() {
        let result = encode_root(&[entry("S", Value::String("a\0b".into()))]);
        assert_eq!(result, Err(ProtocolError::EmbeddedNul("a\0b".into())));
    }

    #[test]
    fn test_encode_rejects_embedded_nul_in_name() {
        let result = encode_root(&[entry("x\0", Value::Byte(1))]);
        assert!(matches!(result, Err(ProtocolError::EmbeddedNul(_))));
    }

    #[test]
    fn test_value_tree_round_trip_with_every_type() {
        // Arrange
        let entries = vec![
            entry("int", Value::Integer(-42)),
            entry("bool", Value::Boolean(false)),
            entry("str", Value::String("héllo".into())),
            entry("bin", Value::Binary(vec![0, 1, 2, 0])),
            entry("byte", Value::Byte(0xFF)),
            entry("num", Value::Number(-1.25)),
            entry(
                "dict",
                Value::Dictionary(vec![entry("inner", Value::Array(vec![Value::Integer(1)]))]),
            ),
        ];

        // Act
        let bytes = encode_root(&entries).unwrap();
        let decoded = decode_root(&bytes).unwrap();

        // Assert
        assert_eq!(decoded, entries);
    }

    #[test]
    fn test_decode_empty_input_is_truncated() {
        assert_eq!(
            decode_root(&[]),
            Err(ProtocolError::Truncated { offset: 0, needed: 1 })
        );
    }

    #[test]
    fn test_decode_requires_root_tag() {
        assert_eq!(
            decode_root(&[tag::DICTIONARY, tag::END]),
            Err(ProtocolError::MissingRoot(tag::DICTIONARY))
        );
    }

    #[test]
    fn test_decode_missing_end_marker_is_truncated() {
        let result = decode_root(&[tag::ROOT, tag::BYTE, b'X', 0, 5]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_decode_truncated_integer() {
        let result = decode_root(&[tag::ROOT, tag::INTEGER, b'X', 0, 0, 0]);
        assert_eq!(
            result,
            Err(ProtocolError::Truncated { offset: 4, needed: 2 })
        );
    }

    #[test]
    fn test_decode_unknown_tag_reports_offset() {
        let result = decode_root(&[tag::ROOT, 0x2A, b'X', 0, tag::END]);
        assert_eq!(result, Err(ProtocolError::UnknownTag { tag: 0x2A, offset: 1 }));
    }

    #[test]
    fn test_decode_nested_root_tag_is_rejected() {
        let result = decode_root(&[tag::ROOT, tag::ROOT, b'X', 0, tag::END, tag::END]);
        assert!(matches!(result, Err(ProtocolError::UnknownTag { tag: 1, .. })));
    }

    #[test]
    fn test_decode_unterminated_string() {
        let result = decode_root(&[tag::ROOT, tag::STRING, b'S', 0, b'a', b'b']);
        assert_eq!(result, Err(ProtocolError::UnterminatedString { offset: 4 }));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let result = decode_root(&[tag::ROOT, tag::STRING, b'S', 0, 0xFF, 0xFE, 0, tag::END]);
        assert_eq!(result, Err(ProtocolError::InvalidUtf8 { offset: 4 }));
    }

    #[test]
    fn test_decode_trailing_bytes_are_rejected() {
        let result = decode_root(&[tag::ROOT, tag::END, 0x00, 0x01]);
        assert_eq!(result, Err(ProtocolError::TrailingBytes(2)));
    }

    #[test]
    fn test_decode_binary_length_beyond_buffer_is_truncated() {
        let result = decode_root(&[tag::ROOT, tag::BINARY, b'B', 0, 0, 0, 0, 9, 1, 2]);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_decode_rejects_excessive_nesting() {
        // Arrange: root + 40 nested anonymous arrays
        let mut bytes = vec![tag::ROOT, tag::ARRAY, b'A', 0];
        bytes.extend(std::iter::repeat(tag::ARRAY).take(40));

        // Act
        let result = decode_root(&bytes);

        // Assert
        assert_eq!(result, Err(ProtocolError::NestingTooDeep));
    }

    #[test]
    fn test_number_is_encoded_as_big_endian_double() {
        let bytes = encode_root(&[entry("N", Value::Number(1.0))]).unwrap();
        assert_eq!(&bytes[4..12], &1.0f64.to_be_bytes());
    }
}
