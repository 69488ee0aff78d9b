// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Self-describing binary message: an ordered sequence of typed groups.
//
// Buffer:  [T][C] [L1][D1] [L2][D2] ...   (repeated per group)
//
//   T : type tag                        1 byte
//   C : element count                   2 bytes, big-endian
//   L : element length                  2 bytes, big-endian
//   D : element payload                 L bytes
//
// Fixed-width payloads (Int32, Float64) are little-endian.

use std::fmt::Write as _;

use crate::error::{ScanError, WireError};

/// Read offset past which consumed bytes are dropped from the front.
const COMPACT_THRESHOLD: usize = 256;

/// Largest element count per group and largest element length.
pub const MAX_FIELD: usize = u16::MAX as usize;

const HEADER_LEN: usize = 3;
const LEN_PREFIX: usize = 2;

// ---------------------------------------------------------------------------
// TypeTag
// ---------------------------------------------------------------------------

/// Group type tag as stored in the first byte of every group.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int = 0x01,
    Char = 0x02,
    Bool = 0x03,
    Double = 0x04,
    String = 0x05,
    /// No group available. Also the exclusive upper bound for valid tags.
    Undefined = 0x06,
}

impl TypeTag {
    /// Decode a valid tag; `Undefined` and out-of-range bytes yield `None`.
    pub fn from_byte(b: u8) -> Option<TypeTag> {
        match b {
            0x01 => Some(TypeTag::Int),
            0x02 => Some(TypeTag::Char),
            0x03 => Some(TypeTag::Bool),
            0x04 => Some(TypeTag::Double),
            0x05 => Some(TypeTag::String),
            _ => None,
        }
    }

    /// Element width for fixed-size types, `None` for strings.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            TypeTag::Int => Some(4),
            TypeTag::Char | TypeTag::Bool => Some(1),
            TypeTag::Double => Some(8),
            TypeTag::String | TypeTag::Undefined => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A value that can be stored as one element of a group.
pub trait Element: Sized {
    const TAG: TypeTag;

    /// Append the payload bytes (without the length prefix).
    fn encode(&self, out: &mut Vec<u8>);

    /// Payload length in bytes.
    fn encoded_len(&self) -> usize;

    /// Decode from a payload whose length has already been checked against
    /// the fixed width, if any.
    fn decode(data: &[u8]) -> Result<Self, WireError>;
}

impl Element for i32 {
    const TAG: TypeTag = TypeTag::Int;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn encoded_len(&self) -> usize {
        4
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(data);
        Ok(i32::from_le_bytes(b))
    }
}

impl Element for u8 {
    const TAG: TypeTag = TypeTag::Char;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }

    fn encoded_len(&self) -> usize {
        1
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        Ok(data[0])
    }
}

impl Element for bool {
    const TAG: TypeTag = TypeTag::Bool;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn encoded_len(&self) -> usize {
        1
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        Ok(data[0] != 0)
    }
}

impl Element for f64 {
    const TAG: TypeTag = TypeTag::Double;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn encoded_len(&self) -> usize {
        8
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(data);
        Ok(f64::from_le_bytes(b))
    }
}

impl Element for String {
    const TAG: TypeTag = TypeTag::String;

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn encoded_len(&self) -> usize {
        self.len()
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        String::from_utf8(data.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

// ---------------------------------------------------------------------------
// Validity scan
// ---------------------------------------------------------------------------

fn read_u16(buf: &[u8], at: usize) -> Option<usize> {
    let hi = *buf.get(at)?;
    let lo = *buf.get(at + 1)?;
    Some(((hi as usize) << 8) | lo as usize)
}

/// Walk `buf` group by group without decoding any payload.
///
/// Returns the number of whole groups, or the first structural error found.
/// A truncated count or length header counts as an overrun.
pub fn scan(buf: &[u8]) -> Result<usize, ScanError> {
    let mut groups = 0;
    let mut i = 0;
    while i < buf.len() {
        let start = i;
        let tag = buf[i];
        if TypeTag::from_byte(tag).is_none() {
            return Err(ScanError::BadTag { offset: start, tag });
        }
        let count = read_u16(buf, i + 1).ok_or(ScanError::Overrun { offset: start })?;
        i += HEADER_LEN;
        for _ in 0..count {
            let len = read_u16(buf, i).ok_or(ScanError::Overrun { offset: start })?;
            i += LEN_PREFIX + len;
            if i > buf.len() {
                return Err(ScanError::Overrun { offset: start });
            }
        }
        groups += 1;
    }
    Ok(groups)
}

/// Same as [`scan`] but with the integer convention of the wire protocol:
/// group count on success, -1 for a bad tag, -2 for an overrun.
pub fn scan_code(buf: &[u8]) -> i32 {
    match scan(buf) {
        Ok(n) => n as i32,
        Err(e) => e.code(),
    }
}

// ---------------------------------------------------------------------------
// WireMessage
// ---------------------------------------------------------------------------

/// An encoded message with a write end and a read cursor.
///
/// Values come back out in the order they were appended. The unread region
/// `buf[rpos..]` always holds whole groups.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct WireMessage {
    buf: Vec<u8>,
    rpos: usize,
}

/// A structured value that writes its fields as consecutive groups.
pub trait WireRecord: Sized {
    fn write_to(&self, msg: &mut WireMessage) -> Result<(), WireError>;
    fn read_from(msg: &mut WireMessage) -> Result<Self, WireError>;
}

impl WireMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a message from a received buffer after validating it.
    pub fn from_bytes(data: &[u8]) -> Result<Self, WireError> {
        let mut m = Self::new();
        m.import(data)?;
        Ok(m)
    }

    /// Replace the contents with `data`. The buffer must pass [`scan`].
    pub fn import(&mut self, data: &[u8]) -> Result<(), WireError> {
        scan(data)?;
        self.buf.clear();
        self.buf.extend_from_slice(data);
        self.rpos = 0;
        Ok(())
    }

    /// Copy the unread bytes into `dst`, returning the number written.
    pub fn export(&self, dst: &mut [u8]) -> Result<usize, WireError> {
        let src = self.as_bytes();
        if dst.len() < src.len() {
            return Err(WireError::BufferTooSmall {
                needed: src.len(),
                available: dst.len(),
            });
        }
        dst[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }

    /// The unread encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.rpos..]
    }

    /// Number of unread bytes.
    pub fn byte_count(&self) -> usize {
        self.buf.len() - self.rpos
    }

    pub fn is_empty(&self) -> bool {
        self.byte_count() == 0
    }

    /// Whole groups remaining in the unread region.
    pub fn count(&self) -> usize {
        scan(self.as_bytes()).unwrap_or(0)
    }

    /// Tag of the next unread group, or [`TypeTag::Undefined`].
    pub fn peek_next_type(&self) -> TypeTag {
        if self.count() == 0 {
            return TypeTag::Undefined;
        }
        TypeTag::from_byte(self.buf[self.rpos]).unwrap_or(TypeTag::Undefined)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.rpos = 0;
    }

    // --- append ---

    fn put_header(&mut self, tag: TypeTag, count: usize) -> Result<(), WireError> {
        if count > MAX_FIELD {
            return Err(WireError::TooLarge {
                what: "element count",
                len: count,
            });
        }
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&(count as u16).to_be_bytes());
        Ok(())
    }

    fn put_payload(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(data);
    }

    fn put_element<T: Element>(&mut self, value: &T) {
        self.buf
            .extend_from_slice(&(value.encoded_len() as u16).to_be_bytes());
        value.encode(&mut self.buf);
    }

    /// Append a single value as a one-element group.
    pub fn put<T: Element>(&mut self, value: T) -> Result<&mut Self, WireError> {
        self.put_array(std::slice::from_ref(&value))
    }

    /// Append a homogeneous array as one group.
    pub fn put_array<T: Element>(&mut self, values: &[T]) -> Result<&mut Self, WireError> {
        if let Some(v) = values.iter().find(|v| v.encoded_len() > MAX_FIELD) {
            return Err(WireError::TooLarge {
                what: "element length",
                len: v.encoded_len(),
            });
        }
        self.put_header(T::TAG, values.len())?;
        for v in values {
            self.put_element(v);
        }
        Ok(self)
    }

    pub fn put_int(&mut self, v: i32) -> &mut Self {
        self.put_fixed(TypeTag::Int, &v.to_le_bytes())
    }

    pub fn put_char(&mut self, v: u8) -> &mut Self {
        self.put_fixed(TypeTag::Char, &[v])
    }

    pub fn put_bool(&mut self, v: bool) -> &mut Self {
        self.put_fixed(TypeTag::Bool, &[u8::from(v)])
    }

    pub fn put_double(&mut self, v: f64) -> &mut Self {
        self.put_fixed(TypeTag::Double, &v.to_le_bytes())
    }

    fn put_fixed(&mut self, tag: TypeTag, data: &[u8]) -> &mut Self {
        self.buf.push(tag as u8);
        self.buf.extend_from_slice(&1u16.to_be_bytes());
        self.put_payload(data);
        self
    }

    /// Append a string as a one-element group.
    pub fn put_str(&mut self, s: &str) -> Result<&mut Self, WireError> {
        if s.len() > MAX_FIELD {
            return Err(WireError::TooLarge {
                what: "string length",
                len: s.len(),
            });
        }
        self.put_header(TypeTag::String, 1)?;
        self.put_payload(s.as_bytes());
        Ok(self)
    }

    /// Append the unread groups of `other` verbatim. No wrapping group is
    /// added, so the reader simply sees more groups.
    pub fn put_message(&mut self, other: &WireMessage) -> &mut Self {
        self.buf.extend_from_slice(other.as_bytes());
        self
    }

    /// Append a structured record field by field.
    pub fn put_record<R: WireRecord>(&mut self, record: &R) -> Result<&mut Self, WireError> {
        record.write_to(self)?;
        Ok(self)
    }

    // --- consume ---

    /// Locate the next group of type `tag` and return its element ranges and
    /// end offset, without moving the cursor.
    fn next_group(
        &self,
        tag: TypeTag,
    ) -> Result<(Vec<std::ops::Range<usize>>, usize), WireError> {
        let unread = self.as_bytes();
        if unread.is_empty() {
            return Err(WireError::Exhausted);
        }
        let found = TypeTag::from_byte(unread[0]).ok_or(ScanError::BadTag {
            offset: self.rpos,
            tag: unread[0],
        })?;
        if found != tag {
            return Err(WireError::TypeMismatch {
                expected: tag,
                found,
            });
        }
        let overrun = ScanError::Overrun { offset: self.rpos };
        let count = read_u16(unread, 1).ok_or(overrun)?;
        let mut ranges = Vec::with_capacity(count);
        let mut i = HEADER_LEN;
        for _ in 0..count {
            let len = read_u16(unread, i).ok_or(overrun)?;
            if let Some(expected) = tag.fixed_width() {
                if len != expected {
                    return Err(WireError::LengthMismatch { tag, len, expected });
                }
            }
            let start = i + LEN_PREFIX;
            i = start + len;
            if i > unread.len() {
                return Err(overrun.into());
            }
            ranges.push(self.rpos + start..self.rpos + i);
        }
        Ok((ranges, self.rpos + i))
    }

    fn advance_to(&mut self, end: usize) {
        self.rpos = end;
        if self.rpos == self.buf.len() {
            self.clear();
        } else if self.rpos > COMPACT_THRESHOLD {
            self.buf.drain(..self.rpos);
            self.rpos = 0;
        }
    }

    /// Consume a one-element group of type `T`.
    ///
    /// On error the cursor is left where it was.
    pub fn get<T: Element>(&mut self) -> Result<T, WireError> {
        let (ranges, end) = self.next_group(T::TAG)?;
        if ranges.len() != 1 {
            return Err(WireError::CountMismatch(ranges.len()));
        }
        let value = T::decode(&self.buf[ranges[0].clone()])?;
        self.advance_to(end);
        Ok(value)
    }

    /// Consume a group of type `T` of any length.
    pub fn get_array<T: Element>(&mut self) -> Result<Vec<T>, WireError> {
        let (ranges, end) = self.next_group(T::TAG)?;
        let values = ranges
            .into_iter()
            .map(|r| T::decode(&self.buf[r]))
            .collect::<Result<Vec<T>, _>>()?;
        self.advance_to(end);
        Ok(values)
    }

    pub fn get_int(&mut self) -> Result<i32, WireError> {
        self.get()
    }

    pub fn get_char(&mut self) -> Result<u8, WireError> {
        self.get()
    }

    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        self.get()
    }

    pub fn get_double(&mut self) -> Result<f64, WireError> {
        self.get()
    }

    pub fn get_string(&mut self) -> Result<String, WireError> {
        self.get()
    }

    /// Consume a structured record in the order it was written.
    pub fn get_record<R: WireRecord>(&mut self) -> Result<R, WireError> {
        R::read_from(self)
    }

    // --- diagnostics ---

    /// Human-readable dump of every unread group, one value per line.
    pub fn describe(&self) -> String {
        let mut copy = self.clone();
        let mut out = String::new();
        while !copy.is_empty() {
            let res = match copy.peek_next_type() {
                TypeTag::Int => dump::<i32>(&mut copy, &mut out, |v| v.to_string()),
                TypeTag::Char => dump::<u8>(&mut copy, &mut out, |v| format!("'{}'", *v as char)),
                TypeTag::Bool => dump::<bool>(&mut copy, &mut out, |v| v.to_string()),
                TypeTag::Double => dump::<f64>(&mut copy, &mut out, |v| v.to_string()),
                TypeTag::String => dump::<String>(&mut copy, &mut out, |v| v.clone()),
                TypeTag::Undefined => break,
            };
            if res.is_err() {
                out.push_str("<undecodable>\n");
                break;
            }
        }
        out
    }
}

fn dump<T: Element>(
    msg: &mut WireMessage,
    out: &mut String,
    show: impl Fn(&T) -> String,
) -> Result<(), WireError> {
    for v in msg.get_array::<T>()? {
        let _ = writeln!(out, "{}", show(&v));
    }
    Ok(())
}

impl std::fmt::Debug for WireMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireMessage")
            .field("groups", &self.count())
            .field("bytes", &self.byte_count())
            .finish()
    }
}

impl TryFrom<&[u8]> for WireMessage {
    type Error = WireError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_bounds() {
        assert_eq!(TypeTag::from_byte(0), None);
        assert_eq!(TypeTag::from_byte(1), Some(TypeTag::Int));
        assert_eq!(TypeTag::from_byte(5), Some(TypeTag::String));
        assert_eq!(TypeTag::from_byte(6), None);
    }

    #[test]
    fn put_int_layout() {
        let mut m = WireMessage::new();
        m.put_int(0x0102_0304);
        assert_eq!(m.as_bytes(), &[1, 0, 1, 0, 4, 4, 3, 2, 1]);
    }

    #[test]
    fn put_str_layout() {
        let mut m = WireMessage::new();
        m.put_str("ab").unwrap();
        assert_eq!(m.as_bytes(), &[5, 0, 1, 0, 2, b'a', b'b']);
    }

    #[test]
    fn cursor_resets_when_drained() {
        let mut m = WireMessage::new();
        m.put_int(1).put_int(2);
        m.get_int().unwrap();
        assert_eq!(m.rpos, 9);
        m.get_int().unwrap();
        assert_eq!(m.rpos, 0);
        assert!(m.buf.is_empty());
    }

    #[test]
    fn compaction_after_threshold() {
        let mut m = WireMessage::new();
        for i in 0..40 {
            m.put_int(i);
        }
        // 29 groups of 9 bytes = 261 bytes consumed, past the threshold.
        for i in 0..29 {
            assert_eq!(m.get_int().unwrap(), i);
        }
        assert_eq!(m.rpos, 0);
        assert_eq!(m.buf.len(), 11 * 9);
        assert_eq!(m.get_int().unwrap(), 29);
    }

    #[test]
    fn failed_get_keeps_cursor() {
        let mut m = WireMessage::new();
        m.put_bool(true);
        assert!(matches!(
            m.get_int(),
            Err(WireError::TypeMismatch { expected: TypeTag::Int, found: TypeTag::Bool })
        ));
        assert!(m.get_bool().unwrap());
    }
}
