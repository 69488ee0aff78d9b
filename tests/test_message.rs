// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Tests for the wire codec: byte layout, validity scan, cursor accounting,
// flattening and structured records.

use svcd::proto::{scan, scan_code, TypeTag, WireMessage, WireRecord};
use svcd::{ScanError, WireError};

// ===========================================================================
// Layout
// ===========================================================================

#[test]
fn mixed_groups_in_write_order() {
    let mut m = WireMessage::new();
    m.put_int(-7).put_char(b'x').put_bool(true).put_double(2.5);
    m.put_str("hello").unwrap();
    assert_eq!(m.count(), 5);

    assert_eq!(m.get_int().unwrap(), -7);
    assert_eq!(m.get_char().unwrap(), b'x');
    assert!(m.get_bool().unwrap());
    assert_eq!(m.get_double().unwrap(), 2.5);
    assert_eq!(m.get_string().unwrap(), "hello");
    assert!(m.is_empty());
    assert_eq!(m.peek_next_type(), TypeTag::Undefined);
}

#[test]
fn array_layout_is_bit_exact() {
    let mut m = WireMessage::new();
    m.put_array(&[true, false, true]).unwrap();
    assert_eq!(m.as_bytes(), &[3, 0, 3, 0, 1, 1, 0, 1, 0, 0, 1, 1]);
    assert_eq!(m.get_array::<bool>().unwrap(), vec![true, false, true]);
}

#[test]
fn empty_array_is_one_group() {
    let mut m = WireMessage::new();
    m.put_array::<i32>(&[]).unwrap();
    assert_eq!(m.as_bytes(), &[1, 0, 0]);
    assert_eq!(m.count(), 1);
    assert_eq!(m.get_array::<i32>().unwrap(), Vec::<i32>::new());
}

#[test]
fn string_array_keeps_lengths() {
    let words = vec!["a".to_owned(), String::new(), "ccc".to_owned()];
    let mut m = WireMessage::new();
    m.put_array(&words).unwrap();
    assert_eq!(m.byte_count(), 3 + (2 + 1) + 2 + (2 + 3));
    assert_eq!(m.get_array::<String>().unwrap(), words);
}

#[test]
fn oversize_string_is_rejected() {
    let mut m = WireMessage::new();
    let big = "z".repeat(70_000);
    assert!(matches!(m.put_str(&big), Err(WireError::TooLarge { .. })));
    assert!(m.is_empty());
}

// ===========================================================================
// Validity scan
// ===========================================================================

#[test]
fn scan_counts_groups() {
    let mut m = WireMessage::new();
    m.put_int(1).put_int(2);
    m.put_str("x").unwrap();
    assert_eq!(scan(m.as_bytes()), Ok(3));
    assert_eq!(scan_code(m.as_bytes()), 3);
    assert_eq!(scan_code(&[]), 0);
}

#[test]
fn scan_bad_tag() {
    assert_eq!(scan_code(&[0, 0, 0]), -1);
    assert_eq!(scan_code(&[6, 0, 0]), -1);
    assert_eq!(scan(&[1, 0, 1, 0, 4, 1, 2, 3, 4, 9]), Err(ScanError::BadTag { offset: 9, tag: 9 }));
}

#[test]
fn scan_overrun() {
    // Declared length 4, only 3 payload bytes.
    assert_eq!(scan_code(&[1, 0, 1, 0, 4, 1, 2, 3]), -2);
    // Truncated count header.
    assert_eq!(scan_code(&[5, 0]), -2);
    // Count says two elements, only one present.
    assert_eq!(scan_code(&[3, 0, 2, 0, 1, 1]), -2);
}

#[test]
fn import_rejects_malformed() {
    let mut m = WireMessage::new();
    m.put_int(5);
    let err = m.import(&[7, 0, 0]).unwrap_err();
    assert!(matches!(err, WireError::Malformed(ScanError::BadTag { .. })));
    // Contents untouched by a failed import.
    assert_eq!(m.get_int().unwrap(), 5);
}

// ===========================================================================
// Import / export
// ===========================================================================

#[test]
fn export_round_trip_through_bytes() {
    let mut m = WireMessage::new();
    m.put_str("START").unwrap().put_str("web").unwrap();

    let mut dst = [0u8; 64];
    let n = m.export(&mut dst).unwrap();
    assert_eq!(n, m.byte_count());

    let mut back = WireMessage::from_bytes(&dst[..n]).unwrap();
    assert_eq!(back.get_string().unwrap(), "START");
    assert_eq!(back.get_string().unwrap(), "web");
}

#[test]
fn export_needs_room() {
    let mut m = WireMessage::new();
    m.put_double(1.0);
    let mut dst = [0u8; 4];
    assert!(matches!(
        m.export(&mut dst),
        Err(WireError::BufferTooSmall { needed: 13, available: 4 })
    ));
}

#[test]
fn export_only_unread_region() {
    let mut m = WireMessage::new();
    m.put_int(1).put_int(2);
    m.get_int().unwrap();
    let mut dst = [0u8; 32];
    assert_eq!(m.export(&mut dst).unwrap(), 9);
    assert_eq!(&dst[..9], &[1, 0, 1, 0, 4, 2, 0, 0, 0]);
}

// ===========================================================================
// Decode mismatches
// ===========================================================================

#[test]
fn scalar_get_requires_single_element() {
    let mut m = WireMessage::new();
    m.put_array(&[1i32, 2]).unwrap();
    assert!(matches!(m.get_int(), Err(WireError::CountMismatch(2))));
    assert_eq!(m.get_array::<i32>().unwrap(), vec![1, 2]);
}

#[test]
fn wrong_fixed_width_is_rejected() {
    // An Int group whose element declares 2 bytes.
    let mut m = WireMessage::from_bytes(&[1, 0, 1, 0, 2, 9, 9]).unwrap();
    assert!(matches!(
        m.get_int(),
        Err(WireError::LengthMismatch { tag: TypeTag::Int, len: 2, expected: 4 })
    ));
}

#[test]
fn invalid_utf8_is_rejected() {
    let mut m = WireMessage::from_bytes(&[5, 0, 1, 0, 2, 0xff, 0xfe]).unwrap();
    assert!(matches!(m.get_string(), Err(WireError::InvalidUtf8)));
}

#[test]
fn exhausted_message() {
    let mut m = WireMessage::new();
    assert!(matches!(m.get_bool(), Err(WireError::Exhausted)));
}

#[test]
fn nonzero_bool_bytes_decode_true() {
    let mut m = WireMessage::from_bytes(&[3, 0, 1, 0, 1, 7]).unwrap();
    assert!(m.get_bool().unwrap());
}

// ===========================================================================
// Flattening and records
// ===========================================================================

#[test]
fn flattening_appends_unread_groups() {
    let mut inner = WireMessage::new();
    inner.put_int(1).put_int(2);
    inner.get_int().unwrap();

    let mut outer = WireMessage::new();
    outer.put_bool(true).put_message(&inner).put_int(3);
    // Bool group (6 bytes) + the one unread Int group + the trailing Int.
    assert_eq!(outer.byte_count(), 6 + 9 + 9);
    assert_eq!(outer.count(), 3);
    assert!(outer.get_bool().unwrap());
    assert_eq!(outer.get_int().unwrap(), 2);
    assert_eq!(outer.get_int().unwrap(), 3);
}

#[derive(Debug, PartialEq)]
struct Point {
    label: String,
    x: i32,
    y: i32,
}

impl WireRecord for Point {
    fn write_to(&self, msg: &mut WireMessage) -> Result<(), WireError> {
        msg.put_str(&self.label)?.put_int(self.x).put_int(self.y);
        Ok(())
    }

    fn read_from(msg: &mut WireMessage) -> Result<Self, WireError> {
        Ok(Self {
            label: msg.get_string()?,
            x: msg.get_int()?,
            y: msg.get_int()?,
        })
    }
}

#[test]
fn records_are_flat_groups() {
    let a = Point { label: "a".into(), x: 1, y: -1 };
    let b = Point { label: "b".into(), x: 2, y: -2 };
    let mut m = WireMessage::new();
    m.put_bool(true).put_record(&a).unwrap().put_record(&b).unwrap();
    assert_eq!(m.count(), 7);

    assert!(m.get_bool().unwrap());
    assert_eq!(m.get_record::<Point>().unwrap(), a);
    assert_eq!(m.get_record::<Point>().unwrap(), b);
    assert!(m.is_empty());
}

#[test]
fn describe_lists_every_value() {
    let mut m = WireMessage::new();
    m.put_bool(false).put_str("config file not found").unwrap();
    assert_eq!(m.describe(), "false\nconfig file not found\n");
    // Non-destructive.
    assert_eq!(m.count(), 2);
}
