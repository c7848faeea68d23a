//! Netlink attribute (TLV) encoding and decoding.
//!
//! Each attribute is a 4-byte header (`u16` length including the header,
//! `u16` type) followed by the value, padded to a 4-byte boundary. All
//! integers are in host byte order.

use std::collections::HashMap;

use crate::api::models::PresenceError;
use crate::types::constants::attribute::{HEADER_LEN, TYPE_MASK};
use crate::types::constants::netlink::ALIGN_TO;
use crate::Result;

/// Rounds `len` up to the netlink alignment boundary.
pub(crate) const fn align(len: usize) -> usize {
    (len + ALIGN_TO - 1) & !(ALIGN_TO - 1)
}

/// Attributes decoded from a buffer, keyed by type.
///
/// Duplicate types keep the last value seen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct AttributeMap<'a> {
    values: HashMap<u16, &'a [u8]>,
}

impl<'a> AttributeMap<'a> {
    /// Returns the raw value of attribute `kind`.
    pub(crate) fn get(&self, kind: u16) -> Option<&'a [u8]> {
        self.values.get(&kind).copied()
    }

    /// Returns the value of attribute `kind`, or a protocol violation naming `what`.
    pub(crate) fn require(&self, kind: u16, what: &str) -> Result<&'a [u8]> {
        self.get(kind)
            .ok_or_else(|| PresenceError::ProtocolViolation(format!("missing {what} attribute")))
    }

    pub(crate) fn u16(&self, kind: u16, what: &str) -> Result<u16> {
        let value = self.require(kind, what)?;
        value
            .get(..2)
            .and_then(|b| b.try_into().ok())
            .map(u16::from_ne_bytes)
            .ok_or_else(|| short_value(what, value.len(), 2))
    }

    pub(crate) fn u32(&self, kind: u16, what: &str) -> Result<u32> {
        let value = self.require(kind, what)?;
        value
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_ne_bytes)
            .ok_or_else(|| short_value(what, value.len(), 4))
    }

    /// Reads a NUL-terminated string attribute.
    pub(crate) fn string(&self, kind: u16, what: &str) -> Result<String> {
        let value = self.require(kind, what)?;
        let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
        std::str::from_utf8(&value[..end])
            .map(str::to_owned)
            .map_err(|e| PresenceError::ProtocolViolation(format!("{what} is not UTF-8: {e}")))
    }
}

fn short_value(what: &str, got: usize, want: usize) -> PresenceError {
    PresenceError::ProtocolViolation(format!("{what} attribute is {got} bytes, expected {want}"))
}

/// Splits an attribute stream into `(type, value)` pairs in wire order.
///
/// Fails with [`PresenceError::MalformedAttributes`] if a header is
/// truncated or an attribute claims more bytes than remain. Padding after
/// the final attribute may be omitted.
pub(crate) fn decode_attributes(buf: &[u8]) -> Result<Vec<(u16, &[u8])>> {
    let mut attrs = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let rest = &buf[offset..];
        if rest.len() < HEADER_LEN {
            return Err(PresenceError::MalformedAttributes(format!(
                "{} trailing bytes at offset {offset} are too short for an attribute header",
                rest.len()
            )));
        }

        let len = usize::from(u16::from_ne_bytes([rest[0], rest[1]]));
        let kind = u16::from_ne_bytes([rest[2], rest[3]]) & TYPE_MASK;

        if len < HEADER_LEN {
            return Err(PresenceError::MalformedAttributes(format!(
                "attribute {kind} at offset {offset} has invalid length {len}"
            )));
        }
        if len > rest.len() {
            return Err(PresenceError::MalformedAttributes(format!(
                "attribute {kind} at offset {offset} needs {len} bytes, {} available",
                rest.len()
            )));
        }

        attrs.push((kind, &rest[HEADER_LEN..len]));
        offset += align(len);
    }

    Ok(attrs)
}

/// Decodes an attribute stream into a map from type to value.
pub(crate) fn parse_attributes(buf: &[u8]) -> Result<AttributeMap<'_>> {
    let values = decode_attributes(buf)?.into_iter().collect();
    Ok(AttributeMap { values })
}

/// Builds an attribute stream for request payloads.
#[derive(Debug, Default)]
pub(crate) struct AttributeEncoder {
    buf: Vec<u8>,
}

impl AttributeEncoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a raw attribute, padding it to the alignment boundary.
    pub(crate) fn bytes(mut self, kind: u16, value: &[u8]) -> Self {
        let len = HEADER_LEN + value.len();
        // Attribute lengths are u16 on the wire; callers only encode short values.
        let wire_len = u16::try_from(len).unwrap_or(u16::MAX);
        self.buf.extend_from_slice(&wire_len.to_ne_bytes());
        self.buf.extend_from_slice(&kind.to_ne_bytes());
        self.buf.extend_from_slice(value);
        self.buf.resize(self.buf.len() + align(len) - len, 0);
        self
    }

    /// Appends a NUL-terminated string attribute.
    pub(crate) fn string(self, kind: u16, value: &str) -> Self {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.bytes(kind, &bytes)
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(kind: u16, value: &[u8]) -> Vec<u8> {
        AttributeEncoder::new().bytes(kind, value).finish()
    }

    #[test]
    fn test_align() {
        assert_eq!(align(0), 0);
        assert_eq!(align(1), 4);
        assert_eq!(align(4), 4);
        assert_eq!(align(10), 12);
    }

    #[test]
    fn test_encoder_pads_values() {
        let buf = attr(6, &[1, 2, 3, 4, 5, 6]);
        // 4 header + 6 value + 2 padding
        assert_eq!(buf.len(), 12);
        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 10);
        assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), 6);
        assert_eq!(&buf[10..], &[0, 0]);
    }

    #[test]
    fn test_parse_multiple_attributes() {
        let buf = AttributeEncoder::new()
            .bytes(3, &7u32.to_ne_bytes())
            .bytes(6, &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff])
            .string(4, "wlan0")
            .finish();

        assert_eq!(decode_attributes(&buf).unwrap().len(), 3);
        let attrs = parse_attributes(&buf).unwrap();
        assert_eq!(attrs.u32(3, "ifindex").unwrap(), 7);
        assert_eq!(
            attrs.get(6).unwrap(),
            &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff][..]
        );
        assert_eq!(attrs.string(4, "ifname").unwrap(), "wlan0");
    }

    #[test]
    fn test_duplicate_type_last_wins() {
        let buf = AttributeEncoder::new()
            .bytes(1, &10u32.to_ne_bytes())
            .bytes(1, &20u32.to_ne_bytes())
            .finish();
        assert_eq!(decode_attributes(&buf).unwrap().len(), 2);
        let attrs = parse_attributes(&buf).unwrap();
        assert_eq!(attrs.u32(1, "value").unwrap(), 20);
    }

    #[test]
    fn test_flag_bits_are_masked() {
        let mut buf = attr(7, &[0; 4]);
        buf[2..4].copy_from_slice(&(7u16 | 0x8000).to_ne_bytes());
        let attrs = parse_attributes(&buf).unwrap();
        assert!(attrs.get(7).is_some());
    }

    #[test]
    fn test_empty_buffer_is_empty_map() {
        assert!(decode_attributes(&[]).unwrap().is_empty());
        assert!(parse_attributes(&[]).unwrap().get(1).is_none());
    }

    #[test]
    fn test_missing_final_padding_is_accepted() {
        let mut buf = attr(6, &[1, 2, 3, 4, 5, 6]);
        buf.truncate(10);
        let attrs = parse_attributes(&buf).unwrap();
        assert_eq!(attrs.get(6).unwrap().len(), 6);
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let mut buf = attr(1, &[0; 4]);
        buf.extend_from_slice(&[8, 0]);
        assert!(matches!(
            parse_attributes(&buf),
            Err(PresenceError::MalformedAttributes(_))
        ));
    }

    #[test]
    fn test_length_past_end_is_malformed() {
        let mut buf = attr(1, &[0; 4]);
        buf[0..2].copy_from_slice(&64u16.to_ne_bytes());
        assert!(matches!(
            parse_attributes(&buf),
            Err(PresenceError::MalformedAttributes(_))
        ));
    }

    #[test]
    fn test_length_below_header_is_malformed() {
        let buf = [2u16.to_ne_bytes(), 1u16.to_ne_bytes()].concat();
        assert!(matches!(
            parse_attributes(&buf),
            Err(PresenceError::MalformedAttributes(_))
        ));
    }

    #[test]
    fn test_missing_attribute_is_protocol_violation() {
        let buf = attr(1, &[0; 4]);
        let attrs = parse_attributes(&buf).unwrap();
        assert!(matches!(
            attrs.require(6, "MAC"),
            Err(PresenceError::ProtocolViolation(_))
        ));
        assert!(matches!(
            attrs.u16(9, "absent"),
            Err(PresenceError::ProtocolViolation(_))
        ));
    }
}
