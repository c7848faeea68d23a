//! Netlink and generic netlink message framing.
//!
//! A generic netlink message on the wire is a `nlmsghdr` (16 bytes) followed
//! by a `genlmsghdr` (4 bytes) and an attribute payload. A single datagram
//! may carry several messages, each aligned to 4 bytes.

use bitflags::bitflags;
use std::io;

use crate::api::models::PresenceError;
use crate::netlink::attributes::align;
use crate::types::constants::{genl, netlink};
use crate::Result;

bitflags! {
    /// `nlmsghdr.nlmsg_flags` bits used by this crate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub(crate) struct HeaderFlags: u16 {
        const REQUEST = 0x01;
        const MULTI = 0x02;
        const ACK = 0x04;
        const ROOT = 0x100;
        const MATCH = 0x200;
        const DUMP = Self::ROOT.bits() | Self::MATCH.bits();
    }
}

/// Decoded `nlmsghdr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NetlinkHeader {
    pub(crate) length: u32,
    pub(crate) kind: u16,
    pub(crate) flags: HeaderFlags,
    pub(crate) sequence: u32,
    pub(crate) port: u32,
}

impl NetlinkHeader {
    fn parse(buf: &[u8]) -> Option<Self> {
        let field = |at: usize| -> Option<[u8; 4]> { buf.get(at..at + 4)?.try_into().ok() };
        let half = |at: usize| -> Option<[u8; 2]> { buf.get(at..at + 2)?.try_into().ok() };
        Some(Self {
            length: u32::from_ne_bytes(field(0)?),
            kind: u16::from_ne_bytes(half(4)?),
            flags: HeaderFlags::from_bits_retain(u16::from_ne_bytes(half(6)?)),
            sequence: u32::from_ne_bytes(field(8)?),
            port: u32::from_ne_bytes(field(12)?),
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.length.to_ne_bytes());
        out.extend_from_slice(&self.kind.to_ne_bytes());
        out.extend_from_slice(&self.flags.bits().to_ne_bytes());
        out.extend_from_slice(&self.sequence.to_ne_bytes());
        out.extend_from_slice(&self.port.to_ne_bytes());
    }
}

/// A generic netlink message: command, family version and attribute payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenlMessage {
    /// Family-specific command number.
    pub command: u8,
    /// Family interface version.
    pub version: u8,
    /// Raw attribute stream following the generic netlink header.
    pub payload: Vec<u8>,
}

impl GenlMessage {
    /// Creates a message with the given command, version and payload.
    pub fn new(command: u8, version: u8, payload: Vec<u8>) -> Self {
        Self {
            command,
            version,
            payload,
        }
    }

    fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < genl::HEADER_LEN {
            return Err(PresenceError::MalformedMessage(format!(
                "generic netlink header needs {} bytes, got {}",
                genl::HEADER_LEN,
                body.len()
            )));
        }
        Ok(Self {
            command: body[0],
            version: body[1],
            payload: body[genl::HEADER_LEN..].to_vec(),
        })
    }

    /// Serializes the message as a request to `family`.
    pub(crate) fn encode(
        &self,
        family: u16,
        flags: HeaderFlags,
        sequence: u32,
        port: u32,
    ) -> Vec<u8> {
        let length = netlink::HEADER_LEN + genl::HEADER_LEN + self.payload.len();
        let header = NetlinkHeader {
            length: u32::try_from(length).unwrap_or(u32::MAX),
            kind: family,
            flags,
            sequence,
            port,
        };

        let mut out = Vec::with_capacity(align(length));
        header.write(&mut out);
        out.extend_from_slice(&[self.command, self.version, 0, 0]);
        out.extend_from_slice(&self.payload);
        out.resize(align(length), 0);
        out
    }
}

/// What a single netlink message in a datagram carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
    /// A family message.
    Message(GenlMessage),
    /// End of a multi-part dump.
    Done,
    /// Acknowledgement (`error == 0`).
    Ack,
    /// The kernel reported a failure; holds the positive errno.
    Error(i32),
    /// No-op or overrun notice; carries nothing useful.
    Skip,
}

/// A netlink message split into header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    pub(crate) header: NetlinkHeader,
    pub(crate) payload: Payload,
}

impl Frame {
    /// Converts an error payload into a [`PresenceError::Kernel`].
    pub(crate) fn kernel_error(command: u8, errno: i32) -> PresenceError {
        PresenceError::Kernel {
            command,
            source: io::Error::from_raw_os_error(errno),
        }
    }
}

fn read_status(body: &[u8]) -> Option<i32> {
    body.get(..4)?.try_into().ok().map(i32::from_ne_bytes)
}

/// Splits a received datagram into frames.
pub(crate) fn decode_frames(buf: &[u8]) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let rest = &buf[offset..];
        let header = NetlinkHeader::parse(rest).ok_or_else(|| {
            PresenceError::MalformedMessage(format!(
                "{} bytes at offset {offset} are too short for a netlink header",
                rest.len()
            ))
        })?;

        let length = header.length as usize;
        if length < netlink::HEADER_LEN || length > rest.len() {
            return Err(PresenceError::MalformedMessage(format!(
                "netlink message at offset {offset} claims {length} bytes, {} available",
                rest.len()
            )));
        }

        let body = &rest[netlink::HEADER_LEN..length];
        let payload = match header.kind {
            netlink::NLMSG_NOOP | netlink::NLMSG_OVERRUN => Payload::Skip,
            netlink::NLMSG_DONE => match read_status(body) {
                Some(code) if code < 0 => Payload::Error(-code),
                _ => Payload::Done,
            },
            netlink::NLMSG_ERROR => match read_status(body) {
                Some(0) => Payload::Ack,
                Some(code) => Payload::Error(code.saturating_abs()),
                None => {
                    return Err(PresenceError::MalformedMessage(
                        "error message without status".into(),
                    ));
                }
            },
            _ => Payload::Message(GenlMessage::parse(body)?),
        };

        frames.push(Frame { header, payload });
        offset += align(length);
    }

    Ok(frames)
}
