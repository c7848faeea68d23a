//! Async generic netlink socket.
//!
//! Wraps a `netlink-sys` tokio socket bound to `NETLINK_GENERIC` and adds
//! request/response sequencing on top of it.

use log::{debug, trace};
use netlink_sys::{
    AsyncSocket, AsyncSocketExt, SocketAddr, TokioSocket, protocols::NETLINK_GENERIC,
};

use crate::api::models::PresenceError;
use crate::netlink::message::{Frame, GenlMessage, HeaderFlags, Payload, decode_frames};
use crate::Result;

/// A generic netlink socket bound to an automatically assigned port.
pub(crate) struct GenlSocket {
    socket: TokioSocket,
    port: u32,
    sequence: u32,
}

impl GenlSocket {
    /// Opens and binds a new socket.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn open() -> Result<Self> {
        let mut socket = TokioSocket::new(NETLINK_GENERIC).map_err(PresenceError::Connection)?;
        let local = socket
            .socket_mut()
            .bind_auto()
            .map_err(PresenceError::Connection)?;
        socket
            .socket_ref()
            .connect(&SocketAddr::new(0, 0))
            .map_err(PresenceError::Connection)?;

        debug!("Opened generic netlink socket on port {}", local.port_number());
        Ok(Self {
            socket,
            port: local.port_number(),
            sequence: 0,
        })
    }

    /// Subscribes the socket to a multicast group.
    pub(crate) fn join_group(&mut self, group: u32) -> Result<()> {
        self.socket.socket_mut().add_membership(group)?;
        Ok(())
    }

    /// Sends `request` to `family` and collects the replies.
    ///
    /// With [`HeaderFlags::DUMP`] set, reads until the kernel signals the end
    /// of the dump; otherwise returns after the first non-multipart reply or
    /// acknowledgement. Messages belonging to an earlier, abandoned request
    /// are discarded.
    pub(crate) async fn execute(
        &mut self,
        family: u16,
        flags: HeaderFlags,
        request: &GenlMessage,
    ) -> Result<Vec<GenlMessage>> {
        self.sequence = self.sequence.wrapping_add(1);
        let sequence = self.sequence;
        let dump = flags.contains(HeaderFlags::DUMP);

        let bytes = request.encode(family, flags | HeaderFlags::REQUEST, sequence, self.port);
        self.socket.send(&bytes).await?;

        let mut replies = Vec::new();
        loop {
            let (datagram, _) = self.socket.recv_from_full().await?;
            let frames = decode_frames(&datagram)?;
            if collect_replies(frames, sequence, dump, request.command, &mut replies)? {
                return Ok(replies);
            }
        }
    }

    /// Reads one datagram of unsolicited (multicast) messages.
    ///
    /// Socket failures are reported as [`PresenceError::TransientReceive`].
    pub(crate) async fn receive(&mut self) -> Result<Vec<Frame>> {
        let (datagram, _) = self
            .socket
            .recv_from_full()
            .await
            .map_err(PresenceError::TransientReceive)?;
        decode_frames(&datagram)
    }
}

/// Adds the replies to request `sequence` found in `frames` to `replies`.
///
/// Returns `Ok(true)` once the reply is complete: the end of a dump, an
/// acknowledgement, or the first non-multipart reply to a plain request.
/// Frames carrying another sequence number belong to an abandoned request
/// and are dropped. An error reply becomes [`PresenceError::Kernel`].
pub(crate) fn collect_replies(
    frames: Vec<Frame>,
    sequence: u32,
    dump: bool,
    command: u8,
    replies: &mut Vec<GenlMessage>,
) -> Result<bool> {
    for frame in frames {
        if frame.header.sequence != sequence {
            trace!(
                "Dropping stale message seq {} from port {}, want {sequence}",
                frame.header.sequence,
                frame.header.port
            );
            continue;
        }

        match frame.payload {
            Payload::Message(message) => {
                let multipart = frame.header.flags.contains(HeaderFlags::MULTI);
                replies.push(message);
                if !dump && !multipart {
                    return Ok(true);
                }
            }
            Payload::Done | Payload::Ack => return Ok(true),
            Payload::Error(errno) => return Err(Frame::kernel_error(command, errno)),
            Payload::Skip => {}
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::tests::frame;
    use crate::types::constants::netlink;

    const FAMILY: u16 = 0x1c;
    const GET_STATION: u8 = 17;

    fn frames(buf: &[u8]) -> Vec<Frame> {
        decode_frames(buf).unwrap()
    }

    fn reply(sequence: u32, flags: HeaderFlags, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![GET_STATION, 1, 0, 0];
        body.extend_from_slice(payload);
        frame(FAMILY, flags, sequence, &body)
    }

    #[test]
    fn test_dump_collects_until_done() {
        let mut buf = reply(7, HeaderFlags::MULTI, &[1]);
        buf.extend(reply(7, HeaderFlags::MULTI, &[2]));

        let mut replies = Vec::new();
        assert!(!collect_replies(frames(&buf), 7, true, GET_STATION, &mut replies).unwrap());
        assert_eq!(replies.len(), 2);

        let done = frame(netlink::NLMSG_DONE, HeaderFlags::MULTI, 7, &0i32.to_ne_bytes());
        assert!(collect_replies(frames(&done), 7, true, GET_STATION, &mut replies).unwrap());
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].payload, vec![2]);
    }

    #[test]
    fn test_stale_sequence_is_discarded() {
        let mut buf = reply(6, HeaderFlags::MULTI, &[0xde]);
        buf.extend(frame(netlink::NLMSG_DONE, HeaderFlags::MULTI, 6, &0i32.to_ne_bytes()));
        buf.extend(reply(7, HeaderFlags::MULTI, &[0xad]));

        let mut replies = Vec::new();
        assert!(!collect_replies(frames(&buf), 7, true, GET_STATION, &mut replies).unwrap());
        assert_eq!(replies, vec![GenlMessage::new(GET_STATION, 1, vec![0xad])]);
    }

    #[test]
    fn test_done_with_negative_status_is_kernel_error() {
        let buf = frame(netlink::NLMSG_DONE, HeaderFlags::MULTI, 3, &(-95i32).to_ne_bytes());

        let mut replies = Vec::new();
        let err = collect_replies(frames(&buf), 3, true, GET_STATION, &mut replies).unwrap_err();
        assert!(matches!(
            err,
            PresenceError::Kernel { command: GET_STATION, ref source }
                if source.raw_os_error() == Some(95)
        ));
    }

    #[test]
    fn test_error_reply_is_kernel_error() {
        let mut body = (-19i32).to_ne_bytes().to_vec();
        body.extend_from_slice(&[0; 16]);
        let buf = frame(netlink::NLMSG_ERROR, HeaderFlags::empty(), 4, &body);

        let mut replies = Vec::new();
        let err = collect_replies(frames(&buf), 4, false, GET_STATION, &mut replies).unwrap_err();
        assert!(matches!(
            err,
            PresenceError::Kernel { ref source, .. } if source.raw_os_error() == Some(19)
        ));
    }

    #[test]
    fn test_single_reply_completes_plain_request() {
        let mut buf = reply(2, HeaderFlags::empty(), &[1]);
        buf.extend(reply(2, HeaderFlags::empty(), &[2]));

        let mut replies = Vec::new();
        assert!(collect_replies(frames(&buf), 2, false, GET_STATION, &mut replies).unwrap());
        assert_eq!(replies.len(), 1);
    }

    #[test]
    fn test_ack_and_noop() {
        let mut buf = frame(netlink::NLMSG_NOOP, HeaderFlags::empty(), 5, &[]);
        buf.extend(frame(netlink::NLMSG_ERROR, HeaderFlags::empty(), 5, &0i32.to_ne_bytes()));

        let mut replies = Vec::new();
        assert!(collect_replies(frames(&buf), 5, false, GET_STATION, &mut replies).unwrap());
        assert!(replies.is_empty());
    }
}
