//! nl80211 station enumeration and station event subscription.
//!
//! Enumeration dumps every wireless interface (`GET_INTERFACE`) and, for each
//! one, every associated station (`GET_STATION`). Notifications arrive on the
//! family's `mlme` multicast group as `NEW_STATION` / `DEL_STATION`.

use log::{debug, info, warn};
use std::collections::HashSet;

use crate::api::models::{MacAddress, PresenceError, StationEvent};
use crate::netlink::attributes::parse_attributes;
use crate::netlink::family::{self, Family};
use crate::netlink::message::{Frame, GenlMessage, HeaderFlags, Payload};
use crate::netlink::socket::GenlSocket;
use crate::types::constants::nl80211;
use crate::Result;

/// Extracts the station hardware address from an nl80211 message payload.
///
/// A payload that cannot be decoded yields
/// [`PresenceError::MalformedAttributes`]; a decodable payload without a
/// usable `NL80211_ATTR_MAC` yields [`PresenceError::ProtocolViolation`].
pub(crate) fn station_address(payload: &[u8]) -> Result<MacAddress> {
    let attrs = parse_attributes(payload)?;
    MacAddress::try_from(attrs.require(nl80211::ATTR_MAC, "station MAC")?)
}

/// Maps a station notification to an event. Other commands yield `None`.
pub(crate) fn station_event(message: &GenlMessage) -> Result<Option<StationEvent>> {
    match message.command {
        nl80211::CMD_NEW_STATION => Ok(Some(StationEvent::Added(station_address(
            &message.payload,
        )?))),
        nl80211::CMD_DEL_STATION => Ok(Some(StationEvent::Removed(station_address(
            &message.payload,
        )?))),
        _ => Ok(None),
    }
}

/// A connection to the kernel's nl80211 family.
pub struct Nl80211 {
    socket: GenlSocket,
    family: Family,
}

impl Nl80211 {
    /// Opens a generic netlink socket and resolves the nl80211 family on it.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Connection`] if the socket cannot be opened and
    /// [`PresenceError::FamilyUnavailable`] if nl80211 is not registered.
    pub async fn connect() -> Result<Self> {
        let mut socket = GenlSocket::open()?;
        let family = family::resolve(&mut socket, nl80211::FAMILY_NAME).await?;
        info!(
            "{}: id {} version {}",
            family.name, family.id, family.version
        );
        Ok(Self { socket, family })
    }

    /// Enumerates the hardware addresses of all associated stations.
    ///
    /// Every wireless interface with a network device is queried in turn. A
    /// station record lacking a usable MAC attribute is logged and skipped;
    /// any I/O failure, kernel error or undecodable record aborts the whole
    /// enumeration.
    pub async fn stations(&mut self) -> Result<HashSet<MacAddress>> {
        let flags = HeaderFlags::REQUEST | HeaderFlags::DUMP;
        let request =
            GenlMessage::new(nl80211::CMD_GET_INTERFACE, self.family.version, Vec::new());
        let interfaces = self.socket.execute(self.family.id, flags, &request).await?;

        let mut stations = HashSet::new();
        for scope in interface_scopes(interfaces)? {
            let request = GenlMessage::new(nl80211::CMD_GET_STATION, self.family.version, scope);
            let replies = self.socket.execute(self.family.id, flags, &request).await?;
            collect_stations(replies, &mut stations)?;
        }

        debug!("Enumerated {} station(s)", stations.len());
        Ok(stations)
    }

    /// Joins the station mobility (`mlme`) group and turns this connection
    /// into a notification stream.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::GroupUnavailable`] if the family does not
    /// advertise the group.
    pub fn subscribe(mut self) -> Result<StationNotifications> {
        let group = self
            .family
            .group(nl80211::MLME_GROUP)
            .ok_or_else(|| PresenceError::GroupUnavailable(nl80211::MLME_GROUP.to_string()))?
            .id;
        self.socket.join_group(group)?;
        debug!("Joined {} multicast group {group}", nl80211::MLME_GROUP);

        Ok(StationNotifications {
            socket: self.socket,
            family_id: self.family.id,
        })
    }
}

/// Station association events received from the `mlme` multicast group.
pub struct StationNotifications {
    socket: GenlSocket,
    family_id: u16,
}

impl StationNotifications {
    /// Waits for the next datagram and returns the station events it carries.
    ///
    /// Messages for other families and other nl80211 commands are ignored, as
    /// are station notifications that cannot be decoded.
    pub async fn recv(&mut self) -> Result<Vec<StationEvent>> {
        let frames = self.socket.receive().await?;
        Ok(station_events(frames, self.family_id))
    }
}

/// Returns the attribute records of the interfaces that can host stations.
///
/// Wireless devices without a netdev (e.g. P2P-device) have no `IFINDEX`
/// and are left out. The record is later sent back as the scope of the
/// station dump.
pub(crate) fn interface_scopes(interfaces: Vec<GenlMessage>) -> Result<Vec<Vec<u8>>> {
    let mut scopes = Vec::with_capacity(interfaces.len());
    for interface in interfaces {
        if parse_attributes(&interface.payload)?
            .get(nl80211::ATTR_IFINDEX)
            .is_none()
        {
            debug!("Skipping wireless device without a network interface");
            continue;
        }
        scopes.push(interface.payload);
    }
    Ok(scopes)
}

/// Adds the station addresses in a `GET_STATION` dump to `stations`.
///
/// A record without a usable MAC is skipped. An undecodable record fails
/// the whole dump.
pub(crate) fn collect_stations(
    replies: Vec<GenlMessage>,
    stations: &mut HashSet<MacAddress>,
) -> Result<()> {
    for reply in replies {
        match station_address(&reply.payload) {
            Ok(mac) => {
                stations.insert(mac);
            }
            Err(PresenceError::ProtocolViolation(reason)) => {
                warn!("Skipping station record: {reason}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Extracts station events from one datagram of multicast frames.
///
/// Frames from other families, other nl80211 commands and notifications that
/// cannot be decoded are dropped; the rest of the datagram is still used.
pub(crate) fn station_events(frames: Vec<Frame>, family_id: u16) -> Vec<StationEvent> {
    let mut events = Vec::new();
    for frame in frames {
        let Payload::Message(message) = frame.payload else {
            continue;
        };
        if frame.header.kind != family_id {
            continue;
        }

        match station_event(&message) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => warn!("Ignoring station notification: {e}"),
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attributes::AttributeEncoder;
    use crate::netlink::message::decode_frames;
    use crate::netlink::message::tests::frame;

    const FAMILY: u16 = 0x1c;

    const MAC: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];

    fn station_payload(mac: &[u8]) -> Vec<u8> {
        AttributeEncoder::new()
            .bytes(nl80211::ATTR_IFINDEX, &4u32.to_ne_bytes())
            .bytes(nl80211::ATTR_MAC, mac)
            .finish()
    }

    #[test]
    fn test_station_address() {
        let mac = station_address(&station_payload(&MAC)).unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_station_address_missing_mac() {
        let payload = AttributeEncoder::new()
            .bytes(nl80211::ATTR_IFINDEX, &4u32.to_ne_bytes())
            .finish();
        assert!(matches!(
            station_address(&payload),
            Err(PresenceError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_station_address_wrong_length() {
        assert!(matches!(
            station_address(&station_payload(&MAC[..4])),
            Err(PresenceError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_station_address_malformed() {
        let mut payload = station_payload(&MAC);
        payload.truncate(6);
        assert!(matches!(
            station_address(&payload),
            Err(PresenceError::MalformedAttributes(_))
        ));
    }

    #[test]
    fn test_station_events() {
        let mac = MacAddress::new(MAC);

        let added = GenlMessage::new(nl80211::CMD_NEW_STATION, 1, station_payload(&MAC));
        assert_eq!(
            station_event(&added).unwrap(),
            Some(StationEvent::Added(mac))
        );

        let removed = GenlMessage::new(nl80211::CMD_DEL_STATION, 1, station_payload(&MAC));
        assert_eq!(
            station_event(&removed).unwrap(),
            Some(StationEvent::Removed(mac))
        );

        let other = GenlMessage::new(nl80211::CMD_GET_INTERFACE, 1, Vec::new());
        assert_eq!(station_event(&other).unwrap(), None);
    }

    fn interface_payload(ifindex: Option<u32>) -> Vec<u8> {
        let encoder = AttributeEncoder::new().bytes(1, &0u32.to_ne_bytes());
        let encoder = match ifindex {
            Some(index) => encoder.bytes(nl80211::ATTR_IFINDEX, &index.to_ne_bytes()),
            None => encoder,
        };
        encoder.finish()
    }

    fn notification(family: u16, command: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![command, 1, 0, 0];
        body.extend_from_slice(payload);
        frame(family, HeaderFlags::empty(), 0, &body)
    }

    #[test]
    fn test_interfaces_without_ifindex_are_skipped() {
        let interfaces = vec![
            GenlMessage::new(nl80211::CMD_GET_INTERFACE, 1, interface_payload(Some(3))),
            GenlMessage::new(nl80211::CMD_GET_INTERFACE, 1, interface_payload(None)),
            GenlMessage::new(nl80211::CMD_GET_INTERFACE, 1, interface_payload(Some(5))),
        ];

        let scopes = interface_scopes(interfaces).unwrap();
        assert_eq!(scopes, vec![interface_payload(Some(3)), interface_payload(Some(5))]);
    }

    #[test]
    fn test_malformed_interface_aborts() {
        let mut payload = interface_payload(Some(3));
        payload.truncate(10);
        let interfaces = vec![GenlMessage::new(nl80211::CMD_GET_INTERFACE, 1, payload)];
        assert!(matches!(
            interface_scopes(interfaces),
            Err(PresenceError::MalformedAttributes(_))
        ));
    }

    #[test]
    fn test_station_records_without_mac_are_skipped() {
        let other = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        let no_mac = AttributeEncoder::new()
            .bytes(nl80211::ATTR_IFINDEX, &4u32.to_ne_bytes())
            .finish();
        let replies = vec![
            GenlMessage::new(nl80211::CMD_NEW_STATION, 1, station_payload(&MAC)),
            GenlMessage::new(nl80211::CMD_NEW_STATION, 1, no_mac),
            GenlMessage::new(nl80211::CMD_NEW_STATION, 1, station_payload(&MAC[..3])),
            GenlMessage::new(nl80211::CMD_NEW_STATION, 1, station_payload(&other)),
            GenlMessage::new(nl80211::CMD_NEW_STATION, 1, station_payload(&MAC)),
        ];

        let mut stations = HashSet::new();
        collect_stations(replies, &mut stations).unwrap();
        assert_eq!(
            stations,
            HashSet::from([MacAddress::new(MAC), MacAddress::new(other)])
        );
    }

    #[test]
    fn test_malformed_station_record_aborts() {
        let mut truncated = station_payload(&MAC);
        truncated.truncate(6);
        let replies = vec![
            GenlMessage::new(nl80211::CMD_NEW_STATION, 1, station_payload(&MAC)),
            GenlMessage::new(nl80211::CMD_NEW_STATION, 1, truncated),
        ];

        let mut stations = HashSet::new();
        assert!(matches!(
            collect_stations(replies, &mut stations),
            Err(PresenceError::MalformedAttributes(_))
        ));
    }

    #[test]
    fn test_bad_notification_keeps_rest_of_datagram() {
        let other = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        let mut truncated = station_payload(&MAC);
        truncated.truncate(6);

        let mut buf = notification(FAMILY, nl80211::CMD_NEW_STATION, &station_payload(&MAC));
        buf.extend(notification(FAMILY, nl80211::CMD_NEW_STATION, &truncated));
        buf.extend(notification(FAMILY, nl80211::CMD_DEL_STATION, &station_payload(&other)));

        let events = station_events(decode_frames(&buf).unwrap(), FAMILY);
        assert_eq!(
            events,
            vec![
                StationEvent::Added(MacAddress::new(MAC)),
                StationEvent::Removed(MacAddress::new(other)),
            ]
        );
    }

    #[test]
    fn test_notifications_are_filtered() {
        let mut buf = notification(0x1d, nl80211::CMD_NEW_STATION, &station_payload(&MAC));
        buf.extend(notification(FAMILY, nl80211::CMD_GET_INTERFACE, &[]));
        buf.extend(frame(
            crate::types::constants::netlink::NLMSG_NOOP,
            HeaderFlags::empty(),
            0,
            &[],
        ));
        buf.extend(notification(FAMILY, nl80211::CMD_NEW_STATION, &station_payload(&[1; 2])));
        buf.extend(notification(FAMILY, nl80211::CMD_DEL_STATION, &station_payload(&MAC)));

        let events = station_events(decode_frames(&buf).unwrap(), FAMILY);
        assert_eq!(events, vec![StationEvent::Removed(MacAddress::new(MAC))]);
    }
}
