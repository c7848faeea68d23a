use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

use crate::types::constants::nl80211::MAC_LEN;

/// A 48-bit hardware (MAC) address identifying a wireless station.
///
/// Rendered in canonical lower-case, colon-separated form
/// (`aa:bb:cc:dd:ee:ff`), which is also the form used for set membership.
///
/// # Examples
///
/// ```rust
/// use wifi_occupancy::MacAddress;
///
/// let mac: MacAddress = "AA-BB-CC-DD-EE-FF".parse().unwrap();
/// assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
/// assert_eq!(mac.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; MAC_LEN]);

impl MacAddress {
    /// Creates an address from its six octets.
    pub const fn new(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }

    /// Returns the raw octets.
    pub const fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }
}

impl From<[u8; MAC_LEN]> for MacAddress {
    fn from(octets: [u8; MAC_LEN]) -> Self {
        Self(octets)
    }
}

impl TryFrom<&[u8]> for MacAddress {
    type Error = PresenceError;

    /// Converts a raw `NL80211_ATTR_MAC` payload.
    ///
    /// Anything other than exactly six bytes is a protocol violation.
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let octets: [u8; MAC_LEN] = bytes.try_into().map_err(|_| {
            PresenceError::ProtocolViolation(format!(
                "hardware address is {} bytes, expected {MAC_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Self(octets))
    }
}

impl FromStr for MacAddress {
    type Err = PresenceError;

    /// Parses `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PresenceError::InvalidAddress(s.to_string());
        let trimmed = s.trim();
        let separator = if trimmed.contains('-') { '-' } else { ':' };

        let mut octets = [0u8; MAC_LEN];
        let mut parts = trimmed.split(separator);
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An asynchronous association change reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StationEvent {
    /// A station associated (`NL80211_CMD_NEW_STATION`).
    Added(MacAddress),
    /// A station disassociated (`NL80211_CMD_DEL_STATION`).
    Removed(MacAddress),
}

impl StationEvent {
    /// Returns the station the event refers to.
    pub fn address(&self) -> MacAddress {
        match self {
            Self::Added(mac) | Self::Removed(mac) => *mac,
        }
    }
}

impl Display for StationEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added(mac) => write!(f, "{mac} is connected"),
            Self::Removed(mac) => write!(f, "{mac} is disconnected"),
        }
    }
}

/// Rule deciding whether the watched addresses count as "occupied".
///
/// # Variants
///
/// - [`All`](OccupancyPolicy::All) - every watched address must be associated.
///   An empty watch list is vacuously occupied.
/// - [`Any`](OccupancyPolicy::Any) - at least one watched address must be
///   associated. An empty watch list is never occupied.
///
/// The kernel source defaults to `All`, the file source to `Any`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyPolicy {
    /// Occupied iff the current stations are a superset of the watched ones.
    #[default]
    All,
    /// Occupied iff any watched station is currently associated.
    Any,
}

impl Display for OccupancyPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Errors that can occur while tracking station presence.
///
/// Startup failures (`Connection`, `FamilyUnavailable`, `GroupUnavailable`
/// and any enumeration error) are returned from `watch`. Once monitoring is
/// running, receive and poll failures are logged and absorbed.
#[derive(Debug, Error)]
pub enum PresenceError {
    /// The generic netlink control socket could not be opened.
    #[error("cannot open netlink socket: {0}")]
    Connection(#[source] std::io::Error),

    /// The wireless-control family is not registered (module not loaded).
    #[error("generic netlink family {0:?} is not available")]
    FamilyUnavailable(String),

    /// The family does not advertise the requested multicast group.
    #[error("multicast group {0:?} is not available")]
    GroupUnavailable(String),

    /// A well-formed message is missing data or carries data of the wrong shape.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// An attribute stream could not be decoded.
    #[error("malformed attributes: {0}")]
    MalformedAttributes(String),

    /// A netlink message stream could not be decoded.
    #[error("malformed netlink message: {0}")]
    MalformedMessage(String),

    /// Reading notifications from the socket failed.
    #[error("failed to receive from netlink socket: {0}")]
    TransientReceive(#[source] std::io::Error),

    /// The kernel answered a request with an error code.
    #[error("kernel rejected command {command}: {source}")]
    Kernel {
        /// Generic netlink command that was rejected.
        command: u8,
        /// Errno reported by the kernel.
        #[source]
        source: std::io::Error,
    },

    /// A socket or file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A hardware address string could not be parsed.
    #[error("invalid hardware address: {0:?}")]
    InvalidAddress(String),

    /// The presence file watcher could not be set up.
    #[error("file watch failed: {0}")]
    Watch(String),

    /// The consumer dropped the occupancy receiver before startup completed.
    #[error("occupancy channel closed")]
    ChannelClosed,

    /// `watch` was called on a source that is already running or shut down.
    #[error("presence source is already watching")]
    AlreadyWatching,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_is_canonical() {
        let mac = MacAddress::new([0x00, 0x1a, 0x2B, 0xff, 0x0c, 0x9d]);
        assert_eq!(mac.to_string(), "00:1a:2b:ff:0c:9d");
    }

    #[test]
    fn test_mac_parse_separators_and_case() {
        let expected = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!("aa:bb:cc:dd:ee:ff".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("AA:BB:CC:DD:EE:FF".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("aa-bb-cc-dd-ee-ff".parse::<MacAddress>().unwrap(), expected);
        assert_eq!(" aa:bb:cc:dd:ee:ff\n".parse::<MacAddress>().unwrap(), expected);
    }

    #[test]
    fn test_mac_parse_rejects_garbage() {
        for input in [
            "",
            "aa:bb:cc:dd:ee",
            "aa:bb:cc:dd:ee:ff:00",
            "aa:bb:cc:dd:ee:fg",
            "aabb:cc:dd:ee:ff",
            "a:bb:cc:dd:ee:ff",
            "aa:bb-cc:dd:ee:ff",
        ] {
            assert!(
                matches!(
                    input.parse::<MacAddress>(),
                    Err(PresenceError::InvalidAddress(_))
                ),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_mac_from_attribute_bytes() {
        let mac = MacAddress::try_from(&[1u8, 2, 3, 4, 5, 6][..]).unwrap();
        assert_eq!(mac.octets(), [1, 2, 3, 4, 5, 6]);

        let short = MacAddress::try_from(&[1u8, 2, 3][..]);
        assert!(matches!(short, Err(PresenceError::ProtocolViolation(_))));
    }

    #[test]
    fn test_station_event_address() {
        let mac = MacAddress::new([0, 1, 2, 3, 4, 5]);
        assert_eq!(StationEvent::Added(mac).address(), mac);
        assert_eq!(StationEvent::Removed(mac).address(), mac);
        assert_eq!(
            StationEvent::Removed(mac).to_string(),
            "00:01:02:03:04:05 is disconnected"
        );
    }

    #[test]
    fn test_policy_default_is_all() {
        assert_eq!(OccupancyPolicy::default(), OccupancyPolicy::All);
        assert_eq!(OccupancyPolicy::Any.to_string(), "any");
    }
}
