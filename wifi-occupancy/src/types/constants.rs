//! Constants for the netlink, generic netlink and nl80211 wire protocols.
//!
//! These values correspond to the numeric codes defined by the kernel's
//! `netlink.h`, `genetlink.h` and `nl80211.h` UAPI headers.

/// Netlink message header constants.
pub mod netlink {
    /// Size of `struct nlmsghdr`.
    pub const HEADER_LEN: usize = 16;
    /// Message and attribute alignment.
    pub const ALIGN_TO: usize = 4;

    pub const NLMSG_NOOP: u16 = 1;
    pub const NLMSG_ERROR: u16 = 2;
    pub const NLMSG_DONE: u16 = 3;
    pub const NLMSG_OVERRUN: u16 = 4;
}

/// Netlink attribute (`struct nlattr`) constants.
pub mod attribute {
    pub const HEADER_LEN: usize = 4;
    pub const F_NESTED: u16 = 1 << 15;
    pub const F_NET_BYTEORDER: u16 = 1 << 14;
    /// Strips the nested / byte-order flag bits from an attribute type.
    pub const TYPE_MASK: u16 = !(F_NESTED | F_NET_BYTEORDER);
}

/// Generic netlink controller constants.
pub mod genl {
    /// Size of `struct genlmsghdr`.
    pub const HEADER_LEN: usize = 4;
    /// Fixed family id of the generic netlink controller.
    pub const ID_CTRL: u16 = 0x10;
    pub const CTRL_VERSION: u8 = 1;

    pub const CTRL_CMD_GETFAMILY: u8 = 3;

    pub const CTRL_ATTR_FAMILY_ID: u16 = 1;
    pub const CTRL_ATTR_FAMILY_NAME: u16 = 2;
    pub const CTRL_ATTR_VERSION: u16 = 3;
    pub const CTRL_ATTR_MCAST_GROUPS: u16 = 7;

    pub const CTRL_ATTR_MCAST_GRP_NAME: u16 = 1;
    pub const CTRL_ATTR_MCAST_GRP_ID: u16 = 2;
}

/// nl80211 family constants.
pub mod nl80211 {
    /// Name the wireless-control family registers under.
    pub const FAMILY_NAME: &str = "nl80211";
    /// Multicast group carrying station association events.
    pub const MLME_GROUP: &str = "mlme";

    pub const CMD_GET_INTERFACE: u8 = 5;
    pub const CMD_GET_STATION: u8 = 17;
    pub const CMD_NEW_STATION: u8 = 19;
    pub const CMD_DEL_STATION: u8 = 20;

    pub const ATTR_IFINDEX: u16 = 3;
    pub const ATTR_MAC: u16 = 6;

    /// Length of `NL80211_ATTR_MAC`.
    pub const MAC_LEN: usize = 6;
}

/// Timing constants for reconciliation and notification handling.
pub mod timeouts {
    use std::time::Duration;

    /// Interval between full station re-scans (5 seconds).
    ///
    /// Catches stations that were deauthenticated without a clean
    /// disassociation and never produced a `DEL_STATION` event.
    const POLL_INTERVAL_SECS: u64 = 5;

    /// Pause after a failed notification read before reading again.
    const RECEIVE_RETRY_MS: u64 = 500;

    /// Quiet period after a presence file write before re-evaluating.
    const FILE_DEBOUNCE_SECS: u64 = 1;

    /// Returns the default reconciliation interval.
    pub fn poll_interval() -> Duration {
        Duration::from_secs(POLL_INTERVAL_SECS)
    }

    /// Returns the delay applied after a failed notification read.
    pub fn receive_retry() -> Duration {
        Duration::from_millis(RECEIVE_RETRY_MS)
    }

    /// Returns the presence file debounce window.
    pub fn file_debounce() -> Duration {
        Duration::from_secs(FILE_DEBOUNCE_SECS)
    }
}

/// Output channel sizing.
pub mod channel {
    /// Default number of occupancy values buffered for the consumer.
    pub const DEFAULT_CAPACITY: usize = 16;
}
