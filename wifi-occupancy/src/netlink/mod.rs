//! Generic netlink transport and the nl80211 wireless-control family.
//!
//! This module contains the low-level wire codec (headers and attributes),
//! the async socket, family resolution and the nl80211 station queries built
//! on top of them.

pub(crate) mod attributes;
pub(crate) mod family;
pub(crate) mod message;
pub(crate) mod nl80211;
pub(crate) mod socket;
