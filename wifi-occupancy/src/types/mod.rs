//! Type definitions and constants.
//!
//! This module contains netlink and nl80211 protocol constants.

pub(crate) mod constants;
