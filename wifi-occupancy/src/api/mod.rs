//! Public API module.
//!
//! This module contains the high-level user-facing API for the `wifi-occupancy` crate.

pub mod backend;
pub mod config;
pub mod file_presence;
pub mod models;
pub mod netlink_presence;
pub mod presence;
