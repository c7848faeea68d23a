//! Occupancy detection from the wireless stations associated with a local
//! access point.
//!
//! This crate answers one question: are the devices I care about connected
//! to my access point right now? It provides:
//!
//! - A full enumeration of associated stations over the kernel's nl80211
//!   generic netlink family
//! - A live subscription to station association and disassociation events
//! - Periodic re-enumeration that repairs missed events
//! - A bounded channel of occupancy values for downstream consumers
//!
//! # Example
//!
//! ```no_run
//! use wifi_occupancy::{MacAddress, NetlinkPresence, PresenceConfig};
//!
//! # async fn example() -> wifi_occupancy::Result<()> {
//! let phone: MacAddress = "aa:bb:cc:dd:ee:ff".parse()?;
//! let presence = NetlinkPresence::new([phone]);
//!
//! let (tx, mut rx) = PresenceConfig::default().channel();
//! presence.watch(tx).await?;
//!
//! while let Some(occupied) = rx.recv().await {
//!     println!("occupied: {occupied}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return `Result<T, PresenceError>`. Startup
//! failures such as a missing nl80211 family or multicast group are returned
//! from `watch`; the caller decides whether to give up or fall back to a
//! [`FilePresence`]. Once monitoring runs, receive and poll failures are
//! logged and absorbed.
//!
//! # Notifications and Reconciliation
//!
//! Station changes are applied as soon as the kernel announces them on the
//! `mlme` multicast group. Because the kernel does not always announce a
//! departure (a station can be deauthenticated without disassociating), the
//! whole association table is also re-read every few seconds and replaces the
//! tracked set.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:

//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod netlink;
mod types;

// Public API modules
pub mod api;

// Re-exported public API
pub use api::backend::{KernelBackend, StationMonitor, StationScanner, WirelessBackend};
pub use api::config::PresenceConfig;
pub use api::file_presence::FilePresence;
pub use api::models::{MacAddress, OccupancyPolicy, PresenceError, StationEvent};
pub use api::netlink_presence::NetlinkPresence;
pub use api::presence::{Presence, PresenceSource};
pub use crate::core::occupancy::evaluate;
pub use netlink::nl80211::{Nl80211, StationNotifications};

/// A specialized `Result` type for presence operations.
pub type Result<T> = std::result::Result<T, PresenceError>;
