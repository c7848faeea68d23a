//! Abstractions over where station data comes from.
//!
//! [`NetlinkPresence`](crate::NetlinkPresence) talks to the kernel through a
//! [`WirelessBackend`]. The default [`KernelBackend`] uses nl80211; other
//! implementations can feed stations and events from anywhere.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::api::models::{MacAddress, StationEvent};
use crate::netlink::nl80211::{Nl80211, StationNotifications};
use crate::Result;

/// Performs full enumerations of the associated stations.
#[async_trait]
pub trait StationScanner: Send + 'static {
    /// Returns every currently associated station.
    ///
    /// Must not commit partial results: on error, the caller keeps its
    /// previous view.
    async fn enumerate(&mut self) -> Result<HashSet<MacAddress>>;
}

/// Receives asynchronous association changes.
#[async_trait]
pub trait StationMonitor: Send + 'static {
    /// Waits for the next batch of events.
    ///
    /// An empty batch is valid. Errors are treated as transient by the caller.
    async fn recv(&mut self) -> Result<Vec<StationEvent>>;
}

/// Opens the scanner and monitor used by a presence source.
#[async_trait]
pub trait WirelessBackend: Send + Sync + 'static {
    /// Scanner type used for the initial enumeration and for reconciliation.
    type Scanner: StationScanner;
    /// Monitor type used for notifications.
    type Monitor: StationMonitor;

    /// Opens a connection suitable for repeated enumeration.
    async fn open_scanner(&self) -> Result<Self::Scanner>;

    /// Opens a connection subscribed to station notifications.
    async fn open_monitor(&self) -> Result<Self::Monitor>;
}

/// The kernel's nl80211 interface.
///
/// Scanner and monitor each get their own socket so that dump replies never
/// interleave with multicast notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelBackend;

#[async_trait]
impl WirelessBackend for KernelBackend {
    type Scanner = Nl80211;
    type Monitor = StationNotifications;

    async fn open_scanner(&self) -> Result<Nl80211> {
        Nl80211::connect().await
    }

    async fn open_monitor(&self) -> Result<StationNotifications> {
        Nl80211::connect().await?.subscribe()
    }
}

#[async_trait]
impl StationScanner for Nl80211 {
    async fn enumerate(&mut self) -> Result<HashSet<MacAddress>> {
        self.stations().await
    }
}

#[async_trait]
impl StationMonitor for StationNotifications {
    async fn recv(&mut self) -> Result<Vec<StationEvent>> {
        StationNotifications::recv(self).await
    }
}
