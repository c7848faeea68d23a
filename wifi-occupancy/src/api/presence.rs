//! The common contract of presence sources.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::api::backend::WirelessBackend;
use crate::api::config::PresenceConfig;
use crate::api::file_presence::FilePresence;
use crate::api::models::{MacAddress, OccupancyPolicy};
use crate::api::netlink_presence::NetlinkPresence;
use crate::Result;

/// A source of occupancy values.
///
/// `watch` pushes the initial value and every re-evaluation onto the given
/// channel; `is_occupied` answers from in-memory or on-disk state without
/// waiting for the next push.
#[async_trait]
pub trait Presence: Send + Sync {
    /// Starts monitoring. Returns once background work is running.
    async fn watch(&self, tx: mpsc::Sender<bool>) -> Result<()>;

    /// Returns the current occupancy.
    fn is_occupied(&self) -> bool;

    /// Adds a watched address.
    fn add_address(&self, mac: MacAddress);

    /// Removes a watched address.
    fn remove_address(&self, mac: &MacAddress);

    /// Stops background work.
    async fn shutdown(&self);
}

#[async_trait]
impl<B: WirelessBackend> Presence for NetlinkPresence<B> {
    async fn watch(&self, tx: mpsc::Sender<bool>) -> Result<()> {
        NetlinkPresence::watch(self, tx).await
    }

    fn is_occupied(&self) -> bool {
        NetlinkPresence::is_occupied(self)
    }

    fn add_address(&self, mac: MacAddress) {
        NetlinkPresence::add_address(self, mac)
    }

    fn remove_address(&self, mac: &MacAddress) {
        NetlinkPresence::remove_address(self, mac)
    }

    async fn shutdown(&self) {
        NetlinkPresence::shutdown(self).await
    }
}

#[async_trait]
impl Presence for FilePresence {
    async fn watch(&self, tx: mpsc::Sender<bool>) -> Result<()> {
        FilePresence::watch(self, tx).await
    }

    fn is_occupied(&self) -> bool {
        FilePresence::is_occupied(self)
    }

    fn add_address(&self, mac: MacAddress) {
        FilePresence::add_address(self, mac)
    }

    fn remove_address(&self, mac: &MacAddress) {
        FilePresence::remove_address(self, mac)
    }

    async fn shutdown(&self) {
        FilePresence::shutdown(self).await
    }
}

/// The presence source chosen at startup.
///
/// Selected once and never switched: the kernel source when no station
/// file is configured, the file source otherwise.
///
/// # Example
///
/// ```no_run
/// use wifi_occupancy::{MacAddress, Presence, PresenceConfig, PresenceSource};
///
/// # async fn example() -> wifi_occupancy::Result<()> {
/// let phone: MacAddress = "aa:bb:cc:dd:ee:ff".parse()?;
/// let source = PresenceSource::select(None, [phone]);
///
/// let (tx, mut rx) = PresenceConfig::default().channel();
/// source.watch(tx).await?;
/// # Ok(())
/// # }
/// ```
pub enum PresenceSource {
    /// Stations from nl80211.
    Netlink(NetlinkPresence),
    /// Stations from a list file.
    File(FilePresence),
}

impl PresenceSource {
    /// Picks the file source if `file` is set, the kernel source otherwise,
    /// each with its default policy.
    pub fn select(file: Option<PathBuf>, addresses: impl IntoIterator<Item = MacAddress>) -> Self {
        match file {
            Some(path) => Self::File(FilePresence::new(path, addresses)),
            None => Self::Netlink(NetlinkPresence::new(addresses)),
        }
    }

    /// Like [`select`](Self::select) but with an explicit configuration for
    /// either source.
    pub fn select_with_config(
        file: Option<PathBuf>,
        addresses: impl IntoIterator<Item = MacAddress>,
        config: PresenceConfig,
    ) -> Self {
        match file {
            Some(path) => Self::File(FilePresence::with_config(path, addresses, config)),
            None => Self::Netlink(NetlinkPresence::with_config(addresses, config)),
        }
    }

    /// Returns the occupancy rule in effect.
    pub fn policy(&self) -> OccupancyPolicy {
        match self {
            Self::Netlink(source) => source.config().policy,
            Self::File(source) => source.policy(),
        }
    }

    fn inner(&self) -> &dyn Presence {
        match self {
            Self::Netlink(source) => source,
            Self::File(source) => source,
        }
    }
}

#[async_trait]
impl Presence for PresenceSource {
    async fn watch(&self, tx: mpsc::Sender<bool>) -> Result<()> {
        self.inner().watch(tx).await
    }

    fn is_occupied(&self) -> bool {
        self.inner().is_occupied()
    }

    fn add_address(&self, mac: MacAddress) {
        self.inner().add_address(mac)
    }

    fn remove_address(&self, mac: &MacAddress) {
        self.inner().remove_address(mac)
    }

    async fn shutdown(&self) {
        self.inner().shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_file_option() {
        let mac = MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

        let source = PresenceSource::select(Some(PathBuf::from("/tmp/stations")), [mac]);
        assert!(matches!(source, PresenceSource::File(_)));
        assert_eq!(source.policy(), OccupancyPolicy::Any);

        let source = PresenceSource::select(None, [mac]);
        assert!(matches!(source, PresenceSource::Netlink(_)));
        assert_eq!(source.policy(), OccupancyPolicy::All);
    }

    #[test]
    fn test_select_with_config_overrides_policy() {
        let config = PresenceConfig::new().with_policy(OccupancyPolicy::All);
        let source =
            PresenceSource::select_with_config(Some(PathBuf::from("/tmp/stations")), [], config);
        assert_eq!(source.policy(), OccupancyPolicy::All);
    }
}
