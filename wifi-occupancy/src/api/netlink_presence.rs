//! Presence from the stations associated with a local access point.
//!
//! The kernel source subscribes to nl80211 station notifications, performs
//! an initial enumeration, then keeps the station set current from two
//! background tasks: the notification loop and the reconciliation poller.

use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::backend::{KernelBackend, StationScanner, WirelessBackend};
use crate::api::config::PresenceConfig;
use crate::api::models::{MacAddress, PresenceError};
use crate::core::state::SharedState;
use crate::core::{poller, subscriber};
use crate::Result;

/// Occupancy tracking from the stations associated with a local access point.
///
/// This is the main entry point of the crate. It enumerates the stations
/// associated with every wireless interface through nl80211, listens for
/// association changes on the `mlme` multicast group, and re-enumerates on a
/// fixed interval to repair missed notifications.
///
/// # Example
///
/// ```no_run
/// use wifi_occupancy::{MacAddress, NetlinkPresence, PresenceConfig};
///
/// # async fn example() -> wifi_occupancy::Result<()> {
/// let phone: MacAddress = "aa:bb:cc:dd:ee:ff".parse()?;
/// let presence = NetlinkPresence::new([phone]);
///
/// let (tx, mut rx) = PresenceConfig::default().channel();
/// presence.watch(tx).await?;
///
/// while let Some(occupied) = rx.recv().await {
///     println!("occupied: {occupied}");
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Occupancy Rule
///
/// By default the space is occupied only when **every** watched address is
/// associated ([`OccupancyPolicy::All`](crate::OccupancyPolicy::All)). Use
/// [`PresenceConfig::with_policy`] to switch to `Any`.
///
/// # Thread Safety
///
/// All methods take `&self`. The station state is guarded by a mutex shared
/// with the background tasks, so `is_occupied` and the watch-list mutators
/// may be called from any thread while monitoring runs.
pub struct NetlinkPresence<B: WirelessBackend = KernelBackend> {
    backend: B,
    config: PresenceConfig,
    state: SharedState,
    cancel: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NetlinkPresence<KernelBackend> {
    /// Creates a kernel-backed source watching `addresses`, with default settings.
    pub fn new(addresses: impl IntoIterator<Item = MacAddress>) -> Self {
        Self::with_config(addresses, PresenceConfig::default())
    }

    /// Creates a kernel-backed source with a custom configuration.
    pub fn with_config(
        addresses: impl IntoIterator<Item = MacAddress>,
        config: PresenceConfig,
    ) -> Self {
        Self::with_backend(KernelBackend, addresses, config)
    }
}

impl<B: WirelessBackend> NetlinkPresence<B> {
    /// Creates a source that reads stations from `backend`.
    pub fn with_backend(
        backend: B,
        addresses: impl IntoIterator<Item = MacAddress>,
        config: PresenceConfig,
    ) -> Self {
        let watched: HashSet<MacAddress> = addresses.into_iter().collect();
        Self {
            backend,
            config,
            state: SharedState::new(watched, config.policy),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Starts monitoring and pushes occupancy values onto `tx`.
    ///
    /// Subscribes to station notifications, enumerates the current stations,
    /// pushes the initial occupancy, then spawns the notification loop and the
    /// reconciliation poller. Returns as soon as both are running.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Connection`], [`PresenceError::FamilyUnavailable`],
    /// [`PresenceError::GroupUnavailable`] or the enumeration error if startup
    /// fails; no background task is left running in that case. Returns
    /// [`PresenceError::AlreadyWatching`] on a second call.
    pub async fn watch(&self, tx: mpsc::Sender<bool>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PresenceError::AlreadyWatching);
        }

        let result = self.start(tx).await;
        if let Err(e) = &result {
            warn!("Failed to start station monitoring: {e}");
            self.started.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn start(&self, tx: mpsc::Sender<bool>) -> Result<()> {
        // Subscribe before the initial enumeration so no change slips between them.
        let monitor = self.backend.open_monitor().await?;
        let mut scanner = self.backend.open_scanner().await?;

        let stations = scanner.enumerate().await?;
        info!("Found {} associated station(s)", stations.len());

        let occupied = self.state.replace_stations(stations);
        tx.send(occupied)
            .await
            .map_err(|_| PresenceError::ChannelClosed)?;

        let notifications = tokio::spawn(subscriber::run(
            monitor,
            self.state.clone(),
            tx.clone(),
            self.cancel.child_token(),
        ));
        let reconciliation = tokio::spawn(poller::run(
            scanner,
            self.state.clone(),
            tx,
            self.config.poll_interval,
            self.cancel.child_token(),
        ));

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([notifications, reconciliation]);
        debug!("Station monitoring started");
        Ok(())
    }

    /// Returns whether the space is occupied according to the in-memory state.
    ///
    /// Does not query the kernel.
    pub fn is_occupied(&self) -> bool {
        self.state.is_occupied()
    }

    /// Adds `mac` to the watched addresses.
    ///
    /// Takes effect on the next evaluation; no value is pushed by this call.
    pub fn add_address(&self, mac: MacAddress) {
        if self.state.watch_address(mac) {
            debug!("Watching {mac}");
        }
    }

    /// Removes `mac` from the watched addresses.
    pub fn remove_address(&self, mac: &MacAddress) {
        if self.state.unwatch_address(mac) {
            debug!("No longer watching {mac}");
        }
    }

    /// Returns a copy of the watched addresses.
    pub fn watched_addresses(&self) -> HashSet<MacAddress> {
        self.state.watched()
    }

    /// Returns a copy of the currently associated stations as last observed.
    pub fn stations(&self) -> HashSet<MacAddress> {
        self.state.current()
    }

    /// Returns the configuration this source was created with.
    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Stops the background tasks and waits for them to finish.
    ///
    /// Without this call the tasks run until the runtime shuts down, even if
    /// the source itself is dropped. A source that has been shut down cannot
    /// be watched again.
    pub async fn shutdown(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.cancel.cancel();

        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for result in join_all(tasks).await {
            if let Err(e) = result {
                warn!("Presence task ended abnormally: {e}");
            }
        }
        debug!("Station monitoring stopped");
    }
}
