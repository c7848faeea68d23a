//! Presence from a plain-text file of associated stations.
//!
//! Some access points cannot be queried over nl80211 but can write their
//! association table to a file (one hardware address per line). This source
//! watches that file with the `notify` crate and re-evaluates occupancy after
//! each burst of writes has settled.

use futures::future::join_all;
use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::config::PresenceConfig;
use crate::api::models::{MacAddress, OccupancyPolicy, PresenceError};
use crate::core::output::publish;
use crate::core::state::SharedState;
use crate::types::constants::timeouts;
use crate::Result;

/// Parses a station list: one address per line, blank lines ignored.
///
/// Lines that are not hardware addresses are skipped.
pub(crate) fn parse_station_list(contents: &str) -> HashSet<MacAddress> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.parse() {
            Ok(mac) => Some(mac),
            Err(e) => {
                debug!("Ignoring line in station file: {e}");
                None
            }
        })
        .collect()
}

/// Occupancy tracking from a station list file.
///
/// Unlike [`NetlinkPresence`](crate::NetlinkPresence), this source defaults to
/// [`OccupancyPolicy::Any`]: one watched address in the file is enough.
///
/// # Example
///
/// ```no_run
/// use wifi_occupancy::{FilePresence, MacAddress, PresenceConfig};
///
/// # async fn example() -> wifi_occupancy::Result<()> {
/// let phone: MacAddress = "aa:bb:cc:dd:ee:ff".parse()?;
/// let presence = FilePresence::new("/tmp/stations", [phone]);
///
/// let (tx, mut rx) = PresenceConfig::default().channel();
/// presence.watch(tx).await?;
/// # Ok(())
/// # }
/// ```
pub struct FilePresence {
    path: PathBuf,
    state: SharedState,
    cancel: CancellationToken,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FilePresence {
    /// Creates a source reading `path`, using the `Any` policy.
    pub fn new(path: impl Into<PathBuf>, addresses: impl IntoIterator<Item = MacAddress>) -> Self {
        Self::with_config(
            path,
            addresses,
            PresenceConfig::default().with_policy(OccupancyPolicy::Any),
        )
    }

    /// Creates a source with a custom configuration.
    ///
    /// Only `policy` applies; the file source does not poll.
    pub fn with_config(
        path: impl Into<PathBuf>,
        addresses: impl IntoIterator<Item = MacAddress>,
        config: PresenceConfig,
    ) -> Self {
        Self {
            path: path.into(),
            state: SharedState::new(addresses.into_iter().collect(), config.policy),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Returns the watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts watching the file and pushes occupancy values onto `tx`.
    ///
    /// Creates the file if it does not exist, pushes the initial occupancy and
    /// spawns the watcher task.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Io`] if the file cannot be created and
    /// [`PresenceError::Watch`] if the watcher cannot be installed.
    pub async fn watch(&self, tx: mpsc::Sender<bool>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PresenceError::AlreadyWatching);
        }

        let result = self.start(tx).await;
        if let Err(e) = &result {
            warn!("Failed to start watching {}: {e}", self.path.display());
            self.started.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn start(&self, tx: mpsc::Sender<bool>) -> Result<()> {
        if !self.path.exists() {
            info!("Creating station file {}", self.path.display());
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
        }

        let (changes_tx, changes_rx) = mpsc::channel::<()>(16);
        let watcher = self.install_watcher(changes_tx)?;

        tx.send(self.is_occupied())
            .await
            .map_err(|_| PresenceError::ChannelClosed)?;

        let task = tokio::spawn(run_file_watch(
            watcher,
            changes_rx,
            self.path.clone(),
            self.state.clone(),
            tx,
            self.cancel.child_token(),
        ));
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(())
    }

    /// Watches the file's directory so that atomic replacements (write to a
    /// temp file, then rename) are seen too.
    fn install_watcher(&self, changes: mpsc::Sender<()>) -> Result<RecommendedWatcher> {
        let file_name: OsString = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().is_some_and(|n| n == file_name));
                    if ours {
                        let _ = changes.try_send(());
                    }
                }
                Err(e) => error!("Station file watcher error: {e}"),
            },
            notify::Config::default(),
        )
        .map_err(|e| PresenceError::Watch(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| {
                PresenceError::Watch(format!("failed to watch {}: {e}", directory.display()))
            })?;

        debug!("Watching {} for station changes", self.path.display());
        Ok(watcher)
    }

    /// Returns the occupancy rule in effect.
    pub fn policy(&self) -> OccupancyPolicy {
        self.state.policy()
    }

    /// Reads the file and evaluates occupancy. An unreadable file is not occupied.
    pub fn is_occupied(&self) -> bool {
        read_occupancy(&self.path, &self.state)
    }

    /// Adds `mac` to the watched addresses.
    pub fn add_address(&self, mac: MacAddress) {
        self.state.watch_address(mac);
    }

    /// Removes `mac` from the watched addresses.
    pub fn remove_address(&self, mac: &MacAddress) {
        self.state.unwatch_address(mac);
    }

    /// Returns a copy of the watched addresses.
    pub fn watched_addresses(&self) -> HashSet<MacAddress> {
        self.state.watched()
    }

    /// Stops the watcher task and waits for it to finish.
    pub async fn shutdown(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.cancel.cancel();

        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for result in join_all(tasks).await {
            if let Err(e) = result {
                warn!("Station file task ended abnormally: {e}");
            }
        }
    }
}

fn read_occupancy(path: &Path, state: &SharedState) -> bool {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let occupied = state.evaluate_with(&parse_station_list(&contents));
            debug!("Is presence detected? {occupied}");
            occupied
        }
        Err(e) => {
            debug!("Cannot read {}: {e}", path.display());
            false
        }
    }
}

/// Waits for change signals, lets each burst settle, then re-evaluates.
async fn run_file_watch(
    watcher: RecommendedWatcher,
    mut changes: mpsc::Receiver<()>,
    path: PathBuf,
    state: SharedState,
    tx: mpsc::Sender<bool>,
    cancel: CancellationToken,
) {
    // Dropping the watcher stops notifications.
    let _watcher = watcher;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            change = changes.recv() => {
                if change.is_none() {
                    break;
                }
            }
        }

        let settle = tokio::time::sleep(timeouts::file_debounce());
        tokio::pin!(settle);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = &mut settle => break,
                change = changes.recv() => {
                    if change.is_none() {
                        return;
                    }
                }
            }
        }

        debug!("Station file changed");
        if !publish(&tx, read_occupancy(&path, &state), &cancel).await {
            return;
        }
    }

    debug!("Station file watch stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_station_list() {
        let contents = "aa:bb:cc:dd:ee:ff\n\n  00:11:22:33:44:55  \nnot-a-mac\n";
        let stations = parse_station_list(contents);
        assert_eq!(stations.len(), 2);
        assert!(stations.contains(&"00:11:22:33:44:55".parse().unwrap()));
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_station_list("").is_empty());
        assert!(parse_station_list("\n\n").is_empty());
    }
}
