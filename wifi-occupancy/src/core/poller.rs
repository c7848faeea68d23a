//! Periodic reconciliation.
//!
//! Notifications are not guaranteed: a station deauthenticated without a
//! clean disassociation never produces `DEL_STATION`, and a full socket
//! buffer drops events. Each tick re-enumerates the association table and
//! replaces the current set with it.

use log::{debug, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::backend::StationScanner;
use crate::core::output::publish;
use crate::core::state::SharedState;

/// Runs until cancelled or until the consumer goes away.
///
/// The first tick fires one `period` after start, since the caller has just
/// performed an enumeration of its own. A failed enumeration skips the tick.
pub(crate) async fn run<S: StationScanner>(
    mut scanner: S,
    state: SharedState,
    tx: mpsc::Sender<bool>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("Station poller started with a {period:?} interval");

    loop {
        let stations = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => tokio::select! {
                _ = cancel.cancelled() => break,
                stations = scanner.enumerate() => stations,
            },
        };

        match stations {
            Ok(stations) => {
                debug!("Reconciled {} associated station(s)", stations.len());
                let _output = state.lock_output().await;
                let occupied = state.replace_stations(stations);
                if !publish(&tx, occupied, &cancel).await {
                    debug!("Station poller stopping");
                    return;
                }
            }
            Err(e) => warn!("Station poll failed, retrying next interval: {e}"),
        }
    }

    debug!("Station poller cancelled");
}
