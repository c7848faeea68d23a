//! Station notification loop.
//!
//! Applies `NEW_STATION` / `DEL_STATION` events to the shared state as they
//! arrive and pushes the re-evaluated occupancy after each one.

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::backend::StationMonitor;
use crate::core::output::publish;
use crate::core::state::SharedState;
use crate::types::constants::timeouts;

/// Runs until cancelled or until the consumer goes away.
///
/// Receive failures are logged and retried after a short pause; they never
/// end the loop. A socket that stays broken shows up as repeated warnings
/// while reconciliation keeps the state correct.
pub(crate) async fn run<M: StationMonitor>(
    mut monitor: M,
    state: SharedState,
    tx: mpsc::Sender<bool>,
    cancel: CancellationToken,
) {
    debug!("Station notification loop started");

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = monitor.recv() => received,
        };

        let events = match received {
            Ok(events) => events,
            Err(e) => {
                warn!("Failed to receive station notifications: {e}");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(timeouts::receive_retry()) => continue,
                }
            }
        };

        for event in events {
            let _output = state.lock_output().await;
            let occupied = state.apply(event);
            info!("{event}");
            if !publish(&tx, occupied, &cancel).await {
                debug!("Station notification loop stopping");
                return;
            }
        }
    }

    debug!("Station notification loop cancelled");
}
