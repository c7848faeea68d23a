//! Hand-off of occupancy values to the consumer.

use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pushes `occupied` onto the output channel.
///
/// Waits while the channel is full. Returns `false` if the source was shut
/// down or the consumer dropped its receiver; the caller should stop.
pub(crate) async fn publish(
    tx: &mpsc::Sender<bool>,
    occupied: bool,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = tx.send(occupied) => match sent {
            Ok(()) => true,
            Err(_) => {
                debug!("Occupancy receiver dropped");
                false
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_delivers() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        assert!(publish(&tx, true, &cancel).await);
        assert_eq!(rx.recv().await, Some(true));
    }

    #[tokio::test]
    async fn test_publish_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!publish(&tx, true, &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_publish_unblocks_on_cancel() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        tx.send(false).await.unwrap();

        cancel.cancel();
        assert!(!publish(&tx, true, &cancel).await);
    }
}
