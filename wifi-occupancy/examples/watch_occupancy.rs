//! Prints occupancy changes for the given hardware addresses.
//!
//! ```text
//! RUST_LOG=wifi_occupancy=debug cargo run --example watch_occupancy -- aa:bb:cc:dd:ee:ff
//! STATION_FILE=/tmp/stations cargo run --example watch_occupancy -- aa:bb:cc:dd:ee:ff
//! ```

use std::path::PathBuf;
use wifi_occupancy::{MacAddress, Presence, PresenceConfig, PresenceSource, Result};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let addresses = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<MacAddress>())
        .collect::<Result<Vec<_>>>()?;

    if addresses.is_empty() {
        println!("Usage: watch_occupancy <mac> [<mac>...]");
        println!("Set STATION_FILE to read stations from a file instead of nl80211.");
        return Ok(());
    }

    let file = std::env::var_os("STATION_FILE").map(PathBuf::from);
    let source = PresenceSource::select(file, addresses);
    println!("Occupancy rule: {}", source.policy());

    let (tx, mut rx) = PresenceConfig::default().channel();
    source.watch(tx).await?;

    loop {
        tokio::select! {
            value = rx.recv() => match value {
                Some(occupied) => println!("occupied: {occupied}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping...");
                break;
            }
        }
    }

    source.shutdown().await;
    Ok(())
}
