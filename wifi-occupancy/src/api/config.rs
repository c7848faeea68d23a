//! Tunables shared by both presence sources.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::models::OccupancyPolicy;
use crate::types::constants::{channel, timeouts};

/// Configuration for a presence source.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use wifi_occupancy::{OccupancyPolicy, PresenceConfig};
///
/// let config = PresenceConfig::new()
///     .with_poll_interval(Duration::from_secs(10))
///     .with_policy(OccupancyPolicy::Any);
///
/// assert_eq!(config.channel_capacity, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// How often the full station table is re-enumerated.
    pub poll_interval: Duration,
    /// Number of occupancy values the output channel buffers.
    pub channel_capacity: usize,
    /// Rule used to turn the watched and current sets into a boolean.
    pub policy: OccupancyPolicy,
}

impl PresenceConfig {
    /// Creates a configuration with the default values.
    ///
    /// Defaults:
    /// - `poll_interval`: 5 seconds
    /// - `channel_capacity`: 16
    /// - `policy`: [`OccupancyPolicy::All`]
    pub fn new() -> Self {
        Self {
            poll_interval: timeouts::poll_interval(),
            channel_capacity: channel::DEFAULT_CAPACITY,
            policy: OccupancyPolicy::All,
        }
    }

    /// Sets the reconciliation interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the output channel capacity. Values below 1 are raised to 1.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Sets the occupancy policy.
    pub fn with_policy(mut self, policy: OccupancyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Creates the bounded occupancy channel sized by `channel_capacity`.
    pub fn channel(&self) -> (mpsc::Sender<bool>, mpsc::Receiver<bool>) {
        mpsc::channel(self.channel_capacity.max(1))
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PresenceConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.policy, OccupancyPolicy::All);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = PresenceConfig::new().with_channel_capacity(0);
        assert_eq!(config.channel_capacity, 1);

        let (tx, _rx) = config.channel();
        assert_eq!(tx.max_capacity(), 1);
    }

    #[tokio::test]
    async fn test_channel_buffers_configured_capacity() {
        let (tx, _rx) = PresenceConfig::new().channel();
        for _ in 0..16 {
            tx.try_send(true).unwrap();
        }
        assert!(tx.try_send(true).is_err());
    }
}
