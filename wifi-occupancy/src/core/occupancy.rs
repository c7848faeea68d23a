//! Occupancy evaluation.
//!
//! Pure functions turning the watched and current station sets into a
//! boolean. Nothing here touches shared state or I/O.

use log::debug;
use std::collections::HashSet;

use crate::api::models::{MacAddress, OccupancyPolicy};

impl OccupancyPolicy {
    /// Applies the policy to the watched and current sets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::HashSet;
    /// use wifi_occupancy::{MacAddress, OccupancyPolicy};
    ///
    /// let phone: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
    /// let laptop: MacAddress = "00:11:22:33:44:55".parse().unwrap();
    ///
    /// let watched = HashSet::from([phone, laptop]);
    /// let current = HashSet::from([phone]);
    ///
    /// assert!(!OccupancyPolicy::All.evaluate(&watched, &current));
    /// assert!(OccupancyPolicy::Any.evaluate(&watched, &current));
    /// ```
    pub fn evaluate(self, watched: &HashSet<MacAddress>, current: &HashSet<MacAddress>) -> bool {
        let present = watched.intersection(current).count();
        let occupied = match self {
            Self::All => present == watched.len(),
            Self::Any => present > 0,
        };
        debug!(
            "{present}/{} watched present among {} station(s), policy {self}: {occupied}",
            watched.len(),
            current.len()
        );
        occupied
    }
}

/// Evaluates occupancy with the kernel source's rule: occupied iff every
/// watched address is currently associated.
pub fn evaluate(watched: &HashSet<MacAddress>, current: &HashSet<MacAddress>) -> bool {
    OccupancyPolicy::All.evaluate(watched, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn macs(last: &[u8]) -> HashSet<MacAddress> {
        last.iter()
            .map(|&b| MacAddress::new([0x02, 0, 0, 0, 0, b]))
            .collect()
    }

    #[test]
    fn test_disjoint_sets_are_not_occupied() {
        let watched = macs(&[1, 2]);
        let current = macs(&[3, 4, 5]);
        assert!(!evaluate(&watched, &current));
        assert!(!OccupancyPolicy::Any.evaluate(&watched, &current));
    }

    #[test]
    fn test_subset_is_occupied() {
        let watched = macs(&[1, 2]);
        let current = macs(&[1, 2, 3]);
        assert!(evaluate(&watched, &current));
    }

    #[test]
    fn test_removing_any_watched_address_flips_to_false() {
        let watched = macs(&[1, 2, 3]);
        for missing in [1u8, 2, 3] {
            let mut current = macs(&[1, 2, 3, 9]);
            current.remove(&MacAddress::new([0x02, 0, 0, 0, 0, missing]));
            assert!(!evaluate(&watched, &current), "missing {missing}");
        }
    }

    #[test]
    fn test_any_needs_one_present() {
        let watched = macs(&[1, 2]);
        assert!(OccupancyPolicy::Any.evaluate(&watched, &macs(&[2])));
        assert!(!OccupancyPolicy::Any.evaluate(&watched, &macs(&[])));
    }

    #[test]
    fn test_empty_watch_list() {
        let none = HashSet::new();
        let current = macs(&[1]);
        assert!(OccupancyPolicy::All.evaluate(&none, &current));
        assert!(!OccupancyPolicy::Any.evaluate(&none, &current));
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let watched = macs(&[1]);
        let current = macs(&[1, 2]);
        let first = evaluate(&watched, &current);
        let second = evaluate(&watched, &current);
        assert_eq!(first, second);
    }
}
