//! TTL-bounded cache of the most recent beacon per peer.

use crate::beacon::{BeaconMessage, Identity};
use std::collections::HashMap;
use std::time::Duration;

/// One peer's cache slot.
#[derive(Debug, Clone)]
pub struct VicinityEntry {
    pub last_beacon: BeaconMessage,
    /// Timestamp of the beacon that created this entry, milliseconds since
    /// the Unix epoch. Expiry is keyed to this, not to the latest update.
    pub first_seen_ms: u64,
}

/// Per-sender cache of the latest beacon, lazily evicted after a TTL.
///
/// Eviction happens only when an expired entry is looked up again; entries
/// never touched again are never reclaimed. That trade-off is deliberate:
/// callers needing bounded memory run [`sweep`](VicinityCache::sweep)
/// themselves, it is never invoked implicitly.
#[derive(Debug, Clone)]
pub struct VicinityCache {
    ttl_ms: u64,
    entries: HashMap<Identity, VicinityEntry>,
}

impl VicinityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as u64,
            entries: HashMap::new(),
        }
    }

    /// Whether a still-valid entry exists for `id`.
    ///
    /// An entry found expired is deleted on the way out (lazy eviction).
    /// Validity is inclusive: an entry aged exactly the TTL still counts.
    pub fn contains(&mut self, id: &Identity, now_ms: u64) -> bool {
        let expired = match self.entries.get(id) {
            None => return false,
            Some(entry) => now_ms.saturating_sub(entry.first_seen_ms) > self.ttl_ms,
        };
        if expired {
            self.entries.remove(id);
            return false;
        }
        true
    }

    /// Latest beacon for `id`, applying the same expiry rule as
    /// [`contains`](VicinityCache::contains).
    pub fn get(&mut self, id: &Identity, now_ms: u64) -> Option<&BeaconMessage> {
        if !self.contains(id, now_ms) {
            return None;
        }
        self.entries.get(id).map(|entry| &entry.last_beacon)
    }

    /// Records `beacon` for its sender.
    ///
    /// First sight (or a sighting after expiry) creates a fresh entry with
    /// `first_seen_ms` taken from the beacon's own timestamp; otherwise only
    /// the last beacon is overwritten and the original `first_seen_ms` kept.
    pub fn update(&mut self, beacon: BeaconMessage, now_ms: u64) {
        let id = beacon.sender;
        if self.contains(&id, now_ms) {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.last_beacon = beacon;
            }
        } else {
            let first_seen_ms = beacon.timestamp_ms;
            self.entries.insert(
                id,
                VicinityEntry {
                    last_beacon: beacon,
                    first_seen_ms,
                },
            );
        }
    }

    /// Explicit eviction, for entries proven stale.
    pub fn remove(&mut self, id: &Identity) {
        self.entries.remove(id);
    }

    /// Number of entries currently stored, expired stragglers included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts every expired entry and returns how many went.
    pub fn sweep(&mut self, now_ms: u64) -> usize {
        let ttl_ms = self.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now_ms.saturating_sub(entry.first_seen_ms) <= ttl_ms);
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PositionVector;

    const TTL: Duration = Duration::from_secs(30);
    const TTL_MS: u64 = 30_000;

    fn beacon(tag: u8, timestamp_ms: u64) -> BeaconMessage {
        BeaconMessage {
            position: PositionVector::new(tag as f64, 0.0),
            velocity: PositionVector::new(10.0, 0.0),
            timestamp_ms,
            sender: Identity::from_bytes([tag; 32]),
        }
    }

    #[test]
    fn test_ttl_boundary() {
        let mut cache = VicinityCache::new(TTL);
        let id = Identity::from_bytes([1; 32]);
        cache.update(beacon(1, 1_000), 1_000);

        // Aged exactly the TTL: still valid
        assert!(cache.contains(&id, 1_000 + TTL_MS));
        // One millisecond past: expired and evicted
        assert!(!cache.contains(&id, 1_000 + TTL_MS + 1));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_get_applies_expiry() {
        let mut cache = VicinityCache::new(TTL);
        let id = Identity::from_bytes([1; 32]);
        cache.update(beacon(1, 1_000), 1_000);

        assert!(cache.get(&id, 2_000).is_some());
        assert!(cache.get(&id, 1_000 + TTL_MS + 1).is_none());
        // The expired lookup also evicted
        assert!(cache.is_empty());
    }

    #[test]
    fn test_update_preserves_first_seen() {
        let mut cache = VicinityCache::new(TTL);
        let id = Identity::from_bytes([1; 32]);

        cache.update(beacon(1, 1_000), 1_000);
        // A later beacon refreshes the payload, not the entry age
        cache.update(beacon(1, 20_000), 20_000);

        assert_eq!(cache.get(&id, 20_000).unwrap().timestamp_ms, 20_000);
        // Expiry still keyed to the first sighting at t=1s
        assert!(!cache.contains(&id, 1_000 + TTL_MS + 1));
    }

    #[test]
    fn test_resight_after_expiry_starts_fresh() {
        let mut cache = VicinityCache::new(TTL);
        let id = Identity::from_bytes([1; 32]);

        cache.update(beacon(1, 1_000), 1_000);
        let later = 1_000 + TTL_MS + 5_000;
        cache.update(beacon(1, later), later);

        // The new entry's clock starts at the new beacon
        assert!(cache.contains(&id, later + TTL_MS));
        assert!(!cache.contains(&id, later + TTL_MS + 1));
    }

    #[test]
    fn test_remove() {
        let mut cache = VicinityCache::new(TTL);
        let id = Identity::from_bytes([1; 32]);
        cache.update(beacon(1, 1_000), 1_000);

        cache.remove(&id);
        assert!(!cache.contains(&id, 1_001));
    }

    #[test]
    fn test_sweep_evicts_only_expired() {
        let mut cache = VicinityCache::new(TTL);
        cache.update(beacon(1, 1_000), 1_000);
        cache.update(beacon(2, 20_000), 20_000);

        let evicted = cache.sweep(1_000 + TTL_MS + 1);
        assert_eq!(evicted, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&Identity::from_bytes([2; 32]), 1_000 + TTL_MS + 1));
    }

    #[test]
    fn test_unqueried_expired_entry_lingers() {
        let mut cache = VicinityCache::new(TTL);
        cache.update(beacon(1, 1_000), 1_000);

        // Nothing ever looks the entry up again: it stays allocated
        assert_eq!(cache.len(), 1);
    }
}
