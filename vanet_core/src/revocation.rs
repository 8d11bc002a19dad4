//! Local positive-cache of revoked identities.

use crate::beacon::Identity;
use std::collections::HashSet;

/// Identities known to be revoked.
///
/// Append-only for the life of the process: authority positives and local
/// misbehavior verdicts are cached, negatives never are: a clean identity
/// may be revoked later, so every miss goes back to the authority. The
/// authority fallback itself lives in
/// [`Vehicle::is_revoked`](crate::vehicle::Vehicle::is_revoked) so the
/// remote call stays outside the vehicle's state lock.
#[derive(Debug, Clone, Default)]
pub struct RevocationCache {
    revoked: HashSet<Identity>,
}

impl RevocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.revoked.contains(id)
    }

    /// Caches a revoked identity. Returns true if it was not already known.
    pub fn insert(&mut self, id: Identity) -> bool {
        self.revoked.insert(id)
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}
