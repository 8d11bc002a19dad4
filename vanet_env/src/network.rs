//! External collaborator contracts for a vehicle node.

use crate::error::EnvError;
use crate::types::{NodeId, RelayId, SignedEnvelope};
use async_trait::async_trait;
use std::sync::Arc;

/// The network-wide broadcast and relay-lookup service.
///
/// # Implementations
///
/// - **Production**: wraps the real vehicular network stack
/// - **Simulation**: in-memory registry with per-vehicle inboxes
///
/// # Packet flow
///
/// ```text
/// Vehicle A                  VANET                    Vehicle B
///   |                          |                          |
///   |-- broadcast(beacon) ---->|                          |
///   |                          |---- [fan-out] ---------->|-- handle_beacon
/// ```
#[async_trait]
pub trait VanetTransport: Send + Sync + 'static {
    /// Broadcasts a signed beacon envelope to every other vehicle.
    ///
    /// An error means the network is presumed unhealthy; the caller decides
    /// whether to retry or report itself unavailable.
    async fn broadcast(&self, sender: NodeId, envelope: SignedEnvelope) -> Result<(), EnvError>;

    /// Returns the nearest relay for a position, or `None` when no relay is
    /// in range (a recoverable condition, not an error).
    async fn nearest_relay(&self, x: f64, y: f64) -> Result<Option<RelayId>, EnvError>;

    /// Connects to a relay by name, yielding a handle for revocation
    /// operations.
    async fn connect(&self, relay: &RelayId) -> Result<Arc<dyn RelayAuthority>, EnvError>;
}

/// Revocation operations offered by a bound road-side relay.
///
/// Envelopes carry serialized signed reports/queries; the relay verifies the
/// inner signature before acting, so the transport layer stays opaque.
#[async_trait]
pub trait RelayAuthority: Send + Sync + 'static {
    /// Submits a revocation report accusing a peer of falsified data.
    async fn try_revoke(&self, report: SignedEnvelope) -> Result<(), EnvError>;

    /// Asks the authority whether an identity is revoked.
    async fn is_revoked(&self, query: SignedEnvelope) -> Result<bool, EnvError>;
}
