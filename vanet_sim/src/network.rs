//! Simulated vehicular network: broadcast fan-out and relay registry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;
use vanet_env::{EnvError, NodeId, RelayAuthority, RelayId, SignedEnvelope, VanetTransport};

use crate::relay::SimRelay;

/// In-memory vehicular network.
///
/// Broadcasts fan out to every registered vehicle's inbox except the
/// sender's. Relay lookup is nearest-by-Euclidean-distance, bounded by a
/// coverage radius; outside it there is no relay. The whole network can be
/// taken down for unavailability tests.
pub struct SimVanet {
    relays: Mutex<Vec<Arc<SimRelay>>>,
    coverage_radius: f64,
    inboxes: Mutex<HashMap<NodeId, mpsc::UnboundedSender<SignedEnvelope>>>,
    down: AtomicBool,
    broadcasts: AtomicU64,
}

impl SimVanet {
    pub fn new(coverage_radius: f64) -> Arc<Self> {
        Arc::new(Self {
            relays: Mutex::new(Vec::new()),
            coverage_radius,
            inboxes: Mutex::new(HashMap::new()),
            down: AtomicBool::new(false),
            broadcasts: AtomicU64::new(0),
        })
    }

    pub fn add_relay(&self, relay: Arc<SimRelay>) {
        self.relays.lock().unwrap().push(relay);
    }

    pub fn relay(&self, id: &RelayId) -> Option<Arc<SimRelay>> {
        self.relays
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// Registers a vehicle and returns the receiving end of its inbox.
    pub fn register_vehicle(&self, node: NodeId) -> mpsc::UnboundedReceiver<SignedEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().unwrap().insert(node, tx);
        rx
    }

    /// Fault injection: while down, broadcasts and lookups fail.
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> Result<(), EnvError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(EnvError::network("vanet down"));
        }
        Ok(())
    }
}

#[async_trait]
impl VanetTransport for SimVanet {
    async fn broadcast(&self, sender: NodeId, envelope: SignedEnvelope) -> Result<(), EnvError> {
        self.check_up()?;
        self.broadcasts.fetch_add(1, Ordering::SeqCst);

        let inboxes = self.inboxes.lock().unwrap();
        let mut delivered = 0usize;
        for (node, tx) in inboxes.iter() {
            if *node == sender {
                continue;
            }
            // A closed inbox means the vehicle is gone; skip it
            if tx.send(envelope.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(sender = %sender, delivered, "broadcast");
        Ok(())
    }

    async fn nearest_relay(&self, x: f64, y: f64) -> Result<Option<RelayId>, EnvError> {
        self.check_up()?;
        let relays = self.relays.lock().unwrap();
        let nearest = relays
            .iter()
            .map(|r| {
                let (rx, ry) = r.position();
                let dist = ((x - rx).powi(2) + (y - ry).powi(2)).sqrt();
                (dist, r)
            })
            .min_by(|a, b| a.0.total_cmp(&b.0));

        Ok(match nearest {
            Some((dist, relay)) if dist <= self.coverage_radius => Some(relay.id().clone()),
            _ => None,
        })
    }

    async fn connect(&self, relay: &RelayId) -> Result<Arc<dyn RelayAuthority>, EnvError> {
        self.check_up()?;
        self.relay(relay)
            .map(|r| r as Arc<dyn RelayAuthority>)
            .ok_or_else(|| EnvError::unreachable(relay))
    }
}
