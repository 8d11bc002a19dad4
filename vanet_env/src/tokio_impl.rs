//! Production implementation of VehicleContext using Tokio.

use crate::VehicleContext;
use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::Instrument;

/// Production context for a vehicle node.
///
/// Monotonic time is measured from context creation, wall-clock time comes
/// from the system clock, signing keys from OS entropy. Spawned activities
/// (beacon loop, relay loop, danger-clear waiters) run under a tracing span
/// carrying the activity name, so their log lines are attributable.
pub struct TokioContext {
    /// Origin of the monotonic clock; motion deltas are measured against it
    started_at: Instant,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across vehicle tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VehicleContext for TokioContext {
    fn now(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("vehicle_task", task = %name);
        tokio::spawn(future.instrument(span));
    }

    fn derive_signing_key(&self, _seed_extension: u64) -> SigningKey {
        // Production keys are provisioned from OS entropy; the seed
        // extension only matters for deterministic simulation contexts
        use rand::rngs::OsRng;
        SigningKey::generate(&mut OsRng)
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}
