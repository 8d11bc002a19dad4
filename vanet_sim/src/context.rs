//! Simulation context implementing VehicleContext for deterministic testing.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::Instrument;
use vanet_env::VehicleContext;

/// Simulation context backed by deterministic time and key derivation.
///
/// The virtual clock advances only when the runner says so. `sleep` parks
/// (yielding) until the clock reaches its target instead of advancing the
/// clock itself, so spawned vehicle loops and danger-clear waiters stay
/// under runner control: nothing fires between two runner steps.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap();
        *time += duration.as_nanos() as u64;
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        let mut time = self.virtual_time_ns.lock().unwrap();
        *time = time_ns;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap()
    }
}

#[async_trait]
impl VehicleContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(*self.virtual_time_ns.lock().unwrap())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Park until the runner has advanced the clock past the target
        let target = self.now() + duration;
        while self.now() < target {
            tokio::task::yield_now().await;
        }
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("sim_task", task = %name, seed = self.seed);
        tokio::spawn(future.instrument(span));
    }

    fn derive_signing_key(&self, seed_extension: u64) -> SigningKey {
        // Combine master seed with extension for a deterministic key
        let combined_seed = self.seed.wrapping_mul(0x517cc1b727220a95) ^ seed_extension;
        let mut key_rng = ChaCha8Rng::seed_from_u64(combined_seed);
        SigningKey::generate(&mut key_rng)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }

    #[test]
    fn test_sim_context_deterministic_keys() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);

        let key1 = ctx1.derive_signing_key(1);
        let key2 = ctx2.derive_signing_key(1);

        // Same seed + extension = same key
        assert_eq!(key1.to_bytes(), key2.to_bytes());

        // Different extension = different key
        let key3 = ctx1.derive_signing_key(2);
        assert_ne!(key1.to_bytes(), key3.to_bytes());
    }

    #[tokio::test]
    async fn test_sleep_waits_for_the_clock() {
        let ctx = SimContext::shared(7);
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let sleeper = {
            let ctx = Arc::clone(&ctx);
            let flag = Arc::clone(&flag);
            tokio::spawn(async move {
                ctx.sleep(Duration::from_secs(1)).await;
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
            })
        };

        // Yield without advancing: the sleeper must stay parked
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));

        ctx.advance_time(Duration::from_secs(1));
        sleeper.await.unwrap();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
