//! Core environment context trait for vehicle nodes.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts time, scheduling and identity provisioning so that
/// the vehicle engine can run in both production (tokio) and simulation
/// (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: [`TokioContext`](crate::TokioContext) using `tokio::time` and `OsRng`
/// - **Simulation**: `SimContext` in the sim crate with a manual clock and seeded RNG
#[async_trait]
pub trait VehicleContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    ///
    /// Used for motion deltas and timer deadlines. In simulation this is the
    /// virtual clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used for beacon timestamps.
    ///
    /// In simulation this is derived from the virtual clock plus a fixed
    /// epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task (a periodic activity or a one-shot waiter).
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Provisions a signing key for a vehicle identity.
    ///
    /// This is the keystore seam: production draws from OS entropy, while
    /// simulation combines the master seed with `seed_extension` so the same
    /// seed always yields the same fleet of identities.
    fn derive_signing_key(&self, seed_extension: u64) -> SigningKey;

    /// Returns the context's seed (0 in production, master seed in simulation).
    fn seed(&self) -> u64;
}
