//! VANET Environment Abstraction Layer
//!
//! This crate isolates the vehicle decision engine from the "real world" so
//! that the same engine code runs in both **Production** (tokio, OS entropy,
//! a real network) and **Simulation** (virtual clock, seeded keys, in-memory
//! transport).
//!
//! Everything the engine cannot compute locally crosses one of two seams:
//! - [`VehicleContext`]: time, sleep, task spawning, identity provisioning
//! - [`VanetTransport`] / [`RelayAuthority`]: the network-wide broadcast
//!   service and the road-side relay it binds to
//!
//! # Example
//!
//! ```ignore
//! use vanet_env::{VehicleContext, VanetTransport};
//!
//! async fn beacon_loop<Ctx: VehicleContext>(ctx: &Ctx, net: &dyn VanetTransport) {
//!     loop {
//!         ctx.sleep(Duration::from_secs(1)).await;
//!         tick(ctx, net).await;
//!     }
//! }
//! ```

mod context;
mod error;
mod network;
mod tokio_impl;
mod types;

pub use context::VehicleContext;
pub use error::EnvError;
pub use network::{RelayAuthority, VanetTransport};
pub use tokio_impl::TokioContext;
pub use types::{NodeId, RelayId, SignedEnvelope};
