//! VANET Vehicle Node - Position-Beacon Misbehavior Detection
//!
//! This library models a single vehicular network node that:
//! 1. **Beacons**: periodically broadcasts signed position/velocity announcements
//! 2. **Evaluates**: checks received beacons for physical plausibility
//!    (predicted-vs-observed position) and reports falsifiers for revocation
//! 3. **Reacts**: freezes on proximity danger until a debounced all-clear
//!
//! The engines are pure state machines; everything external (time, network,
//! relay authority, key provisioning) crosses the `vanet_env` seams.

pub mod beacon;
pub mod config;
pub mod danger;
pub mod error;
pub mod geometry;
pub mod revocation;
pub mod trust;
pub mod vehicle;
pub mod vicinity;

// Re-export key types for convenience
pub use beacon::{BeaconMessage, Identity, SignedBeacon};
pub use config::VehicleConfig;
pub use danger::DangerMonitor;
pub use error::{TrustError, VehicleError};
pub use geometry::PositionVector;
pub use revocation::RevocationCache;
pub use trust::{TrustEvaluator, TrustVerdict};
pub use vehicle::{BeaconDisposition, Vehicle};
pub use vicinity::VicinityCache;
