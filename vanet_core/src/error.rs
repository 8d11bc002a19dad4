//! Error types for the vehicle decision engine.

use thiserror::Error;
use vanet_env::EnvError;

/// Cryptographic and serialization failures around signed payloads.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("signer does not match claimed sender")]
    SenderMismatch,
}

/// Failures that stop a vehicle's activities.
///
/// Recoverable conditions (no relay in range, a revoked sender, a
/// misbehavior verdict) never surface here; they are absorbed by the
/// pipeline with a log line.
#[derive(Debug, Error)]
pub enum VehicleError {
    /// A remote collaborator kept failing through the bounded retry policy;
    /// the network is presumed gone and the vehicle reports itself
    /// unavailable.
    #[error("{op} unavailable after {attempts} attempts: {source}")]
    Unavailable {
        op: &'static str,
        attempts: u32,
        #[source]
        source: EnvError,
    },

    /// An operation needed a relay binding that does not exist.
    #[error("no relay bound")]
    NoRelay,

    #[error(transparent)]
    Trust(#[from] TrustError),
}
