//! Error types for the environment abstraction.

use thiserror::Error;

/// Errors surfaced by external collaborators.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Broadcast or lookup failed (the network is presumed unhealthy)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A relay could not be reached
    #[error("Relay unreachable: {0}")]
    RelayUnreachable(String),

    /// Envelope payload could not be (de)serialized or failed validation
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Remote call exceeded its bound
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Creates an unreachable-relay error.
    pub fn unreachable(relay: impl std::fmt::Display) -> Self {
        Self::RelayUnreachable(relay.to_string())
    }
}
