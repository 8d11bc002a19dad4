//! Beacon messages, revocation payloads and their signed envelopes.

use crate::error::TrustError;
use crate::geometry::PositionVector;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use vanet_env::SignedEnvelope;

/// Opaque handle for a peer's cryptographic identity.
///
/// The Ed25519 verifying-key bytes stand in for the certificate: comparable,
/// hashable, immutable once issued, and the key of every cache.
/// (`VerifyingKey` itself does not implement `Hash`.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity([u8; 32]);

impl Identity {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<&VerifyingKey> for Identity {
    fn from(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 4 bytes for readability
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// One vehicle's position/velocity announcement, immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconMessage {
    pub position: PositionVector,
    pub velocity: PositionVector,
    /// Sender's wall clock at creation, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub sender: Identity,
}

/// A beacon plus the Ed25519 signature over its serialized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedBeacon {
    pub beacon: BeaconMessage,
    signature: Signature,
    public_key: VerifyingKey,
}

impl SignedBeacon {
    /// Signs `beacon` with the sender's private key.
    pub fn new(beacon: BeaconMessage, signing_key: &SigningKey) -> Result<Self, TrustError> {
        let payload = serde_json::to_vec(&beacon)?;
        Ok(Self {
            signature: signing_key.sign(&payload),
            public_key: signing_key.verifying_key(),
            beacon,
        })
    }

    /// Checks the signature and that the signer matches the claimed sender.
    pub fn verify(&self) -> Result<(), TrustError> {
        if Identity::from(&self.public_key) != self.beacon.sender {
            return Err(TrustError::SenderMismatch);
        }
        let payload = serde_json::to_vec(&self.beacon)?;
        self.public_key
            .verify(&payload, &self.signature)
            .map_err(|_| TrustError::InvalidSignature)
    }

    pub fn to_envelope(&self, timestamp_ms: u64) -> Result<SignedEnvelope, TrustError> {
        Ok(SignedEnvelope::new(serde_json::to_vec(self)?, timestamp_ms))
    }

    pub fn from_envelope(envelope: &SignedEnvelope) -> Result<Self, TrustError> {
        Ok(serde_json::from_slice(&envelope.payload)?)
    }
}

/// Accusation that a peer broadcast falsified position data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationReport {
    pub accused: Identity,
    pub accuser: Identity,
}

/// A revocation report signed by the accuser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedReport {
    pub report: RevocationReport,
    signature: Signature,
    public_key: VerifyingKey,
}

impl SignedReport {
    pub fn new(report: RevocationReport, signing_key: &SigningKey) -> Result<Self, TrustError> {
        let payload = serde_json::to_vec(&report)?;
        Ok(Self {
            signature: signing_key.sign(&payload),
            public_key: signing_key.verifying_key(),
            report,
        })
    }

    /// Checks the signature and that the signer is the accuser.
    pub fn verify(&self) -> Result<(), TrustError> {
        if Identity::from(&self.public_key) != self.report.accuser {
            return Err(TrustError::SenderMismatch);
        }
        let payload = serde_json::to_vec(&self.report)?;
        self.public_key
            .verify(&payload, &self.signature)
            .map_err(|_| TrustError::InvalidSignature)
    }

    pub fn to_envelope(&self, timestamp_ms: u64) -> Result<SignedEnvelope, TrustError> {
        Ok(SignedEnvelope::new(serde_json::to_vec(self)?, timestamp_ms))
    }

    pub fn from_envelope(envelope: &SignedEnvelope) -> Result<Self, TrustError> {
        Ok(serde_json::from_slice(&envelope.payload)?)
    }
}

/// Revocation-status question about `subject`, asked by `requester`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationQuery {
    pub subject: Identity,
    pub requester: Identity,
}

/// A revocation query signed by the requester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedQuery {
    pub query: RevocationQuery,
    signature: Signature,
    public_key: VerifyingKey,
}

impl SignedQuery {
    pub fn new(query: RevocationQuery, signing_key: &SigningKey) -> Result<Self, TrustError> {
        let payload = serde_json::to_vec(&query)?;
        Ok(Self {
            signature: signing_key.sign(&payload),
            public_key: signing_key.verifying_key(),
            query,
        })
    }

    /// Checks the signature and that the signer is the requester.
    pub fn verify(&self) -> Result<(), TrustError> {
        if Identity::from(&self.public_key) != self.query.requester {
            return Err(TrustError::SenderMismatch);
        }
        let payload = serde_json::to_vec(&self.query)?;
        self.public_key
            .verify(&payload, &self.signature)
            .map_err(|_| TrustError::InvalidSignature)
    }

    pub fn to_envelope(&self, timestamp_ms: u64) -> Result<SignedEnvelope, TrustError> {
        Ok(SignedEnvelope::new(serde_json::to_vec(self)?, timestamp_ms))
    }

    pub fn from_envelope(envelope: &SignedEnvelope) -> Result<Self, TrustError> {
        Ok(serde_json::from_slice(&envelope.payload)?)
    }
}
