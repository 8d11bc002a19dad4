//! Predicted-vs-observed position trust check.

use crate::beacon::BeaconMessage;

/// Outcome of comparing a fresh beacon against the cached one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrustVerdict {
    /// No prior beacon from this sender; accepted without a trust check.
    FirstSighting,

    /// Claimed position is within the acceptable variance of the prediction.
    Trusted,

    /// Claimed position deviates beyond tolerance; likely falsified.
    Misbehavior {
        /// Distance between predicted and claimed position, meters
        deviation: f64,
    },
}

impl TrustVerdict {
    pub fn is_misbehavior(&self) -> bool {
        matches!(self, Self::Misbehavior { .. })
    }
}

/// Flags physically implausible beacon data by linear prediction.
///
/// The check projects the previous beacon's position forward at the previous
/// beacon's velocity and accepts the new claim if it lands within a fixed
/// tolerance radius. Acceleration and legitimate abrupt maneuvers are not
/// modeled, so a misbehavior verdict is a heuristic, not proof.
///
/// The evaluator only renders the verdict; reporting the accused to the
/// revocation authority is the orchestrator's job.
#[derive(Debug, Clone)]
pub struct TrustEvaluator {
    acceptable_variance: f64,
}

impl TrustEvaluator {
    pub fn new(acceptable_variance: f64) -> Self {
        Self {
            acceptable_variance,
        }
    }

    /// Judges `incoming` against the previously cached beacon, if any.
    pub fn evaluate(
        &self,
        previous: Option<&BeaconMessage>,
        incoming: &BeaconMessage,
    ) -> TrustVerdict {
        let Some(previous) = previous else {
            return TrustVerdict::FirstSighting;
        };

        let dt_secs = (incoming.timestamp_ms as f64 - previous.timestamp_ms as f64) / 1000.0;
        let predicted = previous
            .position
            .predicted_next(&previous.velocity, dt_secs);
        let deviation = predicted.distance(&incoming.position);

        if deviation <= self.acceptable_variance {
            TrustVerdict::Trusted
        } else {
            TrustVerdict::Misbehavior { deviation }
        }
    }
}
