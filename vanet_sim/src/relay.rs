//! In-memory roadside relay authority with fault injection.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};
use vanet_core::beacon::{Identity, RevocationReport, SignedQuery, SignedReport};
use vanet_env::{EnvError, RelayAuthority, RelayId, SignedEnvelope};

/// A simulated roadside relay backed by in-memory revocation state.
///
/// Signed reports and queries are verified the way a real authority would
/// before anything is recorded. Queries are counted per subject so tests
/// can pin the caching contract: a subject already known revoked by the
/// vehicle must never be asked about again, while a clean subject is asked
/// about every time.
pub struct SimRelay {
    id: RelayId,
    x: f64,
    y: f64,
    revoked: Mutex<HashSet<Identity>>,
    reports: Mutex<Vec<RevocationReport>>,
    query_counts: Mutex<HashMap<Identity, usize>>,
    /// While set, every call fails as unreachable
    failing: AtomicBool,
}

impl SimRelay {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: RelayId::new(id),
            x,
            y,
            revoked: Mutex::new(HashSet::new()),
            reports: Mutex::new(Vec::new()),
            query_counts: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &RelayId {
        &self.id
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Seeds an authority-side revocation without a report.
    pub fn revoke(&self, id: Identity) {
        self.revoked.lock().unwrap().insert(id);
    }

    pub fn is_locally_revoked(&self, id: &Identity) -> bool {
        self.revoked.lock().unwrap().contains(id)
    }

    /// Reports received so far, in arrival order.
    pub fn reports(&self) -> Vec<RevocationReport> {
        self.reports.lock().unwrap().clone()
    }

    /// How many revocation queries have asked about `id`.
    pub fn query_count(&self, id: &Identity) -> usize {
        self.query_counts.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    /// Fault injection: while failing, every call errors as unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), EnvError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EnvError::unreachable(format!("relay {} is down", self.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayAuthority for SimRelay {
    async fn try_revoke(&self, report: SignedEnvelope) -> Result<(), EnvError> {
        self.check_reachable()?;
        let signed = SignedReport::from_envelope(&report)
            .map_err(|e| EnvError::SerializationError(e.to_string()))?;
        signed
            .verify()
            .map_err(|e| EnvError::network(format!("rejected report: {}", e)))?;

        info!(
            relay = %self.id,
            accused = %signed.report.accused,
            accuser = %signed.report.accuser,
            "revocation report accepted"
        );
        self.reports.lock().unwrap().push(signed.report);
        self.revoked.lock().unwrap().insert(signed.report.accused);
        Ok(())
    }

    async fn is_revoked(&self, query: SignedEnvelope) -> Result<bool, EnvError> {
        self.check_reachable()?;
        let signed = SignedQuery::from_envelope(&query)
            .map_err(|e| EnvError::SerializationError(e.to_string()))?;
        signed
            .verify()
            .map_err(|e| EnvError::network(format!("rejected query: {}", e)))?;

        let subject = signed.query.subject;
        *self.query_counts.lock().unwrap().entry(subject).or_insert(0) += 1;
        let revoked = self.revoked.lock().unwrap().contains(&subject);
        debug!(relay = %self.id, subject = %subject, revoked, "revocation query");
        Ok(revoked)
    }
}
