//! The vehicle orchestrator: periodic ticks plus the inbound-beacon pipeline.
//!
//! Three independently-scheduled activities and one reactive pipeline share
//! one vehicle's state:
//!
//! 1. **Motion+beacon tick**: advance position (unless frozen by danger),
//!    sign and broadcast a beacon
//! 2. **Route-affinity tick**: re-bind to the nearest relay when it changes
//! 3. **Inbound pipeline**: verify, revocation gate, trust, danger, vicinity
//!    update, per received beacon
//! 4. **Danger auto-clear**: one-shot waiter re-armed per proximity alarm
//!
//! All state mutation is serialized through a single mutex; no remote call
//! ever runs under it. Remote results are re-applied under the lock
//! afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::SigningKey;
use tracing::{debug, error, info, warn};
use vanet_env::{
    EnvError, NodeId, RelayAuthority, RelayId, SignedEnvelope, VanetTransport, VehicleContext,
};

use crate::beacon::{
    BeaconMessage, Identity, RevocationQuery, RevocationReport, SignedBeacon, SignedQuery,
    SignedReport,
};
use crate::config::VehicleConfig;
use crate::danger::DangerMonitor;
use crate::error::VehicleError;
use crate::geometry::PositionVector;
use crate::revocation::RevocationCache;
use crate::trust::{TrustEvaluator, TrustVerdict};
use crate::vicinity::VicinityCache;

/// How the inbound pipeline disposed of a received beacon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeaconDisposition {
    /// Envelope did not deserialize into a signed beacon
    Malformed,

    /// Signature check failed
    BadSignature,

    /// Sender is revoked (locally cached or confirmed by the authority);
    /// dropped before any trust check
    RevokedSender,

    /// Beacon ran the full pipeline
    Processed {
        verdict: TrustVerdict,
        dangerous: bool,
    },
}

/// Mutable vehicle state: the single mutual-exclusion domain.
struct VehicleState {
    position: PositionVector,
    velocity: PositionVector,
    /// Monotonic instant of the previous motion tick
    last_motion: std::time::Duration,
    danger: DangerMonitor,
    vicinity: VicinityCache,
    revoked: RevocationCache,
}

struct RelayBinding {
    id: RelayId,
    authority: Arc<dyn RelayAuthority>,
}

/// A single vehicular network node.
pub struct Vehicle<Ctx: VehicleContext> {
    node_id: NodeId,
    identity: Identity,
    signing_key: SigningKey,
    config: VehicleConfig,
    trust: TrustEvaluator,
    ctx: Arc<Ctx>,
    vanet: Arc<dyn VanetTransport>,
    relay: Mutex<Option<RelayBinding>>,
    /// Shared with danger-clear waiters, hence the Arc
    state: Arc<Mutex<VehicleState>>,
    available: AtomicBool,
}

impl<Ctx: VehicleContext> Vehicle<Ctx> {
    pub fn new(
        node_id: NodeId,
        ctx: Arc<Ctx>,
        vanet: Arc<dyn VanetTransport>,
        signing_key: SigningKey,
        position: PositionVector,
        velocity: PositionVector,
        config: VehicleConfig,
    ) -> Self {
        let identity = Identity::from(&signing_key.verifying_key());
        let state = VehicleState {
            position,
            velocity,
            last_motion: ctx.now(),
            danger: DangerMonitor::new(config.danger_radius, config.danger_reset_interval),
            vicinity: VicinityCache::new(config.vicinity_ttl),
            revoked: RevocationCache::new(),
        };
        Self {
            node_id,
            identity,
            trust: TrustEvaluator::new(config.acceptable_variance),
            signing_key,
            config,
            ctx,
            vanet,
            relay: Mutex::new(None),
            state: Arc::new(Mutex::new(state)),
            available: AtomicBool::new(true),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn position(&self) -> PositionVector {
        self.state.lock().unwrap().position
    }

    pub fn velocity(&self) -> PositionVector {
        self.state.lock().unwrap().velocity
    }

    /// Steers the vehicle; takes effect from the next motion tick.
    pub fn set_velocity(&self, velocity: PositionVector) {
        self.state.lock().unwrap().velocity = velocity;
    }

    pub fn in_danger(&self) -> bool {
        self.state.lock().unwrap().danger.in_danger()
    }

    /// Peers with a still-valid vicinity entry (expired stragglers included).
    pub fn vicinity_len(&self) -> usize {
        self.state.lock().unwrap().vicinity.len()
    }

    /// Latest cached beacon from `id`, if still within its TTL.
    pub fn last_beacon_from(&self, id: &Identity) -> Option<BeaconMessage> {
        let now_ms = unix_millis(self.ctx.system_time());
        self.state.lock().unwrap().vicinity.get(id, now_ms).cloned()
    }

    pub fn is_revoked_locally(&self, id: &Identity) -> bool {
        self.state.lock().unwrap().revoked.contains(id)
    }

    /// False once a remote collaborator failed through the retry policy.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn relay_id(&self) -> Option<RelayId> {
        self.relay.lock().unwrap().as_ref().map(|b| b.id.clone())
    }

    /// Binds the nearest relay and launches the periodic activities.
    ///
    /// The first beacon fires after the warm-up delay, then every beacon
    /// interval; the route-affinity check runs on its own period. Either
    /// loop stops and marks the vehicle unavailable when a remote
    /// collaborator stays down through the retry policy.
    pub async fn start(self: Arc<Self>) -> Result<(), VehicleError> {
        self.bind_nearest_relay().await?;

        let beacon_loop = {
            let vehicle = Arc::clone(&self);
            async move {
                vehicle.ctx.sleep(vehicle.config.warmup_delay).await;
                loop {
                    if let Err(e) = vehicle.beacon_tick().await {
                        error!(vehicle = %vehicle.config.name, error = %e, "beacon tick failed");
                        vehicle.available.store(false, Ordering::SeqCst);
                        break;
                    }
                    vehicle.ctx.sleep(vehicle.config.beacon_interval).await;
                }
            }
        };
        self.ctx.spawn("beacon-loop", beacon_loop);

        let relay_loop = {
            let vehicle = Arc::clone(&self);
            async move {
                vehicle.ctx.sleep(vehicle.config.warmup_delay).await;
                loop {
                    if let Err(e) = vehicle.relay_tick().await {
                        error!(vehicle = %vehicle.config.name, error = %e, "relay check failed");
                        vehicle.available.store(false, Ordering::SeqCst);
                        break;
                    }
                    vehicle.ctx.sleep(vehicle.config.relay_check_interval).await;
                }
            }
        };
        self.ctx.spawn("relay-loop", relay_loop);

        Ok(())
    }

    /// One motion+beacon tick: advance position by the wall-clock delta
    /// since the previous tick (unless frozen by danger), then sign and
    /// broadcast the current state.
    pub async fn beacon_tick(&self) -> Result<(), VehicleError> {
        let now = self.ctx.now();
        let timestamp_ms = unix_millis(self.ctx.system_time());

        let beacon = {
            let mut state = self.state.lock().unwrap();
            let dt_secs = now.saturating_sub(state.last_motion).as_secs_f64();
            if state.danger.in_danger() {
                debug!(vehicle = %self.config.name, "in danger, position frozen");
            } else {
                let velocity = state.velocity;
                state.position.advance(&velocity, dt_secs);
            }
            // Lazy deadline clear after the motion decision: the tick that
            // clears still reports the frozen position; motion resumes from
            // there on the next tick
            state.danger.refresh(now);
            state.last_motion = now;
            BeaconMessage {
                position: state.position,
                velocity: state.velocity,
                timestamp_ms,
                sender: self.identity,
            }
        };

        let envelope = SignedBeacon::new(beacon, &self.signing_key)?.to_envelope(timestamp_ms)?;
        self.with_retry("beacon broadcast", || {
            self.vanet.broadcast(self.node_id, envelope.clone())
        })
        .await?;
        debug!(vehicle = %self.config.name, "beacon broadcast");
        Ok(())
    }

    /// One route-affinity tick: look up the nearest relay and re-bind when
    /// the assignment changed. "No relay in range" logs and keeps the
    /// current binding.
    pub async fn relay_tick(&self) -> Result<(), VehicleError> {
        let position = self.position();
        let nearest = self
            .with_retry("relay lookup", || {
                self.vanet.nearest_relay(position.x(), position.y())
            })
            .await?;
        let Some(nearest) = nearest else {
            warn!(vehicle = %self.config.name, "no relay in range");
            return Ok(());
        };

        let current = self.relay.lock().unwrap().as_ref().map(|b| b.id.clone());
        if current.as_ref() == Some(&nearest) {
            return Ok(());
        }

        let authority = self
            .with_retry("relay connect", || self.vanet.connect(&nearest))
            .await?;
        info!(vehicle = %self.config.name, relay = %nearest, "binding relay");
        *self.relay.lock().unwrap() = Some(RelayBinding {
            id: nearest,
            authority,
        });
        Ok(())
    }

    /// Initial relay binding; returns false when none is in range.
    pub async fn bind_nearest_relay(&self) -> Result<bool, VehicleError> {
        self.relay_tick().await?;
        Ok(self.relay.lock().unwrap().is_some())
    }

    /// Inbound-beacon pipeline.
    ///
    /// Verify signature → revocation gate → trust verdict → danger check →
    /// vicinity update. The vicinity is updated regardless of the trust
    /// outcome so a single bad beacon cannot wedge future comparisons; the
    /// distrusted beacon becomes the next baseline.
    pub async fn handle_beacon(
        &self,
        envelope: SignedEnvelope,
    ) -> Result<BeaconDisposition, VehicleError> {
        let signed = match SignedBeacon::from_envelope(&envelope) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(vehicle = %self.config.name, error = %e, "dropping malformed beacon");
                return Ok(BeaconDisposition::Malformed);
            }
        };
        if let Err(e) = signed.verify() {
            warn!(vehicle = %self.config.name, error = %e, "dropping beacon with bad signature");
            return Ok(BeaconDisposition::BadSignature);
        }
        let beacon = signed.beacon;
        let sender = beacon.sender;

        if self.is_revoked(sender).await? {
            debug!(vehicle = %self.config.name, sender = %sender, "dropping beacon from revoked sender");
            return Ok(BeaconDisposition::RevokedSender);
        }

        let now = self.ctx.now();
        let now_ms = unix_millis(self.ctx.system_time());

        // State transition under the lock; remote follow-ups afterwards.
        let (verdict, dangerous, clear_generation) = {
            let mut state = self.state.lock().unwrap();
            let previous = state.vicinity.get(&sender, now_ms).cloned();
            let verdict = self.trust.evaluate(previous.as_ref(), &beacon);

            let dangerous = state.danger.is_dangerous(&state.position, &beacon.position);
            let clear_generation = dangerous.then(|| state.danger.arm(now));

            if verdict.is_misbehavior() {
                // Optimistic local block, ahead of authority confirmation
                state.revoked.insert(sender);
            }
            state.vicinity.update(beacon, now_ms);
            (verdict, dangerous, clear_generation)
        };

        if let Some(generation) = clear_generation {
            warn!(vehicle = %self.config.name, sender = %sender, "proximity alert, freezing");
            self.spawn_danger_clear(generation);
        }

        if let TrustVerdict::Misbehavior { deviation } = verdict {
            warn!(
                vehicle = %self.config.name,
                sender = %sender,
                deviation,
                "beacon data implausible, reporting for revocation"
            );
            self.submit_revocation_report(sender).await?;
        }

        Ok(BeaconDisposition::Processed { verdict, dangerous })
    }

    /// Local revocation cache with authority fallback.
    ///
    /// A local hit answers immediately. On a miss the bound relay is asked
    /// (outside the state lock); a positive is cached, a negative never is.
    /// Authority failure propagates; it is never treated as "not revoked".
    pub async fn is_revoked(&self, subject: Identity) -> Result<bool, VehicleError> {
        if self.state.lock().unwrap().revoked.contains(&subject) {
            return Ok(true);
        }

        let authority = self.authority()?;
        let query = SignedQuery::new(
            RevocationQuery {
                subject,
                requester: self.identity,
            },
            &self.signing_key,
        )?;
        let envelope = query.to_envelope(unix_millis(self.ctx.system_time()))?;
        let revoked = self
            .with_retry("revocation query", || authority.is_revoked(envelope.clone()))
            .await?;
        if revoked {
            self.state.lock().unwrap().revoked.insert(subject);
        }
        Ok(revoked)
    }

    /// Optimistic local block without waiting for authority confirmation.
    pub fn mark_revoked_locally(&self, subject: Identity) -> bool {
        self.state.lock().unwrap().revoked.insert(subject)
    }

    async fn submit_revocation_report(&self, accused: Identity) -> Result<(), VehicleError> {
        let authority = self.authority()?;
        let report = SignedReport::new(
            RevocationReport {
                accused,
                accuser: self.identity,
            },
            &self.signing_key,
        )?;
        let envelope = report.to_envelope(unix_millis(self.ctx.system_time()))?;
        self.with_retry("revocation report", || authority.try_revoke(envelope.clone()))
            .await
    }

    fn authority(&self) -> Result<Arc<dyn RelayAuthority>, VehicleError> {
        self.relay
            .lock()
            .unwrap()
            .as_ref()
            .map(|b| Arc::clone(&b.authority))
            .ok_or(VehicleError::NoRelay)
    }

    /// One-shot auto-clear waiter for the latest danger arm. A waiter whose
    /// arm was superseded finds a newer generation and does nothing; the
    /// motion tick's deadline refresh covers driven schedulers.
    fn spawn_danger_clear(&self, generation: u64) {
        let ctx = Arc::clone(&self.ctx);
        let state = Arc::clone(&self.state);
        let name = self.config.name.clone();
        let interval = self.config.danger_reset_interval;
        self.ctx.spawn("danger-clear", async move {
            ctx.sleep(interval).await;
            let cleared = state.lock().unwrap().danger.try_clear(generation);
            if cleared {
                info!(vehicle = %name, "danger cleared");
            }
        });
    }

    /// Runs a remote call with a bounded timeout and linear-backoff retry.
    ///
    /// Each attempt races the call against the configured timeout; after the
    /// last failure the vehicle is reported unavailable via
    /// [`VehicleError::Unavailable`].
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, VehicleError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, EnvError>>,
    {
        let mut last = None;
        for attempt in 1..=self.config.remote_attempts {
            let outcome = tokio::select! {
                res = call() => res,
                _ = self.ctx.sleep(self.config.remote_timeout) => {
                    Err(EnvError::Timeout(self.config.remote_timeout.as_millis() as u64))
                }
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(vehicle = %self.config.name, op, attempt, error = %e, "remote call failed");
                    last = Some(e);
                    if attempt < self.config.remote_attempts {
                        self.ctx.sleep(self.config.retry_backoff * attempt).await;
                    }
                }
            }
        }
        Err(VehicleError::Unavailable {
            op,
            attempts: self.config.remote_attempts,
            source: last.unwrap_or_else(|| EnvError::network("no attempts made")),
        })
    }
}

fn unix_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Manually-driven clock for deterministic vehicle tests.
    struct TestContext {
        clock: Mutex<Duration>,
        epoch: SystemTime,
    }

    impl TestContext {
        fn shared() -> Arc<Self> {
            Arc::new(Self {
                clock: Mutex::new(Duration::ZERO),
                epoch: UNIX_EPOCH + Duration::from_secs(1_704_067_200),
            })
        }

        fn advance(&self, d: Duration) {
            *self.clock.lock().unwrap() += d;
        }
    }

    #[async_trait]
    impl VehicleContext for TestContext {
        fn now(&self) -> Duration {
            *self.clock.lock().unwrap()
        }

        fn system_time(&self) -> SystemTime {
            self.epoch + self.now()
        }

        async fn sleep(&self, duration: Duration) {
            // Completes only once the test advances the clock
            let target = self.now() + duration;
            while self.now() < target {
                tokio::task::yield_now().await;
            }
        }

        fn spawn<F>(&self, _name: &str, future: F)
        where
            F: std::future::Future<Output = ()> + Send + 'static,
        {
            tokio::spawn(future);
        }

        fn derive_signing_key(&self, seed_extension: u64) -> SigningKey {
            let mut bytes = [7u8; 32];
            bytes[..8].copy_from_slice(&seed_extension.to_le_bytes());
            SigningKey::from_bytes(&bytes)
        }

        fn seed(&self) -> u64 {
            0
        }
    }

    /// In-memory relay authority recording reports and queries.
    #[derive(Default)]
    struct StubRelay {
        revoked: Mutex<HashSet<Identity>>,
        reports: Mutex<Vec<RevocationReport>>,
        queries: Mutex<Vec<Identity>>,
    }

    #[async_trait]
    impl RelayAuthority for StubRelay {
        async fn try_revoke(&self, report: SignedEnvelope) -> Result<(), EnvError> {
            let signed = SignedReport::from_envelope(&report)
                .map_err(|e| EnvError::SerializationError(e.to_string()))?;
            signed
                .verify()
                .map_err(|e| EnvError::network(e.to_string()))?;
            self.reports.lock().unwrap().push(signed.report);
            self.revoked.lock().unwrap().insert(signed.report.accused);
            Ok(())
        }

        async fn is_revoked(&self, query: SignedEnvelope) -> Result<bool, EnvError> {
            let signed = SignedQuery::from_envelope(&query)
                .map_err(|e| EnvError::SerializationError(e.to_string()))?;
            signed
                .verify()
                .map_err(|e| EnvError::network(e.to_string()))?;
            self.queries.lock().unwrap().push(signed.query.subject);
            Ok(self.revoked.lock().unwrap().contains(&signed.query.subject))
        }
    }

    impl StubRelay {
        fn query_count(&self, id: &Identity) -> usize {
            self.queries.lock().unwrap().iter().filter(|q| *q == id).count()
        }
    }

    struct StubVanet {
        relay: Arc<StubRelay>,
        relay_id: Mutex<RelayId>,
        broadcasts: Mutex<Vec<SignedEnvelope>>,
        fail_broadcast: AtomicBool,
    }

    impl StubVanet {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                relay: Arc::new(StubRelay::default()),
                relay_id: Mutex::new(RelayId::new("relay-alpha")),
                broadcasts: Mutex::new(Vec::new()),
                fail_broadcast: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl VanetTransport for StubVanet {
        async fn broadcast(&self, _sender: NodeId, envelope: SignedEnvelope) -> Result<(), EnvError> {
            if self.fail_broadcast.load(Ordering::SeqCst) {
                return Err(EnvError::network("vanet down"));
            }
            self.broadcasts.lock().unwrap().push(envelope);
            Ok(())
        }

        async fn nearest_relay(&self, _x: f64, _y: f64) -> Result<Option<RelayId>, EnvError> {
            Ok(Some(self.relay_id.lock().unwrap().clone()))
        }

        async fn connect(&self, _relay: &RelayId) -> Result<Arc<dyn RelayAuthority>, EnvError> {
            Ok(Arc::clone(&self.relay) as Arc<dyn RelayAuthority>)
        }
    }

    fn test_config() -> VehicleConfig {
        VehicleConfig {
            // Failures should not spin the retry loop in tests
            remote_attempts: 1,
            ..VehicleConfig::default()
        }
    }

    async fn test_vehicle(
        ctx: &Arc<TestContext>,
        vanet: &Arc<StubVanet>,
        seed: u64,
        position: PositionVector,
        velocity: PositionVector,
    ) -> Arc<Vehicle<TestContext>> {
        let vehicle = Arc::new(Vehicle::new(
            NodeId::from_seed(seed),
            Arc::clone(ctx),
            Arc::clone(vanet) as Arc<dyn VanetTransport>,
            ctx.derive_signing_key(seed),
            position,
            velocity,
            test_config(),
        ));
        vehicle.bind_nearest_relay().await.unwrap();
        vehicle
    }

    fn peer_beacon(
        ctx: &TestContext,
        key: &SigningKey,
        position: PositionVector,
        velocity: PositionVector,
    ) -> SignedEnvelope {
        let timestamp_ms = unix_millis(ctx.system_time());
        let beacon = BeaconMessage {
            position,
            velocity,
            timestamp_ms,
            sender: Identity::from(&key.verifying_key()),
        };
        SignedBeacon::new(beacon, key)
            .unwrap()
            .to_envelope(timestamp_ms)
            .unwrap()
    }

    #[tokio::test]
    async fn test_beacon_tick_moves_and_broadcasts() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(10.0, 0.0),
        )
        .await;

        ctx.advance(Duration::from_secs(1));
        vehicle.beacon_tick().await.unwrap();

        let pos = vehicle.position();
        assert!((pos.x() - 10.0).abs() < 1e-9);
        assert!((pos.y() - 0.0).abs() < 1e-9);

        let broadcasts = vanet.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        let signed = SignedBeacon::from_envelope(&broadcasts[0]).unwrap();
        assert!(signed.verify().is_ok());
        assert_eq!(signed.beacon.sender, vehicle.identity());
    }

    #[tokio::test]
    async fn test_danger_freeze_and_resume() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(10.0, 0.0),
        )
        .await;
        let peer_key = ctx.derive_signing_key(2);

        // Peer at distance 3 raises the danger flag
        let envelope = peer_beacon(
            &ctx,
            &peer_key,
            PositionVector::new(3.0, 0.0),
            PositionVector::new(0.0, 0.0),
        );
        let disposition = vehicle.handle_beacon(envelope).await.unwrap();
        assert!(matches!(
            disposition,
            BeaconDisposition::Processed { dangerous: true, .. }
        ));
        assert!(vehicle.in_danger());

        // Frozen: a motion tick does not move the vehicle
        ctx.advance(Duration::from_secs(1));
        vehicle.beacon_tick().await.unwrap();
        assert!((vehicle.position().x() - 0.0).abs() < 1e-9);

        // After the reset interval the flag drops and motion resumes from
        // the frozen position, not from where it would have been
        ctx.advance(Duration::from_secs(3));
        vehicle.beacon_tick().await.unwrap();
        assert!(!vehicle.in_danger());

        ctx.advance(Duration::from_secs(1));
        vehicle.beacon_tick().await.unwrap();
        assert!((vehicle.position().x() - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rearm_has_no_spurious_clear_between_alarms() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(0.0, 0.0),
        )
        .await;
        let peer_key = ctx.derive_signing_key(2);

        let close = PositionVector::new(2.0, 0.0);
        let still = PositionVector::new(0.0, 0.0);

        vehicle
            .handle_beacon(peer_beacon(&ctx, &peer_key, close, still))
            .await
            .unwrap();

        // Second alarm 2s later, inside the 3s reset interval
        ctx.advance(Duration::from_secs(2));
        vehicle
            .handle_beacon(peer_beacon(&ctx, &peer_key, close, still))
            .await
            .unwrap();

        // 1.5s on, past the first alarm's deadline: still in danger
        ctx.advance(Duration::from_millis(1_500));
        vehicle.beacon_tick().await.unwrap();
        assert!(vehicle.in_danger());

        // Past the replacement deadline: cleared
        ctx.advance(Duration::from_millis(1_600));
        vehicle.beacon_tick().await.unwrap();
        assert!(!vehicle.in_danger());
    }

    #[tokio::test]
    async fn test_falsified_position_is_reported_and_sender_blocked() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(0.0, 0.0),
        )
        .await;
        let peer_key = ctx.derive_signing_key(2);
        let peer_id = Identity::from(&peer_key.verifying_key());

        // Truthful first sighting: peer at (100, 0) heading (10, 0)
        let disposition = vehicle
            .handle_beacon(peer_beacon(
                &ctx,
                &peer_key,
                PositionVector::new(100.0, 0.0),
                PositionVector::new(10.0, 0.0),
            ))
            .await
            .unwrap();
        assert_eq!(
            disposition,
            BeaconDisposition::Processed {
                verdict: TrustVerdict::FirstSighting,
                dangerous: false
            }
        );

        // One second later the peer claims (95, 40); physics says ~(110, 0)
        ctx.advance(Duration::from_secs(1));
        let disposition = vehicle
            .handle_beacon(peer_beacon(
                &ctx,
                &peer_key,
                PositionVector::new(95.0, 40.0),
                PositionVector::new(10.0, 0.0),
            ))
            .await
            .unwrap();
        match disposition {
            BeaconDisposition::Processed { verdict, .. } => assert!(verdict.is_misbehavior()),
            other => panic!("expected processed misbehavior, got {:?}", other),
        }

        // Reported to the authority and blocked locally
        let reports = vanet.relay.reports.lock().unwrap().clone();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].accused, peer_id);
        assert_eq!(reports[0].accuser, vehicle.identity());
        assert!(vehicle.is_revoked_locally(&peer_id));

        // The distrusted beacon still became the comparison baseline
        let cached = vehicle.last_beacon_from(&peer_id).unwrap();
        assert!((cached.position.x() - 95.0).abs() < 1e-9);

        // A further beacon is dropped without a trust check or remote query
        let queries_before = vanet.relay.query_count(&peer_id);
        ctx.advance(Duration::from_secs(1));
        let disposition = vehicle
            .handle_beacon(peer_beacon(
                &ctx,
                &peer_key,
                PositionVector::new(105.0, 0.0),
                PositionVector::new(10.0, 0.0),
            ))
            .await
            .unwrap();
        assert_eq!(disposition, BeaconDisposition::RevokedSender);
        assert_eq!(vanet.relay.query_count(&peer_id), queries_before);
    }

    #[tokio::test]
    async fn test_negative_revocation_results_are_not_cached() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(0.0, 0.0),
        )
        .await;
        let peer_id = Identity::from(&ctx.derive_signing_key(2).verifying_key());

        // Clean identity: every check goes back to the authority
        assert!(!vehicle.is_revoked(peer_id).await.unwrap());
        assert!(!vehicle.is_revoked(peer_id).await.unwrap());
        assert_eq!(vanet.relay.query_count(&peer_id), 2);

        // Once the authority says revoked, the positive is cached
        vanet.relay.revoked.lock().unwrap().insert(peer_id);
        assert!(vehicle.is_revoked(peer_id).await.unwrap());
        assert_eq!(vanet.relay.query_count(&peer_id), 3);

        assert!(vehicle.is_revoked(peer_id).await.unwrap());
        assert_eq!(vanet.relay.query_count(&peer_id), 3);
    }

    #[tokio::test]
    async fn test_local_mark_skips_the_authority() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(0.0, 0.0),
        )
        .await;
        let peer_id = Identity::from(&ctx.derive_signing_key(2).verifying_key());

        assert!(vehicle.mark_revoked_locally(peer_id));
        assert!(vehicle.is_revoked(peer_id).await.unwrap());
        // Answered from the local cache, no query went out
        assert_eq!(vanet.relay.query_count(&peer_id), 0);
    }

    #[tokio::test]
    async fn test_bad_signature_is_dropped() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(0.0, 0.0),
        )
        .await;
        let peer_key = ctx.derive_signing_key(2);

        let mut envelope = peer_beacon(
            &ctx,
            &peer_key,
            PositionVector::new(50.0, 0.0),
            PositionVector::new(0.0, 0.0),
        );
        // Tamper with the claimed position inside the payload
        let mut signed = SignedBeacon::from_envelope(&envelope).unwrap();
        signed.beacon.position = PositionVector::new(0.0, 0.0);
        envelope.payload = serde_json::to_vec(&signed).unwrap();

        let disposition = vehicle.handle_beacon(envelope).await.unwrap();
        assert_eq!(disposition, BeaconDisposition::BadSignature);
        assert_eq!(vehicle.vicinity_len(), 0);
    }

    #[tokio::test]
    async fn test_relay_handover() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(0.0, 0.0),
        )
        .await;
        assert_eq!(vehicle.relay_id().unwrap().as_str(), "relay-alpha");

        // Nearest relay changes; the next route-affinity tick re-binds
        *vanet.relay_id.lock().unwrap() = RelayId::new("relay-beta");
        vehicle.relay_tick().await.unwrap();
        assert_eq!(vehicle.relay_id().unwrap().as_str(), "relay-beta");
    }

    #[tokio::test]
    async fn test_broadcast_failure_reports_unavailable() {
        let ctx = TestContext::shared();
        let vanet = StubVanet::new();
        let vehicle = test_vehicle(
            &ctx,
            &vanet,
            1,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(10.0, 0.0),
        )
        .await;

        vanet.fail_broadcast.store(true, Ordering::SeqCst);
        ctx.advance(Duration::from_secs(1));
        let err = vehicle.beacon_tick().await.unwrap_err();
        assert!(matches!(
            err,
            VehicleError::Unavailable {
                op: "beacon broadcast",
                ..
            }
        ));
    }
}
