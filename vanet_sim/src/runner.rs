//! Scenario runner: builds a world, drives the virtual clock, checks outcomes.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use ed25519_dalek::SigningKey;
use tracing::{debug, info};
use vanet_core::beacon::{BeaconMessage, Identity, SignedBeacon};
use vanet_core::{PositionVector, Vehicle, VehicleConfig};
use vanet_env::{NodeId, VanetTransport, VehicleContext};

use crate::context::SimContext;
use crate::network::SimVanet;
use crate::relay::SimRelay;
use crate::scenarios::ScenarioId;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario passed all assertions
    pub passed: bool,

    /// Clock steps executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

/// Runs deterministic traffic scenarios.
///
/// The clock advances in fixed steps; after each step the runner yields
/// until the spawned vehicle loops have caught up with the new time. The
/// same seed therefore replays the same interleaving.
pub struct ScenarioRunner {
    seed: u64,
    num_vehicles: usize,
    step: Duration,
    max_duration_secs: f64,
}

impl ScenarioRunner {
    pub fn new(seed: u64, num_vehicles: usize) -> Self {
        Self {
            seed,
            num_vehicles: num_vehicles.max(2),
            step: Duration::from_millis(250),
            max_duration_secs: 10.0,
        }
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        match scenario {
            ScenarioId::Convoy => self.run_convoy().await,
            ScenarioId::Falsifier => self.run_falsifier().await,
            ScenarioId::Tailgate => self.run_tailgate().await,
            ScenarioId::Handover => self.run_handover().await,
        }
    }

    /// Honest convoy: vehicles spaced well apart, all driving east at the
    /// same speed. Every truthful beacon must verify and land in every
    /// peer's vicinity; nobody trips the danger flag or gets reported.
    async fn run_convoy(&self) -> ScenarioResult {
        let ctx = SimContext::shared(self.seed);
        let vanet = SimVanet::new(100_000.0);
        let relay = Arc::new(SimRelay::new("relay-alpha", 0.0, 0.0));
        vanet.add_relay(Arc::clone(&relay));

        let n = self.num_vehicles;
        let mut vehicles = Vec::with_capacity(n);
        let mut failures = Vec::new();
        for i in 0..n {
            // 50m spacing keeps everyone outside the 5m danger radius
            let position = PositionVector::new(i as f64 * 50.0, 0.0);
            let velocity = PositionVector::new(10.0, 0.0);
            match launch_vehicle(&ctx, &vanet, i as u64, position, velocity).await {
                Ok(vehicle) => vehicles.push(vehicle),
                Err(e) => failures.push(format!("vehicle {} failed to start: {}", i, e)),
            }
        }

        let ticks = self.drive(&ctx, self.max_duration_secs).await;

        for (i, vehicle) in vehicles.iter().enumerate() {
            if !vehicle.is_available() {
                failures.push(format!("vehicle {} became unavailable", i));
            }
            if vehicle.in_danger() {
                failures.push(format!("vehicle {} tripped the danger flag", i));
            }
            if vehicle.vicinity_len() != n - 1 {
                failures.push(format!(
                    "vehicle {} sees {} peers, expected {}",
                    i,
                    vehicle.vicinity_len(),
                    n - 1
                ));
            }
            // Ticks start after the warm-up delay; demand clear forward motion
            let expected_min = i as f64 * 50.0 + 10.0 * (self.max_duration_secs - 4.0);
            if vehicle.position().x() < expected_min {
                failures.push(format!(
                    "vehicle {} barely moved: x={:.1}",
                    i,
                    vehicle.position().x()
                ));
            }
        }
        if !relay.reports().is_empty() {
            failures.push(format!(
                "honest convoy produced {} revocation reports",
                relay.reports().len()
            ));
        }

        self.result(ScenarioId::Convoy, &ctx, ticks, failures)
    }

    /// Position spoofing: a non-cooperating sender beacons truthfully once,
    /// then claims a position far from where physics puts it. Every observer
    /// must flag the misbehavior, report it, and drop the sender afterwards
    /// without asking the relay again.
    async fn run_falsifier(&self) -> ScenarioResult {
        let ctx = SimContext::shared(self.seed);
        let vanet = SimVanet::new(100_000.0);
        let relay = Arc::new(SimRelay::new("relay-alpha", 0.0, 0.0));
        vanet.add_relay(Arc::clone(&relay));

        let n = self.num_vehicles;
        let mut vehicles = Vec::with_capacity(n);
        let mut failures = Vec::new();
        for i in 0..n {
            // Parked observers, spaced outside the danger radius
            let position = PositionVector::new(i as f64 * -50.0, 0.0);
            match launch_vehicle(&ctx, &vanet, i as u64, position, PositionVector::new(0.0, 0.0))
                .await
            {
                Ok(vehicle) => vehicles.push(vehicle),
                Err(e) => failures.push(format!("vehicle {} failed to start: {}", i, e)),
            }
        }

        let falsifier_key = ctx.derive_signing_key(1_000);
        let falsifier_id = Identity::from(&falsifier_key.verifying_key());
        let falsifier_node = NodeId::from_seed(999);

        // Truthful first sighting: (100, 0) heading east at 10 m/s
        self.drive(&ctx, 2.5).await;
        broadcast_beacon(
            &ctx,
            &vanet,
            falsifier_node,
            &falsifier_key,
            PositionVector::new(100.0, 0.0),
            PositionVector::new(10.0, 0.0),
        )
        .await;
        settle().await;

        // One second on, physics says ~(110, 0); the falsifier claims (95, 40)
        self.drive(&ctx, 1.0).await;
        broadcast_beacon(
            &ctx,
            &vanet,
            falsifier_node,
            &falsifier_key,
            PositionVector::new(95.0, 40.0),
            PositionVector::new(10.0, 0.0),
        )
        .await;
        settle().await;

        let reports = relay.reports();
        if reports.is_empty() {
            failures.push("no revocation report reached the relay".to_string());
        }
        for report in &reports {
            if report.accused != falsifier_id {
                failures.push(format!("report accuses {} instead", report.accused));
            }
        }
        if !relay.is_locally_revoked(&falsifier_id) {
            failures.push("relay did not revoke the falsifier".to_string());
        }
        for (i, vehicle) in vehicles.iter().enumerate() {
            if !vehicle.is_revoked_locally(&falsifier_id) {
                failures.push(format!("vehicle {} did not block the falsifier", i));
            }
        }

        // A further beacon must be dropped on the cached positive alone
        let queries_before = relay.query_count(&falsifier_id);
        self.drive(&ctx, 1.0).await;
        broadcast_beacon(
            &ctx,
            &vanet,
            falsifier_node,
            &falsifier_key,
            PositionVector::new(105.0, 0.0),
            PositionVector::new(10.0, 0.0),
        )
        .await;
        settle().await;

        if relay.query_count(&falsifier_id) != queries_before {
            failures.push("a blocked sender was queried at the relay again".to_string());
        }
        for (i, vehicle) in vehicles.iter().enumerate() {
            if vehicle.last_beacon_from(&falsifier_id).map(|b| b.position.x()) == Some(105.0) {
                failures.push(format!("vehicle {} cached a post-revocation beacon", i));
            }
        }

        let ticks = (ctx.now().as_secs_f64() / self.step.as_secs_f64()) as u64;
        self.result(ScenarioId::Falsifier, &ctx, ticks, failures)
    }

    /// Proximity danger: a stationary tailgater appears right next to a
    /// moving vehicle. The vehicle must freeze, stay frozen across a
    /// re-arming second alarm, then clear and resume on its own once the
    /// alarms stop.
    async fn run_tailgate(&self) -> ScenarioResult {
        let ctx = SimContext::shared(self.seed);
        let vanet = SimVanet::new(100_000.0);
        vanet.add_relay(Arc::new(SimRelay::new("relay-alpha", 0.0, 0.0)));

        let mut failures = Vec::new();
        let vehicle = match launch_vehicle(
            &ctx,
            &vanet,
            0,
            PositionVector::new(0.0, 0.0),
            PositionVector::new(10.0, 0.0),
        )
        .await
        {
            Ok(vehicle) => vehicle,
            Err(e) => {
                failures.push(format!("vehicle failed to start: {}", e));
                return self.result(ScenarioId::Tailgate, &ctx, 0, failures);
            }
        };

        let tailgater_key = ctx.derive_signing_key(2_000);
        let tailgater_node = NodeId::from_seed(2_001);

        // Let the first motion tick land, then park a tailgater 3m ahead
        self.drive(&ctx, 2.5).await;
        let alarm_spot = PositionVector::new(vehicle.position().x() + 3.0, 0.0);
        broadcast_beacon(
            &ctx,
            &vanet,
            tailgater_node,
            &tailgater_key,
            alarm_spot,
            PositionVector::new(0.0, 0.0),
        )
        .await;
        settle().await;

        if !vehicle.in_danger() {
            failures.push("proximity alarm did not raise the danger flag".to_string());
        }
        let frozen_at = vehicle.position();

        // Frozen through the next motion tick
        self.drive(&ctx, 1.0).await;
        if vehicle.position() != frozen_at {
            failures.push("vehicle moved while in danger".to_string());
        }

        // Second alarm re-arms the clear; the first deadline must not fire
        broadcast_beacon(
            &ctx,
            &vanet,
            tailgater_node,
            &tailgater_key,
            alarm_spot,
            PositionVector::new(0.0, 0.0),
        )
        .await;
        settle().await;

        self.drive(&ctx, 2.0).await;
        if !vehicle.in_danger() {
            failures.push("danger cleared before the re-armed deadline".to_string());
        }

        // Silence: the re-armed deadline elapses and driving resumes
        self.drive(&ctx, 2.0).await;
        if vehicle.in_danger() {
            failures.push("danger never auto-cleared".to_string());
        }
        self.drive(&ctx, 2.0).await;
        if vehicle.position().x() <= frozen_at.x() {
            failures.push("vehicle did not resume after the all-clear".to_string());
        }
        if !vehicle.is_available() {
            failures.push("vehicle became unavailable".to_string());
        }

        let ticks = (ctx.now().as_secs_f64() / self.step.as_secs_f64()) as u64;
        self.result(ScenarioId::Tailgate, &ctx, ticks, failures)
    }

    /// Relay handover: a vehicle drives from one relay's coverage into
    /// another's. The periodic route-affinity check must re-bind.
    async fn run_handover(&self) -> ScenarioResult {
        let ctx = SimContext::shared(self.seed);
        // 600m coverage: alpha owns the start, beta the destination
        let vanet = SimVanet::new(600.0);
        vanet.add_relay(Arc::new(SimRelay::new("relay-alpha", 0.0, 0.0)));
        vanet.add_relay(Arc::new(SimRelay::new("relay-beta", 1_000.0, 0.0)));

        let mut failures = Vec::new();
        let vehicle = match launch_vehicle(
            &ctx,
            &vanet,
            0,
            PositionVector::new(300.0, 0.0),
            PositionVector::new(100.0, 0.0),
        )
        .await
        {
            Ok(vehicle) => vehicle,
            Err(e) => {
                failures.push(format!("vehicle failed to start: {}", e));
                return self.result(ScenarioId::Handover, &ctx, 0, failures);
            }
        };

        match vehicle.relay_id() {
            Some(relay) if relay.as_str() == "relay-alpha" => {}
            other => failures.push(format!("expected initial bind to relay-alpha, got {:?}", other)),
        }

        let ticks = self.drive(&ctx, self.max_duration_secs).await;

        match vehicle.relay_id() {
            Some(relay) if relay.as_str() == "relay-beta" => {}
            other => failures.push(format!("expected handover to relay-beta, got {:?}", other)),
        }
        if !vehicle.is_available() {
            failures.push("vehicle became unavailable".to_string());
        }

        self.result(ScenarioId::Handover, &ctx, ticks, failures)
    }

    /// Advances the clock in fixed steps for `secs` of virtual time,
    /// letting the spawned loops catch up after every step.
    async fn drive(&self, ctx: &Arc<SimContext>, secs: f64) -> u64 {
        let ticks = (secs / self.step.as_secs_f64()).ceil() as u64;
        for _ in 0..ticks {
            ctx.advance_time(self.step);
            settle().await;
        }
        debug!(time_secs = ctx.now().as_secs_f64(), "clock advanced");
        ticks
    }

    fn result(
        &self,
        scenario: ScenarioId,
        ctx: &Arc<SimContext>,
        total_ticks: u64,
        failures: Vec<String>,
    ) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failures.is_empty(),
            total_ticks,
            final_time_secs: ctx.now().as_secs_f64(),
            failure_reason: if failures.is_empty() {
                None
            } else {
                Some(failures.join("; "))
            },
        }
    }
}

/// Builds a vehicle, wires its inbox dispatch task, and starts its loops.
async fn launch_vehicle(
    ctx: &Arc<SimContext>,
    vanet: &Arc<SimVanet>,
    index: u64,
    position: PositionVector,
    velocity: PositionVector,
) -> Result<Arc<Vehicle<SimContext>>, vanet_core::VehicleError> {
    let node = NodeId::from_seed(index);
    let vehicle = Arc::new(Vehicle::new(
        node,
        Arc::clone(ctx),
        Arc::clone(vanet) as Arc<dyn VanetTransport>,
        ctx.derive_signing_key(index),
        position,
        velocity,
        VehicleConfig::named(format!("veh-{}", index)),
    ));

    let mut inbox = vanet.register_vehicle(node);
    {
        let vehicle = Arc::clone(&vehicle);
        ctx.spawn("inbox-dispatch", async move {
            while let Some(envelope) = inbox.recv().await {
                if vehicle.handle_beacon(envelope).await.is_err() {
                    break;
                }
            }
        });
    }

    Arc::clone(&vehicle).start().await?;
    Ok(vehicle)
}

/// Signs and broadcasts a hand-crafted beacon, timestamped at the current
/// virtual clock. Used for senders the runner controls directly.
async fn broadcast_beacon(
    ctx: &Arc<SimContext>,
    vanet: &Arc<SimVanet>,
    node: NodeId,
    key: &SigningKey,
    position: PositionVector,
    velocity: PositionVector,
) {
    let timestamp_ms = ctx
        .system_time()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let beacon = BeaconMessage {
        position,
        velocity,
        timestamp_ms,
        sender: Identity::from(&key.verifying_key()),
    };
    let envelope = SignedBeacon::new(beacon, key)
        .expect("sign crafted beacon")
        .to_envelope(timestamp_ms)
        .expect("envelope crafted beacon");
    vanet
        .broadcast(node, envelope)
        .await
        .expect("broadcast crafted beacon");
}

/// Yields enough times for every ready task to run a few rounds.
async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}
