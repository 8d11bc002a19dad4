//! Vehicle configuration.

use std::time::Duration;

/// Tunables for a vehicle node.
#[derive(Debug, Clone)]
pub struct VehicleConfig {
    /// Logical name for logs (VIN-style label)
    pub name: String,

    /// Period of the motion+beacon tick
    pub beacon_interval: Duration,

    /// Delay before the first beacon tick
    pub warmup_delay: Duration,

    /// Period of the route-affinity (nearest relay) check
    pub relay_check_interval: Duration,

    /// How long the danger flag stays raised without a re-arm
    pub danger_reset_interval: Duration,

    /// Proximity radius that raises the danger flag, meters
    pub danger_radius: f64,

    /// Tolerance radius for the predicted-position trust check, meters
    pub acceptable_variance: f64,

    /// How long a vicinity entry stays valid after first sight
    pub vicinity_ttl: Duration,

    /// Bound applied to every remote call
    pub remote_timeout: Duration,

    /// Remote attempts before the vehicle reports itself unavailable
    pub remote_attempts: u32,

    /// Backoff step between remote attempts (linear)
    pub retry_backoff: Duration,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            name: "vehicle".to_string(),
            beacon_interval: Duration::from_secs(1),
            warmup_delay: Duration::from_secs(2),
            relay_check_interval: Duration::from_secs(5),
            danger_reset_interval: Duration::from_secs(3),
            danger_radius: 5.0,
            acceptable_variance: 5.0,
            vicinity_ttl: Duration::from_secs(30),
            remote_timeout: Duration::from_secs(2),
            remote_attempts: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl VehicleConfig {
    /// Convenience for building a named config.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
