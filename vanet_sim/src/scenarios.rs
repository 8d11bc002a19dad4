//! Deterministic traffic scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Honest vehicles in a line: beaconing, trust, vicinity growth
    Convoy,

    /// One vehicle broadcasts falsified positions and gets revoked
    Falsifier,

    /// Close-proximity alarm: freeze, debounce, auto-clear
    Tailgate,

    /// A moving vehicle re-binds to the nearest relay
    Handover,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Convoy,
            ScenarioId::Falsifier,
            ScenarioId::Tailgate,
            ScenarioId::Handover,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Convoy => "convoy",
            ScenarioId::Falsifier => "falsifier",
            ScenarioId::Tailgate => "tailgate",
            ScenarioId::Handover => "handover",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Convoy => "Honest convoy: every vehicle sees every peer, nobody panics",
            ScenarioId::Falsifier => "Position spoofing: misbehavior verdict, report, revocation",
            ScenarioId::Tailgate => "Proximity danger: freeze, debounced re-arm, auto-clear",
            ScenarioId::Handover => "Relay handover while driving out of the first relay's range",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "convoy" => Ok(ScenarioId::Convoy),
            "falsifier" => Ok(ScenarioId::Falsifier),
            "tailgate" => Ok(ScenarioId::Tailgate),
            "handover" => Ok(ScenarioId::Handover),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
