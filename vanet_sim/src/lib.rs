//! Deterministic simulation harness for the VANET vehicle node.
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a virtual clock the runner advances manually; vehicle sleeps
//!   park until the clock catches up
//! - **Network**: in-memory broadcast fan-out and relay registry with
//!   fault injection (network down, relay failures)
//! - **Randomness**: all signing keys derived from a single 64-bit seed
//!
//! The runner steps the clock in fixed increments and lets the spawned
//! vehicle loops catch up between steps, so every run with the same seed
//! replays identically.

mod context;
mod network;
mod relay;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use network::SimVanet;
pub use relay::SimRelay;
pub use runner::{ScenarioResult, ScenarioRunner};
