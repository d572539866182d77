//! Simulate target availability with configurable failure and repair dynamics.
//!
//! Instead of sending real packets, [`Simulator::probe`] answers reachability
//! queries from a two-state (up/down) renewal process. Each target is
//! classified once into a [`Profile`] by an ordered list of pattern rules,
//! and from then on alternates between up and down sojourns parameterized by
//! the profile's Mean Time Between Failures (MTBF) and Mean Time To Repair
//! (MTTR). This lets a probe-and-report pipeline (metrics, alerting,
//! dashboards) be exercised end-to-end with realistic failure dynamics and
//! no network I/O.
//!
//! # Behavior
//!
//! A target is seen for the first time when it is first probed: it is
//! classified against the configured rules (first match wins, unmatched
//! targets are permanently up) and its initial state is drawn from the
//! steady-state availability `MTBF / (MTBF + MTTR)`. A target that goes down
//! stays down until a concrete recovery deadline, sampled from
//! `Normal(MTTR, MTTR / 5)`, has passed. Once classified, a target's profile
//! never changes.
//!
//! Time and randomness are injectable: tests can drive the simulation with
//! [`mocks::Clock`] and a fixed seed ([`Simulator::seeded`]) for fully
//! reproducible assertions.
//!
//! # Example
//!
//! ```rust
//! use simnet_availability::{Config, Rule, Simulator};
//! use std::time::Duration;
//!
//! let cfg = Config {
//!     rules: vec![Rule {
//!         pattern: r"^10\.".to_string(),
//!         mtbf: Duration::from_secs(300),
//!         mttr: Duration::from_secs(30),
//!     }],
//! };
//! let simulator = Simulator::seeded(cfg, 42);
//!
//! // Flappy (matches the rule):
//! let _reachable = simulator.probe("10.1.2.3");
//!
//! // Unmatched targets are permanently up:
//! assert!(simulator.probe("example.com"));
//!
//! // Currently-down targets, for logging:
//! for outage in simulator.outages() {
//!     println!("{outage}");
//! }
//! ```

use std::time::SystemTime;
use thiserror::Error;

pub mod mocks;
mod profile;
mod simulator;
mod state;

pub use profile::{Config, Profile, Rule};
pub use simulator::{Outage, Simulator};

/// Errors that can occur when validating a [`Config`].
///
/// Nothing on the probe path fails: malformed patterns silently never match
/// (see [`Config::verify`] for the strict alternative) and first-seen targets
/// trigger lazy initialization rather than an error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Interface for reading the current time.
///
/// Defaults to [`SystemClock`]; tests inject [`mocks::Clock`] to control
/// when recovery deadlines elapse.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Returns the current time.
    fn current(&self) -> SystemTime;
}

/// Wall-clock [`Clock`] backed by [`SystemTime::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn current(&self) -> SystemTime {
        SystemTime::now()
    }
}
