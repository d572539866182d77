//! The externally callable probe surface.

use crate::{
    profile::{Config, Profiles},
    state::Target,
    Clock, SystemClock,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    collections::HashMap,
    fmt,
    sync::Mutex,
    time::Duration,
};
use tracing::debug;

/// Simulates the availability of probed targets.
///
/// Each distinct target identifier is classified once (first rule match
/// wins) and then follows an up/down renewal process driven by its profile's
/// MTBF and MTTR. State lives for the lifetime of the simulator and is never
/// evicted, so an unbounded stream of distinct identifiers grows the table
/// without bound.
///
/// All methods take `&self` and are safe to call from concurrent threads:
/// the state table and the random source are internally synchronized.
pub struct Simulator<C: Clock = SystemClock> {
    clock: C,
    rng: Mutex<StdRng>,
    profiles: Mutex<Profiles>,
    targets: Mutex<HashMap<String, Target>>,
}

impl Simulator<SystemClock> {
    /// Create a simulator using the wall clock and an entropy-seeded random
    /// source.
    pub fn new(cfg: Config) -> Self {
        Self::init(cfg, SystemClock, StdRng::from_entropy())
    }

    /// Create a simulator using the wall clock and a fixed seed.
    pub fn seeded(cfg: Config, seed: u64) -> Self {
        Self::init(cfg, SystemClock, StdRng::seed_from_u64(seed))
    }
}

impl<C: Clock> Simulator<C> {
    /// Create a simulator with an injected clock and a fixed seed, for
    /// reproducible tests.
    pub fn with_clock(cfg: Config, clock: C, seed: u64) -> Self {
        Self::init(cfg, clock, StdRng::seed_from_u64(seed))
    }

    fn init(cfg: Config, clock: C, rng: StdRng) -> Self {
        Self {
            clock,
            rng: Mutex::new(rng),
            profiles: Mutex::new(Profiles::new(&cfg)),
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Report whether a simulated probe of the target succeeds.
    ///
    /// On first sight the target is classified and its initial state drawn
    /// from the steady-state availability `MTBF / (MTBF + MTTR)`; afterwards
    /// each call advances the target's up/down process. Never fails and
    /// never blocks beyond short internal locks.
    pub fn probe(&self, target: &str) -> bool {
        let now = self.clock.current();
        let mut rng = self.rng.lock().unwrap();
        let mut targets = self.targets.lock().unwrap();
        if let Some(state) = targets.get_mut(target) {
            let up = state.transition(now, &mut *rng);
            debug!(target, up, "probed");
            return up;
        }

        // First sight: classify and draw the initial state.
        let profile = self.profiles.lock().unwrap().classify(target);
        let state = Target::create(profile, now, &mut *rng);
        let up = state.up;
        debug!(target, up, "probed first-seen target");
        targets.insert(target.to_string(), state);
        up
    }

    /// Replace the ruleset used to classify targets not yet seen.
    ///
    /// Targets that have already been probed keep the profile captured at
    /// first classification.
    pub fn reload(&self, cfg: Config) {
        *self.profiles.lock().unwrap() = Profiles::new(&cfg);
    }

    /// Snapshot of currently-down targets, for logging and debugging.
    ///
    /// Sorted by target identifier so repeated calls render stably.
    pub fn outages(&self) -> Vec<Outage> {
        let now = self.clock.current();
        let targets = self.targets.lock().unwrap();
        let mut outages: Vec<_> = targets
            .iter()
            .filter(|(_, state)| !state.up)
            .map(|(target, state)| Outage {
                target: target.clone(),
                down_for: now.duration_since(state.since).unwrap_or_default(),
                remaining: state
                    .until
                    .and_then(|until| until.duration_since(now).ok())
                    .unwrap_or_default(),
            })
            .collect();
        outages.sort_by(|a, b| a.target.cmp(&b.target));
        outages
    }
}

/// A currently-down target, as reported by [`Simulator::outages`].
#[derive(Clone, Debug)]
pub struct Outage {
    /// Target identifier.
    pub target: String,

    /// How long the target has been down.
    pub down_for: Duration,

    /// Time left until the recovery deadline (zero once it has passed).
    pub remaining: Duration,
}

impl fmt::Display for Outage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} down for {:?}, recovers in {:?}",
            self.target, self.down_for, self.remaining
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mocks, Rule};
    use std::{sync::Arc, time::UNIX_EPOCH};

    fn setup_logging() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    fn rule(pattern: &str, mtbf: u64, mttr: u64) -> Rule {
        Rule {
            pattern: pattern.to_string(),
            mtbf: Duration::from_secs(mtbf),
            mttr: Duration::from_secs(mttr),
        }
    }

    #[test]
    fn test_unmatched_target_always_up() {
        let simulator = Simulator::seeded(Config::default(), 0);
        for _ in 0..1000 {
            assert!(simulator.probe("A"));
        }
        assert!(simulator.outages().is_empty());
    }

    #[test]
    fn test_zero_mttr_always_up() {
        let simulator = Simulator::seeded(
            Config {
                rules: vec![rule(".*", 10, 0)],
            },
            0,
        );
        for _ in 0..1000 {
            assert!(simulator.probe("10.0.0.1"));
        }
    }

    #[test]
    fn test_steady_state_split() {
        let simulator = Simulator::seeded(
            Config {
                rules: vec![rule(r"192\.20.*", 10, 10)],
            },
            0,
        );

        // Unmatched target succeeds.
        assert!(simulator.probe("192.100.1.2"));

        // 100 matching targets probed once each: availability 0.5, with
        // statistical slack.
        let mut up = 0;
        for i in 1..=100 {
            if simulator.probe(&format!("192.20.0.{i}")) {
                up += 1;
            }
        }
        assert!((20..=80).contains(&up), "up count out of range: {up}");
    }

    #[test]
    fn test_long_run_up_fraction() {
        // One flappy target probed on a fixed cadence, long enough between
        // probes for any sampled repair (Normal(10s, 2s)) to complete. Each
        // down sojourn then spans exactly one query, and the observed
        // up-fraction settles at the steady-state availability, 0.5 here.
        // At faster cadences the per-query failure rule spreads each down
        // sojourn over more queries and the fraction sits below the
        // steady-state value.
        let clock = mocks::Clock::default();
        let simulator = Simulator::with_clock(
            Config {
                rules: vec![rule(r"192\.20.*", 10, 10)],
            },
            clock.clone(),
            0,
        );

        let total = 2000;
        let mut up = 0;
        for _ in 0..total {
            if simulator.probe("192.20.0.1") {
                up += 1;
            }
            clock.advance(Duration::from_secs(30));
        }
        let fraction = f64::from(up) / f64::from(total);
        assert!(
            (0.4..=0.6).contains(&fraction),
            "up fraction out of range: {fraction}"
        );
    }

    #[test]
    fn test_down_target_holds_until_deadline() {
        setup_logging();
        let clock = mocks::Clock::default();
        let simulator = Simulator::with_clock(
            Config {
                // MTBF of zero: matching targets are effectively never up.
                rules: vec![rule(".*", 0, 600)],
            },
            clock.clone(),
            0,
        );

        assert!(!simulator.probe("10.0.0.1"));
        let outage = simulator.outages().remove(0);
        assert_eq!(outage.target, "10.0.0.1");

        // The deadline has not passed: state is untouched no matter how
        // often we probe.
        clock.advance(Duration::from_secs(1));
        for _ in 0..100 {
            assert!(!simulator.probe("10.0.0.1"));
        }
        let later = simulator.outages().remove(0);
        assert_eq!(
            outage.remaining,
            later.remaining + Duration::from_secs(1),
            "deadline moved while down"
        );

        // Far past the deadline: the up branch runs again and, with MTBF
        // zero, immediately samples a fresh failure. The sojourn restarts
        // (down_for resets instead of reading ~1h) with a new deadline.
        clock.advance(Duration::from_secs(3600));
        assert!(!simulator.probe("10.0.0.1"));
        let refailed = simulator.outages().remove(0);
        assert!(refailed.down_for < Duration::from_secs(1));
        assert!(refailed.remaining > Duration::ZERO);
    }

    #[test]
    fn test_recovery_after_deadline() {
        setup_logging();
        let clock = mocks::Clock::default();
        let simulator = Simulator::with_clock(
            Config {
                rules: vec![rule(".*", 1_000_000_000, 1)],
            },
            clock.clone(),
            0,
        );

        // Plant a down target whose deadline is about to pass. The huge
        // MTBF makes the post-recovery failure draw a near-certain pass.
        let profile = simulator.profiles.lock().unwrap().classify("10.0.0.1");
        simulator.targets.lock().unwrap().insert(
            "10.0.0.1".to_string(),
            Target {
                up: false,
                since: UNIX_EPOCH,
                until: Some(UNIX_EPOCH + Duration::from_secs(30)),
                profile: Arc::clone(&profile),
            },
        );

        assert!(!simulator.probe("10.0.0.1"));
        clock.advance(Duration::from_secs(31));
        assert!(simulator.probe("10.0.0.1"));
        assert!(simulator.outages().is_empty());
    }

    #[test]
    fn test_profile_frozen_at_first_sight() {
        let simulator = Simulator::seeded(
            Config {
                rules: vec![rule(r"^10\.", 10, 0)],
            },
            0,
        );
        assert!(simulator.probe("10.0.0.1"));

        // Reload with a ruleset under which matching targets are never up.
        // The already-seen target keeps its always-up profile.
        simulator.reload(Config {
            rules: vec![rule(r"^10\.", 0, 600)],
        });
        for _ in 0..100 {
            assert!(simulator.probe("10.0.0.1"));
        }

        // A target first seen after the reload gets the new profile.
        assert!(!simulator.probe("10.0.0.2"));
    }

    #[test]
    fn test_outage_rendering() {
        let outage = Outage {
            target: "10.0.0.1".to_string(),
            down_for: Duration::from_secs(5),
            remaining: Duration::from_secs(25),
        };
        assert_eq!(format!("{outage}"), "10.0.0.1 down for 5s, recovers in 25s");
    }

    #[test]
    fn test_concurrent_probes() {
        let simulator = Arc::new(Simulator::seeded(
            Config {
                rules: vec![rule(r"192\.20.*", 10, 10)],
            },
            0,
        ));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let simulator = simulator.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..1000 {
                    // Overlapping keys across workers.
                    simulator.probe(&format!("192.20.0.{}", (worker + i) % 16));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Every distinct key was seen exactly once.
        assert_eq!(simulator.targets.lock().unwrap().len(), 16);
    }
}
