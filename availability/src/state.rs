//! Per-target simulation state and the up/down transition rule.

use crate::profile::Profile;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::debug;

/// Repair durations are sampled from `Normal(MTTR, MTTR / REPAIR_SPREAD)`.
const REPAIR_SPREAD: f64 = 5.0;

/// Longest repair a failure can sample; keeps recovery deadlines within
/// [`SystemTime`] range.
const MAX_REPAIR: Duration = Duration::from_secs(100 * 365 * 86400);

/// Live simulation state for a single target.
///
/// Created on first probe and kept for the lifetime of the simulator; the
/// profile captured here never changes (later rule changes do not
/// reclassify).
#[derive(Debug)]
pub(crate) struct Target {
    /// Whether the target is currently reachable.
    pub up: bool,

    /// When the current up/down sojourn started.
    pub since: SystemTime,

    /// Recovery deadline. Set only while down: the target stays down until
    /// this time passes.
    pub until: Option<SystemTime>,

    pub profile: Arc<Profile>,
}

impl Target {
    /// Initialize state for a first-seen target, drawing up/down from the
    /// profile's steady-state availability.
    pub fn create<R: Rng>(profile: Arc<Profile>, now: SystemTime, rng: &mut R) -> Self {
        let up = profile.always_up() || rng.gen::<f64>() <= profile.availability();
        let until = if up {
            None
        } else {
            Some(deadline(now, repair_duration(&profile, rng)))
        };
        Self {
            up,
            since: now,
            until,
            profile,
        }
    }

    /// Advance the state for one query and return whether the target is up.
    ///
    /// A down target stays down until its recovery deadline passes; once it
    /// does, the failure is cleared and the same call continues into the up
    /// branch (a fresh failure draw), so a target is never stuck down. An up
    /// target fails with probability `MTTR / (MTBF + MTTR)` per query,
    /// sampling a concrete repair duration for the new deadline.
    pub fn transition<R: Rng>(&mut self, now: SystemTime, rng: &mut R) -> bool {
        if self.profile.always_up() {
            self.up = true;
            self.until = None;
            return true;
        }

        if !self.up {
            if let Some(until) = self.until {
                if now < until {
                    return false;
                }
            }
            debug!(deadline = ?self.until, "target recovered");
            self.up = true;
            self.since = now;
            self.until = None;
        }

        let draw = rng.gen::<f64>();
        let threshold = self.profile.unavailability();
        if draw <= threshold {
            let repair = repair_duration(&self.profile, rng);
            debug!(draw, threshold, ?repair, "target failed");
            self.up = false;
            self.since = now;
            self.until = Some(deadline(now, repair));
            return false;
        }
        true
    }
}

/// Sample how long a repair takes: `Normal(MTTR, MTTR / 5)`, clamped at
/// zero (a negative sample means immediate recovery) and at [`MAX_REPAIR`].
fn repair_duration<R: Rng>(profile: &Profile, rng: &mut R) -> Duration {
    let mttr = profile.mttr.as_secs_f64();
    let sample = Normal::new(mttr, mttr / REPAIR_SPREAD)
        .unwrap()
        .sample(rng);
    Duration::try_from_secs_f64(sample.max(0.0))
        .unwrap_or(MAX_REPAIR)
        .min(MAX_REPAIR)
}

fn deadline(now: SystemTime, repair: Duration) -> SystemTime {
    now.checked_add(repair).expect("recovery deadline overflowed")
}
