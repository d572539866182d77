//! Classification of targets into failure profiles.

use crate::Error;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// MTBF assigned to targets no rule matches.
const DEFAULT_MTBF: Duration = Duration::from_secs(1);

/// MTTR assigned to targets no rule matches (zero means permanently up).
const DEFAULT_MTTR: Duration = Duration::ZERO;

/// A single classification rule.
///
/// The pattern is matched against the target identifier as given (it is not
/// anchored). A malformed pattern never matches and does not abort
/// classification; use [`Config::verify`] to reject malformed patterns up
/// front instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    /// Regular expression applied to the target identifier.
    pub pattern: String,

    /// Mean duration a matching target stays up before failing.
    pub mtbf: Duration,

    /// Mean duration a matching target stays down before recovering.
    ///
    /// Zero means the target never fails, regardless of `mtbf`.
    pub mttr: Duration,
}

/// Configuration for a [`crate::Simulator`]: an ordered list of rules.
///
/// Rules are evaluated in order and the first match wins. Targets no rule
/// matches are permanently up.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    pub rules: Vec<Rule>,
}

impl Config {
    /// Ensure every rule pattern compiles.
    ///
    /// Classification itself treats malformed patterns as silent
    /// non-matches; callers that would rather reject a bad ruleset (e.g. on
    /// config load) can call this first.
    pub fn verify(&self) -> Result<(), Error> {
        for rule in &self.rules {
            if let Err(source) = Regex::new(&rule.pattern) {
                return Err(Error::InvalidPattern {
                    pattern: rule.pattern.clone(),
                    source,
                });
            }
        }
        Ok(())
    }
}

/// An immutable failure profile assigned to a target at first sight.
#[derive(Debug)]
pub struct Profile {
    /// Compiled pattern. `None` for the default profile and for rules whose
    /// pattern failed to compile (which therefore never match).
    pattern: Option<Regex>,

    /// Mean duration the target stays up before failing.
    pub mtbf: Duration,

    /// Mean duration the target stays down before recovering.
    pub mttr: Duration,
}

impl Profile {
    fn matches(&self, target: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(target))
    }

    /// Whether this profile can never fail (MTTR of zero).
    pub fn always_up(&self) -> bool {
        self.mttr == Duration::ZERO
    }

    /// Steady-state availability: `MTBF / (MTBF + MTTR)`.
    pub(crate) fn availability(&self) -> f64 {
        let mtbf = self.mtbf.as_secs_f64();
        mtbf / (mtbf + self.mttr.as_secs_f64())
    }

    /// Probability of an up target failing on a given query:
    /// `MTTR / (MTBF + MTTR)`.
    pub(crate) fn unavailability(&self) -> f64 {
        let mttr = self.mttr.as_secs_f64();
        mttr / (self.mtbf.as_secs_f64() + mttr)
    }
}

/// Compiled, ordered ruleset.
pub(crate) struct Profiles {
    rules: Vec<Arc<Profile>>,
    fallback: Arc<Profile>,
}

impl Profiles {
    pub fn new(cfg: &Config) -> Self {
        let rules = cfg
            .rules
            .iter()
            .map(|rule| {
                let pattern = match Regex::new(&rule.pattern) {
                    Ok(pattern) => Some(pattern),
                    Err(err) => {
                        warn!(pattern = %rule.pattern, ?err, "ignoring malformed pattern");
                        None
                    }
                };
                Arc::new(Profile {
                    pattern,
                    mtbf: rule.mtbf,
                    mttr: rule.mttr,
                })
            })
            .collect();
        Self {
            rules,
            fallback: Arc::new(Profile {
                pattern: None,
                mtbf: DEFAULT_MTBF,
                mttr: DEFAULT_MTTR,
            }),
        }
    }

    /// Return the first matching profile, or the always-up fallback.
    pub fn classify(&self, target: &str) -> Arc<Profile> {
        for profile in &self.rules {
            if profile.matches(target) {
                debug!(
                    target,
                    mtbf = ?profile.mtbf,
                    mttr = ?profile.mttr,
                    "classified target",
                );
                return profile.clone();
            }
        }
        debug!(target, "no rule matched, target is always up");
        self.fallback.clone()
    }
}
