//! Mock implementations for testing.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// A [`crate::Clock`] whose time only moves when told to.
///
/// Cloning returns a handle to the same underlying time, so a test can keep
/// one handle and hand another to a [`crate::Simulator`].
#[derive(Clone)]
pub struct Clock {
    time: Arc<Mutex<SystemTime>>,
}

impl Clock {
    /// Create a clock starting at the given time.
    pub fn new(start: SystemTime) -> Self {
        Self {
            time: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.time.lock().unwrap();
        *time = time.checked_add(duration).expect("mock time overflowed");
    }

    /// Set the time to an absolute value.
    pub fn set(&self, now: SystemTime) {
        *self.time.lock().unwrap() = now;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(UNIX_EPOCH)
    }
}

impl crate::Clock for Clock {
    fn current(&self) -> SystemTime {
        *self.time.lock().unwrap()
    }
}
