use serde::{Deserialize, Serialize};
use substratum_data::Interval;

/// Accumulates elapsed simulation time until an update is due.
///
/// An interval of zero makes every `advance` call due.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateClock {
    interval: f64,
    elapsed: f64,
}

impl UpdateClock {
    #[must_use]
    pub fn new(interval_seconds: f64) -> Self {
        Self {
            interval: interval_seconds.max(0.0),
            elapsed: 0.0,
        }
    }

    #[must_use]
    pub fn from_interval(interval: Option<Interval>) -> Self {
        Self::new(interval.map_or(0.0, |i| i.as_seconds()))
    }

    #[must_use]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Adds `dt` and, if the interval has been reached, returns the whole
    /// accumulated time and starts over.
    pub fn advance(&mut self, dt: f64) -> Option<f64> {
        self.elapsed += dt;
        if self.interval <= self.elapsed {
            let due = self.elapsed;
            self.elapsed = 0.0;
            Some(due)
        } else {
            None
        }
    }

    /// Returns any accumulated time regardless of the interval and resets.
    pub fn take(&mut self) -> Option<f64> {
        let pending = std::mem::take(&mut self.elapsed);
        (pending > 0.0).then_some(pending)
    }
}
