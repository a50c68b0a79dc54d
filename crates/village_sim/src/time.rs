use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds on the simulation's own monotonic clock.
///
/// The clock only advances through [`crate::Simulation::tick`], so timestamps
/// stored in a snapshot compare correctly against `now` after a reload.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn after(self, delay: Duration) -> Self {
        Self(self.0.saturating_add(duration_to_millis(delay)))
    }

    pub fn saturating_since(self, earlier: SimTime) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

pub(crate) fn duration_to_millis(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}
