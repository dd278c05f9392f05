use std::time::{Duration, Instant};

use wheel_core::pulse::PulseInstant;

/// Monotonic host timestamp attached to pulse events.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct HostInstant(Instant);

impl HostInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    #[cfg(test)]
    pub fn plus(self, offset: Duration) -> Self {
        Self(self.0 + offset)
    }
}

impl PulseInstant for HostInstant {
    fn elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.0
            .checked_duration_since(earlier.0)
            .filter(|elapsed| !elapsed.is_zero())
    }
}
