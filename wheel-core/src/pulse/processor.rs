//! Edge handlers that fold pulse events into [`TelemetryState`].

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{MarkerUpdate, PulseEvent, PulseInstant, SpeedUpdate};
use crate::config::WheelConfig;
use crate::telemetry::TelemetryState;

/// What a single [`PulseEvent`] did to the shared state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PulseOutcome {
    Speed(SpeedUpdate),
    Marker(MarkerUpdate),
}

/// Converts sensor edges into speed and direction signals.
///
/// The speed handler only touches the speed group and the marker handlers only
/// touch the direction group, so the three can run from independent interrupt
/// or task contexts.
pub struct PulseEventProcessor<'a, M, TInstant>
where
    M: RawMutex,
    TInstant: PulseInstant,
{
    config: WheelConfig,
    state: &'a TelemetryState<M, TInstant>,
}

impl<'a, M, TInstant> PulseEventProcessor<'a, M, TInstant>
where
    M: RawMutex,
    TInstant: PulseInstant,
{
    #[must_use]
    pub const fn new(config: WheelConfig, state: &'a TelemetryState<M, TInstant>) -> Self {
        Self { config, state }
    }

    /// Primary speed sensor fired at `now`.
    pub fn on_speed_pulse(&self, now: TInstant) -> SpeedUpdate {
        let config = &self.config;
        self.state.update_speed(|sample| sample.on_pulse(now, config))
    }

    /// "Down" marker fired at `now`.
    pub fn on_forward_marker_pulse(&self, now: TInstant) -> MarkerUpdate {
        self.state.update_direction(|markers| markers.on_forward_pulse(now))
    }

    /// "Up" marker fired at `now`.
    pub fn on_reverse_marker_pulse(&self, now: TInstant) -> MarkerUpdate {
        self.state.update_direction(|markers| markers.on_reverse_pulse(now))
    }

    /// Dispatches a tagged event to the matching handler.
    pub fn handle(&self, event: PulseEvent<TInstant>) -> PulseOutcome {
        match event {
            PulseEvent::SpeedPulse(at) => PulseOutcome::Speed(self.on_speed_pulse(at)),
            PulseEvent::ForwardMarker(at) => PulseOutcome::Marker(self.on_forward_marker_pulse(at)),
            PulseEvent::ReverseMarker(at) => PulseOutcome::Marker(self.on_reverse_marker_pulse(at)),
        }
    }
}
