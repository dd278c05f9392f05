//! Pulse event model and the pure handlers behind the processor.
//!
//! Each handler takes the current field-group value, the pulse timestamp, and
//! the calibration, and returns the next value plus an outcome describing what
//! happened. [`crate::telemetry::TelemetryState`] applies them under the
//! matching group lock, so the logic here never sees shared state.

use core::fmt;
use core::time::Duration;

use crate::config::{SensorRole, WheelConfig};

pub mod processor;

pub use processor::{PulseEventProcessor, PulseOutcome};

/// Monotonic instant captured when a sensor edge is detected.
pub trait PulseInstant: Copy + Ord {
    /// Returns the time elapsed from `earlier` to `self`, or `None` when `self`
    /// is not strictly later than `earlier`.
    fn elapsed_since(&self, earlier: Self) -> Option<Duration>;
}

impl PulseInstant for Duration {
    fn elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.checked_sub(earlier).filter(|elapsed| !elapsed.is_zero())
    }
}

/// Tagged edge event pushed by the platform layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PulseEvent<TInstant> {
    SpeedPulse(TInstant),
    ForwardMarker(TInstant),
    ReverseMarker(TInstant),
}

impl<TInstant: Copy> PulseEvent<TInstant> {
    /// Builds the event matching a sensor role.
    #[must_use]
    pub const fn from_role(role: SensorRole, at: TInstant) -> Self {
        match role {
            SensorRole::Speed => PulseEvent::SpeedPulse(at),
            SensorRole::ForwardMarker => PulseEvent::ForwardMarker(at),
            SensorRole::ReverseMarker => PulseEvent::ReverseMarker(at),
        }
    }

    /// Sensor that produced the event.
    #[must_use]
    pub const fn role(&self) -> SensorRole {
        match self {
            PulseEvent::SpeedPulse(_) => SensorRole::Speed,
            PulseEvent::ForwardMarker(_) => SensorRole::ForwardMarker,
            PulseEvent::ReverseMarker(_) => SensorRole::ReverseMarker,
        }
    }

    /// Timestamp carried by the event.
    #[must_use]
    pub const fn at(&self) -> TInstant {
        match *self {
            PulseEvent::SpeedPulse(at)
            | PulseEvent::ForwardMarker(at)
            | PulseEvent::ReverseMarker(at) => at,
        }
    }
}

/// Speed field group: the previous pulse time and the last computed level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SpeedSample<TInstant> {
    pub last_event_time: Option<TInstant>,
    pub speed_level: u8,
}

impl<TInstant> SpeedSample<TInstant> {
    /// Empty sample: no pulse seen, speed zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_event_time: None,
            speed_level: 0,
        }
    }
}

impl<TInstant> Default for SpeedSample<TInstant> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of applying one speed pulse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpeedUpdate {
    /// First pulse; only the reference timestamp was stored.
    Armed,
    /// Pulse arrived after the configured idle gap; treated as a first pulse.
    Rearmed { idle: Duration },
    /// Pulse was not strictly after the previous one; speed left unchanged.
    Degenerate,
    /// A new speed level was computed.
    Updated { level: u8, elapsed: Duration },
}

impl fmt::Display for SpeedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedUpdate::Armed => f.write_str("armed"),
            SpeedUpdate::Rearmed { idle } => write!(f, "rearmed idle={}ms", idle.as_millis()),
            SpeedUpdate::Degenerate => f.write_str("degenerate-interval"),
            SpeedUpdate::Updated { level, elapsed } => {
                write!(f, "level={level} elapsed={}us", elapsed.as_micros())
            }
        }
    }
}

impl<TInstant: PulseInstant> SpeedSample<TInstant> {
    /// Applies a speed pulse observed at `now`.
    #[must_use]
    pub fn on_pulse(self, now: TInstant, config: &WheelConfig) -> (Self, SpeedUpdate) {
        let Some(previous) = self.last_event_time else {
            return (
                Self {
                    last_event_time: Some(now),
                    ..self
                },
                SpeedUpdate::Armed,
            );
        };

        let refreshed = Self {
            last_event_time: Some(now),
            ..self
        };

        let Some(elapsed) = now.elapsed_since(previous) else {
            return (refreshed, SpeedUpdate::Degenerate);
        };

        if config.idle_rearm.is_some_and(|gap| elapsed > gap) {
            return (refreshed, SpeedUpdate::Rearmed { idle: elapsed });
        }

        let level = speed_level_for(elapsed, config.wheel_circumference, config.speed_ceiling);
        (
            Self {
                last_event_time: Some(now),
                speed_level: level,
            },
            SpeedUpdate::Updated { level, elapsed },
        )
    }
}

/// Converts the interval between two speed pulses into a clamped speed level:
/// `min(floor(circumference / elapsed_seconds), ceiling)`.
///
/// A zero interval saturates at `ceiling`; callers filter those out before
/// reaching this point.
#[must_use]
pub fn speed_level_for(elapsed: Duration, circumference: f32, ceiling: u8) -> u8 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return ceiling;
    }

    let raw = f64::from(circumference) / seconds;
    if raw.is_nan() || raw <= 0.0 {
        return 0;
    }

    // Non-negative and at most `ceiling`, so the truncating cast is the floor.
    let clamped = raw.min(f64::from(ceiling));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let level = clamped as u8;
    level
}

/// Direction field group: latest timestamp from each marker sensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DirectionMarkers<TInstant> {
    pub forward_marker_time: Option<TInstant>,
    pub reverse_marker_time: Option<TInstant>,
}

impl<TInstant> DirectionMarkers<TInstant> {
    /// No marker seen yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forward_marker_time: None,
            reverse_marker_time: None,
        }
    }
}

impl<TInstant> Default for DirectionMarkers<TInstant> {
    fn default() -> Self {
        Self::new()
    }
}

/// Direction inferred from the marker ordering.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    ForwardOrNeutral,
    Reverse,
}

/// Which marker a pulse refreshed, and the verdict right after it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MarkerUpdate {
    pub role: SensorRole,
    pub direction: Direction,
}

impl<TInstant: PulseInstant> DirectionMarkers<TInstant> {
    /// Records a pulse from the forward ("down") marker.
    #[must_use]
    pub fn on_forward_pulse(self, now: TInstant) -> (Self, MarkerUpdate) {
        let next = Self {
            forward_marker_time: Some(now),
            ..self
        };
        (next, next.update(SensorRole::ForwardMarker))
    }

    /// Records a pulse from the reverse ("up") marker.
    #[must_use]
    pub fn on_reverse_pulse(self, now: TInstant) -> (Self, MarkerUpdate) {
        let next = Self {
            reverse_marker_time: Some(now),
            ..self
        };
        (next, next.update(SensorRole::ReverseMarker))
    }

    /// Reverse exactly when both markers are set and the reverse marker is newer.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match (self.forward_marker_time, self.reverse_marker_time) {
            (Some(forward), Some(reverse)) if reverse > forward => Direction::Reverse,
            _ => Direction::ForwardOrNeutral,
        }
    }

    /// Like [`Self::direction`], but a reverse verdict whose newer marker is
    /// older than `window` (measured back from `now`) degrades to forward.
    #[must_use]
    pub fn direction_at(&self, now: TInstant, window: Option<Duration>) -> Direction {
        match (self.direction(), window, self.reverse_marker_time) {
            (Direction::Reverse, Some(window), Some(reverse)) => {
                match now.elapsed_since(reverse) {
                    Some(age) if age > window => Direction::ForwardOrNeutral,
                    _ => Direction::Reverse,
                }
            }
            (direction, _, _) => direction,
        }
    }

    fn update(&self, role: SensorRole) -> MarkerUpdate {
        MarkerUpdate {
            role,
            direction: self.direction(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn first_pulse_only_arms() {
        let sample = SpeedSample::<Duration>::new();
        let (next, update) = sample.on_pulse(ms(10), &WheelConfig::DEFAULT);
        assert_eq!(update, SpeedUpdate::Armed);
        assert_eq!(next.last_event_time, Some(ms(10)));
        assert_eq!(next.speed_level, 0);
    }

    #[test]
    fn degenerate_interval_refreshes_timestamp_only() {
        let sample = SpeedSample {
            last_event_time: Some(ms(500)),
            speed_level: 7,
        };
        let (next, update) = sample.on_pulse(ms(500), &WheelConfig::DEFAULT);
        assert_eq!(update, SpeedUpdate::Degenerate);
        assert_eq!(next.speed_level, 7);
        assert_eq!(next.last_event_time, Some(ms(500)));

        let (next, update) = next.on_pulse(ms(400), &WheelConfig::DEFAULT);
        assert_eq!(update, SpeedUpdate::Degenerate);
        assert_eq!(next.speed_level, 7);
        assert_eq!(next.last_event_time, Some(ms(400)));
    }

    #[test]
    fn idle_gap_rearms_without_touching_speed() {
        let config = WheelConfig::DEFAULT.with_idle_rearm(Some(Duration::from_secs(3)));
        let sample = SpeedSample {
            last_event_time: Some(ms(0)),
            speed_level: 12,
        };
        let (next, update) = sample.on_pulse(ms(4_000), &config);
        assert_eq!(update, SpeedUpdate::Rearmed { idle: ms(4_000) });
        assert_eq!(next.speed_level, 12);
        assert_eq!(next.last_event_time, Some(ms(4_000)));

        let (next, update) = next.on_pulse(ms(4_250), &config);
        assert_eq!(
            update,
            SpeedUpdate::Updated {
                level: 7,
                elapsed: ms(250)
            }
        );
        assert_eq!(next.speed_level, 7);
    }

    #[test]
    fn speed_level_truncates_and_clamps() {
        assert_eq!(speed_level_for(ms(500), 1.75, 100), 3);
        assert_eq!(speed_level_for(ms(1_000), 1.75, 100), 1);
        assert_eq!(speed_level_for(ms(2_000), 1.75, 100), 0);
        assert_eq!(speed_level_for(Duration::from_micros(100), 1.75, 100), 100);
        assert_eq!(speed_level_for(ms(10), 1.75, 100), 100);
        assert_eq!(speed_level_for(ms(10), 1.75, 20), 20);
        assert_eq!(speed_level_for(Duration::ZERO, 1.75, 100), 100);
    }

    #[test]
    fn direction_requires_both_markers() {
        let markers = DirectionMarkers::<Duration>::new();
        assert_eq!(markers.direction(), Direction::ForwardOrNeutral);

        let (markers, update) = markers.on_reverse_pulse(ms(2_000));
        assert_eq!(update.role, SensorRole::ReverseMarker);
        assert_eq!(update.direction, Direction::ForwardOrNeutral);

        let (markers, update) = markers.on_forward_pulse(ms(1_000));
        assert_eq!(update.direction, Direction::Reverse);
        assert_eq!(markers.direction(), Direction::Reverse);

        let (markers, _) = markers.on_forward_pulse(ms(2_000));
        assert_eq!(markers.direction(), Direction::ForwardOrNeutral);
    }

    #[test]
    fn stale_reverse_verdict_degrades() {
        let markers = DirectionMarkers {
            forward_marker_time: Some(ms(1_000)),
            reverse_marker_time: Some(ms(2_000)),
        };
        let window = Some(Duration::from_secs(1));
        assert_eq!(markers.direction_at(ms(2_500), window), Direction::Reverse);
        assert_eq!(markers.direction_at(ms(3_000), window), Direction::Reverse);
        assert_eq!(
            markers.direction_at(ms(3_001), window),
            Direction::ForwardOrNeutral
        );
        assert_eq!(markers.direction_at(ms(60_000), None), Direction::Reverse);
    }

    #[test]
    fn event_helpers_round_trip_roles() {
        for role in [
            SensorRole::Speed,
            SensorRole::ForwardMarker,
            SensorRole::ReverseMarker,
        ] {
            let event = PulseEvent::from_role(role, ms(5));
            assert_eq!(event.role(), role);
            assert_eq!(event.at(), ms(5));
        }
    }
}
