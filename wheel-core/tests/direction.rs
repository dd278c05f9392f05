use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use wheel_core::config::{REVERSE_SENTINEL, SensorRole, WheelConfig};
use wheel_core::pulse::{
    Direction, MarkerUpdate, PulseEvent, PulseEventProcessor, PulseInstant, PulseOutcome,
};
use wheel_core::query::{NoAnalogSource, QueryInterface, SpeedReading};
use wheel_core::telemetry::TelemetryState;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
struct MillisInstant(u64);

impl PulseInstant for MillisInstant {
    fn elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.0
            .checked_sub(earlier.0)
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }
}

type State = TelemetryState<CriticalSectionRawMutex, MillisInstant>;

type Query<'a> = QueryInterface<'a, CriticalSectionRawMutex, MillisInstant, NoAnalogSource>;

fn query(state: &State, config: WheelConfig) -> Query<'_> {
    QueryInterface::new(state, NoAnalogSource, config)
}

#[test]
fn forward_then_reverse_reports_sentinel() {
    let state = State::new();
    let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &state);

    processor.on_forward_marker_pulse(MillisInstant(1_000));
    let update = processor.on_reverse_marker_pulse(MillisInstant(2_000));
    assert_eq!(
        update,
        MarkerUpdate {
            role: SensorRole::ReverseMarker,
            direction: Direction::Reverse
        }
    );

    let query = query(&state, WheelConfig::DEFAULT);
    let reading = query.get_speed();
    assert_eq!(reading, SpeedReading::Reverse);
    assert!((query.speed_value(reading) - REVERSE_SENTINEL).abs() < f32::EPSILON);
}

#[test]
fn reverse_then_forward_reports_speed_level() {
    let state = State::new();
    let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &state);

    processor.on_speed_pulse(MillisInstant(0));
    processor.on_speed_pulse(MillisInstant(500));
    processor.on_forward_marker_pulse(MillisInstant(2_000));
    processor.on_reverse_marker_pulse(MillisInstant(1_000));

    assert_eq!(
        query(&state, WheelConfig::DEFAULT).get_speed(),
        SpeedReading::Level(3)
    );
}

#[test]
fn single_marker_is_never_reverse() {
    let state = State::new();
    let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &state);

    processor.on_reverse_marker_pulse(MillisInstant(5_000));
    assert_eq!(
        query(&state, WheelConfig::DEFAULT).get_speed(),
        SpeedReading::Level(0)
    );

    let state = State::new();
    let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &state);
    processor.on_forward_marker_pulse(MillisInstant(5_000));
    assert_eq!(
        query(&state, WheelConfig::DEFAULT).get_speed(),
        SpeedReading::Level(0)
    );
}

#[test]
fn equal_marker_times_are_not_reverse() {
    let state = State::new();
    let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &state);

    processor.handle(PulseEvent::ForwardMarker(MillisInstant(3_000)));
    let outcome = processor.handle(PulseEvent::ReverseMarker(MillisInstant(3_000)));
    assert_eq!(
        outcome,
        PulseOutcome::Marker(MarkerUpdate {
            role: SensorRole::ReverseMarker,
            direction: Direction::ForwardOrNeutral
        })
    );
}

#[test]
fn verdict_follows_latest_marker_pair() {
    let state = State::new();
    let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &state);
    let query = query(&state, WheelConfig::DEFAULT);

    processor.on_forward_marker_pulse(MillisInstant(100));
    processor.on_reverse_marker_pulse(MillisInstant(200));
    assert_eq!(query.get_speed(), SpeedReading::Reverse);

    processor.on_forward_marker_pulse(MillisInstant(300));
    assert_ne!(query.get_speed(), SpeedReading::Reverse);

    processor.on_reverse_marker_pulse(MillisInstant(400));
    assert_eq!(query.get_speed(), SpeedReading::Reverse);
}

#[test]
fn staleness_window_expires_reverse_verdict() {
    let config = WheelConfig::DEFAULT.with_marker_staleness(Some(Duration::from_secs(3)));
    let state = State::new();
    let processor = PulseEventProcessor::new(config, &state);

    processor.on_forward_marker_pulse(MillisInstant(1_000));
    processor.on_reverse_marker_pulse(MillisInstant(2_000));

    let query = query(&state, config);
    assert_eq!(
        query.get_speed_at(MillisInstant(4_000)),
        SpeedReading::Reverse
    );
    assert_eq!(
        query.get_speed_at(MillisInstant(6_000)),
        SpeedReading::Level(0)
    );
    assert_eq!(query.get_speed(), SpeedReading::Reverse);
}
