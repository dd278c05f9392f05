use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use wheel_core::config::WheelConfig;
use wheel_core::pulse::{PulseEventProcessor, PulseInstant};
use wheel_core::telemetry::TelemetryState;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct MicrosInstant(u64);

impl PulseInstant for MicrosInstant {
    fn elapsed_since(&self, earlier: Self) -> Option<Duration> {
        self.0
            .checked_sub(earlier.0)
            .filter(|micros| *micros > 0)
            .map(Duration::from_micros)
    }
}

type State = TelemetryState<CriticalSectionRawMutex, MicrosInstant>;

const SPEED_PULSES: usize = 20_000;
const MARKER_PULSES: u64 = 20_000;

/// Alternating 250 ms / 500 ms intervals give levels 7 / 3, so every
/// timestamp maps to exactly one valid level.
fn speed_schedule() -> (Vec<MicrosInstant>, HashMap<MicrosInstant, u8>) {
    let mut times = Vec::with_capacity(SPEED_PULSES);
    let mut expected = HashMap::with_capacity(SPEED_PULSES);
    let mut now = 0_u64;
    times.push(MicrosInstant(now));
    expected.insert(MicrosInstant(now), 0);
    for index in 1..SPEED_PULSES {
        let (interval, level) = if index % 2 == 1 {
            (250_000, 7)
        } else {
            (500_000, 3)
        };
        now += interval;
        times.push(MicrosInstant(now));
        expected.insert(MicrosInstant(now), level);
    }
    (times, expected)
}

#[test]
fn speed_pair_is_never_torn() {
    let state = Arc::new(State::new());
    let (times, expected) = speed_schedule();
    let expected = Arc::new(expected);
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &*state);
            for at in times {
                processor.on_speed_pulse(at);
            }
            done.store(true, Ordering::Release);
        })
    };

    let marker_writer = {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &*state);
            for tick in 0..MARKER_PULSES {
                processor.on_forward_marker_pulse(MicrosInstant(tick));
            }
        })
    };

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let state = Arc::clone(&state);
            let expected = Arc::clone(&expected);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut observed = 0_usize;
                while !done.load(Ordering::Acquire) {
                    let sample = state.speed_sample();
                    if let Some(at) = sample.last_event_time {
                        let level = expected.get(&at).copied().expect("unknown timestamp");
                        assert_eq!(sample.speed_level, level, "torn speed pair at {at:?}");
                        observed += 1;
                    } else {
                        assert_eq!(sample.speed_level, 0);
                    }
                }
                observed
            })
        })
        .collect();

    writer.join().expect("speed writer panicked");
    marker_writer.join().expect("marker writer panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }

    assert_eq!(state.speed_level(), 7);
}

#[test]
fn marker_pair_is_read_consistently() {
    let state = Arc::new(State::new());
    let done = Arc::new(AtomicBool::new(false));

    // Markers alternate forward/reverse one tick apart, so any consistent
    // snapshot holding both shows them exactly one tick apart.
    let writer = {
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &*state);
            for tick in 0..MARKER_PULSES {
                if tick % 2 == 0 {
                    processor.on_forward_marker_pulse(MicrosInstant(tick));
                } else {
                    processor.on_reverse_marker_pulse(MicrosInstant(tick));
                }
            }
            done.store(true, Ordering::Release);
        })
    };

    let reader = {
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let markers = state.direction_markers();
                if let (Some(forward), Some(reverse)) =
                    (markers.forward_marker_time, markers.reverse_marker_time)
                {
                    assert_eq!(
                        forward.0.abs_diff(reverse.0),
                        1,
                        "torn marker pair {forward:?}/{reverse:?}"
                    );
                }
            }
        })
    };

    writer.join().expect("marker writer panicked");
    reader.join().expect("reader panicked");

    let markers = state.direction_markers();
    assert_eq!(
        markers.forward_marker_time,
        Some(MicrosInstant(MARKER_PULSES - 2))
    );
    assert_eq!(
        markers.reverse_marker_time,
        Some(MicrosInstant(MARKER_PULSES - 1))
    );
}
