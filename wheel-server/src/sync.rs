//! Host flavour of the raw mutex behind each telemetry field group.

use embassy_sync::blocking_mutex::raw::RawMutex;
use parking_lot::Mutex;

use crate::clock::HostInstant;
use wheel_core::telemetry::TelemetryState;

/// Telemetry record shared by the pump, the feed and the HTTP handlers.
pub type HostTelemetry = TelemetryState<StdRawMutex, HostInstant>;

/// OS-backed raw mutex; every instance is an independent lock, so the speed
/// and direction groups never serialize against each other.
pub struct StdRawMutex {
    inner: Mutex<()>,
}

impl StdRawMutex {
    pub const fn new() -> Self {
        Self {
            inner: parking_lot::const_mutex(()),
        }
    }
}

impl Default for StdRawMutex {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: `lock` runs the closure only while `inner` is held, so no two
// closures on the same instance overlap.
unsafe impl RawMutex for StdRawMutex {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self::new();

    fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.inner.lock();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;
    use wheel_core::config::WheelConfig;
    use wheel_core::pulse::PulseEventProcessor;

    #[test]
    fn closures_on_one_lock_do_not_overlap() {
        let lock = Arc::new(StdRawMutex::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..200 {
                        lock.lock(|| {
                            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                            thread::sleep(Duration::from_micros(10));
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().expect("worker panicked");
        }
    }

    #[test]
    fn host_speed_pair_stays_consistent_under_contention() {
        const PULSES: u32 = 10_000;

        let state = Arc::new(HostTelemetry::new());
        let start = HostInstant::now();
        // 250 ms and 500 ms intervals alternate, giving levels 7 and 3.
        let mut times = Vec::new();
        let mut expected = HashMap::new();
        let mut offset = Duration::ZERO;
        for index in 0..PULSES {
            let level = match index {
                0 => 0,
                odd if odd % 2 == 1 => {
                    offset += Duration::from_millis(250);
                    7
                }
                _ => {
                    offset += Duration::from_millis(500);
                    3
                }
            };
            times.push(start.plus(offset));
            expected.insert(start.plus(offset), level);
        }
        let expected = Arc::new(expected);
        let done = Arc::new(AtomicBool::new(false));

        let speed_writer = {
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
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, &*state);
                let mut tick = Duration::ZERO;
                while !done.load(Ordering::Acquire) {
                    tick += Duration::from_micros(1);
                    processor.on_forward_marker_pulse(start.plus(tick));
                    processor.on_reverse_marker_pulse(start.plus(tick));
                }
            })
        };

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let state = Arc::clone(&state);
                let expected = Arc::clone(&expected);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        let sample = state.speed_sample();
                        match sample.last_event_time {
                            Some(at) => assert_eq!(
                                Some(&sample.speed_level),
                                expected.get(&at),
                                "torn speed pair"
                            ),
                            None => assert_eq!(sample.speed_level, 0),
                        }
                    }
                })
            })
            .collect();

        speed_writer.join().expect("speed writer panicked");
        marker_writer.join().expect("marker writer panicked");
        for reader in readers {
            reader.join().expect("reader panicked");
        }

        // The last interval is a 250 ms one.
        assert_eq!(state.speed_level(), 7);
        assert_eq!(
            state.speed_sample().last_event_time,
            Some(start.plus(offset))
        );
    }

    #[test]
    fn host_telemetry_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<HostTelemetry>();
    }
}
