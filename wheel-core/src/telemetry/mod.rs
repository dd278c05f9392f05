//! Shared telemetry record written by pulse handlers and read by queries.
//!
//! The record is split into two field groups, each behind its own blocking
//! mutex: the speed group ([`SpeedSample`]) and the direction group
//! ([`DirectionMarkers`]). A speed pulse never contends with a marker pulse,
//! while every read or write of a group sees the whole group at once. The raw
//! mutex flavour is chosen by the platform: a critical section on the MCU, an
//! OS mutex on the host.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::pulse::{DirectionMarkers, SpeedSample};

/// Latest derived values, shared between producers and readers.
pub struct TelemetryState<M, TInstant>
where
    M: RawMutex,
    TInstant: Copy,
{
    speed: Mutex<M, Cell<SpeedSample<TInstant>>>,
    direction: Mutex<M, Cell<DirectionMarkers<TInstant>>>,
}

impl<M, TInstant> TelemetryState<M, TInstant>
where
    M: RawMutex,
    TInstant: Copy,
{
    /// Creates an empty record; usable in `static` initializers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            speed: Mutex::new(Cell::new(SpeedSample::new())),
            direction: Mutex::new(Cell::new(DirectionMarkers::new())),
        }
    }

    /// Consistent copy of the speed group.
    #[must_use]
    pub fn speed_sample(&self) -> SpeedSample<TInstant> {
        self.speed.lock(Cell::get)
    }

    /// Consistent copy of both marker timestamps.
    #[must_use]
    pub fn direction_markers(&self) -> DirectionMarkers<TInstant> {
        self.direction.lock(Cell::get)
    }

    /// Last computed speed level.
    #[must_use]
    pub fn speed_level(&self) -> u8 {
        self.speed_sample().speed_level
    }

    /// Replaces the speed group with the value returned by `apply`, holding
    /// the group lock for the whole read-modify-write.
    pub fn update_speed<R>(
        &self,
        apply: impl FnOnce(SpeedSample<TInstant>) -> (SpeedSample<TInstant>, R),
    ) -> R {
        self.speed.lock(|cell| {
            let (next, outcome) = apply(cell.get());
            cell.set(next);
            outcome
        })
    }

    /// Replaces the direction group with the value returned by `apply`.
    pub fn update_direction<R>(
        &self,
        apply: impl FnOnce(DirectionMarkers<TInstant>) -> (DirectionMarkers<TInstant>, R),
    ) -> R {
        self.direction.lock(|cell| {
            let (next, outcome) = apply(cell.get());
            cell.set(next);
            outcome
        })
    }
}

impl<M, TInstant> Default for TelemetryState<M, TInstant>
where
    M: RawMutex,
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}
