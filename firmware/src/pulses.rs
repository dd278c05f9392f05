//! Pulse plumbing between the EXTI edge tasks and the telemetry record.
//!
//! Edge tasks stamp each rising edge with [`FirmwareInstant`] and offer it to
//! the bounded [`PulseQueue`]; the pump task drains the queue through the
//! shared pulse processor. Outcomes are mirrored to defmt on target and to
//! stdout on the host.

use core::time::Duration as CoreDuration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use embassy_time::Instant;
use portable_atomic::{AtomicU32, Ordering};
use wheel_core::config::SensorRole;
use wheel_core::pulse::{Direction, PulseEvent, PulseInstant, PulseOutcome, SpeedUpdate};
use wheel_core::telemetry::TelemetryState;

/// Pulses buffered between the edge tasks and the pump.
pub const PULSE_QUEUE_DEPTH: usize = 8;

#[cfg(target_os = "none")]
type QueueMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type QueueMutex = NoopRawMutex;

/// Embassy monotonic instant, adapted to the pulse timing trait.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl PulseInstant for FirmwareInstant {
    fn elapsed_since(&self, earlier: Self) -> Option<CoreDuration> {
        self.0
            .checked_duration_since(earlier.0)
            .filter(|elapsed| elapsed.as_ticks() > 0)
            .map(|elapsed| CoreDuration::from_micros(elapsed.as_micros()))
    }
}

pub type FirmwarePulse = PulseEvent<FirmwareInstant>;

/// Telemetry record shared by the pump and the USB request task.
pub type FirmwareTelemetry = TelemetryState<CriticalSectionRawMutex, FirmwareInstant>;

pub type PulseQueue = Channel<QueueMutex, FirmwarePulse, PULSE_QUEUE_DEPTH>;
pub type PulseSender<'a> = Sender<'a, QueueMutex, FirmwarePulse, PULSE_QUEUE_DEPTH>;
pub type PulseReceiver<'a> = Receiver<'a, QueueMutex, FirmwarePulse, PULSE_QUEUE_DEPTH>;

/// Edges dropped because the queue was full.
static MISSED_EDGES: AtomicU32 = AtomicU32::new(0);

/// Queues a pulse without waiting; a full queue drops it as a missed edge.
pub fn offer(sender: &PulseSender<'_>, event: FirmwarePulse) -> bool {
    match sender.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            let total = MISSED_EDGES.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            emit_missed(dropped.role(), dropped.at().as_micros(), total);
            false
        }
    }
}

/// Mirrors a processed pulse to the log.
pub fn log_outcome(event: FirmwarePulse, outcome: PulseOutcome) {
    let at_us = event.at().as_micros();
    match outcome {
        PulseOutcome::Speed(SpeedUpdate::Updated { level, elapsed }) => {
            let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
            emit_speed(at_us, level, elapsed_us);
        }
        PulseOutcome::Speed(update) => emit_note(SensorRole::Speed, at_us, speed_note(update)),
        PulseOutcome::Marker(update) => {
            let note = if update.direction == Direction::Reverse {
                "reverse"
            } else {
                "forward-or-neutral"
            };
            emit_note(update.role, at_us, note);
        }
    }
}

const fn speed_note(update: SpeedUpdate) -> &'static str {
    match update {
        SpeedUpdate::Armed => "armed",
        SpeedUpdate::Rearmed { .. } => "re-armed after idle gap",
        SpeedUpdate::Degenerate => "rejected: non-positive interval",
        SpeedUpdate::Updated { .. } => "updated",
    }
}

#[cfg(target_os = "none")]
fn emit_speed(at_us: u64, level: u8, elapsed_us: u64) {
    defmt::info!(
        "pulse:speed t={}us level={} Δ={}us",
        at_us,
        level,
        elapsed_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_speed(at_us: u64, level: u8, elapsed_us: u64) {
    println!("pulse:speed t={at_us}us level={level} Δ={elapsed_us}us");
}

#[cfg(target_os = "none")]
fn emit_note(role: SensorRole, at_us: u64, note: &'static str) {
    defmt::info!("pulse:{} t={}us {}", role.label(), at_us, note);
}

#[cfg(not(target_os = "none"))]
fn emit_note(role: SensorRole, at_us: u64, note: &'static str) {
    println!("pulse:{} t={at_us}us {note}", role.label());
}

#[cfg(target_os = "none")]
fn emit_missed(role: SensorRole, at_us: u64, total: u32) {
    defmt::warn!(
        "pulse:{} t={}us missed edge (queue full, total={})",
        role.label(),
        at_us,
        total
    );
}

#[cfg(not(target_os = "none"))]
fn emit_missed(role: SensorRole, at_us: u64, total: u32) {
    println!(
        "pulse:{} t={at_us}us missed edge (queue full, total={total})",
        role.label()
    );
}
