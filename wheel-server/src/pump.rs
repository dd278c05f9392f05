use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use wheel_core::config::WheelConfig;
use wheel_core::pulse::{PulseEvent, PulseEventProcessor, PulseOutcome, SpeedUpdate};

use crate::clock::HostInstant;
use crate::sync::HostTelemetry;

/// Depth of the pulse channel between producers and the pump.
pub const PULSE_QUEUE_DEPTH: usize = 32;

pub type PulseSender = mpsc::Sender<PulseEvent<HostInstant>>;
pub type PulseReceiver = mpsc::Receiver<PulseEvent<HostInstant>>;

pub fn pulse_channel() -> (PulseSender, PulseReceiver) {
    mpsc::channel(PULSE_QUEUE_DEPTH)
}

/// Applies queued pulses until every sender is dropped; returns how many
/// events were applied.
pub async fn run_pump(
    mut events: PulseReceiver,
    telemetry: Arc<HostTelemetry>,
    config: WheelConfig,
) -> usize {
    let processor = PulseEventProcessor::new(config, &*telemetry);
    let mut applied = 0;
    while let Some(event) = events.recv().await {
        log_outcome(processor.handle(event));
        applied += 1;
    }
    debug!(applied, "pulse channel closed");
    applied
}

fn log_outcome(outcome: PulseOutcome) {
    match outcome {
        PulseOutcome::Speed(
            update @ (SpeedUpdate::Degenerate | SpeedUpdate::Rearmed { .. }),
        ) => warn!(%update, "speed pulse did not produce a level"),
        PulseOutcome::Speed(update) => debug!(%update, "speed pulse applied"),
        PulseOutcome::Marker(update) => {
            debug!(sensor = %update.role, direction = ?update.direction, "marker recorded");
        }
    }
}
