use wheel_core::config::WheelConfig;
use wheel_core::pulse::PulseEventProcessor;

use crate::pulses::{self, FirmwareTelemetry, PulseReceiver};

/// Applies queued pulses to the shared telemetry record, one at a time.
#[embassy_executor::task]
pub async fn run(
    receiver: PulseReceiver<'static>,
    telemetry: &'static FirmwareTelemetry,
) -> ! {
    let processor = PulseEventProcessor::new(WheelConfig::DEFAULT, telemetry);

    loop {
        let event = receiver.receive().await;
        pulses::log_outcome(event, processor.handle(event));
    }
}
