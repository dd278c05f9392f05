use embassy_stm32::exti::ExtiInput;
use wheel_core::config::SensorRole;
use wheel_core::pulse::PulseEvent;

use crate::pulses::{self, FirmwareInstant, PulseSender};

/// Waits for rising edges on one sensor line and queues a stamped pulse per edge.
#[embassy_executor::task(pool_size = 3)]
pub async fn run(
    mut input: ExtiInput<'static>,
    role: SensorRole,
    sender: PulseSender<'static>,
) -> ! {
    defmt::info!("pulse:{} edge task armed", role.label());

    loop {
        input.wait_for_rising_edge().await;
        let event = PulseEvent::from_role(role, FirmwareInstant::now());
        pulses::offer(&sender, event);
    }
}
