use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::{Adc, AdcChannel};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Pull;
use embassy_sync::channel::Channel;
use static_cell::StaticCell;
use wheel_core::config::{POTENTIOMETER, SENSOR_LINES, SensorPull, SensorRole, sensor_by_role};
use wheel_core::telemetry::TelemetryState;

use crate::hw::adc::PotentiometerAdc;
use crate::pulses::{FirmwareTelemetry, PulseQueue};
use crate::usb;

mod pulse_task;
mod pump_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static PULSE_QUEUE: PulseQueue = Channel::new();
pub(super) static TELEMETRY: FirmwareTelemetry = TelemetryState::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

const fn pull_for(role: SensorRole) -> Pull {
    match sensor_by_role(role).pull {
        SensorPull::Down => Pull::Down,
        SensorPull::Up => Pull::Up,
    }
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PB3,
        PB4,
        PB5,
        EXTI3,
        EXTI4,
        EXTI5,
        ADC1,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let speed = ExtiInput::new(PB3, EXTI3, pull_for(SensorRole::Speed));
    let forward = ExtiInput::new(PB4, EXTI4, pull_for(SensorRole::ForwardMarker));
    let reverse = ExtiInput::new(PB5, EXTI5, pull_for(SensorRole::ReverseMarker));

    for line in &SENSOR_LINES {
        defmt::info!(
            "sensor {} ({}) on {}",
            line.role.label(),
            line.name,
            line.mcu_pin
        );
    }
    defmt::info!("{} on {}", POTENTIOMETER.name, POTENTIOMETER.mcu_pin);

    let potentiometer = PotentiometerAdc::new(Adc::new(ADC1), PA0.degrade_adc());

    spawner
        .spawn(pump_task::run(PULSE_QUEUE.receiver(), &TELEMETRY))
        .expect("failed to spawn pulse pump task");

    for (input, role) in [
        (speed, SensorRole::Speed),
        (forward, SensorRole::ForwardMarker),
        (reverse, SensorRole::ReverseMarker),
    ] {
        spawner
            .spawn(pulse_task::run(input, role, PULSE_QUEUE.sender()))
            .expect("failed to spawn pulse edge task");
    }

    spawner
        .spawn(usb_task::run(USB, PA12, PA11, potentiometer, &TELEMETRY))
        .expect("failed to spawn USB task");

    core::future::pending::<()>().await;
}
