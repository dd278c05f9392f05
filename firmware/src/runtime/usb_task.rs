use embassy_futures::join::join;
use embassy_futures::select::{Either, select};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_usb::class::cdc_acm::{ControlChanged, Receiver, Sender};
use embassy_usb::driver::EndpointError;
use wheel_core::config::WheelConfig;
use wheel_core::query::QueryInterface;

use super::USB_STORAGE;
use crate::hw::adc::PotentiometerAdc;
use crate::pulses::{FirmwareInstant, FirmwareTelemetry};
use crate::session::{self, Ingest, LineAssembler, ResponseLine};
use crate::usb::{self, UsbDeviceStrings};

type RequestQuery =
    QueryInterface<'static, CriticalSectionRawMutex, FirmwareInstant, PotentiometerAdc<'static>>;

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
    potentiometer: PotentiometerAdc<'static>,
    telemetry: &'static FirmwareTelemetry,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);
    let usb::UsbLink { mut device, port } =
        usb::UsbLink::new(driver, storage, UsbDeviceStrings::default());

    let query = QueryInterface::new(telemetry, potentiometer, WheelConfig::DEFAULT);
    let session = serve_requests(port.sender, port.receiver, port.control, query);

    join(device.run(), session).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn serve_requests<D>(
    mut sender: Sender<'static, D>,
    mut receiver: Receiver<'static, D>,
    control: ControlChanged<'static>,
    mut query: RequestQuery,
) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut assembler = LineAssembler::new();
    let mut response = ResponseLine::new();

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &mut sender).await;
        assembler.reset();

        defmt::info!("usb: request interface connected");

        'connected: loop {
            let count = match select(receiver.read_packet(&mut ingress), control.control_changed())
                .await
            {
                Either::First(Ok(count)) => count,
                Either::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: request interface disabled");
                    break;
                }
                Either::First(Err(_)) => {
                    defmt::warn!("usb: read error");
                    continue;
                }
                Either::Second(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: host dropped DTR");
                        break;
                    }
                    continue;
                }
            };

            for &byte in &ingress[..count] {
                let status = match assembler.ingest(byte) {
                    Ingest::Pending => continue,
                    Ingest::Line => match assembler.line() {
                        Ok(line) => {
                            session::answer(&mut query, line, FirmwareInstant::now(), &mut response)
                        }
                        Err(error) => session::answer_rejected(error, &mut response),
                    },
                    Ingest::Rejected(error) => session::answer_rejected(error, &mut response),
                };
                defmt::debug!("usb: answered {}", status.code());

                match write_line(&mut sender, &response).await {
                    Ok(()) => {}
                    Err(EndpointError::Disabled) => {
                        defmt::warn!("usb: write disabled");
                        break 'connected;
                    }
                    Err(_) => defmt::warn!("usb: write error"),
                }
            }
        }
    }
}

async fn write_line<D>(
    sender: &mut Sender<'static, D>,
    line: &ResponseLine,
) -> Result<(), EndpointError>
where
    D: embassy_usb::driver::Driver<'static>,
{
    let max = usize::from(usb::MAX_PACKET_SIZE);
    let bytes = line.as_bytes();
    for chunk in bytes.chunks(max) {
        sender.write_packet(chunk).await?;
    }
    if bytes.len() % max == 0 {
        sender.write_packet(&[]).await?;
    }
    Ok(())
}

async fn wait_for_dtr<D>(control: &ControlChanged<'static>, sender: &mut Sender<'static, D>)
where
    D: embassy_usb::driver::Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
