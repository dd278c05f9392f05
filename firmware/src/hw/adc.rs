//! On-chip ADC wrapper answering potentiometer reads.

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::ADC1;
use wheel_core::query::{AnalogError, AnalogSource, Voltage};

use super::counts_to_volts;

/// Performs one blocking conversion on PA0 per read.
pub struct PotentiometerAdc<'d> {
    adc: Adc<'d, ADC1>,
    channel: AnyAdcChannel<ADC1>,
}

impl<'d> PotentiometerAdc<'d> {
    pub fn new(mut adc: Adc<'d, ADC1>, channel: AnyAdcChannel<ADC1>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self { adc, channel }
    }
}

impl AnalogSource for PotentiometerAdc<'_> {
    fn read_voltage(&mut self) -> Result<Voltage, AnalogError> {
        let raw = self.adc.blocking_read(&mut self.channel);
        Ok(counts_to_volts(raw))
    }
}
