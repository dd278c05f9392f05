//! Potentiometer sources for the host service.
//!
//! On a Raspberry Pi the ADS1115 is bound by the kernel `ads1015` driver and
//! exposed through IIO sysfs; without one, a simulated potentiometer holds a
//! voltage set from the pulse feed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::warn;
use wheel_core::query::{AnalogError, AnalogSource, Voltage};

/// Default IIO device node for the first ADC on the bus.
pub const DEFAULT_IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";

/// Reads `in_voltage<N>_raw` and `in_voltage<N>_scale` (millivolts per
/// count) on every conversion.
#[derive(Debug, Clone)]
pub struct IioAdc {
    raw_path: PathBuf,
    scale_path: PathBuf,
}

impl IioAdc {
    pub fn new(device: impl AsRef<Path>, channel: u8) -> Self {
        let device = device.as_ref();
        Self {
            raw_path: device.join(format!("in_voltage{channel}_raw")),
            scale_path: device.join(format!("in_voltage{channel}_scale")),
        }
    }

    pub fn read(&self) -> Result<Voltage, AnalogError> {
        let raw = read_number(&self.raw_path)?;
        let millivolts_per_count = read_number(&self.scale_path)?;
        let volts = raw * millivolts_per_count / 1000.0;
        if !volts.is_finite() {
            return Err(AnalogError::Malformed);
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(volts as f32)
    }
}

fn read_number(path: &Path) -> Result<f64, AnalogError> {
    let text = fs::read_to_string(path).map_err(|err| {
        warn!(path = %path.display(), %err, "adc attribute unreadable");
        AnalogError::SensorUnavailable
    })?;
    text.trim().parse::<f64>().map_err(|err| {
        warn!(path = %path.display(), %err, "adc attribute is not a number");
        AnalogError::Malformed
    })
}

/// Potentiometer emulated in memory; the voltage is stored as `f32` bits.
#[derive(Debug)]
pub struct SimulatedPot {
    bits: AtomicU32,
}

impl SimulatedPot {
    pub fn new(volts: Voltage) -> Self {
        Self {
            bits: AtomicU32::new(volts.to_bits()),
        }
    }

    pub fn set(&self, volts: Voltage) {
        self.bits.store(volts.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> Voltage {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// The potentiometer source selected at startup.
#[derive(Debug)]
pub enum HostAnalog {
    Iio(IioAdc),
    Simulated(SimulatedPot),
}

impl HostAnalog {
    pub fn simulated(&self) -> Option<&SimulatedPot> {
        match self {
            HostAnalog::Simulated(pot) => Some(pot),
            HostAnalog::Iio(_) => None,
        }
    }
}

// Shared references are enough: neither source keeps per-read state.
impl AnalogSource for &HostAnalog {
    fn read_voltage(&mut self) -> Result<Voltage, AnalogError> {
        match *self {
            HostAnalog::Iio(adc) => adc.read(),
            HostAnalog::Simulated(pot) => Ok(pot.get()),
        }
    }
}
