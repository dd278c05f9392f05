//! Consumer-facing read path.
//!
//! Front-ends (the HTTP service, the USB request line) build a
//! [`QueryInterface`] over the shared [`TelemetryState`] and an
//! [`AnalogSource`] and ask it for the two externally visible values.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::WheelConfig;
use crate::pulse::{Direction, PulseInstant};
use crate::telemetry::TelemetryState;

/// Potentiometer voltage, in volts.
pub type Voltage = f32;

/// Externally visible speed value.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpeedReading {
    /// Forward or stationary; clamped speed level.
    Level(u8),
    /// Reverse motion detected; reported as the configured sentinel.
    Reverse,
}

impl SpeedReading {
    /// Numeric value placed on the wire.
    #[must_use]
    pub fn value(self, sentinel: f32) -> f32 {
        match self {
            SpeedReading::Level(level) => f32::from(level),
            SpeedReading::Reverse => sentinel,
        }
    }
}

/// Failures reported by an analog source.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AnalogError {
    /// The converter could not be reached or did not answer.
    SensorUnavailable,
    /// The converter answered with something that is not a voltage.
    Malformed,
}

impl fmt::Display for AnalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalogError::SensorUnavailable => f.write_str("sensor unavailable"),
            AnalogError::Malformed => f.write_str("malformed sensor reading"),
        }
    }
}

impl core::error::Error for AnalogError {}

/// On-demand voltage reader backed by an ADC driver.
pub trait AnalogSource {
    /// Performs a fresh conversion; implementations must not cache.
    ///
    /// # Errors
    ///
    /// [`AnalogError::SensorUnavailable`] when the converter cannot be read and
    /// [`AnalogError::Malformed`] when its answer is not a voltage.
    fn read_voltage(&mut self) -> Result<Voltage, AnalogError>;
}

impl<A> AnalogSource for &mut A
where
    A: AnalogSource + ?Sized,
{
    fn read_voltage(&mut self) -> Result<Voltage, AnalogError> {
        (**self).read_voltage()
    }
}

/// Analog source used when no converter is wired.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoAnalogSource;

impl AnalogSource for NoAnalogSource {
    fn read_voltage(&mut self) -> Result<Voltage, AnalogError> {
        Err(AnalogError::SensorUnavailable)
    }
}

/// Read-only view over the telemetry record plus the analog collaborator.
pub struct QueryInterface<'a, M, TInstant, A>
where
    M: RawMutex,
    TInstant: PulseInstant,
{
    state: &'a TelemetryState<M, TInstant>,
    analog: A,
    config: WheelConfig,
}

impl<'a, M, TInstant, A> QueryInterface<'a, M, TInstant, A>
where
    M: RawMutex,
    TInstant: PulseInstant,
    A: AnalogSource,
{
    #[must_use]
    pub const fn new(
        state: &'a TelemetryState<M, TInstant>,
        analog: A,
        config: WheelConfig,
    ) -> Self {
        Self {
            state,
            analog,
            config,
        }
    }

    /// Reverse sentinel when the markers say so, otherwise the speed level.
    #[must_use]
    pub fn get_speed(&self) -> SpeedReading {
        let markers = self.state.direction_markers();
        match markers.direction() {
            Direction::Reverse => SpeedReading::Reverse,
            Direction::ForwardOrNeutral => SpeedReading::Level(self.state.speed_level()),
        }
    }

    /// Same as [`Self::get_speed`], honouring the configured marker staleness
    /// window relative to `now`.
    #[must_use]
    pub fn get_speed_at(&self, now: TInstant) -> SpeedReading {
        let markers = self.state.direction_markers();
        match markers.direction_at(now, self.config.marker_staleness) {
            Direction::Reverse => SpeedReading::Reverse,
            Direction::ForwardOrNeutral => SpeedReading::Level(self.state.speed_level()),
        }
    }

    /// Instantaneous potentiometer voltage.
    ///
    /// # Errors
    ///
    /// Passes through the [`AnalogError`] reported by the source.
    pub fn get_analog_reading(&mut self) -> Result<Voltage, AnalogError> {
        self.analog.read_voltage()
    }

    /// Numeric speed value as placed on the wire.
    #[must_use]
    pub fn speed_value(&self, reading: SpeedReading) -> f32 {
        reading.value(self.config.reverse_sentinel)
    }

    #[must_use]
    pub const fn config(&self) -> &WheelConfig {
        &self.config
    }
}
