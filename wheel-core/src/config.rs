//! Calibration constants and the sensor wiring catalog.
//!
//! [`WheelConfig`] carries every tunable the pulse processor and query
//! interface consult. It is built once at startup (the firmware uses
//! [`WheelConfig::DEFAULT`], the host service layers a TOML file and CLI
//! flags on top) and passed by value into the components that need it.

use core::fmt;
use core::time::Duration;

/// Default wheel circumference in metres (distance travelled per speed pulse).
pub const DEFAULT_WHEEL_CIRCUMFERENCE_M: f32 = 1.75;

/// Default upper clamp applied to the computed speed level.
pub const DEFAULT_SPEED_CEILING: u8 = 100;

/// Value reported through the speed channel when reverse motion is detected.
pub const REVERSE_SENTINEL: f32 = -2.5;

/// Tunables shared by the pulse processor and the query interface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WheelConfig {
    /// Distance covered between two speed pulses, in metres. Finite and > 0.
    pub wheel_circumference: f32,
    /// Upper bound for the reported speed level. Must be non-zero.
    pub speed_ceiling: u8,
    /// Sentinel reported instead of a speed level while reversing.
    pub reverse_sentinel: f32,
    /// Reverse verdicts older than this window are ignored by
    /// [`crate::query::QueryInterface::get_speed_at`]. `None` keeps markers forever.
    pub marker_staleness: Option<Duration>,
    /// A speed pulse arriving after a gap longer than this re-arms the sample
    /// instead of producing a speed level. `None` never re-arms.
    pub idle_rearm: Option<Duration>,
}

impl WheelConfig {
    /// Calibration used when nothing else is configured.
    pub const DEFAULT: Self = Self {
        wheel_circumference: DEFAULT_WHEEL_CIRCUMFERENCE_M,
        speed_ceiling: DEFAULT_SPEED_CEILING,
        reverse_sentinel: REVERSE_SENTINEL,
        marker_staleness: None,
        idle_rearm: None,
    };

    /// Builds a configuration with the supplied circumference and ceiling,
    /// rejecting values that would make the speed computation meaningless.
    ///
    /// # Errors
    ///
    /// See [`Self::validated`].
    pub fn new(wheel_circumference: f32, speed_ceiling: u8) -> Result<Self, ConfigError> {
        Self {
            wheel_circumference,
            speed_ceiling,
            ..Self::DEFAULT
        }
        .validated()
    }

    /// Sets the reverse-marker staleness window.
    #[must_use]
    pub const fn with_marker_staleness(mut self, window: Option<Duration>) -> Self {
        self.marker_staleness = window;
        self
    }

    /// Sets the idle gap after which a speed pulse re-arms the sample.
    #[must_use]
    pub const fn with_idle_rearm(mut self, gap: Option<Duration>) -> Self {
        self.idle_rearm = gap;
        self
    }

    /// Checks the invariants documented on each field.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] naming the first field that is out of range.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if !self.wheel_circumference.is_finite() || self.wheel_circumference <= 0.0 {
            return Err(ConfigError::InvalidCircumference);
        }
        if self.speed_ceiling == 0 {
            return Err(ConfigError::ZeroSpeedCeiling);
        }
        if !self.reverse_sentinel.is_finite() {
            return Err(ConfigError::InvalidSentinel);
        }
        Ok(self)
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Reasons a [`WheelConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    InvalidCircumference,
    ZeroSpeedCeiling,
    InvalidSentinel,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCircumference => {
                f.write_str("wheel circumference must be a finite value greater than zero")
            }
            ConfigError::ZeroSpeedCeiling => f.write_str("speed ceiling must be non-zero"),
            ConfigError::InvalidSentinel => f.write_str("reverse sentinel must be finite"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Role played by each digital sensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SensorRole {
    /// Primary speed sensor; one pulse per wheel revolution.
    Speed,
    /// "Down" direction sensor; fires first when moving forward.
    ForwardMarker,
    /// "Up" direction sensor; fires first when moving in reverse.
    ReverseMarker,
}

impl SensorRole {
    /// Deterministic index for lookups into [`SENSOR_LINES`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            SensorRole::Speed => 0,
            SensorRole::ForwardMarker => 1,
            SensorRole::ReverseMarker => 2,
        }
    }

    /// Short label used in logs and on the wire.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SensorRole::Speed => "speed",
            SensorRole::ForwardMarker => "forward-marker",
            SensorRole::ReverseMarker => "reverse-marker",
        }
    }
}

impl fmt::Display for SensorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Input bias applied to a sensor line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorPull {
    /// Pulled low at rest; pulses are rising edges.
    Down,
    /// Pulled high at rest; pulses are falling edges.
    Up,
}

/// Metadata describing how a sensor is wired on each target.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SensorLine {
    pub role: SensorRole,
    pub name: &'static str,
    /// Broadcom GPIO number on the Raspberry Pi header.
    pub host_gpio: u8,
    /// Pin on the STM32G0 controller.
    pub mcu_pin: &'static str,
    pub pull: SensorPull,
}

impl SensorLine {
    #[must_use]
    pub const fn new(
        role: SensorRole,
        name: &'static str,
        host_gpio: u8,
        mcu_pin: &'static str,
        pull: SensorPull,
    ) -> Self {
        Self {
            role,
            name,
            host_gpio,
            mcu_pin,
            pull,
        }
    }
}

/// Compile-time catalog of every sensor line.
pub const SENSOR_LINES: [SensorLine; 3] = [
    SensorLine::new(
        SensorRole::Speed,
        "back-tyre",
        27,
        "PB3",
        SensorPull::Down,
    ),
    SensorLine::new(
        SensorRole::ForwardMarker,
        "middle-down",
        22,
        "PB4",
        SensorPull::Down,
    ),
    SensorLine::new(
        SensorRole::ReverseMarker,
        "middle-up",
        17,
        "PB5",
        SensorPull::Down,
    ),
];

/// Retrieve sensor metadata by role.
#[must_use]
pub const fn sensor_by_role(role: SensorRole) -> SensorLine {
    SENSOR_LINES[role.as_index()]
}

/// Analog input carrying the steering potentiometer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AnalogLine {
    pub name: &'static str,
    /// Channel on the external ADS1115 used by the host deployment.
    pub ads1115_channel: u8,
    /// ADC-capable pin on the STM32G0 controller.
    pub mcu_pin: &'static str,
}

/// The single potentiometer input.
pub const POTENTIOMETER: AnalogLine = AnalogLine {
    name: "potentiometer",
    ads1115_channel: 0,
    mcu_pin: "PA0",
};
