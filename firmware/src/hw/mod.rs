//! Board-level helpers for the potentiometer input.

#[cfg(target_os = "none")]
pub mod adc;

use wheel_core::query::Voltage;

/// Supply rail the ADC measures against.
pub const ADC_REFERENCE_VOLTS: f32 = 3.3;

/// Full-scale count of the 12-bit converter.
pub const ADC_FULL_SCALE: u16 = 4095;

/// Converts a raw 12-bit conversion into volts at the pin.
pub fn counts_to_volts(raw: u16) -> Voltage {
    let clamped = raw.min(ADC_FULL_SCALE);
    f32::from(clamped) * ADC_REFERENCE_VOLTS / f32::from(ADC_FULL_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_spans_the_reference_rail() {
        assert!(counts_to_volts(0).abs() < f32::EPSILON);
        assert!((counts_to_volts(ADC_FULL_SCALE) - ADC_REFERENCE_VOLTS).abs() < 1e-6);
        assert!((counts_to_volts(2048) - 1.650_4).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_counts_saturate() {
        assert!((counts_to_volts(u16::MAX) - ADC_REFERENCE_VOLTS).abs() < 1e-6);
    }
}
