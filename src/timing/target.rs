//! Technology models

use std::fmt;

use crate::BitHeapError;

/// Delay model of the device the heap is generated for
///
/// All delays are in seconds.
pub trait TechnologyModel: fmt::Debug {
    /// Number of LUT inputs; bounds the inputs of a compressor
    fn lut_width(&self) -> usize;

    /// Delay through one LUT
    fn lut_delay(&self) -> f64;

    /// Delay of a short local route
    fn local_wire_delay(&self) -> f64;

    /// Register setup plus clock-to-output delay
    fn ff_delay(&self) -> f64 {
        0.0
    }

    /// Clock period
    fn clock_period(&self) -> f64;

    /// Whether registers are inserted when logic overflows a cycle
    fn is_pipelined(&self) -> bool {
        true
    }

    /// Delay of one compression level
    fn elementary_delay(&self) -> f64 {
        self.lut_delay() + self.local_wire_delay()
    }

    /// Delay of a `width`-bit carry-propagating adder
    fn adder_delay(&self, width: usize) -> f64;

    /// Delay of a `width`-bit three-input adder
    fn ternary_adder_delay(&self, width: usize) -> f64 {
        self.adder_delay(width) + self.lut_delay()
    }

    /// Whether three-input adders map efficiently onto the device
    fn supports_ternary_adders(&self) -> bool {
        false
    }

    /// Widest adder built as a single carry chain; wider final adders are split
    fn max_adder_width(&self) -> Option<usize> {
        None
    }
}

/// Parametric FPGA-like target
///
/// The default is a 4-input LUT device clocked at 400 MHz with pipelining
/// enabled and no ternary adders.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericTarget {
    lut_width: usize,
    lut_delay: f64,
    local_wire_delay: f64,
    ff_delay: f64,
    carry_delay: f64,
    frequency: f64,
    pipelined: bool,
    ternary_adders: bool,
    max_adder_width: Option<usize>,
}

impl Default for GenericTarget {
    fn default() -> Self {
        Self {
            lut_width: 4,
            lut_delay: 0.5e-9,
            local_wire_delay: 0.3e-9,
            ff_delay: 0.2e-9,
            carry_delay: 0.05e-9,
            frequency: 400e6,
            pipelined: true,
            ternary_adders: false,
            max_adder_width: None,
        }
    }
}

impl GenericTarget {
    /// Modern 6-input LUT device
    pub fn six_input() -> Self {
        Self {
            lut_width: 6,
            lut_delay: 0.4e-9,
            local_wire_delay: 0.35e-9,
            ff_delay: 0.15e-9,
            carry_delay: 0.03e-9,
            ..Self::default()
        }
    }

    /// Set the LUT input count
    pub fn with_lut_width(mut self, lut_width: usize) -> Self {
        self.lut_width = lut_width;
        self
    }

    /// Set the LUT delay
    pub fn with_lut_delay(mut self, delay: f64) -> Self {
        self.lut_delay = delay;
        self
    }

    /// Set the local wire delay
    pub fn with_local_wire_delay(mut self, delay: f64) -> Self {
        self.local_wire_delay = delay;
        self
    }

    /// Set the per-bit carry propagation delay
    pub fn with_carry_delay(mut self, delay: f64) -> Self {
        self.carry_delay = delay;
        self
    }

    /// Set the target frequency in Hz
    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Enable or disable register insertion
    pub fn with_pipelining(mut self, pipelined: bool) -> Self {
        self.pipelined = pipelined;
        self
    }

    /// Allow ternary final adders
    pub fn with_ternary_adders(mut self, enabled: bool) -> Self {
        self.ternary_adders = enabled;
        self
    }

    /// Split final adders wider than `width` bits
    pub fn with_max_adder_width(mut self, width: Option<usize>) -> Self {
        self.max_adder_width = width;
        self
    }

    /// Frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Reject parameters no heap can be scheduled with
    pub fn validate(&self) -> Result<(), BitHeapError> {
        if self.lut_width < 3 {
            return Err(BitHeapError::InvalidConfig(format!(
                "LUT width {} cannot host a full adder",
                self.lut_width
            )));
        }
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(BitHeapError::InvalidConfig(format!(
                "frequency {} must be positive",
                self.frequency
            )));
        }
        let delays = [
            self.lut_delay,
            self.local_wire_delay,
            self.ff_delay,
            self.carry_delay,
        ];
        if delays.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(BitHeapError::InvalidConfig(
                "delays must be finite and non-negative".to_string(),
            ));
        }
        if self.elementary_delay() <= 0.0 {
            return Err(BitHeapError::InvalidConfig(
                "LUT plus wire delay must be positive".to_string(),
            ));
        }
        if self.max_adder_width == Some(0) {
            return Err(BitHeapError::InvalidConfig(
                "maximum adder width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TechnologyModel for GenericTarget {
    fn lut_width(&self) -> usize {
        self.lut_width
    }

    fn lut_delay(&self) -> f64 {
        self.lut_delay
    }

    fn local_wire_delay(&self) -> f64 {
        self.local_wire_delay
    }

    fn ff_delay(&self) -> f64 {
        self.ff_delay
    }

    fn clock_period(&self) -> f64 {
        1.0 / self.frequency
    }

    fn is_pipelined(&self) -> bool {
        self.pipelined
    }

    fn adder_delay(&self, width: usize) -> f64 {
        self.lut_delay + width as f64 * self.carry_delay
    }

    fn supports_ternary_adders(&self) -> bool {
        self.ternary_adders
    }

    fn max_adder_width(&self) -> Option<usize> {
        self.max_adder_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target() {
        let target = GenericTarget::default();
        assert_eq!(target.lut_width(), 4);
        assert!(target.is_pipelined());
        assert!(!target.supports_ternary_adders());
        assert!((target.clock_period() - 2.5e-9).abs() < 1e-18);
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_adder_delay_grows_with_width() {
        let target = GenericTarget::six_input();
        assert!(target.adder_delay(32) > target.adder_delay(8));
        assert!(target.ternary_adder_delay(8) > target.adder_delay(8));
    }

    #[test]
    fn test_validate_rejects_small_luts() {
        let target = GenericTarget::default().with_lut_width(2);
        assert!(matches!(
            target.validate(),
            Err(BitHeapError::InvalidConfig(_))
        ));
        let target = GenericTarget::default().with_frequency(0.0);
        assert!(target.validate().is_err());
    }
}
