//! Single-channel voltage sensing through the on-chip ADC.
//!
//! A read starts one regular conversion, polls end-of-conversion a bounded
//! number of times and scales the 12-bit result to volts at the divider input.
//! An overrun or a missing EOC is reported as a [`SensorError`]; a stale or
//! zero sample is never returned in its place.

use crate::config::ADC_EOC_MAX_POLLS;
use crate::error::SensorError;

/// ADC reference voltage on this board.
pub const ADC_VREF_VOLTS: f32 = 3.3;

/// Full-scale count of a 12-bit conversion.
pub const ADC_FULL_SCALE: f32 = 4096.0;

/// Volts per LSB at the ADC pin.
pub const ADC_LSB: f32 = ADC_VREF_VOLTS / ADC_FULL_SCALE;

/// Conversion state reported by the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConversionStatus {
    /// Conversion still running.
    Busy,
    /// EOC set; data register holds a fresh sample.
    Complete,
    /// OVR set; a sample was lost.
    Overrun,
}

/// Register access to one ADC configured for a single regular channel.
pub trait AdcChannel {
    /// Power the ADC and select the channel and sample time.
    fn configure(&mut self);

    /// CR2.SWSTART.
    fn start_conversion(&mut self);

    /// SR.EOC / SR.OVR.
    fn status(&mut self) -> ConversionStatus;

    /// DR (clears EOC).
    fn read_data(&mut self) -> u16;

    /// Clear SR.OVR.
    fn clear_overrun(&mut self);
}

/// Scaled voltage reading from one ADC channel.
pub struct VoltageSensor<A> {
    adc: A,
    volts_per_count: f32,
    max_polls: u32,
}

impl<A: AdcChannel> VoltageSensor<A> {
    /// Configure `adc`; readings are scaled by `ADC_LSB × divider_factor`.
    pub fn init(mut adc: A, divider_factor: f32) -> Self {
        adc.configure();
        Self {
            adc,
            volts_per_count: ADC_LSB * divider_factor,
            max_polls: ADC_EOC_MAX_POLLS,
        }
    }

    /// Override the EOC poll budget.
    #[must_use]
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// One raw 12-bit conversion.
    pub fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.adc.start_conversion();
        for _ in 0..self.max_polls {
            match self.adc.status() {
                ConversionStatus::Busy => {}
                ConversionStatus::Complete => return Ok(self.adc.read_data()),
                ConversionStatus::Overrun => {
                    self.adc.clear_overrun();
                    #[cfg(feature = "defmt")]
                    defmt::warn!("adc: overrun");
                    return Err(SensorError::AdcOverrun);
                }
            }
        }
        #[cfg(feature = "defmt")]
        defmt::warn!("adc: no end-of-conversion after {=u32} polls", self.max_polls);
        Err(SensorError::AdcTimeout)
    }

    /// One conversion scaled to volts.
    pub fn read_volts(&mut self) -> Result<f32, SensorError> {
        self.read_raw().map(|raw| f32::from(raw) * self.volts_per_count)
    }

    /// Volts per count applied by [`read_volts`](Self::read_volts).
    pub fn volts_per_count(&self) -> f32 {
        self.volts_per_count
    }
}
