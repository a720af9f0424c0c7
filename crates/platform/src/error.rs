//! Error types shared by every peripheral component.
//!
//! Two families, matching how the firmware reacts to them:
//!
//! - [`ConfigError`]: raised while bringing hardware up, or when a caller
//!   passes a value the register cannot hold. Fatal at boot.
//! - [`SensorError`]: raised by on-demand sensor reads. Returned to the
//!   control loop, which decides whether to retry.

use thiserror_no_std::Error;

use crate::gpio::PinId;
use crate::timer::{Channel, TimerId};

/// Which ready flag a bounded clock wait gave up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockWait {
    /// Oscillator (HSI or HSE) ready flag.
    #[error("oscillator ready")]
    Oscillator,
    /// Main PLL lock flag.
    #[error("PLL lock")]
    PllLock,
    /// System clock switch status.
    #[error("SYSCLK switch")]
    SysclkSwitch,
}

/// Startup or configuration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// No preset exists for this oscillator / target pair.
    #[error("no clock preset for {oscillator_hz} Hz oscillator at {target_hz} Hz SYSCLK")]
    UnsupportedClockTarget {
        /// Oscillator frequency in Hz.
        oscillator_hz: u32,
        /// Requested SYSCLK in Hz.
        target_hz: u32,
    },
    /// A derived frequency exceeds (or falls below) the silicon limit.
    #[error("{domain} clock {actual_hz} Hz outside limit {limit_hz} Hz")]
    ClockLimitExceeded {
        /// Clock domain name (e.g. "APB1", "VCO").
        domain: &'static str,
        /// Derived frequency.
        actual_hz: u32,
        /// Violated bound.
        limit_hz: u32,
    },
    /// A PLL factor is outside its register range or divides to zero.
    #[error("invalid PLL factor {name}={value}")]
    InvalidPllFactor {
        /// Factor name: "M", "N", "P" or "Q".
        name: &'static str,
        /// Offending value.
        value: u16,
    },
    /// A bounded ready-flag wait ran out of polls.
    #[error("clock did not become ready: {0}")]
    ClockTimeout(ClockWait),
    /// Alternate function given for a non-alternate mode.
    #[error("alternate function supplied for a non-alternate pin mode")]
    UnexpectedAlternateFunction(PinId),
    /// Alternate mode requested without a function number.
    #[error("alternate pin mode requires a function number")]
    MissingAlternateFunction(PinId),
    /// The pin does not route this function number to any board signal.
    #[error("pin has no alternate function {af}")]
    UnsupportedAlternateFunction {
        /// Pin being bound.
        pin: PinId,
        /// Requested function number.
        af: u8,
    },
    /// Line number past the last pin of a bank.
    #[error("GPIO line {0} out of range")]
    PinOutOfRange(u8),
    /// Level written to a pin that is not bound as an output.
    #[error("pin is not bound as an output")]
    PinNotOutput(PinId),
    /// Requested counter tick is faster than the bus clock.
    #[error("counter tick {tick_hz} Hz above bus clock {bus_hz} Hz")]
    PrescalerUnderflow {
        /// Bus clock feeding the timer.
        bus_hz: u32,
        /// Requested tick.
        tick_hz: u32,
    },
    /// Prescaler would not fit the 16-bit register.
    #[error("prescaler {0} exceeds register width")]
    PrescalerOverflow(u32),
    /// A period of zero counts cannot be programmed.
    #[error("timer period must be at least one count")]
    ZeroPeriod(TimerId),
    /// Compare value above the programmed period.
    #[error("compare {compare} above period {period}")]
    CompareOutOfRange {
        /// Requested compare value.
        compare: u16,
        /// Current period.
        period: u16,
    },
    /// Tone frequency is not finite or not positive, or its tick overflows.
    #[error("tone frequency outside the supported range")]
    FrequencyOutOfRange,
    /// Channel not owned by this generator.
    #[error("channel not configured on this timer")]
    ChannelNotConfigured,
    /// The timer has no such capture/compare channel.
    #[error("timer lacks the requested channel")]
    ChannelNotOnTimer {
        /// Timer being configured.
        timer: TimerId,
        /// Channel it lacks.
        channel: Channel,
    },
    /// SysTick reload does not fit 24 bits, or the tick rate is zero.
    #[error("tick reload {0} out of range")]
    TickReloadOutOfRange(u32),
}

/// Runtime failure of an on-demand sensor read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// SPI transaction to the external sensor failed.
    #[error("sensor bus transaction failed")]
    Bus,
    /// Identity register returned an unexpected value.
    #[error("unexpected device id {found:#04x}, expected {expected:#04x}")]
    UnexpectedDevice {
        /// Value read back.
        found: u8,
        /// Value the board expects.
        expected: u8,
    },
    /// ADC reported an overrun; the sample in the data register is stale.
    #[error("ADC overrun")]
    AdcOverrun,
    /// ADC end-of-conversion never arrived within the poll budget.
    #[error("ADC conversion timed out")]
    AdcTimeout,
    /// Digital input could not be read.
    #[error("GPIO read failed")]
    Gpio,
    /// The board has not finished booting.
    #[error("board not initialised")]
    NotReady,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_compare_by_value() {
        let a = ConfigError::PrescalerOverflow(70_000);
        assert_eq!(a, ConfigError::PrescalerOverflow(70_000));
        assert_ne!(a, ConfigError::PrescalerOverflow(1));
    }

    #[test]
    fn sensor_error_display_names_device_ids() {
        let err = SensorError::UnexpectedDevice {
            found: 0x12,
            expected: 0x70,
        };
        let text = format!("{err}");
        assert!(text.contains("0x12"), "{text}");
        assert!(text.contains("0x70"), "{text}");
    }

    #[test]
    fn clock_timeout_names_the_flag() {
        let text = format!("{}", ConfigError::ClockTimeout(ClockWait::PllLock));
        assert_eq!(text, "clock did not become ready: PLL lock");
    }
}
