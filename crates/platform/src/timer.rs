//! Timer identities, capability traits and prescaler arithmetic.
//!
//! The prescaler rule used throughout the crate is
//!
//! ```text
//! prescaler = bus_clock_hz / counter_tick_hz - 1      (integer division)
//! tick_hz   = bus_clock_hz / (prescaler + 1)
//! ```
//!
//! where `bus_clock_hz` is the APB frequency from the
//! [`ClockPlan`](crate::clock_tree::ClockPlan) of the bus the timer hangs on.
//! Integer truncation means the achieved tick can be faster than requested;
//! [`effective_tick_hz`] reports what the hardware will actually do.

use crate::clock_tree::Bus;
use crate::config::TIMER_MAX_PRESCALER;
use crate::error::ConfigError;

/// Timers this board uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TimerId {
    /// General-purpose, left wheel encoder.
    Tim3,
    /// General-purpose, right wheel encoder.
    Tim4,
    /// Advanced-control, motor driver PWM.
    Tim8,
    /// Single-channel, speaker PWM.
    Tim11,
}

impl TimerId {
    /// Bus whose clock feeds this timer's prescaler.
    pub const fn bus(self) -> Bus {
        match self {
            TimerId::Tim3 | TimerId::Tim4 => Bus::Apb1,
            TimerId::Tim8 | TimerId::Tim11 => Bus::Apb2,
        }
    }

    /// Number of capture/compare channels.
    pub const fn channel_count(self) -> usize {
        match self {
            TimerId::Tim3 | TimerId::Tim4 | TimerId::Tim8 => 4,
            TimerId::Tim11 => 1,
        }
    }

    /// Whether the timer has a break/dead-time register (BDTR.MOE gates outputs).
    pub const fn has_main_output_enable(self) -> bool {
        matches!(self, TimerId::Tim8)
    }
}

/// Capture/compare channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Channel {
    /// OC1
    Ch1,
    /// OC2
    Ch2,
    /// OC3
    Ch3,
    /// OC4
    Ch4,
}

impl Channel {
    /// All four channels in register order.
    pub const ALL: [Channel; 4] = [Channel::Ch1, Channel::Ch2, Channel::Ch3, Channel::Ch4];

    /// Zero-based index (CCR1 → 0).
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Register access to one timer configured as a PWM source.
///
/// Methods map one-to-one onto register writes; the order in which they are
/// called is owned by [`PwmGenerator`](crate::pwm::PwmGenerator).
pub trait PwmTimer {
    /// CR1: edge-aligned (CMS = 00), up-counting (DIR = 0), clock division 1.
    fn set_edge_aligned_up(&mut self);

    /// PSC register.
    fn set_prescaler(&mut self, prescaler: u16);

    /// ARR register. The counter runs `0..=auto_reload`.
    fn set_auto_reload(&mut self, auto_reload: u16);

    /// RCR register (advanced timers only; no-op elsewhere).
    fn set_repetition_counter(&mut self, value: u8);

    /// CR1.ARPE: buffer ARR writes until the next update event.
    fn enable_auto_reload_preload(&mut self);

    /// CR1.OPM = 0: keep counting after an update event.
    fn set_continuous(&mut self);

    /// OCxM = PWM mode 1 with OCxPE set.
    fn set_pwm_mode1(&mut self, channel: Channel);

    /// CCRx register.
    fn set_compare(&mut self, channel: Channel, value: u16);

    /// CCER.CCxE = 1.
    fn enable_output(&mut self, channel: Channel);

    /// CCER.CCxE = 0.
    fn disable_output(&mut self, channel: Channel);

    /// BDTR.MOE = 1.
    fn enable_main_output(&mut self);

    /// EGR.UG: reload PSC/ARR/CCR shadows immediately.
    fn generate_update(&mut self);

    /// CR1.CEN = 1.
    fn enable_counter(&mut self);

    /// CR1.CEN = 0.
    fn disable_counter(&mut self);
}

/// Register access to one timer configured as a quadrature decoder.
pub trait EncoderTimer {
    /// SMCR.SMS = encoder mode 3, both inputs as captures, ARR = 0xFFFF, CEN.
    fn configure_quadrature(&mut self);

    /// CNT register.
    fn count(&self) -> u16;
}

/// Prescaler that divides `bus_hz` down to (at least) `tick_hz`.
///
/// Fails if the tick is faster than the bus, or the quotient does not fit the
/// 16-bit PSC register.
pub fn prescaler_for(bus_hz: u32, tick_hz: u32) -> Result<u16, ConfigError> {
    let ratio = bus_hz.checked_div(tick_hz).unwrap_or(0);
    let prescaler = ratio
        .checked_sub(1)
        .ok_or(ConfigError::PrescalerUnderflow { bus_hz, tick_hz })?;
    if prescaler > TIMER_MAX_PRESCALER {
        return Err(ConfigError::PrescalerOverflow(prescaler));
    }
    u16::try_from(prescaler).map_err(|_| ConfigError::PrescalerOverflow(prescaler))
}

/// Counter tick the hardware produces for a given prescaler.
pub fn effective_tick_hz(bus_hz: u32, prescaler: u16) -> u32 {
    let divider = u32::from(prescaler).saturating_add(1);
    bus_hz.checked_div(divider).unwrap_or(0)
}

/// PWM output frequency for a counter tick and a period in counts.
#[allow(clippy::cast_precision_loss)]
pub fn output_frequency_hz(tick_hz: u32, period: u16) -> f32 {
    if period == 0 {
        return 0.0;
    }
    tick_hz as f32 / f32::from(period)
}

/// Duty ratio in `[0, 1]` for PWM mode 1 with `ARR = period - 1`.
///
/// `compare = 0` never asserts the output; `compare >= period` asserts it for
/// the whole cycle.
pub fn duty_ratio(compare: u16, period: u16) -> f32 {
    if period == 0 {
        return 0.0;
    }
    f32::from(compare.min(period)) / f32::from(period)
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn motor_tick_from_84mhz_truncates_to_prescaler_2() {
        assert_eq!(prescaler_for(84_000_000, 24_000_000), Ok(2));
        assert_eq!(effective_tick_hz(84_000_000, 2), 28_000_000);
    }

    #[test]
    fn speaker_base_tick_is_exact() {
        assert_eq!(prescaler_for(84_000_000, 1_000_000), Ok(83));
        assert_eq!(effective_tick_hz(84_000_000, 83), 1_000_000);
    }

    #[test]
    fn tick_equal_to_bus_needs_no_division() {
        assert_eq!(prescaler_for(42_000_000, 42_000_000), Ok(0));
    }

    #[test]
    fn tick_above_bus_underflows() {
        assert_eq!(
            prescaler_for(42_000_000, 50_000_000),
            Err(ConfigError::PrescalerUnderflow {
                bus_hz: 42_000_000,
                tick_hz: 50_000_000
            })
        );
        assert!(prescaler_for(42_000_000, 0).is_err());
    }

    #[test]
    fn slow_tick_overflows_sixteen_bits() {
        // 84 MHz / 1 kHz = 84_000 > 65_536
        assert_eq!(
            prescaler_for(84_000_000, 1_000),
            Err(ConfigError::PrescalerOverflow(83_999))
        );
    }

    #[test]
    fn duty_endpoints() {
        assert!(duty_ratio(0, 1000).abs() < f32::EPSILON);
        assert!((duty_ratio(1000, 1000) - 1.0).abs() < f32::EPSILON);
        assert!((duty_ratio(250, 1000) - 0.25).abs() < f32::EPSILON);
        assert!(duty_ratio(5, 0).abs() < f32::EPSILON);
    }

    #[test]
    fn timers_sit_on_expected_buses() {
        assert_eq!(TimerId::Tim8.bus(), Bus::Apb2);
        assert_eq!(TimerId::Tim11.bus(), Bus::Apb2);
        assert_eq!(TimerId::Tim3.bus(), Bus::Apb1);
        assert_eq!(TimerId::Tim11.channel_count(), 1);
    }
}
