//! GPIO pin mapping for the STM32F405.
//!
//! [`PinMapper`] owns the GPIO banks (through a [`GpioPort`] handle) and keeps
//! one [`PinBinding`] per physical pin. Rebinding a pin overwrites the earlier
//! binding. Alternate-function bindings are checked against
//! [`ALTERNATE_FUNCTIONS`], the subset of the datasheet AF matrix this board
//! routes.
//!
//! # Sources
//!
//! - STM32F405 datasheet DS8626, Table 9 (alternate function mapping)
//! - RM0090 §8.3.2 (I/O pin alternate function multiplexer)

use core::fmt;

use crate::error::ConfigError;

/// GPIO bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Port {
    /// GPIOA
    A,
    /// GPIOB
    B,
    /// GPIOC
    C,
}

impl Port {
    /// Every bank the mapper manages, in register-address order.
    pub const ALL: [Port; 3] = [Port::A, Port::B, Port::C];

    const fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
        }
    }
}

/// Physical pin: bank plus line number 0–15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PinId {
    port: Port,
    index: u8,
}

impl PinId {
    /// Lines per bank.
    pub const LINES: u8 = 16;

    /// Build a pin id. Intended for `const` items; a line above 15 fails
    /// const evaluation. Runtime callers use [`try_new`](Self::try_new).
    pub const fn new(port: Port, index: u8) -> Self {
        assert!(index < Self::LINES, "GPIO line out of range");
        Self { port, index }
    }

    /// Build a pin id from a line number that is not known at compile time.
    pub const fn try_new(port: Port, index: u8) -> Result<Self, ConfigError> {
        if index < Self::LINES {
            Ok(Self { port, index })
        } else {
            Err(ConfigError::PinOutOfRange(index))
        }
    }

    /// Bank.
    pub const fn port(self) -> Port {
        self.port
    }

    /// Line number within the bank.
    pub const fn index(self) -> u8 {
        self.index
    }

    /// Single-bit mask for this line in 16-bit port registers.
    pub const fn mask(self) -> u16 {
        1u16.wrapping_shl(self.index as u32)
    }

    fn slot(self) -> usize {
        let bank = self.port as usize;
        bank.saturating_mul(usize::from(Self::LINES))
            .saturating_add(usize::from(self.index))
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port.letter(), self.index)
    }
}

/// Electrical role of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PinMode {
    /// Push-pull digital output.
    Output,
    /// Floating digital input.
    Input,
    /// Analog (ADC input, digital buffer off).
    Analog,
    /// Routed to a peripheral through the AF multiplexer.
    AlternateFunction,
}

/// Peripheral signal reachable through the AF multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[allow(missing_docs)]
pub enum Signal {
    Tim3Ch1,
    Tim3Ch2,
    Tim4Ch1,
    Tim4Ch2,
    Tim4Ch4,
    Tim8Ch1,
    Tim8Ch2,
    Tim8Ch3,
    Tim8Ch4,
    Tim11Ch1,
    Spi3Nss,
    Spi3Sck,
    Spi3Miso,
    Spi3Mosi,
}

/// One row of the alternate-function matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlternateFunction {
    /// Pin carrying the signal.
    pub pin: PinId,
    /// AF number (AFRL/AFRH nibble).
    pub af: u8,
    /// Peripheral signal selected by `af` on `pin`.
    pub signal: Signal,
}

const fn af(port: Port, index: u8, af: u8, signal: Signal) -> AlternateFunction {
    AlternateFunction {
        pin: PinId::new(port, index),
        af,
        signal,
    }
}

/// Alternate functions the board may route (DS8626 Table 9 subset).
pub const ALTERNATE_FUNCTIONS: &[AlternateFunction] = &[
    // AF2: TIM3..TIM5
    af(Port::B, 4, 2, Signal::Tim3Ch1),
    af(Port::B, 5, 2, Signal::Tim3Ch2),
    af(Port::A, 6, 2, Signal::Tim3Ch1),
    af(Port::A, 7, 2, Signal::Tim3Ch2),
    af(Port::C, 6, 2, Signal::Tim3Ch1),
    af(Port::C, 7, 2, Signal::Tim3Ch2),
    af(Port::B, 6, 2, Signal::Tim4Ch1),
    af(Port::B, 7, 2, Signal::Tim4Ch2),
    af(Port::B, 9, 2, Signal::Tim4Ch4),
    // AF3: TIM8..TIM11
    af(Port::C, 6, 3, Signal::Tim8Ch1),
    af(Port::C, 7, 3, Signal::Tim8Ch2),
    af(Port::C, 8, 3, Signal::Tim8Ch3),
    af(Port::C, 9, 3, Signal::Tim8Ch4),
    af(Port::B, 9, 3, Signal::Tim11Ch1),
    // AF6: SPI3
    af(Port::A, 15, 6, Signal::Spi3Nss),
    af(Port::C, 10, 6, Signal::Spi3Sck),
    af(Port::C, 11, 6, Signal::Spi3Miso),
    af(Port::C, 12, 6, Signal::Spi3Mosi),
    af(Port::B, 3, 6, Signal::Spi3Sck),
    af(Port::B, 4, 6, Signal::Spi3Miso),
    af(Port::B, 5, 6, Signal::Spi3Mosi),
];

/// Signal selected by `af` on `pin`, if the board routes it.
pub fn alternate_function(pin: PinId, af: u8) -> Option<Signal> {
    ALTERNATE_FUNCTIONS
        .iter()
        .find(|row| row.pin == pin && row.af == af)
        .map(|row| row.signal)
}

/// A pin's current configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PinBinding {
    /// Physical pin.
    pub pin: PinId,
    /// Mode.
    pub mode: PinMode,
    /// AF number; present only for [`PinMode::AlternateFunction`].
    pub alternate_function: Option<u8>,
}

impl PinBinding {
    /// Digital output binding.
    pub const fn output(pin: PinId) -> Self {
        Self {
            pin,
            mode: PinMode::Output,
            alternate_function: None,
        }
    }

    /// Digital input binding.
    pub const fn input(pin: PinId) -> Self {
        Self {
            pin,
            mode: PinMode::Input,
            alternate_function: None,
        }
    }

    /// Analog binding.
    pub const fn analog(pin: PinId) -> Self {
        Self {
            pin,
            mode: PinMode::Analog,
            alternate_function: None,
        }
    }

    /// Alternate-function binding.
    pub const fn alternate(pin: PinId, af: u8) -> Self {
        Self {
            pin,
            mode: PinMode::AlternateFunction,
            alternate_function: Some(af),
        }
    }

    /// Check the mode/AF combination against the AF matrix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.mode, self.alternate_function) {
            (PinMode::AlternateFunction, None) => {
                Err(ConfigError::MissingAlternateFunction(self.pin))
            }
            (PinMode::AlternateFunction, Some(af)) => alternate_function(self.pin, af)
                .map(|_| ())
                .ok_or(ConfigError::UnsupportedAlternateFunction { pin: self.pin, af }),
            (_, Some(_)) => Err(ConfigError::UnexpectedAlternateFunction(self.pin)),
            (_, None) => Ok(()),
        }
    }
}

/// Register-level access to the GPIO banks.
///
/// Implemented over MODER/AFR/BSRR on hardware and by
/// [`MockGpio`](crate::mocks::MockGpio) in tests.
pub trait GpioPort {
    /// Write the MODER field of `pin`.
    fn set_mode(&mut self, pin: PinId, mode: PinMode);

    /// Write the AFRL/AFRH nibble of `pin`.
    fn set_alternate_function(&mut self, pin: PinId, af: u8);

    /// Drive an output latch (BSRR).
    fn set_level(&mut self, pin: PinId, high: bool);
}

// 3 banks of 16 lines
const SLOTS: usize = 48;

/// Owns the GPIO banks and the binding of every pin.
pub struct PinMapper<G> {
    port: G,
    bindings: [Option<PinBinding>; SLOTS],
}

impl<G: GpioPort> PinMapper<G> {
    /// Take ownership of the GPIO banks. No pin is bound yet.
    pub fn new(port: G) -> Self {
        Self {
            port,
            bindings: [None; SLOTS],
        }
    }

    /// Bind `pin` to `mode`, routing `alternate_function` when the mode is
    /// [`PinMode::AlternateFunction`].
    ///
    /// Rebinding a pin replaces its previous binding. Output pins are driven
    /// low before their mode switches so they never glitch high.
    pub fn bind(
        &mut self,
        pin: PinId,
        mode: PinMode,
        alternate_function: Option<u8>,
    ) -> Result<(), ConfigError> {
        let binding = PinBinding {
            pin,
            mode,
            alternate_function,
        };
        binding.validate()?;

        match (mode, alternate_function) {
            (PinMode::AlternateFunction, Some(af)) => {
                self.port.set_alternate_function(pin, af);
            }
            (PinMode::Output, _) => self.port.set_level(pin, false),
            _ => {}
        }
        self.port.set_mode(pin, mode);

        if let Some(slot) = self.bindings.get_mut(pin.slot()) {
            *slot = Some(binding);
        }
        Ok(())
    }

    /// Apply a table of bindings in order. Stops at the first invalid entry.
    pub fn bind_all(&mut self, bindings: &[PinBinding]) -> Result<(), ConfigError> {
        for binding in bindings {
            self.bind(binding.pin, binding.mode, binding.alternate_function)?;
        }
        Ok(())
    }

    /// Current binding of `pin`, if any.
    pub fn binding(&self, pin: PinId) -> Option<PinBinding> {
        self.bindings.get(pin.slot()).copied().flatten()
    }

    /// Current mode of `pin`, if bound.
    pub fn mode_of(&self, pin: PinId) -> Option<PinMode> {
        self.binding(pin).map(|b| b.mode)
    }

    /// Drive an output pin. Fails if `pin` is not bound as an output.
    pub fn write(&mut self, pin: PinId, high: bool) -> Result<(), ConfigError> {
        match self.mode_of(pin) {
            Some(PinMode::Output) => {
                self.port.set_level(pin, high);
                Ok(())
            }
            _ => Err(ConfigError::PinNotOutput(pin)),
        }
    }

    /// Number of bound pins.
    pub fn bound_count(&self) -> usize {
        self.bindings.iter().filter(|b| b.is_some()).count()
    }

    /// Borrow the underlying port handle.
    pub fn port(&self) -> &G {
        &self.port
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::mocks::{GpioWrite, MockGpio};

    const PB9: PinId = PinId::new(Port::B, 9);
    const PC6: PinId = PinId::new(Port::C, 6);
    const PA0: PinId = PinId::new(Port::A, 0);

    #[test]
    fn display_uses_port_letter_and_line() {
        assert_eq!(format!("{PB9}"), "PB9");
        assert_eq!(format!("{}", PinId::new(Port::A, 15)), "PA15");
    }

    #[test]
    fn try_new_rejects_lines_past_fifteen() {
        assert_eq!(PinId::try_new(Port::C, 13), Ok(PinId::new(Port::C, 13)));
        assert_eq!(PinId::try_new(Port::C, 16), Err(ConfigError::PinOutOfRange(16)));
        assert_eq!(PinId::try_new(Port::A, u8::MAX), Err(ConfigError::PinOutOfRange(255)));
    }

    #[test]
    fn af_table_rows_are_unique() {
        for (i, a) in ALTERNATE_FUNCTIONS.iter().enumerate() {
            for b in ALTERNATE_FUNCTIONS.iter().skip(i + 1) {
                assert!(
                    !(a.pin == b.pin && a.af == b.af),
                    "duplicate AF row for {} AF{}",
                    a.pin,
                    a.af
                );
            }
        }
    }

    #[test]
    fn speaker_pin_routes_tim11_on_af3() {
        assert_eq!(alternate_function(PB9, 3), Some(Signal::Tim11Ch1));
        assert_eq!(alternate_function(PB9, 2), Some(Signal::Tim4Ch4));
        assert_eq!(alternate_function(PB9, 7), None);
    }

    #[test]
    fn alternate_mode_without_function_is_rejected() {
        let mut mapper = PinMapper::new(MockGpio::new());
        let err = mapper.bind(PC6, PinMode::AlternateFunction, None);
        assert_eq!(err, Err(ConfigError::MissingAlternateFunction(PC6)));
        assert_eq!(mapper.mode_of(PC6), None);
        assert!(mapper.port().writes().is_empty());
    }

    #[test]
    fn function_on_plain_mode_is_rejected() {
        let mut mapper = PinMapper::new(MockGpio::new());
        let err = mapper.bind(PA0, PinMode::Output, Some(3));
        assert_eq!(err, Err(ConfigError::UnexpectedAlternateFunction(PA0)));
    }

    #[test]
    fn unsupported_function_number_is_rejected() {
        let mut mapper = PinMapper::new(MockGpio::new());
        let err = mapper.bind(PA0, PinMode::AlternateFunction, Some(3));
        assert_eq!(
            err,
            Err(ConfigError::UnsupportedAlternateFunction { pin: PA0, af: 3 })
        );
    }

    #[test]
    fn alternate_binding_writes_af_before_mode() {
        let mut mapper = PinMapper::new(MockGpio::new());
        mapper
            .bind(PC6, PinMode::AlternateFunction, Some(3))
            .unwrap();
        assert_eq!(
            mapper.port().writes(),
            &[
                GpioWrite::AlternateFunction(PC6, 3),
                GpioWrite::Mode(PC6, PinMode::AlternateFunction),
            ]
        );
    }

    #[test]
    fn output_binding_starts_low() {
        let mut mapper = PinMapper::new(MockGpio::new());
        mapper.bind(PA0, PinMode::Output, None).unwrap();
        assert_eq!(
            mapper.port().writes(),
            &[
                GpioWrite::Level(PA0, false),
                GpioWrite::Mode(PA0, PinMode::Output)
            ]
        );
    }

    #[test]
    fn rebinding_overwrites_previous_mode() {
        let mut mapper = PinMapper::new(MockGpio::new());
        mapper.bind(PC6, PinMode::Output, None).unwrap();
        mapper
            .bind(PC6, PinMode::AlternateFunction, Some(3))
            .unwrap();
        mapper.bind(PC6, PinMode::Input, None).unwrap();

        assert_eq!(mapper.mode_of(PC6), Some(PinMode::Input));
        assert_eq!(mapper.binding(PC6).unwrap().alternate_function, None);
        assert_eq!(mapper.bound_count(), 1);
    }

    #[test]
    fn write_requires_output_binding() {
        let mut mapper = PinMapper::new(MockGpio::new());
        mapper.bind(PA0, PinMode::Input, None).unwrap();
        assert!(mapper.write(PA0, true).is_err());

        mapper.bind(PA0, PinMode::Output, None).unwrap();
        mapper.write(PA0, true).unwrap();
        assert_eq!(
            mapper.port().writes().last(),
            Some(&GpioWrite::Level(PA0, true))
        );
    }
}
