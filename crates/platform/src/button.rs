//! User push-button.
//!
//! Reports the pin's logic level as-is: no debouncing and no edge detection.
//! The control loop samples it once per tick.

use embedded_hal::digital::InputPin;

use crate::error::SensorError;

/// Digital input wired to the user button.
pub struct UserButton<P> {
    pin: P,
}

impl<P: InputPin> UserButton<P> {
    /// Wrap an input pin.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Current logic level (`true` = high).
    pub fn read(&mut self) -> Result<bool, SensorError> {
        self.pin.is_high().map_err(|_| SensorError::Gpio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn read_mirrors_pin_level() {
        let expectations = [
            Transaction::get(State::High),
            Transaction::get(State::Low),
        ];
        let mut button = UserButton::new(PinMock::new(&expectations));
        assert_eq!(button.read(), Ok(true));
        assert_eq!(button.read(), Ok(false));
        button.pin.done();
    }
}
