//! GPIO banks A..C (RM0090 §8.4).

use core::convert::Infallible;

use embassy_stm32::pac::gpio::vals::{Idr, Moder};
use embassy_stm32::pac::gpio::Gpio;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use platform::gpio::{GpioPort, PinId, PinMode, Port};

/// GPIOA, GPIOB and GPIOC.
pub struct HardwareGpio {
    pub(crate) a: Gpio,
    pub(crate) b: Gpio,
    pub(crate) c: Gpio,
}

impl HardwareGpio {
    fn bank(&self, port: Port) -> Gpio {
        match port {
            Port::A => self.a,
            Port::B => self.b,
            Port::C => self.c,
        }
    }
}

fn set_level(bank: Gpio, index: u8, high: bool) {
    let n = usize::from(index);
    bank.bsrr().write(|w| {
        if high {
            w.set_bs(n, true);
        } else {
            w.set_br(n, true);
        }
    });
}

impl GpioPort for HardwareGpio {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) {
        let moder = match mode {
            PinMode::Input => Moder::INPUT,
            PinMode::Output => Moder::OUTPUT,
            PinMode::AlternateFunction => Moder::ALTERNATE,
            PinMode::Analog => Moder::ANALOG,
        };
        let n = usize::from(pin.index());
        self.bank(pin.port()).moder().modify(|w| w.set_moder(n, moder));
    }

    fn set_alternate_function(&mut self, pin: PinId, af: u8) {
        let n = usize::from(pin.index());
        // AFRL holds lines 0..7, AFRH lines 8..15.
        let (afr, slot) = (n.wrapping_div(8), n.wrapping_rem(8));
        self.bank(pin.port()).afr(afr).modify(|w| w.set_afr(slot, af));
    }

    fn set_level(&mut self, pin: PinId, high: bool) {
        set_level(self.bank(pin.port()), pin.index(), high);
    }
}

/// A pin read through IDR. Its mode is owned by the pin mapper.
pub struct HardwareInput {
    pub(crate) bank: Gpio,
    pub(crate) index: u8,
}

impl ErrorType for HardwareInput {
    type Error = Infallible;
}

impl InputPin for HardwareInput {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.bank.idr().read().idr(usize::from(self.index)) == Idr::HIGH)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

/// A pin driven through BSRR. Its mode is owned by the pin mapper.
pub struct HardwareOutput {
    pub(crate) bank: Gpio,
    pub(crate) index: u8,
}

impl ErrorType for HardwareOutput {
    type Error = Infallible;
}

impl OutputPin for HardwareOutput {
    fn set_high(&mut self) -> Result<(), Infallible> {
        set_level(self.bank, self.index, true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Infallible> {
        set_level(self.bank, self.index, false);
        Ok(())
    }
}
