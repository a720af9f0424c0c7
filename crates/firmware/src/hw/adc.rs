//! ADC2, single regular conversion on one channel (RM0090 §13.13).

use embassy_stm32::pac::adc::vals::{Adcpre, SampleTime};
use embassy_stm32::pac::adc::{Adc, AdcCommon};
use platform::adc::{AdcChannel, ConversionStatus};

/// One ADC channel.
pub struct HardwareAdc {
    pub(crate) regs: Adc,
    pub(crate) common: AdcCommon,
    pub(crate) channel: u8,
}

impl AdcChannel for HardwareAdc {
    fn configure(&mut self) {
        // PCLK2 / 4: 21 MHz at APB2 = 84 MHz, under the 36 MHz ADC limit.
        self.common.ccr().modify(|w| w.set_adcpre(Adcpre::DIV4));
        self.regs.cr2().modify(|w| w.set_adon(false));
        // Reset values: 12-bit, right aligned, single conversion, software trigger.
        self.regs.cr1().write(|_| {});
        self.regs.cr2().write(|_| {});

        // 480 cycles: the divider output is high impedance.
        let channel = usize::from(self.channel);
        if channel >= 10 {
            self.regs
                .smpr1()
                .modify(|w| w.set_smp(channel.saturating_sub(10), SampleTime::CYCLES480));
        } else {
            self.regs
                .smpr2()
                .modify(|w| w.set_smp(channel, SampleTime::CYCLES480));
        }
        self.regs.sqr1().modify(|w| w.set_l(0));
        self.regs.sqr3().write(|w| w.set_sq(0, self.channel));

        self.regs.cr2().modify(|w| w.set_adon(true));
    }

    fn start_conversion(&mut self) {
        self.regs.cr2().modify(|w| w.set_swstart(true));
    }

    fn status(&mut self) -> ConversionStatus {
        let sr = self.regs.sr().read();
        if sr.ovr() {
            ConversionStatus::Overrun
        } else if sr.eoc() {
            ConversionStatus::Complete
        } else {
            ConversionStatus::Busy
        }
    }

    fn read_data(&mut self) -> u16 {
        u16::try_from(self.regs.dr().read().0 & 0x0FFF).unwrap_or(0)
    }

    fn clear_overrun(&mut self) {
        // rc_w0: the other flags keep the value just read.
        self.regs.sr().modify(|w| w.set_ovr(false));
    }
}
