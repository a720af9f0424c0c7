//! RCC, PWR and FLASH access for the clock tree (RM0090 §6.3, §5.4, §3.9).

use embassy_stm32::pac::flash::vals::Latency;
use embassy_stm32::pac::rcc::vals::{Hpre, Pllm, Plln, Pllp, Pllq, Pllsrc, Ppre, Sw};
use embassy_stm32::pac::{flash::Flash, pwr::Pwr, rcc::Rcc};
use platform::clock_tree::{
    hpre_bits, ppre_bits, Bus, ClockController, Oscillator, PeripheralClock, PllConfig,
    SysclkSource,
};

/// RCC + PWR + FLASH interface.
pub struct HardwareRcc {
    pub(crate) rcc: Rcc,
    pub(crate) pwr: Pwr,
    pub(crate) flash: Flash,
}

impl ClockController for HardwareRcc {
    fn enable_oscillator(&mut self, oscillator: Oscillator) {
        self.rcc.cr().modify(|w| match oscillator {
            Oscillator::Hsi => w.set_hsion(true),
            Oscillator::Hse { .. } => w.set_hseon(true),
        });
    }

    fn oscillator_ready(&self, oscillator: Oscillator) -> bool {
        let cr = self.rcc.cr().read();
        match oscillator {
            Oscillator::Hsi => cr.hsirdy(),
            Oscillator::Hse { .. } => cr.hserdy(),
        }
    }

    fn disable_oscillator(&mut self, oscillator: Oscillator) {
        self.rcc.cr().modify(|w| match oscillator {
            Oscillator::Hsi => w.set_hsion(false),
            Oscillator::Hse { .. } => w.set_hseon(false),
        });
    }

    fn select_sysclk(&mut self, source: SysclkSource) {
        self.rcc
            .cfgr()
            .modify(|w| w.set_sw(Sw::from_bits(source.bits())));
    }

    fn sysclk_status(&self) -> SysclkSource {
        match self.rcc.cfgr().read().sws().to_bits() {
            0b00 => SysclkSource::Hsi,
            0b01 => SysclkSource::Hse,
            _ => SysclkSource::Pll,
        }
    }

    fn set_voltage_scale1(&mut self) {
        self.pwr.cr1().modify(|w| w.set_vos(true));
    }

    fn set_bus_prescalers(&mut self, ahb_div: u16, apb1_div: u8, apb2_div: u8) {
        // The plan only carries dividers that encode; fall back to /1 otherwise.
        let hpre = Hpre::from_bits(hpre_bits(ahb_div).unwrap_or(0));
        let ppre1 = Ppre::from_bits(ppre_bits(apb1_div).unwrap_or(0));
        let ppre2 = Ppre::from_bits(ppre_bits(apb2_div).unwrap_or(0));
        self.rcc.cfgr().modify(|w| {
            w.set_hpre(hpre);
            w.set_ppre1(ppre1);
            w.set_ppre2(ppre2);
        });
    }

    fn disable_pll(&mut self) {
        self.rcc.cr().modify(|w| w.set_pllon(false));
    }

    fn configure_pll(&mut self, source: Oscillator, pll: PllConfig) {
        let src = match source {
            Oscillator::Hsi => Pllsrc::HSI,
            Oscillator::Hse { .. } => Pllsrc::HSE,
        };
        self.rcc.pllcfgr().write(|w| {
            w.set_pllsrc(src);
            w.set_pllm(Pllm::from_bits(pll.m));
            w.set_plln(Plln::from_bits(pll.n));
            w.set_pllp(Pllp::from_bits(pll.p_bits()));
            w.set_pllq(Pllq::from_bits(pll.q));
        });
    }

    fn enable_pll(&mut self) {
        self.rcc.cr().modify(|w| w.set_pllon(true));
    }

    fn pll_ready(&self) -> bool {
        self.rcc.cr().read().pllrdy()
    }

    fn configure_flash(&mut self, wait_states: u8) {
        self.flash.acr().modify(|w| {
            w.set_prften(true);
            w.set_icen(true);
            w.set_dcen(true);
            w.set_latency(Latency::from_bits(wait_states));
        });
    }

    fn enable_peripheral_clock(&mut self, clock: PeripheralClock) {
        match clock {
            PeripheralClock::GpioA => self.rcc.ahb1enr().modify(|w| w.set_gpioaen(true)),
            PeripheralClock::GpioB => self.rcc.ahb1enr().modify(|w| w.set_gpioben(true)),
            PeripheralClock::GpioC => self.rcc.ahb1enr().modify(|w| w.set_gpiocen(true)),
            PeripheralClock::Tim3 => self.rcc.apb1enr().modify(|w| w.set_tim3en(true)),
            PeripheralClock::Tim4 => self.rcc.apb1enr().modify(|w| w.set_tim4en(true)),
            PeripheralClock::Spi3 => self.rcc.apb1enr().modify(|w| w.set_spi3en(true)),
            PeripheralClock::Pwr => self.rcc.apb1enr().modify(|w| w.set_pwren(true)),
            PeripheralClock::Tim8 => self.rcc.apb2enr().modify(|w| w.set_tim8en(true)),
            PeripheralClock::Adc2 => self.rcc.apb2enr().modify(|w| w.set_adc2en(true)),
            PeripheralClock::Tim11 => self.rcc.apb2enr().modify(|w| w.set_tim11en(true)),
        }
        // RM0090 §6.2: two AHB cycles before the peripheral may be accessed.
        match clock.bus() {
            Bus::Ahb1 => {
                let _ = self.rcc.ahb1enr().read();
            }
            Bus::Apb1 => {
                let _ = self.rcc.apb1enr().read();
            }
            Bus::Apb2 => {
                let _ = self.rcc.apb2enr().read();
            }
        }
    }

    fn enable_cycle_counter(&mut self) {
        // SAFETY: runs once during boot, before anything else owns DCB/DWT.
        let mut core = unsafe { cortex_m::Peripherals::steal() };
        core.DCB.enable_trace();
        core.DWT.enable_cycle_counter();
    }
}
