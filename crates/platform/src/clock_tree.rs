//! Clock tree derivation and bring-up for the STM32F405.
//!
//! A [`ClockPlan`] is derived from one oscillator and a SYSCLK target by
//! looking the pair up in [`CLOCK_PRESETS`] and checking every derived
//! frequency against the silicon limits in [`crate::config`]. Nothing
//! downstream hard-codes a bus frequency: the PWM prescalers and the SysTick
//! reload are computed from the plan.
//!
//! [`configure`] then walks the RCC through the switch-over using a
//! [`ClockController`] handle:
//!
//! ```text
//! oscillator on ─▶ SYSCLK = oscillator ─▶ PWR clock + VOS scale 1
//!   ─▶ HPRE/PPRE1/PPRE2 ─▶ PLL off ─▶ PLLCFGR ─▶ PLL on
//!   ─▶ flash caches + LATENCY ─▶ SYSCLK = PLL ─▶ peripheral clocks ─▶ DWT
//! ```
//!
//! Every ready flag is polled a bounded number of times
//! ([`CLOCK_READY_MAX_POLLS`]) and a timeout is reported as
//! [`ConfigError::ClockTimeout`].
//!
//! # Sources
//!
//! - RM0090 §6.2 (clock tree), §6.3.2 (RCC_PLLCFGR), §6.3.3 (RCC_CFGR)
//! - RM0090 §3.5.1 Table 10 (flash wait states vs HCLK at 2.7–3.6 V)

use crate::config::{
    CLOCK_READY_MAX_POLLS, FLASH_HZ_PER_WAIT_STATE, HSI_HZ, MAX_AHB_HZ, MAX_APB1_HZ,
    MAX_APB2_HZ, MAX_FLASH_WAIT_STATES, MAX_PLL48_HZ, MAX_SYSCLK_HZ, PLL_INPUT_MAX_HZ,
    PLL_INPUT_MIN_HZ, PLL_VCO_MAX_HZ, PLL_VCO_MIN_HZ,
};
use crate::error::{ClockWait, ConfigError};

/// Clock source feeding the PLL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Oscillator {
    /// Internal 16 MHz RC oscillator.
    Hsi,
    /// External crystal or clock of the given frequency.
    Hse {
        /// Crystal frequency in Hz.
        frequency_hz: u32,
    },
}

impl Oscillator {
    /// Oscillator frequency in Hz.
    pub const fn frequency_hz(self) -> u32 {
        match self {
            Oscillator::Hsi => HSI_HZ,
            Oscillator::Hse { frequency_hz } => frequency_hz,
        }
    }

    /// SYSCLK mux setting that selects this oscillator directly.
    pub const fn as_sysclk(self) -> SysclkSource {
        match self {
            Oscillator::Hsi => SysclkSource::Hsi,
            Oscillator::Hse { .. } => SysclkSource::Hse,
        }
    }
}

/// RCC_CFGR.SW / SWS value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysclkSource {
    /// HSI drives SYSCLK.
    Hsi,
    /// HSE drives SYSCLK.
    Hse,
    /// Main PLL P output drives SYSCLK.
    Pll,
}

impl SysclkSource {
    /// Two-bit SW/SWS encoding.
    pub const fn bits(self) -> u8 {
        match self {
            SysclkSource::Hsi => 0b00,
            SysclkSource::Hse => 0b01,
            SysclkSource::Pll => 0b10,
        }
    }
}

/// Clock domain a peripheral is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Bus {
    /// AHB1 (HCLK): GPIO banks, DMA.
    Ahb1,
    /// Low-speed APB (PCLK1).
    Apb1,
    /// High-speed APB (PCLK2).
    Apb2,
}

/// Peripheral clock gate in RCC_AHB1ENR / APB1ENR / APB2ENR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum PeripheralClock {
    GpioA,
    GpioB,
    GpioC,
    Tim3,
    Tim4,
    Spi3,
    Pwr,
    Tim8,
    Adc2,
    Tim11,
}

impl PeripheralClock {
    /// Enable register the gate lives in.
    pub const fn bus(self) -> Bus {
        match self {
            PeripheralClock::GpioA | PeripheralClock::GpioB | PeripheralClock::GpioC => Bus::Ahb1,
            PeripheralClock::Tim3
            | PeripheralClock::Tim4
            | PeripheralClock::Spi3
            | PeripheralClock::Pwr => Bus::Apb1,
            PeripheralClock::Tim8 | PeripheralClock::Adc2 | PeripheralClock::Tim11 => Bus::Apb2,
        }
    }
}

/// Main PLL factors (RCC_PLLCFGR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PllConfig {
    /// Input divider, 2..=63.
    pub m: u8,
    /// VCO multiplier, 50..=432.
    pub n: u16,
    /// SYSCLK divider: 2, 4, 6 or 8.
    pub p: u8,
    /// 48 MHz domain divider, 2..=15.
    pub q: u8,
}

impl PllConfig {
    /// Check each factor against its register range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=63).contains(&self.m) {
            return Err(ConfigError::InvalidPllFactor {
                name: "M",
                value: u16::from(self.m),
            });
        }
        if !(50..=432).contains(&self.n) {
            return Err(ConfigError::InvalidPllFactor {
                name: "N",
                value: self.n,
            });
        }
        if !matches!(self.p, 2 | 4 | 6 | 8) {
            return Err(ConfigError::InvalidPllFactor {
                name: "P",
                value: u16::from(self.p),
            });
        }
        if !(2..=15).contains(&self.q) {
            return Err(ConfigError::InvalidPllFactor {
                name: "Q",
                value: u16::from(self.q),
            });
        }
        Ok(())
    }

    /// PLLP field: P/2 - 1, so 2, 4, 6, 8 encode as 0..=3.
    pub const fn p_bits(&self) -> u8 {
        (self.p >> 1).saturating_sub(1) & 0b11
    }
}

/// One supported (oscillator, SYSCLK) operating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockPreset {
    /// Oscillator frequency this preset expects.
    pub oscillator_hz: u32,
    /// SYSCLK the preset produces.
    pub sysclk_hz: u32,
    /// PLL factors.
    pub pll: PllConfig,
    /// AHB divider (HPRE): 1, 2, 4, ..., 512 except 32.
    pub ahb_div: u16,
    /// APB1 divider (PPRE1): 1, 2, 4, 8 or 16.
    pub apb1_div: u8,
    /// APB2 divider (PPRE2): 1, 2, 4, 8 or 16.
    pub apb2_div: u8,
}

const fn preset(
    oscillator_hz: u32,
    sysclk_hz: u32,
    (m, n, p, q): (u8, u16, u8, u8),
    apb1_div: u8,
    apb2_div: u8,
) -> ClockPreset {
    ClockPreset {
        oscillator_hz,
        sysclk_hz,
        pll: PllConfig { m, n, p, q },
        ahb_div: 1,
        apb1_div,
        apb2_div,
    }
}

/// Supported operating points at 3.3 V.
///
/// The PLL input is 2 MHz for the 8/16 MHz oscillators and 1 MHz for 25 MHz.
/// Q always yields exactly 48 MHz for USB/SDIO.
pub const CLOCK_PRESETS: &[ClockPreset] = &[
    preset(8_000_000, 48_000_000, (4, 96, 4, 4), 2, 1),
    preset(8_000_000, 84_000_000, (4, 168, 4, 7), 2, 1),
    preset(8_000_000, 120_000_000, (4, 120, 2, 5), 4, 2),
    preset(8_000_000, 168_000_000, (4, 168, 2, 7), 4, 2),
    preset(16_000_000, 48_000_000, (8, 96, 4, 4), 2, 1),
    preset(16_000_000, 84_000_000, (8, 168, 4, 7), 2, 1),
    preset(16_000_000, 120_000_000, (8, 120, 2, 5), 4, 2),
    preset(16_000_000, 168_000_000, (8, 168, 2, 7), 4, 2),
    preset(25_000_000, 48_000_000, (25, 192, 4, 4), 2, 1),
    preset(25_000_000, 84_000_000, (25, 336, 4, 7), 2, 1),
    preset(25_000_000, 120_000_000, (25, 240, 2, 5), 4, 2),
    preset(25_000_000, 168_000_000, (25, 336, 2, 7), 4, 2),
];

/// HPRE field for an AHB divider.
pub const fn hpre_bits(div: u16) -> Option<u8> {
    match div {
        1 => Some(0b0000),
        2 => Some(0b1000),
        4 => Some(0b1001),
        8 => Some(0b1010),
        16 => Some(0b1011),
        64 => Some(0b1100),
        128 => Some(0b1101),
        256 => Some(0b1110),
        512 => Some(0b1111),
        _ => None,
    }
}

/// PPRE1/PPRE2 field for an APB divider.
pub const fn ppre_bits(div: u8) -> Option<u8> {
    match div {
        1 => Some(0b000),
        2 => Some(0b100),
        4 => Some(0b101),
        8 => Some(0b110),
        16 => Some(0b111),
        _ => None,
    }
}

/// Flash wait states needed for `hclk_hz` at 2.7–3.6 V.
pub fn flash_wait_states(hclk_hz: u32) -> u8 {
    let ws = hclk_hz.saturating_sub(1) / FLASH_HZ_PER_WAIT_STATE;
    u8::try_from(ws).unwrap_or(u8::MAX)
}

/// Derived clock frequencies and the register settings that produce them.
///
/// Immutable once built; every field was checked against the silicon limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ClockPlan {
    /// Oscillator the PLL runs from.
    pub oscillator_source: Oscillator,
    /// Oscillator frequency.
    pub oscillator_freq_hz: u32,
    /// Requested (and achieved) SYSCLK.
    pub target_sysclk_hz: u32,
    /// HCLK.
    pub derived_ahb_hz: u32,
    /// PCLK1.
    pub derived_apb1_hz: u32,
    /// PCLK2.
    pub derived_apb2_hz: u32,
    /// PLL VCO output.
    pub vco_hz: u32,
    /// PLL Q output (USB/SDIO/RNG).
    pub pll48_hz: u32,
    /// PLL factors.
    pub pll: PllConfig,
    /// AHB divider.
    pub ahb_div: u16,
    /// APB1 divider.
    pub apb1_div: u8,
    /// APB2 divider.
    pub apb2_div: u8,
    /// FLASH_ACR.LATENCY.
    pub flash_wait_states: u8,
}

fn check_max(domain: &'static str, actual_hz: u32, limit_hz: u32) -> Result<(), ConfigError> {
    if actual_hz > limit_hz {
        return Err(ConfigError::ClockLimitExceeded {
            domain,
            actual_hz,
            limit_hz,
        });
    }
    Ok(())
}

fn check_min(domain: &'static str, actual_hz: u32, limit_hz: u32) -> Result<(), ConfigError> {
    if actual_hz < limit_hz {
        return Err(ConfigError::ClockLimitExceeded {
            domain,
            actual_hz,
            limit_hz,
        });
    }
    Ok(())
}

impl ClockPlan {
    /// Derive and validate the plan for `preset` running from `oscillator`.
    pub fn from_preset(oscillator: Oscillator, preset: &ClockPreset) -> Result<Self, ConfigError> {
        let osc_hz = oscillator.frequency_hz();
        let unsupported = ConfigError::UnsupportedClockTarget {
            oscillator_hz: osc_hz,
            target_hz: preset.sysclk_hz,
        };
        if osc_hz != preset.oscillator_hz {
            return Err(unsupported);
        }

        let pll = preset.pll;
        pll.validate()?;

        let pll_in = osc_hz / u32::from(pll.m);
        check_min("PLL input", pll_in, PLL_INPUT_MIN_HZ)?;
        check_max("PLL input", pll_in, PLL_INPUT_MAX_HZ)?;

        let vco_hz = pll_in.saturating_mul(u32::from(pll.n));
        check_min("VCO", vco_hz, PLL_VCO_MIN_HZ)?;
        check_max("VCO", vco_hz, PLL_VCO_MAX_HZ)?;

        let sysclk_hz = vco_hz / u32::from(pll.p);
        check_max("SYSCLK", sysclk_hz, MAX_SYSCLK_HZ)?;
        if sysclk_hz != preset.sysclk_hz {
            return Err(unsupported);
        }

        let pll48_hz = vco_hz / u32::from(pll.q);
        check_max("PLL48", pll48_hz, MAX_PLL48_HZ)?;

        if hpre_bits(preset.ahb_div).is_none() {
            return Err(unsupported);
        }
        if ppre_bits(preset.apb1_div).is_none() || ppre_bits(preset.apb2_div).is_none() {
            return Err(unsupported);
        }

        let ahb_hz = sysclk_hz / u32::from(preset.ahb_div);
        check_max("AHB", ahb_hz, MAX_AHB_HZ)?;
        let apb1_hz = ahb_hz / u32::from(preset.apb1_div);
        check_max("APB1", apb1_hz, MAX_APB1_HZ)?;
        let apb2_hz = ahb_hz / u32::from(preset.apb2_div);
        check_max("APB2", apb2_hz, MAX_APB2_HZ)?;

        let flash_wait_states = flash_wait_states(ahb_hz);
        if flash_wait_states > MAX_FLASH_WAIT_STATES {
            return Err(unsupported);
        }

        Ok(Self {
            oscillator_source: oscillator,
            oscillator_freq_hz: osc_hz,
            target_sysclk_hz: sysclk_hz,
            derived_ahb_hz: ahb_hz,
            derived_apb1_hz: apb1_hz,
            derived_apb2_hz: apb2_hz,
            vco_hz,
            pll48_hz,
            pll,
            ahb_div: preset.ahb_div,
            apb1_div: preset.apb1_div,
            apb2_div: preset.apb2_div,
            flash_wait_states,
        })
    }

    /// Clock of `bus`.
    pub const fn bus_clock_hz(&self, bus: Bus) -> u32 {
        match bus {
            Bus::Ahb1 => self.derived_ahb_hz,
            Bus::Apb1 => self.derived_apb1_hz,
            Bus::Apb2 => self.derived_apb2_hz,
        }
    }
}

/// Look up and validate the plan for `oscillator` at `target_sysclk_hz`.
///
/// Pure: touches no hardware.
pub fn plan(oscillator: Oscillator, target_sysclk_hz: u32) -> Result<ClockPlan, ConfigError> {
    let osc_hz = oscillator.frequency_hz();
    let preset = CLOCK_PRESETS
        .iter()
        .find(|p| p.oscillator_hz == osc_hz && p.sysclk_hz == target_sysclk_hz)
        .ok_or(ConfigError::UnsupportedClockTarget {
            oscillator_hz: osc_hz,
            target_hz: target_sysclk_hz,
        })?;
    ClockPlan::from_preset(oscillator, preset)
}

/// Register access to RCC, PWR, FLASH and the DWT cycle counter.
pub trait ClockController {
    /// RCC_CR.HSION / HSEON.
    fn enable_oscillator(&mut self, oscillator: Oscillator);

    /// RCC_CR.HSIRDY / HSERDY.
    fn oscillator_ready(&self, oscillator: Oscillator) -> bool;

    /// RCC_CR.HSION / HSEON cleared.
    fn disable_oscillator(&mut self, oscillator: Oscillator);

    /// RCC_CFGR.SW.
    fn select_sysclk(&mut self, source: SysclkSource);

    /// RCC_CFGR.SWS.
    fn sysclk_status(&self) -> SysclkSource;

    /// PWR_CR.VOS = scale 1 (requires the PWR clock).
    fn set_voltage_scale1(&mut self);

    /// RCC_CFGR.HPRE / PPRE1 / PPRE2.
    fn set_bus_prescalers(&mut self, ahb_div: u16, apb1_div: u8, apb2_div: u8);

    /// RCC_CR.PLLON cleared.
    fn disable_pll(&mut self);

    /// RCC_PLLCFGR.
    fn configure_pll(&mut self, source: Oscillator, pll: PllConfig);

    /// RCC_CR.PLLON.
    fn enable_pll(&mut self);

    /// RCC_CR.PLLRDY.
    fn pll_ready(&self) -> bool;

    /// FLASH_ACR: instruction + data caches, prefetch, LATENCY.
    fn configure_flash(&mut self, wait_states: u8);

    /// Set a gate in RCC_xxxENR.
    fn enable_peripheral_clock(&mut self, clock: PeripheralClock);

    /// DEMCR.TRCENA + DWT_CTRL.CYCCNTENA.
    fn enable_cycle_counter(&mut self);
}

fn wait_until(
    max_polls: u32,
    what: ClockWait,
    mut ready: impl FnMut() -> bool,
) -> Result<(), ConfigError> {
    for _ in 0..max_polls {
        if ready() {
            return Ok(());
        }
    }
    Err(ConfigError::ClockTimeout(what))
}

/// Switch the RCC over to `plan`, polling each ready flag at most `max_polls`
/// times.
pub fn apply<R: ClockController>(
    rcc: &mut R,
    plan: &ClockPlan,
    max_polls: u32,
) -> Result<(), ConfigError> {
    let osc = plan.oscillator_source;

    rcc.enable_oscillator(osc);
    wait_until(max_polls, ClockWait::Oscillator, || rcc.oscillator_ready(osc))?;

    rcc.select_sysclk(osc.as_sysclk());
    wait_until(max_polls, ClockWait::SysclkSwitch, || {
        rcc.sysclk_status() == osc.as_sysclk()
    })?;

    rcc.enable_peripheral_clock(PeripheralClock::Pwr);
    rcc.set_voltage_scale1();
    rcc.set_bus_prescalers(plan.ahb_div, plan.apb1_div, plan.apb2_div);

    rcc.disable_pll();
    rcc.configure_pll(osc, plan.pll);
    rcc.enable_pll();
    wait_until(max_polls, ClockWait::PllLock, || rcc.pll_ready())?;

    rcc.configure_flash(plan.flash_wait_states);

    rcc.select_sysclk(SysclkSource::Pll);
    wait_until(max_polls, ClockWait::SysclkSwitch, || {
        rcc.sysclk_status() == SysclkSource::Pll
    })?;

    if matches!(osc, Oscillator::Hse { .. }) {
        rcc.disable_oscillator(Oscillator::Hsi);
    }
    Ok(())
}

/// Derive the plan, program the RCC, then open the clock gates of
/// `peripherals` and start the cycle counter.
///
/// Must run once, before any other peripheral is touched.
pub fn configure<R: ClockController>(
    rcc: &mut R,
    oscillator: Oscillator,
    target_sysclk_hz: u32,
    peripherals: &[PeripheralClock],
) -> Result<ClockPlan, ConfigError> {
    let plan = plan(oscillator, target_sysclk_hz)?;
    apply(rcc, &plan, CLOCK_READY_MAX_POLLS)?;

    for &clock in peripherals {
        rcc.enable_peripheral_clock(clock);
    }
    rcc.enable_cycle_counter();

    #[cfg(feature = "defmt")]
    defmt::info!(
        "clocks: SYSCLK={=u32} AHB={=u32} APB1={=u32} APB2={=u32}",
        plan.target_sysclk_hz,
        plan.derived_ahb_hz,
        plan.derived_apb1_hz,
        plan.derived_apb2_hz
    );

    Ok(plan)
}
