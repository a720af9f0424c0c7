//! Silicon limits and timing constants for the STM32F405 family.
//!
//! Every ceiling used when validating a [`ClockPlan`](crate::clock_tree::ClockPlan)
//! or a timer setting lives here, so that changing the part number means
//! touching one file.
//!
//! # Sources
//!
//! - STM32F405/407 datasheet DS8626, Table 14 (general operating conditions)
//! - RM0090 §6.3.2 (RCC_PLLCFGR constraints), §3.5.1 (flash wait states)

/// Internal high-speed RC oscillator frequency.
pub const HSI_HZ: u32 = 16_000_000;

/// Maximum SYSCLK (and HCLK) in voltage scale 1.
pub const MAX_SYSCLK_HZ: u32 = 168_000_000;

/// Maximum AHB (HCLK) frequency.
pub const MAX_AHB_HZ: u32 = 168_000_000;

/// Maximum low-speed APB1 frequency.
pub const MAX_APB1_HZ: u32 = 42_000_000;

/// Maximum high-speed APB2 frequency.
pub const MAX_APB2_HZ: u32 = 84_000_000;

/// PLL input (after the M divider) must stay within 1–2 MHz.
pub const PLL_INPUT_MIN_HZ: u32 = 1_000_000;
/// See [`PLL_INPUT_MIN_HZ`].
pub const PLL_INPUT_MAX_HZ: u32 = 2_000_000;

/// VCO output range.
pub const PLL_VCO_MIN_HZ: u32 = 100_000_000;
/// See [`PLL_VCO_MIN_HZ`].
pub const PLL_VCO_MAX_HZ: u32 = 432_000_000;

/// USB OTG FS / SDIO / RNG clock must not exceed 48 MHz.
pub const MAX_PLL48_HZ: u32 = 48_000_000;

/// HCLK per flash wait state at 2.7–3.6 V.
pub const FLASH_HZ_PER_WAIT_STATE: u32 = 30_000_000;

/// Highest LATENCY value RM0090 defines.
pub const MAX_FLASH_WAIT_STATES: u8 = 7;

/// Poll budget for oscillator, PLL and clock-switch ready flags.
///
/// HSE start-up is specified at 2 ms typical; at 16 MHz one poll is a handful
/// of cycles, so this covers several start-up times.
pub const CLOCK_READY_MAX_POLLS: u32 = 50_000;

/// Poll budget for an ADC end-of-conversion flag.
pub const ADC_EOC_MAX_POLLS: u32 = 10_000;

/// SysTick reload register width (24 bits).
pub const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Timer prescaler register width (16 bits on every timer of this family).
pub const TIMER_MAX_PRESCALER: u32 = 0xFFFF;
