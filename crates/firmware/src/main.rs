//! Robot board firmware entry point.
//!
//! Hardware-only entry point for the STM32F405RG.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use defmt_rtt as _;
use panic_probe as _;

use firmware::{api, config, Led};

/// Heartbeat LED half-period, in ticks.
const HEARTBEAT_TICKS: u32 = 500;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Control loop body, run from the SysTick exception.
fn control_tick() {
    let n = TICKS.fetch_add(1, Ordering::Relaxed);
    if n.wrapping_rem(HEARTBEAT_TICKS) == 0 {
        let on = n.wrapping_div(HEARTBEAT_TICKS) & 1 == 0;
        api::led_set(Led::L1, on);
    }
    api::led_set(Led::L2, api::read_user_button());
}

#[entry]
fn main() -> ! {
    defmt::info!("Robot board firmware v{=str}", config::FIRMWARE_VERSION);

    api::setup();

    match api::get_battery_voltage() {
        Ok(v) => defmt::info!("Battery: {=f32} V", v),
        Err(e) => defmt::warn!("Battery read failed: {}", e),
    }

    api::register_tick_handler(control_tick);
    api::enable_systick_interruption();

    loop {
        cortex_m::asm::wfi();
    }
}
