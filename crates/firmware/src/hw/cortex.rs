//! Cortex-M4 core peripherals: SysTick and the DWT cycle counter.

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{DWT, SYST};
use platform::tick::{CycleCounter, TickTimer};

/// SysTick, clocked from HCLK.
pub struct HardwareSysTick {
    pub(crate) syst: SYST,
}

impl TickTimer for HardwareSysTick {
    fn set_reload(&mut self, reload: u32) {
        self.syst.set_reload(reload);
    }

    fn clear_current(&mut self) {
        self.syst.clear_current();
    }

    fn enable_counter(&mut self) {
        self.syst.set_clock_source(SystClkSource::Core);
        self.syst.enable_counter();
    }

    fn enable_interrupt(&mut self) {
        self.syst.enable_interrupt();
    }

    fn disable_interrupt(&mut self) {
        self.syst.disable_interrupt();
    }
}

/// DWT_CYCCNT, enabled by the clock step.
pub struct HardwareCycleCounter;

impl CycleCounter for HardwareCycleCounter {
    fn cycles(&self) -> u32 {
        DWT::cycle_count()
    }
}
