//! Periodic control-loop tick and the free-running cycle counter.
//!
//! [`PeriodicTick`] programs SysTick from the AHB clock of the
//! [`ClockPlan`](crate::clock_tree::ClockPlan). Its interrupt starts
//! disabled; the lifecycle controller turns it on once the rest of the board
//! is up. The exception handler forwards each tick to a [`TickDispatcher`],
//! which calls the handler registered by the control loop.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;

use crate::config::SYSTICK_MAX_RELOAD;
use crate::error::ConfigError;

/// Register access to the SysTick timer.
pub trait TickTimer {
    /// SYST_RVR.
    fn set_reload(&mut self, reload: u32);

    /// SYST_CVR (any write clears it).
    fn clear_current(&mut self);

    /// SYST_CSR.CLKSOURCE = processor clock, ENABLE = 1.
    fn enable_counter(&mut self);

    /// SYST_CSR.TICKINT = 1.
    fn enable_interrupt(&mut self);

    /// SYST_CSR.TICKINT = 0.
    fn disable_interrupt(&mut self);
}

/// Free-running 32-bit core cycle counter (DWT_CYCCNT).
pub trait CycleCounter {
    /// Current count; wraps every 2^32 cycles.
    fn cycles(&self) -> u32;
}

/// SysTick reload for `tick_hz` from `core_hz`.
pub fn systick_reload(core_hz: u32, tick_hz: u32) -> Result<u32, ConfigError> {
    let reload = core_hz
        .checked_div(tick_hz)
        .and_then(|counts| counts.checked_sub(1))
        .ok_or(ConfigError::TickReloadOutOfRange(0))?;
    if reload == 0 || reload > SYSTICK_MAX_RELOAD {
        return Err(ConfigError::TickReloadOutOfRange(reload));
    }
    Ok(reload)
}

/// Tick rate and whether its interrupt is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickSchedule {
    /// Interrupt rate.
    pub frequency_hz: u32,
    /// SYST_CSR.TICKINT.
    pub enabled: bool,
}

/// SysTick running at a fixed rate.
pub struct PeriodicTick<T> {
    timer: T,
    schedule: TickSchedule,
}

impl<T: TickTimer> PeriodicTick<T> {
    /// Program the reload, start counting, keep the interrupt off.
    pub fn start(mut timer: T, core_hz: u32, frequency_hz: u32) -> Result<Self, ConfigError> {
        let reload = systick_reload(core_hz, frequency_hz)?;
        timer.disable_interrupt();
        timer.set_reload(reload);
        timer.clear_current();
        timer.enable_counter();
        Ok(Self {
            timer,
            schedule: TickSchedule {
                frequency_hz,
                enabled: false,
            },
        })
    }

    /// Let the tick interrupt fire.
    pub fn enable(&mut self) {
        self.timer.enable_interrupt();
        self.schedule.enabled = true;
    }

    /// Mask the tick interrupt. The counter keeps running.
    pub fn disable(&mut self) {
        self.timer.disable_interrupt();
        self.schedule.enabled = false;
    }

    /// Current schedule.
    pub fn schedule(&self) -> TickSchedule {
        self.schedule
    }

    /// Borrow the timer handle.
    pub fn timer(&self) -> &T {
        &self.timer
    }
}

/// Handler slot and tick count shared with the SysTick exception.
pub struct TickDispatcher {
    handler: Mutex<Cell<Option<fn()>>>,
    ticks: AtomicU32,
}

impl TickDispatcher {
    /// Empty dispatcher, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            handler: Mutex::new(Cell::new(None)),
            ticks: AtomicU32::new(0),
        }
    }

    /// Install the control-loop handler. Returns `false` and keeps the
    /// existing one if a handler is already registered.
    pub fn register(&self, handler: fn()) -> bool {
        critical_section::with(|cs| {
            let slot = self.handler.borrow(cs);
            if slot.get().is_some() {
                return false;
            }
            slot.set(Some(handler));
            true
        })
    }

    /// Count one tick and run the handler, if any. Called from the exception.
    pub fn dispatch(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let handler = critical_section::with(|cs| self.handler.borrow(cs).get());
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Ticks dispatched since boot (wraps).
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Default for TickDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
