//! Cortex-M exception handlers for the robot board.
//!
//! - **SysTick**: the control-loop tick. Runs whatever handler was registered
//!   through [`crate::api::register_tick_handler`], at the rate programmed by
//!   the tick step of the boot sequence.
//! - **HardFault**: bus faults, illegal instructions, and stack overflow past
//!   the bottom of RAM. Reports the stacked frame over RTT and halts.
//!
//! Only compiled with `--features hardware`.

#![allow(clippy::doc_markdown)] // SysTick, HardFault are register names, not prose

/// SysTick exception: one control-loop tick.
///
/// The tick interrupt is only unmasked after the board is installed, so the
/// registered handler can use the free-function API freely.
#[cortex_m_rt::exception]
fn SysTick() {
    crate::api::TICK.dispatch();
}

/// HardFault exception handler (hardware target only).
///
/// Must never return: returning from a HardFault handler is undefined
/// behavior on Cortex-M.
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::panic!(
        "HardFault at pc=0x{:08X} lr=0x{:08X}. \
         Possible causes: stack overflow, bus fault on a peripheral with its clock gated.",
        ef.pc(),
        ef.lr()
    );
}
