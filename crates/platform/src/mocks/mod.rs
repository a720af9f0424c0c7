//! Mock implementations for testing
//!
//! Each mock records the register-level calls it receives so tests can assert
//! both the resulting state and the order of writes. Histories live in
//! fixed-capacity `heapless` vectors; calls beyond capacity are still applied
//! to the state but not recorded.

#![cfg(any(test, feature = "std"))]

use core::cell::Cell;

use crate::adc::{AdcChannel, ConversionStatus};
use crate::clock_tree::{ClockController, Oscillator, PeripheralClock, PllConfig, SysclkSource};
use crate::gpio::{GpioPort, PinId, PinMode};
use crate::tick::{CycleCounter, TickTimer};
use crate::timer::{Channel, EncoderTimer, PwmTimer};

const HISTORY: usize = 64;

// ── RCC ──────────────────────────────────────────────────────────────────────

/// One call seen by [`MockClockController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ClockEvent {
    OscillatorOn(Oscillator),
    OscillatorOff(Oscillator),
    Sysclk(SysclkSource),
    VoltageScale1,
    BusPrescalers(u16, u8, u8),
    PllOff,
    PllConfig(Oscillator, PllConfig),
    PllOn,
    Flash(u8),
    PeripheralClock(PeripheralClock),
    CycleCounter,
}

/// Mock RCC/PWR/FLASH/DWT.
///
/// Ready flags go high after `ready_after_polls` polls following the request
/// that started them, unless the corresponding `*_never_*` switch is set.
pub struct MockClockController {
    /// Polls each ready flag needs before it reads as set.
    pub ready_after_polls: u32,
    /// Oscillator ready flag never sets.
    pub oscillator_never_ready: bool,
    /// PLL never locks.
    pub pll_never_locks: bool,
    events: heapless::Vec<ClockEvent, HISTORY>,
    pending: Cell<u32>,
    pll_polls: Cell<u32>,
    previous_sysclk: SysclkSource,
    selected_sysclk: SysclkSource,
}

impl MockClockController {
    /// Controller whose flags are ready on the first poll.
    pub fn new() -> Self {
        Self {
            ready_after_polls: 0,
            oscillator_never_ready: false,
            pll_never_locks: false,
            events: heapless::Vec::new(),
            pending: Cell::new(0),
            pll_polls: Cell::new(0),
            previous_sysclk: SysclkSource::Hsi,
            selected_sysclk: SysclkSource::Hsi,
        }
    }

    /// Calls received, in order.
    pub fn events(&self) -> &[ClockEvent] {
        &self.events
    }

    /// Number of PLL-ready polls seen.
    pub fn pll_polls(&self) -> u32 {
        self.pll_polls.get()
    }

    /// Whether `clock` was gated on.
    pub fn clock_enabled(&self, clock: PeripheralClock) -> bool {
        self.events.contains(&ClockEvent::PeripheralClock(clock))
    }

    fn record(&mut self, event: ClockEvent) {
        let _ = self.events.push(event);
    }

    fn start_wait(&mut self) {
        self.pending.set(self.ready_after_polls);
    }

    fn poll(&self) -> bool {
        let left = self.pending.get();
        if left == 0 {
            return true;
        }
        self.pending.set(left.saturating_sub(1));
        false
    }
}

impl Default for MockClockController {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockController for MockClockController {
    fn enable_oscillator(&mut self, oscillator: Oscillator) {
        self.record(ClockEvent::OscillatorOn(oscillator));
        self.start_wait();
    }

    fn oscillator_ready(&self, _oscillator: Oscillator) -> bool {
        !self.oscillator_never_ready && self.poll()
    }

    fn disable_oscillator(&mut self, oscillator: Oscillator) {
        self.record(ClockEvent::OscillatorOff(oscillator));
    }

    fn select_sysclk(&mut self, source: SysclkSource) {
        self.record(ClockEvent::Sysclk(source));
        self.previous_sysclk = self.selected_sysclk;
        self.selected_sysclk = source;
        self.start_wait();
    }

    fn sysclk_status(&self) -> SysclkSource {
        if self.poll() {
            self.selected_sysclk
        } else {
            self.previous_sysclk
        }
    }

    fn set_voltage_scale1(&mut self) {
        self.record(ClockEvent::VoltageScale1);
    }

    fn set_bus_prescalers(&mut self, ahb_div: u16, apb1_div: u8, apb2_div: u8) {
        self.record(ClockEvent::BusPrescalers(ahb_div, apb1_div, apb2_div));
    }

    fn disable_pll(&mut self) {
        self.record(ClockEvent::PllOff);
    }

    fn configure_pll(&mut self, source: Oscillator, pll: PllConfig) {
        self.record(ClockEvent::PllConfig(source, pll));
    }

    fn enable_pll(&mut self) {
        self.record(ClockEvent::PllOn);
        self.start_wait();
    }

    fn pll_ready(&self) -> bool {
        self.pll_polls.set(self.pll_polls.get().saturating_add(1));
        !self.pll_never_locks && self.poll()
    }

    fn configure_flash(&mut self, wait_states: u8) {
        self.record(ClockEvent::Flash(wait_states));
    }

    fn enable_peripheral_clock(&mut self, clock: PeripheralClock) {
        self.record(ClockEvent::PeripheralClock(clock));
    }

    fn enable_cycle_counter(&mut self) {
        self.record(ClockEvent::CycleCounter);
    }
}

// ── GPIO ─────────────────────────────────────────────────────────────────────

/// One register write seen by [`MockGpio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GpioWrite {
    Mode(PinId, PinMode),
    AlternateFunction(PinId, u8),
    Level(PinId, bool),
}

/// Mock GPIO banks.
pub struct MockGpio {
    writes: heapless::Vec<GpioWrite, HISTORY>,
}

impl MockGpio {
    /// No writes yet.
    pub fn new() -> Self {
        Self {
            writes: heapless::Vec::new(),
        }
    }

    /// Writes received, in order.
    pub fn writes(&self) -> &[GpioWrite] {
        &self.writes
    }

    /// Last level driven on `pin`.
    pub fn level(&self, pin: PinId) -> Option<bool> {
        self.writes.iter().rev().find_map(|w| match *w {
            GpioWrite::Level(p, high) if p == pin => Some(high),
            _ => None,
        })
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioPort for MockGpio {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) {
        let _ = self.writes.push(GpioWrite::Mode(pin, mode));
    }

    fn set_alternate_function(&mut self, pin: PinId, af: u8) {
        let _ = self.writes.push(GpioWrite::AlternateFunction(pin, af));
    }

    fn set_level(&mut self, pin: PinId, high: bool) {
        let _ = self.writes.push(GpioWrite::Level(pin, high));
    }
}

// ── Timers ───────────────────────────────────────────────────────────────────

/// One register write seen by [`MockPwmTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TimerWrite {
    EdgeAlignedUp,
    Prescaler(u16),
    AutoReload(u16),
    RepetitionCounter(u8),
    Preload,
    Continuous,
    PwmMode1(Channel),
    Compare(Channel, u16),
    OutputOn(Channel),
    OutputOff(Channel),
    MainOutput,
    Update,
    CounterOn,
    CounterOff,
}

/// Mock PWM timer: register shadow plus write history.
#[derive(Debug, Clone)]
pub struct MockPwmTimer {
    /// PSC.
    pub prescaler: u16,
    /// ARR.
    pub auto_reload: u16,
    /// RCR, once written.
    pub repetition_counter: Option<u8>,
    /// CR1 CMS/DIR configured.
    pub edge_aligned_up: bool,
    /// CR1.ARPE.
    pub preload: bool,
    /// CR1.OPM = 0 written.
    pub continuous: bool,
    /// OCxM = PWM1 per channel.
    pub pwm_mode1: [bool; 4],
    /// CCRx.
    pub compare: [u16; 4],
    /// CCER.CCxE.
    pub output_enabled: [bool; 4],
    /// BDTR.MOE.
    pub main_output: bool,
    /// CR1.CEN.
    pub counter_enabled: bool,
    /// EGR.UG writes.
    pub update_events: u32,
    writes: heapless::Vec<TimerWrite, HISTORY>,
}

impl MockPwmTimer {
    /// Timer in its reset state.
    pub fn new() -> Self {
        Self {
            prescaler: 0,
            auto_reload: 0xFFFF,
            repetition_counter: None,
            edge_aligned_up: false,
            preload: false,
            continuous: false,
            pwm_mode1: [false; 4],
            compare: [0; 4],
            output_enabled: [false; 4],
            main_output: false,
            counter_enabled: false,
            update_events: 0,
            writes: heapless::Vec::new(),
        }
    }

    /// Writes received, in order.
    pub fn writes(&self) -> &[TimerWrite] {
        &self.writes
    }

    fn record(&mut self, write: TimerWrite) {
        let _ = self.writes.push(write);
    }

    fn slot<T>(array: &mut [T; 4], channel: Channel) -> Option<&mut T> {
        array.get_mut(channel.index())
    }
}

impl Default for MockPwmTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmTimer for MockPwmTimer {
    fn set_edge_aligned_up(&mut self) {
        self.edge_aligned_up = true;
        self.record(TimerWrite::EdgeAlignedUp);
    }

    fn set_prescaler(&mut self, prescaler: u16) {
        self.prescaler = prescaler;
        self.record(TimerWrite::Prescaler(prescaler));
    }

    fn set_auto_reload(&mut self, auto_reload: u16) {
        self.auto_reload = auto_reload;
        self.record(TimerWrite::AutoReload(auto_reload));
    }

    fn set_repetition_counter(&mut self, value: u8) {
        self.repetition_counter = Some(value);
        self.record(TimerWrite::RepetitionCounter(value));
    }

    fn enable_auto_reload_preload(&mut self) {
        self.preload = true;
        self.record(TimerWrite::Preload);
    }

    fn set_continuous(&mut self) {
        self.continuous = true;
        self.record(TimerWrite::Continuous);
    }

    fn set_pwm_mode1(&mut self, channel: Channel) {
        if let Some(flag) = Self::slot(&mut self.pwm_mode1, channel) {
            *flag = true;
        }
        self.record(TimerWrite::PwmMode1(channel));
    }

    fn set_compare(&mut self, channel: Channel, value: u16) {
        if let Some(ccr) = Self::slot(&mut self.compare, channel) {
            *ccr = value;
        }
        self.record(TimerWrite::Compare(channel, value));
    }

    fn enable_output(&mut self, channel: Channel) {
        if let Some(flag) = Self::slot(&mut self.output_enabled, channel) {
            *flag = true;
        }
        self.record(TimerWrite::OutputOn(channel));
    }

    fn disable_output(&mut self, channel: Channel) {
        if let Some(flag) = Self::slot(&mut self.output_enabled, channel) {
            *flag = false;
        }
        self.record(TimerWrite::OutputOff(channel));
    }

    fn enable_main_output(&mut self) {
        self.main_output = true;
        self.record(TimerWrite::MainOutput);
    }

    fn generate_update(&mut self) {
        self.update_events = self.update_events.saturating_add(1);
        self.record(TimerWrite::Update);
    }

    fn enable_counter(&mut self) {
        self.counter_enabled = true;
        self.record(TimerWrite::CounterOn);
    }

    fn disable_counter(&mut self) {
        self.counter_enabled = false;
        self.record(TimerWrite::CounterOff);
    }
}

/// Mock encoder timer with a settable counter.
#[derive(Debug, Clone, Default)]
pub struct MockEncoderTimer {
    /// Encoder mode configured.
    pub quadrature: bool,
    /// CNT.
    pub count: u16,
}

impl MockEncoderTimer {
    /// Unconfigured timer at count 0.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EncoderTimer for MockEncoderTimer {
    fn configure_quadrature(&mut self) {
        self.quadrature = true;
    }

    fn count(&self) -> u16 {
        self.count
    }
}

// ── ADC ──────────────────────────────────────────────────────────────────────

/// Mock ADC channel.
#[derive(Debug, Clone, Default)]
pub struct MockAdc {
    /// `configure` called.
    pub configured: bool,
    /// Value returned by the data register.
    pub sample: u16,
    /// Busy polls before EOC on each conversion.
    pub busy_polls: u32,
    /// OVR flag.
    pub overrun: bool,
    /// Conversions started.
    pub conversions: u32,
    remaining: u32,
}

impl MockAdc {
    /// Idle ADC returning 0.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AdcChannel for MockAdc {
    fn configure(&mut self) {
        self.configured = true;
    }

    fn start_conversion(&mut self) {
        self.conversions = self.conversions.saturating_add(1);
        self.remaining = self.busy_polls;
    }

    fn status(&mut self) -> ConversionStatus {
        if self.overrun {
            return ConversionStatus::Overrun;
        }
        if self.remaining > 0 {
            self.remaining = self.remaining.saturating_sub(1);
            return ConversionStatus::Busy;
        }
        ConversionStatus::Complete
    }

    fn read_data(&mut self) -> u16 {
        self.sample
    }

    fn clear_overrun(&mut self) {
        self.overrun = false;
    }
}

// ── SysTick / DWT ────────────────────────────────────────────────────────────

/// Mock SysTick.
#[derive(Debug, Clone, Default)]
pub struct MockTickTimer {
    /// SYST_RVR.
    pub reload: u32,
    /// SYST_CSR.ENABLE.
    pub counter_enabled: bool,
    /// SYST_CSR.TICKINT.
    pub interrupt_enabled: bool,
    /// SYST_CVR writes.
    pub current_clears: u32,
}

impl MockTickTimer {
    /// SysTick in its reset state.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TickTimer for MockTickTimer {
    fn set_reload(&mut self, reload: u32) {
        self.reload = reload;
    }

    fn clear_current(&mut self) {
        self.current_clears = self.current_clears.saturating_add(1);
    }

    fn enable_counter(&mut self) {
        self.counter_enabled = true;
    }

    fn enable_interrupt(&mut self) {
        self.interrupt_enabled = true;
    }

    fn disable_interrupt(&mut self) {
        self.interrupt_enabled = false;
    }
}

/// Mock cycle counter that advances by `step` on every read.
#[derive(Debug, Default)]
pub struct MockCycleCounter {
    /// Increment per read.
    pub step: u32,
    value: Cell<u32>,
}

impl MockCycleCounter {
    /// Counter starting at `start`.
    pub fn new(start: u32, step: u32) -> Self {
        Self {
            step,
            value: Cell::new(start),
        }
    }
}

impl CycleCounter for MockCycleCounter {
    fn cycles(&self) -> u32 {
        let now = self.value.get();
        self.value.set(now.wrapping_add(self.step));
        now
    }
}
