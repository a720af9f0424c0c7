//! Mock robot board for firmware integration tests.
//!
//! Every peripheral records its kind into a shared journal on each call, so
//! tests can check the order in which the boot sequence touches hardware.
//! The IMU and button are small fakes backed by shared cells the test keeps.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType as PinErrorType, InputPin};
use embedded_hal::spi::{ErrorKind, ErrorType as SpiErrorType, Operation, SpiDevice};

use firmware::{BoardHal, BoardPeripherals};
use platform::adc::{AdcChannel, ConversionStatus};
use platform::clock_tree::{ClockController, Oscillator, PeripheralClock, PllConfig, SysclkSource};
use platform::gpio::{GpioPort, PinId, PinMode};
use platform::mocks::{
    MockAdc, MockClockController, MockCycleCounter, MockEncoderTimer, MockGpio, MockPwmTimer,
    MockTickTimer,
};
use platform::tick::TickTimer;
use platform::timer::{Channel, EncoderTimer, PwmTimer};

/// Peripheral that handled a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    Rcc,
    Gpio,
    SpeakerTimer,
    MotorTimer,
    Encoder,
    Adc,
    Imu,
    Button,
    Tick,
}

pub type Journal = Rc<RefCell<Vec<Touch>>>;

/// Journal with consecutive repeats collapsed.
pub fn phases(journal: &Journal) -> Vec<Touch> {
    let mut out: Vec<Touch> = journal.borrow().clone();
    out.dedup();
    out
}

/// A platform mock that notes every call in the journal.
pub struct Logged<T> {
    pub inner: T,
    kind: Touch,
    journal: Journal,
}

impl<T> Logged<T> {
    fn new(inner: T, kind: Touch, journal: &Journal) -> Self {
        Self {
            inner,
            kind,
            journal: Rc::clone(journal),
        }
    }

    fn note(&self) {
        self.journal.borrow_mut().push(self.kind);
    }
}

impl<T: ClockController> ClockController for Logged<T> {
    fn enable_oscillator(&mut self, oscillator: Oscillator) {
        self.note();
        self.inner.enable_oscillator(oscillator);
    }
    fn oscillator_ready(&self, oscillator: Oscillator) -> bool {
        self.note();
        self.inner.oscillator_ready(oscillator)
    }
    fn disable_oscillator(&mut self, oscillator: Oscillator) {
        self.note();
        self.inner.disable_oscillator(oscillator);
    }
    fn select_sysclk(&mut self, source: SysclkSource) {
        self.note();
        self.inner.select_sysclk(source);
    }
    fn sysclk_status(&self) -> SysclkSource {
        self.note();
        self.inner.sysclk_status()
    }
    fn set_voltage_scale1(&mut self) {
        self.note();
        self.inner.set_voltage_scale1();
    }
    fn set_bus_prescalers(&mut self, ahb_div: u16, apb1_div: u8, apb2_div: u8) {
        self.note();
        self.inner.set_bus_prescalers(ahb_div, apb1_div, apb2_div);
    }
    fn disable_pll(&mut self) {
        self.note();
        self.inner.disable_pll();
    }
    fn configure_pll(&mut self, source: Oscillator, pll: PllConfig) {
        self.note();
        self.inner.configure_pll(source, pll);
    }
    fn enable_pll(&mut self) {
        self.note();
        self.inner.enable_pll();
    }
    fn pll_ready(&self) -> bool {
        self.note();
        self.inner.pll_ready()
    }
    fn configure_flash(&mut self, wait_states: u8) {
        self.note();
        self.inner.configure_flash(wait_states);
    }
    fn enable_peripheral_clock(&mut self, clock: PeripheralClock) {
        self.note();
        self.inner.enable_peripheral_clock(clock);
    }
    fn enable_cycle_counter(&mut self) {
        self.note();
        self.inner.enable_cycle_counter();
    }
}

impl<T: GpioPort> GpioPort for Logged<T> {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) {
        self.note();
        self.inner.set_mode(pin, mode);
    }
    fn set_alternate_function(&mut self, pin: PinId, af: u8) {
        self.note();
        self.inner.set_alternate_function(pin, af);
    }
    fn set_level(&mut self, pin: PinId, high: bool) {
        self.note();
        self.inner.set_level(pin, high);
    }
}

impl<T: PwmTimer> PwmTimer for Logged<T> {
    fn set_edge_aligned_up(&mut self) {
        self.note();
        self.inner.set_edge_aligned_up();
    }
    fn set_prescaler(&mut self, prescaler: u16) {
        self.note();
        self.inner.set_prescaler(prescaler);
    }
    fn set_auto_reload(&mut self, auto_reload: u16) {
        self.note();
        self.inner.set_auto_reload(auto_reload);
    }
    fn set_repetition_counter(&mut self, value: u8) {
        self.note();
        self.inner.set_repetition_counter(value);
    }
    fn enable_auto_reload_preload(&mut self) {
        self.note();
        self.inner.enable_auto_reload_preload();
    }
    fn set_continuous(&mut self) {
        self.note();
        self.inner.set_continuous();
    }
    fn set_pwm_mode1(&mut self, channel: Channel) {
        self.note();
        self.inner.set_pwm_mode1(channel);
    }
    fn set_compare(&mut self, channel: Channel, value: u16) {
        self.note();
        self.inner.set_compare(channel, value);
    }
    fn enable_output(&mut self, channel: Channel) {
        self.note();
        self.inner.enable_output(channel);
    }
    fn disable_output(&mut self, channel: Channel) {
        self.note();
        self.inner.disable_output(channel);
    }
    fn enable_main_output(&mut self) {
        self.note();
        self.inner.enable_main_output();
    }
    fn generate_update(&mut self) {
        self.note();
        self.inner.generate_update();
    }
    fn enable_counter(&mut self) {
        self.note();
        self.inner.enable_counter();
    }
    fn disable_counter(&mut self) {
        self.note();
        self.inner.disable_counter();
    }
}

impl<T: EncoderTimer> EncoderTimer for Logged<T> {
    fn configure_quadrature(&mut self) {
        self.note();
        self.inner.configure_quadrature();
    }
    fn count(&self) -> u16 {
        self.note();
        self.inner.count()
    }
}

impl<T: AdcChannel> AdcChannel for Logged<T> {
    fn configure(&mut self) {
        self.note();
        self.inner.configure();
    }
    fn start_conversion(&mut self) {
        self.note();
        self.inner.start_conversion();
    }
    fn status(&mut self) -> ConversionStatus {
        self.note();
        self.inner.status()
    }
    fn read_data(&mut self) -> u16 {
        self.note();
        self.inner.read_data()
    }
    fn clear_overrun(&mut self) {
        self.note();
        self.inner.clear_overrun();
    }
}

impl<T: TickTimer> TickTimer for Logged<T> {
    fn set_reload(&mut self, reload: u32) {
        self.note();
        self.inner.set_reload(reload);
    }
    fn clear_current(&mut self) {
        self.note();
        self.inner.clear_current();
    }
    fn enable_counter(&mut self) {
        self.note();
        self.inner.enable_counter();
    }
    fn enable_interrupt(&mut self) {
        self.note();
        self.inner.enable_interrupt();
    }
    fn disable_interrupt(&mut self) {
        self.note();
        self.inner.disable_interrupt();
    }
}

/// Register-file IMU behind an SPI chip select.
///
/// `[addr | 0x80, _]` reads `addr`; `[addr, value]` writes it.
pub struct FakeImu {
    registers: Rc<RefCell<HashMap<u8, u8>>>,
    fail: Rc<Cell<bool>>,
    journal: Journal,
}

impl SpiErrorType for FakeImu {
    type Error = ErrorKind;
}

impl SpiDevice for FakeImu {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        self.journal.borrow_mut().push(Touch::Imu);
        if self.fail.get() {
            return Err(ErrorKind::Other);
        }
        let mut registers = self.registers.borrow_mut();
        for op in operations.iter_mut() {
            match op {
                Operation::TransferInPlace(frame) if frame.len() >= 2 && frame[0] & 0x80 != 0 => {
                    frame[1] = registers.get(&(frame[0] & 0x7F)).copied().unwrap_or(0);
                }
                Operation::Write(frame) if frame.len() >= 2 => {
                    registers.insert(frame[0], frame[1]);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Button whose level the test sets.
pub struct FakeButton {
    level: Rc<Cell<bool>>,
    journal: Journal,
}

impl PinErrorType for FakeButton {
    type Error = Infallible;
}

impl InputPin for FakeButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        self.journal.borrow_mut().push(Touch::Button);
        Ok(self.level.get())
    }
    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

/// The mock board.
pub struct TestHal;

impl BoardHal for TestHal {
    type Rcc = Logged<MockClockController>;
    type Gpio = Logged<MockGpio>;
    type MotorTimer = Logged<MockPwmTimer>;
    type SpeakerTimer = Logged<MockPwmTimer>;
    type Encoder = Logged<MockEncoderTimer>;
    type Adc = Logged<MockAdc>;
    type ImuSpi = FakeImu;
    type Button = FakeButton;
    type Tick = Logged<MockTickTimer>;
    type Cycles = MockCycleCounter;
}

/// Handles the test keeps after moving the peripherals into `setup`.
pub struct Rig {
    pub journal: Journal,
    pub imu_registers: Rc<RefCell<HashMap<u8, u8>>>,
    pub imu_fail: Rc<Cell<bool>>,
    pub button: Rc<Cell<bool>>,
}

pub const LEFT_COUNT: u16 = 120;
pub const RIGHT_COUNT: u16 = 65_500;
pub const BATTERY_SAMPLE: u16 = 3_000;
pub const CYCLE_START: u32 = 1_000;
pub const CYCLE_STEP: u32 = 168;

/// A healthy board: IMU present, battery sample set, encoders moved.
pub fn peripherals() -> (BoardPeripherals<TestHal>, Rig) {
    let journal: Journal = Rc::new(RefCell::new(Vec::new()));
    let imu_registers = Rc::new(RefCell::new(HashMap::from([(
        firmware::config::IMU_WHO_AM_I,
        firmware::config::IMU_EXPECTED_ID,
    )])));
    let imu_fail = Rc::new(Cell::new(false));
    let button = Rc::new(Cell::new(false));

    let mut encoder_left = MockEncoderTimer::new();
    encoder_left.count = LEFT_COUNT;
    let mut encoder_right = MockEncoderTimer::new();
    encoder_right.count = RIGHT_COUNT;
    let mut adc = MockAdc::new();
    adc.sample = BATTERY_SAMPLE;
    adc.busy_polls = 3;

    let p = BoardPeripherals {
        rcc: Logged::new(MockClockController::new(), Touch::Rcc, &journal),
        gpio: Logged::new(MockGpio::new(), Touch::Gpio, &journal),
        motor_timer: Logged::new(MockPwmTimer::new(), Touch::MotorTimer, &journal),
        speaker_timer: Logged::new(MockPwmTimer::new(), Touch::SpeakerTimer, &journal),
        encoder_left: Logged::new(encoder_left, Touch::Encoder, &journal),
        encoder_right: Logged::new(encoder_right, Touch::Encoder, &journal),
        adc: Logged::new(adc, Touch::Adc, &journal),
        imu_spi: FakeImu {
            registers: Rc::clone(&imu_registers),
            fail: Rc::clone(&imu_fail),
            journal: Rc::clone(&journal),
        },
        button: FakeButton {
            level: Rc::clone(&button),
            journal: Rc::clone(&journal),
        },
        tick: Logged::new(MockTickTimer::new(), Touch::Tick, &journal),
        cycles: MockCycleCounter::new(CYCLE_START, CYCLE_STEP),
    };
    let rig = Rig {
        journal,
        imu_registers,
        imu_fail,
        button,
    };
    (p, rig)
}
