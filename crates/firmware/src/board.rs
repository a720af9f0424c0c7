//! The booted board and the shared slot it lives in.
//!
//! [`Board`] owns every driver produced by [`setup`](crate::boot::setup).
//! The control loop reaches it through a [`BoardCell`], a
//! `critical_section::Mutex` so each accessor runs with interrupts masked and
//! the SysTick handler never sees the speaker or motor timers half-written.
//!
//! The cell's accessors are safe to call before a board is installed: readers
//! return zero or `false`, fallible reads fail with [`SensorError::NotReady`]
//! and actuators do nothing.

use core::cell::RefCell;

use critical_section::Mutex;

use platform::adc::VoltageSensor;
use platform::button::UserButton;
use platform::clock_tree::ClockPlan;
use platform::encoder::QuadratureEncoder;
use platform::gpio::PinMapper;
use platform::pwm::{MotorPwm, MotorSide, Speaker};
use platform::sensor_bus::RegisterBus;
use platform::tick::{CycleCounter, PeriodicTick, TickSchedule};
use platform::timer::Channel;
use platform::{ConfigError, SensorError};

use crate::boot::{self, BoardHal, BoardPeripherals, BootError};
use crate::config::LED_PINS;

/// Status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum Led {
    L1,
    L2,
    L3,
    L4,
}

impl Led {
    /// All LEDs, in pin order.
    pub const ALL: [Led; 4] = [Led::L1, Led::L2, Led::L3, Led::L4];

    const fn index(self) -> usize {
        match self {
            Led::L1 => 0,
            Led::L2 => 1,
            Led::L3 => 2,
            Led::L4 => 3,
        }
    }
}

/// Every driver on the board, after a successful boot.
pub struct Board<H: BoardHal> {
    pub(crate) plan: ClockPlan,
    pub(crate) pins: PinMapper<H::Gpio>,
    pub(crate) speaker: Speaker<H::SpeakerTimer>,
    pub(crate) motors: MotorPwm<H::MotorTimer>,
    pub(crate) encoder_left: QuadratureEncoder<H::Encoder>,
    pub(crate) encoder_right: QuadratureEncoder<H::Encoder>,
    pub(crate) battery: VoltageSensor<H::Adc>,
    pub(crate) imu: RegisterBus<H::ImuSpi>,
    pub(crate) imu_present: bool,
    pub(crate) button: UserButton<H::Button>,
    pub(crate) tick: PeriodicTick<H::Tick>,
    pub(crate) cycles: H::Cycles,
}

impl<H: BoardHal> Board<H> {
    /// Clock plan the board booted with.
    pub fn plan(&self) -> &ClockPlan {
        &self.plan
    }

    // ── Sensors ──────────────────────────────────────────────────────────────

    /// Button level (`true` = high).
    pub fn read_user_button(&mut self) -> Result<bool, SensorError> {
        self.button.read()
    }

    /// Raw left encoder count.
    pub fn read_encoder_left(&self) -> u16 {
        self.encoder_left.read()
    }

    /// Raw right encoder count.
    pub fn read_encoder_right(&self) -> u16 {
        self.encoder_right.read()
    }

    /// Battery voltage at the divider input.
    pub fn battery_voltage(&mut self) -> Result<f32, SensorError> {
        self.battery.read_volts()
    }

    /// Motor supply voltage. The motors run straight off the battery.
    pub fn motors_voltage(&mut self) -> Result<f32, SensorError> {
        self.battery.read_volts()
    }

    /// Read one IMU register.
    pub fn sensor_read_register(&mut self, address: u8) -> Result<u8, SensorError> {
        self.imu.read_register(address)
    }

    /// Write one IMU register.
    pub fn sensor_write_register(&mut self, address: u8, value: u8) -> Result<(), SensorError> {
        self.imu.write_register(address, value)
    }

    /// Whether the IMU answered with the expected identity at boot.
    pub fn imu_present(&self) -> bool {
        self.imu_present
    }

    /// DWT cycle count.
    pub fn read_cycle_counter(&self) -> u32 {
        self.cycles.cycles()
    }

    // ── Speaker ──────────────────────────────────────────────────────────────

    /// Play a tone, saturating to the reachable range.
    pub fn speaker_on(&mut self, frequency_hz: f32) {
        self.speaker.on(frequency_hz);
    }

    /// Play a tone, rejecting frequencies the timer cannot produce.
    pub fn try_speaker_on(&mut self, frequency_hz: f32) -> Result<(), ConfigError> {
        self.speaker.try_on(frequency_hz)
    }

    /// Silence the speaker. The timer keeps counting.
    pub fn speaker_off(&mut self) {
        self.speaker.off();
    }

    /// Speaker driver.
    pub fn speaker(&self) -> &Speaker<H::SpeakerTimer> {
        &self.speaker
    }

    // ── Motors ───────────────────────────────────────────────────────────────

    /// Write a motor compare value, clamped to the period.
    pub fn set_motor_compare(&mut self, channel: Channel, value: u16) {
        self.motors.set_compare(channel, value);
    }

    /// Write a motor compare value; out of range is an error.
    pub fn try_set_motor_compare(&mut self, channel: Channel, value: u16) -> Result<(), ConfigError> {
        self.motors.try_set_compare(channel, value)
    }

    /// Drive one wheel with a signed duty in `[-1, 1]`.
    pub fn drive_motor(&mut self, side: MotorSide, duty: f32) {
        self.motors.drive(side, duty);
    }

    /// Zero both motors.
    pub fn stop_motors(&mut self) {
        self.motors.stop();
    }

    /// Motor driver.
    pub fn motors(&self) -> &MotorPwm<H::MotorTimer> {
        &self.motors
    }

    // ── LEDs ─────────────────────────────────────────────────────────────────

    /// Switch a status LED.
    pub fn led_set(&mut self, led: Led, on: bool) {
        let Some(&pin) = LED_PINS.get(led.index()) else {
            return;
        };
        // LED pins are bound as outputs at boot; a failure means the pin was
        // rebound, which nothing on the board does.
        if let Err(_e) = self.pins.write(pin, on) {
            #[cfg(feature = "defmt")]
            defmt::warn!("led {}: {}", led, _e);
        }
    }

    /// Pin mapper.
    pub fn pins(&self) -> &PinMapper<H::Gpio> {
        &self.pins
    }

    // ── Tick ─────────────────────────────────────────────────────────────────

    /// Unmask the SysTick interrupt.
    pub fn enable_tick(&mut self) {
        self.tick.enable();
    }

    /// Mask the SysTick interrupt. SysTick keeps counting.
    pub fn disable_tick(&mut self) {
        self.tick.disable();
    }

    /// Tick rate and interrupt state.
    pub fn tick_schedule(&self) -> TickSchedule {
        self.tick.schedule()
    }
}

/// Shared slot for the booted board.
pub struct BoardCell<H: BoardHal> {
    inner: Mutex<RefCell<Option<Board<H>>>>,
}

impl<H: BoardHal> BoardCell<H> {
    /// Empty slot, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Store the booted board. Hands it back if the slot is already taken.
    pub fn install(&self, board: Board<H>) -> Result<(), Board<H>> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow_ref_mut(cs);
            if slot.is_some() {
                return Err(board);
            }
            *slot = Some(board);
            Ok(())
        })
    }

    /// Whether a board has been installed.
    pub fn is_ready(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_some())
    }

    /// Run `f` on the board with interrupts masked. `None` before boot.
    pub fn with<R>(&self, f: impl FnOnce(&mut Board<H>) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Run the boot sequence on `peripherals` and install the result.
    ///
    /// A board that is already installed stays; the new one is dropped.
    pub fn boot(&self, peripherals: BoardPeripherals<H>) -> Result<(), BootError> {
        let board = boot::setup(peripherals)?;
        if self.install(board).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("board already installed");
        }
        Ok(())
    }

    /// User button level; `false` before boot or on a read failure.
    pub fn read_user_button(&self) -> bool {
        self.with(|b| b.read_user_button().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Raw left encoder count; 0 before boot.
    pub fn read_encoder_left(&self) -> u16 {
        self.with(|b| b.read_encoder_left()).unwrap_or(0)
    }

    /// Raw right encoder count; 0 before boot.
    pub fn read_encoder_right(&self) -> u16 {
        self.with(|b| b.read_encoder_right()).unwrap_or(0)
    }

    /// Battery voltage.
    pub fn get_battery_voltage(&self) -> Result<f32, SensorError> {
        self.with(|b| b.battery_voltage())
            .unwrap_or(Err(SensorError::NotReady))
    }

    /// Motor supply voltage.
    pub fn get_motors_voltage(&self) -> Result<f32, SensorError> {
        self.with(|b| b.motors_voltage())
            .unwrap_or(Err(SensorError::NotReady))
    }

    /// Read one IMU register.
    pub fn sensor_read_register(&self, address: u8) -> Result<u8, SensorError> {
        self.with(|b| b.sensor_read_register(address))
            .unwrap_or(Err(SensorError::NotReady))
    }

    /// Write one IMU register.
    pub fn sensor_write_register(&self, address: u8, value: u8) -> Result<(), SensorError> {
        self.with(|b| b.sensor_write_register(address, value))
            .unwrap_or(Err(SensorError::NotReady))
    }

    /// Play a tone, saturating to the reachable range.
    pub fn speaker_on(&self, frequency_hz: f32) {
        let _ = self.with(|b| b.speaker_on(frequency_hz));
    }

    /// Silence the speaker.
    pub fn speaker_off(&self) {
        let _ = self.with(|b| b.speaker_off());
    }

    /// Write a motor compare value, clamped to the period.
    pub fn set_motor_compare(&self, channel: Channel, value: u16) {
        let _ = self.with(|b| b.set_motor_compare(channel, value));
    }

    /// Drive one wheel with a signed duty in `[-1, 1]`.
    pub fn drive_motor(&self, side: MotorSide, duty: f32) {
        let _ = self.with(|b| b.drive_motor(side, duty));
    }

    /// Switch a status LED.
    pub fn led_set(&self, led: Led, on: bool) {
        let _ = self.with(|b| b.led_set(led, on));
    }

    /// Unmask the tick interrupt.
    pub fn enable_tick(&self) {
        let _ = self.with(|b| b.enable_tick());
    }

    /// Mask the tick interrupt.
    pub fn disable_tick(&self) {
        let _ = self.with(|b| b.disable_tick());
    }
}

impl<H: BoardHal> Default for BoardCell<H> {
    fn default() -> Self {
        Self::new()
    }
}
