//! Free-function board API for the control loop.
//!
//! Thin wrappers over the [`BoardCell`] accessors on the board's `static`
//! slot; pre-boot behaviour is the cell's.

use platform::pwm::MotorSide;
use platform::tick::{CycleCounter, TickDispatcher};
use platform::timer::Channel;
use platform::SensorError;

use crate::board::{BoardCell, Led};
use crate::hw::{HardwareCycleCounter, HardwareHal};

/// The booted board.
pub static BOARD: BoardCell<HardwareHal> = BoardCell::new();

/// Control-loop tick handler slot, fed by the SysTick exception.
pub static TICK: TickDispatcher = TickDispatcher::new();

/// Bring the board up and install it. Resets the MCU if any boot step fails.
pub fn setup() {
    let Some(peripherals) = HardwareHal::take() else {
        defmt::warn!("setup: board already taken");
        return;
    };
    if let Err(e) = BOARD.boot(peripherals) {
        defmt::error!("setup failed: {}, resetting", e);
        cortex_m::peripheral::SCB::sys_reset();
    }
}

/// Install the control-loop handler run on every tick. First caller wins.
pub fn register_tick_handler(handler: fn()) -> bool {
    TICK.register(handler)
}

/// User button level; `false` on a read failure.
pub fn read_user_button() -> bool {
    BOARD.read_user_button()
}

/// Raw left encoder count.
pub fn read_encoder_left() -> u16 {
    BOARD.read_encoder_left()
}

/// Raw right encoder count.
pub fn read_encoder_right() -> u16 {
    BOARD.read_encoder_right()
}

/// Battery voltage.
pub fn get_battery_voltage() -> Result<f32, SensorError> {
    BOARD.get_battery_voltage()
}

/// Motor supply voltage.
pub fn get_motors_voltage() -> Result<f32, SensorError> {
    BOARD.get_motors_voltage()
}

/// Read one IMU register.
pub fn sensor_read_register(address: u8) -> Result<u8, SensorError> {
    BOARD.sensor_read_register(address)
}

/// Write one IMU register.
pub fn sensor_write_register(address: u8, value: u8) -> Result<(), SensorError> {
    BOARD.sensor_write_register(address, value)
}

/// Play a tone at `frequency_hz`, saturating to the reachable range.
pub fn speaker_on(frequency_hz: f32) {
    BOARD.speaker_on(frequency_hz);
}

/// Silence the speaker.
pub fn speaker_off() {
    BOARD.speaker_off();
}

/// Write a motor compare value, clamped to the period.
pub fn set_motor_compare(channel: Channel, value: u16) {
    BOARD.set_motor_compare(channel, value);
}

/// Drive one wheel with a signed duty in `[-1, 1]`.
pub fn drive_motor(side: MotorSide, duty: f32) {
    BOARD.drive_motor(side, duty);
}

/// Switch a status LED.
pub fn led_set(led: Led, on: bool) {
    BOARD.led_set(led, on);
}

/// DWT cycle count. Lock-free; valid once the clock step has run.
pub fn read_cycle_counter() -> u32 {
    HardwareCycleCounter.cycles()
}

/// Unmask the SysTick interrupt.
pub fn enable_systick_interruption() {
    BOARD.enable_tick();
}

/// Mask the SysTick interrupt.
pub fn disable_systick_interruption() {
    BOARD.disable_tick();
}
