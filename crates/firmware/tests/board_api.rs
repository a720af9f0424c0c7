//! Integration test: the booted board's runtime operations.
//!
//! Exercises everything the control loop calls after boot (speaker, motors,
//! sensors, LEDs, tick, cycle counter) through `Board` and the shared
//! `BoardCell` slot, on mock peripherals, including what the slot answers
//! before a board is installed.
//!
//! Run with: cargo test -p firmware --test board_api

// Integration test file -- intentional test patterns permitted.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::arithmetic_side_effects,
)]

mod support;

use firmware::{config, setup, Board, BoardCell, Led};
use platform::adc::ADC_LSB;
use platform::pwm::MotorSide;
use platform::timer::Channel;
use platform::{ConfigError, SensorError};

use support::{peripherals, Rig, TestHal};

fn booted() -> (Board<TestHal>, Rig) {
    let (p, rig) = peripherals();
    (setup(p).unwrap(), rig)
}

// -- Speaker ---------------------------------------------------------------

#[test]
fn speaker_plays_440_hz_then_mutes_without_stopping_counter() {
    let (mut board, _rig) = booted();

    board.speaker_on(440.0);
    assert!(board.speaker().is_sounding());
    let f = board.speaker().frequency_hz();
    assert!((f - 440.0).abs() < 1.0, "got {f} Hz");
    let timer = &board.speaker().generator().timer().inner;
    assert!(timer.output_enabled[0]);
    assert_eq!(timer.compare[0], config::SPEAKER_PERIOD / 2);

    board.speaker_off();
    assert!(!board.speaker().is_sounding());
    let timer = &board.speaker().generator().timer().inner;
    assert!(!timer.output_enabled[0]);
    assert!(timer.counter_enabled);
}

#[test]
fn speaker_retunes_between_tones() {
    let (mut board, _rig) = booted();

    board.speaker_on(440.0);
    let low = board.speaker().generator().prescaler();
    board.speaker_on(880.0);
    let high = board.speaker().generator().prescaler();

    assert!(high < low);
    assert!((board.speaker().frequency_hz() - 880.0).abs() < 2.0);
}

#[test]
fn unreachable_tone_is_rejected_strictly_and_clamped_leniently() {
    let (mut board, _rig) = booted();
    let (_, max) = board.speaker().frequency_range_hz();

    assert_eq!(
        board.try_speaker_on(max * 4.0),
        Err(ConfigError::FrequencyOutOfRange)
    );

    board.speaker_on(max * 4.0);
    assert!(board.speaker().is_sounding());
    assert!(board.speaker().frequency_hz() <= max * 1.01);
}

#[test]
fn zero_tone_mutes() {
    let (mut board, _rig) = booted();
    board.speaker_on(440.0);
    board.speaker_on(0.0);
    assert!(!board.speaker().is_sounding());
}

// -- Motors ----------------------------------------------------------------

#[test]
fn motor_compare_is_clamped_to_period() {
    let (mut board, _rig) = booted();

    board.set_motor_compare(Channel::Ch2, 400);
    board.set_motor_compare(Channel::Ch3, u16::MAX);

    let timer = &board.motors().generator().timer().inner;
    assert_eq!(timer.compare[1], 400);
    assert_eq!(timer.compare[2], config::MOTOR_PERIOD);
}

#[test]
fn strict_motor_compare_rejects_out_of_range() {
    let (mut board, _rig) = booted();

    let err = board
        .try_set_motor_compare(Channel::Ch1, config::MOTOR_PERIOD + 1)
        .unwrap_err();
    assert!(matches!(err, ConfigError::CompareOutOfRange { .. }), "{err:?}");
    assert_eq!(board.motors().generator().compare(Channel::Ch1), 0);
}

#[test]
fn drive_routes_sign_to_forward_or_reverse_channel() {
    let (mut board, _rig) = booted();

    board.drive_motor(MotorSide::Left, 0.5);
    board.drive_motor(MotorSide::Right, -0.25);
    let pwm = board.motors().generator();
    assert_eq!(pwm.compare(Channel::Ch1), 500);
    assert_eq!(pwm.compare(Channel::Ch2), 0);
    assert_eq!(pwm.compare(Channel::Ch3), 0);
    assert_eq!(pwm.compare(Channel::Ch4), 250);

    board.drive_motor(MotorSide::Left, -1.0);
    let pwm = board.motors().generator();
    assert_eq!(pwm.compare(Channel::Ch1), 0);
    assert_eq!(pwm.compare(Channel::Ch2), config::MOTOR_PERIOD);

    board.stop_motors();
    assert_eq!(board.motors().generator().timer().inner.compare, [0; 4]);
}

// -- Sensors ---------------------------------------------------------------

#[test]
fn encoders_report_raw_counts() {
    let (board, _rig) = booted();
    assert_eq!(board.read_encoder_left(), support::LEFT_COUNT);
    assert_eq!(board.read_encoder_right(), support::RIGHT_COUNT);
}

#[test]
fn battery_and_motor_voltage_read_the_same_divider() {
    let (mut board, _rig) = booted();

    let expected = f32::from(support::BATTERY_SAMPLE) * ADC_LSB * config::VOLT_DIV_FACTOR;
    let battery = board.battery_voltage().unwrap();
    let motors = board.motors_voltage().unwrap();

    assert!((battery - expected).abs() < 1e-4, "{battery} V");
    assert_eq!(battery, motors);
}

#[test]
fn imu_registers_round_trip_over_spi() {
    let (mut board, rig) = booted();

    board.sensor_write_register(0x6B, 0x01).unwrap();
    assert_eq!(rig.imu_registers.borrow().get(&0x6B), Some(&0x01));
    assert_eq!(board.sensor_read_register(0x6B), Ok(0x01));
    assert_eq!(
        board.sensor_read_register(config::IMU_WHO_AM_I),
        Ok(config::IMU_EXPECTED_ID)
    );
}

#[test]
fn imu_bus_fault_surfaces_as_sensor_error() {
    let (mut board, rig) = booted();
    rig.imu_fail.set(true);

    assert_eq!(board.sensor_read_register(0x3B), Err(SensorError::Bus));
    assert_eq!(board.sensor_write_register(0x6B, 0), Err(SensorError::Bus));
}

#[test]
fn button_follows_pin_level() {
    let (mut board, rig) = booted();

    assert_eq!(board.read_user_button(), Ok(false));
    rig.button.set(true);
    assert_eq!(board.read_user_button(), Ok(true));
}

// -- LEDs, tick, cycles ----------------------------------------------------

#[test]
fn leds_drive_their_pins() {
    let (mut board, _rig) = booted();

    board.led_set(Led::L3, true);
    board.led_set(Led::L1, false);

    let gpio = &board.pins().port().inner;
    assert_eq!(gpio.level(config::LED_PINS[2]), Some(true));
    assert_eq!(gpio.level(config::LED_PINS[0]), Some(false));
    // Bound low at boot, never touched since.
    assert_eq!(gpio.level(config::LED_PINS[1]), Some(false));
}

#[test]
fn tick_interrupt_toggles() {
    let (mut board, _rig) = booted();

    board.enable_tick();
    assert!(board.tick_schedule().enabled);
    board.disable_tick();
    assert!(!board.tick_schedule().enabled);
}

#[test]
fn cycle_counter_advances() {
    let (board, _rig) = booted();

    let a = board.read_cycle_counter();
    let b = board.read_cycle_counter();
    assert_eq!(a, support::CYCLE_START);
    assert_eq!(b.wrapping_sub(a), support::CYCLE_STEP);
}

// -- BoardCell -------------------------------------------------------------

#[test]
fn cell_is_empty_until_installed() {
    let cell: BoardCell<TestHal> = BoardCell::new();

    assert!(!cell.is_ready());
    assert_eq!(cell.with(|b| b.read_encoder_left()), None);
}

#[test]
fn cell_runs_operations_on_the_installed_board() {
    let cell: BoardCell<TestHal> = BoardCell::new();
    let (board, _rig) = booted();
    assert!(cell.install(board).is_ok());

    assert!(cell.is_ready());
    assert_eq!(cell.with(|b| b.read_encoder_left()), Some(support::LEFT_COUNT));
    cell.with(|b| b.speaker_on(440.0));
    assert_eq!(cell.with(|b| b.speaker().is_sounding()), Some(true));
}

#[test]
fn cell_refuses_a_second_board() {
    let cell: BoardCell<TestHal> = BoardCell::new();
    let (first, _rig1) = booted();
    let (second, _rig2) = booted();

    assert!(cell.install(first).is_ok());
    let rejected = cell.install(second);
    assert!(rejected.is_err());
}

#[test]
fn cell_before_boot_reads_defaults_and_ignores_actuators() {
    let cell: BoardCell<TestHal> = BoardCell::new();

    assert!(!cell.read_user_button());
    assert_eq!(cell.read_encoder_left(), 0);
    assert_eq!(cell.read_encoder_right(), 0);
    assert_eq!(cell.get_battery_voltage(), Err(SensorError::NotReady));
    assert_eq!(cell.get_motors_voltage(), Err(SensorError::NotReady));
    assert_eq!(cell.sensor_read_register(0x75), Err(SensorError::NotReady));
    assert_eq!(cell.sensor_write_register(0x6B, 0), Err(SensorError::NotReady));

    cell.speaker_on(440.0);
    cell.speaker_off();
    cell.set_motor_compare(Channel::Ch1, 500);
    cell.drive_motor(MotorSide::Left, 0.5);
    cell.led_set(Led::L1, true);
    cell.enable_tick();
    cell.disable_tick();
    assert!(!cell.is_ready());
}

#[test]
fn cell_boot_installs_and_routes_the_speaker() {
    let cell: BoardCell<TestHal> = BoardCell::new();
    let (p, _rig) = peripherals();
    cell.boot(p).unwrap();
    assert!(cell.is_ready());

    cell.speaker_on(440.0);
    let f = cell.with(|b| b.speaker().frequency_hz()).unwrap();
    assert!((f - 440.0).abs() < 1.0, "got {f} Hz");
    assert_eq!(cell.with(|b| b.speaker().is_sounding()), Some(true));

    cell.speaker_off();
    assert_eq!(cell.with(|b| b.speaker().is_sounding()), Some(false));
    let counting = cell.with(|b| b.speaker().generator().timer().inner.counter_enabled);
    assert_eq!(counting, Some(true));
}

#[test]
fn cell_routes_sensors_motors_and_leds() {
    let cell: BoardCell<TestHal> = BoardCell::new();
    let (p, rig) = peripherals();
    cell.boot(p).unwrap();

    assert_eq!(cell.read_encoder_left(), support::LEFT_COUNT);
    assert_eq!(cell.read_encoder_right(), support::RIGHT_COUNT);
    assert_eq!(cell.get_battery_voltage(), cell.get_motors_voltage());
    rig.button.set(true);
    assert!(cell.read_user_button());

    cell.sensor_write_register(0x6B, 0x01).unwrap();
    assert_eq!(cell.sensor_read_register(0x6B), Ok(0x01));

    cell.drive_motor(MotorSide::Right, -0.25);
    assert_eq!(cell.with(|b| b.motors().generator().compare(Channel::Ch4)), Some(250));
    cell.set_motor_compare(Channel::Ch1, 5000);
    assert_eq!(
        cell.with(|b| b.motors().generator().compare(Channel::Ch1)),
        Some(config::MOTOR_PERIOD)
    );

    cell.led_set(Led::L4, true);
    let lit = cell.with(|b| b.pins().port().inner.level(config::LED_PINS[3]));
    assert_eq!(lit, Some(Some(true)));

    cell.enable_tick();
    assert_eq!(cell.with(|b| b.tick_schedule().enabled), Some(true));
    cell.disable_tick();
    assert_eq!(cell.with(|b| b.tick_schedule().enabled), Some(false));
}

#[test]
fn cell_boot_keeps_the_first_board() {
    let cell: BoardCell<TestHal> = BoardCell::new();
    let (first, first_rig) = peripherals();
    let (second, _second_rig) = peripherals();
    cell.boot(first).unwrap();
    cell.boot(second).unwrap();

    first_rig.button.set(true);
    assert!(cell.read_user_button());
}
