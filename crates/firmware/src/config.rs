//! Board assignments for the STM32F405RG robot controller.
//!
//! Everything here is compile-time data: which pin carries which signal, which
//! timer drives which load, and the rates the board runs at. Frequencies that
//! depend on the clock tree are *not* listed; they are derived from the
//! [`ClockPlan`](platform::ClockPlan) at boot.

use platform::clock_tree::{Oscillator, PeripheralClock};
use platform::gpio::{PinBinding, PinId, Port};
use platform::timer::{Channel, TimerId};

/// Firmware version string.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Clocks ───────────────────────────────────────────────────────────────────

/// Oscillator the PLL runs from. The board has no crystal fitted.
pub const OSCILLATOR: Oscillator = Oscillator::Hsi;

/// SYSCLK target.
pub const TARGET_SYSCLK_HZ: u32 = 168_000_000;

/// Clock gates opened during the clock step, before any pin is bound.
pub const PERIPHERAL_CLOCKS: &[PeripheralClock] = &[
    PeripheralClock::GpioA,
    PeripheralClock::GpioB,
    PeripheralClock::GpioC,
    PeripheralClock::Tim3,
    PeripheralClock::Tim4,
    PeripheralClock::Spi3,
    PeripheralClock::Tim8,
    PeripheralClock::Adc2,
    PeripheralClock::Tim11,
];

// ── Pins ─────────────────────────────────────────────────────────────────────

/// Status LEDs, active high.
pub const LED_PINS: [PinId; 4] = [
    PinId::new(Port::A, 0),
    PinId::new(Port::A, 1),
    PinId::new(Port::A, 2),
    PinId::new(Port::A, 3),
];

/// IMU chip select, driven in software.
pub const IMU_CS_PIN: PinId = PinId::new(Port::A, 15);

/// Speaker output (TIM11_CH1).
pub const SPEAKER_PIN: PinId = PinId::new(Port::B, 9);

/// Motor driver inputs (TIM8_CH1..CH4): left fwd, left rev, right fwd, right rev.
pub const MOTOR_PINS: [PinId; 4] = [
    PinId::new(Port::C, 6),
    PinId::new(Port::C, 7),
    PinId::new(Port::C, 8),
    PinId::new(Port::C, 9),
];

/// Left encoder A/B (TIM3_CH1/CH2).
pub const ENCODER_LEFT_PINS: [PinId; 2] = [PinId::new(Port::B, 4), PinId::new(Port::B, 5)];

/// Right encoder A/B (TIM4_CH1/CH2).
pub const ENCODER_RIGHT_PINS: [PinId; 2] = [PinId::new(Port::B, 6), PinId::new(Port::B, 7)];

/// SPI3 SCK, MISO, MOSI.
pub const IMU_SPI_PINS: [PinId; 3] = [
    PinId::new(Port::C, 10),
    PinId::new(Port::C, 11),
    PinId::new(Port::C, 12),
];

/// User button.
pub const BUTTON_PIN: PinId = PinId::new(Port::C, 13);

/// Battery divider tap (ADC123_IN10).
pub const BATTERY_SENSE_PIN: PinId = PinId::new(Port::C, 0);

const AF_TIM3_TIM4: u8 = 2;
const AF_TIM8_TIM11: u8 = 3;
const AF_SPI3: u8 = 6;

/// Every static pin binding, applied in order by the pin step.
pub const STATIC_PIN_BINDINGS: &[PinBinding] = &[
    PinBinding::output(LED_PINS[0]),
    PinBinding::output(LED_PINS[1]),
    PinBinding::output(LED_PINS[2]),
    PinBinding::output(LED_PINS[3]),
    PinBinding::output(IMU_CS_PIN),
    PinBinding::alternate(SPEAKER_PIN, AF_TIM8_TIM11),
    PinBinding::alternate(MOTOR_PINS[0], AF_TIM8_TIM11),
    PinBinding::alternate(MOTOR_PINS[1], AF_TIM8_TIM11),
    PinBinding::alternate(MOTOR_PINS[2], AF_TIM8_TIM11),
    PinBinding::alternate(MOTOR_PINS[3], AF_TIM8_TIM11),
    PinBinding::alternate(ENCODER_LEFT_PINS[0], AF_TIM3_TIM4),
    PinBinding::alternate(ENCODER_LEFT_PINS[1], AF_TIM3_TIM4),
    PinBinding::alternate(ENCODER_RIGHT_PINS[0], AF_TIM3_TIM4),
    PinBinding::alternate(ENCODER_RIGHT_PINS[1], AF_TIM3_TIM4),
    PinBinding::alternate(IMU_SPI_PINS[0], AF_SPI3),
    PinBinding::alternate(IMU_SPI_PINS[1], AF_SPI3),
    PinBinding::alternate(IMU_SPI_PINS[2], AF_SPI3),
    PinBinding::input(BUTTON_PIN),
    PinBinding::analog(BATTERY_SENSE_PIN),
];

// ── PWM ──────────────────────────────────────────────────────────────────────

/// Motor driver timer (APB2).
pub const MOTOR_TIMER: TimerId = TimerId::Tim8;

/// Requested motor counter tick. APB2 at 84 MHz gives PSC = 2, i.e. 28 MHz.
pub const MOTOR_COUNTER_TICK_HZ: u32 = 24_000_000;

/// Motor PWM period in counts (28 kHz at the 28 MHz tick).
pub const MOTOR_PERIOD: u16 = 1000;

/// Speaker timer (APB2).
pub const SPEAKER_TIMER: TimerId = TimerId::Tim11;

/// Speaker output channel.
pub const SPEAKER_CHANNEL: Channel = Channel::Ch1;

/// Speaker counter tick before the first tone.
pub const SPEAKER_BASE_TICK_HZ: u32 = 1_000_000;

/// Speaker period in counts; the tone tick is `f × SPEAKER_PERIOD`.
pub const SPEAKER_PERIOD: u16 = 100;

// ── Sensors ──────────────────────────────────────────────────────────────────

/// Battery divider ratio (battery volts per ADC-pin volt).
pub const VOLT_DIV_FACTOR: f32 = 3.0;

/// IMU identity register.
pub const IMU_WHO_AM_I: u8 = 0x75;

/// Identity the ICM-20602 answers with.
pub const IMU_EXPECTED_ID: u8 = 0x70;

// ── Tick ─────────────────────────────────────────────────────────────────────

/// Control-loop tick rate.
pub const TICK_HZ: u32 = 1000;
