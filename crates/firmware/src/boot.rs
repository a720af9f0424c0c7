//! Board bring-up sequence.
//!
//! Initialization order (MUST be respected):
//!   1. Clocks: oscillator, PLL, bus prescalers, flash latency, peripheral gates
//!   2. Pins: every static binding from [`crate::config::STATIC_PIN_BINDINGS`]
//!   3. Speaker PWM, silent
//!   4. Motor PWM, all channels at 0 % duty
//!   5. Sensors: encoder timers, battery ADC, IMU probe
//!   6. Tick: SysTick counting, interrupt still masked
//!
//! Every peripheral below the clock step reads its bus frequency from the
//! [`ClockPlan`](platform::ClockPlan) produced by step 1, so no step may be
//! reordered ahead of it.
//! The tick interrupt is left disabled; the caller enables it once the
//! control loop has registered its handler.

use core::fmt;

use embedded_hal::digital::InputPin;
use embedded_hal::spi::SpiDevice;
use thiserror_no_std::Error;

use platform::adc::{AdcChannel, VoltageSensor};
use platform::button::UserButton;
use platform::clock_tree::{self, ClockController};
use platform::encoder::QuadratureEncoder;
use platform::gpio::{GpioPort, PinMapper};
use platform::pwm::{MotorPwm, Speaker, SpeakerConfig};
use platform::sensor_bus::RegisterBus;
use platform::tick::{CycleCounter, PeriodicTick, TickTimer};
use platform::timer::{EncoderTimer, PwmTimer};
use platform::ConfigError;

use crate::board::Board;
use crate::config;

/// One stage of [`setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootStep {
    /// Clock tree and peripheral clock gates.
    Clocks,
    /// Static pin bindings.
    Pins,
    /// Speaker PWM.
    Speaker,
    /// Motor PWM.
    Motors,
    /// Encoders, ADC, IMU.
    Sensors,
    /// SysTick.
    Tick,
}

impl BootStep {
    /// Short name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            BootStep::Clocks => "clocks",
            BootStep::Pins => "pins",
            BootStep::Speaker => "speaker",
            BootStep::Motors => "motors",
            BootStep::Sensors => "sensors",
            BootStep::Tick => "tick",
        }
    }
}

impl fmt::Display for BootStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered list of boot steps. Tests assert this order against the recorded
/// register traffic.
pub const BOOT_SEQUENCE_STEPS: &[BootStep] = &[
    BootStep::Clocks,
    BootStep::Pins,
    BootStep::Speaker,
    BootStep::Motors,
    BootStep::Sensors,
    BootStep::Tick,
];

/// A boot step failed; the board is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("boot step `{step}` failed: {cause}")]
pub struct BootError {
    /// Step that failed.
    pub step: BootStep,
    /// What went wrong.
    pub cause: ConfigError,
}

trait AtStep<T> {
    fn at(self, step: BootStep) -> Result<T, BootError>;
}

impl<T> AtStep<T> for Result<T, ConfigError> {
    fn at(self, step: BootStep) -> Result<T, BootError> {
        self.map_err(|cause| {
            #[cfg(feature = "defmt")]
            defmt::error!("boot: {} failed: {}", step, cause);
            BootError { step, cause }
        })
    }
}

/// Register-level handles the board is built from.
///
/// Implemented by `hw::HardwareHal` on the target and by recording mocks in
/// tests.
pub trait BoardHal {
    /// RCC / PWR / FLASH / DWT enable.
    type Rcc: ClockController;
    /// GPIOA..GPIOC.
    type Gpio: GpioPort;
    /// Four-channel motor timer.
    type MotorTimer: PwmTimer;
    /// Single-channel speaker timer.
    type SpeakerTimer: PwmTimer;
    /// Quadrature encoder timer (one per wheel).
    type Encoder: EncoderTimer;
    /// Battery sense ADC channel.
    type Adc: AdcChannel;
    /// SPI device with the IMU's chip select.
    type ImuSpi: SpiDevice;
    /// User button input.
    type Button: InputPin;
    /// SysTick.
    type Tick: TickTimer;
    /// DWT cycle counter.
    type Cycles: CycleCounter;
}

/// Every peripheral singleton the board needs, moved into [`setup`].
#[allow(missing_docs)]
pub struct BoardPeripherals<H: BoardHal> {
    pub rcc: H::Rcc,
    pub gpio: H::Gpio,
    pub motor_timer: H::MotorTimer,
    pub speaker_timer: H::SpeakerTimer,
    pub encoder_left: H::Encoder,
    pub encoder_right: H::Encoder,
    pub adc: H::Adc,
    pub imu_spi: H::ImuSpi,
    pub button: H::Button,
    pub tick: H::Tick,
    pub cycles: H::Cycles,
}

fn announce(step: BootStep) {
    #[cfg(feature = "defmt")]
    defmt::info!("boot: {}", step);
    #[cfg(not(feature = "defmt"))]
    let _ = step;
}

/// Bring the board up in [`BOOT_SEQUENCE_STEPS`] order.
///
/// Must run once, before anything else touches the peripherals. On error the
/// peripherals have been consumed and the only way forward is a reset.
pub fn setup<H: BoardHal>(p: BoardPeripherals<H>) -> Result<Board<H>, BootError> {
    let BoardPeripherals {
        mut rcc,
        gpio,
        motor_timer,
        speaker_timer,
        encoder_left,
        encoder_right,
        adc,
        imu_spi,
        button,
        tick,
        cycles,
    } = p;

    announce(BootStep::Clocks);
    let plan = clock_tree::configure(
        &mut rcc,
        config::OSCILLATOR,
        config::TARGET_SYSCLK_HZ,
        config::PERIPHERAL_CLOCKS,
    )
    .at(BootStep::Clocks)?;

    announce(BootStep::Pins);
    let mut pins = PinMapper::new(gpio);
    pins.bind_all(config::STATIC_PIN_BINDINGS).at(BootStep::Pins)?;
    // Outputs bind low; chip select idles high.
    pins.write(config::IMU_CS_PIN, true).at(BootStep::Pins)?;

    announce(BootStep::Speaker);
    let speaker = Speaker::init(
        speaker_timer,
        &plan,
        &SpeakerConfig {
            timer: config::SPEAKER_TIMER,
            channel: config::SPEAKER_CHANNEL,
            base_tick_hz: config::SPEAKER_BASE_TICK_HZ,
            period: config::SPEAKER_PERIOD,
        },
    )
    .at(BootStep::Speaker)?;

    announce(BootStep::Motors);
    let motors = MotorPwm::init(
        motor_timer,
        &plan,
        config::MOTOR_TIMER,
        config::MOTOR_COUNTER_TICK_HZ,
        config::MOTOR_PERIOD,
    )
    .at(BootStep::Motors)?;

    announce(BootStep::Sensors);
    let encoder_left = QuadratureEncoder::init(encoder_left);
    let encoder_right = QuadratureEncoder::init(encoder_right);
    let battery = VoltageSensor::init(adc, config::VOLT_DIV_FACTOR);
    let mut imu = RegisterBus::new(imu_spi);
    // A missing IMU is a runtime sensor fault, not a boot failure.
    let imu_present = match imu.probe(config::IMU_WHO_AM_I, config::IMU_EXPECTED_ID) {
        Ok(()) => true,
        Err(_e) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("boot: IMU probe failed: {}", _e);
            false
        }
    };
    let button = UserButton::new(button);

    announce(BootStep::Tick);
    let tick = PeriodicTick::start(tick, plan.derived_ahb_hz, config::TICK_HZ).at(BootStep::Tick)?;

    #[cfg(feature = "defmt")]
    defmt::info!("boot: complete, SYSCLK={=u32} Hz", plan.target_sysclk_hz);

    Ok(Board {
        plan,
        pins,
        speaker,
        motors,
        encoder_left,
        encoder_right,
        battery,
        imu,
        imu_present,
        button,
        tick,
        cycles,
    })
}
