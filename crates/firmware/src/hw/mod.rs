//! Register-level implementations of the platform traits for the STM32F405RG.
//!
//! Only compiled with `--features hardware`. Registers are driven through the
//! typed embassy-stm32 PAC; the register sequences follow RM0090.

mod adc;
mod cortex;
mod gpio;
mod rcc;
mod spi;
mod timer;

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_stm32::pac;
use embassy_stm32::pac::gpio::Gpio;
use embassy_stm32::pac::timer::TimGp16;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
use platform::timer::TimerId;

use crate::boot::{BoardHal, BoardPeripherals};
use crate::config;

pub use self::adc::HardwareAdc;
pub use self::cortex::{HardwareCycleCounter, HardwareSysTick};
pub use self::gpio::{HardwareGpio, HardwareInput, HardwareOutput};
pub use self::rcc::HardwareRcc;
pub use self::spi::{HardwareSpi, SpiError};
pub use self::timer::{HardwareEncoder, HardwareTimer};

/// Battery divider on ADC2 channel 10 (PC0).
const BATTERY_ADC_CHANNEL: u8 = 10;

/// The STM32F405RG board.
pub struct HardwareHal;

impl BoardHal for HardwareHal {
    type Rcc = HardwareRcc;
    type Gpio = HardwareGpio;
    type MotorTimer = HardwareTimer;
    type SpeakerTimer = HardwareTimer;
    type Encoder = HardwareEncoder;
    type Adc = HardwareAdc;
    type ImuSpi = ExclusiveDevice<HardwareSpi, HardwareOutput, NoDelay>;
    type Button = HardwareInput;
    type Tick = HardwareSysTick;
    type Cycles = HardwareCycleCounter;
}

static TAKEN: AtomicBool = AtomicBool::new(false);

fn gpio_bank(port: platform::gpio::Port) -> Gpio {
    match port {
        platform::gpio::Port::A => pac::GPIOA,
        platform::gpio::Port::B => pac::GPIOB,
        platform::gpio::Port::C => pac::GPIOC,
    }
}

/// General-purpose view of an advanced or single-channel timer.
fn general_purpose_view(ptr: *mut ()) -> TimGp16 {
    // SAFETY: TIM8 and TIM11 share the general-purpose layout for CR1..CCR1
    // (RM0090 §17.4, §19.5); registers a timer lacks are never touched.
    unsafe { TimGp16::from_ptr(ptr) }
}

impl HardwareHal {
    /// Hand out every board peripheral, once. `None` on later calls.
    pub fn take() -> Option<BoardPeripherals<Self>> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        let cp = cortex_m::Peripherals::take()?;

        let cs = HardwareOutput {
            bank: gpio_bank(config::IMU_CS_PIN.port()),
            index: config::IMU_CS_PIN.index(),
        };
        let bus = HardwareSpi { regs: pac::SPI3 };
        let imu_spi = match ExclusiveDevice::new_no_delay(bus, cs) {
            Ok(device) => device,
            Err(never) => match never {},
        };

        Some(BoardPeripherals {
            rcc: HardwareRcc {
                rcc: pac::RCC,
                pwr: pac::PWR,
                flash: pac::FLASH,
            },
            gpio: HardwareGpio {
                a: pac::GPIOA,
                b: pac::GPIOB,
                c: pac::GPIOC,
            },
            motor_timer: HardwareTimer {
                regs: general_purpose_view(pac::TIM8.as_ptr()),
                advanced: Some(pac::TIM8),
                id: TimerId::Tim8,
            },
            speaker_timer: HardwareTimer {
                regs: general_purpose_view(pac::TIM11.as_ptr()),
                advanced: None,
                id: TimerId::Tim11,
            },
            encoder_left: HardwareEncoder { regs: pac::TIM3 },
            encoder_right: HardwareEncoder { regs: pac::TIM4 },
            adc: HardwareAdc {
                regs: pac::ADC2,
                common: pac::ADC123_COMMON,
                channel: BATTERY_ADC_CHANNEL,
            },
            imu_spi,
            button: HardwareInput {
                bank: gpio_bank(config::BUTTON_PIN.port()),
                index: config::BUTTON_PIN.index(),
            },
            tick: HardwareSysTick { syst: cp.SYST },
            cycles: HardwareCycleCounter,
        })
    }
}
