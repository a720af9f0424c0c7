//! Board-support abstractions for the STM32F405 robot controller
//!
//! This crate holds everything about the board that can be reasoned about
//! without touching silicon: clock-tree planning, the pin map, timer and PWM
//! arithmetic, sensor framing. Each hardware block is reached through a small
//! capability trait, implemented with raw register access in the firmware
//! crate and by recording mocks in tests.
//!
//! # Architecture Layers
//!
//! ```text
//! Control loop / board API (firmware crate)
//!         ↓
//! Board drivers (this crate: PinMapper, PwmGenerator, Speaker, sensors)
//!         ↓
//! Capability traits (ClockController, GpioPort, PwmTimer, ...)
//!         ↓
//! Register access (firmware `hw` module, embassy-stm32 PAC addresses)
//! ```
//!
//! # Features
//!
//! - `std`: Expose [`mocks`] to other crates' tests
//! - `defmt`: Enable defmt derives and driver logging
//! - `serde`: Serialize derived plans and pin bindings
//!
//! # Example
//!
//! ```
//! use platform::clock_tree::{plan, Oscillator};
//!
//! let plan = plan(Oscillator::Hse { frequency_hz: 8_000_000 }, 168_000_000).unwrap();
//! assert_eq!(plan.derived_apb1_hz, 42_000_000);
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this register-level crate:
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // register accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)] // timer counts and ADC samples fit f32 mantissa

pub mod adc;
pub mod button;
pub mod clock_tree;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gpio;
pub mod mocks;
pub mod pwm;
pub mod sensor_bus;
pub mod tick;
pub mod timer;

// Re-export the capability traits
pub use adc::AdcChannel;
pub use clock_tree::ClockController;
pub use gpio::GpioPort;
pub use tick::{CycleCounter, TickTimer};
pub use timer::{EncoderTimer, PwmTimer};

// Re-export the drivers
pub use adc::VoltageSensor;
pub use button::UserButton;
pub use encoder::QuadratureEncoder;
pub use gpio::PinMapper;
pub use pwm::{MotorPwm, MotorSide, PwmGenerator, Speaker};
pub use sensor_bus::RegisterBus;
pub use tick::{PeriodicTick, TickDispatcher};

// Re-export plan and error types
pub use clock_tree::{ClockPlan, Oscillator};
pub use error::{ConfigError, SensorError};
pub use gpio::{PinBinding, PinId, PinMode, Port};
pub use timer::{Channel, TimerId};
