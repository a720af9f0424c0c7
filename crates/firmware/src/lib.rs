//! Robot board firmware for the STM32F405RG.
//!
//! Brings the board up in a fixed order and exposes it to the control loop
//! through a small free-function API.
//!
//! # Architecture
//!
//! ```text
//! Control loop (main.rs, tick handler)
//!         ↓
//! Free-function API (api module, hardware only)
//!         ↓
//! Board + boot sequence (board, boot)
//!         ↓
//! Platform drivers (clock tree, pins, PWM, sensors, tick)
//!         ↓
//! Register backend (hw module, hardware only)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32F405RG (cortex-m-rt, defmt, PAC)
//! - `std` - Host builds with the platform mocks
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)]
#![warn(clippy::dbg_macro)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod board;
pub mod boot;
pub mod config;

#[cfg(feature = "hardware")]
pub mod api;
#[cfg(feature = "hardware")]
pub mod exception_handlers;
#[cfg(feature = "hardware")]
pub mod hw;

pub use board::{Board, BoardCell, Led};
pub use boot::{setup, BoardHal, BoardPeripherals, BootError, BootStep, BOOT_SEQUENCE_STEPS};
