//! Quadrature wheel encoders.
//!
//! The timer counts both edges of both encoder phases in hardware and wraps
//! at 2^16. A single reading is meaningless on its own; callers compare two
//! readings with [`count_delta`].

use crate::timer::EncoderTimer;

/// One wheel's encoder timer.
pub struct QuadratureEncoder<T> {
    timer: T,
}

impl<T: EncoderTimer> QuadratureEncoder<T> {
    /// Put `timer` in encoder mode and start counting.
    pub fn init(mut timer: T) -> Self {
        timer.configure_quadrature();
        Self { timer }
    }

    /// Raw CNT value.
    pub fn read(&self) -> u16 {
        self.timer.count()
    }
}

/// Signed ticks between two readings, correct across one counter wrap.
///
/// Valid while fewer than 32768 ticks elapse between the readings.
#[allow(clippy::cast_possible_wrap)]
pub fn count_delta(previous: u16, current: u16) -> i16 {
    current.wrapping_sub(previous) as i16
}
