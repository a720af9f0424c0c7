//! Edge-aligned PWM generation on STM32 timers.
//!
//! One algorithm ([`PwmGenerator`]) serves two instances:
//!
//! - [`MotorPwm`]: four channels at a fixed frequency, duty written by the
//!   control loop.
//! - [`Speaker`]: one channel whose counter tick is recomputed for every tone.
//!
//! `period` is the number of counter ticks per PWM cycle. The auto-reload
//! register holds `period - 1`, so with PWM mode 1 a compare of `0` is a
//! 0 % duty cycle and a compare of `period` is 100 %.

use crate::clock_tree::ClockPlan;
use crate::error::ConfigError;
use crate::timer::{
    duty_ratio, effective_tick_hz, output_frequency_hz, prescaler_for, Channel, PwmTimer,
    TimerId,
};

/// Static description of one PWM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmConfig {
    /// Timer peripheral.
    pub timer: TimerId,
    /// Desired counter tick; the prescaler is derived from the bus clock.
    pub counter_tick_hz: u32,
    /// Counter ticks per PWM cycle.
    pub period: u16,
    /// Channels driven by this instance.
    pub channels: &'static [Channel],
    /// Whether channel outputs are enabled at the end of init.
    pub outputs_enabled: bool,
}

/// Snapshot of a generator's register state.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PwmState {
    /// Timer peripheral.
    pub timer: TimerId,
    /// Clock of the bus feeding the timer.
    pub bus_clock_hz: u32,
    /// PSC value.
    pub prescaler: u16,
    /// Counter ticks per cycle (ARR + 1).
    pub period: u16,
    /// Tick the hardware actually produces.
    pub counter_tick_hz: u32,
    /// Resulting PWM frequency.
    pub output_frequency_hz: f32,
    /// CCR1..CCR4.
    pub compare: [u16; 4],
    /// CCER.CCxE.
    pub output_enabled: [bool; 4],
}

/// A timer driven as an up-counting, edge-aligned PWM source.
pub struct PwmGenerator<T> {
    timer: T,
    id: TimerId,
    bus_clock_hz: u32,
    prescaler: u16,
    period: u16,
    channels: &'static [Channel],
    compare: [u16; 4],
    output_enabled: [bool; 4],
}

impl<T: PwmTimer> PwmGenerator<T> {
    /// Program `timer` per `config`, with the prescaler derived from `plan`.
    ///
    /// Sequence: counting mode, PSC, ARR, RCR = 0, ARR preload, continuous
    /// mode, then per channel PWM mode 1 with compare 0, channel outputs
    /// (when enabled), main output enable on TIM8, update event, counter start.
    pub fn init(mut timer: T, plan: &ClockPlan, config: &PwmConfig) -> Result<Self, ConfigError> {
        if config.period == 0 {
            return Err(ConfigError::ZeroPeriod(config.timer));
        }
        if config.channels.len() > config.timer.channel_count() {
            return Err(ConfigError::ChannelNotConfigured);
        }
        if let Some(&channel) = config
            .channels
            .iter()
            .find(|c| c.index() >= config.timer.channel_count())
        {
            return Err(ConfigError::ChannelNotOnTimer {
                timer: config.timer,
                channel,
            });
        }
        let bus_clock_hz = plan.bus_clock_hz(config.timer.bus());
        let prescaler = prescaler_for(bus_clock_hz, config.counter_tick_hz)?;

        timer.set_edge_aligned_up();
        timer.set_prescaler(prescaler);
        timer.set_auto_reload(config.period.saturating_sub(1));
        timer.set_repetition_counter(0);
        timer.enable_auto_reload_preload();
        timer.set_continuous();

        let mut output_enabled = [false; 4];
        for &channel in config.channels {
            timer.set_pwm_mode1(channel);
            timer.set_compare(channel, 0);
            if config.outputs_enabled {
                timer.enable_output(channel);
                if let Some(flag) = output_enabled.get_mut(channel.index()) {
                    *flag = true;
                }
            } else {
                timer.disable_output(channel);
            }
        }

        if config.timer.has_main_output_enable() {
            timer.enable_main_output();
        }
        timer.generate_update();
        timer.enable_counter();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "pwm {}: psc={=u16} period={=u16} tick={=u32}",
            config.timer,
            prescaler,
            config.period,
            effective_tick_hz(bus_clock_hz, prescaler)
        );

        Ok(Self {
            timer,
            id: config.timer,
            bus_clock_hz,
            prescaler,
            period: config.period,
            channels: config.channels,
            compare: [0; 4],
            output_enabled,
        })
    }

    fn owns(&self, channel: Channel) -> Result<(), ConfigError> {
        if self.channels.contains(&channel) {
            Ok(())
        } else {
            Err(ConfigError::ChannelNotConfigured)
        }
    }

    /// Write CCRx. Fails if `value > period` or the channel is not driven here.
    pub fn set_compare(&mut self, channel: Channel, value: u16) -> Result<(), ConfigError> {
        self.owns(channel)?;
        if value > self.period {
            return Err(ConfigError::CompareOutOfRange {
                compare: value,
                period: self.period,
            });
        }
        self.timer.set_compare(channel, value);
        if let Some(slot) = self.compare.get_mut(channel.index()) {
            *slot = value;
        }
        Ok(())
    }

    /// Reprogram tick and period while the counter runs.
    ///
    /// Compare registers are left untouched; callers rewrite them for the new
    /// period and then call [`restart`](Self::restart) to latch everything.
    pub fn retune(&mut self, counter_tick_hz: u32, period: u16) -> Result<(), ConfigError> {
        if period == 0 {
            return Err(ConfigError::ZeroPeriod(self.id));
        }
        let prescaler = prescaler_for(self.bus_clock_hz, counter_tick_hz)?;
        self.timer.set_prescaler(prescaler);
        self.timer.set_auto_reload(period.saturating_sub(1));
        self.prescaler = prescaler;
        self.period = period;
        Ok(())
    }

    /// Latch shadow registers and make sure the counter runs.
    pub fn restart(&mut self) {
        self.timer.generate_update();
        self.timer.enable_counter();
    }

    /// CCER.CCxE = 1.
    pub fn enable_output(&mut self, channel: Channel) -> Result<(), ConfigError> {
        self.owns(channel)?;
        self.timer.enable_output(channel);
        if let Some(flag) = self.output_enabled.get_mut(channel.index()) {
            *flag = true;
        }
        Ok(())
    }

    /// CCER.CCxE = 0. The counter keeps running.
    pub fn disable_output(&mut self, channel: Channel) -> Result<(), ConfigError> {
        self.owns(channel)?;
        self.timer.disable_output(channel);
        if let Some(flag) = self.output_enabled.get_mut(channel.index()) {
            *flag = false;
        }
        Ok(())
    }

    /// Timer peripheral.
    pub fn timer_id(&self) -> TimerId {
        self.id
    }

    /// PSC value.
    pub fn prescaler(&self) -> u16 {
        self.prescaler
    }

    /// Counter ticks per PWM cycle.
    pub fn period(&self) -> u16 {
        self.period
    }

    /// Achieved counter tick.
    pub fn counter_tick_hz(&self) -> u32 {
        effective_tick_hz(self.bus_clock_hz, self.prescaler)
    }

    /// Achieved PWM frequency.
    pub fn output_frequency_hz(&self) -> f32 {
        output_frequency_hz(self.counter_tick_hz(), self.period)
    }

    /// Last compare written to `channel`.
    pub fn compare(&self, channel: Channel) -> u16 {
        self.compare.get(channel.index()).copied().unwrap_or(0)
    }

    /// Duty ratio of `channel`.
    pub fn duty(&self, channel: Channel) -> f32 {
        duty_ratio(self.compare(channel), self.period)
    }

    /// Whether `channel`'s output is enabled.
    pub fn output_enabled(&self, channel: Channel) -> bool {
        self.output_enabled
            .get(channel.index())
            .copied()
            .unwrap_or(false)
    }

    /// Register snapshot.
    pub fn state(&self) -> PwmState {
        PwmState {
            timer: self.id,
            bus_clock_hz: self.bus_clock_hz,
            prescaler: self.prescaler,
            period: self.period,
            counter_tick_hz: self.counter_tick_hz(),
            output_frequency_hz: self.output_frequency_hz(),
            compare: self.compare,
            output_enabled: self.output_enabled,
        }
    }

    /// Borrow the timer handle.
    pub fn timer(&self) -> &T {
        &self.timer
    }
}

// ── Motor driver ─────────────────────────────────────────────────────────────

/// Wheel served by a forward/reverse channel pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorSide {
    /// CH1 forward, CH2 reverse.
    Left,
    /// CH3 forward, CH4 reverse.
    Right,
}

impl MotorSide {
    /// `(forward, reverse)` channels.
    pub const fn channels(self) -> (Channel, Channel) {
        match self {
            MotorSide::Left => (Channel::Ch1, Channel::Ch2),
            MotorSide::Right => (Channel::Ch3, Channel::Ch4),
        }
    }
}

/// Four-channel motor driver PWM. All outputs run from startup at 0 % duty.
pub struct MotorPwm<T> {
    pwm: PwmGenerator<T>,
}

impl<T: PwmTimer> MotorPwm<T> {
    /// Bring up the motor timer with all four channels enabled at zero duty.
    pub fn init(
        timer: T,
        plan: &ClockPlan,
        timer_id: TimerId,
        counter_tick_hz: u32,
        period: u16,
    ) -> Result<Self, ConfigError> {
        let config = PwmConfig {
            timer: timer_id,
            counter_tick_hz,
            period,
            channels: &Channel::ALL,
            outputs_enabled: true,
        };
        Ok(Self {
            pwm: PwmGenerator::init(timer, plan, &config)?,
        })
    }

    /// Strict compare write: `value > period` is an error.
    pub fn try_set_compare(&mut self, channel: Channel, value: u16) -> Result<(), ConfigError> {
        self.pwm.set_compare(channel, value)
    }

    /// Compare write that clamps to the period.
    pub fn set_compare(&mut self, channel: Channel, value: u16) {
        let period = self.pwm.period();
        if value > period {
            #[cfg(feature = "defmt")]
            defmt::warn!("motor compare {=u16} clamped to {=u16}", value, period);
        }
        // All four channels are owned, so only the range check could fail.
        let _ = self.pwm.set_compare(channel, value.min(period));
    }

    /// Drive one wheel with a signed duty in `[-1, 1]`.
    ///
    /// Positive duty goes to the forward channel, negative to reverse; the
    /// opposite channel is held at 0. Out-of-range input saturates, NaN stops.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn drive(&mut self, side: MotorSide, duty: f32) {
        let (forward, reverse) = side.channels();
        let duty = if duty.is_nan() { 0.0 } else { duty.clamp(-1.0, 1.0) };
        let magnitude = if duty < 0.0 { -duty } else { duty };
        let counts = magnitude * f32::from(self.pwm.period()) + 0.5;
        let compare = counts as u16;

        let (active, idle) = if duty < 0.0 {
            (reverse, forward)
        } else {
            (forward, reverse)
        };
        self.set_compare(idle, 0);
        self.set_compare(active, compare);
    }

    /// Zero every channel.
    pub fn stop(&mut self) {
        for channel in Channel::ALL {
            self.set_compare(channel, 0);
        }
    }

    /// Underlying generator.
    pub fn generator(&self) -> &PwmGenerator<T> {
        &self.pwm
    }
}

// ── Speaker ──────────────────────────────────────────────────────────────────

/// Speaker PWM settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakerConfig {
    /// Timer peripheral.
    pub timer: TimerId,
    /// Channel wired to the speaker.
    pub channel: Channel,
    /// Counter tick used at startup, before any tone is requested.
    pub base_tick_hz: u32,
    /// Counter ticks per tone cycle.
    pub period: u16,
}

/// Single-channel tone generator. Silent after init.
///
/// Reprogramming a tone touches PSC, ARR, CCR, EGR and CCER in sequence. The
/// caller must keep the tick handler from observing it half-written (the
/// firmware holds the board in a critical section for every call).
pub struct Speaker<T> {
    pwm: PwmGenerator<T>,
    channel: Channel,
}

impl<T: PwmTimer> Speaker<T> {
    /// Bring up the speaker timer with its output disabled.
    pub fn init(timer: T, plan: &ClockPlan, config: &SpeakerConfig) -> Result<Self, ConfigError> {
        let channels: &'static [Channel] = match config.channel {
            Channel::Ch1 => &[Channel::Ch1],
            Channel::Ch2 => &[Channel::Ch2],
            Channel::Ch3 => &[Channel::Ch3],
            Channel::Ch4 => &[Channel::Ch4],
        };
        let pwm_config = PwmConfig {
            timer: config.timer,
            counter_tick_hz: config.base_tick_hz,
            period: config.period,
            channels,
            outputs_enabled: false,
        };
        Ok(Self {
            pwm: PwmGenerator::init(timer, plan, &pwm_config)?,
            channel: config.channel,
        })
    }

    /// Tone range reachable with this bus clock and period: PSC = 0xFFFF
    /// at the low end, PSC = 0 at the high end.
    #[allow(clippy::cast_precision_loss)]
    pub fn frequency_range_hz(&self) -> (f32, f32) {
        let bus = self.pwm.state().bus_clock_hz as f32;
        let period = f32::from(self.pwm.period());
        let max = bus / period;
        let min = max / 65_536.0;
        (min, max)
    }

    /// Play `frequency_hz` at 50 % duty.
    ///
    /// The counter tick becomes `frequency_hz × period`; the prescaler is
    /// recomputed from it with integer division, so the achieved pitch is
    /// within one part in `prescaler + 1` of the request.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn try_on(&mut self, frequency_hz: f32) -> Result<(), ConfigError> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(ConfigError::FrequencyOutOfRange);
        }
        let period = self.pwm.period();
        let tick = frequency_hz * f32::from(period) + 0.5;
        if tick < 1.0 || tick >= u32::MAX as f32 {
            return Err(ConfigError::FrequencyOutOfRange);
        }
        let tick_hz = tick as u32;

        self.pwm
            .retune(tick_hz, period)
            .map_err(|_| ConfigError::FrequencyOutOfRange)?;
        self.pwm.set_compare(self.channel, period / 2)?;
        self.pwm.restart();
        self.pwm.enable_output(self.channel)
    }

    /// Play `frequency_hz`, saturating to [`frequency_range_hz`](Self::frequency_range_hz).
    ///
    /// Zero, negative and NaN requests silence the speaker.
    pub fn on(&mut self, frequency_hz: f32) {
        if frequency_hz.is_nan() || frequency_hz <= 0.0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("speaker: non-positive tone request, muting");
            self.off();
            return;
        }
        if self.try_on(frequency_hz).is_ok() {
            return;
        }
        let (min, max) = self.frequency_range_hz();
        let clamped = frequency_hz.clamp(min, max);
        #[cfg(feature = "defmt")]
        defmt::warn!("speaker: {=f32} Hz out of range, using {=f32} Hz", frequency_hz, clamped);
        if self.try_on(clamped).is_err() {
            self.off();
        }
    }

    /// Disable the channel output. The counter keeps running.
    pub fn off(&mut self) {
        // The speaker channel is always owned.
        let _ = self.pwm.disable_output(self.channel);
    }

    /// Whether the output is enabled.
    pub fn is_sounding(&self) -> bool {
        self.pwm.output_enabled(self.channel)
    }

    /// Pitch currently programmed.
    pub fn frequency_hz(&self) -> f32 {
        self.pwm.output_frequency_hz()
    }

    /// Underlying generator.
    pub fn generator(&self) -> &PwmGenerator<T> {
        &self.pwm
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::clock_tree::{plan, Oscillator};
    use crate::mocks::{MockPwmTimer, TimerWrite};

    fn plan_168() -> ClockPlan {
        plan(Oscillator::Hsi, 168_000_000).unwrap()
    }

    fn motor() -> MotorPwm<MockPwmTimer> {
        MotorPwm::init(MockPwmTimer::new(), &plan_168(), TimerId::Tim8, 24_000_000, 1000).unwrap()
    }

    fn speaker() -> Speaker<MockPwmTimer> {
        Speaker::init(
            MockPwmTimer::new(),
            &plan_168(),
            &SpeakerConfig {
                timer: TimerId::Tim11,
                channel: Channel::Ch1,
                base_tick_hz: 1_000_000,
                period: 100,
            },
        )
        .unwrap()
    }

    #[test]
    fn motor_init_programs_expected_registers() {
        let m = motor();
        let timer = m.generator().timer();
        assert_eq!(timer.prescaler, 2);
        assert_eq!(timer.auto_reload, 999);
        assert_eq!(timer.repetition_counter, Some(0));
        assert!(timer.preload && timer.continuous && timer.edge_aligned_up);
        assert!(timer.main_output && timer.counter_enabled);
        for ch in Channel::ALL {
            assert!(timer.pwm_mode1[ch.index()]);
            assert!(timer.output_enabled[ch.index()]);
            assert_eq!(timer.compare[ch.index()], 0);
        }
    }

    #[test]
    fn motor_init_order_ends_with_counter_start() {
        let m = motor();
        let writes = m.generator().timer().writes();
        assert_eq!(writes.first(), Some(&TimerWrite::EdgeAlignedUp));
        assert_eq!(writes.last(), Some(&TimerWrite::CounterOn));
        let moe = writes.iter().position(|w| *w == TimerWrite::MainOutput);
        let cen = writes.iter().position(|w| *w == TimerWrite::CounterOn);
        assert!(moe < cen);
    }

    #[test]
    fn motor_compare_strict_and_clamped() {
        let mut m = motor();
        assert_eq!(
            m.try_set_compare(Channel::Ch2, 1001),
            Err(ConfigError::CompareOutOfRange {
                compare: 1001,
                period: 1000
            })
        );
        m.set_compare(Channel::Ch2, 5000);
        assert_eq!(m.generator().compare(Channel::Ch2), 1000);
        assert!((m.generator().duty(Channel::Ch2) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn drive_routes_sign_to_channel_pair() {
        let mut m = motor();
        m.drive(MotorSide::Left, 0.25);
        assert_eq!(m.generator().compare(Channel::Ch1), 250);
        assert_eq!(m.generator().compare(Channel::Ch2), 0);

        m.drive(MotorSide::Left, -0.5);
        assert_eq!(m.generator().compare(Channel::Ch1), 0);
        assert_eq!(m.generator().compare(Channel::Ch2), 500);

        m.drive(MotorSide::Right, 7.0);
        assert_eq!(m.generator().compare(Channel::Ch3), 1000);

        m.drive(MotorSide::Right, f32::NAN);
        assert_eq!(m.generator().compare(Channel::Ch3), 0);
        assert_eq!(m.generator().compare(Channel::Ch4), 0);
    }

    #[test]
    fn zero_period_is_rejected() {
        let err = MotorPwm::init(MockPwmTimer::new(), &plan_168(), TimerId::Tim8, 24_000_000, 0);
        assert!(matches!(err, Err(ConfigError::ZeroPeriod(TimerId::Tim8))));
    }

    #[test]
    fn channel_missing_from_timer_is_rejected() {
        let config = PwmConfig {
            timer: TimerId::Tim11,
            counter_tick_hz: 1_000_000,
            period: 100,
            channels: &[Channel::Ch2],
            outputs_enabled: true,
        };
        let err = PwmGenerator::init(MockPwmTimer::new(), &plan_168(), &config);
        assert!(matches!(
            err,
            Err(ConfigError::ChannelNotOnTimer {
                timer: TimerId::Tim11,
                channel: Channel::Ch2
            })
        ));
    }

    #[test]
    fn main_output_is_left_alone_on_tim11() {
        let s = speaker();
        assert!(!s.generator().timer().main_output);
    }

    #[test]
    fn speaker_starts_silent_with_counter_running() {
        let s = speaker();
        assert!(!s.is_sounding());
        let timer = s.generator().timer();
        assert!(!timer.output_enabled[0]);
        assert!(timer.counter_enabled);
        assert_eq!(timer.prescaler, 83);
    }

    #[test]
    fn speaker_a4_is_close_to_440hz() {
        let mut s = speaker();
        s.try_on(440.0).unwrap();
        let psc = s.generator().prescaler();
        // 84 MHz / 44 kHz = 1909.09 -> PSC 1908
        assert_eq!(psc, 1908);
        let f = s.frequency_hz();
        assert!((f - 440.0).abs() <= 440.0 / (f32::from(psc) + 1.0), "{f}");
        assert_eq!(s.generator().compare(Channel::Ch1), 50);
        assert!(s.is_sounding());
    }

    #[test]
    fn speaker_retune_forces_update_event() {
        let mut s = speaker();
        let before = s.generator().timer().update_events;
        s.try_on(1000.0).unwrap();
        assert_eq!(s.generator().timer().update_events, before + 1);
    }

    #[test]
    fn speaker_off_keeps_counter_running() {
        let mut s = speaker();
        s.on(440.0);
        s.off();
        assert!(!s.is_sounding());
        let timer = s.generator().timer();
        assert!(!timer.output_enabled[0]);
        assert!(timer.counter_enabled);
    }

    #[test]
    fn speaker_on_is_idempotent() {
        let mut s = speaker();
        s.on(523.25);
        let first = s.generator().state();
        s.on(523.25);
        assert_eq!(s.generator().state(), first);
    }

    #[test]
    fn speaker_rejects_and_clamps_out_of_range() {
        let mut s = speaker();
        assert_eq!(s.try_on(0.0), Err(ConfigError::FrequencyOutOfRange));
        assert_eq!(s.try_on(f32::INFINITY), Err(ConfigError::FrequencyOutOfRange));
        assert_eq!(s.try_on(1.0), Err(ConfigError::FrequencyOutOfRange));

        // 1 Hz is below 84 MHz / (100 * 65536) ~ 12.8 Hz: saturates to the floor
        s.on(1.0);
        assert!(s.is_sounding());
        assert!(s.generator().prescaler() > 65_000);
        assert!((s.frequency_hz() - 12.8).abs() < 0.1);

        s.on(-3.0);
        assert!(!s.is_sounding());
    }

    proptest::proptest! {
        #[test]
        fn off_mutes_after_any_tone(frequency in proptest::num::f32::ANY) {
            let mut s = speaker();
            s.on(frequency);
            s.off();
            proptest::prop_assert!(!s.is_sounding());
            let timer = s.generator().timer();
            proptest::prop_assert!(!timer.output_enabled[0]);
            proptest::prop_assert!(timer.counter_enabled);
        }
    }
}
