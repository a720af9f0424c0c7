//! `cargo xtask plan`: print the clock tree and PWM timing the board boots with.
//!
//! Runs the same derivation code as the firmware, on the host, against the
//! platform mocks, so the numbers are what the timers will be programmed with.

use anyhow::{anyhow, Result};
use colored::Colorize;
use serde::Serialize;

use firmware::config;
use platform::clock_tree::{self, ClockPlan, Oscillator};
use platform::mocks::MockPwmTimer;
use platform::pwm::{MotorPwm, PwmState, Speaker, SpeakerConfig};
use platform::tick::systick_reload;

#[derive(Serialize)]
struct BoardTiming {
    clock: ClockPlan,
    motors: PwmState,
    speaker: PwmState,
    speaker_range_hz: (f32, f32),
    tick_hz: u32,
    systick_reload: u32,
}

fn oscillator(hse_mhz: Option<u32>) -> Oscillator {
    match hse_mhz {
        Some(mhz) => Oscillator::Hse {
            frequency_hz: mhz.saturating_mul(1_000_000),
        },
        None => config::OSCILLATOR,
    }
}

fn derive(osc: Oscillator, sysclk_hz: u32) -> Result<BoardTiming> {
    let clock = clock_tree::plan(osc, sysclk_hz).map_err(|e| anyhow!("clock plan: {e}"))?;

    let motors = MotorPwm::init(
        MockPwmTimer::new(),
        &clock,
        config::MOTOR_TIMER,
        config::MOTOR_COUNTER_TICK_HZ,
        config::MOTOR_PERIOD,
    )
    .map_err(|e| anyhow!("motor PWM: {e}"))?;

    let speaker = Speaker::init(
        MockPwmTimer::new(),
        &clock,
        &SpeakerConfig {
            timer: config::SPEAKER_TIMER,
            channel: config::SPEAKER_CHANNEL,
            base_tick_hz: config::SPEAKER_BASE_TICK_HZ,
            period: config::SPEAKER_PERIOD,
        },
    )
    .map_err(|e| anyhow!("speaker PWM: {e}"))?;

    let reload = systick_reload(clock.derived_ahb_hz, config::TICK_HZ)
        .map_err(|e| anyhow!("tick: {e}"))?;

    Ok(BoardTiming {
        clock,
        motors: motors.generator().state(),
        speaker: speaker.generator().state(),
        speaker_range_hz: speaker.frequency_range_hz(),
        tick_hz: config::TICK_HZ,
        systick_reload: reload,
    })
}

fn mhz(hz: u32) -> String {
    format!("{:.3} MHz", f64::from(hz) / 1e6)
}

fn print_pwm(name: &str, pwm: &PwmState) {
    println!("{}", format!("  {name}").cyan().bold());
    println!("    bus clock        {}", mhz(pwm.bus_clock_hz));
    println!("    prescaler        {}", pwm.prescaler);
    println!("    period           {} counts", pwm.period);
    println!("    counter tick     {}", mhz(pwm.counter_tick_hz));
    println!("    output           {:.1} Hz", pwm.output_frequency_hz);
}

pub fn run(hse_mhz: Option<u32>, sysclk_mhz: u32, json: bool) -> Result<()> {
    let timing = derive(oscillator(hse_mhz), sysclk_mhz.saturating_mul(1_000_000))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&timing)?);
        return Ok(());
    }

    let c = &timing.clock;
    println!();
    println!("{}", "⏱  Clock tree".cyan().bold());
    println!("    oscillator       {}", mhz(c.oscillator_freq_hz));
    println!(
        "    PLL              M={} N={} P={} Q={}  (VCO {})",
        c.pll.m,
        c.pll.n,
        c.pll.p,
        c.pll.q,
        mhz(c.vco_hz)
    );
    println!("    SYSCLK / AHB     {} / {}", mhz(c.target_sysclk_hz), mhz(c.derived_ahb_hz));
    println!("    APB1 / APB2      {} / {}", mhz(c.derived_apb1_hz), mhz(c.derived_apb2_hz));
    println!("    PLL48            {}", mhz(c.pll48_hz));
    println!("    flash latency    {} WS", c.flash_wait_states);
    println!();
    print_pwm("Motors (TIM8)", &timing.motors);
    print_pwm("Speaker (TIM11)", &timing.speaker);
    let (lo, hi) = timing.speaker_range_hz;
    println!("    tone range       {lo:.2} Hz .. {hi:.0} Hz");
    println!();
    println!("{}", "  SysTick".cyan().bold());
    println!("    rate             {} Hz", timing.tick_hz);
    println!("    reload           {}", timing.systick_reload);
    println!();
    Ok(())
}
