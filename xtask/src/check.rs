use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::cargo::{step, OnFailure, TARGET};

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking robot board builds...".cyan().bold());
    println!();

    let start = Instant::now();

    step(
        "Firmware, hardware target (STM32F405RG)",
        &["check", "-p", "firmware", "--target", TARGET, "--features", "hardware"],
        OnFailure::Abort,
    )?;
    step(
        "Firmware, host with mocks",
        &["check", "-p", "firmware", "--features", "std", "--all-targets"],
        OnFailure::Abort,
    )?;
    step(
        "Platform crate (no_std)",
        &["check", "-p", "platform", "--target", TARGET, "--no-default-features"],
        OnFailure::Abort,
    )?;
    // Lints and formatting are reported, not enforced.
    step(
        "Clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;
    step("Formatting", &["fmt", "--all", "--check"], OnFailure::Warn)?;

    println!(
        "{}",
        format!("✓ All checks completed in {:.2}s", start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();
    Ok(())
}
