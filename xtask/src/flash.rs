use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

use crate::cargo::{step, OnFailure, TARGET};

/// probe-rs chip name of the robot board MCU.
const CHIP: &str = "STM32F405RGTx";

pub fn run(release: bool) -> Result<()> {
    let profile = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building firmware ({profile})...").cyan().bold()
    );
    println!();

    let mut args = vec!["build", "-p", "firmware", "--target", TARGET, "--features", "hardware"];
    if release {
        args.push("--release");
    }
    step("Firmware build", &args, OnFailure::Abort)?;

    let elf = format!("target/{TARGET}/{profile}/firmware");
    show_sections(&elf);

    println!("{}", format!("📡 Flashing {CHIP}...").cyan().bold());
    let start = Instant::now();
    // probe-rs stays attached and streams defmt logs until Ctrl-C.
    let status = Command::new("probe-rs")
        .args(["run", "--chip", CHIP, &elf])
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        anyhow::bail!("Flash failed - check that the probe is connected and the board is powered");
    }
    println!(
        "{}",
        format!("✓ probe-rs exited after {:.2}s", start.elapsed().as_secs_f64()).green()
    );
    Ok(())
}

/// Print `.text`/`.data`/`.bss` sizes if `rust-size` is installed.
fn show_sections(elf: &str) {
    let Ok(out) = Command::new("rust-size").args(["-A", elf]).output() else {
        return;
    };
    if !out.status.success() {
        return;
    }
    println!("{}", "📊 Sections:".cyan());
    let listing = String::from_utf8_lossy(&out.stdout);
    for line in listing
        .lines()
        .filter(|l| [".text", ".rodata", ".data", ".bss"].iter().any(|s| l.starts_with(s)))
    {
        println!("   {}", line.dimmed());
    }
    println!();
}
