// Licensed under the Apache-2.0 license

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::process::Command;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum BloatFormat {
    Table,
    Json,
    Csv,
}

fn bloat_command(release: bool, target: &str) -> Command {
    let mut cmd = Command::new("cargo");
    cmd.args(["bloat", "--lib", "-p", "i2c-eeprom", "--no-default-features"]);
    if release {
        cmd.arg("--release");
    }
    cmd.args(["--target", target]);
    cmd
}

/// Print the size breakdown of the library for `target`.
pub fn analyze_bloat(release: bool, target: &str, format: BloatFormat) -> Result<()> {
    println!("Running binary size analysis for {target}...");

    let mut cmd = bloat_command(release, target);
    match format {
        BloatFormat::Table => {}
        BloatFormat::Json => {
            cmd.arg("--message-format=json");
        }
        BloatFormat::Csv => {
            cmd.arg("--format=csv");
        }
    }

    let output = cmd.output().context(
        "Failed to run cargo bloat - make sure it's installed with 'cargo install cargo-bloat'",
    )?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("cargo bloat failed: {}", stderr);
    }

    print!("{}", String::from_utf8_lossy(&output.stdout));
    Ok(())
}

/// Write per-function and per-crate size reports into `output_dir`.
pub fn generate_report(release: bool, target: &str, output_dir: &str) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    let reports: [(&str, &[&str]); 2] = [("functions", &["-n", "50"]), ("crates", &["--crates"])];
    for (name, flags) in reports {
        let output_file = format!("{}/bloat_{}.txt", output_dir, name);
        let output = bloat_command(release, target)
            .args(flags)
            .output()
            .with_context(|| format!("Failed to generate {} report", name))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("cargo bloat ({}) failed: {}", name, stderr);
        }
        std::fs::write(&output_file, &output.stdout)
            .with_context(|| format!("Failed to write report to {}", output_file))?;
        println!("Generated {}", output_file);
    }
    Ok(())
}
