// Licensed under the Apache-2.0 license

mod bloat;

use anyhow::{bail, Context, Result};
use bloat::BloatFormat;
use clap::{Parser, Subcommand};
use std::process::Command;

const DEFAULT_TARGET: &str = "thumbv7em-none-eabihf";

/// Feature sets the host test suite runs under.
const FEATURE_MATRIX: &[&[&str]] = &[&[], &["std"]];

/// Feature sets the embedded build must accept.
const TARGET_FEATURES: &[&str] = &["cortex-m", "cortex-m,defmt"];

#[derive(Parser)]
#[command(name = "xtask", about = "Development tasks for i2c-eeprom")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the host test suite under every feature set
    Test,
    /// Report code size of the library on an embedded target
    Bloat {
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,
        #[arg(long)]
        debug: bool,
        #[arg(long, value_enum, default_value_t = BloatFormat::Table)]
        format: BloatFormat,
        /// Write reports to this directory instead of printing
        #[arg(long)]
        report: Option<String>,
    },
    /// Build the library as no_std for an embedded target
    CheckTarget {
        #[arg(long, default_value = DEFAULT_TARGET)]
        target: String,
    },
}

fn cargo(args: &[&str]) -> Result<()> {
    println!("cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .args(args)
        .status()
        .context("Failed to run cargo")?;
    if !status.success() {
        bail!("cargo {} failed", args.join(" "));
    }
    Ok(())
}

fn test_matrix() -> Result<()> {
    for features in FEATURE_MATRIX {
        let joined = features.join(",");
        let mut args = vec!["test", "-p", "i2c-eeprom", "--no-default-features"];
        if !joined.is_empty() {
            args.extend(["--features", joined.as_str()]);
        }
        cargo(&args)?;
    }
    Ok(())
}

fn check_target(target: &str) -> Result<()> {
    for features in TARGET_FEATURES {
        cargo(&[
            "build",
            "-p",
            "i2c-eeprom",
            "--no-default-features",
            "--features",
            features,
            "--target",
            target,
        ])?;
    }
    Ok(())
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Test => test_matrix(),
        Commands::Bloat {
            target,
            debug,
            format,
            report,
        } => match report {
            Some(dir) => bloat::generate_report(!debug, &target, &dir),
            None => bloat::analyze_bloat(!debug, &target, format),
        },
        Commands::CheckTarget { target } => check_target(&target),
    }
}
