/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Mozbridge CLI - diagnostics for the browser-embedding glue
//!
//! Usage:
//!   mozbridge discover              Locate the engine home and print it
//!   mozbridge check <config.toml>   Validate a configuration file
//!   mozbridge copy-prefs <from> <to>  Run the preference migration filter

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use mozbridge::discovery::BrowserDiscovery;
use mozbridge::{profile, runtime, BridgeConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mozbridge")]
#[command(version)]
#[command(about = "Diagnostics for the mozbridge browser-embedding glue")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the browser engine installation and print its home directory
    Discover {
        /// TOML config overriding the stock engine settings
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Also export the home variable and LD_LIBRARY_PATH into this
        /// process
        #[arg(long)]
        register: bool,
    },
    /// Validate a configuration file
    Check {
        /// Path to configuration file
        config: PathBuf,
    },
    /// Copy the allow-listed preference lines from one prefs file to
    /// another
    CopyPrefs {
        from: PathBuf,
        to: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&cli.log_level),
    )
    .format_timestamp_millis()
    .init();

    match cli.command {
        Commands::Discover { config, register } => discover(config, register),
        Commands::Check { config } => check_config(&config),
        Commands::CopyPrefs { from, to } => copy_prefs(&from, &to),
    }
}

fn discover(config: Option<PathBuf>, register: bool) -> Result<()> {
    let config = match config {
        Some(path) => BridgeConfig::load(&path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    let discovery = BrowserDiscovery::with_config(config.engine.clone());
    match discovery.discover() {
        Some(home) => {
            if register {
                runtime::register_engine_home(&config.engine.home_var, &home);
                info!("registered {} and LD_LIBRARY_PATH", config.engine.home_var);
            }
            println!("{}", home.display());
            Ok(())
        }
        None => {
            eprintln!(
                "No {} installation found. Set {} or install the engine.",
                config.engine.binary_name, config.engine.home_var
            );
            std::process::exit(1);
        }
    }
}

fn check_config(config_path: &PathBuf) -> Result<()> {
    let config = BridgeConfig::load(config_path)
        .with_context(|| format!("Failed to load: {}", config_path.display()))?;

    println!("Configuration valid!");
    println!();
    println!("Home var:   {}", config.engine.home_var);
    println!("Binary:     {}", config.engine.binary_name);
    println!("Interop:    {}", config.engine.interop_library);
    println!("Schemes:    {:?}", config.engine.schemes);
    println!("Profile:    {}", config.profile.profile_dir_name);
    println!("Prefs:      {} -> {}", config.profile.prefs_name, config.profile.copied_prefs_name);

    Ok(())
}

fn copy_prefs(from: &PathBuf, to: &PathBuf) -> Result<()> {
    profile::copy_filtered_prefs(from, to).with_context(|| {
        format!("Failed to copy prefs from {} to {}", from.display(), to.display())
    })?;

    println!("Copied allow-listed preferences to {}", to.display());
    Ok(())
}
