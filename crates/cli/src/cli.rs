//! Command line definition

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use loopcall_infra_common::logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
use loopcall_sdp_core::ABS_CAPTURE_TIME_URI;

use crate::commands;

/// SDP header-extension munging and loopback call demo
#[derive(Parser, Debug)]
#[command(name = "loopcall", author, version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "LOOPCALL_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a header extension to the first audio and video sections of an SDP
    Augment {
        /// Header extension URI to add
        #[arg(long, default_value = ABS_CAPTURE_TIME_URI, value_parser = NonEmptyStringValueParser::new())]
        uri: String,

        /// SDP file to read, stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Run a loopback call against the simulated engine
    Demo {
        /// Session configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// How long to keep the call up before hanging up
        #[arg(long, default_value_t = 3000)]
        duration_ms: u64,

        /// Apply the receiver delay hint halfway through the call
        #[arg(long)]
        delay_hint: bool,
    },
}

impl Cli {
    /// Install logging and run the selected command
    pub async fn execute(self) -> Result<()> {
        let level = parse_log_level(&self.log_level)?;
        let mut logging = LoggingConfig::new(level, env!("CARGO_PKG_NAME"));
        if self.json {
            logging = logging.with_json();
        }
        setup_logging(logging).context("Failed to set up logging")?;
        log_welcome("loopcall", env!("CARGO_PKG_VERSION"));

        match self.command {
            Command::Augment { uri, input } => commands::augment::execute(&uri, input.as_deref()),
            Command::Demo {
                config,
                duration_ms,
                delay_hint,
            } => {
                commands::demo::execute(config.as_deref(), Duration::from_millis(duration_ms), delay_hint).await
            }
        }
    }
}
