//! Logger setup for the command line tool.
//!
//! Terminal output goes to stderr so stdout stays clean JSON.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

pub const LOG_FILE: &str = "forum.log";

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogDestination {
    /// forum.log in the current directory
    File,
    /// stderr
    Terminal,
    Both,
}

impl LogDestination {
    fn to_terminal(self) -> bool {
        matches!(self, Self::Terminal | Self::Both)
    }

    fn to_file(self) -> bool {
        matches!(self, Self::File | Self::Both)
    }

    /// Loggers for this destination; `verbose` lowers the threshold to debug.
    fn loggers(self, verbose: bool, file: &Path) -> Result<Vec<Box<dyn SharedLogger>>> {
        let level = if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        let config = ConfigBuilder::new()
            .set_time_format_rfc3339()
            .set_target_level(LevelFilter::Error)
            .build();

        let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
        if self.to_terminal() {
            loggers.push(TermLogger::new(
                level,
                config.clone(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ));
        }
        if self.to_file() {
            let sink = File::create(file)
                .with_context(|| format!("could not create log file {}", file.display()))?;
            loggers.push(WriteLogger::new(level, config, sink));
        }
        Ok(loggers)
    }
}

pub fn initialize(destination: LogDestination, verbose: bool, file: &Path) -> Result<()> {
    let loggers = destination.loggers(verbose, file)?;
    // A logger may already be installed, e.g. by a test harness.
    let _ = CombinedLogger::init(loggers);
    Ok(())
}
