use crate::config::TICK_FREQUENCY;

use clap::{Parser, Subcommand, ValueEnum};
use log::{Level, LevelFilter};
use std::path::PathBuf;

const DEFAULT_HEADLESS_TICKS: u64 = 600;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// c8vm: a CHIP-8 virtual machine for the terminal
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevelOption {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevelOption {
    pub fn to_level(self) -> Level {
        match self {
            LogLevelOption::Trace => Level::Trace,
            LogLevelOption::Debug => Level::Debug,
            LogLevelOption::Info => Level::Info,
            LogLevelOption::Warn => Level::Warn,
            LogLevelOption::Error => Level::Error,
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        self.to_level().to_level_filter()
    }
}

// instruction tracing is only visible at trace level
pub fn effective_log_level(log: Option<LogLevelOption>, trace: bool) -> Option<LogLevelOption> {
    if trace {
        Some(LogLevelOption::Trace)
    } else {
        log
    }
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// Loads a CHIP-8 ROM and runs it in the terminal
    Run {
        /// Path of the ROM to load
        #[arg(value_name = "ROM")]
        path: PathBuf,

        /// Starts paused and lets the ROM be stepped one tick at a time
        #[arg(short, long)]
        debug: bool,

        /// Sets the ticks executed per second
        #[arg(long, default_value_t = TICK_FREQUENCY, value_parser = clap::value_parser!(u32).range(1..))]
        hz: u32,

        /// Seeds the random number generator
        #[arg(long)]
        seed: Option<u64>,

        /// Enable logging
        #[arg(short, long, value_enum, value_name = "LEVEL")]
        log: Option<LogLevelOption>,

        /// Log every executed instruction
        #[arg(short, long)]
        trace: bool,
    },

    /// Runs a CHIP-8 ROM for a fixed number of ticks without a terminal interface and prints the final state
    Headless {
        /// Path of the ROM to load
        #[arg(value_name = "ROM")]
        path: PathBuf,

        /// Number of ticks to execute
        #[arg(long, default_value_t = DEFAULT_HEADLESS_TICKS)]
        ticks: u64,

        /// Seeds the random number generator
        #[arg(long)]
        seed: Option<u64>,

        /// Enable logging
        #[arg(short, long, value_enum, value_name = "LEVEL")]
        log: Option<LogLevelOption>,

        /// Log every executed instruction
        #[arg(short, long)]
        trace: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["c8vm", "run", "pong.ch8"]).unwrap();
        let CliCommand::Run { path, debug, hz, seed, log, trace } = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(path, PathBuf::from("pong.ch8"));
        assert!(!debug);
        assert_eq!(hz, 60);
        assert_eq!(seed, None);
        assert_eq!(log, None);
        assert!(!trace);
    }

    #[test]
    fn headless_options() {
        let cli = Cli::try_parse_from([
            "c8vm", "headless", "pong.ch8", "--ticks", "10", "--seed", "3", "--log", "debug",
        ])
        .unwrap();
        let CliCommand::Headless { ticks, seed, log, .. } = cli.command else {
            panic!("expected headless command");
        };
        assert_eq!(ticks, 10);
        assert_eq!(seed, Some(3));
        assert_eq!(log, Some(LogLevelOption::Debug));
    }

    #[test]
    fn zero_hz_is_rejected() {
        assert!(Cli::try_parse_from(["c8vm", "run", "pong.ch8", "--hz", "0"]).is_err());
    }

    #[test]
    fn trace_forces_trace_level() {
        assert_eq!(
            effective_log_level(Some(LogLevelOption::Warn), true),
            Some(LogLevelOption::Trace)
        );
        assert_eq!(effective_log_level(None, false), None);
        assert_eq!(
            effective_log_level(Some(LogLevelOption::Info), false),
            Some(LogLevelOption::Info)
        );
    }
}
