//! CLI argument parsing

use arpguard_capture::CaptureConfig;
use arpguard_core::{Error, Result};
use arpguard_detect::{AddressLayout, DecoderConfig, DetectorConfig, DEFAULT_CAPACITY};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "arpguard")]
#[command(version, about = "Passive ARP spoofing detector", long_about = None)]
pub struct Cli {
    /// Network interface to listen on (default: first up, non-loopback)
    #[arg(short = 'i', long, conflicts_with = "read")]
    pub interface: Option<String>,

    /// Replay a pcap savefile instead of capturing live
    #[arg(short = 'r', long, value_name = "FILE")]
    pub read: Option<PathBuf>,

    /// Alert log, opened in append mode
    #[arg(short = 'o', long, value_name = "PATH", default_value = "arp_spoof.log")]
    pub log_file: PathBuf,

    /// Maximum number of tracked hosts
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Track any number of hosts
    #[arg(long, conflicts_with = "capacity")]
    pub unbounded: bool,

    /// Report every unchanged re-announcement
    #[arg(long)]
    pub trace_refresh: bool,

    /// Collapse identical spoofing alerts within this many seconds
    #[arg(long, value_name = "SECS")]
    pub suppress_window: Option<u64>,

    /// Take address widths from the ARP header and reject anything but 6/4
    #[arg(long)]
    pub strict_lengths: bool,

    /// Number of detection workers
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub workers: usize,

    /// Frames buffered between capture and detection
    #[arg(long, value_name = "N", default_value_t = 1024)]
    pub queue_depth: usize,

    /// Verbose output (-v, -vv, -vvv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable color output
    #[arg(long)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available network interfaces
    Interfaces,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default tracing directive for the `-v` count
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn detector_config(&self) -> Result<DetectorConfig> {
        if !self.unbounded && self.capacity == 0 {
            return Err(Error::invalid_parameter(
                "capacity",
                "must be at least 1 (use --unbounded for no limit)",
            ));
        }

        let suppress_window = match self.suppress_window {
            Some(0) => {
                return Err(Error::invalid_parameter(
                    "suppress-window",
                    "must be at least 1 second",
                ))
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let layout = if self.strict_lengths {
            AddressLayout::FromHeader
        } else {
            AddressLayout::Fixed
        };

        Ok(DetectorConfig {
            capacity: (!self.unbounded).then_some(self.capacity),
            trace_refresh: self.trace_refresh,
            suppress_window,
            decoder: DecoderConfig { layout },
        })
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        if self.workers == 0 {
            return Err(Error::invalid_parameter("workers", "must be at least 1"));
        }
        if self.queue_depth == 0 {
            return Err(Error::invalid_parameter("queue-depth", "must be at least 1"));
        }

        Ok(PipelineConfig {
            workers: self.workers,
            queue_depth: self.queue_depth,
            capture: CaptureConfig::default(),
        })
    }
}
