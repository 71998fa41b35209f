//! Command-line front end for arpguard
//!
//! Argument parsing, the alert log and the capture to detection pipeline
//! behind the `arpguard` binary.

pub mod args;
pub mod runner;
pub mod sink;

pub use args::{Cli, Commands};
pub use runner::{run, Dispatcher, PipelineConfig, RunSummary, Source};
pub use sink::{AlertLog, SharedSink};
