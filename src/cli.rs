// Command line arguments

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_CALIBRATION_PATH, DEFAULT_STEPS};
use crate::gait::GaitParams;
use crate::legs::LegId;

#[derive(Debug, Parser)]
#[command(name = "kitty-crawl", version, about = "Crawl gait and joint calibration for a four-legged robot")]
pub struct Cli {
    /// Calibration offsets file
    #[arg(long, default_value = DEFAULT_CALIBRATION_PATH)]
    pub calibration: PathBuf,

    /// Log servo writes instead of driving the servo board
    #[arg(long)]
    pub simulate: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// Runs the interactive menu when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk forward with the crawl gait
    Walk(WalkArgs),
    /// Calibrate every joint interactively
    Calibrate,
    /// Move one leg or group to the given angles
    #[command(allow_negative_numbers = true)]
    Move {
        /// fl, fr, bl, br, f, b, l, r or all
        leg: LegId,
        top: i32,
        bottom: i32,
    },
    /// Print the wiring and calibration table
    Show,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct WalkArgs {
    /// Number of gait cycles
    #[arg(long, default_value_t = DEFAULT_STEPS)]
    pub steps: u32,

    /// Hold time of each phase in seconds
    #[arg(long, default_value = "0.3", value_parser = parse_seconds)]
    pub step_duration: Duration,
}

impl WalkArgs {
    pub fn gait_params(&self) -> GaitParams {
        GaitParams {
            steps: self.steps,
            step_duration: self.step_duration,
            ..GaitParams::default()
        }
    }
}

impl Default for WalkArgs {
    fn default() -> Self {
        let params = GaitParams::default();
        Self {
            steps: params.steps,
            step_duration: params.step_duration,
        }
    }
}

/// Parse a non-negative number of seconds
pub fn parse_seconds(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("{:?} is not a number of seconds", s))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration {:?}: {}", s, e))
}
