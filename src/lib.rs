// Quadruped crawl gait and joint calibration
//
// Layers, bottom up:
// - legs: leg identifiers and the actuator wiring table
// - calibration: per-joint offsets and their file
// - commander: offset, clamp and mirror every angle before it reaches a servo
// - gait / procedure: the walking sequence and the interactive calibration

pub mod calibration;
pub mod cli;
pub mod commander;
pub mod config;
pub mod error;
pub mod gait;
pub mod input;
pub mod legs;
pub mod procedure;
pub mod runtime;
pub mod servo;
pub mod stop;

pub use error::{Result, RobotError};
