// Error types shared across the crate

use std::path::PathBuf;

use crate::legs::{Joint, PhysicalLeg};
use crate::servo::DriverError;

#[derive(Debug, thiserror::Error)]
pub enum RobotError {
    #[error("Invalid leg identifier: {0:?}")]
    InvalidLegId(String),

    #[error("Channel {channel} is wired to more than one joint")]
    InvalidActuatorMap { channel: u8 },

    #[error("Actuator fault on {leg} {joint} joint (channel {channel}): {source}")]
    ActuatorFault {
        leg: PhysicalLeg,
        joint: Joint,
        channel: u8,
        #[source]
        source: DriverError,
    },

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Calibration file {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A calibration session is already in progress")]
    CalibrationInProgress,

    #[error("Stopped by operator")]
    Cancelled,

    #[error("Input error: {0}")]
    Input(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RobotError>;
