// Driver interface between the leg commander and the servo hardware
//
// The commander only ever asks for "channel N to θ degrees" and, once, "shut down".

use tracing::{debug, info};

use super::pulse::{MAX_ANGLE, PulseRange};

/// Error types for servo drivers
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Channel {channel} is not available on this driver")]
    InvalidChannel { channel: u8 },

    #[error("Angle {degrees}° out of range for channel {channel}")]
    AngleOutOfRange { channel: u8, degrees: u8 },

    #[error("Bus error: {0}")]
    Bus(String),
}

/// Anything that can position a servo channel
pub trait ActuatorDriver {
    /// Move a channel to an angle in 0..=180 degrees
    fn set_channel_angle(&mut self, channel: u8, degrees: u8) -> Result<(), DriverError>;

    /// Stop driving all channels and release the hardware
    fn shutdown(&mut self) -> Result<(), DriverError>;
}

impl<D: ActuatorDriver + ?Sized> ActuatorDriver for Box<D> {
    fn set_channel_angle(&mut self, channel: u8, degrees: u8) -> Result<(), DriverError> {
        (**self).set_channel_angle(channel, degrees)
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        (**self).shutdown()
    }
}

/// Driver that only logs and records what would have been sent
///
/// Used for dry runs without the servo board attached, and by the tests.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    pulses: Vec<PulseRange>,
    history: Vec<(u8, u8)>,
}

impl SimulatedDriver {
    /// Create a driver with one channel per pulse range
    pub fn new(pulses: &[PulseRange]) -> Self {
        Self {
            pulses: pulses.to_vec(),
            history: Vec::new(),
        }
    }

    /// Every (channel, angle) write in order
    pub fn history(&self) -> &[(u8, u8)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl ActuatorDriver for SimulatedDriver {
    fn set_channel_angle(&mut self, channel: u8, degrees: u8) -> Result<(), DriverError> {
        let range = self
            .pulses
            .get(channel as usize)
            .ok_or(DriverError::InvalidChannel { channel })?;
        if degrees > MAX_ANGLE {
            return Err(DriverError::AngleOutOfRange { channel, degrees });
        }

        debug!(
            "[sim] channel {} -> {}° ({} µs)",
            channel,
            degrees,
            range.pulse_us(degrees)
        );
        self.history.push((channel, degrees));
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        info!("[sim] Releasing {} channels", self.pulses.len());
        Ok(())
    }
}
