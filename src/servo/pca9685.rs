// PCA9685 16-channel PWM board on the Raspberry Pi I2C bus
//
// The board runs at 50 Hz; each channel's pulse starts at tick 0 and ends at the tick
// computed from that channel's pulse range.

use pwm_pca9685::{Address, Channel, Pca9685};
use rppal::i2c::I2c;
use tracing::{debug, info, warn};

use super::driver::{ActuatorDriver, DriverError};
use super::pulse::{MAX_ANGLE, PulseRange, pulse_to_ticks};

/// Internal oscillator frequency
const OSCILLATOR_HZ: u32 = 25_000_000;

/// Number of PWM outputs on the board
const CHANNEL_COUNT: usize = 16;

pub struct Pca9685Driver {
    pwm: Pca9685<I2c>,
    pulses: Vec<PulseRange>,
    frequency_hz: u32,
}

impl Pca9685Driver {
    /// Open the board at `address` and start the oscillator at `frequency_hz`
    ///
    /// Channels without an entry in `pulses` are rejected on write.
    pub fn open(address: u8, frequency_hz: u32, pulses: &[PulseRange]) -> Result<Self, DriverError> {
        info!("Opening PCA9685 at 0x{:02X}, {} Hz", address, frequency_hz);
        let i2c = I2c::new().map_err(|e| DriverError::Bus(e.to_string()))?;
        let mut pwm = Pca9685::new(i2c, Address::from(address)).map_err(bus_error)?;

        pwm.set_prescale(prescale(frequency_hz)).map_err(bus_error)?;
        pwm.enable().map_err(bus_error)?;

        Ok(Self {
            pwm,
            pulses: pulses.iter().copied().take(CHANNEL_COUNT).collect(),
            frequency_hz,
        })
    }
}

impl ActuatorDriver for Pca9685Driver {
    fn set_channel_angle(&mut self, channel: u8, degrees: u8) -> Result<(), DriverError> {
        let range = self
            .pulses
            .get(channel as usize)
            .ok_or(DriverError::InvalidChannel { channel })?;
        if degrees > MAX_ANGLE {
            return Err(DriverError::AngleOutOfRange { channel, degrees });
        }

        let pulse = range.pulse_us(degrees);
        let ticks = pulse_to_ticks(pulse, self.frequency_hz);
        debug!(
            "PCA9685 channel {}: {}° -> {} µs ({} ticks)",
            channel, degrees, pulse, ticks
        );

        self.pwm
            .set_channel_on_off(to_channel(channel)?, 0, ticks)
            .map_err(bus_error)
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        info!("Releasing servos");
        for channel in 0..self.pulses.len() as u8 {
            // Zero-width pulse lets the servo go limp
            if let Err(e) = self.pwm.set_channel_on_off(to_channel(channel)?, 0, 0) {
                warn!("Failed to release channel {}: {:?}", channel, e);
            }
        }
        self.pwm.disable().map_err(bus_error)
    }
}

/// Prescale register value for an output frequency
fn prescale(frequency_hz: u32) -> u8 {
    let value = (OSCILLATOR_HZ as f32 / (4096.0 * frequency_hz.max(1) as f32)).round() - 1.0;
    // Register minimum is 3
    value.clamp(3.0, 255.0) as u8
}

fn to_channel(channel: u8) -> Result<Channel, DriverError> {
    let channel = match channel {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        _ => return Err(DriverError::InvalidChannel { channel }),
    };
    Ok(channel)
}

fn bus_error<E: std::fmt::Debug>(e: pwm_pca9685::Error<E>) -> DriverError {
    DriverError::Bus(format!("{:?}", e))
}
