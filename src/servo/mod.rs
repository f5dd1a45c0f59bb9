// Servo actuation for the leg joints
//
// Provides:
// - The driver interface the leg commander writes angles through
// - Angle to pulse width conversion for hobby servos on a 50 Hz PWM board
// - A simulated driver for dry runs and tests
// - A PCA9685 driver over Linux I2C (feature `pca9685`)

mod driver;
#[cfg(feature = "pca9685")]
pub mod pca9685;
pub mod pulse;

pub use driver::{ActuatorDriver, DriverError, SimulatedDriver};
#[cfg(feature = "pca9685")]
pub use pca9685::Pca9685Driver;
pub use pulse::{PulseRange, pulse_to_ticks};
