// Wiring, gait tuning and hardware configuration
use std::time::Duration;

use crate::legs::ActuatorPair;
use crate::servo::PulseRange;

// Leg wiring, indexed [front-left, front-right, back-left, back-right]
// Right-hand legs have their servo horns mounted mirrored
pub const LEG_WIRING: [ActuatorPair; 4] = [
    ActuatorPair::new(0, 4, false), // front left
    ActuatorPair::new(1, 5, true),  // front right
    ActuatorPair::new(3, 7, false), // back left
    ActuatorPair::new(2, 6, true),  // back right
];

// Per-channel pulse range (µs at 0° and 180°), measured on the assembled robot
pub const CHANNEL_PULSES: [PulseRange; 8] = [
    PulseRange::new(550, 2400),
    PulseRange::new(550, 2400),
    PulseRange::new(600, 2500),
    PulseRange::new(550, 2400),
    PulseRange::new(500, 2500),
    PulseRange::new(500, 2500),
    PulseRange::new(500, 2500),
    PulseRange::new(500, 2500),
];

// PCA9685 servo board
pub const PWM_FREQUENCY_HZ: u32 = 50;
pub const PCA9685_ADDRESS: u8 = 0x40;

// Stance angles (degrees)
pub const STANCE_TOP: i32 = 90;
pub const STANCE_BOTTOM: i32 = 90;

// Movement angles (degrees), tuned by hand for the leg geometry
pub const LIFT_BOTTOM: i32 = 60; // knee bend to lift a leg
pub const SWING_FORWARD: i32 = 110; // hip swing forward
pub const SWING_BACK: i32 = 70; // hip swing back for the support legs

// Gait timing
pub const DEFAULT_STEPS: u32 = 4;
pub const DEFAULT_STEP_DURATION: Duration = Duration::from_millis(300);
pub const NEUTRAL_SETTLE: Duration = Duration::from_millis(500);

// Calibration
pub const DEFAULT_CALIBRATION_PATH: &str = "calibration.json";
pub const CALIBRATION_REFERENCE: i32 = 90;
// Offsets beyond this are saved but reported, a mis-seated horn is more likely than real variance
pub const OFFSET_WARN_LIMIT: i32 = 30;
