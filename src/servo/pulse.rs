// Angle to pulse width conversion for positional hobby servos
//
// A servo holds the angle encoded by the width of a pulse repeated at the PWM frequency.
// Each servo maps 0°..180° linearly onto its own pulse range.

/// Resolution of the PCA9685 PWM counter
pub const PWM_RESOLUTION: u32 = 4096;

/// Maximum commandable angle
pub const MAX_ANGLE: u8 = 180;

/// Pulse widths (µs) producing 0° and 180°
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRange {
    pub min_us: u16,
    pub max_us: u16,
}

impl PulseRange {
    pub const fn new(min_us: u16, max_us: u16) -> Self {
        Self { min_us, max_us }
    }

    /// Pulse width for an angle, rounded to the nearest microsecond
    ///
    /// Angles above 180° are treated as 180°.
    pub fn pulse_us(&self, degrees: u8) -> u16 {
        let degrees = degrees.min(MAX_ANGLE) as u32;
        let span = self.max_us.saturating_sub(self.min_us) as u32;
        let offset = (degrees * span + MAX_ANGLE as u32 / 2) / MAX_ANGLE as u32;
        self.min_us + offset as u16
    }
}

impl Default for PulseRange {
    fn default() -> Self {
        Self::new(500, 2500)
    }
}

/// Convert a pulse width to PWM counter ticks at the given frequency
pub fn pulse_to_ticks(pulse_us: u16, frequency_hz: u32) -> u16 {
    let period_us = 1_000_000 / frequency_hz.max(1);
    let ticks = (pulse_us as u32 * PWM_RESOLUTION + period_us / 2) / period_us;

    // Clamp to the 12-bit counter
    ticks.min(PWM_RESOLUTION - 1) as u16
}
