// Interactive joint calibration
//
// Walks through all eight joints in a fixed order. For each, the operator nudges the joint
// until it sits at true 90° and confirms; the offset is the distance from 90. Nothing is
// written unless every joint is confirmed, so quitting at any point keeps the old table.

use tracing::{info, warn};

use crate::calibration::{JOINT_ORDER, Offsets, offset_key};
use crate::commander::LegCommander;
use crate::config::{CALIBRATION_REFERENCE, OFFSET_WARN_LIMIT};
use crate::error::Result;
use crate::input::{KeyAction, KeySource};
use crate::legs::{Joint, LegId, PhysicalLeg};
use crate::servo::ActuatorDriver;

const MIN_TRIAL: i32 = 0;
const MAX_TRIAL: i32 = 180;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationOutcome {
    /// All joints confirmed and saved
    Completed(Offsets),
    /// Operator quit while adjusting this joint; nothing was saved
    Aborted { leg: PhysicalLeg, joint: Joint },
}

/// Result of applying one key action to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Adjusted(i32),
    /// Trial angle already at its limit
    Unchanged,
    Confirmed {
        leg: PhysicalLeg,
        joint: Joint,
        offset: i32,
    },
    Aborted,
}

/// In-progress calibration state
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    index: usize,
    trial: i32,
    offsets: Offsets,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self {
            index: 0,
            trial: CALIBRATION_REFERENCE,
            offsets: Offsets::default(),
        }
    }

    /// Joint currently being adjusted, `None` once all are confirmed
    pub fn current(&self) -> Option<(PhysicalLeg, Joint)> {
        JOINT_ORDER.get(self.index).copied()
    }

    pub fn trial(&self) -> i32 {
        self.trial
    }

    /// Offsets confirmed so far
    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    pub fn apply(&mut self, action: KeyAction) -> SessionStep {
        let Some((leg, joint)) = self.current() else {
            return SessionStep::Unchanged;
        };

        match action {
            KeyAction::Left | KeyAction::Right => {
                let delta = if action == KeyAction::Left { -1 } else { 1 };
                let trial = (self.trial + delta).clamp(MIN_TRIAL, MAX_TRIAL);
                if trial == self.trial {
                    SessionStep::Unchanged
                } else {
                    self.trial = trial;
                    SessionStep::Adjusted(trial)
                }
            }
            KeyAction::Confirm => {
                let offset = self.trial - CALIBRATION_REFERENCE;
                self.offsets.set(leg, joint, offset);
                self.index += 1;
                self.trial = CALIBRATION_REFERENCE;
                SessionStep::Confirmed { leg, joint, offset }
            }
            KeyAction::Quit => SessionStep::Aborted,
        }
    }
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a full calibration session
///
/// Joints are driven without the stored offsets so the trial angle is measured from the
/// servo's own 90°. On completion the new table is saved and installed; if saving fails the
/// error is returned and the previous table stays in use.
pub fn calibrate<D, K>(commander: &mut LegCommander<D>, keys: &mut K) -> Result<CalibrationOutcome>
where
    D: ActuatorDriver,
    K: KeySource + ?Sized,
{
    commander.begin_calibration()?;
    let result = run_session(commander, keys);
    commander.end_calibration();
    result
}

fn run_session<D, K>(commander: &mut LegCommander<D>, keys: &mut K) -> Result<CalibrationOutcome>
where
    D: ActuatorDriver,
    K: KeySource + ?Sized,
{
    info!("Calibration: Left/Right to adjust, Enter to confirm, q to quit without saving");
    let mut session = CalibrationSession::new();

    while let Some((leg, joint)) = session.current() {
        info!("Adjust {} {} joint until it is at 90°", leg, joint);
        show_trial(commander, leg, joint, session.trial())?;

        loop {
            let action = match keys.next_action()? {
                Some(action) => action,
                None => {
                    warn!("Input closed during calibration");
                    KeyAction::Quit
                }
            };

            match session.apply(action) {
                SessionStep::Adjusted(trial) => {
                    info!("{} {}: {}°", leg, joint, trial);
                    show_trial(commander, leg, joint, trial)?;
                }
                SessionStep::Unchanged => {}
                SessionStep::Confirmed { leg, joint, offset } => {
                    info!("{} = {:+}", offset_key(leg, joint), offset);
                    if offset.abs() > OFFSET_WARN_LIMIT {
                        warn!(
                            "{} offset {:+} is unusually large, check the servo horn",
                            offset_key(leg, joint),
                            offset
                        );
                    }
                    break;
                }
                SessionStep::Aborted => {
                    warn!("Calibration aborted, no offsets saved");
                    commander.neutral()?;
                    return Ok(CalibrationOutcome::Aborted { leg, joint });
                }
            }
        }
    }

    let offsets = *session.offsets();
    let saved = commander.calibration_mut().persist(offsets);
    commander.neutral()?;
    saved?;

    info!("Calibration complete");
    Ok(CalibrationOutcome::Completed(offsets))
}

// Only the joint under adjustment moves, its partner holds 90°
fn show_trial<D: ActuatorDriver>(
    commander: &mut LegCommander<D>,
    leg: PhysicalLeg,
    joint: Joint,
    trial: i32,
) -> Result<()> {
    let (top, bottom) = match joint {
        Joint::Top => (trial, CALIBRATION_REFERENCE),
        Joint::Bottom => (CALIBRATION_REFERENCE, trial),
    };
    commander.move_leg_uncalibrated(LegId::from(leg), top, bottom)
}
