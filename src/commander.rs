// Leg commander: every joint angle goes through here
//
// For each physical leg behind a LegId:
//   adjusted = clamp(angle + offset, 0, 180)
//   sent     = mirrored ? 180 - adjusted : adjusted
// Offsets live in the leg's own frame, so mirroring is applied last.

use tracing::{debug, warn};

use crate::calibration::{CalibrationStore, Offsets};
use crate::config::{STANCE_BOTTOM, STANCE_TOP};
use crate::error::{Result, RobotError};
use crate::legs::{ActuatorMap, Joint, LegId, PhysicalLeg};
use crate::servo::ActuatorDriver;

const MIN_ANGLE: i32 = 0;
const MAX_ANGLE: i32 = 180;

/// A single resolved channel write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoCommand {
    pub leg: PhysicalLeg,
    pub joint: Joint,
    pub channel: u8,
    pub angle: u8,
}

/// Apply a calibration offset and clamp to the servo range
pub fn adjust_angle(commanded: i32, offset: i32) -> u8 {
    commanded.saturating_add(offset).clamp(MIN_ANGLE, MAX_ANGLE) as u8
}

/// Convert a leg-frame angle to the actuator frame
pub fn mirror_angle(adjusted: u8, mirrored: bool) -> u8 {
    if mirrored {
        MAX_ANGLE as u8 - adjusted
    } else {
        adjusted
    }
}

/// Owns the servo driver, the wiring and the calibration table
pub struct LegCommander<D: ActuatorDriver> {
    driver: D,
    map: ActuatorMap,
    calibration: CalibrationStore,
    calibrating: bool,
    released: bool,
}

impl<D: ActuatorDriver> LegCommander<D> {
    pub fn new(driver: D, map: ActuatorMap, calibration: CalibrationStore) -> Self {
        Self {
            driver,
            map,
            calibration,
            calibrating: false,
            released: false,
        }
    }

    pub fn map(&self) -> &ActuatorMap {
        &self.map
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub(crate) fn calibration_mut(&mut self) -> &mut CalibrationStore {
        &mut self.calibration
    }

    /// Channel writes for a move using the stored calibration
    pub fn plan(&self, leg: LegId, top: i32, bottom: i32) -> Vec<ServoCommand> {
        self.plan_with(leg, top, bottom, self.calibration.offsets())
    }

    /// Channel writes for a move using an explicit offset table
    pub fn plan_with(&self, leg: LegId, top: i32, bottom: i32, offsets: &Offsets) -> Vec<ServoCommand> {
        let mut commands = Vec::with_capacity(leg.legs().len() * 2);
        for resolved in self.map.resolve(leg) {
            for (joint, angle) in [(Joint::Top, top), (Joint::Bottom, bottom)] {
                let adjusted = adjust_angle(angle, offsets.get(resolved.leg, joint));
                commands.push(ServoCommand {
                    leg: resolved.leg,
                    joint,
                    channel: resolved.pair.channel(joint),
                    angle: mirror_angle(adjusted, resolved.pair.mirrored),
                });
            }
        }
        commands
    }

    /// Move a leg or group of legs, applying calibration, clamping and mirroring
    pub fn move_leg(&mut self, leg: LegId, top: i32, bottom: i32) -> Result<()> {
        debug!("move {} -> top {}°, bottom {}°", leg, top, bottom);
        let commands = self.plan(leg, top, bottom);
        self.dispatch(&commands)
    }

    /// Move without calibration offsets, used while measuring them
    pub fn move_leg_uncalibrated(&mut self, leg: LegId, top: i32, bottom: i32) -> Result<()> {
        debug!("move {} (uncalibrated) -> top {}°, bottom {}°", leg, top, bottom);
        let commands = self.plan_with(leg, top, bottom, &Offsets::default());
        self.dispatch(&commands)
    }

    /// All legs to the neutral stance
    pub fn neutral(&mut self) -> Result<()> {
        self.move_leg(LegId::All, STANCE_TOP, STANCE_BOTTOM)
    }

    // Stops at the first driver error, later channels are not written
    fn dispatch(&mut self, commands: &[ServoCommand]) -> Result<()> {
        for command in commands {
            self.driver
                .set_channel_angle(command.channel, command.angle)
                .map_err(|source| RobotError::ActuatorFault {
                    leg: command.leg,
                    joint: command.joint,
                    channel: command.channel,
                    source,
                })?;
        }
        Ok(())
    }

    /// Claim the calibration session flag
    pub fn begin_calibration(&mut self) -> Result<()> {
        if self.calibrating {
            return Err(RobotError::CalibrationInProgress);
        }
        self.calibrating = true;
        Ok(())
    }

    pub fn end_calibration(&mut self) {
        self.calibrating = false;
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Shut the driver down, reporting any error
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.driver.shutdown()?;
        Ok(())
    }
}

impl<D: ActuatorDriver> Drop for LegCommander<D> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Release the servos on every exit path
        if let Err(e) = self.driver.shutdown() {
            warn!("Failed to shut down servo driver on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CHANNEL_PULSES, LEG_WIRING};
    use crate::servo::{DriverError, SimulatedDriver};
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn commander(offsets: Offsets) -> LegCommander<SimulatedDriver> {
        LegCommander::new(
            SimulatedDriver::new(&CHANNEL_PULSES),
            ActuatorMap::new(LEG_WIRING).unwrap(),
            CalibrationStore::with_offsets("unused.json", offsets),
        )
    }

    /// Fails on one channel, records the rest
    struct FaultyDriver {
        bad_channel: u8,
        written: Vec<u8>,
        shutdowns: Rc<Cell<usize>>,
    }

    fn faulty_commander(bad_channel: u8, shutdowns: Rc<Cell<usize>>) -> LegCommander<FaultyDriver> {
        let driver = FaultyDriver {
            bad_channel,
            written: Vec::new(),
            shutdowns,
        };
        LegCommander::new(
            driver,
            ActuatorMap::new(LEG_WIRING).unwrap(),
            CalibrationStore::with_offsets("unused.json", Offsets::default()),
        )
    }

    impl ActuatorDriver for FaultyDriver {
        fn set_channel_angle(&mut self, channel: u8, _degrees: u8) -> std::result::Result<(), DriverError> {
            if channel == self.bad_channel {
                return Err(DriverError::Bus("nack".to_string()));
            }
            self.written.push(channel);
            Ok(())
        }

        fn shutdown(&mut self) -> std::result::Result<(), DriverError> {
            self.shutdowns.set(self.shutdowns.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_mirrored_front_right() {
        let mut cmd = commander(Offsets::default());
        cmd.move_leg(LegId::FrontRight, 110, 90).unwrap();

        // FR is channels 1 (top) and 5 (bottom), mirrored
        assert_eq!(cmd.driver().history(), &[(1, 70), (5, 90)]);
    }

    #[test]
    fn test_clamped_front_left() {
        let mut cmd = commander(Offsets::default());
        cmd.move_leg(LegId::FrontLeft, 200, -10).unwrap();
        assert_eq!(cmd.driver().history(), &[(0, 180), (4, 0)]);
    }

    #[test]
    fn test_offset_applied_before_mirroring() {
        let mut offsets = Offsets::default();
        offsets.set(PhysicalLeg::BackRight, Joint::Top, 5);
        offsets.set(PhysicalLeg::BackRight, Joint::Bottom, -100);
        let mut cmd = commander(offsets);

        cmd.move_leg(LegId::BackRight, 90, 90).unwrap();
        // top: 90 + 5 = 95 -> 85; bottom: 90 - 100 clamps to 0 -> 180
        assert_eq!(cmd.driver().history(), &[(2, 85), (6, 180)]);
    }

    #[test]
    fn test_group_uses_per_leg_offsets() {
        let mut offsets = Offsets::default();
        offsets.set(PhysicalLeg::FrontLeft, Joint::Top, 4);
        offsets.set(PhysicalLeg::BackLeft, Joint::Top, -6);
        let cmd = commander(offsets);

        let plan = cmd.plan(LegId::Left, 90, 90);
        let angles: Vec<(u8, u8)> = plan.iter().map(|c| (c.channel, c.angle)).collect();
        assert_eq!(angles, vec![(0, 94), (4, 90), (3, 84), (7, 90)]);
    }

    #[test]
    fn test_all_dispatch_order() {
        let cmd = commander(Offsets::default());
        let channels: Vec<u8> = cmd.plan(LegId::All, 90, 90).iter().map(|c| c.channel).collect();
        assert_eq!(channels, vec![0, 4, 1, 5, 3, 7, 2, 6]);
    }

    #[test]
    fn test_move_is_idempotent() {
        let mut offsets = Offsets::default();
        offsets.set(PhysicalLeg::FrontRight, Joint::Top, 3);
        let mut cmd = commander(offsets);

        cmd.move_leg(LegId::All, 75, 120).unwrap();
        let first = cmd.driver().history().to_vec();
        cmd.driver_mut().clear_history();
        cmd.move_leg(LegId::All, 75, 120).unwrap();

        assert_eq!(cmd.driver().history(), first.as_slice());
    }

    #[test]
    fn test_uncalibrated_ignores_offsets() {
        let mut offsets = Offsets::default();
        offsets.set(PhysicalLeg::FrontLeft, Joint::Top, 20);
        let mut cmd = commander(offsets);

        cmd.move_leg_uncalibrated(LegId::FrontLeft, 90, 90).unwrap();
        assert_eq!(cmd.driver().history(), &[(0, 90), (4, 90)]);
    }

    #[test]
    fn test_fault_stops_dispatch() {
        let mut cmd = faulty_commander(5, Rc::new(Cell::new(0)));

        let err = cmd.move_leg(LegId::All, 90, 90).unwrap_err();
        match err {
            RobotError::ActuatorFault { leg, joint, channel, .. } => {
                assert_eq!(leg, PhysicalLeg::FrontRight);
                assert_eq!(joint, Joint::Bottom);
                assert_eq!(channel, 5);
            }
            other => panic!("expected ActuatorFault, got {:?}", other),
        }
        // FL written, FR top written, nothing after the fault
        assert_eq!(cmd.driver().written, vec![0, 4, 1]);
    }

    #[test]
    fn test_calibration_flag() {
        let mut cmd = commander(Offsets::default());
        cmd.begin_calibration().unwrap();
        assert!(matches!(
            cmd.begin_calibration(),
            Err(RobotError::CalibrationInProgress)
        ));
        cmd.end_calibration();
        assert!(cmd.begin_calibration().is_ok());
    }

    #[test]
    fn test_release_shuts_down_once() {
        let shutdowns = Rc::new(Cell::new(0));
        let mut cmd = faulty_commander(99, shutdowns.clone());
        cmd.neutral().unwrap();

        assert!(cmd.release().is_ok());
        assert_eq!(shutdowns.get(), 1);
    }

    #[test]
    fn test_drop_shuts_down() {
        let shutdowns = Rc::new(Cell::new(0));
        {
            let mut cmd = faulty_commander(5, shutdowns.clone());
            // Faulted move still releases the driver when the commander goes away
            assert!(cmd.move_leg(LegId::FrontRight, 90, 90).is_err());
        }
        assert_eq!(shutdowns.get(), 1);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(256))]

        #[test]
        fn prop_sent_angle_in_range(angle in -1000i32..1000, offset in -200i32..200) {
            let adjusted = adjust_angle(angle, offset);
            prop_assert!(adjusted <= 180);
            if angle + offset < 0 {
                prop_assert_eq!(adjusted, 0);
            } else if angle + offset > 180 {
                prop_assert_eq!(adjusted, 180);
            } else {
                prop_assert_eq!(adjusted as i32, angle + offset);
            }
        }

        #[test]
        fn prop_mirroring_law(
            top in -50i32..250,
            bottom in -50i32..250,
            offset_top in -30i32..30,
            offset_bottom in -30i32..30,
        ) {
            let mut offsets = Offsets::default();
            for leg in PhysicalLeg::ALL {
                offsets.set(leg, Joint::Top, offset_top);
                offsets.set(leg, Joint::Bottom, offset_bottom);
            }
            let cmd = commander(offsets);

            for command in cmd.plan(LegId::All, top, bottom) {
                let (angle, offset) = match command.joint {
                    Joint::Top => (top, offset_top),
                    Joint::Bottom => (bottom, offset_bottom),
                };
                let adjusted = adjust_angle(angle, offset);
                if cmd.map().pair(command.leg).mirrored {
                    prop_assert_eq!(command.angle, 180 - adjusted);
                } else {
                    prop_assert_eq!(command.angle, adjusted);
                }
            }
        }
    }
}
