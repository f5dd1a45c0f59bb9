// Leg addressing: logical leg identifiers, physical legs and the actuator wiring table
//
// A LegId names one leg or a group of legs. Groups always expand to physical legs in a
// fixed order, so a group command behaves exactly like the same command sent leg by leg.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RobotError};

/// One of the four legs bolted to the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhysicalLeg {
    FrontLeft = 0,
    FrontRight = 1,
    BackLeft = 2,
    BackRight = 3,
}

impl PhysicalLeg {
    pub const ALL: [PhysicalLeg; 4] = [
        PhysicalLeg::FrontLeft,
        PhysicalLeg::FrontRight,
        PhysicalLeg::BackLeft,
        PhysicalLeg::BackRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used in calibration keys and on the command line
    pub fn short_name(self) -> &'static str {
        match self {
            PhysicalLeg::FrontLeft => "fl",
            PhysicalLeg::FrontRight => "fr",
            PhysicalLeg::BackLeft => "bl",
            PhysicalLeg::BackRight => "br",
        }
    }
}

impl fmt::Display for PhysicalLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalLeg::FrontLeft => f.write_str("front left"),
            PhysicalLeg::FrontRight => f.write_str("front right"),
            PhysicalLeg::BackLeft => f.write_str("back left"),
            PhysicalLeg::BackRight => f.write_str("back right"),
        }
    }
}

/// Hip (top) or knee (bottom)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Joint {
    Top = 0,
    Bottom = 1,
}

impl Joint {
    pub const ALL: [Joint; 2] = [Joint::Top, Joint::Bottom];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Joint::Top => "top",
            Joint::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Logical leg address: a single leg or a group of legs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegId {
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
    Front,
    Back,
    Left,
    Right,
    All,
}

impl LegId {
    pub const ALL: [LegId; 9] = [
        LegId::FrontLeft,
        LegId::FrontRight,
        LegId::BackLeft,
        LegId::BackRight,
        LegId::Front,
        LegId::Back,
        LegId::Left,
        LegId::Right,
        LegId::All,
    ];

    /// Physical legs addressed by this identifier, in dispatch order
    pub fn legs(self) -> &'static [PhysicalLeg] {
        use PhysicalLeg::*;
        match self {
            LegId::FrontLeft => &[FrontLeft],
            LegId::FrontRight => &[FrontRight],
            LegId::BackLeft => &[BackLeft],
            LegId::BackRight => &[BackRight],
            LegId::Front => &[FrontLeft, FrontRight],
            LegId::Back => &[BackLeft, BackRight],
            LegId::Left => &[FrontLeft, BackLeft],
            LegId::Right => &[FrontRight, BackRight],
            LegId::All => &[FrontLeft, FrontRight, BackLeft, BackRight],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LegId::FrontLeft => "fl",
            LegId::FrontRight => "fr",
            LegId::BackLeft => "bl",
            LegId::BackRight => "br",
            LegId::Front => "f",
            LegId::Back => "b",
            LegId::Left => "l",
            LegId::Right => "r",
            LegId::All => "all",
        }
    }
}

impl From<PhysicalLeg> for LegId {
    fn from(leg: PhysicalLeg) -> Self {
        match leg {
            PhysicalLeg::FrontLeft => LegId::FrontLeft,
            PhysicalLeg::FrontRight => LegId::FrontRight,
            PhysicalLeg::BackLeft => LegId::BackLeft,
            PhysicalLeg::BackRight => LegId::BackRight,
        }
    }
}

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LegId {
    type Err = RobotError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        let id = match normalized.as_str() {
            "fl" | "frontleft" => LegId::FrontLeft,
            "fr" | "frontright" => LegId::FrontRight,
            "bl" | "backleft" => LegId::BackLeft,
            "br" | "backright" => LegId::BackRight,
            "f" | "front" => LegId::Front,
            "b" | "back" => LegId::Back,
            "l" | "left" => LegId::Left,
            "r" | "right" => LegId::Right,
            "all" => LegId::All,
            _ => return Err(RobotError::InvalidLegId(s.to_string())),
        };
        Ok(id)
    }
}

/// Servo channels driving one leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorPair {
    pub top: u8,
    pub bottom: u8,
    /// Horns face the other way, so angles are sent as 180 - θ
    pub mirrored: bool,
}

impl ActuatorPair {
    pub const fn new(top: u8, bottom: u8, mirrored: bool) -> Self {
        Self {
            top,
            bottom,
            mirrored,
        }
    }

    pub fn channel(&self, joint: Joint) -> u8 {
        match joint {
            Joint::Top => self.top,
            Joint::Bottom => self.bottom,
        }
    }
}

/// A physical leg together with the actuators behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLeg {
    pub leg: PhysicalLeg,
    pub pair: ActuatorPair,
}

/// Fixed wiring table, built once at startup
#[derive(Debug, Clone)]
pub struct ActuatorMap {
    pairs: [ActuatorPair; 4],
    by_channel: HashMap<u8, (PhysicalLeg, Joint)>,
}

impl ActuatorMap {
    /// Build the map from pairs indexed by `PhysicalLeg`. Fails if a channel is used twice.
    pub fn new(pairs: [ActuatorPair; 4]) -> Result<Self> {
        let mut by_channel = HashMap::with_capacity(8);
        for leg in PhysicalLeg::ALL {
            for joint in Joint::ALL {
                let channel = pairs[leg.index()].channel(joint);
                if by_channel.insert(channel, (leg, joint)).is_some() {
                    return Err(RobotError::InvalidActuatorMap { channel });
                }
            }
        }
        Ok(Self { pairs, by_channel })
    }

    pub fn pair(&self, leg: PhysicalLeg) -> ActuatorPair {
        self.pairs[leg.index()]
    }

    pub fn resolve(&self, id: LegId) -> Vec<ResolvedLeg> {
        id.legs()
            .iter()
            .map(|&leg| ResolvedLeg {
                leg,
                pair: self.pair(leg),
            })
            .collect()
    }

    /// Reverse lookup: which joint a channel drives
    pub fn locate(&self, channel: u8) -> Option<(PhysicalLeg, Joint)> {
        self.by_channel.get(&channel).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LEG_WIRING;

    #[test]
    fn test_resolve_non_empty_and_unique() {
        let map = ActuatorMap::new(LEG_WIRING).unwrap();
        for id in LegId::ALL {
            let resolved = map.resolve(id);
            assert!(!resolved.is_empty(), "{} resolved to nothing", id);

            let mut legs: Vec<PhysicalLeg> = resolved.iter().map(|r| r.leg).collect();
            legs.sort();
            legs.dedup();
            assert_eq!(legs.len(), resolved.len(), "{} has duplicate legs", id);
        }
    }

    #[test]
    fn test_resolve_all_order() {
        let map = ActuatorMap::new(LEG_WIRING).unwrap();
        let legs: Vec<PhysicalLeg> = map.resolve(LegId::All).iter().map(|r| r.leg).collect();
        assert_eq!(legs, PhysicalLeg::ALL.to_vec());
    }

    #[test]
    fn test_group_sizes() {
        assert_eq!(LegId::FrontLeft.legs().len(), 1);
        assert_eq!(LegId::Front.legs(), &[PhysicalLeg::FrontLeft, PhysicalLeg::FrontRight]);
        assert_eq!(LegId::Back.legs(), &[PhysicalLeg::BackLeft, PhysicalLeg::BackRight]);
        assert_eq!(LegId::Left.legs(), &[PhysicalLeg::FrontLeft, PhysicalLeg::BackLeft]);
        assert_eq!(LegId::Right.legs(), &[PhysicalLeg::FrontRight, PhysicalLeg::BackRight]);
    }

    #[test]
    fn test_default_wiring() {
        let map = ActuatorMap::new(LEG_WIRING).unwrap();

        // Right-hand legs are mirrored, left-hand legs are not
        assert!(!map.pair(PhysicalLeg::FrontLeft).mirrored);
        assert!(map.pair(PhysicalLeg::FrontRight).mirrored);
        assert!(!map.pair(PhysicalLeg::BackLeft).mirrored);
        assert!(map.pair(PhysicalLeg::BackRight).mirrored);

        assert_eq!(map.locate(0), Some((PhysicalLeg::FrontLeft, Joint::Top)));
        assert_eq!(map.locate(6), Some((PhysicalLeg::BackRight, Joint::Bottom)));
        assert_eq!(map.locate(12), None);
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut wiring = LEG_WIRING;
        wiring[3] = ActuatorPair::new(2, 4, true); // bottom collides with front left
        match ActuatorMap::new(wiring) {
            Err(RobotError::InvalidActuatorMap { channel }) => assert_eq!(channel, 4),
            other => panic!("expected InvalidActuatorMap, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_leg_id() {
        assert_eq!("fl".parse::<LegId>().unwrap(), LegId::FrontLeft);
        assert_eq!("Front-Right".parse::<LegId>().unwrap(), LegId::FrontRight);
        assert_eq!("back_left".parse::<LegId>().unwrap(), LegId::BackLeft);
        assert_eq!("ALL".parse::<LegId>().unwrap(), LegId::All);
        for id in LegId::ALL {
            assert_eq!(id.name().parse::<LegId>().unwrap(), id);
        }
    }

    #[test]
    fn test_parse_unknown_leg_id() {
        match "middle".parse::<LegId>() {
            Err(RobotError::InvalidLegId(name)) => assert_eq!(name, "middle"),
            other => panic!("expected InvalidLegId, got {:?}", other),
        }
    }
}
