// Per-joint calibration offsets and their JSON persistence
//
// File format is a flat object, one signed degree offset per joint:
//   { "bl_bottom": 0, "bl_top": -3, ..., "fr_top": 4 }
// Loading never fails: a missing or unreadable file means zero offsets.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, RobotError};
use crate::legs::{Joint, PhysicalLeg};

/// Order joints are calibrated and listed in
pub const JOINT_ORDER: [(PhysicalLeg, Joint); 8] = [
    (PhysicalLeg::FrontLeft, Joint::Top),
    (PhysicalLeg::FrontLeft, Joint::Bottom),
    (PhysicalLeg::FrontRight, Joint::Top),
    (PhysicalLeg::FrontRight, Joint::Bottom),
    (PhysicalLeg::BackLeft, Joint::Top),
    (PhysicalLeg::BackLeft, Joint::Bottom),
    (PhysicalLeg::BackRight, Joint::Top),
    (PhysicalLeg::BackRight, Joint::Bottom),
];

/// File key for a joint, e.g. `fl_top`
pub fn offset_key(leg: PhysicalLeg, joint: Joint) -> &'static str {
    match (leg, joint) {
        (PhysicalLeg::FrontLeft, Joint::Top) => "fl_top",
        (PhysicalLeg::FrontLeft, Joint::Bottom) => "fl_bottom",
        (PhysicalLeg::FrontRight, Joint::Top) => "fr_top",
        (PhysicalLeg::FrontRight, Joint::Bottom) => "fr_bottom",
        (PhysicalLeg::BackLeft, Joint::Top) => "bl_top",
        (PhysicalLeg::BackLeft, Joint::Bottom) => "bl_bottom",
        (PhysicalLeg::BackRight, Joint::Top) => "br_top",
        (PhysicalLeg::BackRight, Joint::Bottom) => "br_bottom",
    }
}

/// Inverse of [`offset_key`]
pub fn parse_offset_key(key: &str) -> Option<(PhysicalLeg, Joint)> {
    JOINT_ORDER
        .iter()
        .copied()
        .find(|&(leg, joint)| offset_key(leg, joint) == key)
}

/// Offset table in degrees, indexed by leg then joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Offsets([[i32; 2]; 4]);

impl Offsets {
    pub fn get(&self, leg: PhysicalLeg, joint: Joint) -> i32 {
        self.0[leg.index()][joint.index()]
    }

    pub fn set(&mut self, leg: PhysicalLeg, joint: Joint, offset: i32) {
        self.0[leg.index()][joint.index()] = offset;
    }

    /// All eight entries in calibration order
    pub fn entries(&self) -> impl Iterator<Item = (PhysicalLeg, Joint, i32)> + '_ {
        JOINT_ORDER
            .iter()
            .map(move |&(leg, joint)| (leg, joint, self.get(leg, joint)))
    }

    fn to_document(self) -> CalibrationDocument {
        CalibrationDocument(
            self.entries()
                .map(|(leg, joint, offset)| (offset_key(leg, joint).to_string(), offset))
                .collect(),
        )
    }
}

/// On-disk form, keys sorted
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct CalibrationDocument(BTreeMap<String, i32>);

/// Offsets in use plus the file they came from
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
    offsets: Offsets,
}

impl CalibrationStore {
    /// Wrap an offset table without touching the file system
    pub fn with_offsets(path: impl Into<PathBuf>, offsets: Offsets) -> Self {
        Self {
            path: path.into(),
            offsets,
        }
    }

    /// Load offsets from `path`, falling back to zeros on any problem
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offsets = read_offsets(&path);
        Self { path, offsets }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    pub fn offset(&self, leg: PhysicalLeg, joint: Joint) -> i32 {
        self.offsets.get(leg, joint)
    }

    /// Write a complete offset table to disk and start using it
    ///
    /// On failure the in-memory table is left as it was.
    pub(crate) fn persist(&mut self, offsets: Offsets) -> Result<()> {
        write_offsets(&self.path, &offsets)?;
        self.offsets = offsets;
        info!("Saved calibration to {}", self.path.display());
        Ok(())
    }
}

fn read_offsets(path: &Path) -> Offsets {
    let mut offsets = Offsets::default();

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "No calibration file at {}, using zero offsets",
                path.display()
            );
            return offsets;
        }
        Err(e) => {
            warn!(
                "Could not read calibration file {}: {}, using zero offsets",
                path.display(),
                e
            );
            return offsets;
        }
    };

    let document: CalibrationDocument = match serde_json::from_str(&contents) {
        Ok(document) => document,
        Err(e) => {
            warn!(
                "Malformed calibration file {}: {}, using zero offsets",
                path.display(),
                e
            );
            return offsets;
        }
    };

    let mut found = 0;
    for (key, offset) in &document.0 {
        match parse_offset_key(key) {
            Some((leg, joint)) => {
                offsets.set(leg, joint, *offset);
                found += 1;
            }
            None => warn!("Ignoring unknown calibration key {:?}", key),
        }
    }

    if found < JOINT_ORDER.len() {
        warn!(
            "Calibration file {} has {} of {} joints, missing ones default to 0",
            path.display(),
            found,
            JOINT_ORDER.len()
        );
    } else {
        debug!("Loaded calibration from {}", path.display());
    }

    offsets
}

/// Write via a sibling temp file so readers never see a half-written document
fn write_offsets(path: &Path, offsets: &Offsets) -> Result<()> {
    let persistence = |source: std::io::Error| RobotError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(&offsets.to_document())
        .map_err(|e| persistence(e.into()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json + "\n").map_err(persistence)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        persistence(e)
    })
}
