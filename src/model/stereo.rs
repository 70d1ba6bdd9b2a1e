//! Result types produced by stereochemistry assignment.
//!
//! Stereo descriptors are derived data: they are recomputed from a molecule and a ranking on
//! demand and never stored on the molecule itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved stereo label of a centre or double bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parity {
    R,
    S,
    Cis,
    Trans,
    Unknown,
}

impl Parity {
    pub fn is_defined(&self) -> bool {
        !matches!(self, Parity::Unknown)
    }

    /// Opposite label for mirror images; `Cis`/`Trans` and `Unknown` are unaffected.
    pub fn inverted(&self) -> Parity {
        match self {
            Parity::R => Parity::S,
            Parity::S => Parity::R,
            other => *other,
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Parity::R => "R",
            Parity::S => "S",
            Parity::Cis => "cis",
            Parity::Trans => "trans",
            Parity::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// How much of the geometric evidence was explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    /// Every involved atom carried a depth hint, or the double-bond geometry is planar data.
    Full,
    /// The label rests on wedge markers or on a partial set of depth hints.
    Reduced,
}

/// Reason a site was left [`Parity::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StereoFlag {
    /// The two highest-priority substituents tie after ranking.
    AmbiguousPriority,
    /// Two lower-priority substituents tie after ranking.
    TiedSubstituents,
    /// Depth hints and wedge markers imply opposite handedness.
    HintWedgeConflict,
    /// No out-of-plane signal, or the geometry is degenerate.
    MissingGeometry,
}

impl fmt::Display for StereoFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StereoFlag::AmbiguousPriority => "ambiguous_priority",
            StereoFlag::TiedSubstituents => "tied_substituents",
            StereoFlag::HintWedgeConflict => "hint_wedge_conflict",
            StereoFlag::MissingGeometry => "missing_geometry",
        };
        f.write_str(label)
    }
}

/// Tetrahedral stereocentre candidate and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoCenter {
    pub atom: u32,
    pub parity: Parity,
    pub confidence: Confidence,
    pub flag: Option<StereoFlag>,
    /// Explicit neighbours in descending priority. An implicit hydrogen or lone pair is not
    /// listed.
    pub substituents: Vec<u32>,
}

/// Double-bond stereo candidate and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StereoBond {
    pub begin: u32,
    pub end: u32,
    pub parity: Parity,
    pub flag: Option<StereoFlag>,
    /// Highest-priority substituent on each end, when resolvable.
    pub reference: Option<(u32, u32)>,
}

/// Location of a stereo site within a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StereoSite {
    Atom(u32),
    Bond(u32, u32),
}

impl fmt::Display for StereoSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StereoSite::Atom(id) => write!(f, "atom {}", id),
            StereoSite::Bond(a, b) => write!(f, "bond {}={}", a, b),
        }
    }
}

/// Non-fatal advisory: a candidate site was left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmbiguousStereo {
    pub site: StereoSite,
    pub flag: StereoFlag,
}

impl fmt::Display for AmbiguousStereo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} left unknown ({})", self.site, self.flag)
    }
}

/// Stereo assignment for a whole molecule.
///
/// Centres are listed in atom-slot order and bonds in bond order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StereoReport {
    pub centers: Vec<StereoCenter>,
    pub bonds: Vec<StereoBond>,
}

impl StereoReport {
    pub fn center(&self, atom: u32) -> Option<&StereoCenter> {
        self.centers.iter().find(|c| c.atom == atom)
    }

    /// Looks up a double bond regardless of endpoint order.
    pub fn bond(&self, a: u32, b: u32) -> Option<&StereoBond> {
        self.bonds
            .iter()
            .find(|s| (s.begin == a && s.end == b) || (s.begin == b && s.end == a))
    }

    /// Every unresolved site with its reason.
    pub fn ambiguities(&self) -> Vec<AmbiguousStereo> {
        let centers = self.centers.iter().filter_map(|c| {
            c.flag.map(|flag| AmbiguousStereo {
                site: StereoSite::Atom(c.atom),
                flag,
            })
        });
        let bonds = self.bonds.iter().filter_map(|b| {
            b.flag.map(|flag| AmbiguousStereo {
                site: StereoSite::Bond(b.begin, b.end),
                flag,
            })
        });
        centers.chain(bonds).collect()
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.centers.iter().all(|c| c.parity.is_defined())
            && self.bonds.iter().all(|b| b.parity.is_defined())
    }
}
