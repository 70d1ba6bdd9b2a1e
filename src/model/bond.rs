//! Bonds between drawing atoms, addressed by atom identifier.

use super::types::{BondOrder, BondStereo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directed bond record between two atoms of a molecule.
///
/// Unlike purely topological bonds, the endpoint order matters for wedge and hash bonds:
/// `begin` is the narrow end, which is the stereocentre the marker refers to. Equality of
/// atom pairs for duplicate detection is checked with [`Bond::pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bond {
    pub begin: u32,
    pub end: u32,
    pub order: BondOrder,
    pub stereo: BondStereo,
}

impl Bond {
    /// Creates a plain (unmarked) bond.
    ///
    /// # Arguments
    ///
    /// * `begin` - Identifier of the first atom.
    /// * `end` - Identifier of the second atom.
    /// * `order` - Bond multiplicity.
    ///
    /// # Returns
    ///
    /// A `Bond` with [`BondStereo::None`].
    pub fn new(begin: u32, end: u32, order: BondOrder) -> Self {
        Self {
            begin,
            end,
            order,
            stereo: BondStereo::None,
        }
    }

    /// Creates a wedge or hash bond whose narrow end is `narrow`.
    pub fn marked(narrow: u32, wide: u32, order: BondOrder, stereo: BondStereo) -> Self {
        Self {
            begin: narrow,
            end: wide,
            order,
            stereo,
        }
    }

    /// Endpoints sorted ascending, independent of direction.
    pub fn pair(&self) -> (u32, u32) {
        if self.begin <= self.end {
            (self.begin, self.end)
        } else {
            (self.end, self.begin)
        }
    }

    pub fn contains(&self, atom: u32) -> bool {
        self.begin == atom || self.end == atom
    }

    /// Returns the endpoint opposite to `atom`, or `None` if `atom` is not on this bond.
    pub fn other(&self, atom: u32) -> Option<u32> {
        if self.begin == atom {
            Some(self.end)
        } else if self.end == atom {
            Some(self.begin)
        } else {
            None
        }
    }

    pub fn is_self_bond(&self) -> bool {
        self.begin == self.end
    }
}

impl fmt::Display for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bond {{ {} - {}, order: {}, stereo: {} }}",
            self.begin, self.end, self.order, self.stereo
        )
    }
}
