//! Drawing-level atom representation: identity, chemistry, 2-D placement, and depth hint.
//!
//! Atoms are instantiated by the structure-drawing reader and then frozen inside a
//! [`Molecule`](super::molecule::Molecule). Planar coordinates come straight from the
//! drawing; the optional depth hint is the only third-dimension information a drawing
//! carries besides wedge markers on bonds.

use super::types::{Element, Point, Point2};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Atom as placed in a structure drawing.
///
/// `id` is the identifier used by the source document and by bonds; it is unique within one
/// molecule but carries no ordering meaning. The slot order of atoms inside a molecule is the
/// order in which they were added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Identifier unique within the owning molecule.
    pub id: u32,
    /// Chemical element.
    pub element: Element,
    /// Horizontal drawing coordinate.
    pub x: f64,
    /// Vertical drawing coordinate.
    pub y: f64,
    /// Out-of-plane hint; `None` when the drawing does not provide one.
    pub depth: Option<f64>,
    /// Formal charge.
    pub charge: i8,
    /// Mass number, `0` for natural abundance.
    pub isotope: u16,
    /// Label of an attachment point. Such atoms are placeholders that
    /// [`join`](crate::ops::join) replaces by a bond.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<SmolStr>,
}

impl Atom {
    /// Creates a neutral, natural-abundance atom without a depth hint.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier unique within the molecule being assembled.
    /// * `element` - Chemical identity.
    /// * `x` - Horizontal drawing coordinate.
    /// * `y` - Vertical drawing coordinate.
    ///
    /// # Returns
    ///
    /// A new `Atom`; use the `with_*` builders to attach charge, isotope, or depth.
    pub fn new(id: u32, element: Element, x: f64, y: f64) -> Self {
        Self {
            id,
            element,
            x,
            y,
            depth: None,
            charge: 0,
            isotope: 0,
            attachment: None,
        }
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_isotope(mut self, isotope: u16) -> Self {
        self.isotope = isotope;
        self
    }

    pub fn with_attachment(mut self, label: &str) -> Self {
        self.attachment = Some(SmolStr::new(label));
        self
    }

    pub fn is_attachment_point(&self) -> bool {
        self.attachment.is_some()
    }

    /// Reports whether the drawing omitted the depth hint for this atom.
    pub fn hint_absent(&self) -> bool {
        self.depth.is_none()
    }

    /// Planar position of the atom.
    pub fn planar(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }

    /// Position lifted into three dimensions using the depth hint or the supplied fallback.
    ///
    /// # Arguments
    ///
    /// * `fallback_z` - Depth used when no hint is present.
    ///
    /// # Returns
    ///
    /// A [`Point`] with the drawing coordinates and the resolved depth.
    pub fn lifted(&self, fallback_z: f64) -> Point {
        Point::new(self.x, self.y, self.depth.unwrap_or(fallback_z))
    }

    /// Planar distance to another atom in drawing units.
    pub fn planar_distance(&self, other: &Atom) -> f64 {
        nalgebra::distance(&self.planar(), &other.planar())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Atom {{ id: {}, element: {}, pos: [{:.3}, {:.3}]",
            self.id, self.element, self.x, self.y
        )?;
        if let Some(depth) = self.depth {
            write!(f, ", depth: {:.3}", depth)?;
        }
        if self.charge != 0 {
            write!(f, ", charge: {}", self.charge)?;
        }
        if self.isotope != 0 {
            write!(f, ", isotope: {}", self.isotope)?;
        }
        if let Some(label) = &self.attachment {
            write!(f, ", attachment: {}", label)?;
        }
        write!(f, " }}")
    }
}
