//! Lifts a 2-D drawing into a first 3-D conformer.
//!
//! The seed keeps the drawn layout, takes depth from hints where present and from wedge/hash
//! markers otherwise, then rescales so that the mean carbon–carbon bond length (or the mean of
//! all bonds, for molecules without one) matches a target and moves the centroid to the
//! origin. The result is a starting geometry for external optimizers, not a refined structure.

use crate::model::conformer::Conformer;
use crate::model::molecule::Molecule;
use crate::model::types::{BondStereo, Element, Point};
use crate::ops::align::centroid;
use crate::ops::stereo::YAxis;
use serde::{Deserialize, Serialize};

/// Provenance tag attached to seeded conformers.
pub const EMBED_PROVENANCE: &str = "embed-2d";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedConfig {
    /// Mean bond length, in ångströms, after rescaling.
    pub target_bond_length: f64,
    /// Translate the centroid to the origin.
    pub center: bool,
    /// Orientation of the drawing's vertical axis, used for wedge depth.
    pub y_axis: YAxis,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            target_bond_length: 1.5,
            center: true,
            y_axis: YAxis::Down,
        }
    }
}

/// Builds a seed conformer from drawing coordinates.
///
/// Atoms with a depth hint keep it. Otherwise the wide end of a wedge or hash bond is placed
/// one drawn bond length in front of or behind its narrow end; all remaining atoms stay in
/// the drawing plane.
///
/// # Arguments
///
/// * `mol` - Molecule whose drawing is lifted.
/// * `config` - Target scale, centring, and axis orientation.
///
/// # Returns
///
/// A [`Conformer`] with one point per atom slot, no energy, and provenance `"embed-2d"`.
pub fn seed_conformer(mol: &Molecule, config: &EmbedConfig) -> Conformer {
    let atoms = mol.atoms();
    let mut coords: Vec<Point> = atoms.iter().map(|a| a.lifted(0.0)).collect();

    let wedge_sign = match config.y_axis {
        YAxis::Down => -1.0,
        YAxis::Up => 1.0,
    };
    for bond in mol.bonds() {
        let direction = match bond.stereo {
            BondStereo::Wedge => wedge_sign,
            BondStereo::Hash => -wedge_sign,
            BondStereo::None => continue,
        };
        let (Some(narrow), Some(wide)) = (mol.slot_of(bond.begin), mol.slot_of(bond.end)) else {
            continue;
        };
        if !atoms[wide].hint_absent() {
            continue;
        }
        let length = atoms[narrow].planar_distance(&atoms[wide]);
        coords[wide].z = coords[narrow].z + direction * length;
    }

    let carbon_bonds: Vec<f64> = mol
        .bonds()
        .iter()
        .filter(|b| {
            mol.atom(b.begin).is_some_and(|a| a.element == Element::C)
                && mol.atom(b.end).is_some_and(|a| a.element == Element::C)
        })
        .filter_map(|b| bond_length(mol, &coords, b.begin, b.end))
        .collect();
    let lengths = if carbon_bonds.is_empty() {
        mol.bonds()
            .iter()
            .filter_map(|b| bond_length(mol, &coords, b.begin, b.end))
            .collect()
    } else {
        carbon_bonds
    };

    if !lengths.is_empty() {
        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        if mean > 0.0 {
            let factor = config.target_bond_length / mean;
            for p in coords.iter_mut() {
                p.coords *= factor;
            }
        }
    }

    if config.center {
        let shift = centroid(&coords);
        for p in coords.iter_mut() {
            *p -= shift;
        }
    }

    tracing::debug!(
        molecule = mol.name(),
        atoms = coords.len(),
        "seeded conformer from drawing"
    );

    Conformer::new(coords, None, EMBED_PROVENANCE)
}

fn bond_length(mol: &Molecule, coords: &[Point], a: u32, b: u32) -> Option<f64> {
    let a = mol.slot_of(a)?;
    let b = mol.slot_of(b)?;
    Some(nalgebra::distance(&coords[a], &coords[b]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::atom::Atom;
    use crate::model::bond::Bond;
    use crate::model::types::BondOrder;

    fn ethanol_drawing() -> Molecule {
        let atoms = vec![
            Atom::new(1, Element::C, 10.0, 10.0),
            Atom::new(2, Element::C, 40.0, 10.0),
            Atom::new(3, Element::O, 40.0, 40.0),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(2, 3, BondOrder::Single),
        ];
        Molecule::new("ethanol", atoms, bonds).unwrap()
    }

    #[test]
    fn seed_rescales_carbon_bonds_and_centres() {
        let mol = ethanol_drawing();
        let conformer = seed_conformer(&mol, &EmbedConfig::default());

        assert_eq!(conformer.len(), 3);
        assert_eq!(conformer.provenance, EMBED_PROVENANCE);
        assert!(conformer.energy.is_none());
        let cc = nalgebra::distance(&conformer.coords[0], &conformer.coords[1]);
        assert!((cc - 1.5).abs() < 1e-12);
        assert!(centroid(&conformer.coords).norm() < 1e-12);
    }

    #[test]
    fn seed_falls_back_to_all_bonds_without_carbon_pairs() {
        let atoms = vec![
            Atom::new(1, Element::O, 0.0, 0.0),
            Atom::new(2, Element::H, 3.0, 0.0),
        ];
        let mol = Molecule::new("oh", atoms, vec![Bond::new(1, 2, BondOrder::Single)]).unwrap();

        let conformer = seed_conformer(&mol, &EmbedConfig::default());

        let d = nalgebra::distance(&conformer.coords[0], &conformer.coords[1]);
        assert!((d - 1.5).abs() < 1e-12);
    }

    #[test]
    fn wedge_and_hint_set_depth() {
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0),
            Atom::new(2, Element::C, 1.0, 0.0),
            Atom::new(3, Element::C, 0.0, 1.0),
            Atom::new(4, Element::C, -1.0, 0.0).with_depth(0.25),
        ];
        let bonds = vec![
            Bond::marked(1, 2, BondOrder::Single, BondStereo::Wedge),
            Bond::marked(1, 3, BondOrder::Single, BondStereo::Hash),
            Bond::marked(1, 4, BondOrder::Single, BondStereo::Wedge),
        ];
        let mol = Molecule::new("wedged", atoms, bonds).unwrap();
        let config = EmbedConfig {
            target_bond_length: 1.0,
            center: false,
            y_axis: YAxis::Down,
        };

        let conformer = seed_conformer(&mol, &config);

        // Wedge toward the viewer is negative depth in a y-down drawing.
        assert!(conformer.coords[1].z < 0.0);
        assert!(conformer.coords[2].z > 0.0);
        // Hinted atoms keep their hint even under a wedge, up to the rescaling factor.
        assert!(conformer.coords[3].z > 0.0);
        assert_eq!(conformer.coords[0].z, 0.0);
    }

    #[test]
    fn seed_conformer_appends_to_its_molecule() {
        let mut mol = ethanol_drawing();
        let conformer = seed_conformer(&mol, &EmbedConfig::default());

        assert_eq!(mol.append_conformer(conformer).unwrap(), 0);
    }
}
