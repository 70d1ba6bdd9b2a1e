//! Assembly of two drawings at their attachment points.
//!
//! An attachment point is a placeholder atom with exactly one bond. Joining removes one
//! placeholder from each molecule, rotates the second drawing in the plane so that its anchor
//! bond points back at the first, and bonds the two anchors. Depth hints and wedge markers
//! travel with their atoms; an in-plane rotation never inverts a drawn centre.

use crate::model::Error;
use crate::model::atom::Atom;
use crate::model::bond::Bond;
use crate::model::molecule::Molecule;
use crate::model::types::{BondOrder, Point2};
use nalgebra::{Rotation2, Vector2};

/// Joins `first` and `second` by a single bond between `anchor1` and `anchor2`, removing the
/// attachment atoms `point1` and `point2`.
///
/// # Arguments
///
/// * `first`, `second` - Molecules without conformers.
/// * `anchor1`, `point1` - Bonded atom pair of `first`; `point1` is removed.
/// * `anchor2`, `point2` - Bonded atom pair of `second`; `point2` is removed.
/// * `distance` - Drawing distance between the anchors in the result. Defaults to the drawn
///   length of the `anchor1`-`point1` bond, so `anchor2` lands where `point1` was.
///
/// # Returns
///
/// A molecule named `<first>_<second>`. Atoms of `first` keep their identifiers; atoms of
/// `second` are shifted past the largest identifier of `first`.
///
/// # Errors
///
/// Returns [`Error::InvalidStructure`] when either molecule has conformers, an atom is
/// missing, an attachment atom does not have exactly one bond to its anchor, or the first
/// anchor bond has zero drawn length.
pub fn join(
    first: &Molecule,
    second: &Molecule,
    (anchor1, point1): (u32, u32),
    (anchor2, point2): (u32, u32),
    distance: Option<f64>,
) -> Result<Molecule, Error> {
    let name = format!("{}_{}", first.name(), second.name());
    if !first.conformers().is_empty() || !second.conformers().is_empty() {
        return Err(Error::invalid_structure(
            name,
            "molecules with conformers cannot be joined",
        ));
    }
    let (a11, a12) = anchor_pair(first, anchor1, point1, &name)?;
    let (a21, a22) = anchor_pair(second, anchor2, point2, &name)?;

    let v1 = a12.planar() - a11.planar();
    let v1_len = v1.norm();
    if v1_len == 0.0 {
        return Err(Error::invalid_structure(
            name,
            format!("attachment bond {}-{} has zero length", anchor1, point1),
        ));
    }
    let v2: Vector2<f64> = a22.planar() - a21.planar();
    let rotation = Rotation2::rotation_between(&v2, &-v1);
    let target = a11.planar() + v1 * (distance.unwrap_or(v1_len) / v1_len);
    let origin = a21.planar();

    let shift = first.atoms().iter().map(|a| a.id).max().unwrap_or(0);
    let renumber = |id: u32| {
        id.checked_add(shift).ok_or_else(|| {
            Error::invalid_structure(name.clone(), format!("atom id {} overflows", id))
        })
    };

    let mut atoms: Vec<Atom> = first
        .atoms()
        .iter()
        .filter(|a| a.id != point1)
        .cloned()
        .collect();
    for atom in second.atoms().iter().filter(|a| a.id != point2) {
        let placed: Point2 = target + rotation * (atom.planar() - origin);
        atoms.push(Atom {
            id: renumber(atom.id)?,
            x: placed.x,
            y: placed.y,
            ..atom.clone()
        });
    }

    let mut bonds: Vec<Bond> = first
        .bonds()
        .iter()
        .filter(|b| !b.contains(point1))
        .copied()
        .collect();
    for bond in second.bonds().iter().filter(|b| !b.contains(point2)) {
        bonds.push(Bond {
            begin: renumber(bond.begin)?,
            end: renumber(bond.end)?,
            ..*bond
        });
    }
    bonds.push(Bond::new(anchor1, renumber(anchor2)?, BondOrder::Single));

    tracing::debug!(
        molecule = %name,
        atoms = atoms.len(),
        bonds = bonds.len(),
        "joined molecules at attachment points"
    );
    Molecule::new(&name, atoms, bonds)
}

/// Joins two molecules at the attachment points labelled `label1` and `label2`.
///
/// Each label must name exactly one atom, and that atom must have exactly one bond; its
/// neighbour becomes the anchor. See [`join`] for placement and numbering.
pub fn join_at(
    first: &Molecule,
    second: &Molecule,
    label1: &str,
    label2: &str,
    distance: Option<f64>,
) -> Result<Molecule, Error> {
    let name = format!("{}_{}", first.name(), second.name());
    let pair1 = labelled_pair(first, label1, &name)?;
    let pair2 = labelled_pair(second, label2, &name)?;
    join(first, second, pair1, pair2, distance)
}

fn anchor_pair<'a>(
    mol: &'a Molecule,
    anchor: u32,
    point: u32,
    name: &str,
) -> Result<(&'a Atom, &'a Atom), Error> {
    let find = |id: u32| {
        mol.atom(id).ok_or_else(|| {
            Error::invalid_structure(name, format!("no atom {} in '{}'", id, mol.name()))
        })
    };
    let (a, p) = (find(anchor)?, find(point)?);
    if mol.degree(point) != 1 || mol.bond_between(anchor, point).is_none() {
        return Err(Error::invalid_structure(
            name,
            format!(
                "attachment atom {} of '{}' must have a single bond to atom {}, found {} bonds",
                point,
                mol.name(),
                anchor,
                mol.degree(point)
            ),
        ));
    }
    Ok((a, p))
}

fn labelled_pair(mol: &Molecule, label: &str, name: &str) -> Result<(u32, u32), Error> {
    let mut points = mol
        .atoms()
        .iter()
        .filter(|a| a.attachment.as_deref() == Some(label));
    let point = match (points.next(), points.next()) {
        (Some(point), None) => point.id,
        (None, _) => {
            return Err(Error::invalid_structure(
                name,
                format!("'{}' has no attachment point '{}'", mol.name(), label),
            ));
        }
        (Some(_), Some(_)) => {
            return Err(Error::invalid_structure(
                name,
                format!("'{}' has more than one attachment point '{}'", mol.name(), label),
            ));
        }
    };
    let mut neighbors = mol.neighbors(point);
    match (neighbors.next(), neighbors.next()) {
        (Some(anchor), None) => Ok((anchor, point)),
        _ => Err(Error::invalid_structure(
            name,
            format!(
                "attachment point '{}' of '{}' must have exactly one bond, found {}",
                label,
                mol.name(),
                mol.degree(point)
            ),
        )),
    }
}
