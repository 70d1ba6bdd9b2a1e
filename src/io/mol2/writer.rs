use super::{DUMMY, SUBSTRUCTURE};
use crate::io::error::Error;
use crate::model::{
    conformer::Conformer,
    molecule::Molecule,
    types::{BondOrder, Element, Point},
};
use std::io::Write;

const FORMAT: &str = "MOL2";

/// Writes `mol` as one MOL2 molecule.
///
/// Coordinates come from `conformer` when given, otherwise from the drawing with missing
/// depth hints written as `0`. Atoms are numbered by slot. Attachment points are written as
/// `Du` atoms whose name and substructure name are their label.
///
/// # Errors
///
/// Returns [`Error::InconsistentData`] when the conformer length differs from the atom count
/// or an attachment label is empty or contains whitespace, and [`Error::Io`] on write
/// failures.
pub fn write_molecule<W: Write>(
    mut writer: W,
    mol: &Molecule,
    conformer: Option<&Conformer>,
) -> Result<(), Error> {
    let points: Vec<Point> = match conformer {
        Some(conformer) if conformer.len() != mol.atom_count() => {
            return Err(Error::inconsistent_data(
                FORMAT,
                None,
                format!(
                    "conformer has {} coordinates but molecule '{}' has {} atoms",
                    conformer.len(),
                    mol.name(),
                    mol.atom_count()
                ),
            ));
        }
        Some(conformer) => conformer.coords.clone(),
        None => mol.atoms().iter().map(|a| a.lifted(0.0)).collect(),
    };
    for label in mol.atoms().iter().filter_map(|a| a.attachment.as_deref()) {
        if label.is_empty() || label.contains(char::is_whitespace) {
            return Err(Error::inconsistent_data(
                FORMAT,
                None,
                format!("attachment label '{}' cannot be written as an atom name", label),
            ));
        }
    }

    let io_err = |e| Error::from_io(e, None);
    let name = mol.name().replace(['\n', '\r'], " ");

    write!(
        writer,
        "@<TRIPOS>MOLECULE\n{}\n{} {} 0 0 0\nSMALL\nGASTEIGER\n\n@<TRIPOS>ATOM",
        name,
        mol.atom_count(),
        mol.bond_count()
    )
    .map_err(io_err)?;
    for (slot, (atom, point)) in mol.atoms().iter().zip(&points).enumerate() {
        let (atom_name, atom_type, substructure) = match atom.attachment.as_deref() {
            Some(label) => (label, DUMMY, label),
            None if atom.element == Element::UNKNOWN => (DUMMY, DUMMY, SUBSTRUCTURE),
            None => (atom.element.symbol(), atom.element.symbol(), SUBSTRUCTURE),
        };
        write!(
            writer,
            "\n{:>6} {:<3} {:>10.4} {:>10.4} {:>10.4} {:<10} 1 {} 0.0",
            slot + 1,
            atom_name,
            point.x,
            point.y,
            point.z,
            atom_type,
            substructure
        )
        .map_err(io_err)?;
    }

    write!(writer, "\n@<TRIPOS>BOND").map_err(io_err)?;
    for (index, bond) in mol.bonds().iter().enumerate() {
        let (Some(begin), Some(end)) = (mol.slot_of(bond.begin), mol.slot_of(bond.end)) else {
            continue;
        };
        write!(
            writer,
            "\n{:>6} {:>6} {:>6} {:>10}",
            index + 1,
            begin + 1,
            end + 1,
            bond_type(bond.order)
        )
        .map_err(io_err)?;
    }
    write!(writer, "\n\n").map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    Ok(())
}

fn bond_type(order: BondOrder) -> &'static str {
    match order {
        BondOrder::Single => "1",
        BondOrder::Double => "2",
        BondOrder::Triple => "3",
        BondOrder::Aromatic => "ar",
    }
}
