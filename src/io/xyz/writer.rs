use crate::io::error::Error;
use crate::model::{conformer::Conformer, molecule::Molecule};
use std::io::Write;

/// Writes one XYZ frame for a conformer of `mol`.
///
/// The comment line defaults to the molecule name. Newlines in the comment are replaced by
/// spaces so the frame stays well-formed.
///
/// # Errors
///
/// Returns [`Error::InconsistentData`] when the conformer length differs from the atom count,
/// and [`Error::Io`] on write failures.
pub fn write_conformer<W: Write>(
    mut writer: W,
    mol: &Molecule,
    conformer: &Conformer,
    comment: Option<&str>,
) -> Result<(), Error> {
    if conformer.len() != mol.atom_count() {
        return Err(Error::inconsistent_data(
            "XYZ",
            None,
            format!(
                "conformer has {} coordinates but molecule '{}' has {} atoms",
                conformer.len(),
                mol.name(),
                mol.atom_count()
            ),
        ));
    }

    let io_err = |e| Error::from_io(e, None);
    let comment = comment.unwrap_or(mol.name()).replace(['\n', '\r'], " ");

    writeln!(writer, "{}", mol.atom_count()).map_err(io_err)?;
    writeln!(writer, "{}", comment).map_err(io_err)?;
    for (atom, point) in mol.atoms().iter().zip(&conformer.coords) {
        writeln!(
            writer,
            "{:<3}{:>18.10}{:>18.10}{:>18.10}",
            atom.element.symbol(),
            point.x,
            point.y,
            point.z
        )
        .map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(())
}
