use super::{DUMMY, SUBSTRUCTURE};
use crate::io::error::Error;
use crate::model::{
    atom::Atom,
    bond::Bond,
    conformer::Conformer,
    molecule::Molecule,
    types::{BondOrder, Element, Point},
};
use std::collections::HashSet;
use std::io::BufRead;

const FORMAT: &str = "MOL2";

/// Provenance of conformers read from MOL2 coordinates.
pub const MOL2_PROVENANCE: &str = "mol2";

/// Reads the single molecule of a MOL2 stream.
///
/// Atoms keep their MOL2 ids and take `x`/`y` as drawing coordinates and `z` as depth hint.
/// The same coordinates are appended as one conformer with provenance `mol2`. Partial charges
/// are ignored.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed records or a second `MOLECULE` section, and
/// [`Error::InconsistentData`] when the declared counts differ from the records or a bond
/// references an unknown atom.
pub fn read<R: BufRead>(reader: R) -> Result<Molecule, Error> {
    let mut section = Section::None;
    let mut molecule_lines_seen = 0usize;

    let mut name: Option<String> = None;
    let mut expected_atoms: Option<usize> = None;
    let mut expected_bonds: Option<usize> = None;

    let mut atoms: Vec<Atom> = Vec::new();
    let mut coords: Vec<Point> = Vec::new();
    let mut ids: HashSet<u32> = HashSet::new();
    let mut bonds: Vec<Bond> = Vec::new();

    for (idx, line_res) in reader.lines().enumerate() {
        let line = line_res.map_err(|e| Error::from_io(e, None))?;
        let line_number = idx + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix("@<TRIPOS>") {
            section = match header {
                "MOLECULE" => {
                    if name.is_some() {
                        return Err(Error::parse(
                            FORMAT,
                            None,
                            line_number,
                            "only one molecule per MOL2 stream is supported",
                        ));
                    }
                    molecule_lines_seen = 0;
                    Section::Molecule
                }
                "ATOM" => Section::Atom,
                "BOND" => Section::Bond,
                _ => Section::None,
            };
            continue;
        }

        match section {
            Section::Molecule => {
                molecule_lines_seen += 1;
                match molecule_lines_seen {
                    1 => {
                        if trimmed == "****" {
                            return Err(Error::parse(
                                FORMAT,
                                None,
                                line_number,
                                "MOL2 molecule name must not be empty",
                            ));
                        }
                        name = Some(trimmed.to_string());
                    }
                    2 => {
                        let (atoms, bonds) = parse_expected_counts(trimmed, line_number)?;
                        expected_atoms = Some(atoms);
                        expected_bonds = Some(bonds);
                    }
                    _ => {}
                }
            }
            Section::Atom => {
                let (atom, point) = parse_atom(trimmed, line_number)?;
                if !ids.insert(atom.id) {
                    return Err(Error::parse(
                        FORMAT,
                        None,
                        line_number,
                        format!("Duplicate atom id {}", atom.id),
                    ));
                }
                atoms.push(atom);
                coords.push(point);
            }
            Section::Bond => {
                let tokens: Vec<&str> = trimmed.split_whitespace().collect();
                if tokens.len() < 4 {
                    return Err(Error::parse(
                        FORMAT,
                        None,
                        line_number,
                        "BOND record must include id, endpoints, and bond type",
                    ));
                }

                let origin = tokens[1].parse::<u32>().map_err(|_| {
                    Error::parse(FORMAT, None, line_number, "Invalid origin atom id")
                })?;
                let target = tokens[2].parse::<u32>().map_err(|_| {
                    Error::parse(FORMAT, None, line_number, "Invalid target atom id")
                })?;
                if origin == 0 || target == 0 {
                    return Err(Error::parse(
                        FORMAT,
                        None,
                        line_number,
                        "Bond endpoints must reference positive atom ids",
                    ));
                }
                let order = parse_bond_order_token(tokens[3], line_number)?;
                bonds.push(Bond::new(origin, target, order));
            }
            Section::None => {}
        }
    }

    let name = name.ok_or_else(|| {
        Error::parse(
            FORMAT,
            None,
            0,
            "Missing @<TRIPOS>MOLECULE section with molecule name",
        )
    })?;

    if atoms.is_empty() {
        return Err(Error::parse(
            FORMAT,
            None,
            0,
            "Missing or empty @<TRIPOS>ATOM section",
        ));
    }

    if let Some(expected) = expected_atoms
        && expected != atoms.len()
    {
        return Err(Error::inconsistent_data(
            FORMAT,
            None,
            format!("Declared {expected} atoms but parsed {}", atoms.len()),
        ));
    }

    if let Some(expected) = expected_bonds
        && expected != bonds.len()
    {
        return Err(Error::inconsistent_data(
            FORMAT,
            None,
            format!("Declared {expected} bonds but parsed {}", bonds.len()),
        ));
    }

    let mut molecule = Molecule::new(&name, atoms, bonds)
        .map_err(|e| Error::inconsistent_data(FORMAT, None, e.to_string()))?;
    molecule
        .append_conformer(Conformer::new(coords, None, MOL2_PROVENANCE))
        .map_err(|e| Error::inconsistent_data(FORMAT, None, e.to_string()))?;

    tracing::debug!(
        molecule = %name,
        atoms = molecule.atom_count(),
        bonds = molecule.bond_count(),
        "read MOL2 molecule"
    );
    Ok(molecule)
}

enum Section {
    None,
    Molecule,
    Atom,
    Bond,
}

fn parse_atom(line: &str, line_number: usize) -> Result<(Atom, Point), Error> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 6 {
        return Err(Error::parse(
            FORMAT,
            None,
            line_number,
            "ATOM record must include id, name, coordinates, and atom type",
        ));
    }
    let id = tokens[0]
        .parse::<u32>()
        .map_err(|_| Error::parse(FORMAT, None, line_number, "Invalid atom id"))?;
    if id == 0 {
        return Err(Error::parse(
            FORMAT,
            None,
            line_number,
            "Atom id must be positive",
        ));
    }

    let mut xyz = [0.0f64; 3];
    for (slot, token) in xyz.iter_mut().zip(&tokens[2..5]) {
        *slot = token.parse().map_err(|_| {
            Error::parse(
                FORMAT,
                None,
                line_number,
                format!("Invalid coordinate '{token}'"),
            )
        })?;
    }
    let [x, y, z] = xyz;

    let atom_name = tokens[1];
    let atom_type = tokens[5];
    let symbol = atom_type.split('.').next().unwrap_or(atom_type);
    let element = if symbol.eq_ignore_ascii_case(DUMMY) {
        Element::UNKNOWN
    } else {
        Element::from_symbol(symbol).ok_or_else(|| {
            Error::parse(
                FORMAT,
                None,
                line_number,
                format!("Unknown element in atom type '{atom_type}'"),
            )
        })?
    };

    let mut atom = Atom::new(id, element, x, y).with_depth(z);
    let substructure = tokens.get(7).copied().unwrap_or(SUBSTRUCTURE);
    if element == Element::UNKNOWN && substructure == atom_name {
        atom = atom.with_attachment(atom_name);
    }
    Ok((atom, Point::new(x, y, z)))
}

fn parse_expected_counts(line: &str, line_number: usize) -> Result<(usize, usize), Error> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(Error::parse(
            FORMAT,
            None,
            line_number,
            "Molecule counts line must specify atom and bond counts",
        ));
    }
    let atoms = fields[0]
        .parse::<usize>()
        .map_err(|_| Error::parse(FORMAT, None, line_number, "Invalid atom count"))?;
    let bonds = fields[1]
        .parse::<usize>()
        .map_err(|_| Error::parse(FORMAT, None, line_number, "Invalid bond count"))?;
    Ok((atoms, bonds))
}

fn parse_bond_order_token(token: &str, line_number: usize) -> Result<BondOrder, Error> {
    match token.to_ascii_lowercase().as_str() {
        "1" | "single" | "am" => Ok(BondOrder::Single),
        "2" | "double" => Ok(BondOrder::Double),
        "3" | "triple" => Ok(BondOrder::Triple),
        "ar" | "aromatic" => Ok(BondOrder::Aromatic),
        other => Err(Error::parse(
            FORMAT,
            None,
            line_number,
            format!("Unsupported bond type '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ACETALDEHYDE: &str = "\
# written by hand
@<TRIPOS>MOLECULE
acetaldehyde
 4 3 0 0 0
SMALL
GASTEIGER

@<TRIPOS>ATOM
     1 C       0.0000     0.0000     0.0000 C.3        1 UNL1 0.0
     2 C       1.5000     0.0000     0.1000 C.2        1 UNL1 0.0
     3 O       2.1000     1.0000     0.0000 O.2        1 UNL1 0.0
     4 A1      2.2000    -1.0000     0.0000 Du         1 A1 0.0
@<TRIPOS>BOND
     1      1      2          1
     2      2      3          2
     3      2      4          1
";

    #[test]
    fn reads_atoms_bonds_and_coordinates() {
        let mol = read(Cursor::new(ACETALDEHYDE)).unwrap();

        assert_eq!(mol.name(), "acetaldehyde");
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(mol.atom(3).unwrap().element, Element::O);
        assert_eq!(mol.atom(2).unwrap().depth, Some(0.1));
        assert_eq!(mol.bond_between(2, 3).unwrap().order, BondOrder::Double);

        let conformer = mol.conformers().get(0).unwrap();
        assert_eq!(conformer.provenance, MOL2_PROVENANCE);
        assert_eq!(conformer.coords[2], Point::new(2.1, 1.0, 0.0));
    }

    #[test]
    fn dummy_atom_named_after_its_substructure_is_an_attachment_point() {
        let mol = read(Cursor::new(ACETALDEHYDE)).unwrap();
        let point = mol.atom(4).unwrap();

        assert_eq!(point.element, Element::UNKNOWN);
        assert_eq!(point.attachment.as_deref(), Some("A1"));
        assert!(!mol.atom(1).unwrap().is_attachment_point());
    }

    #[test]
    fn declared_counts_must_match() {
        let text = ACETALDEHYDE.replace(" 4 3 0 0 0", " 5 3 0 0 0");
        let err = read(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, Error::InconsistentData { .. }));
        assert!(err.to_string().contains("Declared 5 atoms but parsed 4"));
    }

    #[test]
    fn malformed_records_are_rejected_with_their_line() {
        let text = ACETALDEHYDE.replace("C.2 ", "Qq.2");
        match read(Cursor::new(text)).unwrap_err() {
            Error::Parse {
                line_number,
                details,
                ..
            } => {
                assert_eq!(line_number, 10);
                assert!(details.contains("Qq.2"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }

        let text = ACETALDEHYDE.replace("     3      2      4          1", "     3      2      9          1");
        assert!(read(Cursor::new(text)).unwrap_err().to_string().contains("unknown atom id 9"));

        let text = ACETALDEHYDE.replace("          2\n", "         xx\n");
        assert!(read(Cursor::new(text)).unwrap_err().to_string().contains("Unsupported bond type 'xx'"));
    }

    #[test]
    fn second_molecule_section_is_rejected() {
        let text = format!("{ACETALDEHYDE}{ACETALDEHYDE}");
        let err = read(Cursor::new(text)).unwrap_err();
        assert!(err.to_string().contains("only one molecule"));
    }

    #[test]
    fn missing_molecule_section_is_rejected() {
        let err = read(Cursor::new("@<TRIPOS>ATOM\n1 C 0 0 0 C.3\n")).unwrap_err();
        assert!(err.to_string().contains("Missing @<TRIPOS>MOLECULE"));
    }
}
