use crate::io::error::Error;
use crate::model::{
    conformer::Conformer,
    molecule::Molecule,
    types::{Element, Point},
};
use std::io::BufRead;

const FORMAT: &str = "XYZ";

/// Upper bound on per-frame preallocation; the declared count is not trusted beyond it.
const PREALLOCATED_ATOMS: usize = 4096;

/// One frame of a (multi-)XYZ file.
#[derive(Debug, Clone, PartialEq)]
pub struct XyzBlock {
    pub comment: String,
    pub elements: Vec<Element>,
    pub coords: Vec<Point>,
}

impl XyzBlock {
    /// Converts the frame into a conformer of `mol`, checking the atom signature.
    ///
    /// # Arguments
    ///
    /// * `mol` - Molecule the coordinates belong to.
    /// * `energy` - Energy to record on the conformer.
    /// * `provenance` - Producer tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InconsistentData`] when the element sequence differs from the
    /// molecule's atoms in slot order.
    pub fn to_conformer(
        &self,
        mol: &Molecule,
        energy: Option<f64>,
        provenance: &str,
    ) -> Result<Conformer, Error> {
        check_signature(mol, &self.elements)?;
        Ok(Conformer::new(self.coords.clone(), energy, provenance))
    }
}

/// Reads every frame of an XYZ stream.
///
/// Blank lines between frames are tolerated. Element columns accept symbols in any case or
/// atomic numbers.
pub fn read<R: BufRead>(reader: R) -> Result<Vec<XyzBlock>, Error> {
    let mut lines = reader.lines().enumerate();
    let mut blocks = Vec::new();

    loop {
        let (count_line, count_text) = match next_nonblank(&mut lines)? {
            Some(entry) => entry,
            None => break,
        };
        let count: usize = count_text.trim().parse().map_err(|_| {
            Error::parse(
                FORMAT,
                None,
                count_line,
                format!("expected atom count, found '{}'", count_text.trim()),
            )
        })?;

        let comment = match lines.next() {
            Some((_, line)) => line.map_err(|e| Error::from_io(e, None))?,
            None => {
                return Err(Error::parse(
                    FORMAT,
                    None,
                    count_line + 1,
                    "missing comment line",
                ));
            }
        };

        let mut elements = Vec::with_capacity(count.min(PREALLOCATED_ATOMS));
        let mut coords = Vec::with_capacity(count.min(PREALLOCATED_ATOMS));
        for expected in 0..count {
            let (index, line) = lines.next().ok_or_else(|| {
                Error::parse(
                    FORMAT,
                    None,
                    count_line + 2 + expected,
                    format!("frame ended after {} of {} atoms", expected, count),
                )
            })?;
            let line = line.map_err(|e| Error::from_io(e, None))?;
            let (element, point) = parse_atom_line(&line, index + 1)?;
            elements.push(element);
            coords.push(point);
        }

        blocks.push(XyzBlock {
            comment: comment.trim_end().to_owned(),
            elements,
            coords,
        });
    }

    Ok(blocks)
}

/// Reads a stream that must contain exactly one frame.
pub fn read_single<R: BufRead>(reader: R) -> Result<XyzBlock, Error> {
    let mut blocks = read(reader)?;
    if blocks.len() != 1 {
        return Err(Error::inconsistent_data(
            FORMAT,
            None,
            format!("expected a single frame, found {}", blocks.len()),
        ));
    }
    Ok(blocks.remove(0))
}

/// Verifies that `elements` matches the molecule's atoms slot by slot.
pub fn check_signature(mol: &Molecule, elements: &[Element]) -> Result<(), Error> {
    if elements.len() != mol.atom_count() {
        return Err(Error::inconsistent_data(
            FORMAT,
            None,
            format!(
                "frame has {} atoms but molecule '{}' has {}",
                elements.len(),
                mol.name(),
                mol.atom_count()
            ),
        ));
    }
    if let Some((slot, (found, atom))) = elements
        .iter()
        .zip(mol.atoms())
        .enumerate()
        .find(|(_, (found, atom))| **found != atom.element)
    {
        return Err(Error::inconsistent_data(
            FORMAT,
            None,
            format!(
                "atom signature mismatch at position {}: expected {}, found {}",
                slot + 1,
                atom.element,
                found
            ),
        ));
    }
    Ok(())
}

type NumberedLines<R> = std::iter::Enumerate<std::io::Lines<R>>;

fn next_nonblank<R: BufRead>(lines: &mut NumberedLines<R>) -> Result<Option<(usize, String)>, Error> {
    for (index, line) in lines.by_ref() {
        let line = line.map_err(|e| Error::from_io(e, None))?;
        if !line.trim().is_empty() {
            return Ok(Some((index + 1, line)));
        }
    }
    Ok(None)
}

fn parse_atom_line(line: &str, line_number: usize) -> Result<(Element, Point), Error> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(Error::parse(
            FORMAT,
            None,
            line_number,
            "atom line needs an element and three coordinates",
        ));
    }

    let element = parse_element(fields[0]).ok_or_else(|| {
        Error::parse(
            FORMAT,
            None,
            line_number,
            format!("unknown element '{}'", fields[0]),
        )
    })?;

    let mut xyz = [0.0f64; 3];
    for (slot, field) in xyz.iter_mut().zip(&fields[1..4]) {
        *slot = field.parse().map_err(|_| {
            Error::parse(
                FORMAT,
                None,
                line_number,
                format!("invalid coordinate '{}'", field),
            )
        })?;
    }
    Ok((element, Point::new(xyz[0], xyz[1], xyz[2])))
}

fn parse_element(field: &str) -> Option<Element> {
    if let Ok(number) = field.parse::<u8>() {
        return Element::from_atomic_number(number);
    }
    let mut chars = field.chars();
    let first = chars.next()?;
    let normalized: String = std::iter::once(first.to_ascii_uppercase())
        .chain(chars.map(|c| c.to_ascii_lowercase()))
        .collect();
    Element::from_symbol(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::atom::Atom;
    use crate::model::bond::Bond;
    use crate::model::types::BondOrder;
    use std::io::Cursor;

    const TWO_FRAMES: &str = "3\nwater frame 1\nO 0.0 0.0 0.0\nH 0.96 0.0 0.0\nH -0.24 0.93 0.0\n\n3\n energy: -5.07 gnorm: 0.0004\n8 0.0 0.0 0.1\nh 0.95 0.0 0.1\nH -0.25 0.92 0.1\n";

    fn water() -> Molecule {
        let atoms = vec![
            Atom::new(1, Element::O, 0.0, 0.0),
            Atom::new(2, Element::H, 1.0, 0.0),
            Atom::new(3, Element::H, 0.0, 1.0),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(1, 3, BondOrder::Single),
        ];
        Molecule::new("water", atoms, bonds).unwrap()
    }

    #[test]
    fn read_parses_multiple_frames() {
        let blocks = read(Cursor::new(TWO_FRAMES)).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].comment, "water frame 1");
        assert_eq!(blocks[1].elements, vec![Element::O, Element::H, Element::H]);
        assert_eq!(blocks[1].coords[2], Point::new(-0.25, 0.92, 0.1));
    }

    #[test]
    fn read_single_rejects_multiple_frames() {
        assert!(read_single(Cursor::new(TWO_FRAMES)).is_err());
        let single = read_single(Cursor::new("1\n\nC 1 2 3\n")).unwrap();
        assert_eq!(single.coords[0], Point::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn truncated_frame_reports_line() {
        let err = read(Cursor::new("3\ncomment\nO 0 0 0\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("1 of 3 atoms"));
    }

    #[test]
    fn oversized_atom_count_is_a_parse_error() {
        let err = read_single(Cursor::new("99999999999999999\nhuge\nC 0 0 0\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("1 of 99999999999999999 atoms"));
    }

    #[test]
    fn bad_coordinate_is_a_parse_error() {
        let err = read(Cursor::new("1\n\nC 0 zero 0\n")).unwrap_err();
        assert!(err.to_string().contains("invalid coordinate 'zero'"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn to_conformer_checks_atom_signature() {
        let blocks = read(Cursor::new(TWO_FRAMES)).unwrap();
        let mol = water();

        let conformer = blocks[0].to_conformer(&mol, Some(-1.0), "xyz").unwrap();
        assert_eq!(conformer.len(), 3);

        let swapped = XyzBlock {
            comment: String::new(),
            elements: vec![Element::H, Element::O, Element::H],
            coords: blocks[0].coords.clone(),
        };
        let err = swapped.to_conformer(&mol, None, "xyz").unwrap_err();
        assert!(err.to_string().contains("signature mismatch at position 1"));
    }
}
