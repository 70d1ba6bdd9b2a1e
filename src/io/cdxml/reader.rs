use crate::io::error::Error;
use crate::model::{
    atom::Atom,
    bond::Bond,
    molecule::Molecule,
    types::{BondOrder, BondStereo, Element, Point2},
};
use roxmltree::Node;
use std::collections::HashSet;
use std::io::Read;
use std::str::FromStr;

const FORMAT: &str = "CDXML";

/// Node types whose label is an abbreviation rather than an element symbol.
const ABBREVIATION_NODE_TYPES: &[&str] = &[
    "Fragment",
    "Nickname",
    "GenericNickname",
    "Unspecified",
    "ExternalConnectionPoint",
];

/// Parsed structure-drawing document: one molecule per outermost fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Drawing bond length declared on the root element, in drawing units.
    pub bond_length: Option<f64>,
    pub molecules: Vec<Molecule>,
}

struct RawFragment {
    id: Option<String>,
    line: usize,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    center: Option<Point2>,
}

struct Caption {
    text: String,
    center: Point2,
}

struct Parsed {
    bond_length: Option<f64>,
    fragments: Vec<RawFragment>,
    captions: Vec<Caption>,
}

/// Reads every outermost fragment of a document into a single, possibly disconnected,
/// molecule.
pub fn read_molecule<R: Read>(mut reader: R, name: &str) -> Result<Molecule, Error> {
    let text = read_text(&mut reader)?;
    let parsed = parse(&text)?;

    let mut atoms = Vec::new();
    let mut bonds = Vec::new();
    let mut seen = HashSet::new();
    for fragment in parsed.fragments {
        for atom in &fragment.atoms {
            if !seen.insert(atom.id) {
                return Err(Error::parse_node(
                    FORMAT,
                    None,
                    fragment.line,
                    fragment_label(&fragment),
                    format!("atom id {} appears in more than one fragment", atom.id),
                ));
            }
        }
        atoms.extend(fragment.atoms);
        bonds.extend(fragment.bonds);
    }

    let molecule = build(name, atoms, bonds)?;
    tracing::debug!(
        molecule = name,
        atoms = molecule.atom_count(),
        bonds = molecule.bond_count(),
        "read drawing as a single molecule"
    );
    Ok(molecule)
}

/// Reads a document, splitting each outermost fragment into its own molecule.
///
/// Each molecule is named after the caption whose bounding-box centre lies closest to the
/// fragment's centre, or `fragment-<id>` when the document has no captions.
pub fn read_document<R: Read>(mut reader: R) -> Result<Document, Error> {
    let text = read_text(&mut reader)?;
    let parsed = parse(&text)?;

    let mut molecules = Vec::with_capacity(parsed.fragments.len());
    for (index, fragment) in parsed.fragments.into_iter().enumerate() {
        let name = fragment
            .center
            .and_then(|center| nearest_caption(&parsed.captions, &center))
            .map(str::to_owned)
            .unwrap_or_else(|| match &fragment.id {
                Some(id) => format!("fragment-{}", id),
                None => format!("fragment-{}", index + 1),
            });
        molecules.push(build(&name, fragment.atoms, fragment.bonds)?);
    }

    tracing::debug!(
        molecules = molecules.len(),
        captions = parsed.captions.len(),
        "split drawing into fragments"
    );
    Ok(Document {
        bond_length: parsed.bond_length,
        molecules,
    })
}

fn read_text<R: Read>(reader: &mut R) -> Result<String, Error> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| Error::from_io(e, None))?;
    Ok(text)
}

fn build(name: &str, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Result<Molecule, Error> {
    Molecule::new(name, atoms, bonds)
        .map_err(|e| Error::inconsistent_data(FORMAT, None, e.to_string()))
}

fn parse(text: &str) -> Result<Parsed, Error> {
    // Drawing tools emit a DOCTYPE pointing at the CDXML DTD.
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(text, options)
        .map_err(|e| Error::parse(FORMAT, None, e.pos().row as usize, e.to_string()))?;
    let root = doc.root_element();

    let bond_length = match root.attribute("BondLength") {
        Some(raw) => Some(parse_number::<f64>(raw, "BondLength", root, line_of(root))?),
        None => None,
    };

    let mut fragments = Vec::new();
    for node in root.descendants().filter(|n| is_outer_fragment(*n)) {
        fragments.push(parse_fragment(node, bond_length)?);
    }

    let captions = root
        .descendants()
        .filter(|n| n.has_tag_name("t") && !has_ancestor(*n, &["n", "fragment"]))
        .filter_map(parse_caption)
        .collect();

    Ok(Parsed {
        bond_length,
        fragments,
        captions,
    })
}

fn line_of(node: Node) -> usize {
    node.document().text_pos_at(node.range().start).row as usize
}

fn is_outer_fragment(node: Node) -> bool {
    node.has_tag_name("fragment") && !has_ancestor(node, &["fragment"])
}

fn has_ancestor(node: Node, names: &[&str]) -> bool {
    node.ancestors()
        .skip(1)
        .any(|a| a.is_element() && names.contains(&a.tag_name().name()))
}

fn parse_fragment(node: Node, bond_length: Option<f64>) -> Result<RawFragment, Error> {
    let mut atoms = Vec::new();
    let mut ids = HashSet::new();
    for n in node.children().filter(|c| c.has_tag_name("n")) {
        let atom = parse_atom(n, line_of(n))?;
        if !ids.insert(atom.id) {
            return Err(Error::parse_node(
                FORMAT,
                None,
                line_of(n),
                node_label(n),
                format!("duplicate atom id {}", atom.id),
            ));
        }
        atoms.push(atom);
    }

    let mut bonds: Vec<Bond> = Vec::new();
    let mut pairs = HashSet::new();
    let mut planes = Vec::new();
    for b in node.children().filter(|c| c.has_tag_name("b")) {
        let line = line_of(b);
        let (bond, plane) = parse_bond(b, line)?;
        for end in [bond.begin, bond.end] {
            if !ids.contains(&end) {
                return Err(Error::parse_node(
                    FORMAT,
                    None,
                    line,
                    node_label(b),
                    format!("bond references unknown atom id {}", end),
                ));
            }
        }
        if bond.is_self_bond() {
            return Err(Error::parse_node(
                FORMAT,
                None,
                line,
                node_label(b),
                format!("atom {} is bonded to itself", bond.begin),
            ));
        }
        if !pairs.insert(bond.pair()) {
            return Err(Error::parse_node(
                FORMAT,
                None,
                line,
                node_label(b),
                format!("duplicate bond between {} and {}", bond.begin, bond.end),
            ));
        }
        if let Some(plane) = plane {
            planes.push((bonds.len(), plane));
        }
        bonds.push(bond);
    }
    lift_bonds(&mut atoms, &bonds, &planes, bond_length);

    let center = match node.attribute("BoundingBox") {
        Some(raw) => bounding_box_center(raw),
        None => atoms_center(&atoms),
    };

    Ok(RawFragment {
        id: node.attribute("id").map(str::to_owned),
        line: line_of(node),
        atoms,
        bonds,
        center,
    })
}

fn parse_atom(node: Node, line: usize) -> Result<Atom, Error> {
    let id: u32 = parse_number(required(node, "id", line)?, "id", node, line)?;
    let (x, y) = match parse_floats(required(node, "p", line)?).as_deref() {
        Some([x, y, ..]) => (*x, *y),
        _ => {
            return Err(Error::parse_node(
                FORMAT,
                None,
                line,
                node_label(node),
                "attribute 'p' must hold two coordinates",
            ));
        }
    };

    let mut attachment = None;
    let element = match node.attribute("Element") {
        Some(raw) => {
            let number: u8 = parse_number(raw, "Element", node, line)?;
            Element::from_atomic_number(number).ok_or_else(|| {
                Error::parse_node(
                    FORMAT,
                    None,
                    line,
                    node_label(node),
                    format!("unknown atomic number {}", number),
                )
            })?
        }
        None => {
            let label = label_text(node);
            match label.strip_prefix('#') {
                Some(name) => {
                    attachment = Some(name.to_owned());
                    Element::UNKNOWN
                }
                None => element_from_label(node, &label, line)?,
            }
        }
    };

    let mut atom = Atom::new(id, element, x, y);
    if let Some(name) = attachment {
        atom = atom.with_attachment(&name);
    }
    if let Some(raw) = node.attribute("Charge") {
        atom.charge = parse_number(raw, "Charge", node, line)?;
    }
    if let Some(raw) = node.attribute("Isotope") {
        atom.isotope = parse_number(raw, "Isotope", node, line)?;
    }
    if let Some(raw) = node.attribute("xyz") {
        match parse_floats(raw).as_deref() {
            Some([_, _, z]) => atom.depth = Some(*z),
            _ => {
                return Err(Error::parse_node(
                    FORMAT,
                    None,
                    line,
                    node_label(node),
                    "attribute 'xyz' must hold three coordinates",
                ));
            }
        }
    }
    Ok(atom)
}

/// Trimmed text label of an atom node, empty when it has none.
fn label_text(node: Node) -> String {
    let label: String = node
        .children()
        .filter(|c| c.has_tag_name("t"))
        .flat_map(|t| t.children().filter(|s| s.has_tag_name("s")))
        .filter_map(|s| s.text())
        .collect();
    label.trim().to_owned()
}

/// Element of an atom node without an `Element` attribute: carbon when unlabeled, otherwise
/// the symbol written in its text label.
fn element_from_label(node: Node, label: &str, line: usize) -> Result<Element, Error> {
    if label.is_empty() {
        return Ok(Element::C);
    }
    if let Some(element) = Element::from_symbol(label) {
        return Ok(element);
    }
    if node
        .attribute("NodeType")
        .is_some_and(|t| ABBREVIATION_NODE_TYPES.contains(&t))
    {
        tracing::warn!(
            node = %node_label(node),
            label,
            line,
            "abbreviation node kept as a dummy atom"
        );
        return Ok(Element::UNKNOWN);
    }
    Err(Error::parse_node(
        FORMAT,
        None,
        line,
        node_label(node),
        format!("unknown element symbol '{}'", label),
    ))
}

/// Side of the drawing plane a whole bond is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plane {
    /// Bold: both atoms toward the viewer.
    Front,
    /// Hashed: both atoms away from the viewer.
    Back,
}

/// Parses a bond node. Bold and hashed displays mark the whole bond as lying off the drawing
/// plane instead of marking a stereo bond.
fn parse_bond(node: Node, line: usize) -> Result<(Bond, Option<Plane>), Error> {
    let begin: u32 = parse_number(required(node, "B", line)?, "B", node, line)?;
    let end: u32 = parse_number(required(node, "E", line)?, "E", node, line)?;
    let order = match node.attribute("Order") {
        Some(raw) => BondOrder::from_str(raw).map_err(|details| {
            Error::parse_node(FORMAT, None, line, node_label(node), details)
        })?,
        None => BondOrder::Single,
    };

    let display = node.attribute("Display");
    let bond = match display {
        Some("WedgeBegin") => Bond::marked(begin, end, order, BondStereo::Wedge),
        Some("WedgeEnd") => Bond::marked(end, begin, order, BondStereo::Wedge),
        Some("WedgedHashBegin") | Some("Hash") => Bond::marked(begin, end, order, BondStereo::Hash),
        Some("WedgedHashEnd") => Bond::marked(end, begin, order, BondStereo::Hash),
        _ => Bond::new(begin, end, order),
    };
    let plane = match display {
        Some("Bold") => Some(Plane::Front),
        Some("Hashed") => Some(Plane::Back),
        _ => None,
    };
    Ok((bond, plane))
}

/// Gives both atoms of every bold or hashed bond a depth hint one bond length off the plane,
/// negative toward the viewer like a wedge tip. Explicit `xyz` depths are kept. Without a
/// declared bond length the drawn length of the bond is used.
fn lift_bonds(
    atoms: &mut [Atom],
    bonds: &[Bond],
    planes: &[(usize, Plane)],
    bond_length: Option<f64>,
) {
    for &(index, plane) in planes {
        let bond = &bonds[index];
        let begin = atoms.iter().position(|a| a.id == bond.begin);
        let end = atoms.iter().position(|a| a.id == bond.end);
        let (Some(begin), Some(end)) = (begin, end) else {
            continue;
        };
        let length = bond_length.unwrap_or_else(|| atoms[begin].planar_distance(&atoms[end]));
        let depth = match plane {
            Plane::Front => -length,
            Plane::Back => length,
        };
        for slot in [begin, end] {
            if atoms[slot].depth.is_none() {
                atoms[slot].depth = Some(depth);
            }
        }
    }
}

fn parse_caption(node: Node) -> Option<Caption> {
    let center = bounding_box_center(node.attribute("BoundingBox")?)?;
    let text: String = node
        .children()
        .filter(|c| c.has_tag_name("s"))
        .filter_map(|s| s.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| Caption {
        text: text.to_owned(),
        center,
    })
}

fn nearest_caption<'a>(captions: &'a [Caption], center: &Point2) -> Option<&'a str> {
    captions
        .iter()
        .map(|c| (nalgebra::distance(&c.center, center), c))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.text.as_str())
}

fn bounding_box_center(raw: &str) -> Option<Point2> {
    match parse_floats(raw).as_deref() {
        Some([left, top, right, bottom]) => {
            Some(Point2::new((left + right) / 2.0, (top + bottom) / 2.0))
        }
        _ => None,
    }
}

fn atoms_center(atoms: &[Atom]) -> Option<Point2> {
    let first = atoms.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for atom in atoms {
        min_x = min_x.min(atom.x);
        min_y = min_y.min(atom.y);
        max_x = max_x.max(atom.x);
        max_y = max_y.max(atom.y);
    }
    Some(Point2::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0))
}

fn parse_floats(raw: &str) -> Option<Vec<f64>> {
    raw.split_whitespace().map(|v| v.parse().ok()).collect()
}

fn required<'a>(node: Node<'a, '_>, attribute: &str, line: usize) -> Result<&'a str, Error> {
    node.attribute(attribute).ok_or_else(|| {
        Error::parse_node(
            FORMAT,
            None,
            line,
            node_label(node),
            format!("missing required attribute '{}'", attribute),
        )
    })
}

fn parse_number<T: FromStr>(raw: &str, attribute: &str, node: Node, line: usize) -> Result<T, Error> {
    raw.trim().parse().map_err(|_| {
        Error::parse_node(
            FORMAT,
            None,
            line,
            node_label(node),
            format!("invalid value '{}' for attribute '{}'", raw, attribute),
        )
    })
}

fn node_label(node: Node) -> String {
    match node.attribute("id") {
        Some(id) => format!("{} id={}", node.tag_name().name(), id),
        None => node.tag_name().name().to_owned(),
    }
}

fn fragment_label(fragment: &RawFragment) -> String {
    match &fragment.id {
        Some(id) => format!("fragment id={}", id),
        None => "fragment".to_owned(),
    }
}
