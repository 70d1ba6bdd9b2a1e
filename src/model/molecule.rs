//! Validated molecular graph exposed to callers and to the archive.
//!
//! A [`Molecule`] is an arena: atoms live in a vector in insertion (slot) order, bonds
//! reference atoms by identifier, and lookups go through a slot index built once at
//! construction. Neighbour sets, fragments, and rings are computed on demand from an
//! adjacency list. Atoms and bonds are frozen after construction; the only mutation is
//! appending conformers.

use super::atom::Atom;
use super::bond::Bond;
use super::conformer::{Conformer, ConformerEnsemble};
use super::error::Error;
use crate::config::Config;
use crate::ops::ranking;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Molecular graph with its conformer ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MoleculeData", into = "MoleculeData")]
pub struct Molecule {
    name: SmolStr,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    conformers: ConformerEnsemble,
    slots: HashMap<u32, usize>,
    /// Per slot: `(neighbour slot, bond index)` in bond order.
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Builds a molecule after validating its graph invariants.
    ///
    /// # Arguments
    ///
    /// * `name` - Name or key of the molecule.
    /// * `atoms` - Atoms in slot order; identifiers must be unique.
    /// * `bonds` - Bonds referencing atom identifiers.
    ///
    /// # Returns
    ///
    /// A `Molecule` with an empty conformer ensemble.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStructure`] for duplicate atom identifiers, bonds referencing
    /// unknown atoms, self-bonds, or a repeated atom pair.
    pub fn new(name: &str, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Result<Self, Error> {
        let mut slots = HashMap::with_capacity(atoms.len());
        for (slot, atom) in atoms.iter().enumerate() {
            if slots.insert(atom.id, slot).is_some() {
                return Err(Error::invalid_structure(
                    name,
                    format!("duplicate atom id {}", atom.id),
                ));
            }
        }

        let mut adjacency = vec![Vec::new(); atoms.len()];
        let mut seen_pairs = HashSet::with_capacity(bonds.len());
        for (index, bond) in bonds.iter().enumerate() {
            if bond.is_self_bond() {
                return Err(Error::invalid_structure(
                    name,
                    format!("atom {} is bonded to itself", bond.begin),
                ));
            }
            let begin = *slots.get(&bond.begin).ok_or_else(|| {
                Error::invalid_structure(
                    name,
                    format!("bond references unknown atom id {}", bond.begin),
                )
            })?;
            let end = *slots.get(&bond.end).ok_or_else(|| {
                Error::invalid_structure(
                    name,
                    format!("bond references unknown atom id {}", bond.end),
                )
            })?;
            if !seen_pairs.insert(bond.pair()) {
                return Err(Error::invalid_structure(
                    name,
                    format!("duplicate bond between {} and {}", bond.begin, bond.end),
                ));
            }
            adjacency[begin].push((end, index));
            adjacency[end].push((begin, index));
        }

        let conformers = ConformerEnsemble::new(atoms.len());
        Ok(Self {
            name: SmolStr::new(name),
            atoms,
            bonds,
            conformers,
            slots,
            adjacency,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of this molecule under a different name, conformers included.
    pub fn with_name(&self, name: &str) -> Self {
        let mut copy = self.clone();
        copy.name = SmolStr::new(name);
        copy
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn atom(&self, id: u32) -> Option<&Atom> {
        self.slot_of(id).map(|slot| &self.atoms[slot])
    }

    pub fn slot_of(&self, id: u32) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// Neighbour identifiers of `id`, in bond order. Unknown identifiers yield nothing.
    pub fn neighbors(&self, id: u32) -> impl Iterator<Item = u32> + '_ {
        self.slot_of(id)
            .into_iter()
            .flat_map(move |slot| self.adjacency[slot].iter())
            .map(move |&(other, _)| self.atoms[other].id)
    }

    /// Bonds incident to `id`, in bond order.
    pub fn bonds_of(&self, id: u32) -> impl Iterator<Item = &Bond> + '_ {
        self.slot_of(id)
            .into_iter()
            .flat_map(move |slot| self.adjacency[slot].iter())
            .map(move |&(_, bond)| &self.bonds[bond])
    }

    pub fn bond_between(&self, a: u32, b: u32) -> Option<&Bond> {
        let slot = self.slot_of(a)?;
        self.adjacency[slot]
            .iter()
            .map(|&(_, bond)| &self.bonds[bond])
            .find(|bond| bond.other(a) == Some(b))
    }

    pub fn degree(&self, id: u32) -> usize {
        self.slot_of(id)
            .map(|slot| self.adjacency[slot].len())
            .unwrap_or(0)
    }

    /// Slot-level adjacency: `(neighbour slot, bond index)` pairs for the atom in `slot`.
    pub fn adjacency(&self, slot: usize) -> &[(usize, usize)] {
        &self.adjacency[slot]
    }

    /// Connected components as atom-identifier lists, ordered by their first slot.
    pub fn fragments(&self) -> Vec<Vec<u32>> {
        let mut visited = vec![false; self.atoms.len()];
        let mut fragments = Vec::new();
        for start in 0..self.atoms.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut queue = VecDeque::from([start]);
            let mut members = Vec::new();
            while let Some(slot) = queue.pop_front() {
                members.push(slot);
                for &(next, _) in &self.adjacency[slot] {
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            members.sort_unstable();
            fragments.push(members.into_iter().map(|s| self.atoms[s].id).collect());
        }
        fragments
    }

    /// Size (atom count) of the smallest ring containing the bond at `bond_index`.
    ///
    /// Found by a breadth-first search between the bond's endpoints that may not use the
    /// bond itself.
    ///
    /// # Returns
    ///
    /// `None` for acyclic bonds or an out-of-range index.
    pub fn smallest_ring_size(&self, bond_index: usize) -> Option<usize> {
        self.shortest_cycle_through(bond_index)
            .map(|cycle| cycle.len())
    }

    pub fn is_ring_bond(&self, bond_index: usize) -> bool {
        self.smallest_ring_size(bond_index).is_some()
    }

    pub fn is_ring_atom(&self, id: u32) -> bool {
        self.slot_of(id).is_some_and(|slot| {
            self.adjacency[slot]
                .iter()
                .any(|&(_, bond)| self.is_ring_bond(bond))
        })
    }

    /// Cyclomatic number: independent cycles of the graph.
    pub fn ring_count(&self) -> usize {
        self.bonds.len() + self.fragments().len() - self.atoms.len()
    }

    /// Smallest cycle through each ring bond, deduplicated.
    ///
    /// # Returns
    ///
    /// Rings as atom-identifier lists in path order, starting at the smallest identifier,
    /// sorted by size and then lexicographically.
    pub fn rings(&self) -> Vec<Vec<u32>> {
        let mut rings: Vec<Vec<u32>> = (0..self.bonds.len())
            .filter_map(|bond| self.shortest_cycle_through(bond))
            .map(|cycle| normalize_cycle(cycle.iter().map(|&s| self.atoms[s].id).collect()))
            .collect();
        rings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        rings.dedup();
        rings
    }

    pub fn conformers(&self) -> &ConformerEnsemble {
        &self.conformers
    }

    /// Appends a conformer to the ensemble.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] when the coordinate count differs from the atom
    /// count; the ensemble is left unchanged.
    pub fn append_conformer(&mut self, conformer: Conformer) -> Result<usize, Error> {
        self.conformers.append(conformer)
    }

    /// Canonical deduplication key using default ranking and stereo settings.
    pub fn canonical_key(&self) -> String {
        self.canonical_key_with(&Config::default())
    }

    /// Canonical deduplication key under explicit ranking and stereo settings.
    pub fn canonical_key_with(&self, config: &Config) -> String {
        ranking::canonical_key(self, config)
    }

    /// Slot path of the shortest cycle through a bond, from its begin atom to its end atom.
    fn shortest_cycle_through(&self, bond_index: usize) -> Option<Vec<usize>> {
        let bond = self.bonds.get(bond_index)?;
        let start = self.slot_of(bond.begin)?;
        let goal = self.slot_of(bond.end)?;

        let mut parent: Vec<Option<usize>> = vec![None; self.atoms.len()];
        let mut visited = vec![false; self.atoms.len()];
        visited[start] = true;
        let mut queue = VecDeque::from([start]);

        while let Some(slot) = queue.pop_front() {
            for &(next, via) in &self.adjacency[slot] {
                if via == bond_index || visited[next] {
                    continue;
                }
                visited[next] = true;
                parent[next] = Some(slot);
                if next == goal {
                    let mut path = vec![goal];
                    let mut cursor = goal;
                    while let Some(prev) = parent[cursor] {
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }
}

fn normalize_cycle(mut cycle: Vec<u32>) -> Vec<u32> {
    let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, id)| *id)
        .map(|(pos, _)| pos)
    else {
        return cycle;
    };
    cycle.rotate_left(min_pos);
    if cycle.len() > 2 && cycle[cycle.len() - 1] < cycle[1] {
        cycle[1..].reverse();
    }
    cycle
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Molecule {{ name: \"{}\", atoms: {}, bonds: {}, conformers: {} }}",
            self.name,
            self.atoms.len(),
            self.bonds.len(),
            self.conformers.len()
        )
    }
}

/// Serialized shape of a molecule; the lookup tables are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct MoleculeData {
    name: SmolStr,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    conformers: Vec<Conformer>,
}

impl TryFrom<MoleculeData> for Molecule {
    type Error = Error;

    fn try_from(data: MoleculeData) -> Result<Self, Self::Error> {
        let mut molecule = Molecule::new(&data.name, data.atoms, data.bonds)?;
        for conformer in data.conformers {
            molecule.append_conformer(conformer)?;
        }
        Ok(molecule)
    }
}

impl From<Molecule> for MoleculeData {
    fn from(molecule: Molecule) -> Self {
        Self {
            name: molecule.name,
            atoms: molecule.atoms,
            bonds: molecule.bonds,
            conformers: molecule.conformers.as_slice().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::{BondOrder, Element, Point};

    fn atom(id: u32, element: Element) -> Atom {
        Atom::new(id, element, id as f64, 0.0)
    }

    fn chain(ids: &[u32]) -> Vec<Bond> {
        ids.windows(2)
            .map(|w| Bond::new(w[0], w[1], BondOrder::Single))
            .collect()
    }

    /// Methylcyclopropane plus a detached water oxygen.
    fn sample() -> Molecule {
        let atoms = vec![
            atom(10, Element::C),
            atom(11, Element::C),
            atom(12, Element::C),
            atom(13, Element::C),
            atom(20, Element::O),
        ];
        let bonds = vec![
            Bond::new(10, 11, BondOrder::Single),
            Bond::new(11, 12, BondOrder::Single),
            Bond::new(12, 10, BondOrder::Single),
            Bond::new(10, 13, BondOrder::Single),
        ];
        Molecule::new("sample", atoms, bonds).unwrap()
    }

    #[test]
    fn new_rejects_duplicate_atom_ids() {
        let err = Molecule::new("dup", vec![atom(1, Element::C), atom(1, Element::O)], vec![])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStructure { .. }));
        assert!(err.to_string().contains("duplicate atom id 1"));
    }

    #[test]
    fn new_rejects_dangling_self_and_duplicate_bonds() {
        let atoms = || vec![atom(1, Element::C), atom(2, Element::C)];

        assert!(Molecule::new("x", atoms(), vec![Bond::new(1, 3, BondOrder::Single)]).is_err());
        assert!(Molecule::new("x", atoms(), vec![Bond::new(1, 1, BondOrder::Single)]).is_err());
        assert!(
            Molecule::new(
                "x",
                atoms(),
                vec![
                    Bond::new(1, 2, BondOrder::Single),
                    Bond::new(2, 1, BondOrder::Double)
                ]
            )
            .is_err()
        );
    }

    #[test]
    fn neighbor_queries_follow_bond_order() {
        let mol = sample();

        assert_eq!(mol.neighbors(10).collect::<Vec<_>>(), vec![11, 12, 13]);
        assert_eq!(mol.degree(10), 3);
        assert_eq!(mol.degree(20), 0);
        assert_eq!(mol.degree(99), 0);
        assert_eq!(mol.bonds_of(13).count(), 1);
        assert!(mol.bond_between(12, 10).is_some());
        assert!(mol.bond_between(11, 13).is_none());
        assert_eq!(mol.slot_of(13), Some(3));
        assert_eq!(mol.atom(20).unwrap().element, Element::O);
    }

    #[test]
    fn fragments_split_disconnected_components() {
        let mol = sample();
        assert_eq!(mol.fragments(), vec![vec![10, 11, 12, 13], vec![20]]);
    }

    #[test]
    fn ring_membership_is_detected() {
        let mol = sample();

        assert_eq!(mol.smallest_ring_size(0), Some(3));
        assert_eq!(mol.smallest_ring_size(3), None);
        assert_eq!(mol.smallest_ring_size(42), None);
        assert!(mol.is_ring_atom(11));
        assert!(!mol.is_ring_atom(13));
        assert_eq!(mol.ring_count(), 1);
        assert_eq!(mol.rings(), vec![vec![10, 11, 12]]);
    }

    #[test]
    fn fused_rings_report_smallest_cycles() {
        // Bicyclo[2.2.0]: two four-membered rings sharing bond 1-4.
        let atoms = (1..=6).map(|i| atom(i, Element::C)).collect();
        let mut bonds = chain(&[1, 2, 3, 4, 5, 6, 1]);
        bonds.push(Bond::new(1, 4, BondOrder::Single));
        let mol = Molecule::new("bicyclic", atoms, bonds).unwrap();

        assert_eq!(mol.ring_count(), 2);
        assert_eq!(mol.rings(), vec![vec![1, 2, 3, 4], vec![1, 4, 5, 6]]);
        assert_eq!(mol.smallest_ring_size(6), Some(4));
    }

    #[test]
    fn append_conformer_validates_shape() {
        let mut mol = sample();

        let ok = mol.append_conformer(Conformer::new(vec![Point::origin(); 5], None, "t"));
        let bad = mol.append_conformer(Conformer::new(vec![Point::origin(); 4], None, "t"));

        assert_eq!(ok.unwrap(), 0);
        assert_eq!(bad.unwrap_err(), Error::shape_mismatch(5, 4));
        assert_eq!(mol.conformers().len(), 1);
    }

    #[test]
    fn serde_round_trip_rebuilds_lookup_tables() {
        let mut mol = sample();
        mol.append_conformer(Conformer::new(
            vec![Point::new(0.1, 0.2, 0.30000000000000004); 5],
            Some(-12.5),
            "t",
        ))
        .unwrap();

        let json = serde_json::to_string(&mol).unwrap();
        let back: Molecule = serde_json::from_str(&json).unwrap();

        assert_eq!(back, mol);
        assert_eq!(back.neighbors(10).count(), 3);
    }

    #[test]
    fn deserialization_rejects_invalid_graphs() {
        let json = r#"{"name":"bad","atoms":[],"bonds":[{"begin":1,"end":2,"order":"Single","stereo":"None"}],"conformers":[]}"#;
        assert!(serde_json::from_str::<Molecule>(json).is_err());
    }

    #[test]
    fn with_name_copies_everything_else() {
        let mol = sample();
        let renamed = mol.with_name("renamed");

        assert_eq!(renamed.name(), "renamed");
        assert_eq!(renamed.atoms(), mol.atoms());
        assert_eq!(renamed.bonds(), mol.bonds());
    }
}
