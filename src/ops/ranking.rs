//! Canonical atom ranking by iterative neighbourhood refinement.
//!
//! Every atom starts from a seed invariant and is repeatedly re-classified by its previous
//! class plus the multiset of neighbour classes, in the spirit of Morgan's extended
//! connectivity. The loop is an explicit fixed-point computation: it stops as soon as the
//! partition into equivalence classes stops splitting, or after a configurable number of
//! rounds. The stabilized classes drive substituent priority; a total order derived from
//! them by deterministic tie-breaking canonicalizes whole molecules for deduplication.
//!
//! Priority here approximates CIP rules. Exhaustive hierarchical-digraph comparison is not
//! attempted, so stereo assignment reports centres whose top substituents tie instead of
//! guessing.

use crate::config::Config;
use crate::model::molecule::Molecule;
use crate::model::stereo::Parity;
use crate::ops::stereo;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Tuning knobs for the refinement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    /// Upper bound on refinement rounds per fixed-point run.
    pub max_iterations: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { max_iterations: 64 }
    }
}

/// Outcome of ranking one molecule. All vectors are indexed by atom slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    /// Stabilized equivalence classes, densely numbered; larger means higher priority.
    pub classes: Vec<u32>,
    /// Total order (a permutation of `0..n`) refining `classes` by tie-breaking.
    pub ranks: Vec<u32>,
    /// Refinement rounds spent before the class partition stabilized.
    pub iterations: usize,
    /// `false` when the iteration cap was hit before the partition stabilized.
    pub converged: bool,
}

impl Ranking {
    pub fn class_count(&self) -> usize {
        count_distinct(&self.classes)
    }

    /// Atom slots ordered by ascending canonical rank.
    pub fn canonical_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.ranks.len()).collect();
        order.sort_by_key(|&slot| self.ranks[slot]);
        order
    }
}

/// Ranks every atom of a molecule.
///
/// # Arguments
///
/// * `mol` - Molecule to rank.
/// * `config` - Iteration cap for the fixed-point loops.
///
/// # Returns
///
/// A [`Ranking`] whose classes reflect real symmetry and whose ranks are a deterministic
/// total order. When several atoms remain tied, the lowest tied class is split by promoting
/// its member with the smallest atom identifier, and refinement resumes.
pub fn rank(mol: &Molecule, config: &RankingConfig) -> Ranking {
    let seeds = seed_classes(mol);
    let (classes, iterations, converged) = refine(mol, seeds, config.max_iterations);

    let mut ranks = classes.clone();
    let n = ranks.len();
    while count_distinct(&ranks) < n {
        let Some(promoted) = tie_break_target(mol, &ranks) else {
            break;
        };
        let doubled: Vec<u32> = ranks
            .iter()
            .enumerate()
            .map(|(slot, &r)| 2 * r + u32::from(slot == promoted))
            .collect();
        ranks = refine(mol, densify(&doubled), config.max_iterations).0;
    }

    if !converged {
        tracing::warn!(
            molecule = mol.name(),
            max_iterations = config.max_iterations,
            "ranking stopped at the iteration cap before the partition stabilized"
        );
    }

    Ranking {
        classes,
        ranks,
        iterations,
        converged,
    }
}

/// Seed invariant: atomic number, isotope, formal charge, and twice the bond-order sum.
fn seed_classes(mol: &Molecule) -> Vec<u32> {
    let keys: Vec<(u8, u16, i8, u32)> = (0..mol.atom_count())
        .map(|slot| {
            let atom = &mol.atoms()[slot];
            let weighted_degree = mol
                .adjacency(slot)
                .iter()
                .map(|&(_, bond)| mol.bonds()[bond].order.doubled())
                .sum();
            (
                atom.element.atomic_number(),
                atom.isotope,
                atom.charge,
                weighted_degree,
            )
        })
        .collect();
    densify(&keys)
}

/// Runs refinement rounds until the class count stops growing or the cap is reached.
///
/// Returns the classes, the number of rounds executed, and whether the partition is stable.
fn refine(mol: &Molecule, mut classes: Vec<u32>, max_iterations: usize) -> (Vec<u32>, usize, bool) {
    let mut distinct = count_distinct(&classes);
    if distinct == classes.len() {
        return (classes, 0, true);
    }

    for round in 1..=max_iterations {
        let keys: Vec<(u32, Vec<u32>)> = (0..mol.atom_count())
            .map(|slot| {
                let mut neighbours: Vec<u32> = mol
                    .adjacency(slot)
                    .iter()
                    .flat_map(|&(other, bond)| {
                        std::iter::repeat_n(classes[other], mol.bonds()[bond].order.multiplicity())
                    })
                    .collect();
                neighbours.sort_unstable_by(|a, b| b.cmp(a));
                (classes[slot], neighbours)
            })
            .collect();

        let next = densify(&keys);
        let next_distinct = count_distinct(&next);
        if next_distinct == distinct {
            return (classes, round, true);
        }
        classes = next;
        distinct = next_distinct;
        if distinct == classes.len() {
            return (classes, round, true);
        }
    }

    (classes, max_iterations, false)
}

/// Member with the smallest atom identifier in the lowest class that still has ties.
fn tie_break_target(mol: &Molecule, ranks: &[u32]) -> Option<usize> {
    let mut counts = vec![0usize; ranks.len()];
    for &r in ranks {
        counts[r as usize] += 1;
    }
    let lowest_tied = counts.iter().position(|&c| c > 1)? as u32;
    (0..ranks.len())
        .filter(|&slot| ranks[slot] == lowest_tied)
        .min_by_key(|&slot| mol.atoms()[slot].id)
}

/// Replaces each value by its position among the sorted distinct values.
fn densify<K: Ord>(values: &[K]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].cmp(&values[b]));

    let mut dense = vec![0u32; values.len()];
    let mut current = 0u32;
    for (i, &slot) in order.iter().enumerate() {
        if i > 0 && values[slot] != values[order[i - 1]] {
            current += 1;
        }
        dense[slot] = current;
    }
    dense
}

fn count_distinct(classes: &[u32]) -> usize {
    let mut sorted = classes.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Canonical, numbering-independent key of a molecule including its resolved stereo.
///
/// The key is the hex SHA-256 of a string listing atoms in canonical rank order, bonds as
/// sorted rank pairs with their order, and defined stereo labels by rank. Two drawings of the
/// same stereoisomer produce the same key regardless of atom identifiers or input order.
///
/// # Arguments
///
/// * `mol` - Molecule to key.
/// * `config` - Ranking and stereo settings; both influence the key.
///
/// # Returns
///
/// A 64-character lowercase hexadecimal string.
pub fn canonical_key(mol: &Molecule, config: &Config) -> String {
    let ranking = rank(mol, &config.ranking);
    let report = stereo::assign_with_ranking(mol, &ranking, &config.stereo);
    let rank_of = |id: u32| mol.slot_of(id).map(|slot| ranking.ranks[slot]);

    let mut text = String::from("atoms:");
    for slot in ranking.canonical_order() {
        let atom = &mol.atoms()[slot];
        let _ = write!(text, "{},{},{};", atom.element, atom.charge, atom.isotope);
    }

    let mut bonds: Vec<(u32, u32, u32)> = mol
        .bonds()
        .iter()
        .filter_map(|bond| {
            let a = rank_of(bond.begin)?;
            let b = rank_of(bond.end)?;
            Some((a.min(b), a.max(b), bond.order.doubled()))
        })
        .collect();
    bonds.sort_unstable();
    text.push_str("|bonds:");
    for (a, b, order) in bonds {
        let _ = write!(text, "{}-{}:{};", a, b, order);
    }

    let mut labels: Vec<(u32, u32, Parity)> = report
        .centers
        .iter()
        .filter(|c| c.parity.is_defined())
        .filter_map(|c| rank_of(c.atom).map(|r| (r, r, c.parity)))
        .chain(
            report
                .bonds
                .iter()
                .filter(|b| b.parity.is_defined())
                .filter_map(|b| {
                    let a = rank_of(b.begin)?;
                    let e = rank_of(b.end)?;
                    Some((a.min(e), a.max(e), b.parity))
                }),
        )
        .collect();
    labels.sort_unstable_by_key(|&(a, b, _)| (a, b));
    text.push_str("|stereo:");
    for (a, b, parity) in labels {
        let _ = write!(text, "{}-{}:{};", a, b, parity);
    }

    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::atom::Atom;
    use crate::model::bond::Bond;
    use crate::model::types::{BondOrder, Element};

    fn linear(elements: &[Element]) -> Molecule {
        let atoms = elements
            .iter()
            .enumerate()
            .map(|(i, &e)| Atom::new(i as u32 + 1, e, i as f64, 0.0))
            .collect();
        let bonds = (1..elements.len() as u32)
            .map(|i| Bond::new(i, i + 1, BondOrder::Single))
            .collect();
        Molecule::new("linear", atoms, bonds).unwrap()
    }

    #[test]
    fn seed_orders_by_atomic_number_first() {
        let mol = linear(&[Element::C, Element::C, Element::O]);
        let ranking = rank(&mol, &RankingConfig::default());

        assert_eq!(ranking.classes, vec![0, 1, 2]);
        assert_eq!(ranking.ranks, vec![0, 1, 2]);
        assert!(ranking.converged);
        assert_eq!(ranking.iterations, 0);
    }

    #[test]
    fn symmetric_atoms_share_a_class_but_get_distinct_ranks() {
        let mol = linear(&[Element::C, Element::C, Element::C]);
        let ranking = rank(&mol, &RankingConfig::default());

        assert_eq!(ranking.classes[0], ranking.classes[2]);
        assert!(ranking.classes[1] > ranking.classes[0]);
        assert_eq!(ranking.class_count(), 2);
        // Smallest id among the tied terminal atoms is promoted.
        assert_eq!(ranking.ranks, vec![1, 2, 0]);
    }

    #[test]
    fn refinement_runs_until_partition_is_stable() {
        let mol = linear(&[Element::C; 7]);
        let ranking = rank(&mol, &RankingConfig::default());

        assert!(ranking.converged);
        assert_eq!(ranking.iterations, 3);
        assert_eq!(ranking.class_count(), 4);
        assert_eq!(ranking.classes[0], ranking.classes[6]);
        assert_eq!(ranking.classes[2], ranking.classes[4]);
        assert!(ranking.classes[3] > ranking.classes[2]);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let mol = linear(&[Element::C; 7]);
        let ranking = rank(&mol, &RankingConfig { max_iterations: 1 });

        assert!(!ranking.converged);
        assert_eq!(ranking.iterations, 1);
        assert_eq!(ranking.class_count(), 3);
        let mut sorted = ranking.ranks.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..7).collect::<Vec<u32>>());
    }

    #[test]
    fn double_bond_neighbours_are_duplicated() {
        // O=C(-C)-O: the carbonyl oxygen sees the carbon twice and outranks the hydroxyl.
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0),
            Atom::new(2, Element::C, 1.0, 0.0),
            Atom::new(3, Element::O, 2.0, 1.0),
            Atom::new(4, Element::O, 2.0, -1.0),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(2, 3, BondOrder::Double),
            Bond::new(2, 4, BondOrder::Single),
        ];
        let mol = Molecule::new("acid", atoms, bonds).unwrap();
        let ranking = rank(&mol, &RankingConfig::default());

        assert!(ranking.classes[2] > ranking.classes[3]);
    }

    #[test]
    fn canonical_key_ignores_numbering_and_input_order() {
        let forward = linear(&[Element::C, Element::C, Element::O, Element::N]);

        let atoms = vec![
            Atom::new(40, Element::N, 0.0, 0.0),
            Atom::new(7, Element::O, 1.0, 0.0),
            Atom::new(19, Element::C, 2.0, 0.0),
            Atom::new(3, Element::C, 3.0, 0.0),
        ];
        let bonds = vec![
            Bond::new(7, 40, BondOrder::Single),
            Bond::new(19, 7, BondOrder::Single),
            Bond::new(3, 19, BondOrder::Single),
        ];
        let shuffled = Molecule::new("shuffled", atoms, bonds).unwrap();

        let config = Config::default();
        let key = canonical_key(&forward, &config);
        assert_eq!(key, canonical_key(&shuffled, &config));
        assert_eq!(key.len(), 64);
        assert_eq!(key, forward.canonical_key());
    }

    #[test]
    fn canonical_key_distinguishes_constitution() {
        let a = linear(&[Element::C, Element::C, Element::O]);
        let b = linear(&[Element::C, Element::O, Element::C]);

        assert_ne!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn canonical_key_follows_the_stereo_policy() {
        use crate::model::types::BondStereo;
        use crate::ops::HintPolicy;

        // Hash bond and depth hint on F disagree: R from the wedge, S from the hint.
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0),
            Atom::new(2, Element::I, 0.0, -1.0),
            Atom::new(3, Element::BR, 1.0, 0.0),
            Atom::new(4, Element::CL, 0.0, 1.0),
            Atom::new(5, Element::F, -1.0, 0.0).with_depth(-1.0),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(1, 3, BondOrder::Single),
            Bond::new(1, 4, BondOrder::Single),
            Bond::marked(1, 5, BondOrder::Single, BondStereo::Hash),
        ];
        let mol = Molecule::new("halomethane", atoms, bonds).unwrap();

        let mut hints = Config::default();
        hints.stereo.hint_policy = HintPolicy::IgnoreWedges;
        let mut wedges = Config::default();
        wedges.stereo.hint_policy = HintPolicy::IgnoreHints;

        let unlabelled = canonical_key(&mol, &Config::default());
        let from_hints = canonical_key(&mol, &hints);
        let from_wedges = canonical_key(&mol, &wedges);

        assert_eq!(unlabelled, mol.canonical_key());
        assert_eq!(from_hints, mol.canonical_key_with(&hints));
        assert_ne!(from_hints, unlabelled);
        assert_ne!(from_wedges, unlabelled);
        assert_ne!(from_hints, from_wedges);
    }

    #[test]
    fn densify_preserves_order_and_ties() {
        assert_eq!(densify(&[30, 10, 30, 20]), vec![2, 0, 2, 1]);
        assert!(densify::<u32>(&[]).is_empty());
    }
}
