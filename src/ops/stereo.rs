//! Tetrahedral and double-bond stereo assignment from drawing geometry.
//!
//! Centres are resolved from a signed volume: substituents ordered by descending priority
//! `a, b, c, d` give `det[a − d, b − d, c − d]`, negative for `R` and positive for `S` in a
//! right-handed frame. Out-of-plane information comes from two sources, depth hints and
//! wedge/hash markers, reconciled by [`HintPolicy`]. Double bonds are labelled `cis`/`trans`
//! from the side of the bond axis each end's top substituent lies on.
//!
//! Assignment never guesses: tied priorities, missing out-of-plane signal, and contradicting
//! sources all yield [`Parity::Unknown`] with a [`StereoFlag`] naming the reason.

use crate::config::Config;
use crate::model::molecule::Molecule;
use crate::model::stereo::{Confidence, Parity, StereoBond, StereoCenter, StereoFlag, StereoReport};
use crate::model::types::{BondOrder, BondStereo, Element, Point};
use crate::ops::ranking::{self, Ranking, RankingConfig};
use crate::utils::parallel::*;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Relative tolerance below which a signed volume or side test counts as degenerate.
const DEGENERACY_TOLERANCE: f64 = 1e-6;

/// Reconciliation rule between depth hints and wedge/hash markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintPolicy {
    /// Use whichever source gives a signal; if both do and disagree, report a conflict.
    #[default]
    PreferHint,
    /// Resolve from wedge/hash markers only.
    IgnoreHints,
    /// Resolve from depth hints only.
    IgnoreWedges,
}

/// Direction of the drawing's vertical axis.
///
/// Structure-drawing formats usually grow `y` downward; with `Down` a solid wedge points to
/// negative depth so that `(x, y, depth)` stays right-handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YAxis {
    #[default]
    Down,
    Up,
}

impl YAxis {
    /// Depth sign applied to the wide end of a solid wedge.
    fn wedge_sign(&self) -> f64 {
        match self {
            YAxis::Down => -1.0,
            YAxis::Up => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StereoConfig {
    pub hint_policy: HintPolicy,
    pub y_axis: YAxis,
    /// Double bonds in rings smaller than this are not stereo candidates.
    pub min_ring_size: usize,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            hint_policy: HintPolicy::PreferHint,
            y_axis: YAxis::Down,
            min_ring_size: 8,
        }
    }
}

/// Ranks the molecule with default settings and assigns stereo.
pub fn assign(mol: &Molecule, config: &StereoConfig) -> StereoReport {
    let ranking = ranking::rank(mol, &RankingConfig::default());
    assign_with_ranking(mol, &ranking, config)
}

/// Assigns stereo to many molecules concurrently, one report per molecule in input order.
pub fn assign_all(mols: &[Molecule], config: &Config) -> Vec<StereoReport> {
    mols.par_iter()
        .map(|mol| {
            let ranking = ranking::rank(mol, &config.ranking);
            assign_with_ranking(mol, &ranking, &config.stereo)
        })
        .collect()
}

/// Assigns stereo labels using a precomputed ranking.
///
/// # Arguments
///
/// * `mol` - Molecule to analyse.
/// * `ranking` - Ranking of `mol`; its classes define substituent priority.
/// * `config` - Hint policy, axis orientation, and ring threshold.
///
/// # Returns
///
/// A [`StereoReport`] with every tetrahedral candidate (slot order) and every double-bond
/// candidate (bond order), resolved or flagged.
pub fn assign_with_ranking(
    mol: &Molecule,
    ranking: &Ranking,
    config: &StereoConfig,
) -> StereoReport {
    let centers: Vec<StereoCenter> = (0..mol.atom_count())
        .filter_map(|slot| assign_center(mol, &ranking.classes, slot, config))
        .collect();
    let bonds: Vec<StereoBond> = (0..mol.bond_count())
        .filter_map(|index| assign_double_bond(mol, &ranking.classes, index, config))
        .collect();

    let report = StereoReport { centers, bonds };
    for ambiguity in report.ambiguities() {
        if ambiguity.flag == StereoFlag::HintWedgeConflict {
            tracing::warn!(molecule = mol.name(), site = %ambiguity.site, "depth hints contradict wedge markers");
        }
    }
    tracing::debug!(
        molecule = mol.name(),
        centers = report.centers.len(),
        bonds = report.bonds.len(),
        unresolved = report.ambiguities().len(),
        "assigned stereo"
    );
    report
}

fn assign_center(
    mol: &Molecule,
    classes: &[u32],
    slot: usize,
    config: &StereoConfig,
) -> Option<StereoCenter> {
    let adjacency = mol.adjacency(slot);
    if !(3..=4).contains(&adjacency.len()) {
        return None;
    }
    // Multiple and aromatic bonds make the centre planar.
    if adjacency
        .iter()
        .any(|&(_, bond)| mol.bonds()[bond].order != BondOrder::Single)
    {
        return None;
    }

    let mut substituents: Vec<(usize, usize)> = adjacency.to_vec();
    let mut distinct: Vec<u32> = substituents.iter().map(|&(s, _)| classes[s]).collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 3 {
        return None;
    }
    substituents.sort_by(|x, y| classes[y.0].cmp(&classes[x.0]));

    let atoms = mol.atoms();
    let center = &atoms[slot];
    let ids: Vec<u32> = substituents.iter().map(|&(s, _)| atoms[s].id).collect();
    let unresolved = |flag: StereoFlag| StereoCenter {
        atom: center.id,
        parity: Parity::Unknown,
        confidence: Confidence::Reduced,
        flag: Some(flag),
        substituents: ids.clone(),
    };

    let tied_pairs: Vec<usize> = substituents
        .windows(2)
        .enumerate()
        .filter(|(_, w)| classes[w[0].0] == classes[w[1].0])
        .map(|(i, _)| i)
        .collect();
    if tied_pairs.contains(&0) {
        return Some(unresolved(StereoFlag::AmbiguousPriority));
    }
    if !tied_pairs.is_empty() {
        return Some(unresolved(StereoFlag::TiedSubstituents));
    }
    // An explicit hydrogen on a three-connected centre ties with the implicit one.
    if substituents.len() == 3
        && substituents
            .iter()
            .any(|&(s, _)| atoms[s].element == Element::H)
    {
        return Some(unresolved(StereoFlag::TiedSubstituents));
    }

    let from_hints = match config.hint_policy {
        HintPolicy::IgnoreHints => None,
        _ => hint_parity(mol, slot, &substituents),
    };
    let from_wedges = match config.hint_policy {
        HintPolicy::IgnoreWedges => None,
        _ => wedge_parity(mol, slot, &substituents, config.y_axis),
    };

    let (parity, confidence) = match (from_hints, from_wedges) {
        (Some((hint, _)), Some((wedge, _))) if hint != wedge => {
            return Some(unresolved(StereoFlag::HintWedgeConflict));
        }
        (Some(resolved), _) => resolved,
        (None, Some(resolved)) => resolved,
        (None, None) => return Some(unresolved(StereoFlag::MissingGeometry)),
    };

    Some(StereoCenter {
        atom: center.id,
        parity,
        confidence,
        flag: None,
        substituents: ids,
    })
}

/// Parity from depth hints. The centre sits at its hint (or zero); unhinted neighbours sit at
/// the centre's depth.
fn hint_parity(
    mol: &Molecule,
    slot: usize,
    substituents: &[(usize, usize)],
) -> Option<(Parity, Confidence)> {
    let atoms = mol.atoms();
    let center = &atoms[slot];
    let involved = std::iter::once(center).chain(substituents.iter().map(|&(s, _)| &atoms[s]));
    let hinted = involved.clone().filter(|a| !a.hint_absent()).count();
    if hinted == 0 {
        return None;
    }
    let confidence = if hinted == involved.count() {
        Confidence::Full
    } else {
        Confidence::Reduced
    };

    let center_z = center.depth.unwrap_or(0.0);
    let origin = center.lifted(center_z);
    let positions: Vec<Point> = substituents
        .iter()
        .map(|&(s, _)| atoms[s].lifted(center_z))
        .collect();
    signed_volume_parity(&origin, &positions).map(|parity| (parity, confidence))
}

/// Parity from wedge/hash markers whose narrow end is this centre.
fn wedge_parity(
    mol: &Molecule,
    slot: usize,
    substituents: &[(usize, usize)],
    y_axis: YAxis,
) -> Option<(Parity, Confidence)> {
    let atoms = mol.atoms();
    let center = &atoms[slot];
    let mut marked = false;
    let positions: Vec<Point> = substituents
        .iter()
        .map(|&(s, bond_index)| {
            let bond = &mol.bonds()[bond_index];
            let neighbour = &atoms[s];
            let length = center.planar_distance(neighbour);
            let depth = match bond.stereo {
                BondStereo::Wedge if bond.begin == center.id => y_axis.wedge_sign() * length,
                BondStereo::Hash if bond.begin == center.id => -y_axis.wedge_sign() * length,
                _ => 0.0,
            };
            marked |= depth != 0.0;
            Point::new(neighbour.x, neighbour.y, depth)
        })
        .collect();
    if !marked {
        return None;
    }
    let origin = Point::new(center.x, center.y, 0.0);
    signed_volume_parity(&origin, &positions).map(|parity| (parity, Confidence::Reduced))
}

/// Handedness of substituents given in descending priority around `origin`.
///
/// A missing fourth substituent is placed opposite the sum of the unit bond vectors.
fn signed_volume_parity(origin: &Point, ordered: &[Point]) -> Option<Parity> {
    let mut points = ordered.to_vec();
    if points.len() == 3 {
        let sum: Vector3<f64> = points
            .iter()
            .map(|p| (p - origin).try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros))
            .sum();
        points.push(*origin - sum);
    }
    let [a, b, c, d] = points.as_slice() else {
        return None;
    };

    let columns = [a - d, b - d, c - d];
    let scale: f64 = columns.iter().map(|v| v.norm()).product();
    let det = Matrix3::from_columns(&columns).determinant();
    if scale == 0.0 || det.abs() <= DEGENERACY_TOLERANCE * scale {
        return None;
    }
    Some(if det < 0.0 { Parity::R } else { Parity::S })
}

fn assign_double_bond(
    mol: &Molecule,
    classes: &[u32],
    index: usize,
    config: &StereoConfig,
) -> Option<StereoBond> {
    let bond = &mol.bonds()[index];
    if bond.order != BondOrder::Double {
        return None;
    }
    let begin = mol.slot_of(bond.begin)?;
    let end = mol.slot_of(bond.end)?;

    let others = |slot: usize, partner: usize| -> Vec<usize> {
        mol.adjacency(slot)
            .iter()
            .map(|&(s, _)| s)
            .filter(|&s| s != partner)
            .collect()
    };
    let begin_others = others(begin, end);
    let end_others = others(end, begin);
    if !(1..=2).contains(&begin_others.len()) || !(1..=2).contains(&end_others.len()) {
        return None;
    }
    if mol
        .smallest_ring_size(index)
        .is_some_and(|size| size < config.min_ring_size)
    {
        return None;
    }

    let unresolved = |flag: StereoFlag| StereoBond {
        begin: bond.begin,
        end: bond.end,
        parity: Parity::Unknown,
        flag: Some(flag),
        reference: None,
    };

    let top = |candidates: &[usize]| -> Option<usize> {
        match candidates {
            [only] => Some(*only),
            [x, y] if classes[*x] == classes[*y] => None,
            [x, y] => Some(if classes[*x] > classes[*y] { *x } else { *y }),
            _ => None,
        }
    };
    let (Some(top_begin), Some(top_end)) = (top(&begin_others), top(&end_others)) else {
        return Some(unresolved(StereoFlag::AmbiguousPriority));
    };

    let atoms = mol.atoms();
    let p_begin = atoms[begin].planar();
    let p_end = atoms[end].planar();
    let axis = p_end - p_begin;
    let side = |anchor: nalgebra::Point2<f64>, substituent: usize| -> f64 {
        let v = atoms[substituent].planar() - anchor;
        let cross = axis.x * v.y - axis.y * v.x;
        let scale = axis.norm() * v.norm();
        if scale == 0.0 || cross.abs() <= DEGENERACY_TOLERANCE * scale {
            0.0
        } else {
            cross.signum()
        }
    };
    let begin_side = side(p_begin, top_begin);
    let end_side = side(p_end, top_end);
    if begin_side == 0.0 || end_side == 0.0 {
        return Some(unresolved(StereoFlag::MissingGeometry));
    }

    Some(StereoBond {
        begin: bond.begin,
        end: bond.end,
        parity: if begin_side == end_side {
            Parity::Cis
        } else {
            Parity::Trans
        },
        flag: None,
        reference: Some((atoms[top_begin].id, atoms[top_end].id)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::atom::Atom;
    use crate::model::bond::Bond;

    /// Centre 1 with I (top), Br (right), Cl (bottom), F (left) in screen coordinates.
    fn halomethane(f_bond: BondStereo, f_depth: Option<f64>) -> Molecule {
        let mut fluorine = Atom::new(5, Element::F, -1.0, 0.0);
        fluorine.depth = f_depth;
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0),
            Atom::new(2, Element::I, 0.0, -1.0),
            Atom::new(3, Element::BR, 1.0, 0.0),
            Atom::new(4, Element::CL, 0.0, 1.0),
            fluorine,
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(1, 3, BondOrder::Single),
            Bond::new(1, 4, BondOrder::Single),
            Bond::marked(1, 5, BondOrder::Single, f_bond),
        ];
        Molecule::new("halomethane", atoms, bonds).unwrap()
    }

    fn with_elements(elements: [Element; 4], f_bond: BondStereo) -> Molecule {
        let positions = [(0.0, -1.0), (1.0, 0.0), (0.0, 1.0), (-1.0, 0.0)];
        let mut atoms = vec![Atom::new(1, Element::C, 0.0, 0.0)];
        for (i, (&element, &(x, y))) in elements.iter().zip(&positions).enumerate() {
            atoms.push(Atom::new(i as u32 + 2, element, x, y));
        }
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(1, 3, BondOrder::Single),
            Bond::new(1, 4, BondOrder::Single),
            Bond::marked(1, 5, BondOrder::Single, f_bond),
        ];
        Molecule::new("tied", atoms, bonds).unwrap()
    }

    #[test]
    fn hashed_lowest_substituent_gives_r() {
        let report = assign(&halomethane(BondStereo::Hash, None), &StereoConfig::default());
        let center = report.center(1).unwrap();

        assert_eq!(center.parity, Parity::R);
        assert_eq!(center.confidence, Confidence::Reduced);
        assert_eq!(center.flag, None);
        assert_eq!(center.substituents, vec![2, 3, 4, 5]);
    }

    #[test]
    fn wedged_lowest_substituent_gives_s() {
        let report = assign(&halomethane(BondStereo::Wedge, None), &StereoConfig::default());
        assert_eq!(report.center(1).unwrap().parity, Parity::S);
    }

    #[test]
    fn flipping_the_y_axis_mirrors_the_label() {
        let config = StereoConfig {
            y_axis: YAxis::Up,
            ..StereoConfig::default()
        };
        let report = assign(&halomethane(BondStereo::Hash, None), &config);
        assert_eq!(report.center(1).unwrap().parity, Parity::S);
    }

    #[test]
    fn depth_hint_consistent_with_wedge_resolves() {
        let report = assign(
            &halomethane(BondStereo::Hash, Some(1.0)),
            &StereoConfig::default(),
        );
        let center = report.center(1).unwrap();

        assert_eq!(center.parity, Parity::R);
        assert_eq!(center.flag, None);
    }

    #[test]
    fn depth_hint_alone_resolves_with_reduced_confidence() {
        let report = assign(
            &halomethane(BondStereo::None, Some(1.0)),
            &StereoConfig::default(),
        );
        let center = report.center(1).unwrap();

        assert_eq!(center.parity, Parity::R);
        assert_eq!(center.confidence, Confidence::Reduced);
    }

    #[test]
    fn depth_hints_on_every_atom_give_full_confidence() {
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0).with_depth(0.0),
            Atom::new(2, Element::I, 0.0, -1.0).with_depth(0.0),
            Atom::new(3, Element::BR, 1.0, 0.0).with_depth(0.0),
            Atom::new(4, Element::CL, 0.0, 1.0).with_depth(0.0),
            Atom::new(5, Element::F, -1.0, 0.0).with_depth(1.0),
        ];
        let bonds = (2..=5).map(|i| Bond::new(1, i, BondOrder::Single)).collect();
        let mol = Molecule::new("hinted", atoms, bonds).unwrap();

        let center = assign(&mol, &StereoConfig::default()).centers[0].clone();

        assert_eq!(center.parity, Parity::R);
        assert_eq!(center.confidence, Confidence::Full);
    }

    #[test]
    fn conflicting_hint_and_wedge_yield_unknown() {
        let mol = halomethane(BondStereo::Hash, Some(-1.0));

        let report = assign(&mol, &StereoConfig::default());
        let center = report.center(1).unwrap();
        assert_eq!(center.parity, Parity::Unknown);
        assert_eq!(center.flag, Some(StereoFlag::HintWedgeConflict));

        let hints_only = StereoConfig {
            hint_policy: HintPolicy::IgnoreWedges,
            ..StereoConfig::default()
        };
        assert_eq!(assign(&mol, &hints_only).centers[0].parity, Parity::S);

        let wedges_only = StereoConfig {
            hint_policy: HintPolicy::IgnoreHints,
            ..StereoConfig::default()
        };
        assert_eq!(assign(&mol, &wedges_only).centers[0].parity, Parity::R);
    }

    #[test]
    fn flat_drawing_reports_missing_geometry() {
        let report = assign(&halomethane(BondStereo::None, None), &StereoConfig::default());
        let center = report.center(1).unwrap();

        assert_eq!(center.parity, Parity::Unknown);
        assert_eq!(center.flag, Some(StereoFlag::MissingGeometry));
    }

    #[test]
    fn top_two_tie_is_always_unknown() {
        let mol = with_elements([Element::BR, Element::BR, Element::CL, Element::F], BondStereo::Hash);
        let center = assign(&mol, &StereoConfig::default()).centers[0].clone();

        assert_eq!(center.parity, Parity::Unknown);
        assert_eq!(center.flag, Some(StereoFlag::AmbiguousPriority));
    }

    #[test]
    fn lower_tie_is_flagged_separately() {
        let mol = with_elements([Element::BR, Element::CL, Element::F, Element::F], BondStereo::Hash);
        let report = assign(&mol, &StereoConfig::default());

        assert_eq!(report.centers[0].flag, Some(StereoFlag::TiedSubstituents));
        assert_eq!(report.ambiguities().len(), 1);
    }

    #[test]
    fn fewer_than_three_distinct_substituents_is_not_a_candidate() {
        let mol = with_elements([Element::F, Element::F, Element::F, Element::CL], BondStereo::Hash);
        assert!(assign(&mol, &StereoConfig::default()).centers.is_empty());
    }

    #[test]
    fn trigonal_carbon_with_a_double_bond_is_not_a_candidate() {
        // Acetyl chloride: C1 (methyl), C2 (carbonyl), O3, Cl4, every atom hinted.
        let atoms = vec![
            Atom::new(1, Element::C, -1.0, 0.0).with_depth(0.0),
            Atom::new(2, Element::C, 0.0, 0.0).with_depth(0.05),
            Atom::new(3, Element::O, 0.5, -0.87).with_depth(0.0),
            Atom::new(4, Element::CL, 0.5, 0.87).with_depth(0.0),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(2, 3, BondOrder::Double),
            Bond::new(2, 4, BondOrder::Single),
        ];
        let mol = Molecule::new("acetyl-chloride", atoms, bonds).unwrap();

        let report = assign(&mol, &StereoConfig::default());

        assert!(report.center(2).is_none());
        assert!(report.centers.is_empty());
    }

    #[test]
    fn aromatic_ring_atom_is_not_a_candidate() {
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0),
            Atom::new(2, Element::N, 1.0, 0.0),
            Atom::new(3, Element::C, -0.5, 0.87),
            Atom::new(4, Element::CL, -0.5, -0.87),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Aromatic),
            Bond::new(1, 3, BondOrder::Aromatic),
            Bond::marked(1, 4, BondOrder::Single, BondStereo::Wedge),
        ];
        let mol = Molecule::new("aryl", atoms, bonds).unwrap();

        assert!(assign(&mol, &StereoConfig::default()).centers.is_empty());
    }

    #[test]
    fn three_connected_centre_uses_implicit_substituent() {
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0),
            Atom::new(2, Element::BR, 0.0, -1.0),
            Atom::new(3, Element::CL, 0.866, 0.5),
            Atom::new(4, Element::F, -0.866, 0.5),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(1, 3, BondOrder::Single),
            Bond::marked(1, 4, BondOrder::Single, BondStereo::Wedge),
        ];
        let mol = Molecule::new("implicit-h", atoms, bonds).unwrap();

        let center = assign(&mol, &StereoConfig::default()).centers[0].clone();

        assert_eq!(center.parity, Parity::R);
        assert_eq!(center.substituents, vec![2, 3, 4]);
    }

    #[test]
    fn wedge_pointing_away_from_centre_is_ignored() {
        // Narrow end on fluorine: the marker describes fluorine, not the carbon.
        let atoms = vec![
            Atom::new(1, Element::C, 0.0, 0.0),
            Atom::new(2, Element::I, 0.0, -1.0),
            Atom::new(3, Element::BR, 1.0, 0.0),
            Atom::new(4, Element::CL, 0.0, 1.0),
            Atom::new(5, Element::F, -1.0, 0.0),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(1, 3, BondOrder::Single),
            Bond::new(1, 4, BondOrder::Single),
            Bond::marked(5, 1, BondOrder::Single, BondStereo::Hash),
        ];
        let mol = Molecule::new("reversed", atoms, bonds).unwrap();

        assert_eq!(
            assign(&mol, &StereoConfig::default()).centers[0].flag,
            Some(StereoFlag::MissingGeometry)
        );
    }

    fn butene(c4: (f64, f64)) -> Molecule {
        let atoms = vec![
            Atom::new(1, Element::C, -0.5, -0.87),
            Atom::new(2, Element::C, 0.0, 0.0),
            Atom::new(3, Element::C, 1.0, 0.0),
            Atom::new(4, Element::C, c4.0, c4.1),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(2, 3, BondOrder::Double),
            Bond::new(3, 4, BondOrder::Single),
        ];
        Molecule::new("butene", atoms, bonds).unwrap()
    }

    #[test]
    fn double_bond_same_side_is_cis() {
        let report = assign(&butene((1.5, -0.87)), &StereoConfig::default());
        let bond = report.bond(2, 3).unwrap();

        assert_eq!(bond.parity, Parity::Cis);
        assert_eq!(bond.reference, Some((1, 4)));
    }

    #[test]
    fn double_bond_opposite_sides_is_trans() {
        let report = assign(&butene((1.5, 0.87)), &StereoConfig::default());
        assert_eq!(report.bond(2, 3).unwrap().parity, Parity::Trans);
    }

    #[test]
    fn collinear_substituent_reports_missing_geometry() {
        let report = assign(&butene((2.0, 0.0)), &StereoConfig::default());
        let bond = report.bond(2, 3).unwrap();

        assert_eq!(bond.parity, Parity::Unknown);
        assert_eq!(bond.flag, Some(StereoFlag::MissingGeometry));
    }

    #[test]
    fn geminal_identical_substituents_are_ambiguous() {
        let atoms = vec![
            Atom::new(1, Element::C, -0.5, -0.87),
            Atom::new(2, Element::C, 0.0, 0.0),
            Atom::new(3, Element::C, 1.0, 0.0),
            Atom::new(4, Element::C, 1.5, -0.87),
            Atom::new(5, Element::C, -0.5, 0.87),
        ];
        let bonds = vec![
            Bond::new(1, 2, BondOrder::Single),
            Bond::new(2, 3, BondOrder::Double),
            Bond::new(3, 4, BondOrder::Single),
            Bond::new(2, 5, BondOrder::Single),
        ];
        let mol = Molecule::new("methylbutene", atoms, bonds).unwrap();

        let report = assign(&mol, &StereoConfig::default());
        assert_eq!(
            report.bond(2, 3).unwrap().flag,
            Some(StereoFlag::AmbiguousPriority)
        );
    }

    fn cycloalkene(size: u32) -> Molecule {
        let atoms = (1..=size)
            .map(|i| {
                let angle = std::f64::consts::TAU * f64::from(i) / f64::from(size);
                Atom::new(i, Element::C, angle.cos(), angle.sin())
            })
            .collect();
        let bonds = (1..=size)
            .map(|i| {
                let next = i % size + 1;
                let order = if i == 1 {
                    BondOrder::Double
                } else {
                    BondOrder::Single
                };
                Bond::new(i, next, order)
            })
            .collect();
        Molecule::new("cycloalkene", atoms, bonds).unwrap()
    }

    #[test]
    fn small_ring_double_bonds_are_skipped() {
        let report = assign(&cycloalkene(6), &StereoConfig::default());
        assert!(report.bonds.is_empty());

        let permissive = StereoConfig {
            min_ring_size: 6,
            ..StereoConfig::default()
        };
        assert_eq!(assign(&cycloalkene(6), &permissive).bonds.len(), 1);
    }

    #[test]
    fn large_ring_double_bonds_are_candidates() {
        let report = assign(&cycloalkene(8), &StereoConfig::default());
        assert_eq!(report.bonds.len(), 1);
        assert_eq!(report.bonds[0].parity, Parity::Cis);
    }

    #[test]
    fn assign_all_matches_individual_assignment() {
        let mols = vec![
            halomethane(BondStereo::Hash, None),
            halomethane(BondStereo::Wedge, None),
        ];
        let reports = assign_all(&mols, &Config::default());

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].centers[0].parity, Parity::R);
        assert_eq!(reports[1].centers[0].parity, Parity::S);
    }
}
