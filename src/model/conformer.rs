//! Three-dimensional coordinate realizations of a molecule and their ordered ensemble.
//!
//! A [`Conformer`] stores one coordinate per atom in the molecule's slot order. The
//! [`ConformerEnsemble`] is append-only: generation order is observable and preserved, and
//! near-duplicate detection only produces an advisory grouping.

use super::error::Error;
use super::types::Point;
use crate::ops::align;
use crate::utils::parallel::*;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One 3-D geometry of a molecule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformer {
    /// Coordinates in ångströms, indexed by atom slot.
    pub coords: Vec<Point>,
    /// Energy reported by whatever produced the geometry, if any.
    pub energy: Option<f64>,
    /// Free-form tag naming the producer (e.g. `"embed-2d"`, `"xtb"`).
    pub provenance: SmolStr,
}

impl Conformer {
    /// Creates a conformer from raw coordinates.
    ///
    /// # Arguments
    ///
    /// * `coords` - One point per atom, in slot order.
    /// * `energy` - Optional scalar energy.
    /// * `provenance` - Tag describing where the geometry came from.
    ///
    /// # Returns
    ///
    /// A new `Conformer`. Shape is validated when it is appended to an ensemble.
    pub fn new(coords: Vec<Point>, energy: Option<f64>, provenance: &str) -> Self {
        Self {
            coords,
            energy,
            provenance: SmolStr::new(provenance),
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Root-mean-square deviation to another conformer after optimal rigid alignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] when the conformers have different lengths.
    pub fn rmsd(&self, other: &Conformer) -> Result<f64, Error> {
        align::rmsd(&self.coords, &other.coords)
    }
}

/// Ordered, append-only collection of conformers sharing one atom count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformerEnsemble {
    atom_count: usize,
    conformers: Vec<Conformer>,
}

impl ConformerEnsemble {
    pub fn new(atom_count: usize) -> Self {
        Self {
            atom_count,
            conformers: Vec::new(),
        }
    }

    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// Appends a conformer after validating its length.
    ///
    /// # Arguments
    ///
    /// * `conformer` - Geometry to append; its coordinate count must equal the atom count.
    ///
    /// # Returns
    ///
    /// The index assigned to the new conformer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] and leaves the ensemble untouched when the coordinate
    /// count differs from the atom count.
    pub fn append(&mut self, conformer: Conformer) -> Result<usize, Error> {
        if conformer.len() != self.atom_count {
            return Err(Error::shape_mismatch(self.atom_count, conformer.len()));
        }
        self.conformers.push(conformer);
        Ok(self.conformers.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&Conformer> {
        self.conformers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conformer> {
        self.conformers.iter()
    }

    pub fn len(&self) -> usize {
        self.conformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conformers.is_empty()
    }

    pub fn as_slice(&self) -> &[Conformer] {
        &self.conformers
    }

    /// Index of the conformer with the lowest recorded energy. Conformers without an energy
    /// are skipped; ties keep the earliest.
    pub fn lowest_energy(&self) -> Option<usize> {
        self.conformers
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.energy.map(|e| (i, e)))
            .fold(None, |best: Option<(usize, f64)>, (i, e)| match best {
                Some((_, b)) if b <= e => best,
                _ => Some((i, e)),
            })
            .map(|(i, _)| i)
    }

    /// Groups near-duplicate conformers by leader clustering in generation order.
    ///
    /// Each conformer joins the first existing group whose leader lies within `threshold`
    /// RMSD (after alignment); otherwise it founds a new group. The ensemble is not modified.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Maximum RMSD, in ångströms, for two conformers to be grouped.
    ///
    /// # Returns
    ///
    /// Groups of conformer indices; each group starts with its leader and groups are ordered
    /// by leader index.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Alignment`] if a superposition fails.
    pub fn cluster(&self, threshold: f64) -> Result<Vec<Vec<usize>>, Error> {
        let n = self.conformers.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .collect();

        let distances: Vec<f64> = pairs
            .par_iter()
            .map(|&(i, j)| self.conformers[i].rmsd(&self.conformers[j]))
            .collect::<Result<Vec<_>, _>>()?;

        let distance = |i: usize, j: usize| -> f64 {
            let (hi, lo) = if i > j { (i, j) } else { (j, i) };
            distances[hi * (hi - 1) / 2 + lo]
        };

        let mut groups: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            match groups
                .iter_mut()
                .find(|group| distance(group[0], i) <= threshold)
            {
                Some(group) => group.push(i),
                None => groups.push(vec![i]),
            }
        }

        tracing::debug!(
            conformers = n,
            groups = groups.len(),
            threshold,
            "clustered conformer ensemble"
        );

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(shift: f64) -> Vec<Point> {
        vec![
            Point::new(0.0 + shift, 0.0, 0.0),
            Point::new(1.5 + shift, 0.0, 0.0),
            Point::new(0.0 + shift, 1.4, 0.3),
        ]
    }

    #[test]
    fn append_rejects_wrong_length_and_leaves_ensemble_unchanged() {
        let mut ensemble = ConformerEnsemble::new(3);
        ensemble
            .append(Conformer::new(geometry(0.0), Some(-1.0), "test"))
            .unwrap();
        let before = ensemble.clone();

        let err = ensemble
            .append(Conformer::new(vec![Point::origin(); 2], None, "bad"))
            .unwrap_err();

        assert_eq!(
            err,
            Error::ShapeMismatch {
                expected: 3,
                found: 2
            }
        );
        assert_eq!(ensemble, before);
        assert_eq!(ensemble.len(), 1);
    }

    #[test]
    fn append_preserves_generation_order() {
        let mut ensemble = ConformerEnsemble::new(3);
        for (i, tag) in ["first", "second", "third"].iter().enumerate() {
            let index = ensemble
                .append(Conformer::new(geometry(i as f64), None, tag))
                .unwrap();
            assert_eq!(index, i);
        }

        let tags: Vec<&str> = ensemble.iter().map(|c| c.provenance.as_str()).collect();
        assert_eq!(tags, vec!["first", "second", "third"]);
        assert_eq!(ensemble.get(1).unwrap().provenance, "second");
        assert!(ensemble.get(3).is_none());
    }

    #[test]
    fn cluster_groups_translated_copies_without_removing_them() {
        let mut ensemble = ConformerEnsemble::new(3);
        ensemble
            .append(Conformer::new(geometry(0.0), None, "a"))
            .unwrap();
        ensemble
            .append(Conformer::new(geometry(5.0), None, "b"))
            .unwrap();
        let mut distinct = geometry(0.0);
        distinct[2] = Point::new(0.0, 3.0, 2.0);
        ensemble
            .append(Conformer::new(distinct, None, "c"))
            .unwrap();

        let groups = ensemble.cluster(0.1).unwrap();

        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
        assert_eq!(ensemble.len(), 3);
    }

    #[test]
    fn cluster_of_empty_ensemble_is_empty() {
        let ensemble = ConformerEnsemble::new(4);
        assert!(ensemble.cluster(0.5).unwrap().is_empty());
    }

    #[test]
    fn lowest_energy_skips_missing_and_keeps_first_tie() {
        let mut ensemble = ConformerEnsemble::new(3);
        ensemble
            .append(Conformer::new(geometry(0.0), None, "none"))
            .unwrap();
        ensemble
            .append(Conformer::new(geometry(0.0), Some(-2.0), "low"))
            .unwrap();
        ensemble
            .append(Conformer::new(geometry(0.0), Some(-2.0), "tie"))
            .unwrap();
        ensemble
            .append(Conformer::new(geometry(0.0), Some(1.0), "high"))
            .unwrap();

        assert_eq!(ensemble.lowest_energy(), Some(1));
        assert_eq!(ConformerEnsemble::new(3).lowest_energy(), None);
    }
}
