//! Core data structures for molecular graphs and their geometry.
//!
//! Atoms and bonds form an immutable, validated [`molecule::Molecule`]; conformers are the
//! only part that grows after construction. Stereochemical results live in [`stereo`] and
//! are computed on demand rather than stored on the molecule.

pub mod atom;
pub mod bond;
pub mod conformer;
pub mod molecule;
pub mod stereo;
pub mod types;

mod error;

pub use error::Error;
