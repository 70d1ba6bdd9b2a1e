//! Tripos MOL2 connection tables with coordinates.
//!
//! Atom types are written as bare element symbols (`Du` for dummy atoms). An attachment point
//! is a `Du` atom whose substructure name repeats its atom name, which is also the
//! attachment label.

pub mod reader;
pub mod writer;

/// Atom type and name of dummy atoms.
const DUMMY: &str = "Du";
/// Substructure name of every non-attachment atom.
const SUBSTRUCTURE: &str = "UNL1";
