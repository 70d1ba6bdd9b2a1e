//! # mol-forge
//!
//! **mol-forge** turns chemical structure drawings into validated molecular graphs, assigns
//! their stereochemistry deterministically, and keeps molecules with their 3-D conformer
//! ensembles in a compact random-access archive.
//!
//! ## Features
//!
//! - **Drawing ingestion** – `io` reads CDXML drawings into a `Molecule` (atoms with 2-D
//!   positions, optional depth hints, charges, isotopes; bonds with order and wedge/hash
//!   markers) and can split a document into captioned fragments. XYZ frames carry conformers
//!   to and from external tools, and MOL2 holds a connection table with coordinates.
//! - **Assembly** – `ops::join_at` bonds two drawings at labelled attachment points.
//! - **Canonical ranking and stereo** – `ops::rank` computes canonical atom classes by
//!   iterative refinement; `ops::assign` labels tetrahedral centres (R/S) and double bonds
//!   (cis/trans) and reports every site it cannot resolve instead of guessing.
//! - **Conformers** – each molecule owns an append-only `ConformerEnsemble` with Kabsch RMSD
//!   and advisory clustering; `ops::seed_conformer` lifts a drawing into a first 3-D guess.
//! - **Archive** – `archive` stores records as checksummed, deflate-compressed blocks behind
//!   an atomically replaced index, with compaction and index recovery.
//! - **Drivers** – `driver` defines a typed contract for external programs, the subprocess
//!   plumbing with timeouts, a bounded batch runner, and an xtb optimisation driver.
//!
//! Configuration is an explicit `Config` value; the crate emits `tracing` events but never
//! installs a subscriber.

mod error;
mod model;
mod utils;

pub mod archive;
pub mod config;
pub mod driver;
pub mod io;
pub mod ops;

pub use config::Config;
pub use error::Error;

pub use model::Error as ModelError;
pub use model::atom::Atom;
pub use model::bond::Bond;
pub use model::conformer::{Conformer, ConformerEnsemble};
pub use model::molecule::Molecule;
pub use model::stereo::{
    AmbiguousStereo, Confidence, Parity, StereoBond, StereoCenter, StereoFlag, StereoReport,
    StereoSite,
};
pub use model::types::{BondOrder, BondStereo, Element, Point, Point2};
