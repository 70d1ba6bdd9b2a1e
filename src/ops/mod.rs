//! Operations on molecules: canonical ranking, stereochemistry assignment, 2-D → 3-D seeding,
//! rigid alignment, and joining drawings at attachment points.
//!
//! Every operation is a pure function of a [`Molecule`](crate::Molecule) and an explicit
//! configuration value, so they can run concurrently across molecules.

pub(crate) mod align;
mod embed;
mod join;
pub(crate) mod ranking;
mod stereo;

pub use align::{Superposition, rmsd, rmsd_in_place, superpose};

pub use embed::{EMBED_PROVENANCE, EmbedConfig, seed_conformer};

pub use join::{join, join_at};

pub use ranking::{Ranking, RankingConfig, canonical_key, rank};

pub use stereo::{HintPolicy, StereoConfig, YAxis, assign, assign_all, assign_with_ranking};
