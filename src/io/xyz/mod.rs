//! Plain and multi-frame XYZ coordinates, used to exchange conformers with external engines.

pub mod reader;
pub mod writer;
