//! Random-access library of molecules and their conformers.
//!
//! An archive is a directory holding `index.mfi`, one blob file `blobs-<generation>.mfb`, and
//! a `lock` file. Records are appended to the blob file as self-describing blocks
//! (see [`format`]); the index maps each key to its block so a record can be read without
//! touching the rest of the library. Writers serialise on the lock file, readers work from an
//! index snapshot and never lock.

pub mod format;

mod error;
mod index;
mod reader;
mod recovery;
mod writer;

pub use error::Error;
pub use index::IndexEntry;
pub use reader::{ArchiveReader, LibraryRecord, Records};
pub use recovery::{RecoveryReport, recover};
pub use writer::{ArchiveConfig, ArchiveWriter, CompactionReport};
