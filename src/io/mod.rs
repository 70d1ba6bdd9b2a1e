//! Readers and writers for drawing (CDXML) and coordinate (MOL2, XYZ) formats.
//!
//! Stream-based functions take any `Read`/`BufRead`/`Write`; the `*_path` helpers open a file
//! and attach its path to every error they return.

mod cdxml;
mod error;
mod mol2;
mod xyz;

use crate::model::molecule::Molecule;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub use cdxml::reader::{Document, read_document as read_cdxml_document, read_molecule as read_cdxml};

pub use mol2::reader::{MOL2_PROVENANCE, read as read_mol2};
pub use mol2::writer::write_molecule as write_mol2;

pub use xyz::reader::{
    XyzBlock, check_signature as check_xyz_signature, read as read_xyz, read_single as read_xyz_single,
};
pub use xyz::writer::write_conformer as write_xyz_conformer;

pub use error::Error;

/// Reads a drawing file as a single molecule named after the file stem.
pub fn read_cdxml_path(path: impl AsRef<Path>) -> Result<Molecule, Error> {
    let path = path.as_ref();
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = File::open(path).map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    read_cdxml(BufReader::new(file), &name).map_err(|e| e.with_path(path.to_path_buf()))
}

/// Reads every captioned fragment of a drawing file.
pub fn read_cdxml_document_path(path: impl AsRef<Path>) -> Result<Document, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    read_cdxml_document(BufReader::new(file)).map_err(|e| e.with_path(path.to_path_buf()))
}

/// Reads a MOL2 file.
pub fn read_mol2_path(path: impl AsRef<Path>) -> Result<Molecule, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    read_mol2(BufReader::new(file)).map_err(|e| e.with_path(path.to_path_buf()))
}

/// Reads all frames of an XYZ file.
pub fn read_xyz_path(path: impl AsRef<Path>) -> Result<Vec<XyzBlock>, Error> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::from_io(e, Some(path.to_path_buf())))?;
    read_xyz(BufReader::new(file)).map_err(|e| e.with_path(path.to_path_buf()))
}
