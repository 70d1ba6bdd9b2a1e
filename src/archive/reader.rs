use super::error::Error;
use super::format::{self, Checksum};
use super::index::{Index, IndexEntry};
use crate::model::molecule::Molecule;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Attempts to reopen after a compaction removed the blob file between reading the index and
/// opening the blob.
const OPEN_RETRIES: usize = 3;

/// A stored molecule together with its archive metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryRecord {
    pub key: String,
    pub molecule: Molecule,
    /// Unix milliseconds.
    pub created_at: i64,
    /// SHA-256 of the uncompressed payload.
    pub checksum: Checksum,
    pub canonical_key: String,
}

/// Read-only snapshot of an archive.
///
/// The index is loaded once on open; records written afterwards are not visible until the
/// archive is reopened. Readers take no file lock.
pub struct ArchiveReader {
    dir: PathBuf,
    index: Index,
    blob: Option<Mutex<File>>,
}

impl ArchiveReader {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        let mut attempts = 0;
        loop {
            let index = Index::load(&dir)?;
            if index.len() == 0 {
                return Ok(Self {
                    dir,
                    index,
                    blob: None,
                });
            }
            let path = format::blob_path(&dir, index.generation);
            match File::open(&path) {
                Ok(file) => {
                    tracing::debug!(
                        dir = %dir.display(),
                        generation = index.generation,
                        records = index.len(),
                        "opened archive snapshot"
                    );
                    return Ok(Self {
                        dir,
                        index,
                        blob: Some(Mutex::new(file)),
                    });
                }
                Err(e) if e.kind() == ErrorKind::NotFound && attempts < OPEN_RETRIES => {
                    attempts += 1;
                }
                Err(e) => return Err(Error::io(path, e)),
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Blob generation this snapshot reads from.
    pub fn generation(&self) -> u64 {
        self.index.generation
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Keys in index order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.entries().iter().map(|e| e.key.as_str())
    }

    pub fn entries(&self) -> &[IndexEntry] {
        self.index.entries()
    }

    pub fn entry(&self, key: &str) -> Option<&IndexEntry> {
        self.index.get(key)
    }

    /// Keys of every record whose molecule has the given canonical key.
    pub fn find_canonical(&self, canonical_key: &str) -> Vec<&str> {
        self.index
            .entries()
            .iter()
            .filter(|e| e.canonical_key == canonical_key)
            .map(|e| e.key.as_str())
            .collect()
    }

    pub fn get(&self, key: &str) -> Result<Molecule, Error> {
        self.record(key).map(|r| r.molecule)
    }

    /// Reads and verifies one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown key and [`Error::Integrity`] when the
    /// stored block fails any check. A failing record does not affect other records.
    pub fn record(&self, key: &str) -> Result<LibraryRecord, Error> {
        let entry = self.index.get(key).ok_or_else(|| Error::NotFound {
            key: key.to_owned(),
        })?;
        self.read_entry(entry)
    }

    /// Lazily reads every record in index order. Each call starts from the beginning.
    pub fn iter(&self) -> Records<'_> {
        Records {
            reader: self,
            next: 0,
        }
    }

    fn read_entry(&self, entry: &IndexEntry) -> Result<LibraryRecord, Error> {
        let blob = self
            .blob
            .as_ref()
            .ok_or_else(|| Error::integrity(&entry.key, "archive has no blob file"))?;
        let bytes = read_block_at(&mut blob.lock(), entry)?;
        let block = format::decode_block(&bytes).map_err(|d| Error::integrity(&entry.key, d))?;

        if block.header.key != entry.key {
            return Err(Error::integrity(
                &entry.key,
                format!("block belongs to key '{}'", block.header.key),
            ));
        }
        if block.len as u64 != entry.size {
            return Err(Error::integrity(
                &entry.key,
                "block length differs from the index",
            ));
        }
        if block.header.checksum != entry.checksum {
            return Err(Error::integrity(
                &entry.key,
                "payload checksum differs from the index",
            ));
        }

        let molecule: Molecule = serde_json::from_slice(&block.payload).map_err(|e| {
            Error::integrity(&entry.key, format!("payload does not decode: {}", e))
        })?;

        Ok(LibraryRecord {
            key: entry.key.clone(),
            molecule,
            created_at: block.header.created_at,
            checksum: block.header.checksum,
            canonical_key: block.header.canonical_key,
        })
    }
}

/// Iterator over the records of an [`ArchiveReader`].
pub struct Records<'a> {
    reader: &'a ArchiveReader,
    next: usize,
}

impl Iterator for Records<'_> {
    type Item = Result<LibraryRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.reader.index.entries().get(self.next)?;
        self.next += 1;
        Some(self.reader.read_entry(entry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.reader.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Records<'_> {}

/// Reads the raw bytes of the block an entry points at.
pub(crate) fn read_block_at(file: &mut File, entry: &IndexEntry) -> Result<Vec<u8>, Error> {
    let file_len = file
        .metadata()
        .map_err(|e| Error::io(format!("<blob block of '{}'>", entry.key), e))?
        .len();
    if entry.offset.checked_add(entry.size).is_none_or(|end| end > file_len) {
        return Err(Error::integrity(
            &entry.key,
            "block extends past the end of the blob file",
        ));
    }
    let size = usize::try_from(entry.size)
        .map_err(|_| Error::integrity(&entry.key, "block size does not fit in memory"))?;
    let mut bytes = vec![0u8; size];
    let result = file
        .seek(SeekFrom::Start(entry.offset))
        .and_then(|_| file.read_exact(&mut bytes));
    match result {
        Ok(()) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::integrity(
            &entry.key,
            "block extends past the end of the blob file",
        )),
        Err(e) => Err(Error::Io {
            path: PathBuf::from(format!("<blob block of '{}'>", entry.key)),
            source: e,
        }),
    }
}
