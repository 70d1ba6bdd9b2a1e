//! The archive index: key → block location, checksum and canonical key.
//!
//! Layout (big-endian): magic `MFIX`, version (1 byte), generation (8 bytes), entry count
//! (8 bytes), the entries, and a CRC-32C trailer over everything before it. Each entry holds
//! the key, block offset and size, payload SHA-256, canonical key, and `created_at`.

use super::error::Error;
use super::format::{
    self, ByteCursor, CRC_ALGORITHM, Checksum, FORMAT_VERSION, INDEX_FILE, INDEX_MAGIC,
};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Location and metadata of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: String,
    /// Byte offset of the block within the blob file.
    pub offset: u64,
    /// Encoded block length, header included.
    pub size: u64,
    /// SHA-256 of the uncompressed payload.
    pub checksum: Checksum,
    pub canonical_key: String,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl IndexEntry {
    pub fn checksum_hex(&self) -> String {
        format::hex(&self.checksum)
    }
}

/// Ordered entries with a key lookup. Iteration order is first-insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Index {
    pub generation: u64,
    entries: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
}

impl Index {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.positions.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Inserts or replaces an entry. A replaced entry keeps its position.
    pub fn upsert(&mut self, entry: IndexEntry) -> Option<IndexEntry> {
        match self.positions.get(&entry.key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i], entry)),
            None => {
                self.positions.insert(entry.key.clone(), self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&INDEX_MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&self.generation.to_be_bytes());
        buf.extend_from_slice(&(self.entries.len() as u64).to_be_bytes());
        for entry in &self.entries {
            format::put_str(&mut buf, &entry.key);
            buf.extend_from_slice(&entry.offset.to_be_bytes());
            buf.extend_from_slice(&entry.size.to_be_bytes());
            buf.extend_from_slice(&entry.checksum);
            format::put_str(&mut buf, &entry.canonical_key);
            buf.extend_from_slice(&entry.created_at.to_be_bytes());
        }
        let crc = CRC_ALGORITHM.checksum(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 4 {
            return Err("index file is truncated".to_owned());
        }
        let (body, trailer) = bytes.split_at(bytes.len() - 4);
        let stored_crc = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if CRC_ALGORITHM.checksum(body) != stored_crc {
            return Err("index CRC mismatch".to_owned());
        }

        let mut cursor = ByteCursor::new(body);
        if cursor.take(4)? != INDEX_MAGIC {
            return Err("bad index magic".to_owned());
        }
        let version = cursor.u8()?;
        if version != FORMAT_VERSION {
            return Err(format!("unsupported index version {}", version));
        }
        let generation = cursor.u64()?;
        let count = cursor.u64()?;

        let mut index = Self::new(generation);
        for _ in 0..count {
            let entry = IndexEntry {
                key: cursor.string()?,
                offset: cursor.u64()?,
                size: cursor.u64()?,
                checksum: cursor.array()?,
                canonical_key: cursor.string()?,
                created_at: cursor.i64()?,
            };
            if index.upsert(entry).is_some() {
                return Err("index lists a key twice".to_owned());
            }
        }
        if cursor.remaining() != 0 {
            return Err(format!("{} unexpected trailing bytes", cursor.remaining()));
        }
        Ok(index)
    }

    /// Loads the index of `dir`; a missing index file is an empty generation-0 archive.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(INDEX_FILE);
        match fs::read(&path) {
            Ok(bytes) => Self::decode(&bytes).map_err(|details| Error::format(&path, details)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::new(0)),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// Atomically replaces the index of `dir` (temp file, fsync, rename).
    pub fn store(&self, dir: &Path) -> Result<(), Error> {
        let path = dir.join(INDEX_FILE);
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(&self.encode())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;
        sync_dir(dir)
    }
}

#[cfg(unix)]
pub(crate) fn sync_dir(dir: &Path) -> Result<(), Error> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::io(dir, e))
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_dir: &Path) -> Result<(), Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, offset: u64) -> IndexEntry {
        IndexEntry {
            key: key.to_owned(),
            offset,
            size: 100,
            checksum: [7u8; 32],
            canonical_key: format!("canon-{}", key),
            created_at: 42,
        }
    }

    #[test]
    fn upsert_keeps_position_of_replaced_key() {
        let mut index = Index::new(0);
        index.upsert(entry("a", 0));
        index.upsert(entry("b", 100));
        let old = index.upsert(entry("a", 200)).unwrap();

        assert_eq!(old.offset, 0);
        let keys: Vec<&str> = index.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(index.get("a").unwrap().offset, 200);
    }

    #[test]
    fn encoded_index_decodes_identically() {
        let mut index = Index::new(3);
        index.upsert(entry("a", 0));
        index.upsert(entry("β", 100));

        let decoded = Index::decode(&index.encode()).unwrap();

        assert_eq!(decoded, index);
    }

    #[test]
    fn corrupted_index_fails_crc() {
        let mut index = Index::new(0);
        index.upsert(entry("a", 0));
        let mut bytes = index.encode();
        bytes[10] ^= 0xFF;

        assert_eq!(Index::decode(&bytes).unwrap_err(), "index CRC mismatch");
    }

    #[test]
    fn store_and_load_through_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Index::load(dir.path()).unwrap(), Index::new(0));

        let mut index = Index::new(1);
        index.upsert(entry("x", 0));
        index.store(dir.path()).unwrap();

        assert_eq!(Index::load(dir.path()).unwrap(), index);
    }
}
