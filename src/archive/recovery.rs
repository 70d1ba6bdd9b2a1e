//! Index reconstruction from the blob region.
//!
//! Blocks are self-describing, so scanning the newest blob file from its start recovers every
//! record: the last block of a key provides its value and the first block of a key fixes its
//! position. A block that fails verification is skipped and the scan resumes at the next
//! header whose CRC checks out. Only a tail with no valid header after it is cut off, so later
//! appends are scannable again.

use super::error::Error;
use super::format::{self, BlockHeader, INDEX_FILE};
use super::index::{Index, IndexEntry};
use super::writer::{COMPACT_PREFIX, FileLock, open_lock_file};
use std::fs::{self, OpenOptions};
use std::path::Path;

/// Outcome of [`recover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Blob generation the index was rebuilt from.
    pub generation: u64,
    /// Valid blocks found, superseded ones included.
    pub blocks_scanned: usize,
    /// Distinct keys in the rebuilt index.
    pub records: usize,
    /// Blocks whose key appeared again later in the file.
    pub superseded: usize,
    /// Unreadable regions that were skipped, in file order.
    pub corrupt: Vec<CorruptRegion>,
    /// Offset of the torn tail, if one was cut off.
    pub truncated_at: Option<u64>,
    /// Bytes removed from the end of the blob file.
    pub discarded_bytes: u64,
    /// Why the tail was cut off.
    pub reason: Option<String>,
}

/// A stretch of the blob file that did not verify and was left out of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRegion {
    pub offset: u64,
    pub len: u64,
    /// Key from the block header, when the header itself was intact.
    pub key: Option<String>,
    pub details: String,
}

/// Rebuilds `index.mfi` in `dir` from the newest blob file.
///
/// Holds the archive's exclusive lock for the duration, so concurrent writers wait. Leftover
/// compaction files are removed.
pub fn recover(dir: impl AsRef<Path>) -> Result<RecoveryReport, Error> {
    let dir = dir.as_ref();
    let (lock_file, lock_path) = open_lock_file(dir)?;
    let _lock = FileLock::acquire(&lock_file, &lock_path)?;
    remove_compaction_leftovers(dir)?;

    let Some(generation) = committed_generation(dir)?.or(newest_generation(dir)?) else {
        Index::new(0).store(dir)?;
        tracing::info!(dir = %dir.display(), "no blob file found, wrote an empty index");
        return Ok(RecoveryReport {
            generation: 0,
            blocks_scanned: 0,
            records: 0,
            superseded: 0,
            corrupt: Vec::new(),
            truncated_at: None,
            discarded_bytes: 0,
            reason: None,
        });
    };

    remove_newer_generations(dir, generation)?;
    let blob_path = format::blob_path(dir, generation);
    let bytes = fs::read(&blob_path).map_err(|e| Error::io(&blob_path, e))?;

    let mut index = Index::new(generation);
    let mut offset = 0usize;
    let mut blocks_scanned = 0;
    let mut superseded = 0;
    let mut corrupt = Vec::new();
    let mut reason = None;
    while offset < bytes.len() {
        let details = match format::decode_block(&bytes[offset..]) {
            Ok(block) => {
                let entry = IndexEntry {
                    key: block.header.key,
                    offset: offset as u64,
                    size: block.len as u64,
                    checksum: block.header.checksum,
                    canonical_key: block.header.canonical_key,
                    created_at: block.header.created_at,
                };
                if index.upsert(entry).is_some() {
                    superseded += 1;
                }
                blocks_scanned += 1;
                offset += block.len;
                continue;
            }
            Err(details) => details,
        };

        let Some(resume) = format::next_header(&bytes, offset + 1) else {
            reason = Some(details);
            break;
        };
        let key = BlockHeader::decode(&bytes[offset..])
            .ok()
            .map(|(header, _)| header.key);
        tracing::warn!(
            offset,
            len = resume - offset,
            key = key.as_deref().unwrap_or_default(),
            reason = %details,
            "skipped unreadable region of blob file"
        );
        corrupt.push(CorruptRegion {
            offset: offset as u64,
            len: (resume - offset) as u64,
            key,
            details,
        });
        offset = resume;
    }

    let truncated_at = reason.as_ref().map(|_| offset as u64);
    let discarded_bytes = (bytes.len() - offset) as u64;
    if let Some(at) = truncated_at {
        let file = OpenOptions::new()
            .write(true)
            .open(&blob_path)
            .map_err(|e| Error::io(&blob_path, e))?;
        file.set_len(at)
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::io(&blob_path, e))?;
        tracing::warn!(
            offset = at,
            discarded_bytes,
            reason = reason.as_deref().unwrap_or_default(),
            "discarded unreadable tail of blob file"
        );
    }

    index.store(dir)?;

    let report = RecoveryReport {
        generation,
        blocks_scanned,
        records: index.len(),
        superseded,
        corrupt,
        truncated_at,
        discarded_bytes,
        reason,
    };
    tracing::info!(
        generation,
        records = report.records,
        blocks = report.blocks_scanned,
        skipped = report.corrupt.len(),
        "rebuilt archive index"
    );
    Ok(report)
}

/// Generation named by a readable index whose blob file exists.
///
/// A compaction that stopped between renaming its blob file and publishing its index leaves a
/// newer generation behind that later appends never reached.
fn committed_generation(dir: &Path) -> Result<Option<u64>, Error> {
    if !dir.join(INDEX_FILE).exists() {
        return Ok(None);
    }
    Ok(Index::load(dir)
        .ok()
        .map(|index| index.generation)
        .filter(|&generation| format::blob_path(dir, generation).exists()))
}

fn blob_generations(dir: &Path) -> Result<Vec<u64>, Error> {
    let mut generations = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name();
        if let Some(generation) = format::blob_generation(&name.to_string_lossy()) {
            generations.push(generation);
        }
    }
    Ok(generations)
}

fn newest_generation(dir: &Path) -> Result<Option<u64>, Error> {
    Ok(blob_generations(dir)?.into_iter().max())
}

fn remove_newer_generations(dir: &Path, generation: u64) -> Result<(), Error> {
    for stale in blob_generations(dir)?.into_iter().filter(|&g| g > generation) {
        let path = format::blob_path(dir, stale);
        fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        tracing::warn!(generation = stale, "removed uncommitted blob generation");
    }
    Ok(())
}

/// Deletes temp files of a compaction that never reached its rename.
fn remove_compaction_leftovers(dir: &Path) -> Result<(), Error> {
    for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with(COMPACT_PREFIX) {
            let path = entry.path();
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            tracing::debug!(path = %path.display(), "removed compaction leftover");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::reader::ArchiveReader;
    use crate::archive::testing::molecule;
    use crate::archive::writer::{ArchiveConfig, ArchiveWriter};
    use std::io::Write;

    fn seeded() -> (tempfile::TempDir, ArchiveWriter) {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArchiveWriter::open(dir.path(), &ArchiveConfig::default()).unwrap();
        writer.put("a", &molecule("a", 2), false).unwrap();
        writer.put("b", &molecule("b", 3), false).unwrap();
        writer.put("a", &molecule("a", 4), true).unwrap();
        (dir, writer)
    }

    fn block(key: &str) -> Vec<u8> {
        let payload = serde_json::to_vec(&molecule(key, 2)).unwrap();
        format::encode_block(key, "canon", 0, &payload, 6).unwrap().1
    }

    #[test]
    fn rebuilds_a_lost_index() {
        let (dir, _writer) = seeded();
        let before: Vec<IndexEntry> = ArchiveReader::open(dir.path()).unwrap().entries().to_vec();
        fs::remove_file(dir.path().join(format::INDEX_FILE)).unwrap();

        let report = recover(dir.path()).unwrap();

        assert_eq!(report.blocks_scanned, 3);
        assert_eq!(report.records, 2);
        assert_eq!(report.superseded, 1);
        assert!(report.corrupt.is_empty());
        assert_eq!(report.truncated_at, None);
        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert_eq!(reader.entries(), before.as_slice());
        assert_eq!(reader.get("a").unwrap().atom_count(), 4);
    }

    #[test]
    fn stops_at_a_torn_tail_and_trims_it() {
        let (dir, writer) = seeded();
        let blob_path = format::blob_path(dir.path(), 0);
        let clean_len = fs::metadata(&blob_path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&blob_path).unwrap();
        file.write_all(b"MFRB\x01partial").unwrap();
        drop(file);

        let report = recover(dir.path()).unwrap();

        assert_eq!(report.truncated_at, Some(clean_len));
        assert_eq!(report.discarded_bytes, 12);
        assert!(report.reason.is_some());
        assert!(report.corrupt.is_empty());
        assert_eq!(fs::metadata(&blob_path).unwrap().len(), clean_len);

        writer.put("c", &molecule("c", 2), false).unwrap();
        fs::remove_file(dir.path().join(format::INDEX_FILE)).unwrap();
        assert_eq!(recover(dir.path()).unwrap().records, 3);
    }

    #[test]
    fn corrupt_block_in_the_middle_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArchiveWriter::open(dir.path(), &ArchiveConfig::default()).unwrap();
        for key in ["a", "b", "c", "d"] {
            writer.put(key, &molecule(key, 3), false).unwrap();
        }
        let damaged = writer.reader().unwrap().entry("b").unwrap().clone();
        let blob_path = format::blob_path(dir.path(), 0);
        let clean_len = fs::metadata(&blob_path).unwrap().len();
        let mut bytes = fs::read(&blob_path).unwrap();
        // Inside the compressed payload; the header CRC still passes.
        bytes[(damaged.offset + damaged.size - 8) as usize] ^= 0xFF;
        fs::write(&blob_path, &bytes).unwrap();
        fs::remove_file(dir.path().join(format::INDEX_FILE)).unwrap();

        let report = recover(dir.path()).unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.truncated_at, None);
        assert_eq!(report.discarded_bytes, 0);
        assert_eq!(report.corrupt.len(), 1);
        assert_eq!(report.corrupt[0].offset, damaged.offset);
        assert_eq!(report.corrupt[0].len, damaged.size);
        assert_eq!(report.corrupt[0].key.as_deref(), Some("b"));
        assert_eq!(fs::metadata(&blob_path).unwrap().len(), clean_len);

        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert_eq!(reader.keys().collect::<Vec<_>>(), vec!["a", "c", "d"]);
        assert_eq!(reader.get("c").unwrap().atom_count(), 3);
        assert_eq!(reader.get("d").unwrap().atom_count(), 3);
    }

    #[test]
    fn junk_between_blocks_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let first = block("x");
        let junk = b"\x00\x00noiseMFRB\x01";
        let mut bytes = first.clone();
        bytes.extend_from_slice(junk);
        bytes.extend_from_slice(&block("y"));
        fs::write(format::blob_path(dir.path(), 0), &bytes).unwrap();

        let report = recover(dir.path()).unwrap();

        assert_eq!(report.records, 2);
        assert_eq!(report.truncated_at, None);
        assert_eq!(
            report.corrupt,
            vec![CorruptRegion {
                offset: first.len() as u64,
                len: junk.len() as u64,
                key: None,
                details: "bad block magic".to_owned(),
            }]
        );
        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert_eq!(reader.get("y").unwrap(), molecule("y", 2));
    }

    #[test]
    fn torn_write_followed_by_an_append_keeps_both_records() {
        let (dir, writer) = seeded();
        let blob_path = format::blob_path(dir.path(), 0);
        let clean_len = fs::metadata(&blob_path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&blob_path).unwrap();
        file.write_all(b"MFRB\x01partial").unwrap();
        drop(file);

        let entry = writer.put("c", &molecule("c", 2), false).unwrap();
        assert_eq!(entry.offset, clean_len + 12);
        assert_eq!(writer.reader().unwrap().get("c").unwrap().atom_count(), 2);

        fs::remove_file(dir.path().join(format::INDEX_FILE)).unwrap();
        let report = recover(dir.path()).unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.truncated_at, None);
        assert_eq!(report.corrupt.len(), 1);
        assert_eq!(report.corrupt[0].offset, clean_len);
        assert_eq!(report.corrupt[0].len, 12);
        let reader = ArchiveReader::open(dir.path()).unwrap();
        assert_eq!(reader.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(reader.get("c").unwrap().atom_count(), 2);
    }

    #[test]
    fn picks_the_newest_generation() {
        let (dir, writer) = seeded();
        writer.compact().unwrap();
        fs::remove_file(dir.path().join(format::INDEX_FILE)).unwrap();

        let report = recover(dir.path()).unwrap();

        assert_eq!(report.generation, 1);
        assert_eq!(report.blocks_scanned, 2);
        assert_eq!(ArchiveReader::open(dir.path()).unwrap().generation(), 1);
    }

    #[test]
    fn uncommitted_generation_loses_to_the_indexed_one() {
        let (dir, writer) = seeded();
        let blob_path = format::blob_path(dir.path(), 0);
        let stale = format::blob_path(dir.path(), 1);
        fs::copy(&blob_path, &stale).unwrap();
        writer.put("c", &molecule("c", 2), false).unwrap();

        let report = recover(dir.path()).unwrap();

        assert_eq!(report.generation, 0);
        assert_eq!(report.records, 3);
        assert!(!stale.exists());
        assert!(ArchiveReader::open(dir.path()).unwrap().contains("c"));
    }

    #[test]
    fn compaction_leftovers_are_removed() {
        let (dir, _writer) = seeded();
        let leftover = dir.path().join(format!("{}abc123", COMPACT_PREFIX));
        fs::write(&leftover, b"MFRB\x01half a generation").unwrap();

        let report = recover(dir.path()).unwrap();

        assert!(!leftover.exists());
        assert_eq!(report.generation, 0);
        assert_eq!(report.records, 2);
    }

    #[test]
    fn empty_directory_gets_an_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let report = recover(dir.path()).unwrap();
        assert_eq!(report.records, 0);
        assert!(dir.path().join(format::INDEX_FILE).exists());
    }
}
