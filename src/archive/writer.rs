use super::error::Error;
use super::format::{self, LOCK_FILE};
use super::index::{Index, IndexEntry, sync_dir};
use super::reader::{ArchiveReader, read_block_at};
use crate::config::Config;
use crate::model::molecule::Molecule;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

/// Name prefix of the temp file a compaction writes before renaming it into place.
pub(crate) const COMPACT_PREFIX: &str = ".compact-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Deflate level, 0 (store) to 9 (best).
    pub compression_level: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

/// Outcome of a compaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    pub generation: u64,
    pub records: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Exclusive advisory lock on the archive's `lock` file, released on drop.
pub(crate) struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    pub fn acquire(file: &'a File, path: &Path) -> Result<Self, Error> {
        file.lock().map_err(|e| Error::io(path, e))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) fn open_lock_file(dir: &Path) -> Result<(File, PathBuf), Error> {
    let path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| Error::io(&path, e))?;
    Ok((file, path))
}

/// Write handle on an archive directory.
///
/// Every mutation runs under an in-process mutex and the exclusive file lock, reloads the
/// index from disk, and publishes a new index atomically. Handles in different threads or
/// processes can therefore write to the same archive concurrently.
pub struct ArchiveWriter {
    dir: PathBuf,
    config: ArchiveConfig,
    /// Ranking and stereo settings behind stored canonical keys.
    key_config: Config,
    lock_file: File,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

impl ArchiveWriter {
    /// Opens the archive in `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>, config: &ArchiveConfig) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        let (lock_file, lock_path) = open_lock_file(&dir)?;
        Ok(Self {
            dir,
            config: *config,
            key_config: Config::default(),
            lock_file,
            lock_path,
            guard: Mutex::new(()),
        })
    }

    /// Creates a new archive in `dir`, failing if one already exists there.
    pub fn create(dir: impl AsRef<Path>, config: &ArchiveConfig) -> Result<Self, Error> {
        let writer = Self::open(dir, config)?;
        {
            let _lock = writer.exclusive()?;
            let index_path = writer.dir.join(format::INDEX_FILE);
            if index_path.exists() {
                return Err(Error::format(index_path, "an archive already exists here"));
            }
            Index::new(0).store(&writer.dir)?;
        }
        tracing::info!(dir = %writer.dir.display(), "created archive");
        Ok(writer)
    }

    /// Computes canonical keys with the ranking and stereo sections of `config` instead of
    /// the defaults.
    pub fn with_key_config(mut self, config: &Config) -> Self {
        self.key_config = config.clone();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Opens a read snapshot of the current state.
    pub fn reader(&self) -> Result<ArchiveReader, Error> {
        ArchiveReader::open(&self.dir)
    }

    /// Stores `mol` under `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - Non-empty record key of at most 65535 bytes.
    /// * `mol` - Molecule to persist, with every conformer.
    /// * `overwrite` - Replace an existing record instead of failing. The replaced record
    ///   keeps its position in iteration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateKey`] when `key` exists and `overwrite` is false; the blob
    /// file and index are left untouched in that case.
    pub fn put(&self, key: &str, mol: &Molecule, overwrite: bool) -> Result<IndexEntry, Error> {
        validate_key(key)?;
        let payload = serde_json::to_vec(mol).map_err(|source| Error::Serialize {
            key: key.to_owned(),
            source,
        })?;
        let canonical_key = mol.canonical_key_with(&self.key_config);
        let (header, block) = format::encode_block(
            key,
            &canonical_key,
            now_millis(),
            &payload,
            self.config.compression_level,
        )
        .map_err(|e| Error::io(&self.dir, e))?;

        let _guard = self.exclusive()?;
        let mut index = Index::load(&self.dir)?;
        if !overwrite && index.contains(key) {
            return Err(Error::DuplicateKey {
                key: key.to_owned(),
            });
        }

        let blob_path = format::blob_path(&self.dir, index.generation);
        let mut blob = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&blob_path)
            .map_err(|e| Error::io(&blob_path, e))?;
        let offset = blob
            .metadata()
            .map_err(|e| Error::io(&blob_path, e))?
            .len();
        if let Err(e) = blob.write_all(&block).and_then(|_| blob.sync_all()) {
            // Cut a partial block so the next append starts on a clean boundary.
            if let Err(rollback) = blob.set_len(offset) {
                tracing::warn!(offset, error = %rollback, "could not roll back a failed append");
            }
            return Err(Error::io(&blob_path, e));
        }

        let entry = IndexEntry {
            key: header.key,
            offset,
            size: block.len() as u64,
            checksum: header.checksum,
            canonical_key: header.canonical_key,
            created_at: header.created_at,
        };
        let replaced = index.upsert(entry.clone()).is_some();
        index.store(&self.dir)?;

        tracing::debug!(
            key,
            offset,
            size = entry.size,
            replaced,
            "stored archive record"
        );
        Ok(entry)
    }

    /// Rewrites live records into the next blob generation and drops the old blob file.
    ///
    /// The new generation is written to a temp file and renamed into place once complete, so
    /// a blob file never holds a partial generation. Readers opened before compaction keep
    /// reading their own generation.
    pub fn compact(&self) -> Result<CompactionReport, Error> {
        let _guard = self.exclusive()?;
        let index = Index::load(&self.dir)?;
        let old_path = format::blob_path(&self.dir, index.generation);
        let new_path = format::blob_path(&self.dir, index.generation + 1);

        let bytes_before = match fs::metadata(&old_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(e) => return Err(Error::io(&old_path, e)),
        };

        let mut staged = tempfile::Builder::new()
            .prefix(COMPACT_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| Error::io(&self.dir, e))?;
        let new_index = self.copy_live(&index, &old_path, &mut staged)?;
        staged
            .persist(&new_path)
            .map_err(|e| Error::io(&new_path, e.error))?;
        sync_dir(&self.dir)?;
        new_index.store(&self.dir)?;

        match fs::remove_file(&old_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&old_path, e)),
        }
        sync_dir(&self.dir)?;

        let bytes_after = new_index.entries().iter().map(|e| e.size).sum();
        let report = CompactionReport {
            generation: new_index.generation,
            records: new_index.len(),
            bytes_before,
            bytes_after,
        };
        tracing::info!(
            generation = report.generation,
            records = report.records,
            reclaimed = report.bytes_before.saturating_sub(report.bytes_after),
            "compacted archive"
        );
        Ok(report)
    }

    fn copy_live(
        &self,
        index: &Index,
        old_path: &Path,
        staged: &mut NamedTempFile,
    ) -> Result<Index, Error> {
        let staged_path = staged.path().to_path_buf();
        let out = staged.as_file_mut();
        let mut new_index = Index::new(index.generation + 1);
        let mut offset = 0u64;

        if index.len() > 0 {
            let mut source = File::open(old_path).map_err(|e| Error::io(old_path, e))?;
            for entry in index.entries() {
                let bytes = read_block_at(&mut source, entry)?;
                format::decode_block(&bytes).map_err(|d| Error::integrity(&entry.key, d))?;
                out.write_all(&bytes)
                    .map_err(|e| Error::io(&staged_path, e))?;
                new_index.upsert(IndexEntry {
                    offset,
                    ..entry.clone()
                });
                offset += entry.size;
            }
        }

        out.sync_all().map_err(|e| Error::io(&staged_path, e))?;
        Ok(new_index)
    }

    fn exclusive(&self) -> Result<(MutexGuard<'_, ()>, FileLock<'_>), Error> {
        let guard = self.guard.lock();
        let lock = FileLock::acquire(&self.lock_file, &self.lock_path)?;
        Ok((guard, lock))
    }
}

fn validate_key(key: &str) -> Result<(), Error> {
    let details = if key.is_empty() {
        "key is empty"
    } else if key.len() > u16::MAX as usize {
        "key is longer than 65535 bytes"
    } else {
        return Ok(());
    };
    Err(Error::InvalidKey {
        key: key.chars().take(64).collect(),
        details: details.to_owned(),
    })
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
