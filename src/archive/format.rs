//! Binary layout of archive blocks.
//!
//! A blob file is a plain concatenation of self-describing blocks, so the index can always be
//! rebuilt from it. Block layout (big-endian):
//! - magic `MFRB` (4 bytes)
//! - version (1 byte)
//! - key length (2 bytes) and key (UTF-8)
//! - created_at (8 bytes, signed Unix milliseconds)
//! - canonical key length (2 bytes) and canonical key
//! - SHA-256 of the uncompressed payload (32 bytes)
//! - compressed payload length (8 bytes)
//! - header CRC-32C (4 bytes) over every preceding header byte
//! - deflate-compressed JSON payload

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub const BLOCK_MAGIC: [u8; 4] = *b"MFRB";
pub const INDEX_MAGIC: [u8; 4] = *b"MFIX";
pub const FORMAT_VERSION: u8 = 1;

pub(crate) const CRC_ALGORITHM: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);

pub(crate) const INDEX_FILE: &str = "index.mfi";
pub(crate) const LOCK_FILE: &str = "lock";
const BLOB_PREFIX: &str = "blobs-";
const BLOB_SUFFIX: &str = ".mfb";

/// SHA-256 digest of an uncompressed payload.
pub type Checksum = [u8; 32];

/// Fixed-size fields of a block header, excluding both strings.
const HEADER_FIXED: usize = 4 + 1 + 2 + 8 + 2 + 32 + 8 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub key: String,
    pub created_at: i64,
    pub canonical_key: String,
    pub checksum: Checksum,
    pub compressed_len: u64,
}

impl BlockHeader {
    pub fn encoded_len(&self) -> usize {
        HEADER_FIXED + self.key.len() + self.canonical_key.len()
    }

    /// Serializes the header, appending its CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&BLOCK_MAGIC);
        buf.push(FORMAT_VERSION);
        put_str(&mut buf, &self.key);
        buf.extend_from_slice(&self.created_at.to_be_bytes());
        put_str(&mut buf, &self.canonical_key);
        buf.extend_from_slice(&self.checksum);
        buf.extend_from_slice(&self.compressed_len.to_be_bytes());
        let crc = CRC_ALGORITHM.checksum(&buf);
        buf.extend_from_slice(&crc.to_be_bytes());
        buf
    }

    /// Parses and CRC-checks a header at the start of `bytes`.
    ///
    /// Returns the header and its encoded length. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), String> {
        let mut cursor = ByteCursor::new(bytes);
        if cursor.take(4)? != BLOCK_MAGIC {
            return Err("bad block magic".to_owned());
        }
        let version = cursor.u8()?;
        if version != FORMAT_VERSION {
            return Err(format!("unsupported block version {}", version));
        }
        let key = cursor.string()?;
        let created_at = cursor.i64()?;
        let canonical_key = cursor.string()?;
        let checksum: Checksum = cursor.array()?;
        let compressed_len = cursor.u64()?;
        let covered = cursor.position();
        let stored_crc = cursor.u32()?;

        if CRC_ALGORITHM.checksum(&bytes[..covered]) != stored_crc {
            return Err("header CRC mismatch".to_owned());
        }

        Ok((
            Self {
                key,
                created_at,
                canonical_key,
                checksum,
                compressed_len,
            },
            cursor.position(),
        ))
    }
}

/// A fully verified block.
#[derive(Debug)]
pub struct DecodedBlock {
    pub header: BlockHeader,
    /// Uncompressed payload.
    pub payload: Vec<u8>,
    /// Total encoded length, header included.
    pub len: usize,
}

/// Builds a block from an uncompressed payload.
pub fn encode_block(
    key: &str,
    canonical_key: &str,
    created_at: i64,
    payload: &[u8],
    level: u32,
) -> io::Result<(BlockHeader, Vec<u8>)> {
    let compressed = compress(payload, level)?;
    let header = BlockHeader {
        key: key.to_owned(),
        created_at,
        canonical_key: canonical_key.to_owned(),
        checksum: sha256(payload),
        compressed_len: compressed.len() as u64,
    };
    let mut block = header.encode();
    block.extend_from_slice(&compressed);
    Ok((header, block))
}

/// Decodes and verifies the block at the start of `bytes`.
///
/// Checks the header CRC, the payload bounds, decompression, and the payload checksum.
pub fn decode_block(bytes: &[u8]) -> Result<DecodedBlock, String> {
    let (header, header_len) = BlockHeader::decode(bytes)?;
    let end = usize::try_from(header.compressed_len)
        .ok()
        .and_then(|len| header_len.checked_add(len))
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| {
            format!(
                "payload of {} bytes runs past the end of the data",
                header.compressed_len
            )
        })?;

    let payload =
        decompress(&bytes[header_len..end]).map_err(|e| format!("decompression failed: {}", e))?;
    if sha256(&payload) != header.checksum {
        return Err("payload checksum mismatch".to_owned());
    }

    Ok(DecodedBlock {
        header,
        payload,
        len: end,
    })
}

/// Offset of the first position at or after `from` that starts a block header passing its CRC.
pub fn next_header(bytes: &[u8], from: usize) -> Option<usize> {
    (from..bytes.len().saturating_sub(BLOCK_MAGIC.len() - 1))
        .filter(|&at| bytes[at..].starts_with(&BLOCK_MAGIC))
        .find(|&at| BlockHeader::decode(&bytes[at..]).is_ok())
}

pub fn compress(payload: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(payload)?;
    encoder.finish()
}

pub fn decompress(bytes: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

pub fn sha256(bytes: &[u8]) -> Checksum {
    Sha256::digest(bytes).into()
}

pub fn hex(checksum: &Checksum) -> String {
    checksum.iter().map(|b| format!("{:02x}", b)).collect()
}

pub(crate) fn blob_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{}{}{}", BLOB_PREFIX, generation, BLOB_SUFFIX))
}

/// Extracts the generation from a blob file name such as `blobs-3.mfb`.
pub(crate) fn blob_generation(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(BLOB_PREFIX)?
        .strip_suffix(BLOB_SUFFIX)?
        .parse()
        .ok()
}

pub(crate) fn put_str(buf: &mut Vec<u8>, value: &str) {
    // Callers bound lengths to u16 before encoding.
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Bounds-checked big-endian reader over a byte slice.
pub(crate) struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        if self.remaining() < n {
            return Err(format!(
                "truncated: needed {} bytes at offset {}, {} available",
                n,
                self.pos,
                self.remaining()
            ));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, String> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, String> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, String> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, String> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    pub fn string(&mut self) -> Result<String, String> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| "string field is not UTF-8".to_owned())
    }
}
