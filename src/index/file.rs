//! Index file codec.
//!
//! Layout: `[magic: 8][version: u32][payload length: u64][crc32: u32][payload]`,
//! integers little-endian, payload bincode-encoded [`IndexFile`].

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VectorDbError};
use crate::index::flat::FlatIndex;
use crate::index::hnsw::{HnswGraph, HnswIndex};
use crate::index::{Index, IndexKind};
use crate::metric::MetricType;

pub const MAGIC: &[u8; 8] = b"VDBIDX\0\0";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 8 + 4 + 8 + 4;

/// The decoded contents of an index file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub metric: MetricType,
    pub dimension: usize,
    pub body: IndexBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexBody {
    Flat(FlatIndex),
    Hnsw(HnswGraph),
}

impl IndexFile {
    pub fn flat(index: FlatIndex) -> Self {
        Self {
            metric: index.metric(),
            dimension: index.dimension(),
            body: IndexBody::Flat(index),
        }
    }

    pub fn hnsw(index: HnswIndex) -> Self {
        Self {
            metric: index.metric(),
            dimension: index.dimension(),
            body: IndexBody::Hnsw(index.into_graph()),
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self.body {
            IndexBody::Flat(_) => IndexKind::Flat,
            IndexBody::Hnsw(_) => IndexKind::Hnsw,
        }
    }

    /// Turn the decoded payload into a searchable index.
    pub fn into_index(self) -> Result<Box<dyn Index>> {
        let index: Box<dyn Index> = match self.body {
            IndexBody::Flat(flat) => {
                flat.validate()?;
                Box::new(flat)
            }
            IndexBody::Hnsw(graph) => Box::new(HnswIndex::from_graph(graph)?),
        };

        if index.metric() != self.metric || index.dimension() != self.dimension {
            return Err(VectorDbError::SerializationError(format!(
                "header says {} / dimension {}, body says {} / dimension {}",
                self.metric,
                self.dimension,
                index.metric(),
                index.dimension()
            )));
        }
        Ok(index)
    }
}

/// Encode an index file into bytes.
pub fn encode(file: &IndexFile) -> Result<Vec<u8>> {
    let payload =
        bincode::serialize(file).map_err(|e| VectorDbError::SerializationError(e.to_string()))?;
    let crc = crc32fast::hash(&payload);

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<IndexFile> {
    let corrupt = |msg: String| VectorDbError::SerializationError(msg);

    if bytes.len() < HEADER_SIZE {
        return Err(corrupt(format!(
            "file is {} bytes, smaller than the {HEADER_SIZE} byte header",
            bytes.len()
        )));
    }
    if &bytes[0..8] != MAGIC {
        return Err(corrupt("bad magic, not an index file".to_string()));
    }

    let version = u32::from_le_bytes(le_array(&bytes[8..12]));
    if version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {version} (expected {FORMAT_VERSION})"
        )));
    }

    let declared = u64::from_le_bytes(le_array(&bytes[12..20]));
    let stored_crc = u32::from_le_bytes(le_array(&bytes[20..24]));
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() as u64 != declared {
        return Err(corrupt(format!(
            "payload is {} bytes, header declares {declared}",
            payload.len()
        )));
    }

    let actual_crc = crc32fast::hash(payload);
    if actual_crc != stored_crc {
        return Err(corrupt(format!(
            "checksum mismatch: stored {stored_crc:#010x}, computed {actual_crc:#010x}"
        )));
    }

    bincode::deserialize(payload).map_err(|e| corrupt(format!("payload decode failed: {e}")))
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

/// Write an index file, replacing any file already at `path`.
///
/// Bytes go to a sibling temp file first and are renamed into place, so a
/// reader never observes a partially written index.
pub fn write(path: impl AsRef<Path>, file: &IndexFile) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(file)?;

    let tmp = temp_path(path);
    {
        let mut out = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        out.write_all(&bytes)?;
        out.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read and verify an index file.
///
/// Every failure, from a missing file to a checksum mismatch, is reported
/// as [`VectorDbError::Load`] naming the path.
pub fn read(path: impl AsRef<Path>) -> Result<IndexFile> {
    let path = path.as_ref();
    let load_err = |reason: String| VectorDbError::Load {
        path: path.to_path_buf(),
        reason,
    };

    let handle = File::open(path).map_err(|e| load_err(e.to_string()))?;

    let mmap;
    let owned;
    // SAFETY: the map is read-only and dropped before this function returns.
    let bytes: &[u8] = match unsafe { Mmap::map(&handle) } {
        Ok(m) => {
            mmap = m;
            &mmap
        }
        // Fallback to regular I/O (empty files cannot be mapped on every platform)
        Err(_) => {
            owned = fs::read(path).map_err(|e| load_err(e.to_string()))?;
            &owned
        }
    };

    let file = decode(bytes).map_err(|e| load_err(e.to_string()))?;
    Ok(file)
}
