//! On-disk layout of the flat inner-product index.
//!
//! ```text
//! [magic "DSFI"][version: u32][dimension: u32][count: u32][crc32: u32]
//! [count * dimension little-endian f32]
//! ```
//!
//! The checksum covers the float payload only. Files are read through a
//! memory map and fully validated before any vector is trusted.

use crate::buffer::VectorBuffer;
use crate::error::{Result, SessionError};
use crate::persistence::serialization::read_u32;
use std::fs::File;
use std::path::Path;

const MAGIC: &[u8; 4] = b"DSFI";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 20;

/// Serialize a buffer into the flat index file format.
pub fn encode(buffer: &VectorBuffer) -> Result<Vec<u8>> {
    let dim = buffer.dimension().ok_or_else(|| {
        SessionError::SerializationError("cannot encode a buffer with no dimension".to_string())
    })?;
    let dim32 = to_u32(dim, "dimension")?;
    let count32 = to_u32(buffer.size(), "count")?;

    let mut payload = Vec::with_capacity(buffer.as_flat().len() * 4);
    for &val in buffer.as_flat() {
        payload.extend_from_slice(&val.to_le_bytes());
    }

    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&dim32.to_le_bytes());
    out.extend_from_slice(&count32.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse a flat index file image.
pub fn decode(bytes: &[u8]) -> Result<VectorBuffer> {
    if bytes.len() < HEADER_SIZE {
        return Err(SessionError::CorruptState(
            "index file too small for header".to_string(),
        ));
    }
    if &bytes[0..4] != MAGIC {
        return Err(SessionError::CorruptState("bad index file magic".to_string()));
    }
    let version = read_u32(&bytes[4..8]);
    if version != VERSION {
        return Err(SessionError::CorruptState(format!(
            "unsupported index file version {}",
            version
        )));
    }
    let dim = read_u32(&bytes[8..12]) as usize;
    let count = read_u32(&bytes[12..16]) as usize;
    let expected_crc = read_u32(&bytes[16..20]);

    let payload = &bytes[HEADER_SIZE..];
    let expected_len = dim
        .checked_mul(count)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| SessionError::CorruptState("index header overflows".to_string()))?;
    if payload.len() != expected_len {
        return Err(SessionError::CorruptState(format!(
            "index payload is {} bytes, header implies {}",
            payload.len(),
            expected_len
        )));
    }
    if crc32fast::hash(payload) != expected_crc {
        return Err(SessionError::CorruptState(
            "index payload checksum mismatch".to_string(),
        ));
    }

    let data: Vec<f32> = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    VectorBuffer::from_raw(dim, data)
}

/// Map `path` read-only and decode it.
pub fn read(path: &Path) -> Result<VectorBuffer> {
    let file = File::open(path).map_err(|e| SessionError::persistence(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| SessionError::persistence(path, e))?
        .len();
    if len == 0 {
        // zero-length files cannot be mapped on every platform
        return decode(&[]);
    }
    // SAFETY: the session directory is owned by this process; files are only
    // replaced by rename, never modified in place while mapped.
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| SessionError::persistence(path, e))?;
    decode(&mmap)
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| SessionError::SerializationError(format!("{} {} exceeds u32", what, value)))
}
