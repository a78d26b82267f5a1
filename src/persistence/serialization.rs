//! Serialization utilities: bincode payloads in CRC-checked frames.
//!
//! A frame is `[length: u32][crc32: u32][payload]`, little-endian.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};

const FRAME_HEADER_SIZE: usize = 8;

/// Encode data to bincode bytes.
pub fn to_bincode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| SessionError::SerializationError(e.to_string()))
}

/// Decode data from bincode bytes.
pub fn from_bincode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| SessionError::SerializationError(e.to_string()))
}

/// Serialize `value` and wrap it in a checksummed frame.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let payload = to_bincode(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        SessionError::SerializationError(format!("payload of {} bytes too large", payload.len()))
    })?;
    let crc = crc32fast::hash(&payload);

    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Verify a frame and deserialize its payload.
pub fn decode_frame<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(SessionError::CorruptState(
            "frame shorter than its header".to_string(),
        ));
    }
    let len = read_u32(&bytes[0..4]) as usize;
    let expected_crc = read_u32(&bytes[4..8]);

    let payload = &bytes[FRAME_HEADER_SIZE..];
    if payload.len() != len {
        return Err(SessionError::CorruptState(format!(
            "frame declares {} payload bytes, found {}",
            len,
            payload.len()
        )));
    }
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(SessionError::CorruptState(format!(
            "frame checksum mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }
    from_bincode(payload)
}

pub(crate) fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataRecord;

    #[test]
    fn test_frame_roundtrip() {
        let records = vec![
            MetadataRecord::new("lease.pdf", 1, "Tenant shall pay rent monthly."),
            MetadataRecord::new("lease.pdf", 4, "Security deposit terms."),
        ];
        let bytes = encode_frame(&records).unwrap();
        let decoded: Vec<MetadataRecord> = decode_frame(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_frame_detects_corruption() {
        let mut bytes = encode_frame(&vec![MetadataRecord::new("a", 1, "x")]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            decode_frame::<Vec<MetadataRecord>>(&bytes),
            Err(SessionError::CorruptState(_))
        ));
    }

    #[test]
    fn test_frame_detects_truncation() {
        let bytes = encode_frame(&vec![MetadataRecord::new("a", 1, "x")]).unwrap();
        assert!(decode_frame::<Vec<MetadataRecord>>(&bytes[..bytes.len() - 2]).is_err());
        assert!(decode_frame::<Vec<MetadataRecord>>(&bytes[..3]).is_err());
    }
}
