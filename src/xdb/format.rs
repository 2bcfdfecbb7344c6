//! xdb format constants and record decoding.
//!
//! Every structure is decoded through bounds-checked little-endian
//! accessors over an owned byte region.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::{Error, IpVersion, Result};

/// Header size in bytes.
pub const HEADER_INFO_LENGTH: usize = 256;

/// Vector index rows (first address byte).
pub const VECTOR_INDEX_ROWS: usize = 256;

/// Vector index columns (second address byte).
pub const VECTOR_INDEX_COLS: usize = 256;

/// Size of one vector index entry: start_ptr (u32) + end_ptr (u32).
pub const VECTOR_INDEX_SIZE: usize = 8;

/// Total vector index length in bytes.
pub const VECTOR_INDEX_LENGTH: usize = VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS * VECTOR_INDEX_SIZE;

/// Smallest offset the IndexBlock may start at.
pub const INDEX_BLOCK_MIN_OFFSET: usize = HEADER_INFO_LENGTH + VECTOR_INDEX_LENGTH;

/// Structure version without the ip version / pointer width fields (IPv4 only).
pub const STRUCTURE_20: u16 = 2;

/// Structure version carrying the ip version and runtime pointer width.
pub const STRUCTURE_30: u16 = 3;

/// Index policy value for vector-indexed files.
pub const INDEX_POLICY_VECTOR: u16 = 1;

pub(crate) fn le_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn le_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Parsed xdb header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Structure version (2 or 3)
    pub version: u16,
    /// Index policy
    pub index_policy: u16,
    /// Unix timestamp the file was built at
    pub created_at: u32,
    /// Offset of the first IndexBlock record
    pub start_index_ptr: u32,
    /// Offset of the last IndexBlock record
    pub end_index_ptr: u32,
    /// Address family (always IPv4 for structure 2)
    pub ip_version: IpVersion,
    /// Width of file pointers the file was built for
    pub runtime_ptr_bytes: u16,
}

impl Header {
    /// Decode the fixed header region.
    ///
    /// Only the header itself is examined; use [`Header::validate`] to check
    /// its pointers against the file length.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_INFO_LENGTH {
            return Err(Error::Truncated {
                expected: HEADER_INFO_LENGTH,
                actual: buf.len(),
            });
        }

        // Length was checked above, so the fixed-offset reads below cannot fail.
        let field16 = |offset| le_u16(buf, offset).unwrap_or_default();
        let field32 = |offset| le_u32(buf, offset).unwrap_or_default();

        let version = field16(0);
        let (ip_version, runtime_ptr_bytes) = match version {
            STRUCTURE_20 => (IpVersion::V4, 4),
            STRUCTURE_30 => {
                let id = field16(16);
                let ip_version = IpVersion::from_header_id(id).ok_or_else(|| {
                    Error::MalformedOffsets(format!("ip version field {} is neither 4 nor 6", id))
                })?;
                (ip_version, field16(18))
            }
            other => return Err(Error::UnsupportedVersion(other)),
        };

        Ok(Self {
            version,
            index_policy: field16(2),
            created_at: field32(4),
            start_index_ptr: field32(8),
            end_index_ptr: field32(12),
            ip_version,
            runtime_ptr_bytes,
        })
    }

    /// Check that every region the header declares lies inside a file of
    /// `file_len` bytes.
    pub fn validate(&self, file_len: u64) -> Result<()> {
        if file_len < INDEX_BLOCK_MIN_OFFSET as u64 {
            return Err(Error::Truncated {
                expected: INDEX_BLOCK_MIN_OFFSET,
                actual: file_len as usize,
            });
        }

        let start = self.start_index_ptr as u64;
        let end = self.end_index_ptr as u64;
        let segment_size = self.segment_size() as u64;

        if start < INDEX_BLOCK_MIN_OFFSET as u64 {
            return Err(Error::MalformedOffsets(format!(
                "index block starts at {} inside the vector index (ends at {})",
                start, INDEX_BLOCK_MIN_OFFSET
            )));
        }
        if end < start {
            return Err(Error::MalformedOffsets(format!(
                "end index pointer {} precedes start index pointer {}",
                end, start
            )));
        }
        if (end - start) % segment_size != 0 {
            return Err(Error::MalformedOffsets(format!(
                "index block span {} is not a multiple of the {} byte record size",
                end - start,
                segment_size
            )));
        }
        if end + segment_size > file_len {
            return Err(Error::MalformedOffsets(format!(
                "index block ends at {} beyond file length {}",
                end + segment_size,
                file_len
            )));
        }

        match self.runtime_ptr_bytes {
            1..=7 => {
                let max_ptr = (1u64 << (self.runtime_ptr_bytes as u64 * 8)) - 1;
                if file_len > max_ptr {
                    return Err(Error::PointerOverflow {
                        ptr_bytes: self.runtime_ptr_bytes,
                        file_len,
                    });
                }
            }
            8 => {}
            other => {
                return Err(Error::MalformedOffsets(format!(
                    "runtime pointer width {} out of range",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Parse and validate in one step.
    pub fn load(buf: &[u8], file_len: u64) -> Result<Self> {
        let header = Self::parse(buf)?;
        header.validate(file_len)?;
        Ok(header)
    }

    /// Size of one IndexBlock record for this file.
    pub fn segment_size(&self) -> usize {
        self.ip_version.segment_index_size()
    }

    /// Number of IndexBlock records.
    ///
    /// Exact only once [`Header::validate`] passed; inverted pointers count
    /// as a single record.
    pub fn segment_count(&self) -> usize {
        self.end_index_ptr.saturating_sub(self.start_index_ptr) as usize / self.segment_size() + 1
    }

    /// Build time as a `SystemTime`.
    pub fn created_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.created_at as u64)
    }
}

/// Offset of the vector index entry for `key`.
pub fn vector_entry_offset(key: usize) -> usize {
    HEADER_INFO_LENGTH + key * VECTOR_INDEX_SIZE
}

/// One vector index entry: the inclusive range of IndexBlock records
/// sharing a two-byte address prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub start_ptr: u32,
    pub end_ptr: u32,
}

impl Shard {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match (le_u32(bytes, 0), le_u32(bytes, 4)) {
            (Some(start_ptr), Some(end_ptr)) => Ok(Self { start_ptr, end_ptr }),
            _ => Err(Error::Truncated {
                expected: VECTOR_INDEX_SIZE,
                actual: bytes.len(),
            }),
        }
    }

    /// Number of records in the shard, after checking the shard lies on
    /// record boundaries inside the header's IndexBlock.
    pub fn segment_count(&self, header: &Header) -> Result<usize> {
        let segment_size = header.segment_size() as u32;
        let in_block = self.start_ptr >= header.start_index_ptr
            && self.end_ptr <= header.end_index_ptr
            && self.start_ptr <= self.end_ptr;
        if !in_block
            || (self.start_ptr - header.start_index_ptr) % segment_size != 0
            || (self.end_ptr - self.start_ptr) % segment_size != 0
        {
            return Err(Error::CorruptIndex(format!(
                "shard [{}, {}] outside index block [{}, {}] or misaligned",
                self.start_ptr, self.end_ptr, header.start_index_ptr, header.end_index_ptr
            )));
        }
        Ok(((self.end_ptr - self.start_ptr) / segment_size) as usize + 1)
    }
}

/// One IndexBlock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u128,
    pub end: u128,
    pub data_len: u16,
    pub data_ptr: u32,
}

impl Segment {
    /// Decode a record of the given family.
    pub fn decode(version: IpVersion, bytes: &[u8]) -> Result<Self> {
        let ip_bytes = version.ip_bytes();
        let size = version.segment_index_size();
        if bytes.len() < size {
            return Err(Error::Truncated {
                expected: size,
                actual: bytes.len(),
            });
        }

        let data_at = ip_bytes * 2;
        Ok(Self {
            start: version.decode_addr(&bytes[..ip_bytes]),
            end: version.decode_addr(&bytes[ip_bytes..data_at]),
            data_len: le_u16(bytes, data_at).unwrap_or_default(),
            data_ptr: le_u32(bytes, data_at + 2).unwrap_or_default(),
        })
    }

    pub fn contains(&self, addr: u128) -> bool {
        self.start <= addr && addr <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(version: u16, start: u32, end: u32, ip_version: u16) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_INFO_LENGTH];
        buf[0..2].copy_from_slice(&version.to_le_bytes());
        buf[2..4].copy_from_slice(&INDEX_POLICY_VECTOR.to_le_bytes());
        buf[4..8].copy_from_slice(&1_700_000_000u32.to_le_bytes());
        buf[8..12].copy_from_slice(&start.to_le_bytes());
        buf[12..16].copy_from_slice(&end.to_le_bytes());
        buf[16..18].copy_from_slice(&ip_version.to_le_bytes());
        buf[18..20].copy_from_slice(&4u16.to_le_bytes());
        buf
    }

    #[test]
    fn test_vector_index_length() {
        assert_eq!(VECTOR_INDEX_LENGTH, 524_288);
        assert_eq!(INDEX_BLOCK_MIN_OFFSET, 524_544);
        assert_eq!(vector_entry_offset(0x0102), 256 + 0x0102 * 8);
    }

    #[test]
    fn test_parse_structure_30() {
        let start = INDEX_BLOCK_MIN_OFFSET as u32 + 100;
        let buf = header_bytes(3, start, start + 14 * 9, 4);
        let header = Header::parse(&buf).unwrap();

        assert_eq!(header.version, STRUCTURE_30);
        assert_eq!(header.index_policy, INDEX_POLICY_VECTOR);
        assert_eq!(header.created_at, 1_700_000_000);
        assert_eq!(header.ip_version, IpVersion::V4);
        assert_eq!(header.runtime_ptr_bytes, 4);
        assert_eq!(header.segment_count(), 10);
    }

    #[test]
    fn test_parse_structure_20_is_ipv4() {
        let start = INDEX_BLOCK_MIN_OFFSET as u32;
        // Structure 2 leaves the ip version bytes undefined.
        let buf = header_bytes(2, start, start, 0xFFFF);
        let header = Header::parse(&buf).unwrap();
        assert_eq!(header.ip_version, IpVersion::V4);
        assert_eq!(header.runtime_ptr_bytes, 4);
    }

    #[test]
    fn test_parse_rejects_short_and_unknown() {
        assert!(matches!(
            Header::parse(&[0u8; 100]),
            Err(Error::Truncated { expected: 256, actual: 100 })
        ));
        let buf = header_bytes(9, 0, 0, 4);
        assert!(matches!(Header::parse(&buf), Err(Error::UnsupportedVersion(9))));
        let buf = header_bytes(3, 0, 0, 5);
        assert!(matches!(Header::parse(&buf), Err(Error::MalformedOffsets(_))));
    }

    #[test]
    fn test_validate_offsets() {
        let start = INDEX_BLOCK_MIN_OFFSET as u32;
        let file_len = start as u64 + 14 * 2;

        let ok = Header::parse(&header_bytes(3, start, start + 14, 4)).unwrap();
        assert!(ok.validate(file_len).is_ok());

        // Index block runs past the end of the file.
        let past_end = Header::parse(&header_bytes(3, start, start + 28, 4)).unwrap();
        assert!(matches!(
            past_end.validate(file_len),
            Err(Error::MalformedOffsets(_))
        ));

        // Misaligned span.
        let misaligned = Header::parse(&header_bytes(3, start, start + 13, 4)).unwrap();
        assert!(matches!(
            misaligned.validate(file_len),
            Err(Error::MalformedOffsets(_))
        ));

        // Index block overlapping the vector index.
        let inside = Header::parse(&header_bytes(3, 1024, 1024, 4)).unwrap();
        assert!(matches!(
            inside.validate(file_len),
            Err(Error::MalformedOffsets(_))
        ));

        // Inverted pointers.
        let inverted = Header::parse(&header_bytes(3, start + 14, start, 4)).unwrap();
        assert_eq!(inverted.segment_count(), 1);
        assert!(matches!(
            inverted.validate(file_len),
            Err(Error::MalformedOffsets(_))
        ));

        assert!(matches!(
            ok.validate(1000),
            Err(Error::Truncated { .. })
        ));

        // Two-byte pointers cannot reach past 64 KiB.
        let narrow = Header {
            runtime_ptr_bytes: 2,
            ..ok
        };
        assert!(matches!(
            narrow.validate(file_len),
            Err(Error::PointerOverflow { ptr_bytes: 2, .. })
        ));

        let zero = Header {
            runtime_ptr_bytes: 0,
            ..ok
        };
        assert!(matches!(zero.validate(file_len), Err(Error::MalformedOffsets(_))));
    }

    #[test]
    fn test_shard_bounds() {
        let start = INDEX_BLOCK_MIN_OFFSET as u32;
        let header = Header::parse(&header_bytes(3, start, start + 14 * 4, 4)).unwrap();

        let shard = Shard {
            start_ptr: start + 14,
            end_ptr: start + 14 * 3,
        };
        assert_eq!(shard.segment_count(&header).unwrap(), 3);

        let outside = Shard {
            start_ptr: 0,
            end_ptr: 0,
        };
        assert!(matches!(
            outside.segment_count(&header),
            Err(Error::CorruptIndex(_))
        ));

        let misaligned = Shard {
            start_ptr: start + 1,
            end_ptr: start + 15,
        };
        assert!(misaligned.segment_count(&header).is_err());
    }

    #[test]
    fn test_segment_decode_v4() {
        let mut record = Vec::new();
        record.extend_from_slice(&0x01020300u32.to_le_bytes());
        record.extend_from_slice(&0x010203FFu32.to_le_bytes());
        record.extend_from_slice(&7u16.to_le_bytes());
        record.extend_from_slice(&600_000u32.to_le_bytes());

        let segment = Segment::decode(IpVersion::V4, &record).unwrap();
        assert_eq!(segment.start, 0x01020300);
        assert_eq!(segment.end, 0x010203FF);
        assert_eq!(segment.data_len, 7);
        assert_eq!(segment.data_ptr, 600_000);
        assert!(segment.contains(0x01020304));
        assert!(!segment.contains(0x01020400));

        assert!(Segment::decode(IpVersion::V4, &record[..10]).is_err());
    }

    #[test]
    fn test_segment_decode_v6() {
        let mut record = Vec::new();
        record.extend_from_slice(&(1u128 << 120).to_be_bytes());
        record.extend_from_slice(&((2u128 << 120) - 1).to_be_bytes());
        record.extend_from_slice(&3u16.to_le_bytes());
        record.extend_from_slice(&9u32.to_le_bytes());

        let segment = Segment::decode(IpVersion::V6, &record).unwrap();
        assert_eq!(segment.start, 1u128 << 120);
        assert_eq!(segment.end, (2u128 << 120) - 1);
        assert_eq!(segment.data_len, 3);
        assert_eq!(segment.data_ptr, 9);
    }
}
