//! Fixture writer shared by integration tests.

use std::io::Write;

use ip2region::xdb::{
    vector_entry_offset, INDEX_BLOCK_MIN_OFFSET, INDEX_POLICY_VECTOR, STRUCTURE_30,
    VECTOR_INDEX_COLS, VECTOR_INDEX_ROWS,
};
use ip2region::IpVersion;

/// Build an xdb file from ascending, gap-free `(start, end, region)` ranges.
///
/// Ranges are split at two-byte prefix boundaries the way production
/// builders lay them out.
pub fn build_xdb(version: IpVersion, ranges: &[(u128, u128, &str)]) -> Vec<u8> {
    let mut buf = vec![0u8; INDEX_BLOCK_MIN_OFFSET];

    let mut payloads = Vec::new();
    for (_, _, region) in ranges {
        payloads.push((buf.len() as u32, region.len() as u16));
        buf.extend_from_slice(region.as_bytes());
    }

    let segment_size = version.segment_index_size() as u32;
    let start_index_ptr = buf.len() as u32;
    let span = 1u128 << ((version.ip_bytes() - 2) * 8);
    let mut shards = vec![(0u32, 0u32, false); VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS];
    let mut ptr = start_index_ptr;

    for (idx, (start, end, _)) in ranges.iter().enumerate() {
        let mut from = *start;
        loop {
            let to = (from | (span - 1)).min(*end);
            match version {
                IpVersion::V4 => {
                    buf.extend_from_slice(&(from as u32).to_le_bytes());
                    buf.extend_from_slice(&(to as u32).to_le_bytes());
                }
                IpVersion::V6 => {
                    buf.extend_from_slice(&from.to_be_bytes());
                    buf.extend_from_slice(&to.to_be_bytes());
                }
            }
            buf.extend_from_slice(&payloads[idx].1.to_le_bytes());
            buf.extend_from_slice(&payloads[idx].0.to_le_bytes());

            let shard = &mut shards[version.shard_key(from)];
            if !shard.2 {
                *shard = (ptr, ptr, true);
            }
            shard.1 = ptr;
            ptr += segment_size;

            if to == *end {
                break;
            }
            from = to + 1;
        }
    }
    let end_index_ptr = ptr - segment_size;

    for (key, (s, e, _)) in shards.iter().enumerate() {
        let at = vector_entry_offset(key);
        buf[at..at + 4].copy_from_slice(&s.to_le_bytes());
        buf[at + 4..at + 8].copy_from_slice(&e.to_le_bytes());
    }

    buf[0..2].copy_from_slice(&STRUCTURE_30.to_le_bytes());
    buf[2..4].copy_from_slice(&INDEX_POLICY_VECTOR.to_le_bytes());
    buf[4..8].copy_from_slice(&1_700_000_000u32.to_le_bytes());
    buf[8..12].copy_from_slice(&start_index_ptr.to_le_bytes());
    buf[12..16].copy_from_slice(&end_index_ptr.to_le_bytes());
    buf[16..18].copy_from_slice(&version.header_id().to_le_bytes());
    buf[18..20].copy_from_slice(&4u16.to_le_bytes());
    buf
}

/// Write bytes to a temp file that lives as long as the returned handle.
pub fn write_temp(data: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(data).expect("Failed to write fixture");
    file.flush().expect("Failed to flush fixture");
    file
}
