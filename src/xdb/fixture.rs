//! In-memory xdb builder for tests.

use super::format::*;
use crate::IpVersion;

/// How vector index entries map onto IndexBlock records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShardLayout {
    /// Segments are split at two-byte prefix boundaries and every vector
    /// entry covers only its own records.
    Split,
    /// Segments are stored as given and every vector entry spans the
    /// whole IndexBlock.
    Whole,
}

pub(crate) struct XdbBuilder {
    version: IpVersion,
    structure: u16,
    layout: ShardLayout,
    segments: Vec<(u128, u128, String)>,
}

impl XdbBuilder {
    pub(crate) fn new(version: IpVersion) -> Self {
        Self {
            version,
            structure: STRUCTURE_30,
            layout: ShardLayout::Split,
            segments: Vec::new(),
        }
    }

    pub(crate) fn structure(mut self, structure: u16) -> Self {
        self.structure = structure;
        self
    }

    pub(crate) fn layout(mut self, layout: ShardLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Segments must be added in ascending order.
    pub(crate) fn segment(mut self, start: u128, end: u128, region: &str) -> Self {
        self.segments.push((start, end, region.to_string()));
        self
    }

    fn records(&self) -> Vec<(u128, u128, usize)> {
        let mut records = Vec::new();
        let shard_span = 1u128 << ((self.version.ip_bytes() - 2) * 8);

        for (idx, (start, end, _)) in self.segments.iter().enumerate() {
            match self.layout {
                ShardLayout::Whole => records.push((*start, *end, idx)),
                ShardLayout::Split => {
                    let mut from = *start;
                    loop {
                        let shard_end = from | (shard_span - 1);
                        let to = shard_end.min(*end);
                        records.push((from, to, idx));
                        if to == *end {
                            break;
                        }
                        from = to + 1;
                    }
                }
            }
        }
        records
    }

    fn encode_addr(&self, addr: u128, out: &mut Vec<u8>) {
        match self.version {
            IpVersion::V4 => out.extend_from_slice(&(addr as u32).to_le_bytes()),
            IpVersion::V6 => out.extend_from_slice(&addr.to_be_bytes()),
        }
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let mut buf = vec![0u8; INDEX_BLOCK_MIN_OFFSET];

        // Data block
        let mut payloads = Vec::with_capacity(self.segments.len());
        for (_, _, region) in &self.segments {
            payloads.push((buf.len() as u32, region.len() as u16));
            buf.extend_from_slice(region.as_bytes());
        }

        // Index block
        let segment_size = self.version.segment_index_size() as u32;
        let start_index_ptr = buf.len() as u32;
        let records = self.records();
        let mut shards: Vec<Option<(u32, u32)>> = vec![None; VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS];

        for (i, (start, end, idx)) in records.iter().enumerate() {
            let ptr = start_index_ptr + i as u32 * segment_size;
            self.encode_addr(*start, &mut buf);
            self.encode_addr(*end, &mut buf);
            let (data_ptr, data_len) = payloads[*idx];
            buf.extend_from_slice(&data_len.to_le_bytes());
            buf.extend_from_slice(&data_ptr.to_le_bytes());

            let key = self.version.shard_key(*start);
            let entry = shards[key].get_or_insert((ptr, ptr));
            entry.1 = ptr;
        }
        let end_index_ptr = start_index_ptr + (records.len() as u32 - 1) * segment_size;

        // Vector index
        for (key, shard) in shards.iter().enumerate() {
            let (s, e) = match self.layout {
                ShardLayout::Whole => (start_index_ptr, end_index_ptr),
                ShardLayout::Split => shard.unwrap_or((0, 0)),
            };
            let at = vector_entry_offset(key);
            buf[at..at + 4].copy_from_slice(&s.to_le_bytes());
            buf[at + 4..at + 8].copy_from_slice(&e.to_le_bytes());
        }

        // Header
        buf[0..2].copy_from_slice(&self.structure.to_le_bytes());
        buf[2..4].copy_from_slice(&INDEX_POLICY_VECTOR.to_le_bytes());
        buf[4..8].copy_from_slice(&1_700_000_000u32.to_le_bytes());
        buf[8..12].copy_from_slice(&start_index_ptr.to_le_bytes());
        buf[12..16].copy_from_slice(&end_index_ptr.to_le_bytes());
        if self.structure == STRUCTURE_30 {
            buf[16..18].copy_from_slice(&self.version.header_id().to_le_bytes());
            buf[18..20].copy_from_slice(&4u16.to_le_bytes());
        }

        buf
    }
}
