//! Full structural scan of an xdb file.
//!
//! Opt-in: neither [`verify`](crate::verify) nor [`Searcher::open`](crate::Searcher::open)
//! runs it. Files produced by older builders may leave parts of the address
//! space uncovered; those are reported as issues rather than rejected, so
//! callers decide which findings matter to them.

use std::net::IpAddr;
use std::path::Path;

use serde::Serialize;

use super::format::*;
use super::source::ContentSource;
use crate::{CachePolicy, Error, IpVersion, Result};

/// At most this many issues are kept in a report; the rest are only counted.
pub const MAX_REPORTED_ISSUES: usize = 32;

/// A structural problem found by [`check_index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IndexIssue {
    /// Record whose start is above its end
    InvertedRange { record: usize },
    /// Record that does not start after the previous one ends
    Overlap { record: usize, start: IpAddr },
    /// Addresses between two records belong to no record
    Gap { from: IpAddr, to: IpAddr },
    /// Payload pointer outside the file
    PayloadOutOfBounds { record: usize, data_ptr: u32, data_len: u16 },
    /// Payload that is not UTF-8
    InvalidPayload { record: usize },
    /// Vector index entry outside the IndexBlock or misaligned
    BadShard { key: usize },
}

/// Result of [`check_index`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexReport {
    pub header: Header,
    pub segment_count: usize,
    /// Total number of issues, including ones not kept in `issues`
    pub issue_count: usize,
    pub issues: Vec<IndexIssue>,
}

impl IndexReport {
    /// Whether the file satisfies every invariant lookups rely on.
    pub fn is_valid(&self) -> bool {
        self.issue_count == 0
    }

    fn push(&mut self, issue: IndexIssue) {
        self.issue_count += 1;
        if self.issues.len() < MAX_REPORTED_ISSUES {
            self.issues.push(issue);
        }
    }
}

/// Walk every IndexBlock record and vector index entry of the file at `path`.
///
/// Checks that records are ordered, non-overlapping and cover the whole
/// address space, that payloads lie in the file and decode as UTF-8, and
/// that every vector entry points inside the IndexBlock. The file is read
/// into memory once.
pub fn check_index(path: impl AsRef<Path>, ip_version: IpVersion) -> Result<IndexReport> {
    let (source, header) = ContentSource::open(path.as_ref(), CachePolicy::Content)?;
    check_source(&source, header, ip_version)
}

pub(crate) fn check_source(
    source: &ContentSource,
    header: Header,
    ip_version: IpVersion,
) -> Result<IndexReport> {
    if header.ip_version != ip_version {
        return Err(Error::IpVersionMismatch {
            expected: ip_version,
            actual: header.ip_version,
        });
    }

    let mut report = IndexReport {
        header,
        segment_count: header.segment_count(),
        issue_count: 0,
        issues: Vec::new(),
    };
    // In-memory reads; the counter stays at zero.
    let mut io_count = 0;
    let segment_size = header.segment_size();

    // Address the next record must start at; `None` once the top of the
    // address space is covered.
    let mut expected_next = Some(0u128);
    for record in 0..report.segment_count {
        let offset = header.start_index_ptr as usize + record * segment_size;
        let segment = Segment::decode(ip_version, &source.read(offset, segment_size, &mut io_count)?)?;

        if segment.start > segment.end {
            report.push(IndexIssue::InvertedRange { record });
            continue;
        }

        match expected_next {
            Some(next) if segment.start > next => report.push(IndexIssue::Gap {
                from: ip_version.to_ip(next),
                to: ip_version.to_ip(segment.start - 1),
            }),
            Some(next) if segment.start < next => report.push(IndexIssue::Overlap {
                record,
                start: ip_version.to_ip(segment.start),
            }),
            None => report.push(IndexIssue::Overlap {
                record,
                start: ip_version.to_ip(segment.start),
            }),
            _ => {}
        }
        let after = if segment.end >= ip_version.max_addr() {
            None
        } else {
            Some(segment.end + 1)
        };
        expected_next = match (expected_next, after) {
            (Some(next), Some(after)) => Some(next.max(after)),
            _ => None,
        };

        if segment.data_len > 0 {
            match source.read(segment.data_ptr as usize, segment.data_len as usize, &mut io_count) {
                Ok(bytes) => {
                    if std::str::from_utf8(&bytes).is_err() {
                        report.push(IndexIssue::InvalidPayload { record });
                    }
                }
                Err(_) => report.push(IndexIssue::PayloadOutOfBounds {
                    record,
                    data_ptr: segment.data_ptr,
                    data_len: segment.data_len,
                }),
            }
        }
    }

    if let Some(next) = expected_next {
        report.push(IndexIssue::Gap {
            from: ip_version.to_ip(next),
            to: ip_version.to_ip(ip_version.max_addr()),
        });
    }

    for key in 0..VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS {
        let shard = source.shard(key, &mut io_count)?;
        if shard.segment_count(&header).is_err() {
            report.push(IndexIssue::BadShard { key });
        }
    }

    log::debug!(
        "Checked {} segments: {} issue(s)",
        report.segment_count,
        report.issue_count
    );
    Ok(report)
}
