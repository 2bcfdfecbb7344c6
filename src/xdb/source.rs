//! Byte sources behind a searcher, one per cache policy.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use super::format::*;
use crate::{CachePolicy, Error, Result};

/// Read-only xdb file accessed with positioned reads.
///
/// Concurrent readers never share a file cursor. Platforms without
/// positioned reads serialize seek + read behind a lock.
pub struct XdbFile {
    #[cfg(any(unix, windows))]
    file: File,
    #[cfg(not(any(unix, windows)))]
    file: parking_lot::Mutex<File>,
    len: u64,
    path: PathBuf,
}

impl XdbFile {
    /// Open a file read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| open_error(path, "file handle", e))?;
        let len = file
            .metadata()
            .map_err(|e| open_error(path, "file metadata", e))?
            .len();

        Ok(Self {
            #[cfg(any(unix, windows))]
            file,
            #[cfg(not(any(unix, windows)))]
            file: parking_lot::Mutex::new(file),
            len,
            path: path.to_path_buf(),
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill `buf` from `offset`.
    #[cfg(unix)]
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    /// Fill `buf` from `offset`.
    #[cfg(windows)]
    pub fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.file.seek_read(buf, offset) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    buf = &mut std::mem::take(&mut buf)[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Fill `buf` from `offset`.
    #[cfg(not(any(unix, windows)))]
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        use std::io::{Seek, SeekFrom};
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    /// Read the header region and validate it against the file length.
    pub fn load_header(&self) -> Result<Header> {
        if self.len < HEADER_INFO_LENGTH as u64 {
            return Err(Error::Truncated {
                expected: HEADER_INFO_LENGTH,
                actual: self.len as usize,
            });
        }
        let mut buf = vec![0u8; HEADER_INFO_LENGTH];
        self.read_exact_at(&mut buf, 0)
            .map_err(|e| open_error(&self.path, "header", e))?;
        Header::load(&buf, self.len)
    }
}

fn open_error(path: &Path, what: &'static str, source: io::Error) -> Error {
    if source.kind() == io::ErrorKind::NotFound {
        Error::NotFound(path.to_path_buf())
    } else {
        Error::LoadFailure {
            path: path.to_path_buf(),
            what,
            source,
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Bytes of one xdb file under a fixed cache policy.
///
/// Every read is checked against the file length; reads served from the
/// file add one to the caller's I/O counter.
pub enum ContentSource {
    /// Nothing cached.
    FileOnly { file: XdbFile },
    /// Vector index in memory.
    VectorIndex {
        file: XdbFile,
        vector_index: Box<[u8]>,
    },
    /// Entire file in memory.
    Content { buffer: Box<[u8]> },
}

impl ContentSource {
    /// Open `path` under `policy` and load its header.
    ///
    /// Anything the policy preloads is loaded here; a failure is returned
    /// immediately and releases whatever was acquired.
    pub fn open(path: &Path, policy: CachePolicy) -> Result<(Self, Header)> {
        if is_gzip(path) && policy != CachePolicy::Content {
            return Err(Error::LoadFailure {
                path: path.to_path_buf(),
                what: "file handle",
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "gzip-compressed xdb files require the content cache policy",
                ),
            });
        }

        match policy {
            CachePolicy::FileOnly => {
                let file = XdbFile::open(path)?;
                let header = file.load_header()?;
                Ok((Self::FileOnly { file }, header))
            }
            CachePolicy::VectorIndex => {
                let file = XdbFile::open(path)?;
                let header = file.load_header()?;
                let mut vector_index = vec![0u8; VECTOR_INDEX_LENGTH].into_boxed_slice();
                file.read_exact_at(&mut vector_index, HEADER_INFO_LENGTH as u64)
                    .map_err(|e| open_error(path, "vector index", e))?;
                Ok((Self::VectorIndex { file, vector_index }, header))
            }
            CachePolicy::Content => {
                let buffer = load_content(path)?;
                let header = Header::load(&buffer, buffer.len() as u64)?;
                Ok((
                    Self::Content {
                        buffer: buffer.into_boxed_slice(),
                    },
                    header,
                ))
            }
        }
    }

    /// Wrap an in-memory copy of an xdb file.
    pub fn from_buffer(buffer: Vec<u8>) -> Result<(Self, Header)> {
        let header = Header::load(&buffer, buffer.len() as u64)?;
        Ok((
            Self::Content {
                buffer: buffer.into_boxed_slice(),
            },
            header,
        ))
    }

    pub fn policy(&self) -> CachePolicy {
        match self {
            Self::FileOnly { .. } => CachePolicy::FileOnly,
            Self::VectorIndex { .. } => CachePolicy::VectorIndex,
            Self::Content { .. } => CachePolicy::Content,
        }
    }

    /// Length of the underlying file.
    pub fn len(&self) -> u64 {
        match self {
            Self::FileOnly { file } | Self::VectorIndex { file, .. } => file.len(),
            Self::Content { buffer } => buffer.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `offset`.
    pub fn read(&self, offset: usize, len: usize, io_count: &mut u32) -> Result<Cow<'_, [u8]>> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end as u64 <= self.len())
            .ok_or_else(|| {
                Error::CorruptIndex(format!(
                    "read of {} bytes at offset {} runs past the {} byte file",
                    len,
                    offset,
                    self.len()
                ))
            })?;

        match self {
            Self::Content { buffer } => Ok(Cow::Borrowed(&buffer[offset..end])),
            Self::FileOnly { file } | Self::VectorIndex { file, .. } => {
                let mut buf = vec![0u8; len];
                file.read_exact_at(&mut buf, offset as u64)?;
                *io_count += 1;
                Ok(Cow::Owned(buf))
            }
        }
    }

    /// Vector index entry for a two-byte address prefix.
    pub fn shard(&self, key: usize, io_count: &mut u32) -> Result<Shard> {
        if key >= VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS {
            return Err(Error::CorruptIndex(format!("vector index key {} out of range", key)));
        }
        match self {
            Self::VectorIndex { vector_index, .. } => {
                let at = key * VECTOR_INDEX_SIZE;
                Shard::decode(&vector_index[at..at + VECTOR_INDEX_SIZE])
            }
            _ => {
                let bytes = self.read(vector_entry_offset(key), VECTOR_INDEX_SIZE, io_count)?;
                Shard::decode(&bytes)
            }
        }
    }
}

/// Read a whole xdb file, decompressing `*.gz` files.
fn load_content(path: &Path) -> Result<Vec<u8>> {
    if !is_gzip(path) {
        return fs::read(path).map_err(|e| open_error(path, "content", e));
    }

    let file = File::open(path).map_err(|e| open_error(path, "content", e))?;
    let mut buffer = Vec::new();
    GzDecoder::new(file)
        .read_to_end(&mut buffer)
        .map_err(|e| open_error(path, "content", e))?;
    log::debug!(
        "Decompressed {:?} into {} bytes of xdb content",
        path,
        buffer.len()
    );
    Ok(buffer)
}
