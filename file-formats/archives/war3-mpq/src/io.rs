//! Byte sources an archive can be opened from

use crate::header::{HeaderLocation, find_header};
use crate::{Error, Result};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Anything an archive can be streamed from
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Where the on-disk bytes of an archive live
pub(crate) enum ArchiveSource<'a> {
    /// Nothing to read, for archives built in memory
    Empty,
    /// The caller's buffer
    Borrowed(&'a [u8]),
    /// A buffer read up front
    Owned(Vec<u8>),
    /// A stream that is sought on every read
    Stream {
        reader: RefCell<Box<dyn ReadSeek + 'a>>,
        len: u64,
    },
}

impl fmt::Debug for ArchiveSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Borrowed(bytes) => write!(f, "Borrowed({} bytes)", bytes.len()),
            Self::Owned(bytes) => write!(f, "Owned({} bytes)", bytes.len()),
            Self::Stream { len, .. } => write!(f, "Stream({len} bytes)"),
        }
    }
}

impl<'a> ArchiveSource<'a> {
    /// Wrap a stream, measuring its length
    pub(crate) fn stream<R: Read + Seek + 'a>(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        Ok(Self::Stream {
            reader: RefCell::new(Box::new(reader)),
            len,
        })
    }

    /// Total number of bytes available
    pub(crate) fn len(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::Borrowed(bytes) => bytes.len() as u64,
            Self::Owned(bytes) => bytes.len() as u64,
            Self::Stream { len, .. } => *len,
        }
    }

    /// Whether reads hit the stream rather than memory
    pub(crate) fn is_stream(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }

    /// Scan for the MPQ header
    pub(crate) fn find_header(&self) -> Result<HeaderLocation> {
        match self {
            Self::Empty => Err(Error::invalid_format("No MPQ header found")),
            Self::Borrowed(bytes) => find_header(&mut Cursor::new(*bytes)),
            Self::Owned(bytes) => find_header(&mut Cursor::new(bytes.as_slice())),
            Self::Stream { reader, .. } => find_header(&mut *reader.borrow_mut()),
        }
    }

    /// Read `len` bytes at `offset`, borrowing from the caller's buffer
    /// when there is one
    pub(crate) fn read_at(&self, offset: u64, len: usize) -> Result<Cow<'a, [u8]>> {
        let end = offset
            .checked_add(len as u64)
            .filter(|&end| end <= self.len())
            .ok_or_else(|| {
                Error::invalid_format(format!(
                    "Read of {len} bytes at 0x{offset:X} runs past the end of the archive ({} bytes)",
                    self.len()
                ))
            })?;

        match self {
            Self::Empty => Ok(Cow::Owned(Vec::new())),
            Self::Borrowed(bytes) => Ok(Cow::Borrowed(&bytes[offset as usize..end as usize])),
            Self::Owned(bytes) => Ok(Cow::Owned(bytes[offset as usize..end as usize].to_vec())),
            Self::Stream { reader, .. } => {
                let mut reader = reader.borrow_mut();
                reader.seek(SeekFrom::Start(offset))?;
                let mut buffer = vec![0u8; len];
                reader.read_exact(&mut buffer)?;
                Ok(Cow::Owned(buffer))
            }
        }
    }

    /// Read a little-endian dword
    pub(crate) fn read_u32_at(&self, offset: u64) -> Result<[u8; 4]> {
        let bytes = self.read_at(offset, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes);
        Ok(word)
    }
}
