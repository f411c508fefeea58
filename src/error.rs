// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

use binrw::Endian;

/// Four bytes identifying a format, printed as text when possible.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Magic(pub [u8; 4]);

impl Magic {
    pub(crate) fn from_slice(bytes: &[u8]) -> Self {
        let mut magic = [0; 4];
        let len = bytes.len().min(4);
        magic[..len].copy_from_slice(&bytes[..len]);
        Self(magic)
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic() || *b == 0) {
            for b in self.0 {
                if b == 0 {
                    write!(f, "\\0")?;
                } else {
                    write!(f, "{}", b as char)?;
                }
            }
            Ok(())
        } else {
            write!(f, "0x{:08X}", u32::from_be_bytes(self.0))
        }
    }
}

impl fmt::Debug for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Magic({self})")
    }
}

/// Errors produced while decoding a file.
///
/// Every error aborts the decode of the whole document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The magic bytes do not belong to the requested format.
    #[error("invalid header: found {found}, expected {expected}")]
    InvalidHeader {
        /// Magic read from the file.
        found: Magic,
        /// Magic the format requires.
        expected: Magic,
    },

    /// The magic is known but the version field is not.
    #[error("invalid version: {version}")]
    InvalidVersion {
        /// Version read from the file.
        version: u32,
    },

    /// An offset points outside of the buffer.
    #[error("corrupt offset {offset} ({size} bytes) in a buffer of {len} bytes")]
    CorruptOffset {
        /// Resolved offset, may be negative for corrupt 16-bit deltas.
        offset: i64,
        /// Number of bytes that had to be readable at `offset`.
        size: usize,
        /// Size of the buffer.
        len: usize,
    },

    /// A structural sanity check failed.
    #[error("structural invariant violated: {what}")]
    Invariant {
        /// Description of the failed check.
        what: String,
    },

    /// An enumerated field holds a value with no known meaning.
    #[error("invalid {what}: {value}")]
    InvalidValue {
        /// Name of the field.
        what: &'static str,
        /// Raw value.
        value: u32,
    },

    /// The layout is recognized but decoding it was never implemented.
    #[error("not implemented: {what}")]
    NotImplemented {
        /// The missing feature.
        what: &'static str,
    },

    /// The format cannot be decoded in this byte order.
    #[error("{format} does not support {endian:?} byte order")]
    UnsupportedByteOrder {
        /// Name of the format.
        format: &'static str,
        /// Requested or detected byte order.
        endian: Endian,
    },

    /// The options contradict what the file contains.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The external decompressor failed.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Any other failure reported by binrw.
    #[error(transparent)]
    Read(#[from] binrw::Error),
}

impl Error {
    pub(crate) fn invariant(what: impl Into<String>) -> Self {
        Error::Invariant { what: what.into() }
    }

    pub(crate) fn header(found: &[u8], expected: &[u8; 4]) -> Self {
        Error::InvalidHeader {
            found: Magic::from_slice(found),
            expected: Magic(*expected),
        }
    }

    /// Reads always start at a resolved offset, so running out of bytes means the offset was bad.
    pub(crate) fn from_read(error: binrw::Error, offset: usize, len: usize) -> Self {
        if error.is_eof() {
            Error::CorruptOffset {
                offset: offset as i64,
                size: 0,
                len,
            }
        } else {
            Error::Read(error)
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_display() {
        assert_eq!(Magic(*b"MXMD").to_string(), "MXMD");
        assert_eq!(Magic(*b"BC\0\0").to_string(), "BC\\0\\0");
        assert_eq!(Magic([0xDE, 0xAD, 0xBE, 0xEF]).to_string(), "0xDEADBEEF");
    }

    #[test]
    fn eof_becomes_corrupt_offset() {
        let io = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        let error = Error::from_read(binrw::Error::Io(io), 12, 8);
        assert!(matches!(
            error,
            Error::CorruptOffset {
                offset: 12,
                len: 8,
                ..
            }
        ));
    }
}
