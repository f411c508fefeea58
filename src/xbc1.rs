// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::debug;

use crate::common_file_operations::read_fixed_string;
use crate::context::{Context, ProcessOptions};
use crate::error::{Error, Result};
use crate::pointer::DataRange;
use crate::{ByteBuffer, ByteSpan};

pub const XBC1_MAGIC: [u8; 4] = *b"xbc1";

/// Size of the header in front of the compressed payload.
pub const XBC1_HEADER_SIZE: usize = 48;

/// Compression scheme of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// zlib stream with header.
    Zlib,
    Zstd,
}

impl Compression {
    fn from_raw(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Compression::Zlib),
            3 => Ok(Compression::Zstd),
            _ => Err(Error::InvalidVersion { version: value }),
        }
    }
}

/// Inflates compressed blocks. Codecs are supplied by the caller.
pub trait Decompressor {
    /// Decompresses `input`, which should produce exactly `output_size` bytes.
    fn decompress(
        &self,
        compression: Compression,
        input: &[u8],
        output_size: usize,
    ) -> Result<ByteBuffer>;
}

impl<F> Decompressor for F
where
    F: Fn(Compression, &[u8], usize) -> Result<ByteBuffer>,
{
    fn decompress(
        &self,
        compression: Compression,
        input: &[u8],
        output_size: usize,
    ) -> Result<ByteBuffer> {
        self(compression, input, output_size)
    }
}

#[binrw]
#[derive(Debug)]
struct Header {
    magic: [u8; 4],
    compression: u32,
    uncompressed_size: u32,
    compressed_size: u32,
    hash: u32,
    name: [u8; 28],
}

/// A compressed block, not yet inflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xbc1 {
    pub compression: Compression,
    pub uncompressed_size: usize,
    pub hash: u32,
    /// Name of the file this block was made from.
    pub name: String,
    /// Where the compressed payload lives in the buffer.
    pub payload: DataRange,
}

impl Xbc1 {
    /// Reads the block header at the start of `buffer`.
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Xbc1> {
        Self::read_at(buffer, 0, options)
    }

    /// Reads a block header embedded at `at`.
    pub fn read_at(buffer: ByteSpan, at: usize, options: &ProcessOptions) -> Result<Xbc1> {
        let endian = options.byte_order("xbc1", Some(Endian::Little), &[Endian::Little])?;
        let ctx = Context::new(buffer, endian, options.exclude);
        let header: Header = ctx.read(at)?;
        if header.magic != XBC1_MAGIC {
            return Err(Error::header(&header.magic, &XBC1_MAGIC));
        }

        let compression = Compression::from_raw(header.compression)?;
        let payload =
            DataRange::new(at + XBC1_HEADER_SIZE, header.compressed_size as usize, buffer.len())?;
        let name = read_fixed_string(&header.name);
        debug!(name = %name, ?compression, size = header.uncompressed_size, "Found xbc1 block");

        Ok(Xbc1 {
            compression,
            uncompressed_size: header.uncompressed_size as usize,
            hash: header.hash,
            name,
            payload,
        })
    }

    /// Inflates the payload, checking the result against the size in the header.
    pub fn decompress(
        &self,
        buffer: ByteSpan,
        decompressor: &impl Decompressor,
    ) -> Result<ByteBuffer> {
        let input = self.payload.slice(buffer);
        if input.len() != self.payload.len() {
            return Err(Error::CorruptOffset {
                offset: self.payload.offset() as i64,
                size: self.payload.len(),
                len: buffer.len(),
            });
        }

        let output = decompressor.decompress(self.compression, input, self.uncompressed_size)?;
        if output.len() != self.uncompressed_size {
            return Err(Error::Decompression(format!(
                "expected {} bytes, got {}",
                self.uncompressed_size,
                output.len()
            )));
        }
        Ok(output)
    }
}

/// Reads and inflates the block at the start of `buffer`.
pub fn decompress_xbc1(buffer: ByteSpan, decompressor: &impl Decompressor) -> Result<ByteBuffer> {
    Xbc1::from_existing(buffer, &ProcessOptions::default())?.decompress(buffer, decompressor)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_util::Builder;

    /// Stores blocks uncompressed, for tests.
    pub(crate) fn stored(_: Compression, input: &[u8], _: usize) -> Result<ByteBuffer> {
        Ok(input.to_vec())
    }

    pub(crate) fn block(payload: &[u8], compression: u32) -> Vec<u8> {
        let mut name = [0u8; 28];
        name[..10].copy_from_slice(b"test.wimdo");
        let mut b = Builder::new(Endian::Little);
        b.bytes(b"xbc1")
            .u32(compression)
            .u32(payload.len() as u32)
            .u32(payload.len() as u32)
            .u32(0x1234)
            .bytes(&name)
            .bytes(payload);
        b.finish()
    }

    #[test]
    fn read_block() {
        let data = block(b"hello", 3);
        let xbc1 = Xbc1::from_existing(&data, &ProcessOptions::default()).unwrap();
        assert_eq!(xbc1.compression, Compression::Zstd);
        assert_eq!(xbc1.payload.offset(), XBC1_HEADER_SIZE);
        assert_eq!(xbc1.decompress(&data, &stored).unwrap(), b"hello");
    }

    #[test]
    fn size_mismatch() {
        let data = block(b"hello", 1);
        let short = |_: Compression, input: &[u8], _: usize| -> Result<ByteBuffer> {
            Ok(input[..2].to_vec())
        };
        assert!(matches!(decompress_xbc1(&data, &short), Err(Error::Decompression(_))));
    }

    #[test]
    fn unknown_scheme() {
        let data = block(b"hello", 2);
        assert!(matches!(
            decompress_xbc1(&data, &stored),
            Err(Error::InvalidVersion { version: 2 })
        ));
    }

    #[test]
    fn truncated_payload() {
        let mut data = block(b"hello", 1);
        data.truncate(50);
        assert!(matches!(
            Xbc1::from_existing(&data, &ProcessOptions::default()),
            Err(Error::CorruptOffset { .. })
        ));
    }
}
