// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::{debug, warn};

use crate::common_file_operations::read_fixed_string;
use crate::context::{Context, ProcessOptions};
use crate::detect::MagicPair;
use crate::error::{Error, Result};
use crate::pointer::{CountedArray, DataRange, Pointer};
use crate::ByteSpan;

pub const SAR_MAGIC: MagicPair = MagicPair {
    big: *b"SAR1",
    little: *b"1RAS",
};

#[binrw]
#[derive(Debug)]
struct Header {
    magic: [u8; 4],
    file_size: u32,
    version: u32,
    entries: CountedArray<RawEntry>,
    data: Pointer<u8>,
    unk0: u32,
    unk1: u32,
    main_path: [u8; 128],
}

#[binrw]
#[derive(Debug)]
struct RawEntry {
    data: Pointer<u8>,
    data_size: u32,
    name_hash: u32,
    name: [u8; 52],
}

/// A file stored in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SarEntry {
    pub name: String,
    pub name_hash: u32,
    /// Where the file lives in the archive buffer.
    pub data: DataRange,
}

/// A SAR archive, used for character and animation bundles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sar {
    pub endian: Endian,
    pub version: u32,
    pub main_path: String,
    pub entries: Vec<SarEntry>,
}

impl Sar {
    /// Reads an existing SAR file.
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Sar> {
        let detected = SAR_MAGIC.detect(buffer)?;
        let endian = options.byte_order("SAR", Some(detected), &[Endian::Big, Endian::Little])?;
        let ctx = Context::new(buffer, endian, options.exclude);

        let header: Header = ctx.read(0)?;
        if header.file_size as usize != buffer.len() {
            warn!(header = header.file_size, actual = buffer.len(), "SAR file size mismatch");
        }
        let main_path = read_fixed_string(&header.main_path);
        debug!(?endian, path = %main_path, entries = header.entries.len(), "Decoding SAR");

        let entries = ctx
            .values(header.entries.pointer(), header.entries.len())?
            .into_iter()
            .map(|raw| {
                let data = match ctx.resolve(raw.data)? {
                    Some(at) => DataRange::new(at, raw.data_size as usize, buffer.len())?,
                    None if raw.data_size == 0 => DataRange::default(),
                    None => return Err(Error::invariant("entry with data has a null offset")),
                };
                Ok(SarEntry {
                    name: read_fixed_string(&raw.name),
                    name_hash: raw.name_hash,
                    data,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Sar {
            endian,
            version: header.version,
            main_path,
            entries,
        })
    }

    pub fn find(&self, name: &str) -> Option<&SarEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Bytes of the entry at `index`.
    pub fn extract<'a>(&self, buffer: ByteSpan<'a>, index: usize) -> Option<ByteSpan<'a>> {
        self.entries.get(index).map(|entry| entry.data.slice(buffer))
    }
}
