// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::{debug, trace};

use crate::context::{Context, Decode, ProcessOptions};
use crate::detect::expect_magic;
use crate::error::{Error, Result};
use crate::pointer::{CountedArray, DataRange, Pointer};
use crate::xbc1::{Decompressor, Xbc1};
use crate::{ByteBuffer, ByteSpan};

pub const DRSM_MAGIC: [u8; 4] = *b"DRSM";

/// The only known version.
pub const DRSM_VERSION: u32 = 10001;

const RESOURCES_ID: u32 = 0x1001;

/// Size of the file header, which stream data offsets are relative to the end of.
const HEADER_SIZE: usize = 16;

#[binrw]
#[derive(Debug)]
struct Header {
    magic: [u8; 4],
    version: u32,
    stream_data: Pointer<u8>,
    resources: Pointer<Resources>,
}

/// What a stream entry holds.
#[binrw]
#[brw(repr = u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEntryKind {
    Model = 0,
    Shaders = 1,
    LowTextures = 2,
    MiddleTextures = 3,
}

/// A span inside a decompressed stream.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEntry {
    pub offset: u32,
    pub size: u32,
    /// For middle textures, the stream holding the high resolution mip.
    pub unk_index: u16,
    pub kind: StreamEntryKind,
    #[br(temp)]
    #[bw(calc = [0; 2])]
    _null: [u32; 2],
}

impl StreamEntry {
    /// The entry's bytes inside a decompressed stream.
    pub fn slice<'a>(&self, stream: ByteSpan<'a>) -> Result<ByteSpan<'a>> {
        let range = DataRange::new(self.offset as usize, self.size as usize, stream.len())?;
        Ok(range.slice(stream))
    }
}

#[binrw]
#[derive(Debug)]
struct RawStream {
    compressed_size: u32,
    uncompressed_size: u32,
    data: Pointer<u8>,
}

/// A compressed stream. Its data offset is relative to the container that owns the resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream {
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Raw offset of the xbc1 block.
    pub data_offset: u32,
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawTexture {
    unk: u32,
    low_size: u32,
    low_offset: u32,
    name: Pointer<u8>,
}

/// A texture in a cached texture table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub unk: u32,
    /// Size of the low resolution copy in the low textures entry.
    pub low_size: u32,
    pub low_offset: u32,
    pub name: String,
}

impl Decode for Texture {
    type Raw = RawTexture;

    fn decode(raw: RawTexture, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(Texture {
            unk: raw.unk,
            low_size: raw.low_size,
            low_offset: raw.low_offset,
            name: ctx.string(raw.name)?,
        })
    }
}

impl Texture {
    /// Bytes of the low resolution copy inside the low textures entry.
    pub fn low_data<'a>(&self, entry: ByteSpan<'a>) -> Result<ByteSpan<'a>> {
        let range = DataRange::new(self.low_offset as usize, self.low_size as usize, entry.len())?;
        Ok(range.slice(entry))
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawTextureTable {
    textures: CountedArray<Texture>,
    null: u32,
    names: Pointer<u8>,
}

/// Texture names and low resolution spans. Offsets inside are relative to the table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureTable {
    /// Absolute offset of the table.
    pub offset: usize,
    pub textures: Vec<Texture>,
}

impl Decode for TextureTable {
    type Raw = RawTextureTable;

    fn decode(raw: RawTextureTable, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);
        ctx.resolve(raw.names)?;
        let textures = ctx.decode_array(raw.textures.pointer(), raw.textures.len())?;
        trace!(at, count = raw.textures.len(), "Decoded texture table");
        Ok(TextureTable { offset: at, textures })
    }
}

impl TextureTable {
    pub fn find(&self, name: &str) -> Option<&Texture> {
        self.textures.iter().find(|texture| texture.name == name)
    }

    /// Low resolution data of a table stored inline in a model container, where spans are
    /// relative to the table.
    pub fn inline_data<'a>(&self, buffer: ByteSpan<'a>, texture: &Texture) -> Result<ByteSpan<'a>> {
        let at = self.offset + texture.low_offset as usize;
        Ok(DataRange::new(at, texture.low_size as usize, buffer.len())?.slice(buffer))
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalResource {
    pub hash: u32,
    pub medium_uncompressed_size: u32,
    pub unk0: u32,
    pub high_uncompressed_size: u32,
    pub unk1: u32,
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawResources {
    id: u32,
    version: u32,
    stream_entries: CountedArray<StreamEntry>,
    streams: CountedArray<RawStream>,
    model_stream_entry_index: u32,
    shader_stream_entry_index: u32,
    low_textures_stream_entry_index: u32,
    low_textures_stream_index: u32,
    middle_textures_stream_index: u32,
    middle_textures_stream_entry_begin_index: u32,
    num_middle_textures_stream_entries: u32,
    texture_indices: CountedArray<i16>,
    textures: Pointer<TextureTable>,
    null0: u32,
    external_resources: CountedArray<ExternalResource>,
}

/// Streams and the entries inside them, shared by model containers and DRSM files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub version: u32,
    pub stream_entries: Vec<StreamEntry>,
    pub streams: Vec<Stream>,
    pub model_stream_entry_index: u32,
    pub shader_stream_entry_index: u32,
    pub low_textures_stream_entry_index: u32,
    pub low_textures_stream_index: u32,
    pub middle_textures_stream_index: u32,
    pub middle_textures_stream_entry_begin_index: u32,
    pub num_middle_textures_stream_entries: u32,
    /// Position of each middle texture in the texture table.
    pub texture_indices: Vec<i16>,
    pub textures: Option<TextureTable>,
    pub external_resources: Vec<ExternalResource>,
}

impl Decode for Resources {
    type Raw = RawResources;

    fn decode(raw: RawResources, at: usize, ctx: &Context<'_>) -> Result<Self> {
        if raw.id != RESOURCES_ID {
            return Err(Error::header(&raw.id.to_le_bytes(), &RESOURCES_ID.to_le_bytes()));
        }

        let ctx = ctx.rebase(at);
        let textures = ctx.follow(raw.textures)?;
        if textures.is_some() {
            check_index("low textures entry", raw.low_textures_stream_entry_index, &[2])?;
            check_index("low textures stream", raw.low_textures_stream_index, &[0])?;
            check_index(
                "middle textures first entry",
                raw.middle_textures_stream_entry_begin_index,
                &[0, 3],
            )?;
            if raw.middle_textures_stream_entry_begin_index != 0 {
                check_index("middle textures stream", raw.middle_textures_stream_index, &[1])?;
            }
        }
        check_index("model entry", raw.model_stream_entry_index, &[0])?;
        check_index("shader entry", raw.shader_stream_entry_index, &[1])?;

        let streams = ctx
            .values(raw.streams.pointer(), raw.streams.len())?
            .into_iter()
            .map(|stream| Stream {
                compressed_size: stream.compressed_size,
                uncompressed_size: stream.uncompressed_size,
                data_offset: stream.data.raw(),
            })
            .collect();

        Ok(Resources {
            version: raw.version,
            stream_entries: ctx.values(raw.stream_entries.pointer(), raw.stream_entries.len())?,
            streams,
            model_stream_entry_index: raw.model_stream_entry_index,
            shader_stream_entry_index: raw.shader_stream_entry_index,
            low_textures_stream_entry_index: raw.low_textures_stream_entry_index,
            low_textures_stream_index: raw.low_textures_stream_index,
            middle_textures_stream_index: raw.middle_textures_stream_index,
            middle_textures_stream_entry_begin_index: raw.middle_textures_stream_entry_begin_index,
            num_middle_textures_stream_entries: raw.num_middle_textures_stream_entries,
            texture_indices: ctx.values(raw.texture_indices.pointer(), raw.texture_indices.len())?,
            textures,
            external_resources: ctx.values(
                raw.external_resources.pointer(),
                raw.external_resources.len(),
            )?,
        })
    }
}

fn check_index(what: &str, value: u32, allowed: &[u32]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(Error::invariant(format!("{what} index is {value}, expected one of {allowed:?}")))
    }
}

impl Resources {
    fn entry(&self, index: u32) -> Option<&StreamEntry> {
        self.stream_entries.get(index as usize)
    }

    /// Vertex and index buffers, inside the first stream.
    pub fn model_entry(&self) -> Option<&StreamEntry> {
        self.entry(self.model_stream_entry_index)
    }

    pub fn shader_entry(&self) -> Option<&StreamEntry> {
        self.entry(self.shader_stream_entry_index)
    }

    pub fn low_textures_entry(&self) -> Option<&StreamEntry> {
        self.entry(self.low_textures_stream_entry_index)
    }

    /// The middle resolution entry of the texture at `texture` in the texture table, if it has one.
    pub fn middle_texture_entry(&self, texture: usize) -> Option<&StreamEntry> {
        let slot = self
            .texture_indices
            .iter()
            .position(|index| usize::try_from(*index).ok() == Some(texture))?;
        self.entry(self.middle_textures_stream_entry_begin_index + slot as u32)
    }
}

/// A model's streamed resources, stored next to the model container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drsm {
    pub version: u32,
    /// Absolute offset of the stream data section.
    pub stream_data: Option<usize>,
    pub resources: Resources,
}

impl Drsm {
    /// Reads an existing DRSM file.
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Drsm> {
        expect_magic(buffer, &DRSM_MAGIC)?;
        let endian = options.byte_order("DRSM", Some(Endian::Little), &[Endian::Little])?;
        let ctx = Context::new(buffer, endian, options.exclude);
        let header: Header = ctx.read(0)?;
        if header.version != DRSM_VERSION {
            return Err(Error::InvalidVersion {
                version: header.version,
            });
        }
        debug!(version = header.version, "Decoding DRSM");

        let stream_data = ctx.rebase(HEADER_SIZE).resolve(header.stream_data)?;
        let resources = ctx
            .follow(header.resources)?
            .ok_or_else(|| Error::invariant("DRSM file has no resources"))?;

        // stream blocks are relative to the file, not to the resources
        for stream in &resources.streams {
            ctx.resolve(Pointer::<u8>::new(stream.data_offset))?;
        }

        Ok(Drsm {
            version: header.version,
            stream_data,
            resources,
        })
    }

    /// The compressed block of stream `index`.
    pub fn stream_block(&self, buffer: ByteSpan, index: usize) -> Result<Xbc1> {
        let stream = self.resources.streams.get(index).ok_or_else(|| {
            Error::invariant(format!("stream {index} of {}", self.resources.streams.len()))
        })?;
        Xbc1::read_at(buffer, stream.data_offset as usize, &ProcessOptions::default())
    }

    /// Decompresses stream `index`.
    pub fn read_stream(
        &self,
        buffer: ByteSpan,
        index: usize,
        decompressor: &impl Decompressor,
    ) -> Result<ByteBuffer> {
        self.stream_block(buffer, index)?.decompress(buffer, decompressor)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_util::Builder;
    use crate::xbc1::tests::{block, stored};

    /// Resources with four entries and a two texture table, written at the current position.
    pub(crate) fn write_resources(b: &mut Builder, stream_at: u32) -> usize {
        let at = b.pos();
        b.u32(RESOURCES_ID).u32(1);
        b.u32(4).u32(0); // entries
        b.u32(1).u32(0); // streams
        b.u32s(&[0, 1, 2, 0, 1, 3, 1]);
        b.u32(1).u32(0); // texture indices
        b.u32(0).u32(0).u32(0).u32(0);

        let entries = b.pos() - at;
        b.u32(0).u32(4).u16(0).u16(0).u32s(&[0, 0]);
        b.u32(4).u32(3).u16(0).u16(1).u32s(&[0, 0]);
        b.u32(0).u32(16).u16(0).u16(2).u32s(&[0, 0]);
        b.u32(0).u32(2).u16(0).u16(3).u32s(&[0, 0]);
        let streams = b.pos() - at;
        b.u32(5).u32(5).u32(stream_at);
        let indices = b.pos() - at;
        b.i16(1).i16(0);

        let table = b.pos();
        b.u32(2).u32(16).u32(0).u32(0);
        b.u32(0).u32(8).u32(0).u32(0);
        b.u32(0).u32(8).u32(8).u32(0);
        let names = b.pos() - table;
        b.cstr("low").cstr("high");
        b.patch_u32(table + 12, names as u32)
            .patch_u32(table + 16 + 12, names as u32)
            .patch_u32(table + 32 + 12, names as u32 + 4);

        b.patch_u32(at + 12, entries as u32)
            .patch_u32(at + 20, streams as u32)
            .patch_u32(at + 56, indices as u32)
            .patch_u32(at + 60, (table - at) as u32);
        at
    }

    fn file() -> Vec<u8> {
        let mut b = Builder::new(Endian::Little);
        b.bytes(b"DRSM").u32(DRSM_VERSION).u32(0).u32(16);
        let stream_at = 0x200;
        write_resources(&mut b, stream_at);
        b.align(0x200);
        b.bytes(&block(b"abcdefg", 3));
        b.finish()
    }

    #[test]
    fn read_resources() {
        let data = file();
        let drsm = Drsm::from_existing(&data, &ProcessOptions::default()).unwrap();
        let resources = &drsm.resources;
        assert_eq!(resources.stream_entries.len(), 4);
        assert_eq!(resources.shader_entry().unwrap().kind, StreamEntryKind::Shaders);

        let textures = resources.textures.as_ref().unwrap();
        assert_eq!(textures.textures[0].name, "low");
        assert_eq!(textures.find("high").unwrap().low_offset, 8);
        assert_eq!(
            resources.middle_texture_entry(1).unwrap().kind,
            StreamEntryKind::MiddleTextures
        );
        assert!(resources.middle_texture_entry(0).is_none());

        let stream = drsm.read_stream(&data, 0, &stored).unwrap();
        assert_eq!(stream, b"abcdefg");
        assert_eq!(resources.model_entry().unwrap().slice(&stream).unwrap(), b"abcd");
        assert_eq!(resources.shader_entry().unwrap().slice(&stream).unwrap(), b"efg");
    }

    #[test]
    fn fixed_indices_checked() {
        let mut data = file();
        // shader entry index
        data[16 + 28..16 + 32].copy_from_slice(&5u32.to_le_bytes());
        assert!(matches!(
            Drsm::from_existing(&data, &ProcessOptions::default()),
            Err(Error::Invariant { .. })
        ));
    }

    #[test]
    fn wrong_version() {
        let mut data = file();
        data[4..8].copy_from_slice(&10002u32.to_le_bytes());
        assert!(matches!(
            Drsm::from_existing(&data, &ProcessOptions::default()),
            Err(Error::InvalidVersion { version: 10002 })
        ));
    }
}
