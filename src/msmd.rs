// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::debug;

use crate::context::{Context, Decode, ProcessOptions};
use crate::detect::MagicPair;
use crate::error::{Error, Result};
use crate::pointer::{Array, CountedArray, DataRange, Pointer};
use crate::ByteSpan;

pub const MSMD_MAGIC: MagicPair = MagicPair {
    big: *b"MSMD",
    little: *b"DMSM",
};

/// Big-endian map containers.
pub const MSMD_VERSION_1: u32 = 10011;
/// Little-endian map containers.
pub const MSMD_VERSION_2: u32 = 10112;

/// A span of the companion stream file.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamEntry {
    pub offset: u32,
    pub size: u32,
}

impl StreamEntry {
    /// The entry's bytes inside a stream file of `len` bytes.
    pub fn data_range(&self, len: usize) -> Result<DataRange> {
        DataRange::new(self.offset as usize, self.size as usize, len)
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub bbox: BoundingBox,
    pub center: [f32; 3],
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainModel {
    pub bounds: Bounds,
    pub unk03: [f32; 4],
    pub entry: StreamEntry,
    pub unk04: [f32; 4],
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectModel {
    pub bounds: Bounds,
    pub unk03: [f32; 4],
    pub entry: StreamEntry,
    pub unk01: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyboxModel {
    pub bounds: Bounds,
    pub unk03: [f32; 4],
    pub entry: StreamEntry,
}

/// Grass patches share the skybox layout.
pub type Grass = SkyboxModel;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTextureFile {
    pub mid_map: StreamEntry,
    pub high_map: StreamEntry,
    pub unk: u32,
}

/// A Havok collision blob stored in the stream file.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddedCollision {
    pub bounds: Bounds,
    pub unk03: [f32; 4],
    pub entry: StreamEntry,
    pub unk00: [u32; 3],
    /// Offset into the Havok name block.
    pub name_offset: u32,
    pub unk01: [u32; 3],
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TgldEntry {
    pub bounds: BoundingBox,
    pub entry: StreamEntry,
    pub unk01: [u32; 6],
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainLodModel {
    pub bounds: Bounds,
    pub unk00: f32,
    pub entry: StreamEntry,
    pub unk01: [u32; 2],
    pub unk02: [f32; 4],
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct DataSpan {
    data: Pointer<u8>,
    size: u32,
}

impl DataSpan {
    fn resolve(&self, ctx: &Context<'_>) -> Result<Option<DataRange>> {
        ctx.range(self.data, self.size as usize)
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawBvscEntry {
    data: DataSpan,
    index: u32,
    null: [u32; 4],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BvscEntry {
    pub data: Option<DataRange>,
    pub index: u32,
}

impl Decode for BvscEntry {
    type Raw = RawBvscEntry;

    fn decode(raw: RawBvscEntry, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(BvscEntry {
            data: raw.data.resolve(ctx)?,
            index: raw.index,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawBvscBlock {
    hash: u32,
    entries: Array<BvscEntry>,
    main: DataSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BvscBlock {
    pub hash: u32,
    pub entries: Vec<BvscEntry>,
    pub main: Option<DataRange>,
}

impl Decode for BvscBlock {
    type Raw = RawBvscBlock;

    fn decode(raw: RawBvscBlock, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(BvscBlock {
            hash: raw.hash,
            entries: ctx.decode_array(raw.entries.pointer(), raw.entries.len())?,
            main: raw.main.resolve(ctx)?,
        })
    }
}

#[binrw]
#[derive(Debug)]
struct HeaderBase {
    magic: [u8; 4],
    version: u32,
    null00: [u32; 4],
}

#[binrw]
#[derive(Debug)]
struct RawHeaderV1 {
    base: HeaderBase,
    terrain_models: CountedArray<TerrainModel>,
    objects: CountedArray<ObjectModel>,
    collisions: CountedArray<EmbeddedCollision>,
    skybox_models: CountedArray<SkyboxModel>,
    null00: [u32; 6],
    object_streams: CountedArray<StreamEntry>,
    object_textures: CountedArray<ObjectTextureFile>,
    havok_names: Pointer<u8>,
    grass: CountedArray<Grass>,
    unk00: CountedArray<StreamEntry>,
    unk01: CountedArray<StreamEntry>,
    tgld_names: CountedArray<Pointer<u8>>,
    cached_tgld: Pointer<u8>,
    tglds: CountedArray<TgldEntry>,
    terrain_cached_textures: CountedArray<StreamEntry>,
    terrain_streaming_textures: CountedArray<StreamEntry>,
    bvsc: Array<BvscBlock>,
    lcmd: DataSpan,
    effects: CountedArray<StreamEntry>,
    terrain_lod_models: CountedArray<TerrainLodModel>,
    null02: u32,
    unk02: CountedArray<StreamEntry>,
    map_terrain_buffers: CountedArray<StreamEntry>,
    cems: Pointer<u8>,
}

/// A big-endian map container. Offsets are relative to the file.
#[derive(Debug, Clone, PartialEq)]
pub struct MsmdV1 {
    pub terrain_models: Vec<TerrainModel>,
    pub objects: Vec<ObjectModel>,
    pub collisions: Vec<EmbeddedCollision>,
    pub skybox_models: Vec<SkyboxModel>,
    pub object_streams: Vec<StreamEntry>,
    pub object_textures: Vec<ObjectTextureFile>,
    pub havok_names: Option<usize>,
    pub grass: Vec<Grass>,
    pub unk00: Vec<StreamEntry>,
    pub unk01: Vec<StreamEntry>,
    pub tgld_names: Vec<String>,
    pub cached_tgld: Option<usize>,
    pub tglds: Vec<TgldEntry>,
    pub terrain_cached_textures: Vec<StreamEntry>,
    pub terrain_streaming_textures: Vec<StreamEntry>,
    pub bvsc: Vec<BvscBlock>,
    pub lcmd: Option<DataRange>,
    pub effects: Vec<StreamEntry>,
    pub terrain_lod_models: Vec<TerrainLodModel>,
    pub unk02: Vec<StreamEntry>,
    pub map_terrain_buffers: Vec<StreamEntry>,
    pub cems: Option<usize>,
}

impl MsmdV1 {
    fn read(ctx: &Context<'_>) -> Result<Self> {
        let raw: RawHeaderV1 = ctx.read(0)?;
        let tgld_names = ctx
            .values(raw.tgld_names.pointer(), raw.tgld_names.len())?
            .into_iter()
            .map(|name| ctx.string(name))
            .collect::<Result<Vec<_>>>()?;

        Ok(MsmdV1 {
            terrain_models: ctx.values(raw.terrain_models.pointer(), raw.terrain_models.len())?,
            objects: ctx.values(raw.objects.pointer(), raw.objects.len())?,
            collisions: ctx.values(raw.collisions.pointer(), raw.collisions.len())?,
            skybox_models: ctx.values(raw.skybox_models.pointer(), raw.skybox_models.len())?,
            object_streams: ctx.values(raw.object_streams.pointer(), raw.object_streams.len())?,
            object_textures: ctx.values(raw.object_textures.pointer(), raw.object_textures.len())?,
            havok_names: ctx.resolve(raw.havok_names)?,
            grass: ctx.values(raw.grass.pointer(), raw.grass.len())?,
            unk00: ctx.values(raw.unk00.pointer(), raw.unk00.len())?,
            unk01: ctx.values(raw.unk01.pointer(), raw.unk01.len())?,
            tgld_names,
            cached_tgld: ctx.resolve(raw.cached_tgld)?,
            tglds: ctx.values(raw.tglds.pointer(), raw.tglds.len())?,
            terrain_cached_textures: ctx.values(
                raw.terrain_cached_textures.pointer(),
                raw.terrain_cached_textures.len(),
            )?,
            terrain_streaming_textures: ctx.values(
                raw.terrain_streaming_textures.pointer(),
                raw.terrain_streaming_textures.len(),
            )?,
            bvsc: ctx.decode_array(raw.bvsc.pointer(), raw.bvsc.len())?,
            lcmd: raw.lcmd.resolve(ctx)?,
            effects: ctx.values(raw.effects.pointer(), raw.effects.len())?,
            terrain_lod_models: ctx.values(
                raw.terrain_lod_models.pointer(),
                raw.terrain_lod_models.len(),
            )?,
            unk02: ctx.values(raw.unk02.pointer(), raw.unk02.len())?,
            map_terrain_buffers: ctx.values(
                raw.map_terrain_buffers.pointer(),
                raw.map_terrain_buffers.len(),
            )?,
            cems: ctx.resolve(raw.cems)?,
        })
    }

    /// Name of the TGLD at `index`.
    pub fn tgld_name(&self, index: usize) -> Option<&str> {
        self.tgld_names.get(index).map(String::as_str)
    }
}

#[binrw]
#[derive(Debug)]
struct RawHeaderV2 {
    base: HeaderBase,
    terrain_models: CountedArray<TerrainModel>,
    objects: CountedArray<ObjectModel>,
    null0: [u32; 2],
    skybox_models: CountedArray<SkyboxModel>,
    unk01: u32,
    null00: [u32; 5],
    object_streams: CountedArray<StreamEntry>,
    object_textures: CountedArray<ObjectTextureFile>,
    null01: [u32; 7],
    unk: u32,
    null02: u32,
    cached_tgld: Pointer<u8>,
    null03: [u32; 2],
    terrain_cached_textures: CountedArray<StreamEntry>,
    null04: [u32; 13],
    unk0: CountedArray<StreamEntry>,
    nerd: Pointer<u8>,
    null05: [u32; 3],
    lbigs: Pointer<u8>,
    dlcm: Pointer<u8>,
    null06: [u32; 7],
}

/// A little-endian map container. Sections that are not understood are only located.
#[derive(Debug, Clone, PartialEq)]
pub struct MsmdV2 {
    pub terrain_models: Vec<TerrainModel>,
    pub objects: Vec<ObjectModel>,
    pub skybox_models: Vec<SkyboxModel>,
    pub unk01: u32,
    pub object_streams: Vec<StreamEntry>,
    pub object_textures: Vec<ObjectTextureFile>,
    pub unk: u32,
    pub cached_tgld: Option<usize>,
    pub terrain_cached_textures: Vec<StreamEntry>,
    pub unk0: Vec<StreamEntry>,
    pub nerd: Option<usize>,
    pub lbigs: Option<usize>,
    pub dlcm: Option<usize>,
}

impl MsmdV2 {
    fn read(ctx: &Context<'_>) -> Result<Self> {
        let raw: RawHeaderV2 = ctx.read(0)?;
        Ok(MsmdV2 {
            terrain_models: ctx.values(raw.terrain_models.pointer(), raw.terrain_models.len())?,
            objects: ctx.values(raw.objects.pointer(), raw.objects.len())?,
            skybox_models: ctx.values(raw.skybox_models.pointer(), raw.skybox_models.len())?,
            unk01: raw.unk01,
            object_streams: ctx.values(raw.object_streams.pointer(), raw.object_streams.len())?,
            object_textures: ctx.values(raw.object_textures.pointer(), raw.object_textures.len())?,
            unk: raw.unk,
            cached_tgld: ctx.resolve(raw.cached_tgld)?,
            terrain_cached_textures: ctx.values(
                raw.terrain_cached_textures.pointer(),
                raw.terrain_cached_textures.len(),
            )?,
            unk0: ctx.values(raw.unk0.pointer(), raw.unk0.len())?,
            nerd: ctx.resolve(raw.nerd)?,
            lbigs: ctx.resolve(raw.lbigs)?,
            dlcm: ctx.resolve(raw.dlcm)?,
        })
    }
}

/// A decoded map container.
#[derive(Debug, Clone, PartialEq)]
pub enum Msmd {
    V1(MsmdV1),
    V2(MsmdV2),
}

impl Msmd {
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Msmd> {
        let detected = MSMD_MAGIC.detect(buffer)?;
        let version: u32 = Context::new(buffer, detected, options.exclude).read(4)?;
        let supported: &[Endian] = match version {
            MSMD_VERSION_1 => &[Endian::Big],
            MSMD_VERSION_2 => &[Endian::Little],
            version => return Err(Error::InvalidVersion { version }),
        };
        let endian = options.byte_order("MSMD", Some(detected), supported)?;
        debug!(version, ?endian, "Decoding MSMD");

        let ctx = Context::new(buffer, endian, options.exclude);
        match version {
            MSMD_VERSION_1 => Ok(Msmd::V1(MsmdV1::read(&ctx)?)),
            _ => Ok(Msmd::V2(MsmdV2::read(&ctx)?)),
        }
    }

    pub fn terrain_models(&self) -> &[TerrainModel] {
        match self {
            Msmd::V1(map) => &map.terrain_models,
            Msmd::V2(map) => &map.terrain_models,
        }
    }

    pub fn objects(&self) -> &[ObjectModel] {
        match self {
            Msmd::V1(map) => &map.objects,
            Msmd::V2(map) => &map.objects,
        }
    }

    pub fn object_streams(&self) -> &[StreamEntry] {
        match self {
            Msmd::V1(map) => &map.object_streams,
            Msmd::V2(map) => &map.object_streams,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Builder;

    const V1_HEADER_SIZE: usize = 216;

    fn bounds(b: &mut Builder) {
        b.f32s(&[-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]).f32s(&[0.0; 3]);
    }

    fn map_v1() -> Vec<u8> {
        let mut b = Builder::new(Endian::Big);
        b.bytes(b"MSMD").u32(MSMD_VERSION_1).zeros(16);
        b.zeros(V1_HEADER_SIZE - 24);

        let terrain = b.pos();
        bounds(&mut b);
        b.f32s(&[0.0; 4]).u32(0x40).u32(0x20).f32s(&[0.0; 4]);

        let names = b.pos();
        b.u32(0).u32(0);
        let first = b.pos();
        b.cstr("tgld_a");
        let second = b.pos();
        b.cstr("tgld_b").align(4);
        b.patch_u32(names, first as u32).patch_u32(names + 4, second as u32);

        let bvsc = b.pos();
        b.u32(0xC0FFEE).u32(0).u32(1).u32(0).u32(4);
        let entry = b.pos();
        b.u32(0).u32(2).u32(9).zeros(16);
        let lcmd = b.pos();
        b.bytes(b"LCMD");
        b.patch_u32(bvsc + 4, entry as u32)
            .patch_u32(bvsc + 12, lcmd as u32)
            .patch_u32(entry, lcmd as u32);

        b.patch_u32(24, 1)
            .patch_u32(28, terrain as u32)
            .patch_u32(124, 2)
            .patch_u32(128, names as u32)
            .patch_u32(160, bvsc as u32)
            .patch_u32(164, 1)
            .patch_u32(168, lcmd as u32)
            .patch_u32(172, 4);
        b.finish()
    }

    #[test]
    fn read_v1() {
        let data = map_v1();
        let Msmd::V1(map) = Msmd::from_existing(&data, &ProcessOptions::default()).unwrap() else {
            panic!("expected a big-endian map");
        };
        assert_eq!(map.terrain_models[0].entry, StreamEntry { offset: 0x40, size: 0x20 });
        assert_eq!(map.tgld_name(1), Some("tgld_b"));

        let block = &map.bvsc[0];
        assert_eq!(block.hash, 0xC0FFEE);
        assert_eq!(block.entries[0].index, 9);
        assert_eq!(block.entries[0].data.unwrap().slice(&data), b"LC");
        assert_eq!(map.lcmd.unwrap().slice(&data), b"LCMD");
        assert!(map.cems.is_none());
    }

    #[test]
    fn read_v2() {
        let mut b = Builder::new(Endian::Little);
        b.bytes(b"DMSM").u32(MSMD_VERSION_2).zeros(16);
        b.zeros(264 - 24);
        let object = b.pos();
        bounds(&mut b);
        b.f32s(&[0.0; 4]).u32(0x80).u32(0x10).u32(3);
        let tgld = b.pos();
        b.bytes(b"TGLD");
        b.patch_u32(32, 1)
            .patch_u32(36, object as u32)
            .patch_u32(132, tgld as u32);
        let data = b.finish();

        let map = Msmd::from_existing(&data, &ProcessOptions::default()).unwrap();
        assert_eq!(map.objects()[0].unk01, 3);
        assert_eq!(map.objects()[0].entry.data_range(0x100).unwrap().offset(), 0x80);
        let Msmd::V2(map) = map else {
            panic!("expected a little-endian map");
        };
        assert_eq!(map.cached_tgld, Some(tgld));
        assert!(map.nerd.is_none());
    }

    #[test]
    fn version_must_match_order() {
        let mut data = map_v1();
        data[..4].copy_from_slice(b"DMSM");
        data[4..8].copy_from_slice(&MSMD_VERSION_1.to_le_bytes());
        assert!(matches!(
            Msmd::from_existing(&data, &ProcessOptions::default()),
            Err(Error::UnsupportedByteOrder { format: "MSMD", .. })
        ));

        data[4..8].copy_from_slice(&10000u32.to_le_bytes());
        assert!(matches!(
            Msmd::from_existing(&data, &ProcessOptions::default()),
            Err(Error::InvalidVersion { version: 10000 })
        ));
    }
}
