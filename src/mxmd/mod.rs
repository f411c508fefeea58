// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::debug;

use crate::context::{Context, ProcessOptions};
use crate::detect::MagicPair;
use crate::drsm::TextureTable;
use crate::error::{Error, Result};
use crate::pointer::{Array, DataRange, Pointer};

pub mod v1;
pub mod v2;
pub mod v3;

pub use v1::MxmdV1;
pub use v2::MxmdV2;
pub use v3::MxmdV3;

pub const MXMD_MAGIC: MagicPair = MagicPair {
    big: *b"MXMD",
    little: *b"DMXM",
};

/// Big-endian model containers.
pub const MXMD_VERSION_1: u32 = 10040;
/// Texture-only little-endian containers.
pub const MXMD_VERSION_2: u32 = 10111;
pub const MXMD_VERSION_3: u32 = 10112;

/// A 4x4 matrix, stored row by row.
pub type Matrix = [[f32; 4]; 4];

/// Meaning of one attribute in an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Position,
    Weight32,
    BoneId,
    WeightId,
    VertexColor2,
    Uv1,
    Uv2,
    Uv3,
    Uv4,
    VertexColor3,
    Normal32,
    Tangent16,
    VertexColor,
    Normal,
    Tangent,
    Tangent2,
    Normal2,
    Reflection,
    Weight16,
    BoneId2,
    /// Not understood, kept so the layout offsets stay correct.
    Other(u16),
}

impl VertexKind {
    pub fn from_raw(value: u16) -> Self {
        match value {
            0 => VertexKind::Position,
            1 => VertexKind::Weight32,
            2 => VertexKind::BoneId,
            3 => VertexKind::WeightId,
            4 => VertexKind::VertexColor2,
            5 => VertexKind::Uv1,
            6 => VertexKind::Uv2,
            7 => VertexKind::Uv3,
            8 => VertexKind::Uv4,
            14 => VertexKind::VertexColor3,
            15 => VertexKind::Normal32,
            16 => VertexKind::Tangent16,
            17 => VertexKind::VertexColor,
            28 => VertexKind::Normal,
            29 => VertexKind::Tangent,
            31 => VertexKind::Tangent2,
            32 => VertexKind::Normal2,
            33 => VertexKind::Reflection,
            41 => VertexKind::Weight16,
            42 => VertexKind::BoneId2,
            other => VertexKind::Other(other),
        }
    }

    /// Scalar width and count, for swapping the attribute to little-endian.
    ///
    /// Byte attributes report a width of one. Unknown kinds have no known layout.
    pub fn lanes(self) -> Result<(usize, usize)> {
        Ok(match self {
            VertexKind::Position | VertexKind::Normal32 | VertexKind::Weight32 => (4, 3),
            VertexKind::WeightId => (2, 1),
            VertexKind::Uv1 | VertexKind::Uv2 | VertexKind::Uv3 | VertexKind::Uv4 => (4, 2),
            VertexKind::Weight16 | VertexKind::Tangent16 => (2, 4),
            VertexKind::Normal
            | VertexKind::Normal2
            | VertexKind::Tangent
            | VertexKind::Tangent2
            | VertexKind::BoneId
            | VertexKind::BoneId2
            | VertexKind::VertexColor
            | VertexKind::VertexColor2
            | VertexKind::VertexColor3
            | VertexKind::Reflection => (1, 4),
            VertexKind::Other(value) => {
                return Err(Error::InvalidValue {
                    what: "vertex attribute kind",
                    value: value.into(),
                })
            }
        })
    }
}

#[binrw]
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawVertexDescriptor {
    kind: u16,
    size: u16,
}

/// One attribute of an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexDescriptor {
    pub kind: VertexKind,
    /// Bytes the attribute takes in each vertex.
    pub size: u16,
}

impl From<RawVertexDescriptor> for VertexDescriptor {
    fn from(raw: RawVertexDescriptor) -> Self {
        VertexDescriptor {
            kind: VertexKind::from_raw(raw.kind),
            size: raw.size,
        }
    }
}

/// Reads the descriptor list of a vertex buffer.
pub(crate) fn read_descriptors(
    ctx: &Context<'_>,
    array: Array<RawVertexDescriptor>,
) -> Result<Vec<VertexDescriptor>> {
    Ok(ctx
        .values(array.pointer(), array.len())?
        .into_iter()
        .map(VertexDescriptor::from)
        .collect())
}

/// Texture reference of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLink {
    pub texture_index: i16,
    /// Probably the sampler slot.
    pub unk: i16,
}

#[binrw]
#[derive(Debug)]
struct RawStreamedTextures {
    unk: u32,
    num_used_groups: u32,
    groups: [Pointer<TextureTable>; 2],
    group_ids: [Pointer<i16>; 2],
    data_offsets: [u32; 2],
    data_sizes: [u32; 2],
}

/// One group of streamed textures, whose data lives in the companion stream file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureGroup {
    pub textures: TextureTable,
    /// Texture index of each entry in `textures`.
    pub ids: Vec<i16>,
    /// Where the group's data lives in the stream file.
    pub data_offset: u32,
    pub data_size: u32,
    /// Size of the compressed block, for formats that compress groups.
    pub compressed_size: Option<u32>,
}

impl TextureGroup {
    /// Bytes to read from the stream file for this group.
    pub fn stored_size(&self) -> u32 {
        self.compressed_size.unwrap_or(self.data_size)
    }
}

/// Header of the textures stored in the companion stream file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedTextures {
    pub unk: u32,
    /// The used groups, at most two.
    pub groups: Vec<TextureGroup>,
}

impl StreamedTextures {
    /// Reads the header at `at`. Compressed groups carry two extra size words.
    pub(crate) fn read(ctx: &Context<'_>, at: usize, compressed: bool) -> Result<Self> {
        let raw: RawStreamedTextures = ctx.read(at)?;
        if raw.unk > 1 {
            return Err(Error::invariant(format!("streamed texture header unk is {}", raw.unk)));
        }
        if raw.num_used_groups == 0 || raw.num_used_groups > 2 {
            return Err(Error::invariant(format!(
                "{} streamed texture groups, expected one or two",
                raw.num_used_groups
            )));
        }

        let compressed_sizes: Option<[u32; 2]> = if compressed {
            Some(ctx.read(at + 40)?)
        } else {
            None
        };

        let ctx = ctx.rebase(at);
        let groups = (0..raw.num_used_groups as usize)
            .map(|group| {
                let textures = ctx
                    .follow(raw.groups[group])?
                    .ok_or_else(|| {
                        Error::invariant(format!("streamed texture group {group} is missing"))
                    })?;
                let ids = ctx.values(raw.group_ids[group], textures.textures.len())?;
                Ok(TextureGroup {
                    textures,
                    ids,
                    data_offset: raw.data_offsets[group],
                    data_size: raw.data_sizes[group],
                    compressed_size: compressed_sizes.map(|sizes| sizes[group]),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StreamedTextures { unk: raw.unk, groups })
    }

    /// The stored span of every group in the stream file, last group first.
    pub fn group_ranges(&self, stream_len: usize) -> Result<Vec<DataRange>> {
        self.groups
            .iter()
            .rev()
            .map(|group| {
                DataRange::new(group.data_offset as usize, group.stored_size() as usize, stream_len)
            })
            .collect()
    }
}

/// Pointers at the start of every version's header, relative to the file.
#[binrw]
#[derive(Debug)]
pub(crate) struct RawHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub models: Pointer<u8>,
    pub materials: Pointer<u8>,
    pub unk00: u32,
    pub streams: Pointer<u8>,
    pub shaders: Pointer<u8>,
    pub cached_textures: Pointer<TextureTable>,
    pub unk01: u32,
    pub uncached_textures: Pointer<u8>,
    pub reserved: [u32; 7],
}

/// A decoded model container.
#[derive(Debug, Clone, PartialEq)]
pub enum Mxmd {
    V1(MxmdV1),
    V2(MxmdV2),
    V3(MxmdV3),
}

impl Mxmd {
    /// Decodes a model container. Big-endian vertex and index payloads are swapped to
    /// little-endian in `buffer`.
    pub fn from_existing(buffer: &mut [u8], options: &ProcessOptions) -> Result<Mxmd> {
        let detected = MXMD_MAGIC.detect(buffer)?;
        let version: u32 = Context::new(buffer, detected, options.exclude).read(4)?;
        let supported: &[Endian] = match version {
            MXMD_VERSION_1 => &[Endian::Big],
            MXMD_VERSION_2 | MXMD_VERSION_3 => &[Endian::Little],
            version => return Err(Error::InvalidVersion { version }),
        };
        let endian = options.byte_order("MXMD", Some(detected), supported)?;
        debug!(version, ?endian, exclude = ?options.exclude, "Decoding MXMD");

        let ctx = Context::new(buffer, endian, options.exclude);
        let header: RawHeader = ctx.read(0)?;
        match version {
            MXMD_VERSION_1 => {
                let model = MxmdV1::read(&ctx, &header)?;
                model.normalize_payloads(buffer)?;
                Ok(Mxmd::V1(model))
            }
            MXMD_VERSION_2 => Ok(Mxmd::V2(MxmdV2::read(&ctx, &header)?)),
            _ => Ok(Mxmd::V3(MxmdV3::read(&ctx, &header)?)),
        }
    }

    pub fn version(&self) -> u32 {
        match self {
            Mxmd::V1(_) => MXMD_VERSION_1,
            Mxmd::V2(_) => MXMD_VERSION_2,
            Mxmd::V3(_) => MXMD_VERSION_3,
        }
    }

    /// Textures stored inline in the container.
    pub fn cached_textures(&self) -> Option<&TextureTable> {
        match self {
            Mxmd::V1(model) => model.cached_textures.as_ref(),
            Mxmd::V2(model) => model.cached_textures.as_ref(),
            Mxmd::V3(model) => model.cached_textures.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_kinds() {
        assert_eq!(VertexKind::from_raw(28), VertexKind::Normal);
        assert_eq!(VertexKind::from_raw(9), VertexKind::Other(9));
        assert_eq!(VertexKind::Position.lanes().unwrap(), (4, 3));
        assert!(VertexKind::Other(9).lanes().is_err());
    }

    #[test]
    fn unknown_version() {
        let mut data = vec![0u8; 64];
        data[..4].copy_from_slice(b"DMXM");
        data[4..8].copy_from_slice(&10113u32.to_le_bytes());
        assert!(matches!(
            Mxmd::from_existing(&mut data, &ProcessOptions::default()),
            Err(Error::InvalidVersion { version: 10113 })
        ));
    }

    #[test]
    fn version_order_mismatch() {
        // a little-endian magic on a big-endian only version
        let mut data = vec![0u8; 64];
        data[..4].copy_from_slice(b"DMXM");
        data[4..8].copy_from_slice(&MXMD_VERSION_1.to_le_bytes());
        assert!(matches!(
            Mxmd::from_existing(&mut data, &ProcessOptions::default()),
            Err(Error::UnsupportedByteOrder { format: "MXMD", .. })
        ));
    }
}
