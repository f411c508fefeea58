// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Little-endian model containers.
//!
//! Vertex and index data is not stored next to the records that describe it. Buffer offsets point
//! into a model payload, which is either embedded after the stream or stored in a DRSM stream.

use binrw::binrw;
use tracing::{trace, warn};

use crate::context::{Context, Decode, ExcludeLoads};
use crate::drsm::{Resources, TextureTable};
use crate::error::{Error, Result};
use crate::mxmd::{
    read_descriptors, Matrix, RawHeader, RawVertexDescriptor, StreamedTextures, TextureLink,
    VertexDescriptor,
};
use crate::pointer::{Array, CountedArray, DataRange, Pointer};
use crate::ByteSpan;

#[binrw]
#[derive(Debug)]
pub(crate) struct RawPrimitive {
    id: u32,
    skin_flags: u32,
    buffer_id: u16,
    uv_faces_id: u16,
    unk00: u16,
    material_id: u16,
    null00: [u32; 3],
    unk01: u16,
    lod: u16,
    mesh_faces_id: u32,
    null01: [u32; 3],
}

/// A draw call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    pub id: u32,
    /// The lowest set bit selects the weight palette.
    pub skin_flags: u32,
    pub vertex_buffer: usize,
    pub uv_faces_id: u16,
    pub material: usize,
    pub lod: u16,
    pub index_buffer: usize,
}

impl Decode for Primitive {
    type Raw = RawPrimitive;

    fn decode(raw: RawPrimitive, _: usize, _: &Context<'_>) -> Result<Self> {
        Ok(Primitive {
            id: raw.id,
            skin_flags: raw.skin_flags,
            vertex_buffer: raw.buffer_id.into(),
            uv_faces_id: raw.uv_faces_id,
            material: raw.material_id.into(),
            lod: raw.lod,
            index_buffer: raw.mesh_faces_id as usize,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMesh {
    primitives: Array<Primitive>,
    unk00: u32,
    bbox_max: [f32; 3],
    bbox_min: [f32; 3],
    radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
    pub unk00: u32,
    pub bbox_max: [f32; 3],
    pub bbox_min: [f32; 3],
    pub radius: f32,
}

impl Decode for Mesh {
    type Raw = RawMesh;

    fn decode(raw: RawMesh, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(Mesh {
            primitives: ctx.decode_array(raw.primitives.pointer(), raw.primitives.len())?,
            unk00: raw.unk00,
            bbox_max: raw.bbox_max,
            bbox_min: raw.bbox_min,
            radius: raw.radius,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawBone {
    name: Pointer<u8>,
    unk00: f32,
    unk01: u32,
    id: u32,
    null: [u32; 2],
}

/// A skin node. Nodes carry no hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub unk00: f32,
    pub unk01: u32,
    pub id: u32,
}

impl Decode for Bone {
    type Raw = RawBone;

    fn decode(raw: RawBone, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(Bone {
            name: ctx.string(raw.name)?,
            unk00: raw.unk00,
            unk01: raw.unk01,
            id: raw.id,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawSkin {
    count1: u32,
    count2: u32,
    nodes: Pointer<Bone>,
    inverse_binds: Pointer<Matrix>,
    unk_offset00: u32,
    unk_offset01: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub bones: Vec<Bone>,
    pub count2: u32,
    /// One per bone.
    pub inverse_binds: Vec<Matrix>,
}

impl Decode for Skin {
    type Raw = RawSkin;

    fn decode(raw: RawSkin, _: usize, ctx: &Context<'_>) -> Result<Self> {
        let count = raw.count1 as usize;
        Ok(Skin {
            bones: ctx.decode_array(raw.nodes, count)?,
            count2: raw.count2,
            inverse_binds: ctx.values(raw.inverse_binds, count)?,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMorphControl {
    name1: Pointer<u8>,
    name2: Pointer<u8>,
    data: [u32; 5],
}

/// A named blend shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphControl {
    pub name: String,
    pub name2: String,
    pub data: [u32; 5],
}

impl Decode for MorphControl {
    type Raw = RawMorphControl;

    fn decode(raw: RawMorphControl, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(MorphControl {
            name: ctx.string(raw.name1)?,
            name2: ctx.string(raw.name2)?,
            data: raw.data,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMorphs {
    controls: Array<MorphControl>,
    unk: [u32; 4],
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawModel {
    unk00: u32,
    bbox_min: [f32; 3],
    bbox_max: [f32; 3],
    meshes: Array<Mesh>,
    null00: u32,
    skin: Pointer<Skin>,
    null01: [u32; 10],
    unk_count00: u32,
    null02: [u32; 10],
    morphs: Pointer<RawMorphs>,
    unk_offset00: u32,
    unk_offset01: u32,
    unk_offset02: u32,
    unk_offset03: u32,
    unk_count01: u32,
}

/// Offsets inside the model are relative to the container.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub unk00: u32,
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
    pub meshes: Vec<Mesh>,
    pub skin: Option<Skin>,
    pub morph_controls: Vec<MorphControl>,
}

impl Decode for Model {
    type Raw = RawModel;

    fn decode(raw: RawModel, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let morph_controls = match ctx.resolve(raw.morphs)? {
            Some(morphs) => {
                let morphs: RawMorphs = ctx.read(morphs)?;
                ctx.decode_array(morphs.controls.pointer(), morphs.controls.len())?
            }
            None => Vec::new(),
        };

        trace!(at, meshes = raw.meshes.len(), morphs = morph_controls.len(), "Decoded model");
        Ok(Model {
            unk00: raw.unk00,
            bbox_min: raw.bbox_min,
            bbox_max: raw.bbox_max,
            meshes: ctx.decode_array(raw.meshes.pointer(), raw.meshes.len())?,
            skin: ctx.follow(raw.skin)?,
            morph_controls,
        })
    }
}

#[binrw]
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawTextureLink {
    texture_id: i16,
    unk: i16,
    unk01: u32,
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMaterial {
    name: Pointer<u8>,
    unk00: u32,
    params: [f32; 6],
    textures: Array<RawTextureLink>,
    unk02: [u32; 9],
    links_offset: u32,
    links_count: u32,
    unk03: [u32; 8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub unk00: u32,
    pub params: [f32; 6],
    pub textures: Vec<TextureLink>,
}

impl Decode for Material {
    type Raw = RawMaterial;

    fn decode(raw: RawMaterial, _: usize, ctx: &Context<'_>) -> Result<Self> {
        let textures = ctx
            .values(raw.textures.pointer(), raw.textures.len())?
            .into_iter()
            .map(|link| TextureLink {
                texture_index: link.texture_id,
                unk: link.unk,
            })
            .collect();
        Ok(Material {
            name: ctx.string(raw.name)?,
            unk00: raw.unk00,
            params: raw.params,
            textures,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMaterials {
    materials: Array<Material>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Materials {
    pub materials: Vec<Material>,
}

impl Decode for Materials {
    type Raw = RawMaterials;

    fn decode(raw: RawMaterials, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);
        Ok(Materials {
            materials: ctx.decode_array(raw.materials.pointer(), raw.materials.len())?,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawVertexBuffer {
    data: Array<u8>,
    stride: u32,
    descriptors: Array<RawVertexDescriptor>,
    null: [u32; 3],
}

/// Interleaved vertices inside the model payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBuffer {
    /// Offset into the model payload.
    pub offset: usize,
    pub vertex_count: usize,
    pub stride: usize,
    pub descriptors: Vec<VertexDescriptor>,
}

impl Decode for VertexBuffer {
    type Raw = RawVertexBuffer;

    fn decode(raw: RawVertexBuffer, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(VertexBuffer {
            offset: raw.data.pointer().raw() as usize,
            vertex_count: raw.data.len(),
            stride: raw.stride as usize,
            descriptors: read_descriptors(ctx, raw.descriptors)?,
        })
    }
}

impl VertexBuffer {
    /// The buffer's bytes inside a payload of `payload_len` bytes.
    pub fn data(&self, payload_len: usize) -> Result<DataRange> {
        let size = self
            .vertex_count
            .checked_mul(self.stride)
            .ok_or_else(|| Error::invariant("vertex buffer size overflows"))?;
        DataRange::new(self.offset, size, payload_len)
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawIndexBuffer {
    indices: Array<u16>,
    null: [u32; 3],
}

/// 16-bit triangle list inside the model payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    pub offset: usize,
    pub index_count: usize,
}

impl Decode for IndexBuffer {
    type Raw = RawIndexBuffer;

    fn decode(raw: RawIndexBuffer, _: usize, _: &Context<'_>) -> Result<Self> {
        Ok(IndexBuffer {
            offset: raw.indices.pointer().raw() as usize,
            index_count: raw.indices.len(),
        })
    }
}

impl IndexBuffer {
    pub fn data(&self, payload_len: usize) -> Result<DataRange> {
        DataRange::new(self.offset, self.index_count * 2, payload_len)
    }
}

/// Maps a run of primitive vertices onto the shared weight buffer.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightPalette {
    pub buffer_vertex_begin: u32,
    pub vertex_index_subtract: u32,
    pub count: u32,
    pub unk00: [u32; 4],
    /// Slot of the palette inside its merge table, below 16.
    pub index_within_merge_table: u8,
    /// The level of detail the palette belongs to.
    pub merge_table_index: u8,
    pub unk02: u16,
    pub unk03: [u32; 2],
}

/// A morph vertex buffer inside the model payload.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MorphBuffer {
    pub offset: u32,
    pub vertex_count: u32,
    pub stride: u32,
    pub unk: u16,
    pub kind: u16,
}

impl MorphBuffer {
    pub fn data(&self, payload_len: usize) -> Result<DataRange> {
        let size = (self.vertex_count as usize)
            .checked_mul(self.stride as usize)
            .ok_or_else(|| Error::invariant("morph buffer size overflows"))?;
        DataRange::new(self.offset as usize, size, payload_len)
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMorphDescriptor {
    vertex_buffer_index: u32,
    buffer_index_begin: u32,
    num_buffers: u32,
    target_ids: Pointer<u16>,
    unk01: u32,
}

/// Morph buffers of one vertex buffer. The first buffer is the base, the others are targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphDescriptor {
    pub vertex_buffer: usize,
    pub buffer_begin: usize,
    pub num_buffers: usize,
    /// Morph control of every target buffer.
    pub target_ids: Vec<u16>,
    pub unk01: u32,
}

impl Decode for MorphDescriptor {
    type Raw = RawMorphDescriptor;

    fn decode(raw: RawMorphDescriptor, _: usize, ctx: &Context<'_>) -> Result<Self> {
        let num_buffers = raw.num_buffers as usize;
        Ok(MorphDescriptor {
            vertex_buffer: raw.vertex_buffer_index as usize,
            buffer_begin: raw.buffer_index_begin as usize,
            num_buffers,
            target_ids: ctx.values(raw.target_ids, num_buffers.saturating_sub(1))?,
            unk01: raw.unk01,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMorphsHeader {
    descriptors: Array<MorphDescriptor>,
    buffers: Array<MorphBuffer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphsHeader {
    pub descriptors: Vec<MorphDescriptor>,
    pub buffers: Vec<MorphBuffer>,
}

impl Decode for MorphsHeader {
    type Raw = RawMorphsHeader;

    fn decode(raw: RawMorphsHeader, _: usize, ctx: &Context<'_>) -> Result<Self> {
        let header = MorphsHeader {
            descriptors: ctx.decode_array(raw.descriptors.pointer(), raw.descriptors.len())?,
            buffers: ctx.values(raw.buffers.pointer(), raw.buffers.len())?,
        };
        for descriptor in &header.descriptors {
            if descriptor.buffer_begin + descriptor.num_buffers > header.buffers.len() {
                return Err(Error::invariant(format!(
                    "morph buffers {}..{} of {}",
                    descriptor.buffer_begin,
                    descriptor.buffer_begin + descriptor.num_buffers,
                    header.buffers.len()
                )));
            }
        }
        Ok(header)
    }
}

impl MorphsHeader {
    /// Base and target buffers of a descriptor.
    pub fn buffers_of(&self, descriptor: &MorphDescriptor) -> &[MorphBuffer] {
        &self.buffers[descriptor.buffer_begin..descriptor.buffer_begin + descriptor.num_buffers]
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawBufferManager {
    weight_palettes: CountedArray<WeightPalette>,
    weight_buffer: u16,
    flags: u16,
    morphs: Pointer<MorphsHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferManager {
    pub weight_palettes: Vec<WeightPalette>,
    /// Vertex buffer holding bone ids and weights.
    pub weight_buffer: usize,
    pub flags: u16,
    pub morphs: Option<MorphsHeader>,
}

impl Decode for BufferManager {
    type Raw = RawBufferManager;

    fn decode(raw: RawBufferManager, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(BufferManager {
            weight_palettes: ctx.values(raw.weight_palettes.pointer(), raw.weight_palettes.len())?,
            weight_buffer: raw.weight_buffer.into(),
            flags: raw.flags,
            morphs: ctx.follow(raw.morphs)?,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawStream {
    vertex_buffers: Array<VertexBuffer>,
    index_buffers: Array<IndexBuffer>,
    unk00: [u16; 2],
    null00: [u32; 2],
    unk01: u32,
    unk_offset00: u32,
    unk_count00: u32,
    unk02: u32,
    buffer_size: u32,
    buffer_offset: u32,
    voxelized_model_offset: u32,
    buffer_manager: Pointer<BufferManager>,
}

/// Buffer records of the model. Offsets inside are relative to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    /// Absolute offset of the stream.
    pub offset: usize,
    pub vertex_buffers: Vec<VertexBuffer>,
    pub index_buffers: Vec<IndexBuffer>,
    /// Size of the embedded payload, zero when it lives in a DRSM stream.
    pub buffer_size: u32,
    pub buffer_offset: u32,
    pub voxelized_model_offset: u32,
    pub buffer_manager: Option<BufferManager>,
}

impl Decode for Stream {
    type Raw = RawStream;

    fn decode(raw: RawStream, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);
        Ok(Stream {
            offset: at,
            vertex_buffers: ctx.decode_array(
                raw.vertex_buffers.pointer(),
                raw.vertex_buffers.len(),
            )?,
            index_buffers: ctx.decode_array(raw.index_buffers.pointer(), raw.index_buffers.len())?,
            buffer_size: raw.buffer_size,
            buffer_offset: raw.buffer_offset,
            voxelized_model_offset: raw.voxelized_model_offset,
            buffer_manager: ctx.follow(raw.buffer_manager)?,
        })
    }
}

impl Stream {
    /// The model payload stored after the stream, if there is one.
    pub fn inline_payload<'a>(&self, buffer: ByteSpan<'a>) -> Result<Option<ByteSpan<'a>>> {
        if self.buffer_size == 0 {
            return Ok(None);
        }
        let range = DataRange::new(
            self.offset + self.buffer_offset as usize,
            self.buffer_size as usize,
            buffer.len(),
        )?;
        Ok(Some(range.slice(buffer)))
    }

    /// Checks every buffer against a payload of `payload_len` bytes.
    pub fn validate_payload(&self, payload_len: usize) -> Result<()> {
        for vertices in &self.vertex_buffers {
            vertices.data(payload_len)?;
        }
        for indices in &self.index_buffers {
            indices.data(payload_len)?;
        }
        let morphs = self.buffer_manager.as_ref().and_then(|manager| manager.morphs.as_ref());
        if let Some(morphs) = morphs {
            for buffer in &morphs.buffers {
                buffer.data(payload_len)?;
            }
        }
        Ok(())
    }
}

/// Where the high resolution textures of a container are described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UncachedTextures {
    /// Groups stored in a companion stream file.
    Streamed(StreamedTextures),
    /// A resource block shared with DRSM files.
    Resources(Resources),
}

/// A little-endian model container. Absent parts were either missing or excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct MxmdV3 {
    pub model: Option<Model>,
    pub materials: Option<Materials>,
    pub stream: Option<Stream>,
    /// Offset of the shader block, which is not decoded.
    pub shaders: Option<usize>,
    pub cached_textures: Option<TextureTable>,
    pub uncached_textures: Option<UncachedTextures>,
}

impl MxmdV3 {
    pub(crate) fn read(ctx: &Context<'_>, header: &RawHeader) -> Result<Self> {
        let (model, stream) = if ctx.excludes(ExcludeLoads::MODEL) {
            (None, None)
        } else {
            (
                ctx.follow(header.models.cast::<Model>())?,
                ctx.follow(header.streams.cast::<Stream>())?,
            )
        };

        let materials = match ctx.excludes(ExcludeLoads::MATERIALS) {
            true => None,
            false => ctx.follow(header.materials.cast::<Materials>())?,
        };
        let shaders = match ctx.excludes(ExcludeLoads::SHADERS) {
            true => None,
            false => ctx.resolve(header.shaders)?,
        };
        let cached_textures = match ctx.excludes(ExcludeLoads::LOW_TEXTURES) {
            true => None,
            false => ctx.follow(header.cached_textures)?,
        };

        // the layout depends on the raw cached pointer, even when cached textures are excluded
        let uncached_textures = match ctx.excludes(ExcludeLoads::TEXTURE_STREAMS) {
            true => None,
            false => match ctx.resolve(header.uncached_textures)? {
                Some(at) if !header.cached_textures.is_null() => {
                    Some(UncachedTextures::Streamed(StreamedTextures::read(ctx, at, true)?))
                }
                Some(at) => Some(UncachedTextures::Resources(ctx.decode_at(at)?)),
                None => None,
            },
        };

        if let Some(stream) = &stream {
            if let Some(payload) = stream.inline_payload(ctx.data())? {
                stream.validate_payload(payload.len())?;
            }
        } else if model.is_some() {
            warn!("MXMD model has no vertex stream");
        }

        Ok(MxmdV3 {
            model,
            materials,
            stream,
            shaders,
            cached_textures,
            uncached_textures,
        })
    }

    /// The resource block describing the external streams, if the container uses one.
    pub fn resources(&self) -> Option<&Resources> {
        match &self.uncached_textures {
            Some(UncachedTextures::Resources(resources)) => Some(resources),
            _ => None,
        }
    }
}
