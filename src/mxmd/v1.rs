// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Big-endian model containers.

use std::collections::HashSet;

use binrw::binrw;
use tracing::{trace, warn};

use crate::context::{Context, Decode, ExcludeLoads};
use crate::drsm::TextureTable;
use crate::endian::{swap_strided, swap_words, Lanes};
use crate::error::{Error, Result};
use crate::mxmd::{
    read_descriptors, Matrix, RawHeader, RawVertexDescriptor, StreamedTextures, TextureLink,
    VertexDescriptor,
};
use crate::pointer::{Array, DataRange, Pointer};

#[binrw]
#[derive(Debug)]
pub(crate) struct RawPrimitive {
    flags: u32,
    skin_descriptor: u32,
    buffer_id: u32,
    uv_faces_id: u32,
    unk00: u32,
    material_id: u32,
    null00: [u32; 2],
    gib_id: u32,
    null01: u32,
    mesh_faces_id: u32,
    null02: [u32; 5],
}

/// A draw call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    pub flags: u32,
    pub skin_descriptor: u32,
    /// Vertex buffer in the stream.
    pub vertex_buffer: usize,
    /// Index buffer in the stream.
    pub index_buffer: usize,
    pub unk00: u32,
    pub material: usize,
    pub gib_id: u32,
    pub mesh_faces_id: u32,
}

impl Decode for Primitive {
    type Raw = RawPrimitive;

    fn decode(raw: RawPrimitive, _: usize, _: &Context<'_>) -> Result<Self> {
        Ok(Primitive {
            flags: raw.flags,
            skin_descriptor: raw.skin_descriptor,
            vertex_buffer: raw.buffer_id as usize,
            index_buffer: raw.uv_faces_id as usize,
            unk00: raw.unk00,
            material: raw.material_id as usize,
            gib_id: raw.gib_id,
            mesh_faces_id: raw.mesh_faces_id,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMesh {
    primitives: Array<Primitive>,
    null0: u32,
    bbox_max: [f32; 3],
    bbox_min: [f32; 3],
    radius: f32,
    null: [u32; 7],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub primitives: Vec<Primitive>,
    pub bbox_max: [f32; 3],
    pub bbox_min: [f32; 3],
    pub radius: f32,
}

impl Decode for Mesh {
    type Raw = RawMesh;

    fn decode(raw: RawMesh, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(Mesh {
            primitives: ctx.decode_array(raw.primitives.pointer(), raw.primitives.len())?,
            bbox_max: raw.bbox_max,
            bbox_min: raw.bbox_min,
            radius: raw.radius,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMeshSkin {
    bone_indices: Array<u16>,
}

/// Bones used by a skinned mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshSkin {
    /// Index into the model's bones for every skin node.
    pub bone_indices: Vec<u16>,
}

impl Decode for MeshSkin {
    type Raw = RawMeshSkin;

    fn decode(raw: RawMeshSkin, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(MeshSkin {
            bone_indices: ctx.values(raw.bone_indices.pointer(), raw.bone_indices.len())?,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawBone {
    name: Pointer<u8>,
    parent: i32,
    first_child: i32,
    last_child: i32,
    unk00: i32,
    position: [f32; 3],
    rotation: [f32; 3],
    scale: [f32; 3],
    inverse_bind: Matrix,
    transform: Matrix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub first_child: i32,
    pub last_child: i32,
    pub position: [f32; 3],
    /// Euler angles in radians.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    pub inverse_bind: Matrix,
    pub transform: Matrix,
}

impl Decode for Bone {
    type Raw = RawBone;

    fn decode(raw: RawBone, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(Bone {
            name: ctx.string(raw.name)?,
            parent: usize::try_from(raw.parent).ok(),
            first_child: raw.first_child,
            last_child: raw.last_child,
            position: raw.position,
            rotation: raw.rotation,
            scale: raw.scale,
            inverse_bind: raw.inverse_bind,
            transform: raw.transform,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawModel {
    bbox_min: [f32; 3],
    bbox_max: [f32; 3],
    meshes: Array<Mesh>,
    skins: Array<MeshSkin>,
    unk00: [u32; 3],
    attachments_offset2: i32,
    unk01: [i32; 6],
    bones: Array<Bone>,
    floats: Array<f32>,
    unk02: u32,
    bone_names: Array<Pointer<u8>>,
    unk03: u32,
    attachments_offset: u32,
    attachments_count: u32,
    unk_offset00: u32,
    unk04: [u32; 4],
    unk_offset01: u32,
    unk05: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
    pub meshes: Vec<Mesh>,
    pub skins: Vec<MeshSkin>,
    /// Bone index is the position in this list.
    pub bones: Vec<Bone>,
    pub floats: Vec<f32>,
    pub bone_names: Vec<String>,
}

impl Decode for Model {
    type Raw = RawModel;

    fn decode(raw: RawModel, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);

        // bone names are relative to the start of the bone array
        let bones: Vec<Bone> = match ctx.resolve(raw.bones.pointer())? {
            Some(bones_at) => ctx.rebase(bones_at).decode_array_at(bones_at, raw.bones.len())?,
            None => Vec::new(),
        };
        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= bones.len() {
                    return Err(Error::invariant(format!(
                        "bone {index} has parent {parent} of {}",
                        bones.len()
                    )));
                }
            }
        }

        let bone_names = ctx
            .values(raw.bone_names.pointer(), raw.bone_names.len())?
            .into_iter()
            .map(|name| ctx.string(name))
            .collect::<Result<Vec<_>>>()?;

        trace!(at, meshes = raw.meshes.len(), bones = bones.len(), "Decoded model");
        Ok(Model {
            bbox_min: raw.bbox_min,
            bbox_max: raw.bbox_max,
            meshes: ctx.decode_array(raw.meshes.pointer(), raw.meshes.len())?,
            skins: ctx.decode_array(raw.skins.pointer(), raw.skins.len())?,
            bones,
            floats: ctx.values(raw.floats.pointer(), raw.floats.len())?,
            bone_names,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawVertexBuffer {
    data: Array<u8>,
    stride: u32,
    descriptors: Array<RawVertexDescriptor>,
    null: u32,
}

/// Interleaved vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBuffer {
    pub data: DataRange,
    pub vertex_count: usize,
    pub stride: usize,
    pub descriptors: Vec<VertexDescriptor>,
}

impl Decode for VertexBuffer {
    type Raw = RawVertexBuffer;

    /// The data array counts bytes, not vertices.
    fn decode(raw: RawVertexBuffer, _: usize, ctx: &Context<'_>) -> Result<Self> {
        let size = raw.data.len();
        let stride = raw.stride as usize;
        if size != 0 && (stride == 0 || size % stride != 0) {
            return Err(Error::invariant(format!(
                "vertex buffer of {size} bytes is not a whole number of {stride} byte vertices"
            )));
        }
        let vertex_count = size.checked_div(stride).unwrap_or(0);
        Ok(VertexBuffer {
            data: ctx.range(raw.data.pointer(), size)?.unwrap_or_default(),
            vertex_count,
            stride,
            descriptors: read_descriptors(ctx, raw.descriptors)?,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawIndexBuffer {
    indices: Array<u16>,
    null: u32,
}

/// Triangle list of 16-bit indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuffer {
    pub data: DataRange,
    pub index_count: usize,
}

impl Decode for IndexBuffer {
    type Raw = RawIndexBuffer;

    fn decode(raw: RawIndexBuffer, _: usize, ctx: &Context<'_>) -> Result<Self> {
        let index_count = raw.indices.len();
        Ok(IndexBuffer {
            data: ctx.range(raw.indices.pointer(), index_count * 2)?.unwrap_or_default(),
            index_count,
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawStream {
    vertex_buffers: Array<VertexBuffer>,
    index_buffers: Array<IndexBuffer>,
    merge_data: [i16; 16],
}

/// Vertex and index buffers of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub vertex_buffers: Vec<VertexBuffer>,
    pub index_buffers: Vec<IndexBuffer>,
    pub merge_data: [i16; 16],
}

impl Decode for Stream {
    type Raw = RawStream;

    fn decode(raw: RawStream, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);
        Ok(Stream {
            vertex_buffers: ctx.decode_array(
                raw.vertex_buffers.pointer(),
                raw.vertex_buffers.len(),
            )?,
            index_buffers: ctx.decode_array(raw.index_buffers.pointer(), raw.index_buffers.len())?,
            merge_data: raw.merge_data,
        })
    }
}

#[binrw]
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawTextureLink {
    texture_id: i16,
    unk: i16,
}

impl From<RawTextureLink> for TextureLink {
    fn from(raw: RawTextureLink) -> Self {
        TextureLink {
            texture_index: raw.texture_id,
            unk: raw.unk,
        }
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawMaterial {
    name: Pointer<u8>,
    unk00: u32,
    params: [f32; 13],
    textures: Array<RawTextureLink>,
    unk02: [u32; 9],
    links_offset: u32,
    links_count: u32,
    null: [u32; 6],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub unk00: u32,
    pub params: [f32; 13],
    pub textures: Vec<TextureLink>,
}

impl Decode for Material {
    type Raw = RawMaterial;

    fn decode(raw: RawMaterial, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(Material {
            name: ctx.string(raw.name)?,
            unk00: raw.unk00,
            params: raw.params,
            textures: ctx
                .values(raw.textures.pointer(), raw.textures.len())?
                .into_iter()
                .map(TextureLink::from)
                .collect(),
        })
    }
}

/// Only the leading array of the materials header is understood.
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
pub(crate) struct RawShader {
    data: Array<u8>,
    null: [u32; 2],
}

/// A compiled shader blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    pub data: DataRange,
}

impl Decode for Shader {
    type Raw = RawShader;

    fn decode(raw: RawShader, _: usize, ctx: &Context<'_>) -> Result<Self> {
        Ok(Shader {
            data: ctx.range(raw.data.pointer(), raw.data.len())?.unwrap_or_default(),
        })
    }
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawShaders {
    shaders: Array<Shader>,
    unk: u32,
    null: [u32; 5],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shaders {
    pub shaders: Vec<Shader>,
    pub unk: u32,
}

impl Decode for Shaders {
    type Raw = RawShaders;

    fn decode(raw: RawShaders, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);
        Ok(Shaders {
            shaders: ctx.decode_array(raw.shaders.pointer(), raw.shaders.len())?,
            unk: raw.unk,
        })
    }
}

/// Texture stored in a shared texture container of the map.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalTexture {
    pub texture_id: u16,
    pub container_id: u16,
    pub external_texture_id: u16,
    pub unk: u16,
}

/// The model, materials and shaders a big-endian container embeds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddedModel {
    pub model: Option<Model>,
    pub materials: Option<Materials>,
    pub shaders: Option<Shaders>,
}

impl EmbeddedModel {
    pub(crate) fn read(
        ctx: &Context<'_>,
        model: Pointer<u8>,
        materials: Pointer<u8>,
        shaders: Pointer<u8>,
    ) -> Result<Self> {
        let model = match ctx.excludes(ExcludeLoads::MODEL) {
            true => None,
            false => ctx.follow(model.cast::<Model>())?,
        };
        let materials = match ctx.excludes(ExcludeLoads::MATERIALS) {
            true => None,
            false => ctx.follow(materials.cast::<Materials>())?,
        };
        let shaders = match ctx.excludes(ExcludeLoads::SHADERS) {
            true => None,
            false => ctx.follow(shaders.cast::<Shaders>())?,
        };
        Ok(EmbeddedModel {
            model,
            materials,
            shaders,
        })
    }
}

/// A big-endian model container. Absent parts were either missing or excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct MxmdV1 {
    pub model: Option<Model>,
    pub materials: Option<Materials>,
    pub stream: Option<Stream>,
    pub shaders: Option<Shaders>,
    pub cached_textures: Option<TextureTable>,
    pub uncached_textures: Option<StreamedTextures>,
}

impl MxmdV1 {
    pub(crate) fn read(ctx: &Context<'_>, header: &RawHeader) -> Result<Self> {
        let EmbeddedModel {
            model,
            materials,
            shaders,
        } = EmbeddedModel::read(ctx, header.models, header.materials, header.shaders)?;
        let stream = match ctx.excludes(ExcludeLoads::MODEL) {
            true => None,
            false => ctx.follow(header.streams.cast::<Stream>())?,
        };
        let cached_textures = match ctx.excludes(ExcludeLoads::LOW_TEXTURES) {
            true => None,
            false => ctx.follow(header.cached_textures)?,
        };
        let uncached_textures = match ctx.excludes(ExcludeLoads::TEXTURE_STREAMS) {
            true => None,
            false => match ctx.resolve(header.uncached_textures)? {
                Some(at) => Some(StreamedTextures::read(ctx, at, false)?),
                None => None,
            },
        };

        if model.is_some() && stream.is_none() {
            warn!("MXMD model has no vertex stream");
        }

        Ok(MxmdV1 {
            model,
            materials,
            stream,
            shaders,
            cached_textures,
            uncached_textures,
        })
    }

    /// Swaps every vertex attribute and index of the stream to little-endian.
    ///
    /// Buffers shared by several records are swapped once.
    pub(crate) fn normalize_payloads(&self, buffer: &mut [u8]) -> Result<()> {
        let Some(stream) = &self.stream else {
            return Ok(());
        };

        let mut swapped = HashSet::new();
        for vertices in &stream.vertex_buffers {
            if vertices.data.is_empty() || !swapped.insert(vertices.data.offset()) {
                continue;
            }
            let bytes = vertices.data.slice_mut(buffer);
            let mut offset = 0;
            for descriptor in &vertices.descriptors {
                let (width, count) = descriptor.kind.lanes()?;
                if width * count > descriptor.size as usize {
                    return Err(Error::invariant(format!(
                        "{:?} needs {} bytes but has {}",
                        descriptor.kind,
                        width * count,
                        descriptor.size
                    )));
                }
                if width > 1 {
                    let lanes = Lanes {
                        offset,
                        width,
                        count,
                    };
                    swap_strided(bytes, vertices.stride, vertices.vertex_count, lanes)?;
                }
                offset += descriptor.size as usize;
            }
        }

        for indices in &stream.index_buffers {
            if !indices.data.is_empty() && swapped.insert(indices.data.offset()) {
                swap_words(indices.data.slice_mut(buffer), 2);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use binrw::Endian;

    use super::*;
    use crate::context::ProcessOptions;
    use crate::mxmd::{Mxmd, VertexKind};
    use crate::test_util::Builder;

    /// Offsets of interesting parts of the test model.
    pub(crate) struct Layout {
        pub shaders_field: usize,
        pub vertex_buffer: usize,
        pub vertices: usize,
        pub indices: usize,
    }

    /// A big-endian model: one mesh with one primitive, two bones, a skin, one material,
    /// a three vertex buffer of position, normal and uv and a triangle.
    pub(crate) fn model() -> (Vec<u8>, Layout) {
        let mut b = Builder::new(Endian::Big);
        b.bytes(b"MXMD").u32(10040);
        b.zeros(32 + 28);
        let shaders_field = 24;

        // model
        let model_at = b.pos();
        b.f32s(&[-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
        let fields = b.pos();
        b.zeros(4 * 4 + 12 + 4 + 24 + 8 + 8 + 4 + 8 + 4 * 4 + 16 + 8);
        let mesh_at = b.pos();
        b.u32(0).u32(1).u32(0).f32s(&[1.0; 3]).f32s(&[-1.0; 3]).f32(1.7).zeros(28);
        let primitive_at = b.pos();
        b.u32(0).u32(0).u32(0).u32(0).u32(0).u32(0).zeros(8).u32(0).u32(0).u32(0).zeros(20);
        b.patch_u32(mesh_at, (primitive_at - model_at) as u32);
        let skin_at = b.pos();
        b.u32(0).u32(2);
        let skin_indices = b.pos();
        b.u16(1).u16(0);

        let bones_at = b.pos();
        for parent in [-1i32, 0] {
            b.u32(0).i32(parent).i32(-1).i32(-1).i32(0);
            b.f32s(&[0.0, parent as f32 + 1.0, 0.0]).f32s(&[0.0; 3]).f32s(&[1.0; 3]);
            for _ in 0..2 {
                b.f32s(&[
                    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
                ]);
            }
        }
        let names_at = b.pos();
        b.cstr("root").cstr("arm");
        b.patch_u32(bones_at, (names_at - bones_at) as u32);
        b.patch_u32(bones_at + 184, (names_at + 5 - bones_at) as u32);
        b.patch_u32(skin_at, (skin_indices - model_at) as u32);

        b.align(4);
        let model_fields = [
            (fields, (mesh_at - model_at) as u32),
            (fields + 4, 1),
            (fields + 8, (skin_at - model_at) as u32),
            (fields + 12, 1),
            (fields + 56, (bones_at - model_at) as u32),
            (fields + 60, 2),
        ];
        for (at, value) in model_fields {
            b.patch_u32(at, value);
        }

        // materials
        let materials_at = b.pos();
        b.u32(8).u32(1);
        let material_at = b.pos();
        b.u32(0).u32(0).zeros(52).u32(0).u32(1).zeros(36).u32(0).u32(0).zeros(24);
        let links = b.pos();
        b.i16(3).i16(0);
        let material_name = b.pos();
        b.cstr("skin_mat").align(4);
        b.patch_u32(material_at, (material_name - materials_at) as u32);
        b.patch_u32(material_at + 60, (links - materials_at) as u32);

        // stream
        let stream_at = b.pos();
        b.u32(0).u32(1).u32(0).u32(1).zeros(32);
        let vertex_buffer = b.pos();
        // the data array counts bytes
        b.u32(0).u32(72).u32(24).u32(0).u32(3).u32(0);
        let index_buffer = b.pos();
        b.u32(0).u32(3).u32(0);
        let descriptors = b.pos();
        b.u16(0).u16(12).u16(28).u16(4).u16(5).u16(8);
        let vertices = b.pos();
        for i in 0..3 {
            b.f32s(&[i as f32, 0.5, -2.0]).bytes(&[0x7F, 0, 0x81, 0]).f32s(&[0.25, 0.75]);
        }
        let indices = b.pos();
        b.u16(0).u16(1).u16(2);
        b.align(4);
        b.patch_u32(stream_at, (vertex_buffer - stream_at) as u32);
        b.patch_u32(stream_at + 8, (index_buffer - stream_at) as u32);
        b.patch_u32(vertex_buffer, (vertices - stream_at) as u32);
        b.patch_u32(vertex_buffer + 12, (descriptors - stream_at) as u32);
        b.patch_u32(index_buffer, (indices - stream_at) as u32);

        // shaders
        let shaders_at = b.pos();
        b.u32(32).u32(1).u32(0).zeros(20);
        b.u32(48).u32(4).zeros(8);
        b.bytes(b"GX2\0");

        b.patch_u32(8, model_at as u32)
            .patch_u32(12, materials_at as u32)
            .patch_u32(20, stream_at as u32)
            .patch_u32(shaders_field, shaders_at as u32);

        let data = b.finish();
        (
            data,
            Layout {
                shaders_field,
                vertex_buffer,
                vertices,
                indices,
            },
        )
    }

    fn decode(data: &mut [u8], options: &ProcessOptions) -> MxmdV1 {
        match Mxmd::from_existing(data, options).unwrap() {
            Mxmd::V1(model) => model,
            other => panic!("decoded {other:?}"),
        }
    }

    #[test]
    fn read_tree() {
        let (mut data, _) = model();
        let mxmd = decode(&mut data, &ProcessOptions::default());

        let model = mxmd.model.as_ref().unwrap();
        assert_eq!(model.meshes[0].primitives.len(), 1);
        assert_eq!(model.meshes[0].radius, 1.7);
        assert_eq!(model.bones[0].name, "root");
        assert_eq!(model.bones[1].name, "arm");
        assert_eq!(model.bones[1].parent, Some(0));
        assert_eq!(model.bones[0].parent, None);
        assert_eq!(model.skins[0].bone_indices, [1, 0]);

        let materials = mxmd.materials.as_ref().unwrap();
        assert_eq!(materials.materials[0].name, "skin_mat");
        assert_eq!(materials.materials[0].textures[0].texture_index, 3);

        let stream = mxmd.stream.as_ref().unwrap();
        assert_eq!(stream.vertex_buffers[0].vertex_count, 3);
        assert_eq!(stream.vertex_buffers[0].descriptors[1].kind, VertexKind::Normal);
        assert_eq!(stream.index_buffers[0].index_count, 3);

        let shaders = mxmd.shaders.as_ref().unwrap();
        assert_eq!(shaders.shaders[0].data.slice(&data), b"GX2\0");
    }

    #[test]
    fn payload_swapped_once() {
        let (original, layout) = model();
        let mut data = original.clone();
        let mxmd = decode(&mut data, &ProcessOptions::default());

        let position = &data[layout.vertices + 24..layout.vertices + 28];
        assert_eq!(f32::from_le_bytes(position.try_into().unwrap()), 1.0);
        // normals are bytes and stay put
        assert_eq!(data[layout.vertices + 12], 0x7F);
        assert_eq!(&data[layout.indices..layout.indices + 6], &[0, 0, 1, 0, 2, 0]);

        // swapping back restores the input exactly
        let stream = mxmd.stream.as_ref().unwrap();
        let vertices = &stream.vertex_buffers[0];
        for (offset, width, count) in [(0, 4, 3), (16, 4, 2)] {
            swap_strided(
                vertices.data.slice_mut(&mut data),
                vertices.stride,
                vertices.vertex_count,
                Lanes { offset, width, count },
            )
            .unwrap();
        }
        swap_words(stream.index_buffers[0].data.slice_mut(&mut data), 2);
        assert_eq!(data, original);
    }

    #[test]
    fn vertex_data_counts_bytes() {
        let (data, layout) = model();
        let count = layout.vertex_buffer + 4;

        let mut ragged = data.clone();
        ragged[count..count + 4].copy_from_slice(&70u32.to_be_bytes());
        assert!(matches!(
            Mxmd::from_existing(&mut ragged, &ProcessOptions::default()),
            Err(Error::Invariant { .. })
        ));

        let mut shorter = data;
        shorter[count..count + 4].copy_from_slice(&48u32.to_be_bytes());
        let mxmd = decode(&mut shorter, &ProcessOptions::default());
        let vertices = &mxmd.stream.as_ref().unwrap().vertex_buffers[0];
        assert_eq!((vertices.vertex_count, vertices.data.len()), (2, 48));
    }

    #[test]
    fn excluded_parts_are_absent() {
        let (mut data, _) = model();
        let options =
            ProcessOptions::default().excluding(ExcludeLoads::SHADERS | ExcludeLoads::MODEL);
        let mxmd = decode(&mut data, &options);
        assert!(mxmd.shaders.is_none());
        assert!(mxmd.model.is_none());
        assert!(mxmd.stream.is_none());
        assert!(mxmd.materials.is_some());
    }

    #[test]
    fn excluded_parts_are_not_visited() {
        let (mut data, layout) = model();
        let shaders = layout.shaders_field;
        data[shaders..shaders + 4].copy_from_slice(&0x00FF_FFFFu32.to_be_bytes());
        let mut copy = data.clone();
        assert!(matches!(
            Mxmd::from_existing(&mut copy, &ProcessOptions::default()),
            Err(Error::CorruptOffset { .. })
        ));
        let mxmd = decode(&mut data, &ProcessOptions::default().excluding(ExcludeLoads::SHADERS));
        assert!(mxmd.shaders.is_none());
    }

    #[test]
    fn unknown_attribute_in_big_endian_payload() {
        let (mut data, layout) = model();
        // the uv descriptor becomes kind 9
        let descriptor = layout.vertices - 2 * 2;
        data[descriptor..descriptor + 2].copy_from_slice(&9u16.to_be_bytes());
        assert!(matches!(
            Mxmd::from_existing(&mut data, &ProcessOptions::default()),
            Err(Error::InvalidValue { value: 9, .. })
        ));
    }
}
