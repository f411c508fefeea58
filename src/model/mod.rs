// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! One shape for every model layout.
//!
//! Views borrow the decoded tree and the buffers it describes. Every layout produces the same
//! kinds of arrays, so an exporter written against [`ModelView`] handles all of them.

mod skeleton;
mod vertex;
mod weights;

pub use skeleton::{Bone, BoneTransform, Skeleton, Skin, SkinNode};
pub use vertex::{IndexArray, Unpack, VertexArray, VertexAttribute, VertexFormat, VertexUsage};
pub use weights::{WeightSampler, WeightSamplers, Weights};

use tracing::debug;

use crate::bc::Bc;
use crate::error::{Error, Result};
use crate::msim::Msim;
use crate::mstm::Mstm;
use crate::mxmd::v1::{self, MxmdV1};
use crate::mxmd::v3::{self, MxmdV3};
use crate::mxmd::{Mxmd, TextureLink};
use crate::pointer::DataRange;

/// A draw call, as indices into the arrays of its view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitive {
    pub material: usize,
    pub vertex_array: usize,
    pub index_array: usize,
    pub lod: usize,
    pub skin: usize,
    /// Picks the weight palette. Zero for layouts without palettes.
    pub skin_flags: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material<'a> {
    pub name: &'a str,
    pub textures: &'a [TextureLink],
}

/// Vertices displaced by one morph control.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTarget<'a> {
    /// The morph control, an index into the morph names.
    pub index: usize,
    /// Vertex array the deltas apply to.
    pub target_vertex_array: usize,
    pub vertex_count: usize,
    pub attributes: Vec<VertexAttribute<'a>>,
}

impl<'a> MorphTarget<'a> {
    /// The attribute with `usage`.
    pub fn attribute(&self, usage: VertexUsage) -> Option<&VertexAttribute<'a>> {
        self.attributes.iter().find(|attribute| attribute.usage == usage)
    }
}

/// A decoded model seen through one set of accessors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelView<'a> {
    pub vertex_arrays: Vec<VertexArray<'a>>,
    pub index_arrays: Vec<IndexArray<'a>>,
    pub primitives: Vec<Primitive>,
    pub skins: Vec<Skin>,
    pub materials: Vec<Material<'a>>,
    pub skeleton: Option<Skeleton<'a>>,
    pub morph_targets: Vec<MorphTarget<'a>>,
    pub morph_names: Vec<&'a str>,
    pub weight_samplers: Option<WeightSamplers<'a>>,
}

/// `range` inside `buffer`, which must be the buffer the range was resolved against.
fn bytes<'a>(range: &DataRange, buffer: &'a [u8]) -> Result<&'a [u8]> {
    buffer.get(range.offset()..range.end()).ok_or(Error::CorruptOffset {
        offset: range.offset() as i64,
        size: range.len(),
        len: buffer.len(),
    })
}

fn v1_primitives(mesh: &v1::Mesh, lod: usize) -> impl Iterator<Item = Primitive> + '_ {
    mesh.primitives.iter().map(move |primitive| Primitive {
        material: primitive.material,
        vertex_array: primitive.vertex_buffer,
        index_array: primitive.index_buffer,
        lod,
        skin: 0,
        skin_flags: 0,
    })
}

fn v1_materials(materials: Option<&v1::Materials>) -> Vec<Material<'_>> {
    materials
        .map(|materials| {
            materials
                .materials
                .iter()
                .map(|material| Material {
                    name: &material.name,
                    textures: &material.textures,
                })
                .collect()
        })
        .unwrap_or_default()
}

impl<'a> ModelView<'a> {
    /// Views any model container.
    ///
    /// `buffer` is the buffer the container was decoded from. `payload` holds the vertex data of
    /// containers that keep it in a separate stream, and is ignored for the others.
    pub fn from_mxmd(mxmd: &'a Mxmd, buffer: &'a [u8], payload: Option<&'a [u8]>) -> Result<Self> {
        match mxmd {
            Mxmd::V1(model) => Self::from_mxmd_v1(model, buffer),
            Mxmd::V2(_) => Err(Error::NotImplemented {
                what: "model views of texture-only containers",
            }),
            Mxmd::V3(model) => {
                let payload = match (payload, &model.stream) {
                    (Some(payload), _) => payload,
                    (None, Some(stream)) => stream
                        .inline_payload(buffer)?
                        .ok_or_else(|| {
                            Error::invariant("the model payload is stored in a separate stream")
                        })?,
                    (None, None) => &[],
                };
                Self::from_mxmd_v3(model, payload)
            }
        }
    }

    /// Views a big-endian model. `buffer` must have gone through the decode, which swaps the
    /// vertex and index data to little-endian.
    pub fn from_mxmd_v1(mxmd: &'a MxmdV1, buffer: &'a [u8]) -> Result<Self> {
        let Some(model) = &mxmd.model else {
            return Ok(ModelView::default());
        };

        let mut view = ModelView {
            primitives: model.meshes.iter().flat_map(|mesh| v1_primitives(mesh, 0)).collect(),
            skins: model
                .skins
                .iter()
                .map(|skin| Skin::from_v1(skin, &model.bones))
                .collect::<Result<Vec<_>>>()?,
            materials: v1_materials(mxmd.materials.as_ref()),
            skeleton: Some(Skeleton::from_v1(&model.bones)),
            ..Default::default()
        };

        if let Some(stream) = &mxmd.stream {
            for vertices in &stream.vertex_buffers {
                let data = bytes(&vertices.data, buffer)?;
                view.vertex_arrays.push(VertexArray {
                    vertex_count: vertices.vertex_count,
                    attributes: VertexAttribute::from_descriptors(
                        &vertices.descriptors,
                        data,
                        vertices.stride,
                    )?,
                });
            }
            for indices in &stream.index_buffers {
                view.index_arrays.push(IndexArray {
                    data: bytes(&indices.data, buffer)?,
                });
            }
            view.check_references()?;
        }

        debug!(
            primitives = view.primitives.len(),
            vertex_arrays = view.vertex_arrays.len(),
            "Viewing MXMD version 1"
        );
        Ok(view)
    }

    /// Views a little-endian model whose buffers live in `payload`.
    pub fn from_mxmd_v3(mxmd: &'a MxmdV3, payload: &'a [u8]) -> Result<Self> {
        let Some(model) = &mxmd.model else {
            return Ok(ModelView::default());
        };

        let mut view = ModelView {
            primitives: model
                .meshes
                .iter()
                .flat_map(|mesh| &mesh.primitives)
                .map(|primitive| Primitive {
                    material: primitive.material,
                    vertex_array: primitive.vertex_buffer,
                    index_array: primitive.index_buffer,
                    lod: primitive.lod.into(),
                    skin: 0,
                    skin_flags: primitive.skin_flags,
                })
                .collect(),
            skins: model.skin.iter().map(Skin::from_v3).collect(),
            materials: mxmd
                .materials
                .iter()
                .flat_map(|materials| &materials.materials)
                .map(|material| Material {
                    name: &material.name,
                    textures: &material.textures,
                })
                .collect(),
            skeleton: model.skin.as_ref().map(Skeleton::from_v3),
            morph_names: model.morph_controls.iter().map(|control| control.name.as_str()).collect(),
            ..Default::default()
        };

        if let Some(stream) = &mxmd.stream {
            stream.validate_payload(payload.len())?;
            for vertices in &stream.vertex_buffers {
                let data = vertices.data(payload.len())?.slice(payload);
                view.vertex_arrays.push(VertexArray {
                    vertex_count: vertices.vertex_count,
                    attributes: VertexAttribute::from_descriptors(
                        &vertices.descriptors,
                        data,
                        vertices.stride,
                    )?,
                });
            }
            for indices in &stream.index_buffers {
                view.index_arrays.push(IndexArray {
                    data: indices.data(payload.len())?.slice(payload),
                });
            }
            view.check_references()?;

            if let Some(manager) = &stream.buffer_manager {
                if let Some(morphs) = &manager.morphs {
                    view.add_morphs(morphs, payload)?;
                }
                if !manager.weight_palettes.is_empty() {
                    let buffer = view.vertex_arrays.get(manager.weight_buffer).ok_or_else(|| {
                        Error::invariant(format!(
                            "weight buffer {} is missing",
                            manager.weight_buffer
                        ))
                    })?;
                    let samplers = WeightSamplers::new(&manager.weight_palettes, buffer)?;
                    view.weight_samplers = Some(samplers);
                }
            }
        }

        debug!(
            primitives = view.primitives.len(),
            morph_targets = view.morph_targets.len(),
            "Viewing MXMD version 3"
        );
        Ok(view)
    }

    /// Views a BC skeleton. The view holds no geometry.
    pub fn from_bc(bc: &'a Bc) -> Result<Self> {
        let skeleton = bc
            .skeleton()
            .ok_or_else(|| Error::invariant("the BC container holds no skeleton"))?;
        Ok(ModelView {
            skeleton: Some(Skeleton::from_bc(skeleton)),
            ..Default::default()
        })
    }

    /// The base buffer of each descriptor extends its vertex array. Every other buffer is a target.
    fn add_morphs(&mut self, morphs: &v3::MorphsHeader, payload: &'a [u8]) -> Result<()> {
        for descriptor in &morphs.descriptors {
            let buffers = morphs.buffers_of(descriptor);
            let Some((base, targets)) = buffers.split_first() else {
                continue;
            };

            let array_count = self.vertex_arrays.len();
            let array = self.vertex_arrays.get_mut(descriptor.vertex_buffer).ok_or_else(|| {
                Error::invariant(format!(
                    "morphs target vertex buffer {} of {array_count}",
                    descriptor.vertex_buffer
                ))
            })?;
            let data = base.data(payload.len())?.slice(payload);
            let stride = base.stride as usize;
            array.attributes.extend([
                morph_attribute(VertexUsage::Position, VertexFormat::Float32x3, 0, stride, data),
                VertexAttribute {
                    unpack: Unpack::Add(-0.5),
                    ..morph_attribute(VertexUsage::Normal, VertexFormat::Unorm8x4, 12, stride, data)
                },
            ]);

            for (target, buffer) in targets.iter().enumerate() {
                let index = *descriptor
                    .target_ids
                    .get(target)
                    .ok_or_else(|| {
                        Error::invariant(format!("morph target {target} has no control"))
                    })?;
                let data = buffer.data(payload.len())?.slice(payload);
                let stride = buffer.stride as usize;
                let attribute = |usage, format, offset| {
                    morph_attribute(usage, format, offset, stride, data)
                };
                self.morph_targets.push(MorphTarget {
                    index: index.into(),
                    target_vertex_array: descriptor.vertex_buffer,
                    vertex_count: buffer.vertex_count as usize,
                    attributes: vec![
                        attribute(VertexUsage::PositionDelta, VertexFormat::Float32x3, 0),
                        attribute(VertexUsage::VertexIndex, VertexFormat::Uint32, 28),
                        VertexAttribute {
                            unpack: Unpack::Add(-0.5),
                            ..attribute(VertexUsage::Normal, VertexFormat::Unorm8x4, 16)
                        },
                    ],
                });
            }
        }
        Ok(())
    }

    /// Every primitive must name an existing vertex and index array.
    fn check_references(&self) -> Result<()> {
        for primitive in &self.primitives {
            if primitive.vertex_array >= self.vertex_arrays.len()
                || primitive.index_array >= self.index_arrays.len()
            {
                return Err(Error::invariant(format!(
                    "primitive uses vertex array {} of {} and index array {} of {}",
                    primitive.vertex_array,
                    self.vertex_arrays.len(),
                    primitive.index_array,
                    self.index_arrays.len()
                )));
            }
        }
        Ok(())
    }
}

fn morph_attribute(
    usage: VertexUsage,
    format: VertexFormat,
    offset: usize,
    stride: usize,
    data: &[u8],
) -> VertexAttribute<'_> {
    VertexAttribute {
        usage,
        format,
        set: 0,
        offset,
        stride,
        unpack: Unpack::None,
        data,
    }
}

/// One mesh of a map model. Its vertices live in a buffer of the map's streams.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshView<'a> {
    pub mesh: usize,
    /// Buffer in the map stream holding the mesh's vertices and indices.
    pub buffer_index: u32,
    pub model: ModelView<'a>,
}

impl<'a> MeshView<'a> {
    /// One view per terrain mesh.
    pub fn from_mstm(mstm: &'a Mstm) -> Result<Vec<Self>> {
        let Some(model) = &mstm.model else {
            return Ok(Vec::new());
        };
        let materials = v1_materials(mstm.materials.as_ref());

        mstm.terrain_models()?
            .into_iter()
            .map(|terrain| {
                let mesh = model
                    .meshes
                    .get(terrain.mesh)
                    .ok_or_else(|| Error::invariant(format!("terrain mesh {}", terrain.mesh)))?;
                Ok(MeshView {
                    mesh: terrain.mesh,
                    buffer_index: terrain.buffer_index,
                    model: ModelView {
                        primitives: v1_primitives(mesh, terrain.lod).collect(),
                        materials: materials.clone(),
                        ..Default::default()
                    },
                })
            })
            .collect()
    }

    /// One view per prop mesh. Each placement is a node of the mesh's only skin.
    pub fn from_msim(msim: &'a Msim) -> Result<Vec<Self>> {
        let Some(model) = &msim.model else {
            return Ok(Vec::new());
        };
        let materials = v1_materials(msim.materials.as_ref());

        msim.instanced_models()?
            .into_iter()
            .map(|instanced| {
                let mesh = model
                    .meshes
                    .get(instanced.mesh)
                    .ok_or_else(|| Error::invariant(format!("instanced mesh {}", instanced.mesh)))?;
                let nodes: Vec<SkinNode> = instanced
                    .placements
                    .iter()
                    .zip(&instanced.instances)
                    .map(|(&node, transform)| SkinNode {
                        node,
                        transform: skeleton::matrix(transform),
                    })
                    .collect();
                let skins = if nodes.is_empty() { Vec::new() } else { vec![Skin { nodes }] };
                Ok(MeshView {
                    mesh: instanced.mesh,
                    buffer_index: instanced.stream_index,
                    model: ModelView {
                        primitives: v1_primitives(mesh, instanced.lod).collect(),
                        skins,
                        materials: materials.clone(),
                        ..Default::default()
                    },
                })
            })
            .collect()
    }
}
