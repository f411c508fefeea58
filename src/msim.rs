// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::debug;

use crate::context::{Context, Decode, ProcessOptions};
use crate::error::{Error, Result};
use crate::mxmd::v1::{EmbeddedModel, ExternalTexture, Materials, Model, Shaders};
use crate::mxmd::Matrix;
use crate::pointer::{Array, CountedArray, Pointer};
use crate::ByteSpan;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstancedModel {
    pub unk: [f32; 8],
    /// Mesh drawn by this lod. The top bit is sometimes set and carries no index.
    pub model_index: i32,
}

impl InstancedModel {
    pub fn mesh(&self) -> usize {
        (self.model_index as u32 & 0x7FFF_FFFF) as usize
    }
}

/// A run of `InstancedModel`s, one per lod.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceLod {
    pub model_index_start: u32,
    pub num_models: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceMatrix {
    pub matrix: Matrix,
    pub pos00: [f32; 3],
    pub pos01: [f32; 4],
    /// Cluster this instance draws.
    pub lod_index: u32,
    pub null00: u32,
    pub unk: u32,
    pub null01: u32,
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawInstances {
    null00: u32,
    clusters: CountedArray<InstanceLod>,
    model_lods: CountedArray<InstancedModel>,
    matrices: CountedArray<InstanceMatrix>,
    unk01: [u32; 16],
    null01: [u32; 6],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instances {
    pub clusters: Vec<InstanceLod>,
    pub model_lods: Vec<InstancedModel>,
    pub matrices: Vec<InstanceMatrix>,
    pub unk01: [u32; 16],
}

impl Decode for Instances {
    type Raw = RawInstances;

    fn decode(raw: RawInstances, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);
        Ok(Instances {
            clusters: ctx.values(raw.clusters.pointer(), raw.clusters.len())?,
            model_lods: ctx.values(raw.model_lods.pointer(), raw.model_lods.len())?,
            matrices: ctx.values(raw.matrices.pointer(), raw.matrices.len())?,
            unk01: raw.unk01,
        })
    }
}

impl Instances {
    /// Meshes drawn by `cluster`, lowest lod first.
    fn cluster_meshes(&self, cluster: &InstanceLod) -> Result<impl Iterator<Item = usize> + '_> {
        let start = cluster.model_index_start as usize;
        let end = start + cluster.num_models as usize;
        let models = self.model_lods.get(start..end).ok_or_else(|| {
            Error::invariant(format!(
                "cluster models {start}..{end} exceed {} model lods",
                self.model_lods.len()
            ))
        })?;
        Ok(models.iter().map(InstancedModel::mesh))
    }
}

#[binrw]
#[derive(Debug)]
struct RawHeader {
    unk01: u16,
    unk00: u16,
    null02: [u32; 2],
    models: Pointer<u8>,
    materials: Pointer<u8>,
    unk02: u32,
    instances: Pointer<Instances>,
    unk03: u32,
    external_textures: Array<ExternalTexture>,
    buffer_indices: Array<u32>,
    unk_offsets01: [u32; 5],
    shaders: Pointer<u8>,
    texture_container_ids: Array<u16>,
    unk_offsets02: [u32; 6],
}

/// A mesh of the prop model and every placement of it.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedMesh {
    pub mesh: usize,
    /// Buffer in the map's prop stream.
    pub stream_index: u32,
    pub lod: usize,
    /// World transforms of every placement.
    pub instances: Vec<Matrix>,
    /// Index of every placement in the instance table.
    pub placements: Vec<usize>,
}

/// Instanced props of a map. Only big-endian files exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Msim {
    pub unk00: u16,
    pub unk01: u16,
    pub model: Option<Model>,
    pub materials: Option<Materials>,
    pub shaders: Option<Shaders>,
    pub instances: Option<Instances>,
    pub external_textures: Vec<ExternalTexture>,
    pub buffer_indices: Vec<u32>,
    pub texture_container_ids: Vec<u16>,
}

impl Msim {
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Msim> {
        let endian = options.byte_order("MSIM", None, &[Endian::Big])?;
        let ctx = Context::new(buffer, endian, options.exclude);
        let raw: RawHeader = ctx.read(0)?;
        debug!(exclude = ?options.exclude, "Decoding MSIM");

        let EmbeddedModel {
            model,
            materials,
            shaders,
        } = EmbeddedModel::read(&ctx, raw.models, raw.materials, raw.shaders)?;

        Ok(Msim {
            unk00: raw.unk00,
            unk01: raw.unk01,
            model,
            materials,
            shaders,
            instances: ctx.follow(raw.instances)?,
            external_textures: ctx.values(
                raw.external_textures.pointer(),
                raw.external_textures.len(),
            )?,
            buffer_indices: ctx.values(raw.buffer_indices.pointer(), raw.buffer_indices.len())?,
            texture_container_ids: ctx.values(
                raw.texture_container_ids.pointer(),
                raw.texture_container_ids.len(),
            )?,
        })
    }

    /// Props stored with the newer layout, whose traversal is unknown.
    pub fn from_existing_v2(_buffer: ByteSpan, _options: &ProcessOptions) -> Result<Msim> {
        Err(Error::NotImplemented {
            what: "MSIM version 2 layout",
        })
    }

    /// Every mesh of the model with its stream buffer, lod and placements.
    pub fn instanced_models(&self) -> Result<Vec<InstancedMesh>> {
        let Some(model) = &self.model else {
            return Ok(Vec::new());
        };

        let mut meshes = (0..model.meshes.len())
            .map(|mesh| {
                let stream_index = *self
                    .buffer_indices
                    .get(mesh)
                    .ok_or_else(|| Error::invariant(format!("mesh {mesh} has no stream buffer")))?;
                Ok(InstancedMesh {
                    mesh,
                    stream_index,
                    lod: 0,
                    instances: Vec::new(),
                    placements: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let Some(instances) = &self.instances else {
            return Ok(meshes);
        };

        for (index, placement) in instances.matrices.iter().enumerate() {
            let cluster = instances
                .clusters
                .get(placement.lod_index as usize)
                .ok_or_else(|| {
                    Error::invariant(format!(
                        "instance uses missing cluster {}",
                        placement.lod_index
                    ))
                })?;
            for mesh in instances.cluster_meshes(cluster)? {
                let mesh = mesh_at(&mut meshes, mesh)?;
                mesh.instances.push(placement.matrix);
                mesh.placements.push(index);
            }
        }

        for cluster in &instances.clusters {
            for (lod, mesh) in instances.cluster_meshes(cluster)?.enumerate() {
                mesh_at(&mut meshes, mesh)?.lod = lod;
            }
        }

        Ok(meshes)
    }
}

fn mesh_at(meshes: &mut [InstancedMesh], mesh: usize) -> Result<&mut InstancedMesh> {
    let count = meshes.len();
    meshes
        .get_mut(mesh)
        .ok_or_else(|| Error::invariant(format!("instanced mesh {mesh} of {count}")))
}
