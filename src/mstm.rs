// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::debug;

use crate::context::{Context, Decode, ProcessOptions};
use crate::error::{Error, Result};
use crate::mxmd::v1::{EmbeddedModel, ExternalTexture, Materials, Model, Shaders};
use crate::pointer::{Array, Pointer};
use crate::ByteSpan;

/// Which stream buffers hold a terrain chunk, per lod.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainBufferLookup {
    pub bbox: [f32; 6],
    pub buffer_index: [u32; 2],
    pub null: u32,
}

#[binrw]
#[derive(Debug)]
pub(crate) struct RawTerrainBuffers {
    lookups: Array<TerrainBufferLookup>,
    mesh_indices: Array<u16>,
    unk00: u32,
    null00: [u32; 6],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainBuffers {
    pub lookups: Vec<TerrainBufferLookup>,
    /// One entry per mesh, combining the lookup and the lod.
    pub mesh_indices: Vec<u16>,
    pub unk00: u32,
}

impl Decode for TerrainBuffers {
    type Raw = RawTerrainBuffers;

    fn decode(raw: RawTerrainBuffers, at: usize, ctx: &Context<'_>) -> Result<Self> {
        let ctx = ctx.rebase(at);
        Ok(TerrainBuffers {
            lookups: ctx.values(raw.lookups.pointer(), raw.lookups.len())?,
            mesh_indices: ctx.values(raw.mesh_indices.pointer(), raw.mesh_indices.len())?,
            unk00: raw.unk00,
        })
    }
}

impl TerrainBuffers {
    /// The lod and stream buffer of the mesh at `mesh`.
    pub fn locate(&self, mesh: usize) -> Result<(usize, u32)> {
        let combined = *self
            .mesh_indices
            .get(mesh)
            .ok_or_else(|| Error::invariant(format!("mesh {mesh} has no buffer lookup")))?
            as usize;
        let lookups = self.lookups.len();
        if lookups == 0 {
            return Err(Error::invariant("terrain has no buffer lookups"));
        }

        let lod = combined / lookups;
        let lookup = &self.lookups[combined % lookups];
        let buffer_index = *lookup
            .buffer_index
            .get(lod)
            .ok_or_else(|| {
                Error::invariant(format!("mesh {mesh} uses lod {lod}, only two are stored"))
            })?;
        Ok((lod, buffer_index))
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
    unk03: u32,
    external_textures: Array<ExternalTexture>,
    unk_offsets01: [u32; 2],
    shaders: Pointer<u8>,
    texture_container_ids: Array<u16>,
    buffers: Pointer<TerrainBuffers>,
    unk_offsets02: [u32; 7],
}

/// A mesh of the terrain and where its vertices live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainMesh {
    pub mesh: usize,
    pub lod: usize,
    /// Buffer in the map's terrain stream.
    pub buffer_index: u32,
}

/// A terrain model. Only big-endian files exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Mstm {
    pub unk00: u16,
    pub unk01: u16,
    pub model: Option<Model>,
    pub materials: Option<Materials>,
    pub shaders: Option<Shaders>,
    pub external_textures: Vec<ExternalTexture>,
    pub texture_container_ids: Vec<u16>,
    pub buffers: Option<TerrainBuffers>,
}

impl Mstm {
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Mstm> {
        let endian = options.byte_order("MSTM", None, &[Endian::Big])?;
        let ctx = Context::new(buffer, endian, options.exclude);
        let raw: RawHeader = ctx.read(0)?;
        debug!(exclude = ?options.exclude, "Decoding MSTM");

        let EmbeddedModel {
            model,
            materials,
            shaders,
        } = EmbeddedModel::read(&ctx, raw.models, raw.materials, raw.shaders)?;

        Ok(Mstm {
            unk00: raw.unk00,
            unk01: raw.unk01,
            model,
            materials,
            shaders,
            external_textures: ctx.values(
                raw.external_textures.pointer(),
                raw.external_textures.len(),
            )?,
            texture_container_ids: ctx.values(
                raw.texture_container_ids.pointer(),
                raw.texture_container_ids.len(),
            )?,
            buffers: ctx.follow(raw.buffers)?,
        })
    }

    /// Every mesh of the model with its lod and terrain buffer.
    pub fn terrain_models(&self) -> Result<Vec<TerrainMesh>> {
        let Some(model) = &self.model else {
            return Ok(Vec::new());
        };
        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| Error::invariant("terrain model has no buffer lookups"))?;

        (0..model.meshes.len())
            .map(|mesh| {
                let (lod, buffer_index) = buffers.locate(mesh)?;
                Ok(TerrainMesh { mesh, lod, buffer_index })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::context::{EndianMode, ExcludeLoads};
    use crate::test_util::Builder;

    const MODEL_SIZE: usize = 148;
    const MESH_SIZE: usize = 68;

    /// A model whose meshes each draw one primitive, reading buffer `mesh`.
    pub(crate) fn write_model(b: &mut Builder, meshes: u32) -> usize {
        let model_at = b.pos();
        b.f32s(&[-1.0, -1.0, -1.0, 1.0, 1.0, 1.0]).u32(0).u32(meshes);
        b.zeros(MODEL_SIZE - 32);

        let meshes_at = b.pos();
        for _ in 0..meshes {
            b.u32(0).u32(1).u32(0).f32s(&[1.0; 3]).f32s(&[-1.0; 3]).f32(1.0).zeros(28);
        }
        for mesh in 0..meshes {
            let primitive_at = b.pos();
            b.u32(0).u32(0).u32(mesh).u32(mesh).u32(0).u32(0).zeros(8);
            b.u32(0).u32(0).u32(mesh).zeros(20);
            b.patch_u32(meshes_at + mesh as usize * MESH_SIZE, (primitive_at - model_at) as u32);
        }
        b.patch_u32(model_at + 24, (meshes_at - model_at) as u32);
        model_at
    }

    pub(crate) fn terrain(mesh_indices: &[u16]) -> Vec<u8> {
        let mut b = Builder::new(Endian::Big);
        b.u16(7).u16(3).zeros(8);
        b.zeros(88 - 12);

        let model = write_model(&mut b, mesh_indices.len() as u32);

        let buffers = b.pos();
        b.u32(44).u32(2).u32(0).u32(mesh_indices.len() as u32).u32(0x55).zeros(24);
        for first in [5, 6] {
            b.f32s(&[0.0; 6]).u32(first).u32(first + 10).u32(0);
        }
        let indices = b.pos() - buffers;
        for index in mesh_indices {
            b.u16(*index);
        }
        b.align(4);
        b.patch_u32(buffers + 8, indices as u32);

        let external = b.pos();
        b.u16(1).u16(2).u16(3).u16(4);

        b.patch_u32(12, model as u32)
            .patch_u32(28, external as u32)
            .patch_u32(32, 1)
            .patch_u32(56, buffers as u32);
        b.finish()
    }

    #[test]
    fn meshes_map_to_buffers() {
        let data = terrain(&[0, 3, 1]);
        let mstm = Mstm::from_existing(&data, &ProcessOptions::default()).unwrap();
        assert_eq!((mstm.unk00, mstm.unk01), (3, 7));
        assert_eq!(mstm.external_textures[0].external_texture_id, 3);
        assert_eq!(mstm.buffers.as_ref().unwrap().unk00, 0x55);

        let meshes = mstm.terrain_models().unwrap();
        assert_eq!(
            meshes,
            [
                TerrainMesh { mesh: 0, lod: 0, buffer_index: 5 },
                TerrainMesh { mesh: 1, lod: 1, buffer_index: 16 },
                TerrainMesh { mesh: 2, lod: 0, buffer_index: 6 },
            ]
        );
    }

    #[test]
    fn third_lod_is_rejected() {
        let data = terrain(&[4]);
        let mstm = Mstm::from_existing(&data, &ProcessOptions::default()).unwrap();
        assert!(matches!(mstm.terrain_models(), Err(Error::Invariant { .. })));
    }

    #[test]
    fn excluded_model_has_no_meshes() {
        let data = terrain(&[0]);
        let options = ProcessOptions::default().excluding(ExcludeLoads::MODEL);
        let mstm = Mstm::from_existing(&data, &options).unwrap();
        assert!(mstm.model.is_none());
        assert!(mstm.terrain_models().unwrap().is_empty());
    }

    #[test]
    fn little_endian_is_unsupported() {
        let data = terrain(&[0]);
        let options = ProcessOptions::default().with_endian(EndianMode::Little);
        assert!(matches!(
            Mstm::from_existing(&data, &options),
            Err(Error::UnsupportedByteOrder { format: "MSTM", .. })
        ));
    }
}
