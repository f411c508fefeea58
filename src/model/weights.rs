// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Error, Result};
use crate::model::vertex::{VertexArray, VertexUsage};
use crate::model::Primitive;
use crate::mxmd::v3::WeightPalette;

const PALETTES_PER_LOD: usize = 16;

/// Bone ids and weights of a run of vertices, four of each per vertex.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Weights {
    pub bone_ids: Vec<[u8; 4]>,
    /// Weights scaled to 0..=255. The fourth weight completes the first three to one.
    pub weights: Vec<[u8; 4]>,
}

/// Reads the rows of the shared weight buffer that belong to one palette.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSampler<'a> {
    /// Added to a vertex's weight index to find its row.
    pub offset: u32,
    pub buffer: VertexArray<'a>,
}

impl WeightSampler<'_> {
    /// Looks up the weights of every weight index in `indices`.
    pub fn resample(&self, indices: &[u32]) -> Result<Weights> {
        let mut weights = Weights {
            bone_ids: vec![[0; 4]; indices.len()],
            weights: vec![[0; 4]; indices.len()],
        };

        for attribute in &self.buffer.attributes {
            match attribute.usage {
                VertexUsage::BoneWeights => {
                    for (out, index) in weights.weights.iter_mut().zip(indices) {
                        let mut value = attribute.read(index.wrapping_add(self.offset) as usize)?;
                        value.w = (1.0 - value.x - value.y - value.z).max(0.0);
                        *out = (value * 255.0)
                            .to_array()
                            .map(|c| c.round_ties_even().clamp(0.0, 255.0) as u8);
                    }
                }
                VertexUsage::BoneIndices => {
                    for (out, index) in weights.bone_ids.iter_mut().zip(indices) {
                        let ids = attribute.read_uint(index.wrapping_add(self.offset) as usize)?;
                        *out = ids.map(|id| id as u8);
                    }
                }
                usage => return Err(Error::invariant(format!("weight buffer holds {usage:?}"))),
            }
        }

        Ok(weights)
    }
}

/// Weight palettes of a model, sixteen slots per level of detail.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightSamplers<'a> {
    lods: Vec<[Option<WeightSampler<'a>>; PALETTES_PER_LOD]>,
}

impl<'a> WeightSamplers<'a> {
    pub(crate) fn new(palettes: &[WeightPalette], buffer: &VertexArray<'a>) -> Result<Self> {
        let mut lods: Vec<[Option<WeightSampler<'a>>; PALETTES_PER_LOD]> = Vec::new();
        for palette in palettes {
            let lod = palette.merge_table_index as usize;
            let slot = palette.index_within_merge_table as usize;
            if slot >= PALETTES_PER_LOD {
                return Err(Error::invariant(format!("weight palette slot {slot}")));
            }
            while lods.len() <= lod {
                lods.push(std::array::from_fn(|_| None));
            }
            lods[lod][slot] = Some(WeightSampler {
                offset: palette.vertex_index_subtract.wrapping_sub(palette.buffer_vertex_begin),
                buffer: buffer.clone(),
            });
        }
        Ok(WeightSamplers { lods })
    }

    /// The sampler for `primitive`.
    ///
    /// The lowest set skin flag picks the palette, falling back to the first palette of the lod.
    pub fn get(&self, primitive: &Primitive) -> Result<&WeightSampler<'a>> {
        let palette = match primitive.skin_flags {
            0 => 0,
            flags => flags.trailing_zeros() as usize,
        };
        let lod = primitive.lod.saturating_sub(1);
        let slots = self
            .lods
            .get(lod)
            .ok_or_else(|| Error::invariant(format!("no weight palettes for lod {lod}")))?;

        slots
            .get(palette)
            .and_then(Option::as_ref)
            .or_else(|| slots.iter().flatten().next())
            .ok_or_else(|| Error::invariant(format!("lod {lod} has no weight palettes")))
    }
}
