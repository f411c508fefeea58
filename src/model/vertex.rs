// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use glam::Vec4;

use crate::error::{Error, Result};
use crate::mxmd::{VertexDescriptor, VertexKind};

/// What an attribute means to a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexUsage {
    Position,
    /// Offset added to the base position by a morph target.
    PositionDelta,
    Normal,
    TextureCoordinate,
    VertexColor,
    BoneIndices,
    BoneWeights,
    /// Index of another vertex, into the weight buffer or the morphed buffer.
    VertexIndex,
    Undefined,
}

/// How the components of an attribute are stored. Data is always little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Snorm8x4,
    Unorm8x4,
    Uint8x4,
    Uint16,
    Uint32,
    Unorm16x4,
    /// An attribute of this many bytes with no known layout.
    Opaque(u16),
}

impl VertexFormat {
    pub fn size(self) -> usize {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Snorm8x4
            | VertexFormat::Unorm8x4
            | VertexFormat::Uint8x4
            | VertexFormat::Uint32 => 4,
            VertexFormat::Uint16 => 2,
            VertexFormat::Unorm16x4 => 8,
            VertexFormat::Opaque(size) => size as usize,
        }
    }
}

/// Transform applied to every component after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Unpack {
    #[default]
    None,
    Add(f32),
}

/// One attribute of an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttribute<'a> {
    pub usage: VertexUsage,
    pub format: VertexFormat,
    /// Distinguishes attributes of the same usage, such as the second uv channel.
    pub set: usize,
    /// Offset of the attribute inside a vertex.
    pub offset: usize,
    pub stride: usize,
    pub unpack: Unpack,
    /// The whole buffer the attribute is interleaved in.
    pub data: &'a [u8],
}

fn layout(kind: VertexKind, size: u16) -> (VertexUsage, VertexFormat) {
    match kind {
        VertexKind::Position => (VertexUsage::Position, VertexFormat::Float32x3),
        VertexKind::Normal32 => (VertexUsage::Normal, VertexFormat::Float32x3),
        VertexKind::Weight32 => (VertexUsage::BoneWeights, VertexFormat::Float32x3),
        VertexKind::Normal | VertexKind::Normal2 => (VertexUsage::Normal, VertexFormat::Snorm8x4),
        VertexKind::BoneId | VertexKind::BoneId2 => {
            (VertexUsage::BoneIndices, VertexFormat::Uint8x4)
        }
        VertexKind::WeightId => (VertexUsage::VertexIndex, VertexFormat::Uint16),
        VertexKind::VertexColor | VertexKind::VertexColor2 | VertexKind::VertexColor3 => {
            (VertexUsage::VertexColor, VertexFormat::Uint8x4)
        }
        VertexKind::Uv1 | VertexKind::Uv2 | VertexKind::Uv3 | VertexKind::Uv4 => {
            (VertexUsage::TextureCoordinate, VertexFormat::Float32x2)
        }
        VertexKind::Weight16 => (VertexUsage::BoneWeights, VertexFormat::Unorm16x4),
        _ => (VertexUsage::Undefined, VertexFormat::Opaque(size)),
    }
}

fn set_index(kind: VertexKind) -> usize {
    match kind {
        VertexKind::Uv2 | VertexKind::VertexColor2 => 1,
        VertexKind::Uv3 | VertexKind::VertexColor3 => 2,
        VertexKind::Uv4 => 3,
        _ => 0,
    }
}

impl<'a> VertexAttribute<'a> {
    /// Lays out the attributes of a buffer, one after another in descriptor order.
    pub(crate) fn from_descriptors(
        descriptors: &[VertexDescriptor],
        data: &'a [u8],
        stride: usize,
    ) -> Result<Vec<Self>> {
        let mut offset = 0;
        descriptors
            .iter()
            .map(|descriptor| {
                let (usage, format) = layout(descriptor.kind, descriptor.size);
                if format.size() > descriptor.size as usize {
                    return Err(Error::invariant(format!(
                        "{:?} needs {} bytes but has {}",
                        descriptor.kind,
                        format.size(),
                        descriptor.size
                    )));
                }
                let attribute = VertexAttribute {
                    usage,
                    format,
                    set: set_index(descriptor.kind),
                    offset,
                    stride,
                    unpack: Unpack::None,
                    data,
                };
                offset += descriptor.size as usize;
                Ok(attribute)
            })
            .collect()
    }

    /// The bytes of this attribute in `vertex`.
    pub fn element(&self, vertex: usize) -> Result<&'a [u8]> {
        let size = self.format.size();
        vertex
            .checked_mul(self.stride)
            .and_then(|at| at.checked_add(self.offset))
            .and_then(|at| self.data.get(at..at.checked_add(size)?))
            .ok_or_else(|| Error::CorruptOffset {
                offset: (vertex as i64)
                    .saturating_mul(self.stride as i64)
                    .saturating_add(self.offset as i64),
                size,
                len: self.data.len(),
            })
    }

    /// Components of `vertex` as floats, normalized and unpacked. Missing components are zero.
    pub fn read(&self, vertex: usize) -> Result<Vec4> {
        let bytes = self.element(vertex)?;
        let value = match self.format {
            VertexFormat::Float32x2 | VertexFormat::Float32x3 => {
                let mut components = [0.0; 4];
                for (component, chunk) in components.iter_mut().zip(bytes.chunks_exact(4)) {
                    *component = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
                Vec4::from_array(components)
            }
            VertexFormat::Snorm8x4 => {
                Vec4::from_array(bytes_4(bytes).map(|b| (b as i8 as f32 / 127.0).max(-1.0)))
            }
            VertexFormat::Unorm8x4 => Vec4::from_array(bytes_4(bytes).map(|b| b as f32 / 255.0)),
            VertexFormat::Unorm16x4 => Vec4::from_array(words_4(bytes).map(|w| w as f32 / 65535.0)),
            VertexFormat::Uint8x4 | VertexFormat::Uint16 | VertexFormat::Uint32 => {
                Vec4::from_array(self.read_uint(vertex)?.map(|v| v as f32))
            }
            VertexFormat::Opaque(_) => {
                return Err(Error::NotImplemented {
                    what: "reading an attribute of unknown layout",
                })
            }
        };

        Ok(match self.unpack {
            Unpack::None => value,
            Unpack::Add(bias) => value + Vec4::splat(bias),
        })
    }

    /// Integer components of `vertex`. Missing components are zero.
    pub fn read_uint(&self, vertex: usize) -> Result<[u32; 4]> {
        let bytes = self.element(vertex)?;
        match self.format {
            VertexFormat::Uint8x4 => Ok(bytes_4(bytes).map(u32::from)),
            VertexFormat::Uint16 => Ok([u16::from_le_bytes([bytes[0], bytes[1]]).into(), 0, 0, 0]),
            VertexFormat::Uint32 => {
                Ok([u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 0, 0, 0])
            }
            _ => Err(Error::invariant(format!("{:?} is not an integer format", self.format))),
        }
    }
}

fn bytes_4(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn words_4(bytes: &[u8]) -> [u16; 4] {
    [0, 1, 2, 3].map(|i| u16::from_le_bytes([bytes[i * 2], bytes[i * 2 + 1]]))
}

/// Vertices sharing one interleaved layout.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexArray<'a> {
    pub vertex_count: usize,
    pub attributes: Vec<VertexAttribute<'a>>,
}

impl<'a> VertexArray<'a> {
    /// The first attribute with `usage` in `set`.
    pub fn attribute(&self, usage: VertexUsage, set: usize) -> Option<&VertexAttribute<'a>> {
        self.attributes
            .iter()
            .find(|attribute| attribute.usage == usage && attribute.set == set)
    }
}

/// A triangle list of 16-bit little-endian indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexArray<'a> {
    pub data: &'a [u8],
}

impl IndexArray<'_> {
    /// Bytes per index.
    pub fn index_size(&self) -> usize {
        2
    }

    pub fn index_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.data.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: u16, size: u16) -> VertexDescriptor {
        VertexDescriptor {
            kind: VertexKind::from_raw(kind),
            size,
        }
    }

    #[test]
    fn layout_follows_descriptors() {
        let descriptors = [
            descriptor(0, 12),
            descriptor(28, 4),
            descriptor(6, 8),
            descriptor(16, 8),
        ];
        let attributes = VertexAttribute::from_descriptors(&descriptors, &[], 32).unwrap();

        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[1].format, VertexFormat::Snorm8x4);
        assert_eq!(attributes[2].usage, VertexUsage::TextureCoordinate);
        assert_eq!(attributes[2].set, 1);
        assert_eq!(attributes[3].usage, VertexUsage::Undefined);
        assert_eq!(attributes[3].format, VertexFormat::Opaque(8));
        assert_eq!(attributes[3].offset, 24);
    }

    #[test]
    fn descriptor_too_small() {
        assert!(matches!(
            VertexAttribute::from_descriptors(&[descriptor(0, 8)], &[], 8),
            Err(Error::Invariant { .. })
        ));
    }

    #[test]
    fn read_components() {
        let mut data = Vec::new();
        for i in 0..2u8 {
            data.extend_from_slice(&(i as f32 + 0.5).to_le_bytes());
            data.extend_from_slice(&[0x7F, 0x81, 0x80, i]);
        }
        // normals follow a single float
        let mut attributes =
            VertexAttribute::from_descriptors(&[descriptor(28, 4)], &data, 8).unwrap();
        attributes[0].offset = 4;

        let normal = attributes[0].read(1).unwrap();
        assert_eq!(normal.x, 1.0);
        assert_eq!(normal.y, -1.0);
        assert_eq!(normal.z, -1.0);

        attributes[0].unpack = Unpack::Add(-0.5);
        assert_eq!(attributes[0].read(0).unwrap().x, 0.5);
        assert!(matches!(attributes[0].read(2), Err(Error::CorruptOffset { .. })));
    }

    #[test]
    fn integer_formats() {
        let data = [3, 0, 7, 1];
        let attributes = VertexAttribute::from_descriptors(&[descriptor(3, 2)], &data, 2).unwrap();
        assert_eq!(attributes[0].read_uint(1).unwrap(), [263, 0, 0, 0]);
        assert_eq!(attributes[0].read(0).unwrap().x, 3.0);
    }

    #[test]
    fn indices() {
        let data = [0, 0, 2, 0, 1, 1];
        let indices = IndexArray { data: &data };
        assert_eq!(indices.index_count(), 3);
        assert_eq!(indices.indices().collect::<Vec<_>>(), [0, 2, 257]);
    }
}
