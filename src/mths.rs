// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::debug;

use crate::context::{Context, ProcessOptions, RawRead};
use crate::detect::expect_magic;
use crate::error::{Error, Result};
use crate::gx2::{SamplerType, ShaderMode, ShaderVarType};
use crate::pointer::{CountedArray, DataRange, Pointer};
use crate::ByteSpan;

pub const MTHS_MAGIC: [u8; 4] = *b"MTHS";
pub const MTHS_VERSION: u32 = 10001;

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawSampler {
    name: u32,
    kind: SamplerType,
    location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sampler {
    pub name: String,
    pub kind: SamplerType,
    pub location: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawUniformValue {
    name: u32,
    kind: ShaderVarType,
    count: u32,
    offset: u32,
    block_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformValue {
    pub name: String,
    pub kind: ShaderVarType,
    pub count: u32,
    pub offset: u32,
    /// -1 for uniforms outside of a block.
    pub block_index: i32,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawAttribute {
    name: u32,
    kind: ShaderVarType,
    count: u32,
    location: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: ShaderVarType,
    pub count: u32,
    pub location: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct RawUniformBlock {
    name: u32,
    offset: u32,
    size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

#[binrw]
#[derive(Debug)]
struct RawFragmentShader {
    registries: u32,
    num_registries: u32,
    program: CountedArray<u8>,
    mode: ShaderMode,
    uniform_blocks: CountedArray<RawUniformBlock>,
    uniform_vars: CountedArray<RawUniformValue>,
    null01: [u32; 4],
    samplers: CountedArray<RawSampler>,
}

#[binrw]
#[derive(Debug)]
struct RawVertexShader {
    fragment: RawFragmentShader,
    attributes: CountedArray<RawAttribute>,
    null02: [u32; 6],
}

/// Parts shared by every shader kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    pub registries: Vec<u32>,
    /// GX2 program in the programs section.
    pub program: DataRange,
    pub mode: ShaderMode,
    pub uniform_blocks: Vec<UniformBlock>,
    pub uniform_vars: Vec<UniformValue>,
    pub samplers: Vec<Sampler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexShader {
    pub shader: Shader,
    pub attributes: Vec<Attribute>,
}

#[binrw]
#[derive(Debug)]
struct RawHeader {
    magic: [u8; 4],
    version: u32,
    vertex_shader: Pointer<u8>,
    fragment_shader: Pointer<u8>,
    geometry_shader: Pointer<u8>,
    uniform_blocks: Pointer<u8>,
    uniform_vars: Pointer<u8>,
    attributes: Pointer<u8>,
    samplers: Pointer<u8>,
    registries: Pointer<u8>,
    strings: Pointer<u8>,
    programs: Pointer<u8>,
}

/// Resolved section offsets. Arrays inside a shader count from the start of their section.
struct Sections {
    uniform_blocks: Option<usize>,
    uniform_vars: Option<usize>,
    attributes: Option<usize>,
    samplers: Option<usize>,
    registries: Option<usize>,
    strings: Option<usize>,
    programs: Option<usize>,
}

impl Sections {
    fn resolve(ctx: &Context<'_>, raw: &RawHeader) -> Result<Self> {
        Ok(Sections {
            uniform_blocks: ctx.resolve(raw.uniform_blocks)?,
            uniform_vars: ctx.resolve(raw.uniform_vars)?,
            attributes: ctx.resolve(raw.attributes)?,
            samplers: ctx.resolve(raw.samplers)?,
            registries: ctx.resolve(raw.registries)?,
            strings: ctx.resolve(raw.strings)?,
            programs: ctx.resolve(raw.programs)?,
        })
    }
}

fn in_section(section: Option<usize>, offset: u32, name: &str) -> Result<usize> {
    let section = section
        .ok_or_else(|| Error::invariant(format!("shader uses the missing {name} section")))?;
    Ok(section + offset as usize)
}

fn section_values<T: RawRead>(
    ctx: &Context<'_>,
    section: Option<usize>,
    array: CountedArray<T>,
    name: &str,
) -> Result<Vec<T>> {
    // offset zero is the start of the section, not a null array
    if array.len() == 0 {
        return Ok(Vec::new());
    }
    ctx.values_at(in_section(section, array.pointer().raw(), name)?, array.len())
}

fn name(ctx: &Context<'_>, sections: &Sections, offset: u32) -> Result<String> {
    ctx.string_at(in_section(sections.strings, offset, "strings")?)
}

fn check_reserved(words: &[u32]) -> Result<()> {
    match words.iter().position(|word| *word != 0) {
        Some(index) => Err(Error::invariant(format!(
            "reserved shader word {index} is {:#x}",
            words[index]
        ))),
        None => Ok(()),
    }
}

impl Shader {
    fn read(ctx: &Context<'_>, sections: &Sections, raw: &RawFragmentShader) -> Result<Self> {
        check_reserved(&raw.null01)?;

        let registries = match raw.num_registries {
            0 => Vec::new(),
            count => {
                let at = in_section(sections.registries, raw.registries, "registries")?;
                ctx.values_at(at, count as usize)?
            }
        };
        let program = match raw.program.len() {
            0 => DataRange::default(),
            len => DataRange::new(
                in_section(sections.programs, raw.program.pointer().raw(), "programs")?,
                len,
                ctx.len(),
            )?,
        };

        let uniform_blocks =
            section_values(ctx, sections.uniform_blocks, raw.uniform_blocks, "uniform blocks")?;
        let uniform_blocks = uniform_blocks
            .into_iter()
            .map(|block| {
                Ok(UniformBlock {
                    name: name(ctx, sections, block.name)?,
                    offset: block.offset,
                    size: block.size,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let uniform_vars =
            section_values(ctx, sections.uniform_vars, raw.uniform_vars, "uniform values")?;
        let uniform_vars = uniform_vars
            .into_iter()
            .map(|value| {
                Ok(UniformValue {
                    name: name(ctx, sections, value.name)?,
                    kind: value.kind,
                    count: value.count,
                    offset: value.offset,
                    block_index: value.block_index,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let samplers = section_values(ctx, sections.samplers, raw.samplers, "samplers")?
            .into_iter()
            .map(|sampler| {
                Ok(Sampler {
                    name: name(ctx, sections, sampler.name)?,
                    kind: sampler.kind,
                    location: sampler.location,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Shader {
            registries,
            program,
            mode: raw.mode,
            uniform_blocks,
            uniform_vars,
            samplers,
        })
    }
}

/// A compiled GX2 shader set. Only big-endian files exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mths {
    pub vertex_shader: Option<VertexShader>,
    pub fragment_shader: Option<Shader>,
    /// Geometry shaders are located but not decoded.
    pub geometry_shader: Option<usize>,
}

impl Mths {
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Mths> {
        expect_magic(buffer, &MTHS_MAGIC)?;
        let endian = options.byte_order("MTHS", Some(Endian::Big), &[Endian::Big])?;
        let ctx = Context::new(buffer, endian, options.exclude);

        let raw: RawHeader = ctx.read(0)?;
        if raw.version != MTHS_VERSION {
            return Err(Error::InvalidVersion { version: raw.version });
        }
        debug!(version = raw.version, "Decoding MTHS");

        let sections = Sections::resolve(&ctx, &raw)?;

        let vertex_shader = match ctx.resolve(raw.vertex_shader)? {
            Some(at) => {
                let vertex: RawVertexShader = ctx.read(at)?;
                check_reserved(&vertex.null02)?;
                let attributes =
                    section_values(&ctx, sections.attributes, vertex.attributes, "attributes")?;
                let attributes = attributes
                    .into_iter()
                    .map(|attribute| {
                        Ok(Attribute {
                            name: name(&ctx, &sections, attribute.name)?,
                            kind: attribute.kind,
                            count: attribute.count,
                            location: attribute.location,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(VertexShader {
                    shader: Shader::read(&ctx, &sections, &vertex.fragment)?,
                    attributes,
                })
            }
            None => None,
        };

        let fragment_shader = match ctx.resolve(raw.fragment_shader)? {
            Some(at) => Some(Shader::read(&ctx, &sections, &ctx.read(at)?)?),
            None => None,
        };

        Ok(Mths {
            vertex_shader,
            fragment_shader,
            geometry_shader: ctx.resolve(raw.geometry_shader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Builder;

    /// A vertex shader with one attribute and sampler, and a fragment shader with one uniform
    /// block.
    fn shader_set() -> Vec<u8> {
        let mut b = Builder::new(Endian::Big);
        b.bytes(&MTHS_MAGIC).u32(MTHS_VERSION).zeros(40);

        let vertex = b.pos();
        b.u32(0).u32(2).u32(4).u32(0).u32(1).zeros(16).zeros(16).u32(1).u32(0);
        b.u32(1).u32(0).zeros(24);
        let fragment = b.pos();
        b.u32(8).u32(1).u32(4).u32(4).u32(1).u32(1).u32(0).zeros(8).zeros(16).zeros(8);

        let blocks = b.pos();
        b.u32(11).u32(0).u32(64);
        let samplers = b.pos();
        b.u32(0).u32(1).u32(0);
        let attributes = b.pos();
        b.u32(6).u32(10).u32(1).u32(0);
        let registries = b.pos();
        b.u32s(&[0xA, 0xB, 0xC]);
        let strings = b.pos();
        b.cstr("s_tex").cstr("vPos").cstr("Uniforms");
        let programs = b.pos();
        b.bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);

        b.patch_u32(8, vertex as u32)
            .patch_u32(12, fragment as u32)
            .patch_u32(20, blocks as u32)
            .patch_u32(28, attributes as u32)
            .patch_u32(32, samplers as u32)
            .patch_u32(36, registries as u32)
            .patch_u32(40, strings as u32)
            .patch_u32(44, programs as u32);
        b.finish()
    }

    #[test]
    fn read_shaders() {
        let data = shader_set();
        let mths = Mths::from_existing(&data, &ProcessOptions::default()).unwrap();

        let vertex = mths.vertex_shader.unwrap();
        assert_eq!(vertex.shader.registries, [0xA, 0xB]);
        assert_eq!(vertex.shader.program.slice(&data), [1, 2, 3, 4]);
        assert_eq!(vertex.shader.mode, ShaderMode::UniformBlock);
        assert_eq!(vertex.shader.samplers[0].name, "s_tex");
        assert_eq!(vertex.shader.samplers[0].kind, SamplerType::Sampler2D);
        assert_eq!(vertex.attributes[0].name, "vPos");
        assert_eq!(vertex.attributes[0].kind, ShaderVarType::Vec3);

        let fragment = mths.fragment_shader.unwrap();
        assert_eq!(fragment.registries, [0xC]);
        assert_eq!(fragment.program.slice(&data), [5, 6, 7, 8]);
        assert_eq!(fragment.uniform_blocks[0].name, "Uniforms");
        assert_eq!(fragment.uniform_blocks[0].size, 64);
        assert!(mths.geometry_shader.is_none());
    }

    #[test]
    fn reserved_words_must_be_zero() {
        let mut data = shader_set();
        let fragment = u32::from_be_bytes(data[12..16].try_into().unwrap()) as usize;
        data[fragment + 40] = 1;
        assert!(matches!(
            Mths::from_existing(&data, &ProcessOptions::default()),
            Err(Error::Invariant { .. })
        ));
    }

    #[test]
    fn wrong_version() {
        let mut data = shader_set();
        data[4..8].copy_from_slice(&10002u32.to_be_bytes());
        assert!(matches!(
            Mths::from_existing(&data, &ProcessOptions::default()),
            Err(Error::InvalidVersion { version: 10002 })
        ));
    }
}
