// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![allow(non_camel_case_types)]

use binrw::binrw;

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TileMode {
    Default,
    LinearAligned,
    Tiled1DThin1,
    Tiled1DThick,
    Tiled2DThin1,
    Tiled2DThin2,
    Tiled2DThin4,
    Tiled2DThick,
    Tiled2BThin1,
    Tiled2BThin2,
    Tiled2BThin4,
    Tiled2BThick,
    Tiled3DThin1,
    Tiled3DThick,
    Tiled3BThin1,
    Tiled3BThick,
    LinearSpecial,
    DefaultBadAlign = 0x20,
}

impl TileMode {
    /// Whether the surface data is stored tiled rather than linear.
    pub fn is_tiled(self) -> bool {
        self > TileMode::LinearAligned
            && self != TileMode::LinearSpecial
            && self != TileMode::DefaultBadAlign
    }

    /// Macro tiled surfaces also swizzle pipes and banks.
    pub fn is_macro_tiled(self) -> bool {
        self.is_tiled() && self >= TileMode::Tiled2DThin1
    }
}

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceDim {
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    Texture1DArray,
    Texture2DArray,
    Texture2DMSAA,
    Texture2DMSAAArray,
}

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AAMode {
    Mode1X,
    Mode2X,
    Mode4X,
    Mode8X,
}

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    INVALID = 0x00,
    UNORM_R4_G4 = 0x02,
    UNORM_R4_G4_B4_A4 = 0x0b,
    UNORM_R8 = 0x01,
    UNORM_R8_G8 = 0x07,
    UNORM_R8_G8_B8_A8 = 0x01a,
    UNORM_R16 = 0x05,
    UNORM_R16_G16 = 0x0f,
    UNORM_R16_G16_B16_A16 = 0x01f,
    UNORM_R5_G6_B5 = 0x08,
    UNORM_R5_G5_B5_A1 = 0x0a,
    UNORM_A1_B5_G5_R5 = 0x0c,
    UNORM_R24_X8 = 0x011,
    UNORM_A2_B10_G10_R10 = 0x01b,
    UNORM_R10_G10_B10_A2 = 0x019,
    UNORM_BC1 = 0x031,
    UNORM_BC2 = 0x032,
    UNORM_BC3 = 0x033,
    UNORM_BC4 = 0x034,
    UNORM_BC5 = 0x035,
    UNORM_NV12 = 0x081,
    UINT_R8 = 0x101,
    UINT_R8_G8 = 0x107,
    UINT_R8_G8_B8_A8 = 0x11a,
    UINT_R16 = 0x105,
    UINT_R16_G16 = 0x10f,
    UINT_R16_G16_B16_A16 = 0x11f,
    UINT_R32 = 0x10d,
    UINT_R32_G32 = 0x11d,
    UINT_R32_G32_B32_A32 = 0x122,
    UINT_A2_B10_G10_R10 = 0x11b,
    UINT_R10_G10_B10_A2 = 0x119,
    UINT_X24_G8 = 0x111,
    UINT_G8_X24 = 0x11c,
    SNORM_R8 = 0x201,
    SNORM_R8_G8 = 0x207,
    SNORM_R8_G8_B8_A8 = 0x21a,
    SNORM_R16 = 0x205,
    SNORM_R16_G16 = 0x20f,
    SNORM_R16_G16_B16_A16 = 0x21f,
    SNORM_R10_G10_B10_A2 = 0x219,
    SNORM_BC4 = 0x234,
    SNORM_BC5 = 0x235,
    SINT_R8 = 0x301,
    SINT_R8_G8 = 0x307,
    SINT_R8_G8_B8_A8 = 0x31a,
    SINT_R16 = 0x305,
    SINT_R16_G16 = 0x30f,
    SINT_R16_G16_B16_A16 = 0x31f,
    SINT_R32 = 0x30d,
    SINT_R32_G32 = 0x31d,
    SINT_R32_G32_B32_A32 = 0x322,
    SINT_R10_G10_B10_A2 = 0x319,
    SRGB_R8_G8_B8_A8 = 0x41a,
    SRGB_BC1 = 0x431,
    SRGB_BC2 = 0x432,
    SRGB_BC3 = 0x433,
    FLOAT_R32 = 0x80e,
    FLOAT_R32_G32 = 0x81e,
    FLOAT_R32_G32_B32_A32 = 0x823,
    FLOAT_R16 = 0x806,
    FLOAT_R16_G16 = 0x810,
    FLOAT_R16_G16_B16_A16 = 0x820,
    FLOAT_R11_G11_B10 = 0x816,
    FLOAT_D24_S8 = 0x811,
    FLOAT_X8_X24 = 0x81c,
}

impl SurfaceFormat {
    /// Bytes per block and pixels per block edge, for the formats textures are stored in.
    pub fn block_info(self) -> Option<(u32, u32)> {
        use SurfaceFormat::*;
        Some(match self {
            UNORM_BC1 | SRGB_BC1 | UNORM_BC4 | SNORM_BC4 => (8, 4),
            UNORM_BC2 | SRGB_BC2 | UNORM_BC3 | SRGB_BC3 | UNORM_BC5 | SNORM_BC5 => (16, 4),
            UNORM_R8 => (1, 1),
            UNORM_R8_G8_B8_A8 | SRGB_R8_G8_B8_A8 => (4, 1),
            _ => return None,
        })
    }
}

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerType {
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
}

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVarType {
    Void,
    Bool,
    Int,
    Uint,
    Float,
    Double,
    DVec2,
    DVec3,
    DVec4,
    Vec2,
    Vec3,
    Vec4,
    BVec2,
    BVec3,
    BVec4,
    IVec2,
    IVec3,
    IVec4,
    UVec2,
    UVec3,
    UVec4,
    Mat2,
    Mat2x3,
    Mat2x4,
    Mat3x2,
    Mat3,
    Mat3x4,
    Mat4x2,
    Mat4x3,
    Mat4,
    DMat2,
    DMat2x3,
    DMat2x4,
    DMat3x2,
    DMat3,
    DMat3x4,
    DMat4x2,
    DMat4x3,
    DMat4,
}

#[binrw]
#[brw(repr = u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderMode {
    UniformRegister,
    UniformBlock,
    GeometryShader,
    ComputeShader,
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use binrw::{BinRead, Endian};

    use super::*;

    #[test]
    fn tiling() {
        assert!(!TileMode::LinearAligned.is_tiled());
        assert!(TileMode::Tiled1DThin1.is_tiled());
        assert!(!TileMode::Tiled1DThin1.is_macro_tiled());
        assert!(TileMode::Tiled2DThin1.is_macro_tiled());
        assert!(!TileMode::DefaultBadAlign.is_tiled());
    }

    #[test]
    fn read_format() {
        let mut cursor = Cursor::new([0u8, 0, 0x04, 0x31]);
        let format = SurfaceFormat::read_options(&mut cursor, Endian::Big, ()).unwrap();
        assert_eq!(format, SurfaceFormat::SRGB_BC1);
        assert_eq!(format.block_info(), Some((8, 4)));
    }
}
