// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

#![allow(clippy::identity_op)]

use binrw::{binrw, Endian};
use modular_bitfield::prelude::*;
use tracing::debug;

use crate::context::{Context, ProcessOptions};
use crate::detect::expect_footer_magic;
use crate::error::{Error, Result};
use crate::gx2::{AAMode, SurfaceDim, SurfaceFormat, TileMode};
use crate::pointer::DataRange;
use crate::ByteSpan;

pub const MTXT_MAGIC: [u8; 4] = *b"MTXT";

/// Size of the footer at the end of the file.
pub const MTXT_FOOTER_SIZE: usize = 112;

/// Surface swizzle word. Only the pipe and bank bits are used when untiling.
#[bitfield]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Swizzle {
    pub unused: B8,
    pub pipe: B1,
    pub bank: B2,
    pub rest: B21,
}

impl Swizzle {
    fn from_word(word: u32) -> Self {
        Swizzle::from_bytes(word.to_le_bytes())
    }
}

#[binrw]
#[derive(Debug)]
struct Footer {
    swizzle: u32,
    dimension: SurfaceDim,
    width: u32,
    height: u32,
    depth: u32,
    num_mips: u32,
    format: SurfaceFormat,
    size: u32,
    aa_mode: AAMode,
    tile_mode: TileMode,
    unk: u32,
    alignment: u32,
    pitch: u32,
    null: [u32; 13],
    version: u32,
    magic: [u8; 4],
}

/// A GX2 texture with its surface description stored at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mtxt {
    pub swizzle: Swizzle,
    pub dimension: SurfaceDim,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub num_mips: u32,
    pub format: SurfaceFormat,
    pub aa_mode: AAMode,
    pub tile_mode: TileMode,
    pub alignment: u32,
    pub pitch: u32,
    pub version: u32,
    /// Tiled surface data in front of the footer.
    pub data: DataRange,
}

impl Mtxt {
    /// Reads the footer of an existing texture.
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Mtxt> {
        expect_footer_magic(buffer, &MTXT_MAGIC)?;
        let endian = options.byte_order("MTXT", Some(Endian::Big), &[Endian::Big])?;
        let at = buffer.len().checked_sub(MTXT_FOOTER_SIZE).ok_or(Error::CorruptOffset {
            offset: 0,
            size: MTXT_FOOTER_SIZE,
            len: buffer.len(),
        })?;

        let ctx = Context::new(buffer, endian, options.exclude);
        let footer: Footer = ctx.read(at)?;
        debug!(
            width = footer.width,
            height = footer.height,
            format = ?footer.format,
            tile_mode = ?footer.tile_mode,
            "Decoding MTXT"
        );

        Ok(Mtxt {
            swizzle: Swizzle::from_word(footer.swizzle),
            dimension: footer.dimension,
            width: footer.width,
            height: footer.height,
            depth: footer.depth,
            num_mips: footer.num_mips,
            format: footer.format,
            aa_mode: footer.aa_mode,
            tile_mode: footer.tile_mode,
            alignment: footer.alignment,
            pitch: footer.pitch,
            version: footer.version,
            data: DataRange::new(0, at.min(footer.size as usize), buffer.len())?,
        })
    }

    /// Pipe and bank swizzle bits, in that order.
    pub fn pipe_bank(&self) -> (u8, u8) {
        (self.swizzle.pipe(), self.swizzle.bank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Builder;

    #[test]
    fn read_footer() {
        let mut b = Builder::new(Endian::Big);
        b.zeros(256);
        b.u32(0x0000_0500)
            .u32(1)
            .u32(32)
            .u32(16)
            .u32(1)
            .u32(1)
            .u32(0x31)
            .u32(256)
            .u32(0)
            .u32(4)
            .u32(0)
            .u32(0x200)
            .u32(32)
            .zeros(52)
            .u32(10001)
            .bytes(b"MTXT");
        let data = b.finish();

        let mtxt = Mtxt::from_existing(&data, &ProcessOptions::default()).unwrap();
        assert_eq!(mtxt.format, SurfaceFormat::UNORM_BC1);
        assert_eq!(mtxt.tile_mode, TileMode::Tiled2DThin1);
        assert_eq!(mtxt.dimension, SurfaceDim::Texture2D);
        assert_eq!(mtxt.pipe_bank(), (1, 2));
        assert_eq!(mtxt.data.len(), 256);
    }

    #[test]
    fn missing_footer() {
        assert!(matches!(
            Mtxt::from_existing(b"MTXT", &ProcessOptions::default()),
            Err(Error::CorruptOffset { .. })
        ));
        assert!(matches!(
            Mtxt::from_existing(&[0u8; 200], &ProcessOptions::default()),
            Err(Error::InvalidHeader { .. })
        ));
    }
}
