// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::debug;

use crate::context::{Context, ProcessOptions};
use crate::detect::expect_footer_magic;
use crate::error::{Error, Result};
use crate::pointer::DataRange;
use crate::ByteSpan;

pub const LBIM_MAGIC: [u8; 4] = *b"LBIM";

/// Size of the footer at the end of the file.
pub const LBIM_FOOTER_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbimFormat {
    R8,
    Rgba8888,
    R16G16B16A16,
    Rgba4444,
    Bc1,
    Bc2,
    Bc3,
    Bc4Unorm,
    Bc5Unorm,
    Bc7,
    Bc6hUf16,
    Bgra8888,
}

impl LbimFormat {
    fn from_raw(value: u32) -> Result<Self> {
        Ok(match value {
            1 => LbimFormat::R8,
            37 => LbimFormat::Rgba8888,
            41 => LbimFormat::R16G16B16A16,
            57 => LbimFormat::Rgba4444,
            66 => LbimFormat::Bc1,
            67 => LbimFormat::Bc2,
            68 => LbimFormat::Bc3,
            73 => LbimFormat::Bc4Unorm,
            75 => LbimFormat::Bc5Unorm,
            77 => LbimFormat::Bc7,
            80 => LbimFormat::Bc6hUf16,
            109 => LbimFormat::Bgra8888,
            _ => return Err(Error::InvalidValue { what: "LBIM format", value }),
        })
    }

    /// Bytes per block and pixels per block edge.
    pub fn block_info(self) -> (u32, u32) {
        match self {
            LbimFormat::Bc1 | LbimFormat::Bc4Unorm => (8, 4),
            LbimFormat::Bc2
            | LbimFormat::Bc3
            | LbimFormat::Bc5Unorm
            | LbimFormat::Bc7
            | LbimFormat::Bc6hUf16 => (16, 4),
            LbimFormat::Rgba8888 | LbimFormat::Bgra8888 => (4, 1),
            LbimFormat::Rgba4444 => (2, 1),
            LbimFormat::R8 => (1, 1),
            LbimFormat::R16G16B16A16 => (8, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbimKind {
    Texture2D,
    Volume,
    Cubemap,
}

#[binrw]
#[derive(Debug)]
struct Footer {
    data_size: u32,
    header_size: u32,
    width: u32,
    height: u32,
    depth: u32,
    kind: u32,
    format: u32,
    num_mips: u32,
    version: u32,
    magic: [u8; 4],
}

/// A texture with its description stored at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lbim {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub kind: LbimKind,
    pub format: LbimFormat,
    pub num_mips: u32,
    pub version: u32,
    /// Swizzled texel data in front of the footer.
    pub data: DataRange,
}

impl Lbim {
    /// Reads the footer of an existing texture.
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Lbim> {
        expect_footer_magic(buffer, &LBIM_MAGIC)?;
        let endian = options.byte_order("LBIM", Some(Endian::Little), &[Endian::Little])?;
        let at = buffer.len().checked_sub(LBIM_FOOTER_SIZE).ok_or(Error::CorruptOffset {
            offset: 0,
            size: LBIM_FOOTER_SIZE,
            len: buffer.len(),
        })?;

        let ctx = Context::new(buffer, endian, options.exclude);
        let footer: Footer = ctx.read(at)?;
        let kind = match footer.kind {
            1 => LbimKind::Texture2D,
            2 => LbimKind::Volume,
            8 => LbimKind::Cubemap,
            value => return Err(Error::InvalidValue { what: "LBIM kind", value }),
        };
        let format = LbimFormat::from_raw(footer.format)?;
        debug!(width = footer.width, height = footer.height, ?format, "Decoding LBIM");

        Ok(Lbim {
            width: footer.width,
            height: footer.height,
            depth: footer.depth,
            kind,
            format,
            num_mips: footer.num_mips,
            version: footer.version,
            data: DataRange::new(0, at.min(footer.data_size as usize), buffer.len())?,
        })
    }

    /// Number of array slices, six for cube maps.
    pub fn slices(&self) -> u32 {
        match self.kind {
            LbimKind::Cubemap => 6,
            _ => self.depth.max(1),
        }
    }

    /// Size of the top mip of one slice, in bytes.
    pub fn surface_size(&self) -> usize {
        let (bytes, pixels) = self.format.block_info();
        (self.width / pixels) as usize * (self.height / pixels) as usize * bytes as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Builder;

    fn texture(kind: u32, format: u32) -> Vec<u8> {
        let mut b = Builder::new(Endian::Little);
        b.zeros(4096);
        b.u32(4096).u32(0x1000).u32(64).u32(64).u32(1).u32(kind).u32(format).u32(1).u32(10001);
        b.bytes(b"LBIM");
        b.finish()
    }

    #[test]
    fn read_footer() {
        let data = texture(8, 66);
        let lbim = Lbim::from_existing(&data, &ProcessOptions::default()).unwrap();
        assert_eq!(lbim.kind, LbimKind::Cubemap);
        assert_eq!(lbim.format, LbimFormat::Bc1);
        assert_eq!(lbim.slices(), 6);
        assert_eq!(lbim.surface_size(), 16 * 16 * 8);
        assert_eq!(lbim.data.len(), 4096);
    }

    #[test]
    fn unknown_format() {
        let data = texture(1, 2);
        assert!(matches!(
            Lbim::from_existing(&data, &ProcessOptions::default()),
            Err(Error::InvalidValue { value: 2, .. })
        ));
    }

    #[test]
    fn big_endian_rejected() {
        let data = texture(1, 66);
        let options = ProcessOptions::default().with_endian(crate::EndianMode::Big);
        assert!(Lbim::from_existing(&data, &options).is_err());
    }
}
