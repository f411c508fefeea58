// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinResult, BinWrite, Endian};
use tracing::{debug, warn};

use crate::context::{Context, ProcessOptions};
use crate::detect::expect_magic;
use crate::error::{Error, Result};
use crate::pointer::{DataRange, Pointer64};
use crate::ByteSpan;

/// Keyframed bone animation.
pub mod anim;
/// Animation state machines.
pub mod asmb;
/// Bone hierarchy.
pub mod skel;

pub use anim::Animation;
pub use asmb::StateMachine;
pub use skel::Skeleton;

pub const BC_MAGIC: [u8; 4] = *b"BC\0\0";

/// A run of records stored as a 64-bit offset, a count and an unused word.
pub struct BcArray<T> {
    pub items: Pointer64<T>,
    pub count: u32,
    pub unk: u32,
}

impl<T> BcArray<T> {
    pub fn pointer(&self) -> Pointer64<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0 || self.items.is_null()
    }
}

impl<T> Clone for BcArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for BcArray<T> {}

impl<T> fmt::Debug for BcArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BcArray")
            .field("items", &self.items)
            .field("count", &self.count)
            .finish()
    }
}

impl<T> BinRead for BcArray<T> {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(Self {
            items: BinRead::read_options(reader, endian, ())?,
            count: BinRead::read_options(reader, endian, ())?,
            unk: BinRead::read_options(reader, endian, ())?,
        })
    }
}

impl<T> BinWrite for BcArray<T> {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        self.items.write_options(writer, endian, ())?;
        self.count.write_options(writer, endian, ())?;
        self.unk.write_options(writer, endian, ())
    }
}

/// Translation, rotation quaternion and scale, each padded to four lanes.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rts {
    pub translation: [f32; 4],
    pub rotation: [f32; 4],
    pub scale: [f32; 4],
}

impl Default for Rts {
    fn default() -> Self {
        Rts {
            translation: [0.0; 4],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0, 0.0],
        }
    }
}

#[binrw]
#[derive(Debug)]
struct RawHeader {
    magic: [u8; 4],
    unk0: u16,
    num_blocks: u16,
    file_size: u32,
    num_pointers: u32,
    data: Pointer64<u8>,
    fixups: Pointer64<u64>,
}

#[binrw]
#[derive(Debug)]
struct BlockHeader {
    unk: u32,
    id: [u8; 4],
}

/// The payload of a container.
#[derive(Debug, Clone, PartialEq)]
pub enum BcBlock {
    Skeleton(Skeleton),
    Animation(Animation),
    StateMachine(StateMachine),
}

/// A relocatable container written by a 64-bit toolchain.
#[derive(Debug, Clone, PartialEq)]
pub struct Bc {
    pub unk0: u16,
    pub num_blocks: u16,
    pub file_size: u32,
    /// File offsets of every stored pointer.
    pub fixups: Vec<u64>,
    pub block: BcBlock,
}

impl Bc {
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Bc> {
        expect_magic(buffer, &BC_MAGIC)?;
        let endian = options.byte_order("BC", Some(Endian::Little), &[Endian::Little])?;
        let ctx = Context::new(buffer, endian, options.exclude);

        let raw: RawHeader = ctx.read(0)?;
        if raw.file_size as usize != buffer.len() {
            warn!(
                file_size = raw.file_size,
                len = buffer.len(),
                "BC size does not match the buffer"
            );
        }

        let fixups = read_fixups(&ctx, raw.fixups, raw.num_pointers as usize)?;

        let data = ctx
            .resolve(raw.data)?
            .ok_or_else(|| Error::invariant("BC container has no data block"))?;
        let block: BlockHeader = ctx.read(data)?;
        debug!(id = %String::from_utf8_lossy(&block.id), pointers = fixups.len(), "Decoding BC");

        let block = match block.id {
            skel::SKEL_MAGIC => BcBlock::Skeleton(Skeleton::read(&ctx, data)?),
            anim::ANIM_MAGIC => BcBlock::Animation(Animation::read(&ctx, data)?),
            asmb::ASMB_MAGIC => BcBlock::StateMachine(StateMachine::read(&ctx, data)?),
            _ => {
                return Err(Error::NotImplemented {
                    what: "BC block kind",
                })
            }
        };

        Ok(Bc {
            unk0: raw.unk0,
            num_blocks: raw.num_blocks,
            file_size: raw.file_size,
            fixups,
            block,
        })
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        match &self.block {
            BcBlock::Skeleton(skeleton) => Some(skeleton),
            _ => None,
        }
    }

    pub fn animation(&self) -> Option<&Animation> {
        match &self.block {
            BcBlock::Animation(animation) => Some(animation),
            _ => None,
        }
    }

    pub fn state_machine(&self) -> Option<&StateMachine> {
        match &self.block {
            BcBlock::StateMachine(machine) => Some(machine),
            _ => None,
        }
    }
}

/// Reads and validates the pointer location table.
///
/// Every location must hold a whole pointer inside the buffer, and may only be relocated once.
fn read_fixups(ctx: &Context<'_>, table: Pointer64<u64>, count: usize) -> Result<Vec<u64>> {
    let locations = ctx.values(table, count)?;
    let mut seen = HashSet::with_capacity(locations.len());

    for location in &locations {
        let at = usize::try_from(*location).map_err(|_| Error::CorruptOffset {
            offset: *location as i64,
            size: 8,
            len: ctx.len(),
        })?;
        DataRange::new(at, 8, ctx.len())?;
        if !seen.insert(at) {
            return Err(Error::invariant(format!("pointer at {at:#x} is relocated twice")));
        }

        let target: u64 = ctx.read(at)?;
        if target as usize >= ctx.len() {
            return Err(Error::CorruptOffset {
                offset: target as i64,
                size: 1,
                len: ctx.len(),
            });
        }
    }

    Ok(locations)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_util::Builder;

    pub(crate) const HEADER_SIZE: usize = 32;

    /// Starts a container whose data block follows the header.
    pub(crate) fn header(b: &mut Builder) {
        b.bytes(&BC_MAGIC).u16(0).u16(1).u32(0).u32(0).u64(HEADER_SIZE as u64).u64(0);
    }

    /// Appends the fixup table listing `pointers` and patches the header.
    pub(crate) fn finish(b: &mut Builder, pointers: &[usize]) -> Vec<u8> {
        b.align(8);
        let table = b.pos();
        for pointer in pointers {
            b.u64(*pointer as u64);
        }
        let len = b.pos();
        b.patch_u32(8, len as u32)
            .patch_u32(12, pointers.len() as u32)
            .patch_u64(24, table as u64);
        b.finish()
    }

    #[test]
    fn unknown_block() {
        let mut b = Builder::new(Endian::Little);
        header(&mut b);
        b.u32(0).bytes(b"XXXX");
        let data = finish(&mut b, &[]);
        assert!(matches!(
            Bc::from_existing(&data, &ProcessOptions::default()),
            Err(Error::NotImplemented { .. })
        ));
    }

    #[test]
    fn fixups_are_validated() {
        let mut b = Builder::new(Endian::Little);
        header(&mut b);
        b.u32(0).bytes(b"XXXX").u64(16);
        let data = finish(&mut b, &[40, 40]);
        assert!(matches!(
            Bc::from_existing(&data, &ProcessOptions::default()),
            Err(Error::Invariant { .. })
        ));

        let mut b = Builder::new(Endian::Little);
        header(&mut b);
        b.u32(0).bytes(b"XXXX");
        let data = finish(&mut b, &[0x1000]);
        assert!(matches!(
            Bc::from_existing(&data, &ProcessOptions::default()),
            Err(Error::CorruptOffset { .. })
        ));
    }

    #[test]
    fn wrong_magic() {
        let data = [b'B', b'C', 1, 0, 0, 0, 0, 0];
        assert!(matches!(
            Bc::from_existing(&data, &ProcessOptions::default()),
            Err(Error::InvalidHeader { .. })
        ));
    }
}
