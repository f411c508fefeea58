// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::binrw;

use crate::bc::{BcArray, Rts};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pointer::Pointer64;

pub const SKEL_MAGIC: [u8; 4] = *b"SKEL";

#[binrw]
#[derive(Debug)]
struct RawHeader {
    unk: u32,
    id: [u8; 4],
    skeleton: Pointer64<u8>,
}

#[binrw]
#[derive(Debug)]
struct RawBone {
    name: Pointer64<u8>,
    null: u64,
}

#[binrw]
#[derive(Debug)]
struct RawSkeleton {
    unk0: BcArray<u8>,
    null: Pointer64<u8>,
    root_bone_name: Pointer64<u8>,
    bone_links: BcArray<i16>,
    bones: BcArray<RawBone>,
    transforms: BcArray<Rts>,
    unk1: [BcArray<u8>; 6],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    /// Local rest transform.
    pub transform: Rts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub root_bone_name: String,
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub(crate) fn read(ctx: &Context<'_>, at: usize) -> Result<Self> {
        let header: RawHeader = ctx.read(at)?;
        let at = ctx
            .resolve(header.skeleton)?
            .ok_or_else(|| Error::invariant("SKEL block has no skeleton"))?;
        let raw: RawSkeleton = ctx.read(at)?;

        let count = raw.bones.len();
        let links: Vec<i16> = ctx.values(raw.bone_links.pointer(), raw.bone_links.len())?;
        let transforms: Vec<Rts> = ctx.values(raw.transforms.pointer(), raw.transforms.len())?;
        if links.len() != count || transforms.len() != count {
            return Err(Error::invariant(format!(
                "{count} bones with {} parent links and {} transforms",
                links.len(),
                transforms.len()
            )));
        }

        let bones = ctx
            .values::<RawBone, _>(raw.bones.pointer(), count)?
            .into_iter()
            .zip(links)
            .zip(transforms)
            .enumerate()
            .map(|(index, ((bone, link), transform))| {
                let parent = match link {
                    -1 => None,
                    link if link >= 0 && (link as usize) < count && link as usize != index => {
                        Some(link as usize)
                    }
                    link => return Err(Error::invariant(format!("bone {index} has parent {link}"))),
                };
                Ok(Bone {
                    name: ctx.string(bone.name)?,
                    parent,
                    transform,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Skeleton {
            root_bone_name: ctx.string(raw.root_bone_name)?,
            bones,
        })
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }
}
