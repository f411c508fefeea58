// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Little-endian containers that only carry textures.

use crate::context::{Context, ExcludeLoads};
use crate::drsm::TextureTable;
use crate::error::Result;
use crate::mxmd::{RawHeader, StreamedTextures};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxmdV2 {
    pub cached_textures: Option<TextureTable>,
    pub uncached_textures: Option<StreamedTextures>,
}

impl MxmdV2 {
    pub(crate) fn read(ctx: &Context<'_>, header: &RawHeader) -> Result<Self> {
        let cached_textures = match ctx.excludes(ExcludeLoads::LOW_TEXTURES) {
            true => None,
            false => ctx.follow(header.cached_textures)?,
        };
        let uncached_textures = match ctx.excludes(ExcludeLoads::TEXTURE_STREAMS) {
            true => None,
            false => match ctx.resolve(header.uncached_textures)? {
                Some(at) => Some(StreamedTextures::read(ctx, at, false)?),
                None => None,
            },
        };

        Ok(MxmdV2 {
            cached_textures,
            uncached_textures,
        })
    }
}
