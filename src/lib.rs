// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

extern crate core;

/// Borrowed file contents.
pub type ByteSpan<'a> = &'a [u8];

/// Owned file contents.
pub type ByteBuffer = Vec<u8>;

/// Decode options, pointer resolution and the error type.
pub mod context;

/// Errors returned by every decoder.
pub mod error;

/// Offsets stored in files, and the ranges they resolve to.
pub mod pointer;

/// Swapping big-endian records to little-endian in place.
pub mod endian;

/// Recognizing formats and byte orders from their magic.
pub mod detect;

/// Reading data tables (BDAT).
pub mod bdat;

/// Reading compressed blocks (XBC1).
pub mod xbc1;

/// Reading archive headers (ARH).
pub mod arh;

/// Reading file archives (SAR1).
pub mod sar;

/// Reading streamed resource headers (DRSM).
pub mod drsm;

/// Reading models (MXMD).
pub mod mxmd;

/// Reading map models (MSMD).
pub mod msmd;

/// Reading terrain models (MSTM).
pub mod mstm;

/// Reading instanced prop models (MSIM).
pub mod msim;

/// Reading shaders (MTHS).
pub mod mths;

/// Reading textures (MTXT).
pub mod mtxt;

/// Reading textures (LBIM).
pub mod lbim;

/// Reading console textures (GX2).
pub mod gx2;

/// Reading skeletons, animations and state machines (BC).
pub mod bc;

/// One view over models, map meshes and skeletons.
#[cfg(feature = "visual_data")]
pub mod model;

mod common_file_operations;

#[cfg(test)]
mod test_util;

pub use context::{EndianMode, ExcludeLoads, ProcessOptions};
pub use error::{Error, Result};
