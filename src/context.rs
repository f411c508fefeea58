// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::Cursor;

use binrw::{BinRead, Endian};
use bitflags::bitflags;
use tracing::trace;

use crate::common_file_operations::read_null_terminated;
use crate::error::{Error, Result};
use crate::pointer::{DataRange, OffsetValue, Pointer};

bitflags! {
    /// Optional parts of a file that are not decoded when set.
    #[derive(Default)]
    pub struct ExcludeLoads: u32 {
        /// Models, and the vertex streams that belong to them.
        const MODEL = 1 << 0;
        const MATERIALS = 1 << 1;
        /// Cached, low resolution textures.
        const LOW_TEXTURES = 1 << 2;
        /// Streamed texture tables.
        const TEXTURE_STREAMS = 1 << 3;
        const SHADERS = 1 << 4;
    }
}

/// How the byte order of a file is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndianMode {
    /// Use whatever the header says.
    #[default]
    AutoDetect,
    /// Require big-endian data.
    Big,
    /// Require little-endian data.
    Little,
}

/// Options shared by every decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessOptions {
    pub endian: EndianMode,
    pub exclude: ExcludeLoads,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endian(mut self, endian: EndianMode) -> Self {
        self.endian = endian;
        self
    }

    pub fn excluding(mut self, exclude: ExcludeLoads) -> Self {
        self.exclude |= exclude;
        self
    }

    /// Settles the byte order of a file once, before any traversal.
    ///
    /// `detected` is what the header says, `supported` the orders the format can be decoded in.
    pub fn byte_order(
        &self,
        format: &'static str,
        detected: Option<Endian>,
        supported: &[Endian],
    ) -> Result<Endian> {
        let forced = match self.endian {
            EndianMode::AutoDetect => None,
            EndianMode::Big => Some(Endian::Big),
            EndianMode::Little => Some(Endian::Little),
        };

        let endian = match (forced, detected) {
            (Some(forced), Some(detected)) if forced != detected => {
                return Err(Error::InvalidOptions(format!(
                    "{format} is {detected:?} endian but {forced:?} endian was requested"
                )));
            }
            (Some(endian), _) | (None, Some(endian)) => endian,
            (None, None) => match supported {
                [only] => *only,
                _ => {
                    return Err(Error::InvalidOptions(format!(
                        "the byte order of {format} cannot be detected"
                    )));
                }
            },
        };

        if !supported.contains(&endian) {
            return Err(Error::UnsupportedByteOrder { format, endian });
        }

        Ok(endian)
    }
}

/// Shorthand for binrw records read with no arguments.
pub(crate) trait RawRead: for<'a> BinRead<Args<'a> = ()> {}

impl<T> RawRead for T where T: for<'a> BinRead<Args<'a> = ()> {}

/// A structure built from its raw record and whatever the record points at.
pub(crate) trait Decode: Sized {
    type Raw: RawRead;

    fn decode(raw: Self::Raw, at: usize, ctx: &Context<'_>) -> Result<Self>;
}

/// State threaded through one decode.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Context<'a> {
    data: &'a [u8],
    pub endian: Endian,
    /// Offsets are resolved relative to this address.
    pub base: usize,
    pub exclude: ExcludeLoads,
}

impl<'a> Context<'a> {
    pub fn new(data: &'a [u8], endian: Endian, exclude: ExcludeLoads) -> Self {
        Self {
            data,
            endian,
            base: 0,
            exclude,
        }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn rebase(mut self, base: usize) -> Self {
        self.base = base;
        self
    }

    pub fn excludes(&self, part: ExcludeLoads) -> bool {
        self.exclude.contains(part)
    }

    pub fn resolve<T, V: OffsetValue>(&self, pointer: Pointer<T, V>) -> Result<Option<usize>> {
        pointer.fixup(self.base, self.data.len())
    }

    /// Reads one record at an absolute offset.
    pub fn read<T: RawRead>(&self, at: usize) -> Result<T> {
        if at >= self.data.len() {
            return Err(Error::CorruptOffset {
                offset: at as i64,
                size: 1,
                len: self.data.len(),
            });
        }
        let mut cursor = Cursor::new(self.data);
        cursor.set_position(at as u64);
        T::read_options(&mut cursor, self.endian, ())
            .map_err(|e| Error::from_read(e, at, self.data.len()))
    }

    /// Reads `count` records starting at `at`, returning them with the record size.
    fn records<T: RawRead>(&self, at: usize, count: usize) -> Result<(Vec<T>, usize)> {
        if count == 0 {
            return Ok((Vec::new(), 0));
        }

        let len = self.data.len();
        let mut cursor = Cursor::new(self.data);
        cursor.set_position(at as u64);
        let first = T::read_options(&mut cursor, self.endian, ())
            .map_err(|e| Error::from_read(e, at, len))?;
        let stride = cursor.position() as usize - at;

        // the whole run has to fit before anything is allocated for it
        let size = stride.checked_mul(count).ok_or(Error::CorruptOffset {
            offset: at as i64,
            size: usize::MAX,
            len,
        })?;
        DataRange::new(at, size, len)?;

        let mut items = Vec::with_capacity(count);
        items.push(first);
        for _ in 1..count {
            let item = T::read_options(&mut cursor, self.endian, ())
                .map_err(|e| Error::from_read(e, at, len))?;
            items.push(item);
        }

        Ok((items, stride))
    }

    /// Reads the records an array points at. An absent array is empty.
    pub fn values<T: RawRead, V: OffsetValue>(
        &self,
        pointer: Pointer<T, V>,
        count: usize,
    ) -> Result<Vec<T>> {
        if count == 0 {
            pointer.fixup_span(self.base, self.data.len(), 0)?;
            return Ok(Vec::new());
        }
        match self.resolve(pointer)? {
            Some(at) => Ok(self.records(at, count)?.0),
            None => Ok(Vec::new()),
        }
    }

    pub fn values_at<T: RawRead>(&self, at: usize, count: usize) -> Result<Vec<T>> {
        Ok(self.records(at, count)?.0)
    }

    pub fn decode_at<T: Decode>(&self, at: usize) -> Result<T> {
        let raw = self.read::<T::Raw>(at)?;
        trace!(at, kind = std::any::type_name::<T>(), "decoding");
        T::decode(raw, at, self)
    }

    pub fn follow<T: Decode, V: OffsetValue>(&self, pointer: Pointer<T, V>) -> Result<Option<T>> {
        match self.resolve(pointer)? {
            Some(at) => self.decode_at(at).map(Some),
            None => Ok(None),
        }
    }

    pub fn decode_array_at<T: Decode>(&self, at: usize, count: usize) -> Result<Vec<T>> {
        let (raws, stride) = self.records::<T::Raw>(at, count)?;
        raws.into_iter()
            .enumerate()
            .map(|(i, raw)| T::decode(raw, at + i * stride, self))
            .collect()
    }

    pub fn decode_array<T: Decode, V: OffsetValue>(
        &self,
        pointer: Pointer<T, V>,
        count: usize,
    ) -> Result<Vec<T>> {
        if count == 0 {
            pointer.fixup_span(self.base, self.data.len(), 0)?;
            return Ok(Vec::new());
        }
        match self.resolve(pointer)? {
            Some(at) => self.decode_array_at(at, count),
            None => Ok(Vec::new()),
        }
    }

    /// Validates a run of `len` bytes at the pointer's target.
    pub fn range<T, V: OffsetValue>(
        &self,
        pointer: Pointer<T, V>,
        len: usize,
    ) -> Result<Option<DataRange>> {
        match pointer.fixup_span(self.base, self.data.len(), len)? {
            Some(at) => DataRange::new(at, len, self.data.len()).map(Some),
            None => Ok(None),
        }
    }

    /// Reads the null-terminated string a pointer targets. An absent string is empty.
    pub fn string<T, V: OffsetValue>(&self, pointer: Pointer<T, V>) -> Result<String> {
        match self.resolve(pointer)? {
            Some(at) => self.string_at(at),
            None => Ok(String::new()),
        }
    }

    pub fn string_at(&self, at: usize) -> Result<String> {
        read_null_terminated(self.data, at)
    }
}

#[cfg(test)]
mod tests {
    use binrw::binread;

    use super::*;

    #[binread]
    #[derive(Debug)]
    struct Pair {
        a: u16,
        b: u16,
    }

    #[test]
    fn forced_order_conflict() {
        let options = ProcessOptions::new().with_endian(EndianMode::Little);
        assert!(matches!(
            options.byte_order("MXMD", Some(Endian::Big), &[Endian::Big, Endian::Little]),
            Err(Error::InvalidOptions(_))
        ));
        assert_eq!(
            options
                .byte_order("MXMD", Some(Endian::Little), &[Endian::Big, Endian::Little])
                .unwrap(),
            Endian::Little
        );
    }

    #[test]
    fn unsupported_order() {
        let options = ProcessOptions::new().with_endian(EndianMode::Little);
        assert!(matches!(
            options.byte_order("MTHS", None, &[Endian::Big]),
            Err(Error::UnsupportedByteOrder { format: "MTHS", .. })
        ));
        assert_eq!(
            ProcessOptions::new().byte_order("MTHS", None, &[Endian::Big]).unwrap(),
            Endian::Big
        );
    }

    #[test]
    fn exclusions_accumulate() {
        let options = ProcessOptions::new()
            .excluding(ExcludeLoads::SHADERS)
            .excluding(ExcludeLoads::MATERIALS);
        assert!(options.exclude.contains(ExcludeLoads::SHADERS | ExcludeLoads::MATERIALS));
        assert!(!options.exclude.contains(ExcludeLoads::MODEL));
    }

    #[test]
    fn array_must_fit() {
        let data = [0u8, 1, 0, 2, 0, 3, 0, 4, 8];
        let ctx = Context::new(&data, Endian::Big, ExcludeLoads::empty());

        let pairs = ctx.values::<Pair, u32>(Pointer::new(1), 2).unwrap();
        assert_eq!(pairs[1].a, 0x0300);

        assert!(matches!(
            ctx.values::<Pair, u32>(Pointer::new(1), 3),
            Err(Error::CorruptOffset { .. })
        ));
        assert!(ctx.values::<Pair, u32>(Pointer::new(0), 100).unwrap().is_empty());
    }

    #[test]
    fn empty_array_at_end_of_buffer() {
        let data = [0u8; 8];
        let ctx = Context::new(&data, Endian::Little, ExcludeLoads::empty());

        assert!(ctx.values::<Pair, u32>(Pointer::new(8), 0).unwrap().is_empty());
        assert_eq!(ctx.range::<u8, u32>(Pointer::new(8), 0).unwrap().map(|r| r.offset()), Some(8));
        assert!(ctx.values::<Pair, u32>(Pointer::new(8), 1).is_err());
        assert!(ctx.values::<Pair, u32>(Pointer::new(9), 0).is_err());
    }

    #[test]
    fn rebase_moves_targets() {
        let data = [0u8; 16];
        let ctx = Context::new(&data, Endian::Little, ExcludeLoads::empty()).rebase(8);
        assert_eq!(ctx.resolve(Pointer::<u8>::new(4)).unwrap(), Some(12));
        assert!(ctx.resolve(Pointer::<u8>::new(8)).is_err());
    }
}
