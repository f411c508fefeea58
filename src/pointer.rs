// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::io::{Read, Seek, Write};
use std::marker::PhantomData;

use binrw::{BinRead, BinResult, BinWrite, Endian};

use crate::error::{Error, Result};

/// Raw integer types an offset can be stored as.
pub trait OffsetValue:
    Copy
    + Default
    + fmt::Debug
    + PartialEq
    + for<'a> BinRead<Args<'a> = ()>
    + for<'a> BinWrite<Args<'a> = ()>
{
    /// The signed byte delta this value encodes.
    fn delta(self) -> i64;
}

macro_rules! offset_value {
    ($($t:ty),*) => {
        $(impl OffsetValue for $t {
            fn delta(self) -> i64 {
                self as i64
            }
        })*
    };
}

offset_value!(i16, u16, i32, u32, u64);

/// An offset stored inside a record, pointing at a `T` relative to some base.
///
/// A raw value of zero means the target is absent.
pub struct Pointer<T, V = u32> {
    raw: V,
    _marker: PhantomData<fn() -> T>,
}

/// 16-bit offsets used by the older table formats.
pub type Pointer16<T> = Pointer<T, i16>;

/// 64-bit offsets used by the relocatable containers.
pub type Pointer64<T> = Pointer<T, u64>;

impl<T, V: OffsetValue> Pointer<T, V> {
    pub fn new(raw: V) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn null() -> Self {
        Self::new(V::default())
    }

    pub fn raw(&self) -> V {
        self.raw
    }

    pub fn is_null(&self) -> bool {
        self.raw.delta() == 0
    }

    /// Resolves this offset against `base` inside a buffer of `len` bytes.
    pub fn fixup(&self, base: usize, len: usize) -> Result<Option<usize>> {
        if self.is_null() {
            return Ok(None);
        }

        let target = base as i64 + self.raw.delta();
        if target < 0 || target as u64 >= len as u64 {
            return Err(Error::CorruptOffset {
                offset: target,
                size: 1,
                len,
            });
        }

        Ok(Some(target as usize))
    }

    /// Resolves this offset to a run of `size` bytes. An empty run may start at the end of the
    /// buffer.
    pub fn fixup_span(&self, base: usize, len: usize, size: usize) -> Result<Option<usize>> {
        if size != 0 {
            return match self.fixup(base, len)? {
                Some(at) => DataRange::new(at, size, len).map(|_| Some(at)),
                None => Ok(None),
            };
        }
        if self.is_null() {
            return Ok(None);
        }

        let target = base as i64 + self.raw.delta();
        if target < 0 || target as u64 > len as u64 {
            return Err(Error::CorruptOffset {
                offset: target,
                size: 0,
                len,
            });
        }
        Ok(Some(target as usize))
    }

    /// Resolves this offset against the address it was stored at.
    pub fn fixup_relative(&self, anchor: usize, len: usize) -> Result<Option<usize>> {
        self.fixup(anchor, len)
    }

    /// Reinterprets the target type, keeping the raw value.
    pub fn cast<U>(&self) -> Pointer<U, V> {
        Pointer::new(self.raw)
    }
}

impl<T, V: OffsetValue> Clone for Pointer<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V: OffsetValue> Copy for Pointer<T, V> {}

impl<T, V: OffsetValue> Default for Pointer<T, V> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T, V: OffsetValue> PartialEq for Pointer<T, V> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T, V: OffsetValue> fmt::Debug for Pointer<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({:?})", self.raw)
    }
}

impl<T, V: OffsetValue> BinRead for Pointer<T, V> {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        V::read_options(reader, endian, ()).map(Self::new)
    }
}

impl<T, V: OffsetValue> BinWrite for Pointer<T, V> {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        self.raw.write_options(writer, endian, ())
    }
}

/// A run of records stored as offset, then count.
pub struct Array<T, V = u32> {
    pub items: Pointer<T, V>,
    pub count: u32,
}

/// A run of records stored as count, then offset.
pub struct CountedArray<T> {
    pub count: u32,
    pub items: Pointer<T>,
}

macro_rules! array_impls {
    ($name:ident < $t:ident $(, $v:ident)? >, $($field:ident),*) => {
        impl<$t $(, $v: OffsetValue)?> $name<$t $(, $v)?> {
            pub fn pointer(&self) -> Pointer<$t $(, $v)?> {
                self.items
            }

            pub fn len(&self) -> usize {
                self.count as usize
            }

            pub fn is_empty(&self) -> bool {
                self.count == 0 || self.items.is_null()
            }
        }

        impl<$t $(, $v: OffsetValue)?> Clone for $name<$t $(, $v)?> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<$t $(, $v: OffsetValue)?> Copy for $name<$t $(, $v)?> {}

        impl<$t $(, $v: OffsetValue)?> Default for $name<$t $(, $v)?> {
            fn default() -> Self {
                Self {
                    items: Pointer::null(),
                    count: 0,
                }
            }
        }

        impl<$t $(, $v: OffsetValue)?> fmt::Debug for $name<$t $(, $v)?> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("items", &self.items)
                    .field("count", &self.count)
                    .finish()
            }
        }

        impl<$t $(, $v: OffsetValue)?> BinRead for $name<$t $(, $v)?> {
            type Args<'a> = ();

            fn read_options<R: Read + Seek>(
                reader: &mut R,
                endian: Endian,
                _: Self::Args<'_>,
            ) -> BinResult<Self> {
                $(let $field = BinRead::read_options(reader, endian, ())?;)*
                Ok(Self { $($field),* })
            }
        }

        impl<$t $(, $v: OffsetValue)?> BinWrite for $name<$t $(, $v)?> {
            type Args<'a> = ();

            fn write_options<W: Write + Seek>(
                &self,
                writer: &mut W,
                endian: Endian,
                _: Self::Args<'_>,
            ) -> BinResult<()> {
                $(self.$field.write_options(writer, endian, ())?;)*
                Ok(())
            }
        }
    };
}

array_impls!(Array<T, V>, items, count);
array_impls!(CountedArray<T>, count, items);

/// A validated span of a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataRange {
    offset: usize,
    len: usize,
}

impl DataRange {
    /// Checks that `offset..offset + len` lies inside a buffer of `buffer_len` bytes.
    pub fn new(offset: usize, len: usize, buffer_len: usize) -> Result<Self> {
        match offset.checked_add(len) {
            Some(end) if end <= buffer_len => Ok(Self { offset, len }),
            _ => Err(Error::CorruptOffset {
                offset: offset as i64,
                size: len,
                len: buffer_len,
            }),
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    /// The bytes of this range, or an empty slice if `data` is not the buffer it was validated
    /// against.
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        data.get(self.offset..self.end()).unwrap_or_default()
    }

    pub(crate) fn slice_mut<'a>(&self, data: &'a mut [u8]) -> &'a mut [u8] {
        data.get_mut(self.offset..self.end()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn null_is_absent() {
        let pointer: Pointer<u32> = Pointer::new(0);
        assert!(pointer.is_null());
        assert_eq!(pointer.fixup(16, 32).unwrap(), None);
    }

    #[test]
    fn fixup_against_base() {
        let pointer: Pointer<u32> = Pointer::new(8);
        assert_eq!(pointer.fixup(16, 32).unwrap(), Some(24));
        assert!(matches!(
            pointer.fixup(24, 32),
            Err(Error::CorruptOffset { offset: 32, .. })
        ));
    }

    #[test]
    fn empty_span_may_end_the_buffer() {
        let pointer: Pointer<u32> = Pointer::new(32);
        assert!(pointer.fixup(0, 32).is_err());
        assert_eq!(pointer.fixup_span(0, 32, 0).unwrap(), Some(32));
        assert!(pointer.fixup_span(0, 32, 4).is_err());
        assert!(pointer.fixup_span(4, 32, 0).is_err());
        assert_eq!(Pointer::<u32>::new(28).fixup_span(0, 32, 4).unwrap(), Some(28));
    }

    #[test]
    fn negative_short_offset() {
        let pointer: Pointer16<u8> = Pointer::new(-4);
        assert_eq!(pointer.fixup(10, 32).unwrap(), Some(6));
        assert!(pointer.fixup(2, 32).is_err());
    }

    #[test]
    fn read_array_both_orders() {
        let bytes = [0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x02];
        let array = Array::<u16>::read_options(&mut Cursor::new(&bytes), Endian::Big, ()).unwrap();
        assert_eq!(array.pointer().raw(), 0x10);
        assert_eq!(array.len(), 2);

        let counted =
            CountedArray::<u16>::read_options(&mut Cursor::new(&bytes), Endian::Big, ()).unwrap();
        assert_eq!(counted.len(), 0x10);
        assert_eq!(counted.pointer().raw(), 2);
    }

    #[test]
    fn write_pointer_keeps_raw_value() {
        let pointer: Pointer16<u8> = Pointer::new(0x1234);
        let mut cursor = Cursor::new(Vec::new());
        pointer.write_options(&mut cursor, Endian::Big, ()).unwrap();
        assert_eq!(cursor.into_inner(), [0x12, 0x34]);
    }

    #[test]
    fn data_range_bounds() {
        assert!(DataRange::new(4, 4, 8).is_ok());
        assert!(DataRange::new(4, 5, 8).is_err());
        assert!(DataRange::new(usize::MAX, 2, 8).is_err());
        let range = DataRange::new(2, 2, 8).unwrap();
        assert_eq!(range.slice(&[0, 1, 2, 3, 4, 5, 6, 7]), &[2, 3]);
    }
}
