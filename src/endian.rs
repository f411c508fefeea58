// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Error, Result};

/// Reverses the byte order of a value in place.
///
/// Aggregates swap their fields in declaration order, which must be the on-disk order.
pub trait SwapBytes {
    fn swap_bytes(&mut self);
}

macro_rules! swap_integer {
    ($($t:ty),*) => {
        $(impl SwapBytes for $t {
            fn swap_bytes(&mut self) {
                *self = <$t>::swap_bytes(*self);
            }
        })*
    };
}

swap_integer!(u8, i8, u16, i16, u32, i32, u64, i64);

impl SwapBytes for f32 {
    fn swap_bytes(&mut self) {
        *self = f32::from_bits(self.to_bits().swap_bytes());
    }
}

impl SwapBytes for f64 {
    fn swap_bytes(&mut self) {
        *self = f64::from_bits(self.to_bits().swap_bytes());
    }
}

impl<T: SwapBytes, const N: usize> SwapBytes for [T; N] {
    fn swap_bytes(&mut self) {
        for item in self.iter_mut() {
            item.swap_bytes();
        }
    }
}

impl<T: SwapBytes> SwapBytes for [T] {
    fn swap_bytes(&mut self) {
        for item in self.iter_mut() {
            item.swap_bytes();
        }
    }
}

/// Swaps every `width` byte word of `bytes`. Trailing bytes that do not form a full word are left
/// alone.
pub fn swap_words(bytes: &mut [u8], width: usize) {
    if width < 2 {
        return;
    }
    for word in bytes.chunks_exact_mut(width) {
        word.reverse();
    }
}

/// Layout of one attribute inside an interleaved buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lanes {
    /// Byte offset of the attribute inside each element.
    pub offset: usize,
    /// Width of a single scalar.
    pub width: usize,
    /// Number of scalars.
    pub count: usize,
}

/// Swaps one attribute of every element in an interleaved buffer.
pub fn swap_strided(bytes: &mut [u8], stride: usize, elements: usize, lanes: Lanes) -> Result<()> {
    let span = lanes.width * lanes.count;
    if span == 0 {
        return Ok(());
    }
    if lanes.offset + span > stride {
        return Err(Error::invariant(format!(
            "attribute at {} with {} bytes does not fit a stride of {}",
            lanes.offset, span, stride
        )));
    }

    let needed = stride
        .checked_mul(elements)
        .ok_or_else(|| Error::invariant("interleaved buffer size overflows"))?;
    if needed > bytes.len() {
        return Err(Error::CorruptOffset {
            offset: 0,
            size: needed,
            len: bytes.len(),
        });
    }

    for element in bytes[..needed].chunks_exact_mut(stride) {
        swap_words(&mut element[lanes.offset..lanes.offset + span], lanes.width);
    }

    Ok(())
}
