// SPDX-FileCopyrightText: 2024 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{Error, Result};

pub(crate) fn read_bool_from<T: std::convert::From<u8> + std::cmp::PartialEq>(x: T) -> bool {
    x != T::from(0u8)
}

/// Reads a string terminated by \0 starting at `at`.
pub(crate) fn read_null_terminated(data: &[u8], at: usize) -> Result<String> {
    null_terminated_bytes(data, at).map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

/// The bytes at `at` up to, but not including, the next \0.
pub(crate) fn null_terminated_bytes(data: &[u8], at: usize) -> Result<&[u8]> {
    let tail = data.get(at..).ok_or(Error::CorruptOffset {
        offset: at as i64,
        size: 1,
        len: data.len(),
    })?;
    let end = tail.iter().position(|b| *b == 0).ok_or(Error::CorruptOffset {
        offset: at as i64,
        size: tail.len() + 1,
        len: data.len(),
    })?;
    Ok(&tail[..end])
}

/// Reads a fixed size, \0 padded name.
pub(crate) fn read_fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
