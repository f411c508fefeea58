// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::Endian;

use crate::bdat::{looks_big_endian, BDAT_MAGIC};
use crate::error::{Error, Magic, Result};

/// The same magic as written by a big and a little-endian toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicPair {
    pub big: [u8; 4],
    pub little: [u8; 4],
}

impl MagicPair {
    /// Compares the first four bytes of `bytes` against both constants.
    pub fn detect(&self, bytes: &[u8]) -> Result<Endian> {
        self.matches(bytes)
            .ok_or_else(|| Error::header(bytes.get(..4).unwrap_or(bytes), &self.little))
    }

    pub fn matches(&self, bytes: &[u8]) -> Option<Endian> {
        let magic = bytes.get(..4)?;
        if magic == self.big {
            Some(Endian::Big)
        } else if magic == self.little {
            Some(Endian::Little)
        } else {
            None
        }
    }
}

/// Checks that `bytes` starts with `magic`.
pub(crate) fn expect_magic(bytes: &[u8], magic: &[u8; 4]) -> Result<()> {
    match bytes.get(..4) {
        Some(found) if found == magic => Ok(()),
        found => Err(Error::header(found.unwrap_or(bytes), magic)),
    }
}

/// Checks that `bytes` ends with `magic`, for formats with a footer.
pub(crate) fn expect_footer_magic(bytes: &[u8], magic: &[u8; 4]) -> Result<()> {
    let found = bytes.len().checked_sub(4).map(|at| &bytes[at..]).unwrap_or(bytes);
    if found == magic {
        Ok(())
    } else {
        Err(Error::header(found, magic))
    }
}

/// Every format that can be told apart by its bytes alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Model container.
    Mxmd(Endian),
    /// Map container.
    Msmd(Endian),
    Sar(Endian),
    /// Model resource streams.
    Drsm,
    /// Shader, big-endian.
    Mths,
    /// Compressed block.
    Xbc1,
    /// Archive index.
    Arh,
    /// Relocatable 64-bit container.
    Bc,
    BdatV4,
    BdatV1(Endian),
    /// Texture with a little-endian footer.
    Lbim,
    /// Texture with a big-endian footer.
    Mtxt,
}

impl FileKind {
    /// Byte order the file is stored in.
    pub fn endian(self) -> Endian {
        match self {
            FileKind::Mxmd(endian)
            | FileKind::Msmd(endian)
            | FileKind::Sar(endian)
            | FileKind::BdatV1(endian) => endian,
            FileKind::Mths | FileKind::Mtxt => Endian::Big,
            FileKind::Drsm
            | FileKind::Xbc1
            | FileKind::Arh
            | FileKind::Bc
            | FileKind::BdatV4
            | FileKind::Lbim => Endian::Little,
        }
    }
}

const PAIRED: [(MagicPair, fn(Endian) -> FileKind); 3] = [
    (crate::mxmd::MXMD_MAGIC, FileKind::Mxmd),
    (crate::msmd::MSMD_MAGIC, FileKind::Msmd),
    (crate::sar::SAR_MAGIC, FileKind::Sar),
];

const SINGLE: [([u8; 4], FileKind); 6] = [
    (crate::drsm::DRSM_MAGIC, FileKind::Drsm),
    (crate::mths::MTHS_MAGIC, FileKind::Mths),
    (crate::xbc1::XBC1_MAGIC, FileKind::Xbc1),
    (crate::arh::ARH_MAGIC, FileKind::Arh),
    (crate::bc::BC_MAGIC, FileKind::Bc),
    (BDAT_MAGIC, FileKind::BdatV4),
];

const FOOTERS: [([u8; 4], FileKind); 2] = [
    (crate::lbim::LBIM_MAGIC, FileKind::Lbim),
    (crate::mtxt::MTXT_MAGIC, FileKind::Mtxt),
];

/// Classifies a buffer by its magic, falling back to the table heuristic for files that have none.
pub fn identify(bytes: &[u8]) -> Result<FileKind> {
    for (pair, kind) in PAIRED {
        if let Some(endian) = pair.matches(bytes) {
            return Ok(kind(endian));
        }
    }

    let magic = bytes.get(..4);
    for (expected, kind) in SINGLE {
        if magic == Some(&expected[..]) {
            return Ok(kind);
        }
    }

    if let Some(footer) = bytes.len().checked_sub(4).map(|at| &bytes[at..]) {
        for (expected, kind) in FOOTERS {
            if footer == expected {
                return Ok(kind);
            }
        }
    }

    if let Some(endian) = bdat_v1_endian(bytes) {
        return Ok(FileKind::BdatV1(endian));
    }

    Err(Error::InvalidHeader {
        found: Magic::from_slice(magic.unwrap_or(bytes)),
        expected: Magic(crate::mxmd::MXMD_MAGIC.little),
    })
}

/// Version 1 tables have no file magic. Pick the order by table count, then look for a table there.
fn bdat_v1_endian(bytes: &[u8]) -> Option<Endian> {
    let endian = if looks_big_endian(bytes) {
        Endian::Big
    } else {
        Endian::Little
    };

    let read = |at: usize| -> Option<u32> {
        let word: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
        Some(match endian {
            Endian::Big => u32::from_be_bytes(word),
            Endian::Little => u32::from_le_bytes(word),
        })
    };

    if read(0)? == 0 {
        return None;
    }
    let table = read(8)? as usize;
    (table != 0 && bytes.get(table..table.checked_add(4)?)? == BDAT_MAGIC).then_some(endian)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_magics() {
        let mut file = b"MXMD\0\0\x27\x38".to_vec();
        assert_eq!(identify(&file).unwrap(), FileKind::Mxmd(Endian::Big));
        file[..4].copy_from_slice(b"DMXM");
        assert_eq!(identify(&file).unwrap(), FileKind::Mxmd(Endian::Little));
        assert_eq!(identify(b"1RAS\0\0\0\0").unwrap(), FileKind::Sar(Endian::Little));
        assert_eq!(identify(b"MSMD\0\0\0\0").unwrap().endian(), Endian::Big);
    }

    #[test]
    fn footers() {
        let mut file = vec![0u8; 64];
        file[60..].copy_from_slice(b"LBIM");
        assert_eq!(identify(&file).unwrap(), FileKind::Lbim);
        file[60..].copy_from_slice(b"MTXT");
        assert_eq!(identify(&file).unwrap(), FileKind::Mtxt);
    }

    #[test]
    fn table_heuristic() {
        let mut file = vec![0u8, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 12];
        file.extend_from_slice(b"BDAT");
        assert_eq!(identify(&file).unwrap(), FileKind::BdatV1(Endian::Big));

        let mut file = vec![1u8, 0, 0, 0, 0, 0, 0, 0, 12, 0, 0, 0];
        file.extend_from_slice(b"BDAT");
        assert_eq!(identify(&file).unwrap(), FileKind::BdatV1(Endian::Little));
    }

    #[test]
    fn unknown() {
        assert!(matches!(identify(b"ABCDEFGH"), Err(Error::InvalidHeader { .. })));
        assert!(matches!(identify(b"AB"), Err(Error::InvalidHeader { .. })));
        assert!(matches!(
            crate::mxmd::MXMD_MAGIC.detect(b"XXXX"),
            Err(Error::InvalidHeader { .. })
        ));
    }
}
