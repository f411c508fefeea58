// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::Endian;

/// Writes little or big-endian test files field by field.
pub(crate) struct Builder {
    pub data: Vec<u8>,
    pub endian: Endian,
}

impl Builder {
    pub fn new(endian: Endian) -> Self {
        Self {
            data: Vec::new(),
            endian,
        }
    }

    pub fn pos(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn zeros(&mut self, count: usize) -> &mut Self {
        self.data.resize(self.data.len() + count, 0);
        self
    }

    pub fn align(&mut self, alignment: usize) -> &mut Self {
        while self.data.len() % alignment != 0 {
            self.data.push(0);
        }
        self
    }

    pub fn cstr(&mut self, value: &str) -> &mut Self {
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self
    }

    fn ordered<const N: usize>(&mut self, le: [u8; N], be: [u8; N]) -> &mut Self {
        match self.endian {
            Endian::Little => self.data.extend_from_slice(&le),
            Endian::Big => self.data.extend_from_slice(&be),
        }
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.ordered(value.to_le_bytes(), value.to_be_bytes())
    }

    pub fn i16(&mut self, value: i16) -> &mut Self {
        self.ordered(value.to_le_bytes(), value.to_be_bytes())
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.ordered(value.to_le_bytes(), value.to_be_bytes())
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.ordered(value.to_le_bytes(), value.to_be_bytes())
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.ordered(value.to_le_bytes(), value.to_be_bytes())
    }

    pub fn f32(&mut self, value: f32) -> &mut Self {
        self.ordered(value.to_le_bytes(), value.to_be_bytes())
    }

    pub fn f32s(&mut self, values: &[f32]) -> &mut Self {
        for value in values {
            self.f32(*value);
        }
        self
    }

    pub fn u32s(&mut self, values: &[u32]) -> &mut Self {
        for value in values {
            self.u32(*value);
        }
        self
    }

    pub fn patch_u16(&mut self, at: usize, value: u16) -> &mut Self {
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        self.data[at..at + 2].copy_from_slice(&bytes);
        self
    }

    pub fn patch_u32(&mut self, at: usize, value: u32) -> &mut Self {
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        self.data[at..at + 4].copy_from_slice(&bytes);
        self
    }

    pub fn patch_u64(&mut self, at: usize, value: u64) -> &mut Self {
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        self.data[at..at + 8].copy_from_slice(&bytes);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}
