// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::Endian;
use bitflags::bitflags;
use tracing::debug;

use crate::context::{Context, EndianMode, ProcessOptions};
use crate::error::{Error, Result};
use crate::pointer::Pointer;
use crate::ByteBuffer;

/// Name and string section encryption.
pub mod crypt;

mod v1;
mod v4;

pub(crate) use v1::looks_big_endian;

/// Every BDAT table starts with this magic, in both byte orders.
pub const BDAT_MAGIC: [u8; 4] = *b"BDAT";

bitflags! {
    /// Flags stored in a version 1 table header.
    #[derive(Default)]
    pub struct TableFlags: u8 {
        /// Float columns use the obfuscated fixed point encoding.
        const ENCRYPT_FLOAT = 1 << 0;
        const PERSISTENT = 1 << 1;
    }
}

/// Layout generation of a table collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BdatVersion {
    /// Named columns with 16-bit offsets, either byte order.
    V1,
    /// Hashed rows with sequential columns, little-endian only.
    V4,
}

/// The type of a single column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValueType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    String,
    Float,
    HashRef,
    Percent,
    DebugString,
    Unknown12,
    MessageId,
}

impl ValueType {
    pub(crate) fn from_raw(value: u8) -> Result<Self> {
        Ok(match value {
            1 => ValueType::U8,
            2 => ValueType::U16,
            3 => ValueType::U32,
            4 => ValueType::I8,
            5 => ValueType::I16,
            6 => ValueType::I32,
            7 => ValueType::String,
            8 => ValueType::Float,
            9 => ValueType::HashRef,
            10 => ValueType::Percent,
            11 => ValueType::DebugString,
            12 => ValueType::Unknown12,
            13 => ValueType::MessageId,
            _ => {
                return Err(Error::InvalidValue {
                    what: "value type",
                    value: value as u32,
                })
            }
        })
    }

    /// Size of one value in bytes.
    pub fn size(self) -> usize {
        match self {
            ValueType::U8 | ValueType::I8 | ValueType::Percent | ValueType::Unknown12 => 1,
            ValueType::U16 | ValueType::I16 | ValueType::MessageId => 2,
            ValueType::U32
            | ValueType::I32
            | ValueType::String
            | ValueType::Float
            | ValueType::HashRef
            | ValueType::DebugString => 4,
        }
    }
}

/// A string stored in the table's string pool.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StringValue {
    /// Absolute offset of the string in the decoded buffer, `None` for a null reference.
    pub offset: Option<usize>,
    pub value: String,
}

/// Contains a single value, tagged with its type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    Float(f32),
    String(StringValue),
    /// Hash of another row's key.
    HashRef(u32),
    Percent(u8),
    DebugString(StringValue),
    Unknown12(u8),
    MessageId(u16),
}

impl Value {
    /// Returns a `Some(&str)` if this value was a string, otherwise `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(string) | Value::DebugString(string) => Some(&string.value),
            _ => None,
        }
    }

    /// Returns the value widened to 64 bits if it is an integer, otherwise `None`.
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Value::U8(v) | Value::Percent(v) | Value::Unknown12(v) => Some(v as i64),
            Value::U16(v) | Value::MessageId(v) => Some(v as i64),
            Value::U32(v) | Value::HashRef(v) => Some(v as i64),
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Returns a `Some(f32)` if this value was a float, otherwise `None`.
    pub fn as_f32(&self) -> Option<f32> {
        if let Value::Float(value) = self {
            return Some(*value);
        }
        None
    }
}

/// Where and how a column is stored inside each row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ColumnKind {
    /// Declared, but holds no data.
    None,
    Scalar {
        value_type: ValueType,
        /// Byte offset inside the row.
        offset: usize,
    },
    Array {
        value_type: ValueType,
        offset: usize,
        count: usize,
    },
    /// A single bit of another column.
    Flag {
        index: u8,
        mask: u32,
        /// Index of the column holding the bits.
        owner: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// A decoded cell; the variant follows the column kind.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Cell {
    None,
    Value(Value),
    Array(Vec<Value>),
    Flag(bool),
}

impl Cell {
    pub fn value(&self) -> Option<&Value> {
        if let Cell::Value(value) = self {
            return Some(value);
        }
        None
    }
}

/// A single row of a table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Row {
    /// One cell per column, in column order.
    pub cells: Vec<Cell>,
}

/// Key of a row in a hashed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RowKey {
    pub hash: u32,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Table {
    /// Absolute offset of the table header.
    pub offset: usize,
    /// Only version 1 tables carry a name.
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub flags: TableFlags,
    /// Size of one row in bytes.
    pub row_size: usize,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Only filled for version 4 tables.
    pub keys: Vec<RowKey>,
}

impl Table {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let column = self.column_index(column)?;
        self.rows.get(row)?.cells.get(column)
    }

    /// Finds the first row whose `column` holds `value`.
    pub fn find_row(&self, column: &str, value: &Value) -> Option<usize> {
        let column = self.column_index(column)?;
        self.rows
            .iter()
            .position(|row| matches!(row.cells.get(column), Some(Cell::Value(v)) if v == value))
    }

    /// Finds the first row whose string `column` equals `value`.
    pub fn find_row_by_str(&self, column: &str, value: &str) -> Option<usize> {
        let column = self.column_index(column)?;
        self.rows.iter().position(|row| {
            row.cells
                .get(column)
                .and_then(Cell::value)
                .and_then(Value::as_str)
                == Some(value)
        })
    }
}

/// A BDAT file: one or more tables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Collection {
    pub version: BdatVersion,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub endian: Endian,
    pub tables: Vec<Table>,
}

impl Collection {
    /// Decodes a table collection, decrypting its sections in `buffer`.
    pub fn from_existing(mut buffer: ByteBuffer, options: &ProcessOptions) -> Result<Collection> {
        if buffer.get(..4) == Some(&BDAT_MAGIC[..]) {
            let endian = options.byte_order("BDAT", Some(Endian::Little), &[Endian::Little])?;
            debug!(version = 4, ?endian, "Decoding BDAT");
            let tables = v4::read_collection(&Context::new(&buffer, endian, options.exclude))?;
            return Ok(Collection {
                version: BdatVersion::V4,
                endian,
                tables,
            });
        }

        let detected = match options.endian {
            EndianMode::AutoDetect => Some(if looks_big_endian(&buffer) {
                Endian::Big
            } else {
                Endian::Little
            }),
            _ => None,
        };
        let endian = options.byte_order("BDAT", detected, &[Endian::Big, Endian::Little])?;
        debug!(version = 1, ?endian, "Decoding BDAT");

        let tables = v1::read_collection(&mut buffer, endian, options)?;
        Ok(Collection {
            version: BdatVersion::V1,
            endian,
            tables,
        })
    }

    /// Finds a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|table| table.name.as_deref() == Some(name))
    }
}

/// Reads one value of `value_type` at `at`.
///
/// String offsets are resolved against `strings`.
pub(crate) fn read_value(
    ctx: &Context<'_>,
    at: usize,
    value_type: ValueType,
    strings: usize,
    flags: TableFlags,
) -> Result<Value> {
    let string = |raw: u32| -> Result<StringValue> {
        let pointer = Pointer::<u8>::new(raw);
        let ctx = ctx.rebase(strings);
        Ok(StringValue {
            offset: ctx.resolve(pointer)?,
            value: ctx.string(pointer)?,
        })
    };

    Ok(match value_type {
        ValueType::U8 => Value::U8(ctx.read(at)?),
        ValueType::U16 => Value::U16(ctx.read(at)?),
        ValueType::U32 => Value::U32(ctx.read(at)?),
        ValueType::I8 => Value::I8(ctx.read(at)?),
        ValueType::I16 => Value::I16(ctx.read(at)?),
        ValueType::I32 => Value::I32(ctx.read(at)?),
        ValueType::Float => {
            let raw: u32 = ctx.read(at)?;
            if flags.contains(TableFlags::ENCRYPT_FLOAT) {
                Value::Float(crypt::deobfuscate_float(raw))
            } else {
                Value::Float(f32::from_bits(raw))
            }
        }
        ValueType::String => Value::String(string(ctx.read(at)?)?),
        ValueType::HashRef => Value::HashRef(ctx.read(at)?),
        ValueType::Percent => Value::Percent(ctx.read(at)?),
        ValueType::DebugString => Value::DebugString(string(ctx.read(at)?)?),
        ValueType::Unknown12 => Value::Unknown12(ctx.read(at)?),
        ValueType::MessageId => Value::MessageId(ctx.read(at)?),
    })
}
