// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashSet;

use binrw::{binrw, Endian};
use tracing::{trace, warn};

use crate::bdat::{
    crypt, read_value, Cell, Column, ColumnKind, Row, Table, TableFlags, Value, ValueType,
    BDAT_MAGIC,
};
use crate::context::{Context, ProcessOptions};
use crate::error::{Error, Result};
use crate::pointer::{DataRange, Pointer, Pointer16};

/// Collections with more tables than this are really big-endian.
const BIG_ENDIAN_THRESHOLD: u32 = 0x10000;

/// Size of a column descriptor.
const COLUMN_DESC_SIZE: usize = 6;

#[binrw]
#[derive(Debug)]
pub(crate) struct CollectionHeader {
    pub num_tables: u32,
    pub file_size: u32,
}

#[binrw]
#[derive(Debug)]
pub(crate) struct TableHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub flags: u8,
    pub name: Pointer16<u8>,
    pub row_size: u16,
    pub hash_table: Pointer16<u8>,
    pub hash_slots: u16,
    pub rows: Pointer16<u8>,
    pub row_count: u16,
    pub unk3: u16,
    pub key_count: u16,
    pub keys: [u8; 2],
    pub strings: Pointer<u8>,
    pub strings_size: u32,
    pub columns: Pointer16<ColumnDesc>,
    pub column_count: u16,
}

#[binrw]
#[derive(Debug)]
pub(crate) struct ColumnDesc {
    pub type_desc: Pointer16<u8>,
    pub unk: Pointer16<u8>,
    pub name: Pointer16<u8>,
}

#[binrw]
#[derive(Debug)]
struct ScalarDesc {
    value_type: u8,
    offset: u16,
}

#[binrw]
#[derive(Debug)]
struct ArrayDesc {
    value_type: u8,
    offset: u16,
    count: u16,
}

#[binrw]
#[derive(Debug)]
struct FlagDesc {
    index: u8,
    reserved: u16,
    mask: u16,
    owner: Pointer16<ColumnDesc>,
}

/// Version 1 collections have no magic, so a table count that is absurd in little-endian means
/// big-endian.
pub(crate) fn looks_big_endian(bytes: &[u8]) -> bool {
    bytes
        .get(..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) > BIG_ENDIAN_THRESHOLD)
        .unwrap_or(false)
}

/// Decrypts every table in `buffer`, then decodes them.
pub(crate) fn read_collection(
    buffer: &mut [u8],
    endian: Endian,
    options: &ProcessOptions,
) -> Result<Vec<Table>> {
    let offsets = {
        let ctx = Context::new(buffer, endian, options.exclude);
        let header: CollectionHeader = ctx.read(0)?;
        let pointers = ctx.values_at::<Pointer<TableHeader>>(8, header.num_tables as usize)?;
        if header.file_size as usize != buffer.len() {
            warn!(header = header.file_size, actual = buffer.len(), "BDAT file size mismatch");
        }

        pointers
            .into_iter()
            .map(|pointer| {
                ctx.resolve(pointer)?
                    .ok_or_else(|| Error::invariant("null table offset"))
            })
            .collect::<Result<Vec<_>>>()?
    };

    // tables can be listed twice, they must only be decrypted once
    let mut decrypted = HashSet::new();
    for &at in &offsets {
        if decrypted.insert(at) {
            decrypt_table(buffer, endian, at)?;
        }
    }

    let ctx = Context::new(buffer, endian, options.exclude);
    offsets.into_iter().map(|at| read_table(&ctx, at)).collect()
}

fn read_header(ctx: &Context<'_>, at: usize) -> Result<TableHeader> {
    let header: TableHeader = ctx.read(at)?;
    if header.magic != BDAT_MAGIC {
        return Err(Error::header(&header.magic, &BDAT_MAGIC));
    }
    if header.key_count != 2 {
        return Err(Error::invariant(format!(
            "expected 2 encryption keys, found {}",
            header.key_count
        )));
    }
    Ok(header)
}

fn decrypt_table(buffer: &mut [u8], endian: Endian, at: usize) -> Result<()> {
    let (names, strings, keys) = {
        let ctx = Context::new(buffer, endian, Default::default()).rebase(at);
        let header = read_header(&ctx, at)?;

        let names = match (ctx.resolve(header.name)?, ctx.resolve(header.hash_table)?) {
            (Some(begin), Some(end)) if begin <= end => {
                Some(DataRange::new(begin, end - begin, ctx.len())?)
            }
            (Some(_), Some(_)) => return Err(Error::invariant("table names end before they begin")),
            _ => None,
        };
        let strings = match header.strings_size {
            0 => None,
            size => ctx.range(header.strings, size as usize)?,
        };
        (names, strings, header.keys)
    };

    for range in [names, strings].into_iter().flatten() {
        crypt::decrypt_section(keys, range.slice_mut(buffer));
    }

    Ok(())
}

fn read_table(ctx: &Context<'_>, at: usize) -> Result<Table> {
    let ctx = ctx.rebase(at);
    let header = read_header(&ctx, at)?;
    let flags = TableFlags::from_bits_truncate(header.flags);
    let name = ctx.string(header.name)?;
    trace!(name = %name, rows = header.row_count, "Reading BDAT table");

    let columns_at = ctx.resolve(header.columns)?;
    let descs = ctx.values(header.columns, header.column_count as usize)?;
    let columns = descs
        .iter()
        .map(|desc| read_column(&ctx, desc, columns_at.unwrap_or(0), descs.len()))
        .collect::<Result<Vec<_>>>()?;

    let row_size = header.row_size as usize;
    let rows = match ctx.resolve(header.rows)? {
        Some(rows_at) => {
            DataRange::new(rows_at, row_size * header.row_count as usize, ctx.len())?;
            (0..header.row_count as usize)
                .map(|row| read_row(&ctx, rows_at + row * row_size, &columns, flags))
                .collect::<Result<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    Ok(Table {
        offset: at,
        name: Some(name),
        flags,
        row_size,
        columns,
        rows,
        keys: Vec::new(),
    })
}

fn read_column(
    ctx: &Context<'_>,
    desc: &ColumnDesc,
    columns_at: usize,
    count: usize,
) -> Result<Column> {
    let name = ctx.string(desc.name)?;
    let Some(type_at) = ctx.resolve(desc.type_desc)? else {
        return Ok(Column {
            name,
            kind: ColumnKind::None,
        });
    };

    let kind = match ctx.read::<u8>(type_at)? {
        0 => ColumnKind::None,
        1 => {
            let scalar: ScalarDesc = ctx.read(type_at + 1)?;
            ColumnKind::Scalar {
                value_type: ValueType::from_raw(scalar.value_type)?,
                offset: scalar.offset as usize,
            }
        }
        2 => {
            let array: ArrayDesc = ctx.read(type_at + 1)?;
            ColumnKind::Array {
                value_type: ValueType::from_raw(array.value_type)?,
                offset: array.offset as usize,
                count: array.count as usize,
            }
        }
        3 => {
            let flag: FlagDesc = ctx.read(type_at + 1)?;
            if flag.reserved != 0 {
                return Err(Error::invariant(format!("flag column {name} has reserved bits set")));
            }
            let owner_at = ctx
                .resolve(flag.owner)?
                .ok_or_else(|| Error::invariant(format!("flag column {name} has no owner")))?;
            let owner = owner_at
                .checked_sub(columns_at)
                .filter(|delta| delta % COLUMN_DESC_SIZE == 0 && delta / COLUMN_DESC_SIZE < count)
                .ok_or_else(|| {
                    Error::invariant(format!("flag column {name} owner is not a column"))
                })?;
            ColumnKind::Flag {
                index: flag.index,
                mask: flag.mask as u32,
                owner: owner / COLUMN_DESC_SIZE,
            }
        }
        other => {
            return Err(Error::InvalidValue {
                what: "base type",
                value: other as u32,
            })
        }
    };

    Ok(Column { name, kind })
}

fn read_row(ctx: &Context<'_>, at: usize, columns: &[Column], flags: TableFlags) -> Result<Row> {
    let mut cells = Vec::with_capacity(columns.len());
    for column in columns {
        let cell = match column.kind {
            ColumnKind::None | ColumnKind::Flag { .. } => Cell::None,
            ColumnKind::Scalar { value_type, offset } => {
                Cell::Value(read_value(ctx, at + offset, value_type, ctx.base, flags)?)
            }
            ColumnKind::Array {
                value_type,
                offset,
                count,
            } => Cell::Array(
                (0..count)
                    .map(|i| {
                        let at = at + offset + i * value_type.size();
                        read_value(ctx, at, value_type, ctx.base, flags)
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        cells.push(cell);
    }

    // flags are bits of another column, resolve them once every value is known
    for (i, column) in columns.iter().enumerate() {
        if let ColumnKind::Flag { mask, owner, .. } = column.kind {
            let bits = match &cells[owner] {
                Cell::Value(
                    value @ (Value::U8(_)
                    | Value::U16(_)
                    | Value::U32(_)
                    | Value::I8(_)
                    | Value::I16(_)
                    | Value::I32(_)),
                ) => value.as_integer().unwrap_or_default() as u32,
                Cell::Value(_) => {
                    return Err(Error::invariant(format!(
                        "flag column {} owner is not an integer",
                        column.name
                    )))
                }
                _ => {
                    return Err(Error::invariant(format!(
                        "flag column {} owner is not a scalar",
                        column.name
                    )))
                }
            };
            cells[i] = Cell::Flag(bits & mask != 0);
        }
    }

    Ok(Row { cells })
}
