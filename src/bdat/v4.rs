// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::binrw;
use tracing::{trace, warn};

use crate::bdat::{
    read_value, Cell, Column, ColumnKind, Row, RowKey, Table, TableFlags, ValueType, BDAT_MAGIC,
};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pointer::{DataRange, Pointer};

const VERSION: u8 = 4;

#[binrw]
#[derive(Debug)]
struct HeaderBase {
    magic: [u8; 4],
    version: u8,
    header_size: u8,
    null: u8,
    /// 0 for a lone table, 1 for a collection.
    kind: u8,
}

#[binrw]
#[derive(Debug)]
struct CollectionHeader {
    base: HeaderBase,
    num_tables: u32,
    file_size: u32,
}

#[binrw]
#[derive(Debug)]
struct TableHeader {
    base: HeaderBase,
    num_columns: u32,
    num_rows: u32,
    unk3: u32,
    self_hash: u32,
    columns: Pointer<ColumnDesc>,
    keys: Pointer<Key>,
    rows: Pointer<u8>,
    row_size: u32,
    strings: Pointer<u8>,
    strings_size: u32,
}

#[binrw]
#[derive(Debug)]
struct ColumnDesc {
    value_type: u8,
    name: [u8; 2],
}

impl ColumnDesc {
    /// The name offset is stored unaligned, low byte first.
    fn name_offset(&self) -> u32 {
        u16::from_le_bytes(self.name) as u32
    }
}

#[binrw]
#[derive(Debug)]
struct Key {
    hash: u32,
    index: u32,
}

fn check_base(base: &HeaderBase) -> Result<()> {
    if base.magic != BDAT_MAGIC {
        return Err(Error::header(&base.magic, &BDAT_MAGIC));
    }
    if base.version != VERSION {
        return Err(Error::InvalidVersion {
            version: base.version as u32,
        });
    }
    Ok(())
}

/// Reads a collection, or a file holding a single table.
pub(crate) fn read_collection(ctx: &Context<'_>) -> Result<Vec<Table>> {
    let base: HeaderBase = ctx.read(0)?;
    check_base(&base)?;

    match base.kind {
        0 => Ok(vec![read_table(ctx, 0)?]),
        1 => {
            let header: CollectionHeader = ctx.read(0)?;
            if header.file_size as usize != ctx.len() {
                warn!(header = header.file_size, actual = ctx.len(), "BDAT file size mismatch");
            }
            let pointers = ctx.values_at::<Pointer<TableHeader>>(16, header.num_tables as usize)?;
            pointers
                .into_iter()
                .map(|pointer| {
                    let at = ctx
                        .resolve(pointer)?
                        .ok_or_else(|| Error::invariant("null table offset"))?;
                    read_table(ctx, at)
                })
                .collect()
        }
        kind => Err(Error::InvalidValue {
            what: "BDAT file kind",
            value: kind as u32,
        }),
    }
}

fn read_table(ctx: &Context<'_>, at: usize) -> Result<Table> {
    let ctx = ctx.rebase(at);
    let header: TableHeader = ctx.read(at)?;
    check_base(&header.base)?;
    trace!(at, rows = header.num_rows, columns = header.num_columns, "Reading BDAT table");

    let strings_at = ctx
        .range(header.strings, header.strings_size as usize)?
        .map(|range| range.offset())
        .unwrap_or(at);
    let strings = ctx.rebase(strings_at);

    let mut offset = 0;
    let mut columns = Vec::with_capacity(header.num_columns.min(256) as usize);
    for desc in ctx.values(header.columns, header.num_columns as usize)? {
        let value_type = ValueType::from_raw(desc.value_type)?;
        columns.push(Column {
            name: strings.string(Pointer::<u8>::new(desc.name_offset()))?,
            kind: ColumnKind::Scalar { value_type, offset },
        });
        offset += value_type.size();
    }

    let row_size = header.row_size as usize;
    if offset > row_size {
        return Err(Error::invariant(format!(
            "columns need {offset} bytes but rows are {row_size} bytes"
        )));
    }

    let keys = ctx
        .values(header.keys, header.num_rows as usize)?
        .into_iter()
        .map(|key| RowKey {
            hash: key.hash,
            index: key.index,
        })
        .collect();

    let rows = match ctx.resolve(header.rows)? {
        Some(rows_at) => {
            let count = header.num_rows as usize;
            DataRange::new(rows_at, row_size.saturating_mul(count), ctx.len())?;
            (0..count)
                .map(|row| read_row(&ctx, rows_at + row * row_size, &columns, strings_at))
                .collect::<Result<Vec<_>>>()?
        }
        None => Vec::new(),
    };

    Ok(Table {
        offset: at,
        name: None,
        flags: TableFlags::empty(),
        row_size,
        columns,
        rows,
        keys,
    })
}

fn read_row(ctx: &Context<'_>, at: usize, columns: &[Column], strings: usize) -> Result<Row> {
    let cells = columns
        .iter()
        .map(|column| match column.kind {
            ColumnKind::Scalar { value_type, offset } => Ok(Cell::Value(read_value(
                ctx,
                at + offset,
                value_type,
                strings,
                TableFlags::empty(),
            )?)),
            _ => Ok(Cell::None),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Row { cells })
}
