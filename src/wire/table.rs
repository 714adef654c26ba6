//! Flattened tabular result sets.
//!
//! Layout, all big-endian:
//!
//! ```text
//! i32 table_len | i32 header_len | i8 status | i16 column_count
//! | i8 type * column_count | string name * column_count
//! | i32 row_count | (i32 row_len | values) * row_count
//! ```
//!
//! `table_len` counts every byte after itself and `header_len` every byte of
//! the header after itself. Null values are stored as per-type sentinels.

use bytes::{BufMut, Bytes, BytesMut};

use super::codec;
use super::decimal::Decimal;
use super::types::{Value, WireType};
use crate::error_handling::types::WireError;

const NULL_FLOAT: f64 = -1.7976931348623157e308;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub wire_type: WireType,
}

impl Column {
    pub fn new(name: impl Into<String>, wire_type: WireType) -> Self {
        Self {
            name: name.into(),
            wire_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    status: i8,
}

impl Table {
    /// Status byte of a table no procedure set a status on.
    pub const NO_STATUS: i8 = -128;

    pub fn new(columns: Vec<Column>) -> Result<Self, WireError> {
        if columns.is_empty() {
            return Err(WireError::NoColumns);
        }
        if let Some(bad) = columns
            .iter()
            .find(|c| matches!(c.wire_type, WireType::Null | WireType::Array))
        {
            return Err(WireError::ColumnMismatch {
                column: bad.name.clone(),
                expected: bad.wire_type,
            });
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
            status: Self::NO_STATUS,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn status(&self) -> i8 {
        self.status
    }

    /// Appends a row after checking it against the schema. `Value::Null` fits
    /// any column.
    pub fn add_row(&mut self, row: Vec<Value>) -> Result<(), WireError> {
        if row.len() != self.columns.len() {
            return Err(WireError::ColumnCount {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        for (column, value) in self.columns.iter().zip(&row) {
            if !value.is_null() && value.wire_type() != column.wire_type {
                return Err(WireError::ColumnMismatch {
                    column: column.name.clone(),
                    expected: column.wire_type,
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    fn header_size(&self) -> usize {
        1 + 2
            + self.columns.len()
            + self
                .columns
                .iter()
                .map(|c| codec::string_size(&c.name))
                .sum::<usize>()
    }

    fn row_size(&self, row: &[Value]) -> usize {
        self.columns
            .iter()
            .zip(row)
            .map(|(column, value)| cell_size(column.wire_type, value))
            .sum()
    }

    /// Exact number of bytes `serialize` produces.
    pub fn serialized_size(&self) -> usize {
        4 + 4
            + self.header_size()
            + 4
            + self
                .rows
                .iter()
                .map(|row| 4 + self.row_size(row))
                .sum::<usize>()
    }

    /// Flattens the table into a buffer allocated at exactly the precomputed
    /// size.
    pub fn serialize(&self) -> Result<Bytes, WireError> {
        let size = self.serialized_size();
        // Every inner length is smaller than the whole, so this bounds them too.
        let table_len: i32 = codec::checked_len("table length", size - 4)?;
        let column_count: i16 = codec::checked_len("column count", self.columns.len())?;
        let mut buf = BytesMut::with_capacity(size);

        buf.put_i32(table_len);
        buf.put_i32(codec::checked_len("header length", self.header_size())?);
        buf.put_i8(self.status);
        buf.put_i16(column_count);
        for column in &self.columns {
            buf.put_i8(column.wire_type.code());
        }
        for column in &self.columns {
            codec::put_string(&mut buf, &column.name);
        }

        buf.put_i32(codec::checked_len("row count", self.rows.len())?);
        for row in &self.rows {
            buf.put_i32(codec::checked_len("row length", self.row_size(row))?);
            for (column, value) in self.columns.iter().zip(row) {
                encode_cell(&mut buf, column.wire_type, value);
            }
        }

        if buf.len() != size {
            return Err(WireError::SizeMismatch {
                expected: size,
                actual: buf.len(),
            });
        }
        Ok(buf.freeze())
    }

    /// Reads back a table written by `serialize`.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut buf = codec::frame_body(bytes)?;
        let _header_len = codec::get_i32(&mut buf)?;
        let status = codec::get_i8(&mut buf)?;
        let column_count = codec::get_i16(&mut buf)?;
        if column_count <= 0 {
            return Err(WireError::NoColumns);
        }

        let mut types = Vec::with_capacity(column_count as usize);
        for _ in 0..column_count {
            types.push(WireType::from_code(codec::get_i8(&mut buf)?)?);
        }
        let mut columns = Vec::with_capacity(types.len());
        for wire_type in types {
            let name = codec::get_string(&mut buf)?.unwrap_or_default();
            columns.push(Column::new(name, wire_type));
        }

        let mut table = Table::new(columns)?;
        table.status = status;
        let row_count = codec::get_i32(&mut buf)?;
        for _ in 0..row_count.max(0) {
            let _row_len = codec::get_i32(&mut buf)?;
            let mut row = Vec::with_capacity(table.columns.len());
            for column in &table.columns {
                row.push(decode_cell(&mut buf, column.wire_type)?);
            }
            table.rows.push(row);
        }
        Ok(table)
    }
}

fn cell_size(wire_type: WireType, value: &Value) -> usize {
    match (wire_type, value) {
        (WireType::String, Value::String(s)) => codec::string_size(s),
        (WireType::Varbinary, Value::Varbinary(b)) => 4 + b.len(),
        (WireType::String | WireType::Varbinary, _) => 4,
        (other, _) => other.fixed_width().unwrap_or_default(),
    }
}

fn encode_cell(buf: &mut BytesMut, wire_type: WireType, value: &Value) {
    match (wire_type, value) {
        (_, Value::TinyInt(x)) => buf.put_i8(*x),
        (_, Value::SmallInt(x)) => buf.put_i16(*x),
        (_, Value::Integer(x)) => buf.put_i32(*x),
        (_, Value::BigInt(x)) | (_, Value::Timestamp(x)) => buf.put_i64(*x),
        (_, Value::Float(x)) => buf.put_f64(*x),
        (_, Value::String(s)) => codec::put_string(buf, s),
        (_, Value::Varbinary(b)) => codec::put_bytes(buf, b),
        (_, Value::Decimal(d)) => d.encode(buf),
        (WireType::TinyInt, Value::Null) => buf.put_i8(i8::MIN),
        (WireType::SmallInt, Value::Null) => buf.put_i16(i16::MIN),
        (WireType::Integer, Value::Null) => buf.put_i32(i32::MIN),
        (WireType::BigInt | WireType::Timestamp, Value::Null) => buf.put_i64(i64::MIN),
        (WireType::Float, Value::Null) => buf.put_f64(NULL_FLOAT),
        (WireType::Decimal, Value::Null) => buf.put_i128(Decimal::NULL_SENTINEL),
        (WireType::String | WireType::Varbinary, Value::Null) => buf.put_i32(-1),
        (WireType::Null | WireType::Array, Value::Null) => {}
    }
}

fn decode_cell(buf: &mut &[u8], wire_type: WireType) -> Result<Value, WireError> {
    Ok(match wire_type {
        WireType::TinyInt => match codec::get_i8(buf)? {
            i8::MIN => Value::Null,
            x => Value::TinyInt(x),
        },
        WireType::SmallInt => match codec::get_i16(buf)? {
            i16::MIN => Value::Null,
            x => Value::SmallInt(x),
        },
        WireType::Integer => match codec::get_i32(buf)? {
            i32::MIN => Value::Null,
            x => Value::Integer(x),
        },
        WireType::BigInt => match codec::get_i64(buf)? {
            i64::MIN => Value::Null,
            x => Value::BigInt(x),
        },
        WireType::Timestamp => match codec::get_i64(buf)? {
            i64::MIN => Value::Null,
            x => Value::Timestamp(x),
        },
        WireType::Float => {
            let x = codec::get_f64(buf)?;
            if x <= NULL_FLOAT {
                Value::Null
            } else {
                Value::Float(x)
            }
        }
        WireType::Decimal => Decimal::decode(buf)?.map_or(Value::Null, Value::Decimal),
        WireType::String => codec::get_string(buf)?.map_or(Value::Null, Value::String),
        WireType::Varbinary => codec::get_bytes(buf)?.map_or(Value::Null, Value::Varbinary),
        WireType::Null | WireType::Array => return Err(WireError::UnknownWireType(wire_type.code())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_columns() -> Table {
        Table::new(vec![
            Column::new("HELLO", WireType::String),
            Column::new("COUNT", WireType::Integer),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_table_layout() {
        let table = two_columns();
        let bytes = table.serialize().unwrap();

        // header: status + count + 2 types + "HELLO" + "COUNT"
        let header_len = 1 + 2 + 2 + 9 + 9;
        assert_eq!(bytes.len(), 4 + 4 + header_len + 4);
        assert_eq!(&bytes[4..8], &(header_len as i32).to_be_bytes());
        assert_eq!(bytes[8] as i8, Table::NO_STATUS);
        assert_eq!(&bytes[bytes.len() - 4..], &0i32.to_be_bytes());
    }

    #[test]
    fn test_rejects_rows_that_do_not_fit() {
        let mut table = two_columns();
        assert_eq!(
            table.add_row(vec![Value::Null]),
            Err(WireError::ColumnCount {
                expected: 2,
                actual: 1
            })
        );
        assert!(matches!(
            table.add_row(vec![Value::Integer(1), Value::Integer(2)]),
            Err(WireError::ColumnMismatch { .. })
        ));
        assert!(Table::new(Vec::new()).is_err());
    }

    #[test]
    fn test_too_many_columns_is_rejected() {
        let columns = (0..40_000)
            .map(|i| Column::new(format!("c{}", i), WireType::TinyInt))
            .collect();
        let table = Table::new(columns).unwrap();
        assert_eq!(
            table.serialize(),
            Err(WireError::Oversized {
                field: "column count",
                len: 40_000
            })
        );
    }

    #[test]
    fn test_nulls_use_sentinels() {
        let mut table = two_columns();
        table.add_row(vec![Value::Null, Value::Null]).unwrap();
        let bytes = table.serialize().unwrap();

        let row = &bytes[bytes.len() - 8..];
        assert_eq!(&row[..4], &(-1i32).to_be_bytes());
        assert_eq!(&row[4..], &i32::MIN.to_be_bytes());

        let decoded = Table::decode(&bytes).unwrap();
        assert_eq!(decoded.rows()[0], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_decode_reads_values_back() {
        let mut table = two_columns();
        table
            .add_row(vec![Value::string("Hello"), Value::Integer(3)])
            .unwrap();
        let decoded = Table::decode(&table.serialize().unwrap()).unwrap();
        assert_eq!(decoded, table);
    }
}
