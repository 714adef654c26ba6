//! Fixture file names and the canonical table fixture.

use crate::error_handling::types::WireError;
use crate::wire::{Column, Decimal, Table, Value, WireType};

pub const AUTH_REQUEST_SHA256: &str = "authentication_request_sha256.msg";
pub const AUTH_REQUEST: &str = "authentication_request.msg";
pub const AUTH_RESPONSE: &str = "authentication_response.msg";
pub const INVOCATION_REQUEST_SUCCESS: &str = "invocation_request_success.msg";
pub const INVOCATION_RESPONSE_SUCCESS: &str = "invocation_response_success.msg";
pub const INVOCATION_REQUEST_FAIL_CV: &str = "invocation_request_fail_cv.msg";
pub const INVOCATION_RESPONSE_FAIL_CV: &str = "invocation_response_fail_cv.msg";
pub const INVOCATION_REQUEST_SELECT: &str = "invocation_request_select.msg";
pub const INVOCATION_RESPONSE_SELECT: &str = "invocation_response_select.msg";
pub const INVOCATION_REQUEST_ALL_PARAMS: &str = "invocation_request_all_params.msg";
pub const SERIALIZED_TABLE: &str = "serialized_table.bin";

pub const MANIFEST: &str = "capture_manifest.json";

/// Every fixture a full run produces, in the order they are written.
pub const ALL: [&str; 11] = [
    AUTH_REQUEST_SHA256,
    AUTH_REQUEST,
    AUTH_RESPONSE,
    INVOCATION_REQUEST_SUCCESS,
    INVOCATION_RESPONSE_SUCCESS,
    INVOCATION_REQUEST_FAIL_CV,
    INVOCATION_RESPONSE_FAIL_CV,
    INVOCATION_REQUEST_SELECT,
    INVOCATION_RESPONSE_SELECT,
    INVOCATION_REQUEST_ALL_PARAMS,
    SERIALIZED_TABLE,
];

/// Seven columns, one per supported scalar type, and four rows that mix
/// values and nulls.
pub fn canonical_table() -> Result<Table, WireError> {
    let columns = vec![
        Column::new("column1", WireType::TinyInt),
        Column::new("column2", WireType::String),
        Column::new("column3", WireType::SmallInt),
        Column::new("column4", WireType::Integer),
        Column::new("column5", WireType::BigInt),
        Column::new("column6", WireType::Timestamp),
        Column::new("column7", WireType::Decimal),
    ];
    let mut table = Table::new(columns)?;

    // 44 microseconds after the epoch
    let at = Value::Timestamp(44);
    let decimal: Decimal = "3.1459".parse()?;

    table.add_row(vec![Value::Null; 7])?;
    table.add_row(vec![
        Value::TinyInt(0),
        Value::string(""),
        Value::SmallInt(2),
        Value::Integer(4),
        Value::BigInt(5),
        at.clone(),
        Value::Decimal(decimal),
    ])?;
    table.add_row(vec![
        Value::TinyInt(0),
        Value::Null,
        Value::SmallInt(2),
        Value::Integer(4),
        Value::BigInt(5),
        Value::Null,
        Value::Null,
    ])?;
    table.add_row(vec![
        Value::Null,
        Value::string("woobie"),
        Value::Null,
        Value::Null,
        Value::Null,
        at,
        Value::Decimal(decimal),
    ])?;
    Ok(table)
}
