//! # minibatis-types
//!
//! Driver-neutral SQL values and the conversions between them and Rust types.
//!
//! Every value crossing the driver boundary, whether a bound parameter or a
//! column read back from a result row, is a [`SqlValue`]. [`ToSql`] turns a
//! Rust value into one and [`FromSql`] reads one back. Conversions only widen
//! (an `INTEGER` column can be read as `i64`); they never parse or reinterpret.
//!
//! ## Features
//!
//! - `chrono` (default): date/time values via chrono
//! - `uuid` (default): UUID values
//! - `decimal` (default): exact decimals via rust_decimal
//!
//! ## Type Mappings
//!
//! | SQL Type | Rust Type |
//! |----------|-----------|
//! | `BOOLEAN` | `bool` |
//! | `SMALLINT` | `i16` |
//! | `INTEGER` | `i32` |
//! | `BIGINT` | `i64` |
//! | `REAL` | `f32` |
//! | `DOUBLE` | `f64` |
//! | `DECIMAL` | `rust_decimal::Decimal` |
//! | `VARCHAR` | `String` |
//! | `VARBINARY` | `Vec<u8>` / `bytes::Bytes` |
//! | `DATE` | `chrono::NaiveDate` |
//! | `TIME` | `chrono::NaiveTime` |
//! | `TIMESTAMP` | `chrono::NaiveDateTime` |
//! | `TIMESTAMP WITH TIME ZONE` | `chrono::DateTime<FixedOffset>` |
//! | `UUID` | `uuid::Uuid` |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod from_sql;
pub mod to_sql;
pub mod value;

pub use error::TypeError;
pub use from_sql::FromSql;
pub use to_sql::ToSql;
pub use value::SqlValue;
