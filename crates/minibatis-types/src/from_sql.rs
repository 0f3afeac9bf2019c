//! Trait for converting from SQL values to Rust types.

use bytes::Bytes;

use crate::error::TypeError;
use crate::value::SqlValue;

/// Trait for types that can be read out of a [`SqlValue`].
///
/// Implementations accept the value's own kind and lossless widenings of it
/// (a `SMALLINT` read as `i32`, a `REAL` read as `f64`). Text is never parsed
/// into numbers and numbers are never formatted into text.
pub trait FromSql: Sized {
    /// Convert from a SQL value to this type.
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError>;

    /// Convert from a possibly-NULL SQL value.
    ///
    /// Returns `None` if the value is NULL.
    fn from_sql_nullable(value: &SqlValue) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_sql(value).map(Some)
        }
    }
}

/// Implements `FromSql` by listing the accepted variants and how each one
/// widens into the target type.
macro_rules! from_sql_impl {
    ($ty:ty, $name:literal, { $($pat:pat => $conv:expr),+ $(,)? }) => {
        impl FromSql for $ty {
            fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
                match value {
                    $($pat => Ok($conv),)+
                    SqlValue::Null => Err(TypeError::UnexpectedNull),
                    other => Err(TypeError::mismatch($name, other)),
                }
            }
        }
    };
}

from_sql_impl!(bool, "bool", { SqlValue::Bool(v) => *v });
from_sql_impl!(i16, "i16", { SqlValue::SmallInt(v) => *v });
from_sql_impl!(i32, "i32", {
    SqlValue::Int(v) => *v,
    SqlValue::SmallInt(v) => i32::from(*v),
});
from_sql_impl!(i64, "i64", {
    SqlValue::BigInt(v) => *v,
    SqlValue::Int(v) => i64::from(*v),
    SqlValue::SmallInt(v) => i64::from(*v),
});
from_sql_impl!(f32, "f32", { SqlValue::Float(v) => *v });
from_sql_impl!(f64, "f64", {
    SqlValue::Double(v) => *v,
    SqlValue::Float(v) => f64::from(*v),
});
from_sql_impl!(String, "String", { SqlValue::Text(v) => v.clone() });
from_sql_impl!(Vec<u8>, "Vec<u8>", { SqlValue::Binary(v) => v.to_vec() });
from_sql_impl!(Bytes, "Bytes", { SqlValue::Binary(v) => v.clone() });

impl FromSql for u32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        let wide = i64::from_sql(value)?;
        u32::try_from(wide).map_err(|_| TypeError::OutOfRange { target_type: "u32" })
    }
}

impl FromSql for u64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        let wide = i64::from_sql(value)?;
        u64::try_from(wide).map_err(|_| TypeError::OutOfRange { target_type: "u64" })
    }
}

impl FromSql for SqlValue {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        Ok(value.clone())
    }

    fn from_sql_nullable(value: &SqlValue) -> Result<Option<Self>, TypeError> {
        Ok((!value.is_null()).then(|| value.clone()))
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}

#[cfg(feature = "uuid")]
from_sql_impl!(uuid::Uuid, "Uuid", { SqlValue::Uuid(v) => *v });

#[cfg(feature = "decimal")]
from_sql_impl!(rust_decimal::Decimal, "Decimal", {
    SqlValue::Decimal(v) => *v,
    SqlValue::Int(v) => rust_decimal::Decimal::from(*v),
    SqlValue::BigInt(v) => rust_decimal::Decimal::from(*v),
    SqlValue::SmallInt(v) => rust_decimal::Decimal::from(*v),
});

#[cfg(feature = "chrono")]
from_sql_impl!(chrono::NaiveDate, "NaiveDate", { SqlValue::Date(v) => *v });

#[cfg(feature = "chrono")]
from_sql_impl!(chrono::NaiveTime, "NaiveTime", { SqlValue::Time(v) => *v });

#[cfg(feature = "chrono")]
from_sql_impl!(chrono::NaiveDateTime, "NaiveDateTime", {
    SqlValue::Timestamp(v) => *v,
    SqlValue::Date(v) => v.and_time(chrono::NaiveTime::MIN),
});

#[cfg(feature = "chrono")]
from_sql_impl!(chrono::DateTime<chrono::FixedOffset>, "DateTime<FixedOffset>", {
    SqlValue::TimestampTz(v) => *v,
});
