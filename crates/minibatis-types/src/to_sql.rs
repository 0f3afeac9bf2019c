//! Trait for converting Rust types to SQL values.

use bytes::Bytes;

use crate::error::TypeError;
use crate::value::SqlValue;

/// Trait for types that can be bound as statement parameters.
pub trait ToSql {
    /// Convert this value to a SQL value.
    fn to_sql(&self) -> Result<SqlValue, TypeError>;

    /// SQL type name this value binds as.
    fn sql_type(&self) -> &'static str;
}

macro_rules! to_sql_copy {
    ($($ty:ty => $variant:ident, $sql:literal);* $(;)?) => {
        $(
            impl ToSql for $ty {
                fn to_sql(&self) -> Result<SqlValue, TypeError> {
                    Ok(SqlValue::$variant(*self))
                }

                fn sql_type(&self) -> &'static str {
                    $sql
                }
            }
        )*
    };
}

to_sql_copy! {
    bool => Bool, "BOOLEAN";
    i16 => SmallInt, "SMALLINT";
    i32 => Int, "INTEGER";
    i64 => BigInt, "BIGINT";
    f32 => Float, "REAL";
    f64 => Double, "DOUBLE";
}

impl ToSql for u32 {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        Ok(SqlValue::BigInt(i64::from(*self)))
    }

    fn sql_type(&self) -> &'static str {
        "BIGINT"
    }
}

impl ToSql for u64 {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        i64::try_from(*self)
            .map(SqlValue::BigInt)
            .map_err(|_| TypeError::OutOfRange {
                target_type: "BIGINT",
            })
    }

    fn sql_type(&self) -> &'static str {
        "BIGINT"
    }
}

impl ToSql for str {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        Ok(SqlValue::Text(self.to_owned()))
    }

    fn sql_type(&self) -> &'static str {
        "VARCHAR"
    }
}

impl ToSql for String {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        Ok(SqlValue::Text(self.clone()))
    }

    fn sql_type(&self) -> &'static str {
        "VARCHAR"
    }
}

impl ToSql for [u8] {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        Ok(SqlValue::Binary(Bytes::copy_from_slice(self)))
    }

    fn sql_type(&self) -> &'static str {
        "VARBINARY"
    }
}

impl ToSql for Vec<u8> {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        self.as_slice().to_sql()
    }

    fn sql_type(&self) -> &'static str {
        "VARBINARY"
    }
}

impl ToSql for Bytes {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        Ok(SqlValue::Binary(self.clone()))
    }

    fn sql_type(&self) -> &'static str {
        "VARBINARY"
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        Ok(self.clone())
    }

    fn sql_type(&self) -> &'static str {
        self.type_name()
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        match self {
            Some(v) => v.to_sql(),
            None => Ok(SqlValue::Null),
        }
    }

    fn sql_type(&self) -> &'static str {
        match self {
            Some(v) => v.sql_type(),
            None => "NULL",
        }
    }
}

impl<T: ToSql + ?Sized> ToSql for &T {
    fn to_sql(&self) -> Result<SqlValue, TypeError> {
        (*self).to_sql()
    }

    fn sql_type(&self) -> &'static str {
        (*self).sql_type()
    }
}

#[cfg(feature = "uuid")]
to_sql_copy! { uuid::Uuid => Uuid, "UUID" }

#[cfg(feature = "decimal")]
to_sql_copy! { rust_decimal::Decimal => Decimal, "DECIMAL" }

#[cfg(feature = "chrono")]
to_sql_copy! {
    chrono::NaiveDate => Date, "DATE";
    chrono::NaiveTime => Time, "TIME";
    chrono::NaiveDateTime => Timestamp, "TIMESTAMP";
    chrono::DateTime<chrono::FixedOffset> => TimestampTz, "TIMESTAMP WITH TIME ZONE";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sql_i32() {
        let value: i32 = 42;
        assert_eq!(value.to_sql().unwrap(), SqlValue::Int(42));
        assert_eq!(value.sql_type(), "INTEGER");
    }

    #[test]
    fn test_to_sql_string() {
        let value = "hello".to_string();
        assert_eq!(value.to_sql().unwrap(), SqlValue::Text("hello".to_string()));
    }

    #[test]
    fn test_to_sql_option() {
        assert_eq!(Some(42i64).to_sql().unwrap(), SqlValue::BigInt(42));
        assert_eq!(None::<i64>.to_sql().unwrap(), SqlValue::Null);
        assert_eq!(None::<i64>.sql_type(), "NULL");
    }

    #[test]
    fn test_to_sql_u64_overflow() {
        assert!(u64::MAX.to_sql().is_err());
        assert_eq!(7u64.to_sql().unwrap(), SqlValue::BigInt(7));
    }
}
