//! Row-to-entity mapping.
//!
//! Each column name is converted from snake_case to camelCase and matched
//! against the entity's field table. Columns without a matching field are
//! skipped; fields without a matching column keep their default value.
//! Values are handed to the field's setter as they are, with no coercion
//! beyond what [`FromSql`](minibatis_types::FromSql) widens.

use std::sync::Arc;

use crate::driver::DriverError;
use crate::entity::{Entity, FieldTable, Setter};
use crate::error::{Error, Result};
use crate::placeholder::to_camel_case;
use crate::row::{ColMetaData, Row};

/// Materializes query results into entities.
pub struct ResultMapper;

impl ResultMapper {
    /// Map every row into a fresh `T`, consuming `rows`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let rows = conn.query("select id, name, old_car from t_user", &[]).await?;
    /// let users: Vec<User> = ResultMapper::materialize(rows)?;
    /// ```
    pub fn materialize<T, I>(rows: I) -> Result<Vec<T>>
    where
        T: Entity,
        I: IntoIterator<Item = std::result::Result<Row, DriverError>>,
    {
        rows.into_iter().map_entities::<T>().collect()
    }
}

/// Column index → setter, resolved once per result shape.
struct ShapePlan<T> {
    metadata: Arc<ColMetaData>,
    setters: Vec<Option<(Setter<T>, &'static str)>>,
}

impl<T: Entity> ShapePlan<T> {
    fn build(metadata: &Arc<ColMetaData>, table: &FieldTable<T>) -> Self {
        let setters = metadata
            .columns
            .iter()
            .map(|column| {
                let field = to_camel_case(&column.name);
                let found = table.get(&field).map(|f| (f.set, f.name));
                if found.is_none() {
                    tracing::trace!(
                        entity = T::TYPE_NAME,
                        column = %column.name,
                        "no field for column; skipping"
                    );
                }
                found
            })
            .collect();

        Self {
            metadata: Arc::clone(metadata),
            setters,
        }
    }
}

/// Extension trait for mapping row iterators into entities.
///
/// Automatically implemented for any iterator of `Result<Row, DriverError>`,
/// including [`RowSet`](crate::RowSet).
pub trait RowIteratorExt: Iterator<Item = std::result::Result<Row, DriverError>> + Sized {
    /// Lazily map each row to `T`.
    fn map_entities<T: Entity>(self) -> MapEntities<Self, T>;
}

impl<I: Iterator<Item = std::result::Result<Row, DriverError>>> RowIteratorExt for I {
    fn map_entities<T: Entity>(self) -> MapEntities<Self, T> {
        MapEntities {
            inner: self,
            table: T::field_table(),
            plan: None,
        }
    }
}

/// Iterator adapter that maps rows to entities.
pub struct MapEntities<I, T: Entity> {
    inner: I,
    table: Arc<FieldTable<T>>,
    plan: Option<ShapePlan<T>>,
}

impl<I, T: Entity> MapEntities<I, T> {
    fn map_row(&mut self, row: &Row) -> Result<T> {
        let stale = self
            .plan
            .as_ref()
            .is_none_or(|plan| !Arc::ptr_eq(&plan.metadata, row.metadata()));
        if stale {
            self.plan = Some(ShapePlan::build(row.metadata(), &self.table));
        }

        let mut entity = T::default();
        let Some(plan) = self.plan.as_ref() else {
            return Ok(entity);
        };

        for (slot, value) in plan.setters.iter().zip(row.values()) {
            if let Some((set, field)) = slot {
                set(&mut entity, value).map_err(|e| {
                    tracing::debug!(entity = T::TYPE_NAME, field, error = %e, "field rejected column value");
                    Error::Type(e)
                })?;
            }
        }
        Ok(entity)
    }
}

impl<I, T> Iterator for MapEntities<I, T>
where
    I: Iterator<Item = std::result::Result<Row, DriverError>>,
    T: Entity,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.inner.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };
        Some(self.map_row(&row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::row::RowSet;
    use minibatis_types::{FromSql, SqlValue, ToSql, TypeError};

    #[derive(Debug, Default, PartialEq)]
    struct User {
        id: i64,
        name: Option<String>,
        old_car: Option<String>,
    }

    impl Entity for User {
        const TYPE_NAME: &'static str = "app.pojo.UserPO";

        fn describe() -> FieldTable<Self> {
            FieldTable::<Self>::new()
                .field("id", |u| u.id.to_sql(), |u, v| {
                    u.id = i64::from_sql(v)?;
                    Ok(())
                })
                .field("name", |u| u.name.to_sql(), |u, v| {
                    u.name = FromSql::from_sql(v)?;
                    Ok(())
                })
                .field("oldCar", |u| u.old_car.to_sql(), |u, v| {
                    u.old_car = FromSql::from_sql(v)?;
                    Ok(())
                })
        }
    }

    #[test]
    fn test_snake_case_column_fills_camel_case_field() {
        let rows = RowSet::new(
            ColMetaData::from_names(["id", "name", "old_car"]),
            vec![vec![SqlValue::BigInt(1), "Li".into(), "BMW".into()]],
        );

        let users: Vec<User> = ResultMapper::materialize(rows).unwrap();
        assert_eq!(
            users,
            vec![User {
                id: 1,
                name: Some("Li".into()),
                old_car: Some("BMW".into()),
            }]
        );
    }

    #[test]
    fn test_unknown_columns_skipped_and_missing_fields_default() {
        let rows = RowSet::new(
            ColMetaData::from_names(["id", "created_at"]),
            vec![vec![SqlValue::BigInt(3), SqlValue::Text("2024-01-01".into())]],
        );

        let users: Vec<User> = ResultMapper::materialize(rows).unwrap();
        assert_eq!(users[0].id, 3);
        assert_eq!(users[0].name, None);
        assert_eq!(users[0].old_car, None);
    }

    #[test]
    fn test_empty_result_is_empty_vec() {
        let users: Vec<User> = ResultMapper::materialize(RowSet::empty()).unwrap();
        assert!(users.is_empty());
    }

    #[test]
    fn test_no_coercion_is_type_error() {
        let rows = RowSet::new(
            ColMetaData::from_names(["id"]),
            vec![vec![SqlValue::Text("1".into())]],
        );

        let err = ResultMapper::materialize::<User, _>(rows).unwrap_err();
        assert!(matches!(err, Error::Type(TypeError::TypeMismatch { .. })));
    }

    #[test]
    fn test_fetch_error_is_driver_error() {
        let metadata = Arc::new(ColMetaData::from_names(["id"]));
        let rows = RowSet::from_results(
            Arc::clone(&metadata),
            vec![
                Ok(Row::new(metadata, vec![SqlValue::BigInt(1)])),
                Err(DriverError::Closed),
            ],
        );

        let mut mapped = rows.map_entities::<User>();
        assert_eq!(mapped.next().unwrap().unwrap().id, 1);
        assert!(matches!(
            mapped.next().unwrap(),
            Err(Error::Driver(DriverError::Closed))
        ));
        assert!(mapped.next().is_none());
    }

    #[test]
    fn test_plan_rebuilt_for_new_shape() {
        let first = Row::new(
            Arc::new(ColMetaData::from_names(["id"])),
            vec![SqlValue::BigInt(1)],
        );
        let second = Row::new(
            Arc::new(ColMetaData::from_names(["name"])),
            vec!["Han".into()],
        );

        let users: Vec<User> = vec![Ok(first), Ok(second)]
            .into_iter()
            .map_entities::<User>()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(users[0].id, 1);
        assert_eq!(users[1].name.as_deref(), Some("Han"));
    }
}
