//! Row representation for query results.
//!
//! A [`RowSet`] is what a driver hands back for a query: a finite,
//! consume-once sequence of [`Row`]s. All rows of one result share a single
//! `Arc<ColMetaData>`, which the result mapper uses to resolve columns to
//! entity fields once per result shape instead of once per row.

use std::sync::Arc;

use minibatis_types::{FromSql, SqlValue, TypeError};

use crate::driver::DriverError;

/// Column metadata describing a result set column.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking semver compatibility. Use
/// [`Column::new()`] or builder methods to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Column {
    /// Column name as reported by the database.
    pub name: String,
    /// Column index (0-based).
    pub index: usize,
    /// SQL type name (e.g., "INTEGER", "VARCHAR").
    pub type_name: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
}

impl Column {
    /// Create a new column with basic metadata.
    pub fn new(name: impl Into<String>, index: usize, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index,
            type_name: type_name.into(),
            nullable: true,
        }
    }

    /// Set whether the column is nullable.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Shared column metadata for a result set.
///
/// This is shared across all rows in the result set to avoid
/// duplicating metadata per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColMetaData {
    /// Column definitions.
    pub columns: Arc<[Column]>,
}

impl ColMetaData {
    /// Create new column metadata from a list of columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    /// Build metadata from bare column names, typed `UNKNOWN`.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Column::new(name, index, "UNKNOWN"))
            .collect::<Vec<_>>()
            .into()
    }

    /// Get the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get a column by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find a column index by name (case-insensitive).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

impl From<Vec<Column>> for ColMetaData {
    fn from(columns: Vec<Column>) -> Self {
        Self::new(columns)
    }
}

/// A row from a query result.
#[derive(Clone, PartialEq)]
pub struct Row {
    metadata: Arc<ColMetaData>,
    values: Arc<[SqlValue]>,
}

impl Row {
    /// Create a row. `values` are positional, matching `metadata`.
    pub fn new(metadata: Arc<ColMetaData>, values: Vec<SqlValue>) -> Self {
        Self {
            metadata,
            values: values.into(),
        }
    }

    /// Get a value by column index with type conversion.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, TypeError> {
        self.values
            .get(index)
            .ok_or_else(|| TypeError::ColumnNotFound(format!("#{index}")))
            .and_then(T::from_sql)
    }

    /// Get a value by column name with type conversion.
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, TypeError> {
        let index = self
            .metadata
            .find_by_name(name)
            .ok_or_else(|| TypeError::ColumnNotFound(name.to_owned()))?;
        self.get(index)
    }

    /// Try to get a value by column index, returning None if NULL or not found.
    pub fn try_get<T: FromSql>(&self, index: usize) -> Option<T> {
        self.values
            .get(index)
            .and_then(|v| T::from_sql_nullable(v).ok().flatten())
    }

    /// Try to get a value by column name, returning None if NULL or not found.
    pub fn try_get_by_name<T: FromSql>(&self, name: &str) -> Option<T> {
        let index = self.metadata.find_by_name(name)?;
        self.try_get(index)
    }

    /// Get the raw SQL value by index.
    #[must_use]
    pub fn get_raw(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Get the raw SQL value by column name.
    #[must_use]
    pub fn get_raw_by_name(&self, name: &str) -> Option<&SqlValue> {
        let index = self.metadata.find_by_name(name)?;
        self.get_raw(index)
    }

    /// All values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Get the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.metadata.columns
    }

    /// Get the shared column metadata.
    #[must_use]
    pub fn metadata(&self) -> &Arc<ColMetaData> {
        &self.metadata
    }

    /// Check if a column value is NULL. Missing columns count as NULL.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).is_none_or(SqlValue::is_null)
    }

    /// Iterate over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Column, &SqlValue)> {
        self.metadata.columns.iter().zip(self.values.iter())
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (column, value) in self.iter() {
            map.entry(&column.name, value);
        }
        map.finish()
    }
}

/// The rows produced by one query.
///
/// Consumed once; iterate it or hand it to
/// [`RowIteratorExt::map_entities`](crate::RowIteratorExt::map_entities).
#[derive(Debug)]
pub struct RowSet {
    metadata: Arc<ColMetaData>,
    rows: std::vec::IntoIter<Result<Row, DriverError>>,
}

impl RowSet {
    /// Build a result from positional value vectors sharing `metadata`.
    pub fn new(metadata: impl Into<Arc<ColMetaData>>, rows: Vec<Vec<SqlValue>>) -> Self {
        let metadata = metadata.into();
        let rows = rows
            .into_iter()
            .map(|values| Ok(Row::new(Arc::clone(&metadata), values)))
            .collect::<Vec<_>>();
        Self {
            metadata,
            rows: rows.into_iter(),
        }
    }

    /// Build a result from already-fetched rows, some of which may have
    /// failed to fetch.
    pub fn from_results(
        metadata: impl Into<Arc<ColMetaData>>,
        rows: Vec<Result<Row, DriverError>>,
    ) -> Self {
        Self {
            metadata: metadata.into(),
            rows: rows.into_iter(),
        }
    }

    /// A result without columns or rows.
    pub fn empty() -> Self {
        Self::new(ColMetaData::new(Vec::new()), Vec::new())
    }

    /// Column metadata shared by every row.
    #[must_use]
    pub fn metadata(&self) -> &Arc<ColMetaData> {
        &self.metadata
    }

    /// Rows not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for RowSet {
    type Item = Result<Row, DriverError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for RowSet {}
