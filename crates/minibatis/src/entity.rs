//! Entity field-accessor tables.
//!
//! Parameter binding reads entity fields by name and result mapping writes
//! them by name. Instead of runtime reflection every entity type describes
//! itself once as a [`FieldTable`]: an ordered list of named getter/setter
//! function pointers. Tables are built on first use and cached per type for
//! the life of the process.
//!
//! ## Derive Macro
//!
//! The recommended way to implement `Entity` is via the derive macro:
//!
//! ```rust,ignore
//! use minibatis::Entity;
//!
//! #[derive(Debug, Default, Entity)]
//! #[minibatis(type_name = "app.pojo.UserPO")]
//! struct User {
//!     id: i64,
//!     name: Option<String>,
//!     old_car: Option<String>, // field "oldCar", filled from column old_car
//! }
//! ```
//!
//! ## Supported Attributes
//!
//! - `#[minibatis(rename = "fieldName")]` - Use a different field name
//! - `#[minibatis(skip)]` - Leave the field out of the table
//! - `#[minibatis(default)]` - A NULL column leaves the field at its current value
//! - `#[minibatis(rename_all = "...")]` - Container: naming convention for all fields
//! - `#[minibatis(type_name = "...")]` - Container: name mapping entries declare

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use minibatis_types::{SqlValue, TypeError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Reads one field as a SQL value.
pub type Getter<T> = fn(&T) -> Result<SqlValue, TypeError>;

/// Writes one field from a SQL value.
pub type Setter<T> = fn(&mut T, &SqlValue) -> Result<(), TypeError>;

/// Named access to one field of `T`.
pub struct FieldAccessor<T> {
    /// Field name placeholders and camelCased columns are matched against.
    pub name: &'static str,
    /// Getter used when binding.
    pub get: Getter<T>,
    /// Setter used when mapping results.
    pub set: Setter<T>,
}

impl<T> Clone for FieldAccessor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldAccessor<T> {}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered field accessors of one entity type.
pub struct FieldTable<T> {
    fields: Vec<FieldAccessor<T>>,
    by_name: HashMap<&'static str, usize>,
}

impl<T> FieldTable<T> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Add a field. A second field with the same name replaces the first.
    #[must_use]
    pub fn field(mut self, name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
        let accessor = FieldAccessor { name, get, set };
        match self.by_name.get(name) {
            Some(&i) => self.fields[i] = accessor,
            None => {
                self.by_name.insert(name, self.fields.len());
                self.fields.push(accessor);
            }
        }
        self
    }

    /// Look up a field by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldAccessor<T>> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Iterate over accessors in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldAccessor<T>> {
        self.fields.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the table has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> Default for FieldTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FieldTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A plain data type the session layer can bind from and map into.
///
/// Usually derived; see the [module docs](self).
pub trait Entity: Default + Send + Sync + 'static {
    /// Name mapping entries use to declare this type as their result type.
    const TYPE_NAME: &'static str;

    /// Build this type's field table. Called once per process.
    fn describe() -> FieldTable<Self>;

    /// The cached field table.
    fn field_table() -> Arc<FieldTable<Self>> {
        cached_table::<Self>()
    }
}

type TableRegistry = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static TABLES: Lazy<TableRegistry> = Lazy::new(|| RwLock::new(HashMap::new()));

fn cached_table<T: Entity>() -> Arc<FieldTable<T>> {
    let key = TypeId::of::<T>();

    if let Some(table) = TABLES.read().get(&key).cloned() {
        if let Ok(table) = table.downcast::<FieldTable<T>>() {
            return table;
        }
    }

    let entry = Arc::clone(TABLES.write().entry(key).or_insert_with(|| {
        tracing::debug!(entity = T::TYPE_NAME, "building field table");
        Arc::new(T::describe())
    }));

    // The registry is keyed by TypeId, so the downcast cannot miss.
    entry
        .downcast::<FieldTable<T>>()
        .unwrap_or_else(|_| Arc::new(T::describe()))
}

/// Whether a mapping entry's declared result type names `T`.
///
/// Matches the full [`Entity::TYPE_NAME`] or its last `.` or `::` segment,
/// so `app.pojo.UserPO`, `UserPO` and `crate::pojo::UserPO` all name a type
/// whose `TYPE_NAME` is `app.pojo.UserPO`.
#[must_use]
pub fn declares_type<T: Entity>(declared: &str) -> bool {
    fn last_segment(name: &str) -> &str {
        let name = name.rsplit("::").next().unwrap_or(name);
        name.rsplit('.').next().unwrap_or(name)
    }

    let declared = declared.trim();
    declared == T::TYPE_NAME || last_segment(declared) == last_segment(T::TYPE_NAME)
}
