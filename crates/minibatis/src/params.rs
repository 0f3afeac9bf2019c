//! Statement parameter sources.
//!
//! A placeholder `#{name}` is resolved against whatever the caller passed
//! as the statement's parameter object:
//!
//! - a map ([`ParamMap`], `HashMap<String, SqlValue>`, `BTreeMap<String, SqlValue>`)
//!   looks the name up as a key;
//! - an [`Entity`] looks it up as a field name;
//! - a scalar answers every placeholder with the same value.
//!
//! ```rust,ignore
//! use minibatis::{ParamMap, Params};
//!
//! let by_map = ParamMap::new().with("id", 1i64).with("oldCar", "BMW");
//! session.update("app.dao.UserDao.updateCar", by_map).await?;
//!
//! // Entities bind by reference
//! session.insert("app.dao.UserDao.insert", &user).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use minibatis_types::{SqlValue, ToSql, TypeError};

use crate::entity::Entity;
use crate::error::{Error, Result};

/// Something placeholders can be resolved against by name.
pub trait ParamSource: Send + Sync {
    /// Value for `name`, or `None` if the source has no such key or field.
    fn lookup(&self, name: &str) -> std::result::Result<Option<SqlValue>, TypeError>;
}

impl<T: Entity> ParamSource for T {
    fn lookup(&self, name: &str) -> std::result::Result<Option<SqlValue>, TypeError> {
        T::field_table()
            .get(name)
            .map(|field| (field.get)(self))
            .transpose()
    }
}

impl<S: BuildHasher + Send + Sync> ParamSource for HashMap<String, SqlValue, S> {
    fn lookup(&self, name: &str) -> std::result::Result<Option<SqlValue>, TypeError> {
        Ok(self.get(name).cloned())
    }
}

impl ParamSource for BTreeMap<String, SqlValue> {
    fn lookup(&self, name: &str) -> std::result::Result<Option<SqlValue>, TypeError> {
        Ok(self.get(name).cloned())
    }
}

/// An insertion-ordered name → value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMap {
    entries: Vec<(String, SqlValue)>,
}

impl ParamMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<SqlValue>,
    ) -> Option<SqlValue> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert any [`ToSql`] value.
    pub fn add<T: ToSql + ?Sized>(
        &mut self,
        name: impl Into<String>,
        value: &T,
    ) -> std::result::Result<(), TypeError> {
        self.insert(name, value.to_sql()?);
        Ok(())
    }

    /// Get a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ParamSource for ParamMap {
    fn lookup(&self, name: &str) -> std::result::Result<Option<SqlValue>, TypeError> {
        Ok(self.get(name).cloned())
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<SqlValue>> Extend<(K, V)> for ParamMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl IntoIterator for ParamMap {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The parameter object of one statement call.
#[derive(Clone, Default)]
pub enum Params<'a> {
    /// No parameters; any placeholder fails to bind.
    #[default]
    None,
    /// A single raw value that answers every placeholder.
    Scalar(SqlValue),
    /// A borrowed map or entity.
    Source(&'a dyn ParamSource),
    /// An owned name → value map.
    Named(ParamMap),
}

impl<'a> Params<'a> {
    /// Wrap a single [`ToSql`] value.
    pub fn scalar<T: ToSql + ?Sized>(value: &T) -> std::result::Result<Self, TypeError> {
        value.to_sql().map(Self::Scalar)
    }

    /// Build the parameter object for a call with these arguments.
    ///
    /// With no arguments there are no parameters. A single unnamed argument
    /// is passed through untouched. Otherwise the entries of a leading map
    /// argument and every named argument are merged into one map; other
    /// unnamed arguments are dropped.
    #[must_use]
    pub fn from_args(args: Vec<Arg<'a>>) -> Self {
        let mut args = args.into_iter();
        let Some(first) = args.next() else {
            return Self::None;
        };
        if args.len() == 0 {
            if let Arg::Unnamed(params) = first {
                return params;
            }
        }

        let mut merged = match first {
            Arg::Unnamed(Self::Named(map)) => map,
            Arg::Named(name, value) => ParamMap::new().with(name, value),
            Arg::Unnamed(_) => ParamMap::new(),
        };
        for arg in args {
            if let Arg::Named(name, value) = arg {
                merged.insert(name, value);
            }
        }
        Self::Named(merged)
    }

    /// Resolve one placeholder. `statement` names the mapping in errors.
    pub fn resolve(&self, name: &str, statement: &str) -> Result<SqlValue> {
        let value = match self {
            Self::None => None,
            Self::Scalar(value) => Some(value.clone()),
            Self::Source(source) => source.lookup(name)?,
            Self::Named(map) => map.get(name).cloned(),
        };
        value.ok_or_else(|| Error::binding(name, statement))
    }

    /// Whether there is no parameter object at all.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl std::fmt::Debug for Params<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Scalar(v) => f.debug_tuple("Scalar").field(v).finish(),
            Self::Source(_) => f.write_str("Source(..)"),
            Self::Named(map) => f.debug_tuple("Named").field(map).finish(),
        }
    }
}

impl From<()> for Params<'_> {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<SqlValue> for Params<'_> {
    fn from(value: SqlValue) -> Self {
        Self::Scalar(value)
    }
}

impl From<ParamMap> for Params<'_> {
    fn from(map: ParamMap) -> Self {
        Self::Named(map)
    }
}

impl<'a, T: ParamSource> From<&'a T> for Params<'a> {
    fn from(source: &'a T) -> Self {
        Self::Source(source)
    }
}

/// One argument of a mapper call; see [`Params::from_args`].
#[derive(Debug, Clone)]
pub enum Arg<'a> {
    /// An argument without an explicit parameter name.
    Unnamed(Params<'a>),
    /// An argument bound to an explicit parameter name.
    Named(String, SqlValue),
}

impl<'a> Arg<'a> {
    /// An unnamed argument.
    pub fn value(params: impl Into<Params<'a>>) -> Self {
        Self::Unnamed(params.into())
    }

    /// A named argument.
    pub fn named(name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::Named(name.into(), value.into())
    }
}
