//! Mapping entries and the raw statement store.
//!
//! A [`MappingEntry`] ties a fully-qualified id (`namespace.operation`) to a
//! SQL template and, optionally, the result type its rows map into. The
//! template is parsed when the entry is created, so a malformed placeholder
//! surfaces at registration instead of on the first call.
//!
//! [`StatementStore`] holds the entries. Entries can be registered up front
//! through the builder or pulled lazily from a [`MappingSource`], which is
//! asked for each known namespace at most once per process. Entries a source
//! returns for a different namespace are ignored.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::params::Params;
use crate::placeholder::{BoundStatement, ParsedTemplate};

/// Build the fully-qualified id `namespace.operation`.
#[must_use]
pub fn statement_id(namespace: &str, operation: &str) -> String {
    format!("{namespace}.{operation}")
}

/// The namespace part of a mapping id: everything before the last `.`.
fn namespace_of(id: &str) -> Option<&str> {
    id.rsplit_once('.').map(|(ns, _)| ns)
}

/// One parsed mapping entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    id: String,
    template: String,
    result_type: Option<String>,
    parsed: ParsedTemplate,
}

impl MappingEntry {
    /// Parse `template` and register it under `id`.
    ///
    /// Fails with [`Error::InvalidPlaceholder`] when a placeholder name is
    /// empty or uses characters outside `[A-Za-z0-9_$]`.
    pub fn new(id: impl Into<String>, template: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let template = template.into();
        let parsed = ParsedTemplate::parse(&template, &id)?;
        Ok(Self {
            id,
            template,
            result_type: None,
            parsed,
        })
    }

    /// Declare the type rows of this statement map into.
    #[must_use]
    pub fn result_type(mut self, type_name: impl Into<String>) -> Self {
        self.result_type = Some(type_name.into());
        self
    }

    /// Rewrite camelCase identifiers outside placeholders and quotes to
    /// snake_case before execution. Off by default.
    #[must_use]
    pub fn snake_case_identifiers(mut self, enabled: bool) -> Self {
        if let Ok(parsed) = ParsedTemplate::parse(&self.template, &self.id) {
            self.parsed = if enabled {
                parsed.with_snake_case_identifiers()
            } else {
                parsed
            };
        }
        self
    }

    /// Fully-qualified id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Namespace part of the id.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        namespace_of(&self.id)
    }

    /// The template as registered.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The declared result type, if any.
    #[must_use]
    pub fn declared_result_type(&self) -> Option<&str> {
        self.result_type.as_deref()
    }

    /// The parsed template.
    #[must_use]
    pub fn parsed(&self) -> &ParsedTemplate {
        &self.parsed
    }

    /// Bind this entry's placeholders against `params`.
    pub fn bind(&self, params: &Params<'_>) -> Result<BoundStatement> {
        BoundStatement::bind(&self.parsed, params, &self.id)
    }
}

/// External collaborator that supplies mapping entries per namespace.
///
/// Implemented for closures, which is handy in tests:
///
/// ```rust,ignore
/// let source = |ns: &str| -> minibatis::Result<Vec<MappingEntry>> {
///     Ok(vec![MappingEntry::new(statement_id(ns, "count"), "select count(*) from t_user")?])
/// };
/// ```
pub trait MappingSource: Send + Sync {
    /// Load every entry of `namespace`. An unknown namespace yields an
    /// empty list, not an error.
    fn load_namespace(&self, namespace: &str) -> Result<Vec<MappingEntry>>;
}

impl<F> MappingSource for F
where
    F: Fn(&str) -> Result<Vec<MappingEntry>> + Send + Sync,
{
    fn load_namespace(&self, namespace: &str) -> Result<Vec<MappingEntry>> {
        self(namespace)
    }
}

type EntryMap = HashMap<String, Arc<MappingEntry>>;

/// Mapping id → entry table.
///
/// Reads never block each other. Lazily loaded namespaces are initialised
/// under a one-time guard; a failed load is retried on the next lookup.
pub struct StatementStore {
    entries: EntryMap,
    source: Option<Arc<dyn MappingSource>>,
    loaded: RwLock<HashMap<String, Arc<OnceCell<EntryMap>>>>,
}

impl StatementStore {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> StatementStoreBuilder {
        StatementStoreBuilder::default()
    }

    /// Look up an entry by fully-qualified id.
    ///
    /// Entries registered through the builder take precedence over those
    /// the mapping source supplies for the same id.
    pub fn get(&self, id: &str) -> Result<Arc<MappingEntry>> {
        if let Some(entry) = self.entries.get(id) {
            return Ok(Arc::clone(entry));
        }

        match (&self.source, namespace_of(id)) {
            (Some(source), Some(namespace)) => self.load(source.as_ref(), namespace, id),
            _ => Err(Error::StatementNotFound(id.to_owned())),
        }
    }

    fn load(
        &self,
        source: &dyn MappingSource,
        namespace: &str,
        id: &str,
    ) -> Result<Arc<MappingEntry>> {
        let cell = {
            let loaded = self.loaded.read();
            loaded.get(namespace).cloned()
        };
        let cell = match cell {
            Some(cell) => cell,
            None => Arc::clone(
                self.loaded
                    .write()
                    .entry(namespace.to_owned())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            ),
        };

        let entries = cell.get_or_try_init(|| {
            let loaded = source.load_namespace(namespace).inspect_err(|e| {
                tracing::warn!(namespace, error = %e, "failed to load mapping namespace");
            })?;
            let (own, foreign): (Vec<_>, Vec<_>) = loaded
                .into_iter()
                .partition(|entry| namespace_of(&entry.id) == Some(namespace));
            for entry in &foreign {
                tracing::debug!(namespace, id = entry.id(), "ignoring entry outside namespace");
            }
            tracing::info!(namespace, entries = own.len(), "loaded mapping namespace");
            Ok::<_, Error>(index(own))
        })?;

        // Unknown namespaces are not remembered.
        if entries.is_empty() {
            self.loaded.write().remove(namespace);
        }

        entries
            .get(id)
            .cloned()
            .ok_or_else(|| Error::StatementNotFound(id.to_owned()))
    }

    /// Whether an entry is registered eagerly under `id`.
    ///
    /// Does not consult the mapping source.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of eagerly registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were registered eagerly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of eagerly registered entries, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for StatementStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementStore")
            .field("entries", &self.entries.len())
            .field("has_source", &self.source.is_some())
            .field("loaded_namespaces", &self.loaded.read().len())
            .finish()
    }
}

fn index(entries: Vec<MappingEntry>) -> EntryMap {
    let mut map = EntryMap::with_capacity(entries.len());
    for entry in entries {
        if let Some(previous) = map.insert(entry.id.clone(), Arc::new(entry)) {
            tracing::debug!(id = previous.id(), "mapping entry replaced by later registration");
        }
    }
    map
}

/// Builder for [`StatementStore`].
#[derive(Default)]
pub struct StatementStoreBuilder {
    entries: Vec<MappingEntry>,
    source: Option<Arc<dyn MappingSource>>,
}

impl StatementStoreBuilder {
    /// Register one entry. A later entry with the same id replaces it.
    #[must_use]
    pub fn entry(mut self, entry: MappingEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Register several entries.
    #[must_use]
    pub fn entries(mut self, entries: impl IntoIterator<Item = MappingEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Consult `source` for ids not registered eagerly.
    #[must_use]
    pub fn source(mut self, source: Arc<dyn MappingSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Build the store.
    #[must_use]
    pub fn build(self) -> StatementStore {
        StatementStore {
            entries: index(self.entries),
            source: self.source,
            loaded: RwLock::new(HashMap::new()),
        }
    }
}

impl fmt::Debug for StatementStoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementStoreBuilder")
            .field("entries", &self.entries.len())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
