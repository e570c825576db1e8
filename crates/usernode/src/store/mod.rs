//! Document store abstraction.
//!
//! The directory talks to its backing database only through
//! [`DocumentStore`]. Documents are JSON objects; filters and updates are
//! small store-neutral descriptions that each backend translates into its own
//! query language.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: process-local, used for tests and development.
//! - `MongoStore` (feature `mongodb`): MongoDB via the official driver.

mod error;
mod memory;
#[cfg(feature = "mongodb")]
mod mongo;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A stored document. `_id` is the primary key.
pub type Document = Map<String, Value>;

/// Primary-key field name.
pub const ID_FIELD: &str = "_id";

/// Addresses one collection inside one database.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub db: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
        }
    }
}

/// A predicate on one (possibly dotted) field path.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
    /// Pattern match on a string field. The pattern dialect and case
    /// sensitivity are defined by the backend: [`MemoryStore`] matches
    /// substrings case-sensitively, MongoDB evaluates `$regex`.
    Matches(String),
}

/// Conjunction of field conditions. An empty filter matches every document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses
            .push((field.into(), Condition::Eq(value.into())));
        self
    }

    pub fn any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.clauses.push((field.into(), Condition::In(values)));
        self
    }

    pub fn matches(mut self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.clauses
            .push((field.into(), Condition::Matches(pattern.into())));
        self
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// A partial update. Field paths may be dotted (`info.theme`) to reach into
/// nested objects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    pub set: Vec<(String, Value)>,
    pub unset: Vec<String>,
    /// Applied only when an upsert inserts a new document.
    pub set_on_insert: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    pub fn set_on_insert(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_on_insert.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.set_on_insert.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// A single-field index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub field: String,
    pub order: SortOrder,
    pub unique: bool,
    /// Documents without the field are left out of the index, so they never
    /// conflict with each other.
    pub sparse: bool,
}

impl IndexSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        let field = field.into();
        let name = match order {
            SortOrder::Ascending => format!("{field}_1"),
            SortOrder::Descending => format!("{field}_-1"),
        };
        Self {
            name,
            field,
            order,
            unique: false,
            sparse: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }
}

/// The operations the directory needs from a document database.
///
/// Misses are reported as `Ok(None)`; uniqueness violations as
/// [`StoreError::Duplicate`]; everything else as another [`StoreError`].
/// Implementations must be safe to share between concurrent request tasks
/// and must not hold any resource beyond a single call.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents matching `filter`, honouring sort, skip and limit.
    async fn find(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, ns: &Namespace, filter: &Filter)
    -> Result<Option<Document>, StoreError>;

    /// Atomically applies `update` to the first document matching `filter`.
    ///
    /// With `upsert`, a miss inserts a new document built from the filter's
    /// equality clauses plus the update. Returns the document as the backend
    /// reports it after the write, which may omit fields; `None` means no
    /// document matched and none was inserted, or the backend did not return
    /// one.
    async fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<Option<Document>, StoreError>;

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<(), StoreError>;

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError>;

    /// Creates the given indexes if they do not exist yet.
    async fn ensure_indexes(&self, ns: &Namespace, indexes: &[IndexSpec])
    -> Result<(), StoreError>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn find(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        (**self).find(ns, filter, options).await
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        (**self).find_one(ns, filter).await
    }

    async fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<Option<Document>, StoreError> {
        (**self).find_one_and_update(ns, filter, update, upsert).await
    }

    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<(), StoreError> {
        (**self).insert_one(ns, doc).await
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        (**self).count(ns, filter).await
    }

    async fn ensure_indexes(
        &self,
        ns: &Namespace,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        (**self).ensure_indexes(ns, indexes).await
    }
}
