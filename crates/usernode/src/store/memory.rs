//! Process-local document store.

use async_trait::async_trait;
use core::cmp::Ordering;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;

use super::{
    Condition, Document, DocumentStore, Filter, FindOptions, ID_FIELD, IndexSpec, Namespace,
    SortOrder, StoreError, Update,
};

static NULL: Value = Value::Null;

/// An in-memory [`DocumentStore`].
///
/// Every operation runs under one lock, which makes `find_one_and_update`
/// atomic in the same way a real database's single-document write is. Unique
/// indexes registered through `ensure_indexes` are enforced on insert and
/// update. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<Namespace, Collection>,
    next_id: u64,
}

#[derive(Debug, Default)]
struct Collection {
    docs: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    /// Assigns a generated `_id` when the document has none.
    fn ensure_id(&mut self, doc: &mut Document) {
        if !doc.contains_key(ID_FIELD) {
            self.next_id += 1;
            doc.insert(ID_FIELD.to_string(), Value::from(format!("{:024x}", self.next_id)));
        }
    }
}

impl Collection {
    /// Rejects `doc` if it clashes with any other document on `_id` or on a
    /// unique index. `replacing` is the position `doc` will overwrite.
    fn check_unique(&self, doc: &Document, replacing: Option<usize>) -> Result<(), StoreError> {
        let others = || {
            self.docs
                .iter()
                .enumerate()
                .filter(move |(i, _)| Some(*i) != replacing)
                .map(|(_, other)| other)
        };

        let id = doc.get(ID_FIELD);
        if others().any(|other| other.get(ID_FIELD) == id) {
            return Err(StoreError::Duplicate {
                index: "_id_".to_string(),
            });
        }

        for index in self.indexes.iter().filter(|index| index.unique) {
            let value = lookup(doc, &index.field);
            // Sparse indexes skip documents where the field is missing or null.
            if index.sparse && value.is_none_or(Value::is_null) {
                continue;
            }
            let value = value.unwrap_or(&NULL);
            let clash = others().any(|other| {
                let other = lookup(other, &index.field);
                !(index.sparse && other.is_none_or(Value::is_null))
                    && other.unwrap_or(&NULL) == value
            });
            if clash {
                return Err(StoreError::Duplicate {
                    index: index.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn set_path(doc: &mut Document, path: &str, value: Value) {
    let (head, last) = match path.rsplit_once('.') {
        Some((head, last)) => (Some(head), last),
        None => (None, path),
    };
    let mut target = doc;
    for part in head.into_iter().flat_map(|head| head.split('.')) {
        let slot = target
            .entry(part)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        target = next;
    }
    target.insert(last.to_string(), value);
}

fn remove_path(doc: &mut Document, path: &str) {
    let (head, last) = match path.rsplit_once('.') {
        Some((head, last)) => (Some(head), last),
        None => (None, path),
    };
    let mut target = doc;
    for part in head.into_iter().flat_map(|head| head.split('.')) {
        match target.get_mut(part) {
            Some(Value::Object(next)) => target = next,
            _ => return,
        }
    }
    target.remove(last);
}

fn apply(doc: &mut Document, update: &Update, inserting: bool) {
    for (path, value) in &update.set {
        set_path(doc, path, value.clone());
    }
    for path in &update.unset {
        remove_path(doc, path);
    }
    if inserting {
        for (path, value) in &update.set_on_insert {
            set_path(doc, path, value.clone());
        }
    }
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    filter.clauses().iter().all(|(field, condition)| {
        let value = lookup(doc, field).unwrap_or(&NULL);
        match condition {
            Condition::Eq(expected) => value == expected,
            Condition::In(candidates) => candidates.contains(value),
            Condition::Matches(pattern) => value
                .as_str()
                .is_some_and(|s| s.contains(pattern.as_str())),
        }
    })
}

/// Cross-type ordering: missing < null < numbers < strings < objects < arrays
/// < booleans.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Object(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Bool(_)) => 6,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_documents(docs: &mut [&Document], sort: &[(String, SortOrder)]) {
    docs.sort_by(|a, b| {
        sort.iter()
            .map(|(field, order)| {
                let ord = compare(lookup(a, field), lookup(b, field));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let inner = self.inner.lock();
        let Some(coll) = inner.collections.get(ns) else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<&Document> = coll.docs.iter().filter(|d| matches(d, filter)).collect();
        if !options.sort.is_empty() {
            sort_documents(&mut docs, &options.sort);
        }

        let skip = options.skip.unwrap_or(0) as usize;
        // A zero limit means "no limit", as in MongoDB.
        let limit = options
            .limit
            .filter(|&limit| limit > 0)
            .map_or(usize::MAX, |limit| limit as usize);

        Ok(docs.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .collections
            .get(ns)
            .and_then(|coll| coll.docs.iter().find(|d| matches(d, filter)))
            .cloned())
    }

    async fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<Option<Document>, StoreError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let coll = inner.collections.entry(ns.clone()).or_default();

        match coll.docs.iter().position(|d| matches(d, filter)) {
            Some(pos) => {
                let mut doc = coll.docs[pos].clone();
                apply(&mut doc, update, false);
                // `_id` is immutable once stored.
                if let Some(id) = coll.docs[pos].get(ID_FIELD).cloned() {
                    doc.insert(ID_FIELD.to_string(), id);
                }
                coll.check_unique(&doc, Some(pos))?;
                coll.docs[pos] = doc.clone();
                Ok(Some(doc))
            }
            None if upsert => {
                let mut doc = Document::new();
                for (field, condition) in filter.clauses() {
                    if let Condition::Eq(value) = condition {
                        set_path(&mut doc, field, value.clone());
                    }
                }
                apply(&mut doc, update, true);
                inner.ensure_id(&mut doc);
                let coll = inner.collections.entry(ns.clone()).or_default();
                coll.check_unique(&doc, None)?;
                coll.docs.push(doc.clone());
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn insert_one(&self, ns: &Namespace, mut doc: Document) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.ensure_id(&mut doc);
        let coll = inner.collections.entry(ns.clone()).or_default();
        coll.check_unique(&doc, None)?;
        coll.docs.push(doc);
        Ok(())
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.collections.get(ns).map_or(0, |coll| {
            coll.docs.iter().filter(|d| matches(d, filter)).count() as u64
        }))
    }

    async fn ensure_indexes(
        &self,
        ns: &Namespace,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let coll = inner.collections.entry(ns.clone()).or_default();
        for index in indexes {
            if !coll.indexes.iter().any(|existing| existing.name == index.name) {
                coll.indexes.push(index.clone());
            }
        }
        Ok(())
    }
}
