//! MongoDB-backed [`DocumentStore`].

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection, IndexModel,
    bson::{self, Bson, doc},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use serde_json::Value;

use super::{
    Condition, Document, DocumentStore, Filter, FindOptions, IndexSpec, Namespace, SortOrder,
    StoreError, Update,
};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Connects using a `mongodb://` or `mongodb+srv://` URI. The driver
    /// connects lazily, so an unreachable server surfaces on first use.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(StoreError::backend)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn collection(&self, ns: &Namespace) -> Collection<bson::Document> {
        self.client.database(&ns.db).collection(&ns.collection)
    }
}

fn to_bson(value: &Value) -> Result<Bson, StoreError> {
    bson::to_bson(value).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

fn to_bson_document(doc: &Document) -> Result<bson::Document, StoreError> {
    bson::to_document(doc).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

fn from_bson_document(doc: bson::Document) -> Result<Document, StoreError> {
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn order(order: SortOrder) -> i32 {
    match order {
        SortOrder::Ascending => 1,
        SortOrder::Descending => -1,
    }
}

fn filter_document(filter: &Filter) -> Result<bson::Document, StoreError> {
    let mut out = bson::Document::new();
    for (field, condition) in filter.clauses() {
        let clause = match condition {
            Condition::Eq(value) => to_bson(value)?,
            Condition::In(values) => {
                let values = values.iter().map(to_bson).collect::<Result<Vec<_>, _>>()?;
                Bson::Document(doc! { "$in": values })
            }
            Condition::Matches(pattern) => Bson::Document(doc! { "$regex": pattern.as_str() }),
        };
        out.insert(field.as_str(), clause);
    }
    Ok(out)
}

fn update_document(update: &Update) -> Result<bson::Document, StoreError> {
    let fields = |pairs: &[(String, Value)]| -> Result<bson::Document, StoreError> {
        let mut out = bson::Document::new();
        for (path, value) in pairs {
            out.insert(path.as_str(), to_bson(value)?);
        }
        Ok(out)
    };

    let mut out = bson::Document::new();
    if !update.set.is_empty() {
        out.insert("$set", fields(&update.set)?);
    }
    if !update.unset.is_empty() {
        let unset: bson::Document = update
            .unset
            .iter()
            .map(|path| (path.clone(), Bson::String(String::new())))
            .collect();
        out.insert("$unset", unset);
    }
    if !update.set_on_insert.is_empty() {
        out.insert("$setOnInsert", fields(&update.set_on_insert)?);
    }
    Ok(out)
}

fn map_error(err: mongodb::error::Error) -> StoreError {
    let duplicate_index = |message: &str| {
        message
            .split("index: ")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or_default()
            .to_string()
    };
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => {
            StoreError::Duplicate {
                index: duplicate_index(&e.message),
            }
        }
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY => StoreError::Duplicate {
            index: duplicate_index(&e.message),
        },
        _ => StoreError::backend(err),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self, filter, options)))]
    async fn find(
        &self,
        ns: &Namespace,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let collection = self.collection(ns);
        let mut action = collection.find(filter_document(filter)?);
        if !options.sort.is_empty() {
            let sort: bson::Document = options
                .sort
                .iter()
                .map(|(field, dir)| (field.clone(), Bson::Int32(order(*dir))))
                .collect();
            action = action.sort(sort);
        }
        if let Some(skip) = options.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = options.limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let docs: Vec<bson::Document> = action
            .await
            .map_err(map_error)?
            .try_collect()
            .await
            .map_err(map_error)?;
        docs.into_iter().map(from_bson_document).collect()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self, filter)))]
    async fn find_one(
        &self,
        ns: &Namespace,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        self.collection(ns)
            .find_one(filter_document(filter)?)
            .await
            .map_err(map_error)?
            .map(from_bson_document)
            .transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self, filter, update)))]
    async fn find_one_and_update(
        &self,
        ns: &Namespace,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<Option<Document>, StoreError> {
        self.collection(ns)
            .find_one_and_update(filter_document(filter)?, update_document(update)?)
            .upsert(upsert)
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_error)?
            .map(from_bson_document)
            .transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self, doc)))]
    async fn insert_one(&self, ns: &Namespace, doc: Document) -> Result<(), StoreError> {
        self.collection(ns)
            .insert_one(to_bson_document(&doc)?)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn count(&self, ns: &Namespace, filter: &Filter) -> Result<u64, StoreError> {
        self.collection(ns)
            .count_documents(filter_document(filter)?)
            .await
            .map_err(map_error)
    }

    async fn ensure_indexes(
        &self,
        ns: &Namespace,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        let models = indexes.iter().map(|index| {
            let options = IndexOptions::builder()
                .name(index.name.clone())
                .unique(index.unique)
                .sparse(index.sparse)
                .build();
            let mut keys = bson::Document::new();
            keys.insert(index.field.as_str(), order(index.order));
            IndexModel::builder()
                .keys(keys)
                .options(options)
                .build()
        });
        self.collection(ns)
            .create_indexes(models)
            .await
            .map_err(map_error)?;
        Ok(())
    }
}
