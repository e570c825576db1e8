//! Transport-independent request handling.
//!
//! [`Directory`] owns everything a request needs: the store handle, the ID
//! generator, the collection router and the query planner. Each public method
//! corresponds to one RPC. Methods validate their input before touching the
//! store and report every outcome through [`Error`](crate::Error).

mod info;
mod user;


pub use user::UserWrite;

use std::sync::Arc;

use crate::{
    CollectionRouter, DEFAULT_PAGE_SIZE, DEFAULT_SHARD_PREFIX_LEN, DEFAULT_TEXT_FIELD,
    IdNode, MonotonicClock, PrefixShard, QueryPlanner, Result, TimeSource, USERNODE_EPOCH,
    UserIdGenerator,
    model::{CTIME_FIELD, NAME_FIELD, NICK_FIELD},
    next_user_id,
    store::{DocumentStore, IndexSpec, Namespace, SortOrder},
};

/// Static settings of one directory instance.
#[derive(Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Area and node baked into every generated ID.
    pub node: IdNode,
    /// Database holding every collection.
    pub db: String,
    /// Prepended to every collection name.
    pub prefix: String,
    /// Mixed into every secured password. Changing it invalidates all stored
    /// credentials.
    pub secret: String,
    pub default_page_size: u64,
    pub shard_prefix_len: usize,
    /// Field matched by the free-text query.
    pub text_field: String,
}

impl core::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("node", &self.node)
            .field("db", &self.db)
            .field("prefix", &self.prefix)
            .field("secret", &"<redacted>")
            .field("default_page_size", &self.default_page_size)
            .field("shard_prefix_len", &self.shard_prefix_len)
            .field("text_field", &self.text_field)
            .finish()
    }
}

impl DirectoryConfig {
    pub fn new(node: IdNode, db: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            node,
            db: db.into(),
            prefix: String::new(),
            secret: secret.into(),
            default_page_size: DEFAULT_PAGE_SIZE,
            shard_prefix_len: DEFAULT_SHARD_PREFIX_LEN,
            text_field: DEFAULT_TEXT_FIELD.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

/// User directory bound to one store.
///
/// Cheap to share behind an [`Arc`]; all methods take `&self`.
pub struct Directory<T = MonotonicClock>
where
    T: TimeSource<u64>,
{
    store: Arc<dyn DocumentStore>,
    db: String,
    secret: String,
    router: CollectionRouter,
    ids: UserIdGenerator<T>,
    planner: QueryPlanner,
}

impl Directory {
    pub fn new(config: DirectoryConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self::with_clock(config, store, MonotonicClock::with_epoch(USERNODE_EPOCH))
    }
}

impl<T> Directory<T>
where
    T: TimeSource<u64>,
{
    pub fn with_clock(config: DirectoryConfig, store: Arc<dyn DocumentStore>, clock: T) -> Self {
        let DirectoryConfig {
            node,
            db,
            prefix,
            secret,
            default_page_size,
            shard_prefix_len,
            text_field,
        } = config;
        Self {
            store,
            db,
            secret,
            router: CollectionRouter::with_strategy(prefix, PrefixShard::new(shard_prefix_len)),
            ids: UserIdGenerator::new(node.machine_id(), clock),
            planner: QueryPlanner::new(default_page_size, text_field),
        }
    }

    pub fn router(&self) -> &CollectionRouter {
        &self.router
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Issues a fresh user ID.
    pub fn new_id(&self) -> Result<String> {
        next_user_id(&self.ids).map(|id| id.to_base36())
    }

    /// Creates the user collection's indexes: unique `name`, unique sparse
    /// `nick`, descending `ctime`. Safe to call on every startup.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), err))]
    pub async fn init(&self) -> Result<()> {
        let indexes = [
            IndexSpec::new(NAME_FIELD, SortOrder::Ascending).unique(),
            IndexSpec::new(NICK_FIELD, SortOrder::Ascending)
                .unique()
                .sparse(),
            IndexSpec::new(CTIME_FIELD, SortOrder::Descending),
        ];
        self.store
            .ensure_indexes(&self.users(), &indexes)
            .await?;
        Ok(())
    }

    fn users(&self) -> Namespace {
        Namespace::new(self.db.as_str(), self.router.user_collection())
    }

    fn infos(&self, uid: &str) -> Namespace {
        Namespace::new(self.db.as_str(), self.router.info_collection(uid))
    }
}
