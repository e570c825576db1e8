//! Logical entity to physical collection mapping.
//!
//! Users live in a single `"{prefix}user"` collection. Info records are
//! spread across `"{prefix}info_{shard}"` collections, where the shard is a
//! static function of the user ID. No shard map is persisted; every access
//! recomputes it.

use core::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Default number of leading `uid` characters used as the info shard.
pub const DEFAULT_SHARD_PREFIX_LEN: usize = 4;

/// Joins uid and key in an info record's `_id`.
pub const INFO_ID_SEPARATOR: char = '-';

/// Rejects user IDs that would make [`CollectionRouter::info_document_id`]
/// ambiguous. Generated IDs are base-36 and always pass.
pub fn check_uid(uid: &str) -> Result<()> {
    if uid.contains(INFO_ID_SEPARATOR) {
        return Err(Error::bad_input(format!(
            "invalid uid {uid}: must not contain '{INFO_ID_SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Picks the info shard for a user ID.
///
/// Implementations must be pure: the same `uid` always maps to the same
/// shard, otherwise previously written info records become unreachable.
pub trait ShardStrategy: Send + Sync + fmt::Debug {
    fn shard<'a>(&self, uid: &'a str) -> &'a str;
}

/// Shards by the first `len` characters of the user ID, or the whole ID when
/// it is not longer than `len`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixShard {
    len: usize,
}

impl PrefixShard {
    pub const fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Default for PrefixShard {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_PREFIX_LEN)
    }
}

impl ShardStrategy for PrefixShard {
    fn shard<'a>(&self, uid: &'a str) -> &'a str {
        // Cut on a char boundary; caller-supplied IDs need not be ASCII.
        match uid.char_indices().nth(self.len) {
            Some((end, _)) => &uid[..end],
            None => uid,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CollectionRouter {
    prefix: String,
    shard: Arc<dyn ShardStrategy>,
}

impl CollectionRouter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_strategy(prefix, PrefixShard::default())
    }

    pub fn with_strategy(prefix: impl Into<String>, shard: impl ShardStrategy + 'static) -> Self {
        Self {
            prefix: prefix.into(),
            shard: Arc::new(shard),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn user_collection(&self) -> String {
        format!("{}user", self.prefix)
    }

    pub fn info_collection(&self, uid: &str) -> String {
        format!("{}info_{}", self.prefix, self.shard.shard(uid))
    }

    /// Physical `_id` of the info record for `(uid, key)`.
    ///
    /// Unambiguous only for uids accepted by [`check_uid`].
    pub fn info_document_id(uid: &str, key: &str) -> String {
        format!("{uid}{INFO_ID_SEPARATOR}{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_collection_uses_prefix() {
        assert_eq!(CollectionRouter::new("uv_").user_collection(), "uv_user");
        assert_eq!(CollectionRouter::new("").user_collection(), "user");
    }

    #[test]
    fn short_uids_are_their_own_shard() {
        let router = CollectionRouter::new("uv_");
        assert_eq!(router.info_collection("ab"), "uv_info_ab");
        assert_eq!(router.info_collection("abcd"), "uv_info_abcd");
    }

    #[test]
    fn long_uids_shard_by_prefix() {
        let router = CollectionRouter::new("uv_");
        assert_eq!(router.info_collection("abcdefgh"), "uv_info_abcd");
        assert_eq!(
            router.info_collection("abcdefgh"),
            router.info_collection("abcdefgh")
        );
        assert_eq!(
            router.info_collection("abcdzzzz"),
            router.info_collection("abcd1234")
        );
    }

    #[test]
    fn prefix_is_cut_on_char_boundaries() {
        assert_eq!(PrefixShard::new(2).shard("äöü"), "äö");
    }

    #[test]
    fn prefix_length_is_configurable() {
        let router = CollectionRouter::with_strategy("", PrefixShard::new(2));
        assert_eq!(router.info_collection("abcdef"), "info_ab");
    }

    #[test]
    fn composite_ids_join_uid_and_key() {
        assert_eq!(CollectionRouter::info_document_id("u1", "profile"), "u1-profile");
    }

    #[test]
    fn uids_with_the_separator_are_rejected() {
        assert!(check_uid("k3x9a0b1").is_ok());
        assert!(matches!(check_uid("abcd-x"), Err(Error::BadInput { .. })));
    }
}
