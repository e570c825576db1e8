use futures::future::try_join_all;
use serde_json::{Map, Value};

use crate::{
    CollectionRouter, Directory, Error, Info, InfoWrite, Result, TimeSource, check_uid,
    merge_for_response,
    model::{KEY_FIELD, UID_FIELD},
    store::{Filter, Update},
};

fn require(uid: &str, key: &str) -> Result<()> {
    if uid.is_empty() {
        return Err(Error::missing(UID_FIELD));
    }
    if key.is_empty() {
        return Err(Error::missing(KEY_FIELD));
    }
    check_uid(uid)
}

impl<T> Directory<T>
where
    T: TimeSource<u64>,
{
    /// Merges `info` into the record stored under `(uid, key)`, creating it
    /// on first write. An empty `info` only reads the record.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, info), fields(fields = info.len()), err)
    )]
    pub async fn set_info(&self, uid: &str, key: &str, info: Map<String, Value>) -> Result<Info> {
        require(uid, key)?;

        match InfoWrite::plan(&info) {
            InfoWrite::Read => self.read_info(uid, key).await,
            InfoWrite::Upsert { set } => {
                let update = Update {
                    set,
                    unset: Vec::new(),
                    set_on_insert: vec![
                        (UID_FIELD.to_string(), Value::from(uid)),
                        (KEY_FIELD.to_string(), Value::from(key)),
                    ],
                };
                let filter = Filter::by_id(CollectionRouter::info_document_id(uid, key));
                let stored = self
                    .store
                    .find_one_and_update(&self.infos(uid), &filter, &update, true)
                    .await?;
                let merged = merge_for_response(stored, &info);
                Ok(Info::from_document(uid, key, &merged))
            }
        }
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), err))]
    pub async fn get_info(&self, uid: &str, key: &str) -> Result<Info> {
        require(uid, key)?;
        self.read_info(uid, key).await
    }

    /// Reads `key` for every user in `uids`, concurrently. One slot per input
    /// in input order; misses and empty IDs are `None`. A malformed uid or
    /// any store failure fails the whole batch.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, uids), fields(count = uids.len()), err)
    )]
    pub async fn batch_get_info(&self, uids: &[String], key: &str) -> Result<Vec<Option<Info>>> {
        if key.is_empty() {
            return Err(Error::missing(KEY_FIELD));
        }
        uids.iter().try_for_each(|uid| check_uid(uid))?;

        try_join_all(uids.iter().map(|uid| self.find_info(uid, key))).await
    }

    async fn read_info(&self, uid: &str, key: &str) -> Result<Info> {
        self.find_info(uid, key)
            .await?
            .ok_or(Error::NotFound { what: "info" })
    }

    async fn find_info(&self, uid: &str, key: &str) -> Result<Option<Info>> {
        if uid.is_empty() {
            return Ok(None);
        }
        let filter = Filter::by_id(CollectionRouter::info_document_id(uid, key));
        let doc = self.store.find_one(&self.infos(uid), &filter).await?;
        Ok(doc.map(|doc| Info::from_document(uid, key, &doc)))
    }
}
