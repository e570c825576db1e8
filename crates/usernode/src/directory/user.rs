use std::collections::HashMap;

use serde_json::Value;

use crate::{
    Directory, Error, NewUser, Result, TimeSource, User, UserLookup, UserPage, UserPatch,
    UserQuery, check_uid, generate_password,
    model::{CTIME_FIELD, NAME_FIELD, NICK_FIELD, PASSWORD_FIELD},
    secure,
    store::{Document, Filter, FindOptions, ID_FIELD, StoreError, Update},
    unix_seconds,
};

/// How a user patch reaches the store.
#[derive(Clone, Debug, PartialEq)]
pub enum UserWrite {
    /// Nothing to change: plain lookup by ID, which may miss.
    Read,
    /// One atomic upsert by ID. Never misses.
    Upsert(Update),
}

impl UserWrite {
    /// Builds the write for `patch`, securing any new password with `secret`.
    ///
    /// An empty `nick` removes the field instead of storing `""`, so the
    /// sparse unique index keeps ignoring users without one.
    pub fn plan(patch: &UserPatch, secret: &str, now: i64) -> Self {
        let mut update = Update::new();
        if let Some(name) = &patch.name {
            update = update.set(NAME_FIELD, name.as_str());
        }
        match patch.nick.as_deref() {
            Some("") => update = update.unset(NICK_FIELD),
            Some(nick) => update = update.set(NICK_FIELD, nick),
            None => {}
        }
        if let Some(password) = &patch.password {
            update = update.set(PASSWORD_FIELD, secure(password, secret));
        }
        if update.is_empty() {
            Self::Read
        } else {
            Self::Upsert(update.set_on_insert(CTIME_FIELD, now))
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

impl<T> Directory<T>
where
    T: TimeSource<u64>,
{
    /// Inserts a new user. A missing ID or password is generated; the
    /// password is stored secured.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(name = %user.name), err)
    )]
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        if user.name.is_empty() {
            return Err(Error::missing(NAME_FIELD));
        }

        let id = match non_empty(user.id.as_deref()) {
            Some(id) => {
                check_uid(id)?;
                id.to_owned()
            }
            None => self.new_id()?,
        };
        let password = match non_empty(user.password.as_deref()) {
            Some(password) => password.to_owned(),
            None => generate_password(),
        };

        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), Value::from(id));
        doc.insert(NAME_FIELD.to_string(), Value::from(user.name));
        if let Some(nick) = non_empty(user.nick.as_deref()) {
            doc.insert(NICK_FIELD.to_string(), Value::from(nick));
        }
        doc.insert(
            PASSWORD_FIELD.to_string(),
            Value::from(secure(&password, &self.secret)),
        );
        doc.insert(CTIME_FIELD.to_string(), Value::from(unix_seconds()));

        let created = User::from_document(&doc);
        self.store.insert_one(&self.users(), doc).await?;
        Ok(created)
    }

    /// Applies a partial update to the user `patch.uid`.
    ///
    /// With nothing to change this is a lookup and can miss. Otherwise the
    /// record is upserted and the response reflects the written fields.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(uid = %patch.uid), err)
    )]
    pub async fn set_user(&self, patch: UserPatch) -> Result<User> {
        if patch.uid.is_empty() {
            return Err(Error::missing("uid"));
        }
        check_uid(&patch.uid)?;
        if patch.name.as_deref() == Some("") {
            return Err(Error::missing(NAME_FIELD));
        }
        if patch.password.as_deref() == Some("") {
            return Err(Error::missing(PASSWORD_FIELD));
        }

        let users = self.users();
        let filter = Filter::by_id(patch.uid.as_str());
        match UserWrite::plan(&patch, &self.secret, unix_seconds()) {
            UserWrite::Read => self
                .store
                .find_one(&users, &filter)
                .await?
                .map(|doc| User::from_document(&doc))
                .ok_or(Error::NotFound { what: "user" }),
            UserWrite::Upsert(update) => {
                let stored = self
                    .store
                    .find_one_and_update(&users, &filter, &update, true)
                    .await?;
                let mut user = stored
                    .map(|doc| User::from_document(&doc))
                    .unwrap_or_default();
                user.id = patch.uid;
                if let Some(name) = patch.name {
                    user.name = name;
                }
                if let Some(nick) = patch.nick {
                    user.nick = Some(nick).filter(|nick| !nick.is_empty());
                }
                Ok(user)
            }
        }
    }

    /// Looks a user up by any combination of ID, name and nick.
    ///
    /// On a miss with `auto_create` and a name alone, the user is created by
    /// name in one atomic step. Concurrent callers racing on the same name all
    /// end up with the single stored record. A miss that also named a uid or
    /// nick stays a miss, since the record found by name would not match.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), err))]
    pub async fn get_user(&self, lookup: UserLookup) -> Result<User> {
        let mut filter = Filter::new();
        if !lookup.uid.is_empty() {
            filter = filter.eq(ID_FIELD, lookup.uid.as_str());
        }
        if !lookup.name.is_empty() {
            filter = filter.eq(NAME_FIELD, lookup.name.as_str());
        }
        if !lookup.nick.is_empty() {
            filter = filter.eq(NICK_FIELD, lookup.nick.as_str());
        }
        if filter.is_empty() {
            return Err(Error::missing("uid / name / nick"));
        }

        let users = self.users();
        if let Some(doc) = self.store.find_one(&users, &filter).await? {
            return Ok(User::from_document(&doc));
        }
        let by_name_only = lookup.uid.is_empty() && lookup.nick.is_empty();
        if !lookup.auto_create || lookup.name.is_empty() || !by_name_only {
            return Err(Error::NotFound { what: "user" });
        }

        let by_name = Filter::new().eq(NAME_FIELD, lookup.name.as_str());
        let update = Update::new()
            .set_on_insert(ID_FIELD, self.new_id()?)
            .set_on_insert(
                PASSWORD_FIELD,
                secure(&generate_password(), &self.secret),
            )
            .set_on_insert(CTIME_FIELD, unix_seconds());

        let stored = match self
            .store
            .find_one_and_update(&users, &by_name, &update, true)
            .await
        {
            Ok(Some(doc)) => Some(doc),
            // Another request inserted the same name first; return its record.
            Ok(None) | Err(StoreError::Duplicate { .. }) => {
                self.store.find_one(&users, &by_name).await?
            }
            Err(err) => return Err(err.into()),
        };
        stored
            .map(|doc| User::from_document(&doc))
            .ok_or(Error::NotFound { what: "user" })
    }

    /// Lists users newest first, optionally paged and filtered by text.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self), err))]
    pub async fn query_users(&self, query: UserQuery) -> Result<UserPage> {
        let plan = self
            .planner
            .plan(query.page, query.page_size, &query.text);
        let users = self.users();

        let total = if plan.needs_count() {
            self.store.count(&users, &plan.filter).await?
        } else {
            0
        };
        let items = self
            .store
            .find(&users, &plan.filter, &plan.options)
            .await?
            .iter()
            .map(User::from_document)
            .collect();

        Ok(UserPage {
            items,
            page: plan.describe(total),
        })
    }

    /// Checks a name and password pair.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, password), err)
    )]
    pub async fn login(&self, name: &str, password: &str) -> Result<User> {
        if name.is_empty() {
            return Err(Error::missing(NAME_FIELD));
        }
        if password.is_empty() {
            return Err(Error::missing(PASSWORD_FIELD));
        }

        let filter = Filter::new()
            .eq(NAME_FIELD, name)
            .eq(PASSWORD_FIELD, secure(password, &self.secret));
        self.store
            .find_one(&self.users(), &filter)
            .await?
            .map(|doc| User::from_document(&doc))
            .ok_or(Error::AuthFailed)
    }

    /// Fetches many users in one query. The result has one slot per input
    /// ID, in input order; misses are `None`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(count = uids.len()), err)
    )]
    pub async fn batch_get_users(&self, uids: &[String]) -> Result<Vec<Option<User>>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new().any_of(ID_FIELD, uids.iter().map(String::as_str));
        let found: HashMap<String, User> = self
            .store
            .find(&self.users(), &filter, &FindOptions::default())
            .await?
            .iter()
            .map(User::from_document)
            .map(|user| (user.id.clone(), user))
            .collect();

        Ok(uids.iter().map(|uid| found.get(uid).cloned()).collect())
    }
}
