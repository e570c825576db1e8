//! Domain records and request shapes.

use serde_json::{Map, Value};

use crate::{
    INFO_FIELD, PageDescriptor,
    store::{Document, ID_FIELD},
};

pub(crate) const NAME_FIELD: &str = "name";
pub(crate) const NICK_FIELD: &str = "nick";
pub(crate) const PASSWORD_FIELD: &str = "password";
pub(crate) const CTIME_FIELD: &str = "ctime";
pub(crate) const UID_FIELD: &str = "uid";
pub(crate) const KEY_FIELD: &str = "key";

/// A user as returned to callers. The secured password never leaves the
/// store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub nick: Option<String>,
    /// Creation time, Unix seconds.
    pub ctime: i64,
}

impl User {
    /// Reads a user out of a stored document. Missing or mistyped fields fall
    /// back to their defaults.
    pub fn from_document(doc: &Document) -> Self {
        let text = |field: &str| doc.get(field).and_then(Value::as_str).map(str::to_owned);
        let id = match doc.get(ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Self {
            id,
            name: text(NAME_FIELD).unwrap_or_default(),
            nick: text(NICK_FIELD).filter(|nick| !nick.is_empty()),
            ctime: doc.get(CTIME_FIELD).and_then(Value::as_i64).unwrap_or_default(),
        }
    }
}

/// One info record: the caller's object stored under `(uid, key)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Info {
    pub uid: String,
    pub key: String,
    pub info: Map<String, Value>,
}

impl Info {
    pub fn from_document(uid: &str, key: &str, doc: &Document) -> Self {
        let info = match doc.get(INFO_FIELD) {
            Some(Value::Object(info)) => info.clone(),
            _ => Map::new(),
        };
        Self {
            uid: uid.to_owned(),
            key: key.to_owned(),
            info,
        }
    }
}

/// Input of [`Directory::create_user`](crate::Directory::create_user).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub nick: Option<String>,
    /// Generated when absent or empty.
    pub password: Option<String>,
    /// Generated when absent or empty.
    pub id: Option<String>,
}

/// Input of [`Directory::set_user`](crate::Directory::set_user). `None`
/// leaves a field untouched; `Some("")` on `nick` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub uid: String,
    pub name: Option<String>,
    pub nick: Option<String>,
    pub password: Option<String>,
}

/// Input of [`Directory::get_user`](crate::Directory::get_user). Empty
/// strings count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserLookup {
    pub uid: String,
    pub name: String,
    pub nick: String,
    pub auto_create: bool,
}

/// Input of [`Directory::query_users`](crate::Directory::query_users).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// 1-based; zero or negative disables paging.
    pub page: i64,
    /// Zero or negative selects the configured default.
    pub page_size: i64,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPage {
    pub items: Vec<User>,
    pub page: Option<PageDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_reads_known_fields() {
        let doc = json!({"_id": "abc", "name": "n", "nick": "k", "password": "x", "ctime": 7});
        let user = User::from_document(doc.as_object().unwrap());
        assert_eq!(
            user,
            User {
                id: "abc".into(),
                name: "n".into(),
                nick: Some("k".into()),
                ctime: 7,
            }
        );
    }

    #[test]
    fn user_tolerates_missing_fields() {
        let doc = json!({"_id": "abc"});
        let user = User::from_document(doc.as_object().unwrap());
        assert_eq!(user.name, "");
        assert_eq!(user.nick, None);
        assert_eq!(user.ctime, 0);
    }

    #[test]
    fn info_defaults_to_empty_object() {
        let doc = json!({"_id": "u-k"});
        let info = Info::from_document("u", "k", doc.as_object().unwrap());
        assert!(info.info.is_empty());
        assert_eq!((info.uid.as_str(), info.key.as_str()), ("u", "k"));
    }
}
