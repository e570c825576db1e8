//! Conversions between protobuf messages and `usernode` domain types.
//!
//! Requests map onto the directory's input types with empty strings standing
//! for "not supplied" where the message has no explicit presence. Responses
//! carry info objects as JSON text.

use serde_json::Value;
use usernode::{NewUser, PageDescriptor, UserLookup, UserPatch, UserQuery};

use crate::proto;

fn present(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl From<usernode::User> for proto::User {
    fn from(user: usernode::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            nick: user.nick.unwrap_or_default(),
            ctime: user.ctime,
        }
    }
}

impl From<usernode::Info> for proto::Info {
    fn from(info: usernode::Info) -> Self {
        Self {
            uid: info.uid,
            key: info.key,
            info: Value::Object(info.info).to_string(),
        }
    }
}

impl From<PageDescriptor> for proto::Page {
    fn from(page: PageDescriptor) -> Self {
        Self {
            page: saturating_i64(page.page),
            page_size: saturating_i64(page.page_size),
            total_count: saturating_i64(page.total_count),
            page_count: saturating_i64(page.page_count),
        }
    }
}

impl From<proto::UserCreateTask> for NewUser {
    fn from(task: proto::UserCreateTask) -> Self {
        Self {
            name: task.name,
            nick: present(task.nick),
            password: present(task.password),
            id: present(task.id),
        }
    }
}

impl From<proto::UserSetTask> for UserPatch {
    fn from(task: proto::UserSetTask) -> Self {
        Self {
            uid: task.uid,
            name: task.name,
            nick: task.nick,
            password: task.password,
        }
    }
}

impl From<proto::UserGetTask> for UserLookup {
    fn from(task: proto::UserGetTask) -> Self {
        Self {
            uid: task.uid,
            name: task.name,
            nick: task.nick,
            auto_create: task.auto_create,
        }
    }
}

impl From<proto::UserQueryTask> for UserQuery {
    fn from(task: proto::UserQueryTask) -> Self {
        Self {
            page: task.p,
            page_size: task.n,
            text: task.q,
        }
    }
}
