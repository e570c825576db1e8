//! Status codes and result-message construction for the gRPC service.
//!
//! Outcomes travel inside each result message as an `errno`/`errmsg` pair
//! rather than as a gRPC status. This module defines the code table
//! ([`Errno`]), the service-level [`Error`], and the [`Reply`] trait that
//! builds any result message from a `Result`.
//!
//! ## Error Cases
//! - `Directory`: a directory operation failed; its kind selects the code.
//! - `ServiceShutdown`: a request arrived while the service was shutting down.

use crate::proto::{
    InfoBatchGetResult, InfoEntry, InfoResult, LoginResult, UserBatchGetResult, UserEntry,
    UserQueryResult, UserResult,
};

pub type Result<T> = core::result::Result<T, Error>;

/// Numeric outcome carried in every result message.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Errno {
    Ok = 200,
    BadInput = 400,
    NotFound = 404,
    Internal = 500,
    IndexConflict = 600,
    AuthFailed = 601,
}

impl Errno {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            200 => Self::Ok,
            400 => Self::BadInput,
            404 => Self::NotFound,
            500 => Self::Internal,
            600 => Self::IndexConflict,
            601 => Self::AuthFailed,
            _ => return None,
        })
    }

    /// Short label, used as a metric attribute.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::BadInput => "bad_input",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
            Self::IndexConflict => "index_conflict",
            Self::AuthFailed => "auth_failed",
        }
    }
}

impl From<&usernode::Error> for Errno {
    fn from(err: &usernode::Error) -> Self {
        match err {
            usernode::Error::BadInput { .. } => Self::BadInput,
            usernode::Error::NotFound { .. } => Self::NotFound,
            usernode::Error::IndexConflict { .. } => Self::IndexConflict,
            usernode::Error::AuthFailed => Self::AuthFailed,
            usernode::Error::Internal(_) => Self::Internal,
        }
    }
}

/// Unified error type for the gRPC service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Directory(#[from] usernode::Error),

    /// The service is in the process of shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,
}

impl Error {
    pub fn errno(&self) -> Errno {
        match self {
            Self::Directory(err) => Errno::from(err),
            Self::ServiceShutdown => Errno::Internal,
        }
    }
}

/// A result message: a status pair plus an optional payload.
pub trait Reply: Default {
    /// Domain value carried on success.
    type Payload;

    fn set_status(&mut self, errno: Errno, errmsg: String);

    fn set_payload(&mut self, payload: Self::Payload);

    fn errno(&self) -> i32;

    fn ok(payload: Self::Payload) -> Self {
        let mut reply = Self::default();
        reply.set_status(Errno::Ok, String::new());
        reply.set_payload(payload);
        reply
    }

    fn failure(err: &Error) -> Self {
        let mut reply = Self::default();
        reply.set_status(err.errno(), err.to_string());
        reply
    }

    fn from_result(result: Result<Self::Payload>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => Self::failure(&err),
        }
    }
}

macro_rules! impl_reply {
    ($reply:ty) => {
        impl_reply!($reply, (), |_this, _unit| {});
    };
    ($reply:ty, $payload:ty, |$this:ident, $value:ident| $set:expr) => {
        impl Reply for $reply {
            type Payload = $payload;

            fn set_status(&mut self, errno: Errno, errmsg: String) {
                self.errno = errno.code();
                self.errmsg = errmsg;
            }

            fn set_payload(&mut self, $value: Self::Payload) {
                let $this = self;
                $set
            }

            fn errno(&self) -> i32 {
                self.errno
            }
        }
    };
}

impl_reply!(UserResult, usernode::User, |this, user| this.user = Some(user.into()));

impl_reply!(UserQueryResult, usernode::UserPage, |this, page| {
    this.items = page.items.into_iter().map(Into::into).collect();
    this.page = page.page.map(Into::into);
});

impl_reply!(UserBatchGetResult, Vec<Option<usernode::User>>, |this, users| {
    this.items = users
        .into_iter()
        .map(|user| UserEntry {
            user: user.map(Into::into),
        })
        .collect();
});

impl_reply!(LoginResult);

impl_reply!(InfoResult, usernode::Info, |this, info| this.info = Some(info.into()));

impl_reply!(InfoBatchGetResult, Vec<Option<usernode::Info>>, |this, infos| {
    this.items = infos
        .into_iter()
        .map(|info| InfoEntry {
            info: info.map(Into::into),
        })
        .collect();
});
