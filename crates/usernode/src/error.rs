//! Error taxonomy for directory operations.
//!
//! Every operation on [`Directory`](crate::Directory) resolves to one of five
//! outcome kinds. Transport layers map them onto their own status codes; the
//! kinds themselves must stay distinct.
//!
//! ## Error Cases
//! - `BadInput`: a required field was missing or malformed. Always detected
//!   before the store is touched.
//! - `NotFound`: a lookup missed and no auto-create applied.
//! - `IndexConflict`: the store rejected a write on a unique index.
//! - `AuthFailed`: credential check failed. Never says which half was wrong.
//! - `Internal`: any other store or dependency failure.

use crate::store::StoreError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The caller omitted or malformed a required field.
    #[error("{reason}")]
    BadInput { reason: String },

    /// Lookup miss.
    #[error("not found {what}")]
    NotFound { what: &'static str },

    /// Uniqueness violation reported by the store.
    #[error("index conflict: {index}")]
    IndexConflict { index: String },

    /// Credential mismatch on login.
    #[error("not found user / password")]
    AuthFailed,

    /// Store or dependency failure.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// A required field was absent or empty.
    pub fn missing(field: &str) -> Self {
        Self::BadInput {
            reason: format!("not found param {field}"),
        }
    }

    pub fn bad_input(reason: impl Into<String>) -> Self {
        Self::BadInput {
            reason: reason.into(),
        }
    }

    pub fn internal<E: core::fmt::Display>(err: E) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { index } => Self::IndexConflict { index },
            other => Self::Internal(other.to_string()),
        }
    }
}
