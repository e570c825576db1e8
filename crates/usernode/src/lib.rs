#![doc = include_str!("../README.md")]

mod credential;
mod directory;
mod error;
mod id;
mod merge;
mod model;
mod query;
mod router;
pub mod store;

pub use crate::credential::*;
pub use crate::directory::*;
pub use crate::error::*;
pub use crate::id::*;
pub use crate::merge::*;
pub use crate::model::*;
pub use crate::query::*;
pub use crate::router::*;
