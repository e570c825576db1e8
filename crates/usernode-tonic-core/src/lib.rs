#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can reach the domain types via
// `usernode_tonic_core::usernode`
pub use usernode;
