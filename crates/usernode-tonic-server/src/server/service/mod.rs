//! gRPC service implementation.
//!
//! This module adapts the [`usernode::Directory`] to the `Identity` gRPC
//! service: request conversion, reply construction, in-flight tracking and
//! shutdown coordination.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`IdentityService`).

pub mod handler;

#[cfg(test)]
mod tests;
