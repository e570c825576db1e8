//! Shared protocol types used by the `usernode` gRPC server and its clients.
//!
//! ## Submodules
//!
//! - [`error`] - Status codes and the [`Reply`](error::Reply) trait that turns
//!   directory outcomes into result messages.
//! - [`types`] - Conversions between protobuf messages and domain types.
//! - [`proto`] - Generated messages, client and server.

pub mod error;
pub mod types;

pub use error::*;

pub mod proto {
    tonic::include_proto!("usernode");
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("usernode_descriptor");
}
