/// Builds the gRPC client and server code for `usernode.proto` using
/// `tonic-prost-build`.
///
/// The generated modules land in `OUT_DIR` together with an encoded file
/// descriptor set (`usernode_descriptor.bin`) used by the reflection service.
///
/// # Files and Paths
///
/// - Proto file: `proto/usernode.proto`
/// - Includes: `proto/`
///
/// # Output
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("usernode");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts"));
    let descriptor_path = out_dir.join("usernode_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/usernode.proto"], &["proto"])
        .expect("failed to compile proto/usernode.proto");

    println!("cargo:rerun-if-changed=proto/usernode.proto");
}
