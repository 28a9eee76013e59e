/// Builds the gRPC client and server code for the `viewer.proto` definition
/// using `tonic-prost-build`.
///
/// # Byte Field Optimization
///
/// The `value` field of the `Uuid` message is generated as `Bytes` (from the
/// `bytes` crate) instead of `Vec<u8>`. Identifiers returned by the spawn
/// phase are re-sent in every reposition round, so cloning them must not
/// allocate.
///
/// # Files and Paths
///
/// - Proto file: `proto/viewer/v1/viewer.proto`
/// - Includes: `proto/`
///
/// # Output
///
/// Generated code is accessible via:
///
/// ```rust
/// pub mod proto {
///     tonic::include_proto!("viewer.v1");
/// }
/// ```
///
/// The server half is generated as well so tests can stand up an in-process
/// service.
fn main() {
    let mut config = tonic_prost_build::Config::new();

    config.bytes([".viewer.v1.Uuid.value"]);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/viewer/v1/viewer.proto"], &["proto"])
        .unwrap();
}
