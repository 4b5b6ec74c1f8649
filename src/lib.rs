/// Medverify - medicine batch verification against an on-chain registry
///
/// This is the root crate that provides workspace-level documentation.
/// Actual implementation is in the subcrates:
/// - `medverify-core`: Batch identifiers, records, QR payloads and verdicts
/// - `medverify-client`: Registry contract, content store, registrar and verifier
/// - `medverify-cli`: The `medverify` command-line tool

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
