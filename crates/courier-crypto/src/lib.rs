/// Courier Crypto Library
///
/// Challenge-response primitives shared by the server and clients:
/// - random challenge and salt generation
/// - response derivation: HMAC-SHA256 keyed by the salted password hash
/// - constant-time response comparison
///
/// Password hashing itself happens at registration and is not part of this crate.
pub mod challenge;
