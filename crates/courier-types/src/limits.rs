//! Column widths shared by schema creation and every read/write path.
//!
//! Changing any of these requires resetting the database: the schema
//! bakes them into CHECK constraints.

/// Maximum username length in bytes.
pub const USERNAME_MAX_LENGTH: usize = 64;

/// Per-user salt length.
pub const SALT_LENGTH: usize = 16;

/// Salted password hash length. Doubles as the HMAC key for challenges.
pub const KEY_HASH_LENGTH: usize = 32;

/// Challenge nonce length.
pub const CHALLENGE_LENGTH: usize = 32;

/// HMAC-SHA256 output length.
pub const RESPONSE_LENGTH: usize = 32;
