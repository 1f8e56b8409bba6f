/// Database row types. These map directly to SQLite rows and stay
/// independent of the wire types in courier-types.

/// Secret half of a user row, as read for challenge verification.
pub struct CredentialRow {
    pub salted_hash: Vec<u8>,
    /// `None` when no challenge is outstanding.
    pub challenge: Option<Vec<u8>>,
}

pub struct ConversationRow {
    pub sender_username: String,
    pub time_sent: String,
    pub payload: Vec<u8>,
}
