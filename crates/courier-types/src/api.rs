use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChallengeRequest {
    pub username: String,
}

/// Base64 salt and challenge. The client derives its key from the salt and
/// answers with `HMAC-SHA256(salted_hash, challenge)`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub salt: String,
    pub challenge: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRequest {
    pub username: String,
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub verified: bool,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct LookupResponse {
    pub id: i64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender_id: i64,
    pub recipient: String,
    /// Stored byte-for-byte and embedded verbatim in fetched history.
    pub payload: Box<RawValue>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub self_id: i64,
    pub since: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
