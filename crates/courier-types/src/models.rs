use serde::Serialize;
use serde_json::value::RawValue;

/// One entry of a serialized conversation.
///
/// `message` is emitted as-is: a stored payload of `{"text":"hi"}` appears as
/// `"Message": {"text":"hi"}`, never as an escaped string.
#[derive(Debug, Serialize)]
pub struct ConversationEntry {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Message")]
    pub message: Box<RawValue>,
}
