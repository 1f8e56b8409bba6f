use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::value::RawValue;
use tracing::{debug, warn};

use courier_db::Database;
use courier_types::api::{ConversationQuery, LookupResponse, SendMessageRequest};
use courier_types::models::ConversationEntry;

use crate::{ApiError, AppState, Error, Result, blocking};

/// Layout of `messages.time_sent`, millisecond precision. Lexical order
/// matches chronological order.
const STORE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Username resolution and the append-only direct message log.
pub struct MessageExchange {
    db: Arc<Database>,
}

impl MessageExchange {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn lookup_user(&self, username: &str) -> Result<i64> {
        let db = self.db.clone();
        let user = username.to_owned();
        blocking(move || db.get_user_id(&user))
            .await?
            .ok_or(Error::NoSuchUser)
    }

    /// Append a message from `sender_id` to `recipient`. The sender is taken
    /// as already authenticated. `payload` must be a JSON document; it is
    /// stored byte-for-byte.
    pub async fn send_message(
        &self,
        payload: &[u8],
        recipient: &str,
        sender_id: i64,
    ) -> Result<()> {
        serde_json::from_slice::<&RawValue>(payload).map_err(Error::InvalidPayload)?;

        let recipient_id = self.lookup_user(recipient).await?;

        let db = self.db.clone();
        let payload = payload.to_vec();
        let message_id = blocking(move || db.insert_message(sender_id, recipient_id, &payload))
            .await
            .map_err(|e| match e {
                Error::Store(err) => {
                    warn!("Message insert failed: {:#}", err);
                    Error::MessageUnsent
                }
                other => other,
            })?;

        debug!(message_id, sender_id, recipient_id, "Message stored");
        Ok(())
    }

    /// Serialized history between `self_id` and `other`, oldest first, as a
    /// JSON array of `{Username, Timestamp, Message}`. An empty `since`
    /// means the whole history.
    pub async fn fetch_conversation(
        &self,
        other: &str,
        self_id: i64,
        since: Option<&str>,
    ) -> Result<Vec<u8>> {
        let since = since
            .filter(|s| !s.is_empty())
            .map(normalize_since)
            .transpose()?;

        let other_id = self.lookup_user(other).await?;

        let db = self.db.clone();
        blocking(move || db.get_username(self_id))
            .await?
            .ok_or(Error::NoSuchUser)?;

        let db = self.db.clone();
        let rows =
            blocking(move || db.get_conversation(self_id, other_id, since.as_deref())).await?;

        let entries: Vec<ConversationEntry> = rows
            .into_iter()
            .map(|row| {
                let message = String::from_utf8(row.payload)
                    .ok()
                    .and_then(|json| RawValue::from_string(json).ok())
                    .unwrap_or_else(|| {
                        warn!(
                            "Stored payload from '{}' at {} is not valid JSON, emitting null",
                            row.sender_username, row.time_sent
                        );
                        RawValue::NULL.to_owned()
                    });

                ConversationEntry {
                    username: row.sender_username,
                    timestamp: row.time_sent,
                    message,
                }
            })
            .collect();

        serde_json::to_vec(&entries).map_err(|e| Error::Internal(e.into()))
    }
}

/// Bring a caller-supplied timestamp into the stored layout so the filter
/// compares like with like. Accepts RFC 3339 or `YYYY-MM-DD HH:MM:SS[.fff]`
/// (taken as UTC).
fn normalize_since(since: &str) -> Result<String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(since) {
        return Ok(ts.with_timezone(&Utc).format(STORE_TIME_FORMAT).to_string());
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(since, fmt).ok())
        .map(|ndt| ndt.format(STORE_TIME_FORMAT).to_string())
        .ok_or_else(|| Error::InvalidTimestamp(since.to_string()))
}

/// GET /users/{username}
pub async fn lookup_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.exchange.lookup_user(&username).await?;
    Ok(Json(LookupResponse { id }))
}

/// POST /messages — `sender_id` is trusted; the host puts its own session
/// check in front of this route.
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .exchange
        .send_message(req.payload.get().as_bytes(), &req.recipient, req.sender_id)
        .await?;

    Ok(StatusCode::CREATED)
}

/// GET /conversations/{username}?self_id=..&since=..
pub async fn fetch_conversation(
    State(state): State<AppState>,
    Path(other): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .exchange
        .fetch_conversation(&other, query.self_id, query.since.as_deref())
        .await?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}
