use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;
use crate::{auth, messages};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/auth/challenge", post(auth::issue_challenge))
        .route("/auth/verify", post(auth::verify_response))
        .route("/users/{username}", get(messages::lookup_user))
        .route("/messages", post(messages::send_message))
        .route("/conversations/{username}", get(messages::fetch_conversation))
        .with_state(state)
}
