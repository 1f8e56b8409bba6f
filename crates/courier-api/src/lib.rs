pub mod auth;
pub mod error;
pub mod messages;
pub mod routes;

use std::sync::Arc;

use courier_crypto::challenge::generate_challenge;
use courier_db::Database;
use tracing::error;

use crate::auth::{AuthManager, ChallengePolicy};
use crate::messages::MessageExchange;

pub use crate::error::{ApiError, Error, Result};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub auth: AuthManager,
    pub exchange: MessageExchange,
    /// Report unknown users and wrong responses identically on the auth
    /// endpoints.
    pub generic_auth_errors: bool,
    /// HMAC key for decoy salts handed to unknown usernames.
    pub decoy_key: Vec<u8>,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, policy: ChallengePolicy, generic_auth_errors: bool) -> Self {
        Self {
            auth: AuthManager::with_policy(db.clone(), policy),
            exchange: MessageExchange::new(db),
            generic_auth_errors,
            decoy_key: generate_challenge().to_vec(),
        }
    }

    /// Use a fixed decoy key so decoy salts survive restarts. The default
    /// random key changes them on every start.
    pub fn with_decoy_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.decoy_key = key.into();
        self
    }
}

/// Run a blocking store call off the async runtime. Store failures come back
/// as `Error::Store`.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            Error::Internal(e.into())
        })?
        .map_err(Error::Store)
}
