mod config;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use courier_api::{AppState, AppStateInner, routes};
use courier_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "courier=debug,courier_api=debug,courier_db=info,tower_http=debug".into()
                }),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;
    if config.reset_db {
        db.reset()?;
    }

    let mut inner = AppStateInner::new(
        Arc::new(db),
        config.challenge_policy,
        config.generic_auth_errors,
    );
    match config.decoy_key {
        Some(key) => inner = inner.with_decoy_key(key.into_bytes()),
        None if config.generic_auth_errors => {
            warn!("COURIER_DECOY_KEY unset; decoy salts change on every restart")
        }
        None => {}
    }
    let state: AppState = Arc::new(inner);

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    info!(
        policy = ?config.challenge_policy,
        generic_auth_errors = config.generic_auth_errors,
        "Courier server listening on {}",
        config.addr
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
