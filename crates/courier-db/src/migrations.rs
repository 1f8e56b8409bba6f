use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use courier_types::limits::{CHALLENGE_LENGTH, KEY_HASH_LENGTH, SALT_LENGTH, USERNAME_MAX_LENGTH};

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, messages)");
        conn.execute_batch(&format!(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE
                            CHECK (length(CAST(username AS BLOB))
                                   BETWEEN 1 AND {USERNAME_MAX_LENGTH}),
                salt        BLOB NOT NULL CHECK (length(salt) = {SALT_LENGTH}),
                salted_hash BLOB NOT NULL CHECK (length(salted_hash) = {KEY_HASH_LENGTH}),
                challenge   BLOB CHECK (challenge IS NULL OR length(challenge) = {CHALLENGE_LENGTH})
            );

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                sender      INTEGER NOT NULL REFERENCES users(id),
                recipient   INTEGER NOT NULL REFERENCES users(id),
                time_sent   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                payload     BLOB NOT NULL
            );

            CREATE INDEX idx_messages_pair
                ON messages(sender, recipient, time_sent);

            INSERT INTO schema_version (version) VALUES (1);
            "
        ))?;
    }

    info!("Database migrations complete");
    Ok(())
}

pub fn reset(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS messages;
        DROP TABLE IF EXISTS users;
        DROP TABLE IF EXISTS schema_version;
        ",
    )?;
    info!("Dropped users and messages");

    run(conn)
}
