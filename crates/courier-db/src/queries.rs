use crate::Database;
use crate::models::{ConversationRow, CredentialRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    /// Insert a fully formed credential row. Password hashing happens before
    /// this point; the store only keeps what it is given.
    pub fn create_user(&self, username: &str, salt: &[u8], salted_hash: &[u8]) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, salt, salted_hash) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, salt, salted_hash],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_id(&self, username: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    pub fn get_username(&self, id: i64) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT username FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()
        })
    }

    // -- Challenges --

    /// Replace the outstanding challenge and return the user's salt.
    /// Both steps share one transaction. `None` means no such user.
    pub fn set_challenge(&self, username: &str, challenge: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let updated = tx.execute(
                "UPDATE users SET challenge = ?1 WHERE username = ?2",
                rusqlite::params![challenge, username],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            let salt: Vec<u8> =
                tx.query_row("SELECT salt FROM users WHERE username = ?1", [username], |row| {
                    row.get(0)
                })?;

            tx.commit()?;
            Ok(Some(salt))
        })
    }

    /// Read the credential row without touching the challenge.
    pub fn get_credentials(&self, username: &str) -> Result<Option<CredentialRow>> {
        self.with_conn(|conn| query_credentials(conn, username))
    }

    /// Read the credential row and clear its challenge in the same
    /// transaction, so a challenge can be checked at most once.
    pub fn take_credentials(&self, username: &str) -> Result<Option<CredentialRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.unchecked_transaction()?;

            let row = query_credentials(&tx, username)?;
            if row.as_ref().is_some_and(|r| r.challenge.is_some()) {
                tx.execute(
                    "UPDATE users SET challenge = NULL WHERE username = ?1",
                    [username],
                )?;
            }

            tx.commit()?;
            Ok(row)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, sender: i64, recipient: i64, payload: &[u8]) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (sender, recipient, payload) VALUES (?1, ?2, ?3)",
                rusqlite::params![sender, recipient, payload],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Messages exchanged between `a` and `b` in either direction, oldest
    /// first. With `since`, only rows strictly newer than it.
    pub fn get_conversation(
        &self,
        a: i64,
        b: i64,
        since: Option<&str>,
    ) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, a, b, since))
    }

    pub fn count_messages(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?)
        })
    }
}

fn query_credentials(conn: &Connection, username: &str) -> Result<Option<CredentialRow>> {
    conn.query_row(
        "SELECT salted_hash, challenge FROM users WHERE username = ?1",
        [username],
        |row| {
            Ok(CredentialRow {
                salted_hash: row.get(0)?,
                challenge: row.get(1)?,
            })
        },
    )
    .optional()
}

fn query_conversation(
    conn: &Connection,
    a: i64,
    b: i64,
    since: Option<&str>,
) -> Result<Vec<ConversationRow>> {
    // CAST keeps payloads written as TEXT by other tools readable as bytes
    let mut stmt = conn.prepare(
        "SELECT u.username, m.time_sent, CAST(m.payload AS BLOB)
         FROM messages m
         JOIN users u ON m.sender = u.id
         WHERE ((m.sender = ?1 AND m.recipient = ?2) OR (m.sender = ?2 AND m.recipient = ?1))
           AND (?3 IS NULL OR m.time_sent > ?3)
         ORDER BY m.time_sent ASC, m.id ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![a, b, since], |row| {
            Ok(ConversationRow {
                sender_username: row.get(0)?,
                time_sent: row.get(1)?,
                payload: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
