use std::str::FromStr;
use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::{debug, warn};

use courier_crypto::challenge::{compute_response, decoy_salt, generate_challenge, responses_match};
use courier_db::Database;
use courier_types::api::{ChallengeRequest, ChallengeResponse, VerifyRequest, VerifyResponse};
use courier_types::limits::{CHALLENGE_LENGTH, KEY_HASH_LENGTH};

use crate::{ApiError, AppState, Error, Result, blocking};

/// What happens to a stored challenge once a response has been checked
/// against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChallengePolicy {
    /// Cleared by the first verification attempt, successful or not.
    #[default]
    SingleUse,
    /// Left in place until the next issuance overwrites it. A captured
    /// response can be replayed until then.
    ReuseUntilReissued,
}

impl FromStr for ChallengePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "single-use" => Ok(Self::SingleUse),
            "reuse" => Ok(Self::ReuseUntilReissued),
            other => Err(anyhow::anyhow!(
                "unknown challenge policy {:?} (expected \"single-use\" or \"reuse\")",
                other
            )),
        }
    }
}

/// Challenge-response handshake over the credential store.
///
/// The client never sends its password or salted hash. It receives the salt
/// and a fresh challenge, derives the salted hash locally and answers with
/// `HMAC-SHA256(salted_hash, challenge)`.
pub struct AuthManager {
    db: Arc<Database>,
    policy: ChallengePolicy,
}

impl AuthManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_policy(db, ChallengePolicy::default())
    }

    pub fn with_policy(db: Arc<Database>, policy: ChallengePolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> ChallengePolicy {
        self.policy
    }

    /// Store `challenge` as the user's only outstanding challenge and return
    /// their salt. Any earlier challenge stops being valid.
    pub async fn issue_challenge(&self, username: &str, challenge: &[u8]) -> Result<Vec<u8>> {
        if challenge.len() != CHALLENGE_LENGTH {
            return Err(Error::InvalidChallenge {
                expected: CHALLENGE_LENGTH,
                actual: challenge.len(),
            });
        }

        let db = self.db.clone();
        let user = username.to_owned();
        let challenge = challenge.to_vec();
        let salt = blocking(move || db.set_challenge(&user, &challenge))
            .await?
            .ok_or(Error::NoSuchUser)?;

        debug!(username, "Challenge issued");
        Ok(salt)
    }

    /// Check `response` against the HMAC of the outstanding challenge.
    pub async fn verify_response(&self, username: &str, response: &[u8]) -> Result<()> {
        let db = self.db.clone();
        let user = username.to_owned();
        let consume = self.policy == ChallengePolicy::SingleUse;
        let creds = blocking(move || {
            if consume {
                db.take_credentials(&user)
            } else {
                db.get_credentials(&user)
            }
        })
        .await?;

        // Every path pays for one HMAC and one full compare, so a missing
        // account or a missing challenge does not answer faster than a wrong
        // response
        let placeholder = ([0u8; KEY_HASH_LENGTH].to_vec(), [0u8; CHALLENGE_LENGTH].to_vec());
        let (key, challenge, failure) = match creds {
            None => (placeholder.0, placeholder.1, Some(Error::NoSuchUser)),
            Some(creds) => match creds.challenge {
                Some(challenge) => (creds.salted_hash, challenge, None),
                None => {
                    warn!(username, "Verification attempted with no outstanding challenge");
                    (placeholder.0, placeholder.1, Some(Error::InvalidResponse))
                }
            },
        };

        let expected = compute_response(&key, &challenge).map_err(Error::Internal)?;
        let matched = responses_match(&expected, response);
        if let Some(err) = failure {
            return Err(err);
        }

        if matched {
            debug!(username, "Challenge response accepted");
            Ok(())
        } else {
            warn!(username, "Challenge response rejected");
            Err(Error::InvalidResponse)
        }
    }
}

fn auth_failure(state: &AppState, err: Error) -> ApiError {
    match err {
        Error::NoSuchUser | Error::InvalidResponse if state.generic_auth_errors => {
            ApiError::authentication_failed()
        }
        other => other.into(),
    }
}

/// POST /auth/challenge — generates a challenge, stores it, returns it with
/// the user's salt. With generic auth errors, unknown names get a decoy salt
/// and an unstored challenge instead of an error; their verify then fails
/// like any wrong response.
pub async fn issue_challenge(
    State(state): State<AppState>,
    Json(req): Json<ChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let challenge = generate_challenge();

    let salt = match state.auth.issue_challenge(&req.username, &challenge).await {
        Ok(salt) => salt,
        Err(Error::NoSuchUser) if state.generic_auth_errors => {
            debug!(username = %req.username, "Decoy challenge for unknown user");
            decoy_salt(&state.decoy_key, &req.username)
                .map_err(|e| ApiError::from(Error::Internal(e)))?
                .to_vec()
        }
        Err(e) => return Err(auth_failure(&state, e)),
    };

    Ok(Json(ChallengeResponse {
        salt: B64.encode(salt),
        challenge: B64.encode(challenge),
    }))
}

/// POST /auth/verify — what a successful caller does next (sessions, tokens)
/// is up to the host.
pub async fn verify_response(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Undecodable input is just another wrong answer
    let response = B64
        .decode(&req.response)
        .map_err(|_| auth_failure(&state, Error::InvalidResponse))?;

    state
        .auth
        .verify_response(&req.username, &response)
        .await
        .map_err(|e| auth_failure(&state, e))?;

    Ok(Json(VerifyResponse { verified: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{open_temp, register};
    use courier_types::limits::RESPONSE_LENGTH;

    #[tokio::test]
    async fn correct_response_verifies() {
        let (_dir, db) = open_temp();
        let (_, salted_hash) = register(&db, "alice", "hunter22");
        let auth = AuthManager::new(db);

        let challenge = generate_challenge();
        auth.issue_challenge("alice", &challenge).await.unwrap();

        let response = compute_response(&salted_hash, &challenge).unwrap();
        auth.verify_response("alice", &response).await.unwrap();
    }

    #[tokio::test]
    async fn issue_returns_stored_salt() {
        let (_dir, db) = open_temp();
        db.create_user("alice", &[4u8; 16], &[5u8; 32]).unwrap();
        let auth = AuthManager::new(db);

        let salt = auth.issue_challenge("alice", &generate_challenge()).await.unwrap();
        assert_eq!(salt, vec![4u8; 16]);
    }

    #[tokio::test]
    async fn single_byte_mismatch_rejected() {
        let (_dir, db) = open_temp();
        let (_, salted_hash) = register(&db, "alice", "hunter22");
        let auth = AuthManager::with_policy(db, ChallengePolicy::ReuseUntilReissued);

        let challenge = generate_challenge();
        auth.issue_challenge("alice", &challenge).await.unwrap();
        let response = compute_response(&salted_hash, &challenge).unwrap();

        for pos in [0, RESPONSE_LENGTH / 2, RESPONSE_LENGTH - 1] {
            let mut forged = response;
            forged[pos] ^= 0x80;
            let err = auth.verify_response("alice", &forged).await.unwrap_err();
            assert!(matches!(err, Error::InvalidResponse), "flip at {pos}: {err:?}");
        }

        auth.verify_response("alice", &response).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let (_dir, db) = open_temp();
        let auth = AuthManager::new(db);

        let err = auth.issue_challenge("ghost", &generate_challenge()).await.unwrap_err();
        assert!(matches!(err, Error::NoSuchUser));

        let err = auth.verify_response("ghost", &[0u8; RESPONSE_LENGTH]).await.unwrap_err();
        assert!(matches!(err, Error::NoSuchUser));
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_challenge() {
        let (_dir, db) = open_temp();
        let (_, salted_hash) = register(&db, "alice", "hunter22");
        let auth = AuthManager::with_policy(db, ChallengePolicy::ReuseUntilReissued);

        let old = generate_challenge();
        auth.issue_challenge("alice", &old).await.unwrap();
        let stale = compute_response(&salted_hash, &old).unwrap();

        let new = generate_challenge();
        auth.issue_challenge("alice", &new).await.unwrap();

        let err = auth.verify_response("alice", &stale).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse));

        let fresh = compute_response(&salted_hash, &new).unwrap();
        auth.verify_response("alice", &fresh).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_user_verify_still_runs_hmac() {
        let (_dir, db) = open_temp();
        let auth = AuthManager::new(db);

        // Wrong-length input takes the same path as a full-length guess
        for response in [&[0u8; RESPONSE_LENGTH][..], &[1u8; 4][..]] {
            let err = auth.verify_response("ghost", response).await.unwrap_err();
            assert!(matches!(err, Error::NoSuchUser));
        }
    }

    #[tokio::test]
    async fn single_use_blocks_replay() {
        let (_dir, db) = open_temp();
        let (_, salted_hash) = register(&db, "alice", "hunter22");
        let auth = AuthManager::new(db);

        let challenge = generate_challenge();
        auth.issue_challenge("alice", &challenge).await.unwrap();
        let response = compute_response(&salted_hash, &challenge).unwrap();

        auth.verify_response("alice", &response).await.unwrap();
        let err = auth.verify_response("alice", &response).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse));
    }

    #[tokio::test]
    async fn single_use_failed_attempt_burns_challenge() {
        let (_dir, db) = open_temp();
        let (_, salted_hash) = register(&db, "alice", "hunter22");
        let auth = AuthManager::new(db);

        let challenge = generate_challenge();
        auth.issue_challenge("alice", &challenge).await.unwrap();

        let err = auth
            .verify_response("alice", &[0u8; RESPONSE_LENGTH])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse));

        let response = compute_response(&salted_hash, &challenge).unwrap();
        let err = auth.verify_response("alice", &response).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse));
    }

    #[tokio::test]
    async fn reuse_policy_allows_repeat() {
        let (_dir, db) = open_temp();
        let (_, salted_hash) = register(&db, "alice", "hunter22");
        let auth = AuthManager::with_policy(db, ChallengePolicy::ReuseUntilReissued);

        let challenge = generate_challenge();
        auth.issue_challenge("alice", &challenge).await.unwrap();
        let response = compute_response(&salted_hash, &challenge).unwrap();

        auth.verify_response("alice", &response).await.unwrap();
        auth.verify_response("alice", &response).await.unwrap();
    }

    #[tokio::test]
    async fn no_challenge_outstanding() {
        let (_dir, db) = open_temp();
        register(&db, "alice", "hunter22");
        let auth = AuthManager::new(db);

        let err = auth
            .verify_response("alice", &[0u8; RESPONSE_LENGTH])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse));
    }

    #[tokio::test]
    async fn wrong_length_challenge_rejected() {
        let (_dir, db) = open_temp();
        register(&db, "alice", "hunter22");
        let auth = AuthManager::new(db);

        let err = auth.issue_challenge("alice", &[1u8; 8]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidChallenge {
                expected: CHALLENGE_LENGTH,
                actual: 8
            }
        ));
    }

    #[test]
    fn policy_parsing() {
        assert_eq!(
            "single-use".parse::<ChallengePolicy>().unwrap(),
            ChallengePolicy::SingleUse
        );
        assert_eq!(
            "reuse".parse::<ChallengePolicy>().unwrap(),
            ChallengePolicy::ReuseUntilReissued
        );
        assert!("sometimes".parse::<ChallengePolicy>().is_err());
    }
}
