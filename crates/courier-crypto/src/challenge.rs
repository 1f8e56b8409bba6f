use anyhow::{Result, anyhow};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use courier_types::limits::{CHALLENGE_LENGTH, RESPONSE_LENGTH, SALT_LENGTH};

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh challenge nonce.
pub fn generate_challenge() -> [u8; CHALLENGE_LENGTH] {
    let mut challenge = [0u8; CHALLENGE_LENGTH];
    rand::rng().fill_bytes(&mut challenge);
    challenge
}

/// Generate a per-user salt.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::rng().fill_bytes(&mut salt);
    salt
}

/// Compute the proof of knowledge for `challenge`: HMAC-SHA256 keyed by the
/// salted hash. Clients send this; the server recomputes it to verify.
pub fn compute_response(salted_hash: &[u8], challenge: &[u8]) -> Result<[u8; RESPONSE_LENGTH]> {
    let mut mac = HmacSha256::new_from_slice(salted_hash)
        .map_err(|e| anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(challenge);

    let mut response = [0u8; RESPONSE_LENGTH];
    response.copy_from_slice(&mac.finalize().into_bytes());
    Ok(response)
}

/// Salt handed out for a username that has no account, so the challenge
/// endpoint answers the same way for every name. Keyed by a server secret:
/// stable for a given name, unpredictable without the key.
pub fn decoy_salt(server_key: &[u8], username: &str) -> Result<[u8; SALT_LENGTH]> {
    let mac = compute_response(server_key, username.as_bytes())?;

    let mut salt = [0u8; SALT_LENGTH];
    salt.copy_from_slice(&mac[..SALT_LENGTH]);
    Ok(salt)
}

/// Compare two responses without leaking the position of the first
/// differing byte. Lengths are public, so a length mismatch returns early.
pub fn responses_match(expected: &[u8], given: &[u8]) -> bool {
    expected.ct_eq(given).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_is_deterministic() {
        let key = [9u8; 32];
        let challenge = generate_challenge();

        let a = compute_response(&key, &challenge).unwrap();
        let b = compute_response(&key, &challenge).unwrap();
        assert_eq!(a, b);
        assert!(responses_match(&a, &b));
    }

    #[test]
    fn response_depends_on_key_and_challenge() {
        let challenge = [1u8; CHALLENGE_LENGTH];
        let a = compute_response(&[1u8; 32], &challenge).unwrap();
        let b = compute_response(&[2u8; 32], &challenge).unwrap();
        let c = compute_response(&[1u8; 32], &[2u8; CHALLENGE_LENGTH]).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn known_vector() {
        // RFC 4231 test case 2
        let mac = compute_response(b"Jefe", b"what do ya want for nothing?").unwrap();
        let expected: [u8; 32] = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        assert_eq!(mac, expected);
    }

    #[test]
    fn any_single_byte_flip_is_rejected() {
        let expected = compute_response(&[5u8; 32], &[6u8; CHALLENGE_LENGTH]).unwrap();
        for pos in 0..RESPONSE_LENGTH {
            let mut forged = expected;
            forged[pos] ^= 0x01;
            assert!(!responses_match(&expected, &forged), "flip at {pos} accepted");
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let expected = [0u8; RESPONSE_LENGTH];
        assert!(!responses_match(&expected, &expected[..RESPONSE_LENGTH - 1]));
        assert!(!responses_match(&expected, &[]));
    }

    #[test]
    fn decoy_salt_is_stable_per_name() {
        let key = [3u8; 32];
        let a = decoy_salt(&key, "ghost").unwrap();
        assert_eq!(a, decoy_salt(&key, "ghost").unwrap());
        assert_ne!(a, decoy_salt(&key, "phantom").unwrap());
        assert_ne!(a, decoy_salt(&[4u8; 32], "ghost").unwrap());
    }

    #[test]
    fn generated_nonces_differ() {
        assert_ne!(generate_challenge(), generate_challenge());
        assert_ne!(generate_salt(), generate_salt());
    }
}
