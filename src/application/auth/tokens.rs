//! Opaque bearer tokens for sessions and password-reset links.
//!
//! Only the SHA-256 digest of a token is persisted; the plain value lives in
//! the visitor's cookie or in the reset email.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const TOKEN_BYTES: usize = 32;

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub fn digests_match(stored: &[u8], candidate: &[u8]) -> bool {
    stored.ct_eq(candidate).unwrap_u8() == 1
}

/// Encode a user id for the reset URL.
pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn digest_comparison() {
        let token = generate_token();
        let digest = hash_token(&token);
        assert_eq!(digest.len(), 32);
        assert!(digests_match(&digest, &hash_token(&token)));
        assert!(!digests_match(&digest, &hash_token("other")));
    }

    #[test]
    fn uid_encoding() {
        assert_eq!(encode_uid(13), "MTM");
        assert_eq!(decode_uid("MTM"), Some(13));
        assert_eq!(decode_uid("!!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
    }
}
