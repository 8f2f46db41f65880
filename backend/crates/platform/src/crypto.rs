//! Cryptographic Utilities

use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate cryptographically secure random bytes
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Encode bytes as URL-safe base64 without padding (cookie-safe)
pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode URL-safe base64 without padding
pub fn from_base64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    general_purpose::URL_SAFE_NO_PAD.decode(s)
}

/// Error when signing or verifying a token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Signing key rejected")]
    InvalidKey,
    #[error("Token is malformed")]
    Malformed,
    #[error("Token signature does not match")]
    Mismatch,
}

/// Compute HMAC-SHA256
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], SignatureError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// Sign a value as `<value>.<base64 mac>`
pub fn sign(key: &[u8], value: &str) -> Result<String, SignatureError> {
    let mac = hmac_sha256(key, value.as_bytes())?;
    Ok(format!("{}.{}", value, to_base64(&mac)))
}

/// Verify a token produced by [`sign`] and return the signed value
pub fn verify(key: &[u8], token: &str) -> Result<String, SignatureError> {
    let (value, signature) = token.rsplit_once('.').ok_or(SignatureError::Malformed)?;
    let provided = from_base64(signature).map_err(|_| SignatureError::Malformed)?;
    let expected = hmac_sha256(key, value.as_bytes())?;

    if constant_time_eq(&expected, &provided) {
        Ok(value.to_string())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Constant-time comparison to prevent timing attacks
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?").unwrap();
        let expected =
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap();
        assert_eq!(mac.to_vec(), expected);
    }

    #[test]
    fn test_random_bytes() {
        let bytes = random_bytes(32);
        assert_eq!(bytes.len(), 32);
        assert!(bytes.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_base64_roundtrip() {
        let data = b"hello world";
        let decoded = from_base64(&to_base64(data)).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_sign_and_verify() {
        let key = [7u8; 32];
        let token = sign(&key, "3f2a9c").unwrap();
        assert_eq!(verify(&key, &token).unwrap(), "3f2a9c");
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let key = [7u8; 32];
        let token = sign(&key, "3f2a9c").unwrap();
        let forged = token.replacen("3f2a9c", "3f2a9d", 1);
        assert_eq!(verify(&key, &forged), Err(SignatureError::Mismatch));
        assert_eq!(verify(&[8u8; 32], &token), Err(SignatureError::Mismatch));
        assert_eq!(verify(&key, "no-dot"), Err(SignatureError::Malformed));
        assert_eq!(verify(&key, "value.!!!"), Err(SignatureError::Malformed));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(&[1, 2, 3], &[1, 2, 3]));
        assert!(!constant_time_eq(&[1, 2, 3], &[1, 2, 4]));
        assert!(!constant_time_eq(&[1, 2], &[1, 2, 3]));
    }
}
