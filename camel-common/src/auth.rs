//! Credential primitives: password hashing and bearer tokens
//!
//! # Passwords
//!
//! Stored as a random 16-byte salt plus an iterated SHA-256 digest, both hex
//! encoded. Verification recomputes the digest and compares in constant time.
//!
//! # Bearer tokens
//!
//! HS256 JSON Web Tokens carrying the user id (`sub`) and username. The
//! signing secret comes from configuration or, when not configured, is
//! generated once and stored in the `settings` table so tokens survive
//! restarts.
//!
//! This module has no HTTP framework dependencies; the axum middleware lives
//! in the service crate.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::{get_setting, set_setting};

/// Number of SHA-256 rounds applied to each password
pub const PASSWORD_HASH_ROUNDS: u32 = 10_000;

/// Settings key holding the generated token signing secret
pub const SIGNING_SECRET_KEY: &str = "jwt_signing_secret";

/// Longest accepted token lifetime (one year)
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

const SALT_LEN: usize = 16;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No `Authorization` header on the request
    #[error("Missing bearer token")]
    MissingCredential,

    /// Header present but not of the form `Bearer <token>`
    #[error("Malformed authorization header")]
    MalformedCredential,

    /// Signature, structure or claims invalid
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token was valid but has expired
    #[error("Token expired")]
    ExpiredToken,

    /// Token refers to a user that no longer exists
    #[error("Unknown user")]
    UnknownUser,

    /// Token could not be produced
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    /// Database error loading or storing the signing secret
    #[error("Database error: {0}")]
    Database(String),
}

// ========================================
// Password Hashing
// ========================================

/// Salted password digest ready for storage
#[derive(Debug, Clone)]
pub struct PasswordDigest {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a freshly generated salt
pub fn hash_password(password: &str) -> PasswordDigest {
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = to_hex(&salt_bytes);

    PasswordDigest {
        hash: hash_password_with_salt(password, &salt),
        salt,
    }
}

/// Deterministic digest of `password` under `salt`
///
/// Round 0 hashes `salt || password`; every following round hashes
/// `previous_digest || salt`.
pub fn hash_password_with_salt(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();

    for _ in 1..PASSWORD_HASH_ROUNDS {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(salt.as_bytes());
        digest = hasher.finalize();
    }

    to_hex(&digest)
}

/// Check a candidate password against a stored digest
pub fn verify_password(password: &str, stored_hash: &str, salt: &str) -> bool {
    let calculated = hash_password_with_salt(password, salt);
    constant_time_eq(calculated.as_bytes(), stored_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ========================================
// Bearer Tokens
// ========================================

/// Claims embedded in every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id, decimal)
    pub sub: String,
    pub username: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
}

impl Claims {
    /// Numeric user id carried in `sub`
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))
    }
}

/// Signing and verification keys plus token lifetime
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    /// Keys for `secret`; the lifetime is clamped to
    /// `1..=MAX_TOKEN_TTL_MINUTES` minutes
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        let ttl = Duration::try_minutes(ttl_minutes.clamp(1, MAX_TOKEN_TTL_MINUTES))
            .unwrap_or_else(|| Duration::minutes(1));
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue an access token valid from now
    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Issue an access token as if issued at `issued_at`
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Encoding("token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Encoding(e.to_string()))
    }

    /// Verify signature and expiry, returning the embedded claims
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively (`Bearer`, `bearer`).
pub fn parse_bearer(header_value: &str) -> Result<&str, AuthError> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedCredential)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedCredential);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCredential);
    }
    Ok(token)
}

// ========================================
// Signing Secret Management
// ========================================

/// Load the token signing secret from settings, generating it on first use
pub async fn load_signing_secret(db: &SqlitePool) -> Result<String, AuthError> {
    let existing = get_setting(db, SIGNING_SECRET_KEY)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    match existing {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ => initialize_signing_secret(db).await,
    }
}

/// Generate a random 256-bit signing secret and store it
pub async fn initialize_signing_secret(db: &SqlitePool) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let secret = URL_SAFE_NO_PAD.encode(bytes);

    set_setting(db, SIGNING_SECRET_KEY, &secret)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret-0123456789";

    #[test]
    fn test_password_roundtrip() {
        let digest = hash_password("correct horse battery");
        assert_eq!(digest.salt.len(), SALT_LEN * 2);
        assert_eq!(digest.hash.len(), 64);
        assert!(verify_password("correct horse battery", &digest.hash, &digest.salt));
        assert!(!verify_password("correct horse batterx", &digest.hash, &digest.salt));
    }

    #[test]
    fn test_salts_differ_between_hashes() {
        let a = hash_password("same-password");
        let b = hash_password("same-password");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_hash_is_deterministic_for_salt() {
        let h1 = hash_password_with_salt("pw12345678", "abcd");
        let h2 = hash_password_with_salt("pw12345678", "abcd");
        assert_eq!(h1, h2);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hex_encoding_shared_by_salt_and_hash() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xab, 0xff]), "000fabff");

        let digest = hash_password("pw12345678");
        for value in [&digest.salt, &digest.hash] {
            assert!(value.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
        }
        assert_eq!(digest.hash.len(), 64);
    }

    #[test]
    fn test_token_issue_and_validate() {
        let keys = TokenKeys::new(SECRET, 30);
        let token = keys.issue(42, "nomad").unwrap();
        let claims = keys.validate(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.username, "nomad");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = TokenKeys::new(SECRET, 30);
        let issued = Utc::now() - Duration::hours(2);
        let token = keys.issue_at(7, "nomad", issued).unwrap();

        assert!(matches!(keys.validate(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let keys = TokenKeys::new(SECRET, 30);
        let other = TokenKeys::new(b"another-secret-entirely-0000", 30);
        let token = other.issue(1, "intruder").unwrap();

        assert!(matches!(keys.validate(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let keys = TokenKeys::new(SECRET, i64::MAX);
        assert_eq!(keys.ttl_seconds(), MAX_TOKEN_TTL_MINUTES * 60);

        let token = keys.issue(1, "nomad").unwrap();
        let claims = keys.validate(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_TOKEN_TTL_MINUTES * 60);
    }

    #[test]
    fn test_expiry_overflow_is_an_error() {
        let keys = TokenKeys::new(SECRET, 30);
        let result = keys.issue_at(1, "nomad", DateTime::<Utc>::MAX_UTC);
        assert!(matches!(result, Err(AuthError::Encoding(_))));
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
        assert_eq!(parse_bearer("bearer  xyz ").unwrap(), "xyz");
        assert!(matches!(parse_bearer("Basic abc"), Err(AuthError::MalformedCredential)));
        assert!(matches!(parse_bearer("Bearer"), Err(AuthError::MalformedCredential)));
        assert!(matches!(parse_bearer("Bearer    "), Err(AuthError::MalformedCredential)));
    }
}
