//! Bearer-token authentication.
//!
//! Both the REST layer and the gateway handshake accept the same HS256 JWT.
//! The token is opaque to clients; the server verifies the signature and
//! expiry, then resolves the subject claim to a stored user. A token whose
//! subject no longer exists is rejected even if the signature is valid.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::TOKEN_TTL_HOURS;
use crate::types::UserId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Malformed subject claim")]
    BadSubject,
}

/// Claims carried by a Hirelink bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the user's id.
    pub sub: String,
    /// Display name, so the gateway can announce presence without a store
    /// round-trip.
    pub name: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: UserId, name: impl Into<String>, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            name: name.into(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }

    pub fn user_id(&self) -> Result<UserId, AuthError> {
        UserId::parse(&self.sub).map_err(|_| AuthError::BadSubject)
    }
}

/// Issues and verifies bearer tokens with a shared HS256 secret.
pub struct TokenAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenAuth {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::default(),
        }
    }

    /// Issue a token for `user_id` valid for the default TTL.
    pub fn issue(&self, user_id: UserId, name: &str) -> Result<String, AuthError> {
        let claims = Claims::new(user_id, name, Duration::hours(TOKEN_TTL_HOURS));
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| AuthError::Invalid)
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify_roundtrip() {
        let auth = TokenAuth::new(b"test-secret");
        let user = UserId::new();

        let token = auth.issue(user, "Frida").unwrap();
        let claims = auth.verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user);
        assert_eq!(claims.name, "Frida");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = TokenAuth::new(b"secret-a");
        let verifier = TokenAuth::new(b"secret-b");

        let token = issuer.issue(UserId::new(), "Eve").unwrap();
        assert_eq!(verifier.verify(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = TokenAuth::new(b"test-secret");
        let claims = Claims::new(UserId::new(), "Old", Duration::hours(-2));
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_eq!(auth.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let auth = TokenAuth::new(b"test-secret");
        assert_eq!(auth.verify("not-a-token"), Err(AuthError::Invalid));
    }
}
