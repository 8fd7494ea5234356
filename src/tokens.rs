//! Signed bearer tokens.
//!
//! Every token is an HS256 JWT signed with the shared `JWT_SECRET`. Three
//! claim shapes share the key, so each carries a `kind` and a token of one
//! kind never decodes as another.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token is malformed or has a bad signature")]
    Invalid,
    #[error("token encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    User,
    Admin,
    Reservation,
}

pub trait TokenClaims: Serialize + DeserializeOwned {
    const KIND: TokenKind;
    fn kind(&self) -> TokenKind;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserClaims {
    pub kind: TokenKind,
    pub id: i32,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl UserClaims {
    pub fn new(id: i32, username: &str, email: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            kind: TokenKind::User,
            id,
            username: username.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

impl TokenClaims for UserClaims {
    const KIND: TokenKind = TokenKind::User;
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminClaims {
    pub kind: TokenKind,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl AdminClaims {
    pub fn new(ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            kind: TokenKind::Admin,
            name: "admin".to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

impl TokenClaims for AdminClaims {
    const KIND: TokenKind = TokenKind::Admin;
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

/// Capability for exactly one reservation, handed out after a
/// (name, phone) match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationClaims {
    pub kind: TokenKind,
    pub reservation_id: i32,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl ReservationClaims {
    pub fn new(reservation_id: i32, name: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            kind: TokenKind::Reservation,
            reservation_id,
            name: name.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

impl TokenClaims for ReservationClaims {
    const KIND: TokenKind = TokenKind::Reservation;
    fn kind(&self) -> TokenKind {
        self.kind
    }
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue<C: TokenClaims>(&self, claims: &C) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    pub fn verify<C: TokenClaims>(&self, token: &str) -> Result<C, TokenError> {
        let data = decode::<C>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!(error = %e, "token rejected");
                    TokenError::Invalid
                }
            }
        })?;

        if data.claims.kind() != C::KIND {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::from_secret("test-secret")
    }

    #[test]
    fn user_token_round_trips() {
        let keys = keys();
        let claims = UserClaims::new(7, "jane", "jane@example.com", Duration::hours(24), Utc::now());
        let token = keys.issue(&claims).unwrap();
        let back: UserClaims = keys.verify(&token).unwrap();
        assert_eq!(back, claims);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = keys();
        let issued = Utc::now() - Duration::hours(2);
        let claims = ReservationClaims::new(1, "Jane Doe", Duration::hours(1), issued);
        let token = keys.issue(&claims).unwrap();
        assert_eq!(keys.verify::<ReservationClaims>(&token), Err(TokenError::Expired));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let claims = AdminClaims::new(Duration::hours(12), Utc::now());
        let token = TokenKeys::from_secret("other").issue(&claims).unwrap();
        assert_eq!(keys().verify::<AdminClaims>(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(keys().verify::<AdminClaims>("not.a.jwt"), Err(TokenError::Invalid));
    }

    #[test]
    fn user_token_is_not_an_admin_token() {
        let keys = keys();
        let claims = UserClaims::new(7, "jane", "jane@example.com", Duration::hours(1), Utc::now());
        let token = keys.issue(&claims).unwrap();
        assert_eq!(keys.verify::<AdminClaims>(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn kind_mismatch_with_matching_shape_is_invalid() {
        let keys = keys();
        let mut claims = AdminClaims::new(Duration::hours(1), Utc::now());
        claims.kind = TokenKind::User;
        let token = keys.issue(&claims).unwrap();
        assert_eq!(keys.verify::<AdminClaims>(&token), Err(TokenError::Invalid));
    }
}
