//! HS256 session tokens.
//!
//! A token carries the user id and whether the user is an administrator. The web
//! binary only checks them; issuing happens through the `cli token` command.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    #[serde(default)]
    pub admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a token for `user_id` that expires after `ttl`.
pub fn issue_token(
    user_id: i64,
    admin: bool,
    secret: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        admin,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Checks the signature and expiry of `token` and returns its claims.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;

    Ok(data.claims)
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod tests {
    use super::{issue_token, validate_token};
    use chrono::Duration;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_round_trip_keeps_claims() {
        let token = issue_token(7, true, SECRET, Duration::hours(1)).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();

        assert_eq!(7, claims.sub);
        assert!(claims.admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token(7, false, SECRET, Duration::hours(1)).unwrap();

        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // beyond the default 60s leeway
        let token = issue_token(7, false, SECRET, Duration::minutes(-5)).unwrap();

        assert!(validate_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(validate_token("not.a.token", SECRET).is_err());
    }
}
