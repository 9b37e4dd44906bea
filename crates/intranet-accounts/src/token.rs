//! HS256 session tokens.

use crate::{AccountError, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token. The front end reads the profile
/// fields to decide what to show before making any other request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id, as a decimal string.
    pub sub: String,
    pub role: String,
    pub profile_incomplete: bool,
    pub profile_image: String,
    pub sector: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Signs and checks session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_hours: i64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_hours", &self.ttl_hours)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_hours,
        }
    }

    /// Issues a token reflecting the account as currently stored.
    pub fn issue(&self, user: &User) -> Result<String, AccountError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            role: user.role.label().to_string(),
            profile_incomplete: user.profile_incomplete(),
            profile_image: user.profile_image.clone(),
            sector: user.sector.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AccountError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intranet_types::Role;

    fn user() -> User {
        User {
            id: 42,
            username: "ana@example.com".into(),
            password_hash: "hash".into(),
            is_verified: true,
            verification_code: None,
            reset_token: None,
            reset_token_expires_at: None,
            first_name: Some("Ana".into()),
            last_name: None,
            extension: None,
            birth_date: None,
            sector: Some("Sales".into()),
            branch: None,
            profile_image: "default.png".into(),
            on_call_group: None,
            role: Role::Editor,
            created_at: "2025-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn issued_tokens_verify_with_the_same_secret() {
        let issuer = TokenIssuer::new("test-secret", 24);
        let token = issuer.issue(&user()).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.role, "EDITOR");
        assert!(claims.profile_incomplete);
        assert_eq!(claims.sector.as_deref(), Some("Sales"));
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn other_secrets_and_garbage_are_rejected() {
        let token = TokenIssuer::new("one", 24).issue(&user()).unwrap();
        assert!(TokenIssuer::new("two", 24).verify(&token).is_err());
        assert!(TokenIssuer::new("one", 24).verify("not.a.token").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        // Past the default 60s leeway.
        let issuer = TokenIssuer::new("test-secret", -1);
        let token = issuer.issue(&user()).unwrap();
        assert!(matches!(
            issuer.verify(&token),
            Err(AccountError::Token(_))
        ));
    }
}
