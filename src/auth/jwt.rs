//! JWT token generation and validation

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::schemas::{UserDoc, UserRole};
use crate::types::{GatekeeperError, Result};

/// Claims carried by a Gatekeeper session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User document id (hex)
    pub sub: String,
    pub role: UserRole,
    /// Ledger-facing identity of the user
    pub external_id: String,
    pub name: String,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    /// Issue a token for an authenticated user
    pub fn issue(&self, user: &UserDoc) -> Result<(String, u64)> {
        let now = unix_now();
        let expires_at = now + self.expiry_seconds;

        let claims = Claims {
            sub: user
                ._id
                .map(|id| id.to_hex())
                .ok_or_else(|| GatekeeperError::Auth("User document missing id".into()))?,
            role: user.role,
            external_id: user.external_id.clone(),
            name: user.name.clone(),
            iat: now,
            exp: expires_at,
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| GatekeeperError::Auth(format!("Failed to sign token: {e}")))?;

        Ok((token, expires_at))
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| GatekeeperError::Auth(format!("Invalid token: {e}")))
    }
}

/// Strip the "Bearer " scheme from an Authorization header value
pub fn extract_token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    fn sample_user() -> UserDoc {
        let mut user = UserDoc::new(
            "RES-1001".into(),
            "Sam Resident".into(),
            "sam@example.com".into(),
            "555-0100".into(),
            "$argon2id$fake".into(),
            UserRole::Resident,
        );
        user._id = Some(ObjectId::new());
        user
    }

    #[test]
    fn test_issue_and_validate_roundtrip() {
        let validator = JwtValidator::new("test-secret", 3600);
        let user = sample_user();

        let (token, expires_at) = validator.issue(&user).unwrap();
        let claims = validator.validate(&token).unwrap();

        assert_eq!(claims.external_id, "RES-1001");
        assert_eq!(claims.role, UserRole::Resident);
        assert_eq!(claims.exp, expires_at);
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtValidator::new("secret-a", 3600);
        let checker = JwtValidator::new("secret-b", 3600);

        let (token, _) = issuer.issue(&sample_user()).unwrap();
        assert!(checker.validate(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_token_from_header("bearer abc123"), Some("abc123"));
        assert_eq!(extract_token_from_header("Basic abc123"), None);
        assert_eq!(extract_token_from_header("Bearer "), None);
    }
}
