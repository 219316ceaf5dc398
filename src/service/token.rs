use crate::error::app_error::AppError;
use crate::models::session::CredentialPair;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims. `sid` binds every token to the session it was minted for,
/// so invalidation can target the exact session instead of guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub sid: Uuid,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl_minutes: i64, refresh_ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            access_ttl: Duration::minutes(access_ttl_minutes),
            refresh_ttl: Duration::days(refresh_ttl_days),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn issue_access(&self, user_id: Uuid, session_id: Uuid) -> Result<String, AppError> {
        self.issue(user_id, session_id, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, user_id: Uuid, session_id: Uuid) -> Result<String, AppError> {
        self.issue(user_id, session_id, TokenKind::Refresh, self.refresh_ttl)
    }

    pub fn issue_pair(&self, user_id: Uuid, session_id: Uuid) -> Result<CredentialPair, AppError> {
        Ok(CredentialPair {
            access_token: self.issue_access(user_id, session_id)?,
            refresh_token: self.issue_refresh(user_id, session_id)?,
        })
    }

    fn issue(&self, user_id: Uuid, session_id: Uuid, kind: TokenKind, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Decodes and verifies a token, additionally checking it is of the
    /// expected kind. An access token is never accepted where a refresh
    /// token is required and vice versa.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())?.claims;
        if claims.kind != expected {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("unit-test-secret", 30, 7)
    }

    #[test]
    fn round_trip_preserves_claims() {
        let tokens = service();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let token = tokens.issue_access(user_id, session_id).unwrap();
        let claims = tokens.decode(&token, TokenKind::Access).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn access_token_is_rejected_as_refresh() {
        let tokens = service();
        let token = tokens.issue_access(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(matches!(tokens.decode(&token, TokenKind::Refresh), Err(AppError::InvalidToken)));
    }

    #[test]
    fn refresh_token_is_rejected_as_access() {
        let tokens = service();
        let token = tokens.issue_refresh(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(matches!(tokens.decode(&token, TokenKind::Access), Err(AppError::InvalidToken)));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let tokens = service();
        let other = TokenService::new("some-other-secret", 30, 7);
        let token = other.issue_access(Uuid::new_v4(), Uuid::new_v4()).unwrap();
        assert!(matches!(tokens.decode(&token, TokenKind::Access), Err(AppError::InvalidToken)));
    }

    #[test]
    fn garbage_is_rejected() {
        let tokens = service();
        assert!(tokens.decode("not.a.token", TokenKind::Access).is_err());
    }

    #[test]
    fn ttl_is_reported_in_seconds() {
        assert_eq!(service().access_ttl_secs(), 30 * 60);
    }
}
