use crate::error::app_error::AppError;
use crate::models::record::{opt_str, require_bool, require_timestamp, require_uuid};
use crate::store::engine::RecordMap;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;

/// Durable session row. The row is the audit trail; the token pair for a
/// live session lives in the cache under `session_tokens:{id}`.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl Session {
    pub fn from_record(record: &RecordMap) -> Result<Self, AppError> {
        Ok(Self {
            id: require_uuid(record, "id")?,
            user_id: require_uuid(record, "user_id")?,
            is_active: require_bool(record, "is_active")?,
            created_at: require_timestamp(record, "created_at")?,
            expires_at: require_timestamp(record, "expires_at")?,
            user_agent: opt_str(record, "user_agent"),
            ip_address: opt_str(record, "ip_address"),
        })
    }
}

/// Access/refresh token pair as cached per session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct SessionInfo {
    pub id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            is_active: session.is_active,
            created_at: session.created_at,
            expires_at: session.expires_at,
            user_agent: session.user_agent.clone(),
            ip_address: session.ip_address.clone(),
        }
    }
}
