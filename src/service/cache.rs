use crate::error::app_error::AppError;
use crate::models::session::CredentialPair;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::Value;
use uuid::Uuid;

fn tokens_key(session_id: Uuid) -> String {
    format!("session_tokens:{}", session_id)
}

fn data_key(session_id: Uuid) -> String {
    format!("session_data:{}", session_id)
}

/// Fast-path storage for live session tokens, keyed by session id. The
/// durable session row is authoritative; entries here expire on their own
/// and are deleted eagerly on invalidation.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn put_tokens(&self, session_id: Uuid, pair: &CredentialPair, ttl_secs: u64) -> Result<(), AppError>;
    async fn get_tokens(&self, session_id: Uuid) -> Result<Option<CredentialPair>, AppError>;
    async fn delete_tokens(&self, session_id: Uuid) -> Result<(), AppError>;
    /// Opaque per-session blob (provider profile data for OAuth logins).
    async fn put_session_data(&self, session_id: Uuid, data: &Value, ttl_secs: u64) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct RedisTokenCache {
    conn: ConnectionManager,
}

impl RedisTokenCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn put_tokens(&self, session_id: Uuid, pair: &CredentialPair, ttl_secs: u64) -> Result<(), AppError> {
        let payload = serde_json::to_string(pair).map_err(|e| AppError::cache(format!("Failed to encode token pair: {}", e)))?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(tokens_key(session_id), payload, ttl_secs).await?;
        Ok(())
    }

    async fn get_tokens(&self, session_id: Uuid) -> Result<Option<CredentialPair>, AppError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(tokens_key(session_id)).await?;
        match payload {
            Some(text) => {
                let pair = serde_json::from_str(&text).map_err(|e| AppError::cache(format!("Malformed cached token pair: {}", e)))?;
                Ok(Some(pair))
            }
            None => Ok(None),
        }
    }

    async fn delete_tokens(&self, session_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(tokens_key(session_id)).await?;
        Ok(())
    }

    async fn put_session_data(&self, session_id: Uuid, data: &Value, ttl_secs: u64) -> Result<(), AppError> {
        let payload = serde_json::to_string(data).map_err(|e| AppError::cache(format!("Failed to encode session data: {}", e)))?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(data_key(session_id), payload, ttl_secs).await?;
        Ok(())
    }
}
