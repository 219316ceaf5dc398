use crate::error::app_error::AppError;
use crate::models::session::{CredentialPair, Session};
use crate::rpc::RpcClient;
use crate::service::cache::TokenCache;
use crate::store::engine::RecordMap;
use crate::store::{FilterExpr, FilterOp};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const TABLE: &str = "user_sessions";

/// Session lifecycle over two stores: the durable session row is the
/// source of truth, the cache holds the live token pair with a TTL equal
/// to the access token lifetime.
#[derive(Clone)]
pub struct SessionManager {
    rpc: RpcClient,
    cache: Arc<dyn TokenCache>,
    access_ttl_secs: i64,
}

impl SessionManager {
    pub fn new(rpc: RpcClient, cache: Arc<dyn TokenCache>, access_ttl_secs: i64) -> Self {
        Self {
            rpc,
            cache,
            access_ttl_secs,
        }
    }

    /// Creates the durable session row under the caller-chosen id, then
    /// caches the token pair. A failed cache write after a successful
    /// durable write is an error, not a silent success: the row is marked
    /// inactive again before reporting it.
    pub async fn create_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        pair: &CredentialPair,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<Session, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.access_ttl_secs);

        let mut fields = RecordMap::new();
        fields.insert("id".to_string(), json!(session_id.to_string()));
        fields.insert("user_id".to_string(), json!(user_id.to_string()));
        fields.insert("is_active".to_string(), json!(true));
        fields.insert("created_at".to_string(), json!(now.to_rfc3339()));
        fields.insert("expires_at".to_string(), json!(expires_at.to_rfc3339()));
        if let Some(user_agent) = user_agent {
            fields.insert("user_agent".to_string(), json!(user_agent));
        }
        if let Some(ip_address) = ip_address {
            fields.insert("ip_address".to_string(), json!(ip_address));
        }
        self.rpc.create(TABLE, &fields).await?;

        if let Err(e) = self.cache.put_tokens(session_id, pair, self.access_ttl_secs as u64).await {
            warn!(session_id = %session_id, error = %e, "Cache write failed after durable session write, deactivating the row");
            let mut deactivate = RecordMap::new();
            deactivate.insert("is_active".to_string(), json!(false));
            let _ = self.rpc.update(TABLE, session_id, &deactivate).await;
            return Err(e);
        }

        Ok(Session {
            id: session_id,
            user_id,
            is_active: true,
            created_at: now,
            expires_at,
            user_agent: user_agent.map(str::to_string),
            ip_address: ip_address.map(str::to_string),
        })
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, AppError> {
        match self.rpc.get_map(TABLE, session_id).await? {
            Some(record) => Ok(Some(Session::from_record(&record)?)),
            None => Ok(None),
        }
    }

    /// Extends an existing session in place: same row, new expiry, new
    /// cached pair. Inactive or unknown sessions cannot be refreshed.
    pub async fn refresh_session(&self, session_id: Uuid, pair: &CredentialPair) -> Result<Session, AppError> {
        let session = self.get_session(session_id).await?.ok_or(AppError::SessionNotFound)?;
        if !session.is_active {
            return Err(AppError::SessionNotFound);
        }

        let expires_at = Utc::now() + Duration::seconds(self.access_ttl_secs);
        let mut fields = RecordMap::new();
        fields.insert("expires_at".to_string(), json!(expires_at.to_rfc3339()));
        if !self.rpc.update(TABLE, session_id, &fields).await? {
            return Err(AppError::SessionNotFound);
        }

        self.cache.put_tokens(session_id, pair, self.access_ttl_secs as u64).await?;

        Ok(Session {
            expires_at,
            ..session
        })
    }

    /// Live-token lookup, cache only. A miss means the session has no
    /// usable tokens, whatever the durable row says.
    pub async fn get_session_tokens(&self, session_id: Uuid) -> Result<Option<CredentialPair>, AppError> {
        self.cache.get_tokens(session_id).await
    }

    /// Invalidates one session of one user. Idempotent: an already
    /// inactive or unknown session is not an error. A session belonging
    /// to a different user is, and its cached pair must stay untouched,
    /// so ownership is checked before anything is deleted.
    pub async fn invalidate_session(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError> {
        let Some(session) = self.get_session(session_id).await? else {
            // No durable row means no owner; clearing any stray cache
            // entry is safe.
            self.cache.delete_tokens(session_id).await?;
            return Ok(());
        };
        if session.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        self.cache.delete_tokens(session_id).await?;
        if session.is_active {
            self.deactivate(session_id).await?;
        }
        Ok(())
    }

    /// Invalidates every active session of a user by walking the durable
    /// rows, never by scanning cache keys.
    pub async fn invalidate_all_user_sessions(&self, user_id: Uuid) -> Result<u64, AppError> {
        let sessions = self.get_user_sessions(user_id, true).await?;
        let mut count = 0u64;
        for session in sessions {
            self.cache.delete_tokens(session.id).await?;
            self.deactivate(session.id).await?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn get_user_sessions(&self, user_id: Uuid, active_only: bool) -> Result<Vec<Session>, AppError> {
        let mut filter = FilterExpr::eq("user_id", user_id.to_string());
        if active_only {
            filter = filter.and("is_active", FilterOp::Eq, true);
        }

        let mut sessions = Vec::new();
        let mut page = 1i64;
        loop {
            let (records, total) = self.rpc.list_maps(TABLE, page, 500, &filter).await?;
            if records.is_empty() {
                break;
            }
            for record in &records {
                sessions.push(Session::from_record(record)?);
            }
            if sessions.len() as i64 >= total {
                break;
            }
            page += 1;
        }
        Ok(sessions)
    }

    /// Opaque session-scoped blob, cached with its own TTL.
    pub async fn put_session_data(&self, session_id: Uuid, data: &serde_json::Value, ttl_secs: u64) -> Result<(), AppError> {
        self.cache.put_session_data(session_id, data, ttl_secs).await
    }

    async fn deactivate(&self, session_id: Uuid) -> Result<(), AppError> {
        let mut fields = RecordMap::new();
        fields.insert("is_active".to_string(), json!(false));
        self.rpc.update(TABLE, session_id, &fields).await?;
        Ok(())
    }
}
