use crate::error::app_error::AppError;
use crate::models::auth::{AuthorizationUrlResponse, TokenResponse};
use crate::models::user::{RegisterRequest, User};
use crate::service::oauth::{OAuthProfile, OAuthProvider, random_username_suffix, username_from_email};
use crate::service::session::SessionManager;
use crate::service::token::{TokenKind, TokenService};
use crate::service::user::UserService;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Login, registration and token lifecycle, composed from the user,
/// session and token services.
#[derive(Clone)]
pub struct AuthOrchestrator {
    users: UserService,
    sessions: SessionManager,
    tokens: TokenService,
    oauth: Option<Arc<dyn OAuthProvider>>,
}

impl AuthOrchestrator {
    pub fn new(
        users: UserService,
        sessions: SessionManager,
        tokens: TokenService,
        oauth: Option<Arc<dyn OAuthProvider>>,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            oauth,
        }
    }

    /// Uniqueness is checked before any write so a duplicate registration
    /// is rejected without side effects.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, AppError> {
        if self.users.get_by_email(&request.email).await?.is_some() {
            return Err(AppError::UserAlreadyExists(request.email.clone()));
        }
        if self.users.get_by_username(&request.username).await?.is_some() {
            return Err(AppError::UserAlreadyExists(request.username.clone()));
        }
        let user = self.users.create(request).await?;
        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<TokenResponse, AppError> {
        let user = self.users.authenticate(identifier, password).await?;
        self.open_session(&user, user_agent, ip_address).await
    }

    /// Exchanges a refresh token for a fresh access token, extending the
    /// session named in the token's claims. The refresh token itself is
    /// kept; only its access counterpart is reissued.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let claims = self.tokens.decode(refresh_token, TokenKind::Refresh)?;

        let session = self
            .sessions
            .get_session(claims.sid)
            .await?
            .ok_or(AppError::SessionNotFound)?;
        if !session.is_active || session.user_id != claims.sub {
            return Err(AppError::InvalidToken);
        }

        let access_token = self.tokens.issue_access(claims.sub, claims.sid)?;
        let pair = crate::models::session::CredentialPair {
            access_token,
            refresh_token: refresh_token.to_string(),
        };
        self.sessions.refresh_session(claims.sid, &pair).await?;

        Ok(TokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
            expires_in: self.tokens.access_ttl_secs(),
            session_id: claims.sid,
        })
    }

    pub async fn logout(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError> {
        self.sessions.invalidate_session(user_id, session_id).await?;
        info!(user_id = %user_id, session_id = %session_id, "Session invalidated");
        Ok(())
    }

    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let count = self.sessions.invalidate_all_user_sessions(user_id).await?;
        info!(user_id = %user_id, sessions = count, "All sessions invalidated");
        Ok(count)
    }

    pub fn oauth_authorization_url(&self) -> Result<AuthorizationUrlResponse, AppError> {
        let provider = self.oauth_provider()?;
        let state = Uuid::new_v4().simple().to_string();
        Ok(AuthorizationUrlResponse {
            authorization_url: provider.authorization_url(&state),
            state,
        })
    }

    /// Completes the provider flow: exchange the code, find or create the
    /// matching account, open a session.
    pub async fn oauth_callback(
        &self,
        code: &str,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<TokenResponse, AppError> {
        let provider = self.oauth_provider()?;
        let profile = provider.exchange_code(code).await?;
        let user = self.find_or_create_oauth_user(&profile).await?;
        if !user.is_active {
            return Err(AppError::Forbidden);
        }

        let response = self.open_session(&user, user_agent, ip_address).await?;

        // Provider profile blob, kept alongside the tokens for the UI.
        let blob = json!({
            "provider": profile.provider,
            "email": profile.email,
            "name": profile.full_name,
        });
        if let Err(e) = self
            .sessions
            .put_session_data(response.session_id, &blob, self.tokens.access_ttl_secs() as u64)
            .await
        {
            warn!(session_id = %response.session_id, error = %e, "Failed to cache provider profile");
        }

        Ok(response)
    }

    async fn find_or_create_oauth_user(&self, profile: &OAuthProfile) -> Result<User, AppError> {
        if let Some(user) = self.users.get_by_oauth(&profile.provider, &profile.subject_id).await? {
            return Ok(user);
        }
        // An existing password account with the same verified email gets
        // linked rather than duplicated.
        if let Some(user) = self.users.get_by_email(&profile.email).await? {
            return self.users.link_oauth(user.id, profile).await;
        }

        let mut username = username_from_email(&profile.email);
        if self.users.get_by_username(&username).await?.is_some() {
            username = format!("{}_{}", username, random_username_suffix());
            username.truncate(32);
        }
        self.users.create_from_oauth(profile, &username).await
    }

    async fn open_session(
        &self,
        user: &User,
        user_agent: Option<&str>,
        ip_address: Option<&str>,
    ) -> Result<TokenResponse, AppError> {
        let session_id = Uuid::new_v4();
        let pair = self.tokens.issue_pair(user.id, session_id)?;
        self.sessions
            .create_session(session_id, user.id, &pair, user_agent, ip_address)
            .await?;

        if let Err(e) = self.users.touch_last_login(user.id).await {
            warn!(user_id = %user.id, error = %e, "Failed to record last login");
        }
        info!(user_id = %user.id, session_id = %session_id, "Session opened");

        Ok(TokenResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
            expires_in: self.tokens.access_ttl_secs(),
            session_id,
        })
    }

    fn oauth_provider(&self) -> Result<&Arc<dyn OAuthProvider>, AppError> {
        self.oauth
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("OAuth login is not configured".to_string()))
    }
}
