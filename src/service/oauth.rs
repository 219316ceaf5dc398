use crate::error::app_error::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

/// Identity returned by a provider after code exchange.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider: String,
    pub subject_id: String,
    pub email: String,
    pub full_name: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorization_url(&self, state: &str) -> String;
    async fn exchange_code(&self, code: &str) -> Result<OAuthProfile, AppError>;
}

#[derive(Debug, Clone, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct UserInfoResponse {
    sub: String,
    email: String,
    name: Option<String>,
}

/// Generic authorization-code flow against any provider exposing the
/// usual three endpoints.
pub struct HttpOAuthProvider {
    client: reqwest::Client,
    provider: String,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    redirect_uri: String,
}

impl HttpOAuthProvider {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        userinfo_url: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider: provider.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            userinfo_url: userinfo_url.into(),
            redirect_uri: redirect_uri.into(),
        }
    }
}

#[async_trait]
impl OAuthProvider for HttpOAuthProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope=openid%20email%20profile&state={}",
            self.auth_url, self.client_id, self.redirect_uri, state
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<OAuthProfile, AppError> {
        let token: TokenExchangeResponse = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Token exchange failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Token exchange rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed token response: {}", e)))?;

        let info: UserInfoResponse = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Userinfo request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("Userinfo request rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed userinfo response: {}", e)))?;

        Ok(OAuthProfile {
            provider: self.provider.clone(),
            subject_id: info.sub,
            email: info.email,
            full_name: info.name,
        })
    }
}

/// Derives a username candidate from the email's local part. Collisions
/// get a random suffix appended by the caller.
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let mut name: String = local
        .to_lowercase()
        .chars()
        .map(|c| if c == '.' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    while name.len() < 3 {
        name.push('_');
    }
    name.truncate(32);
    name
}

pub fn random_username_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..6].to_string()
}
