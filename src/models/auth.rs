use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;

#[derive(Serialize, Debug, JsonSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub session_id: Uuid,
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct OAuthCallbackRequest {
    pub code: String,
    pub state: Option<String>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct AuthorizationUrlResponse {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
