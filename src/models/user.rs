use crate::error::app_error::AppError;
use crate::models::record::{opt_str, opt_timestamp, require_bool, require_str, require_timestamp, require_uuid};
use crate::store::engine::RecordMap;
use chrono::{DateTime, Utc};
use regex::Regex;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::sync::LazyLock;
use uuid::Uuid;
use validator::Validate;

pub static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{3,32}$").unwrap());

pub fn validate_username(username: &str) -> Result<(), validator::ValidationError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_username"))
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub hashed_password: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn from_record(record: &RecordMap) -> Result<Self, AppError> {
        Ok(Self {
            id: require_uuid(record, "id")?,
            email: require_str(record, "email")?,
            username: require_str(record, "username")?,
            full_name: opt_str(record, "full_name"),
            hashed_password: opt_str(record, "hashed_password"),
            is_active: require_bool(record, "is_active")?,
            is_superuser: require_bool(record, "is_superuser")?,
            oauth_provider: opt_str(record, "oauth_provider"),
            oauth_id: opt_str(record, "oauth_id"),
            created_at: require_timestamp(record, "created_at")?,
            updated_at: opt_timestamp(record, "updated_at")?,
            last_login: opt_timestamp(record, "last_login")?,
        })
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub oauth_provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            oauth_provider: user.oauth_provider.clone(),
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct UserUpdateRequest {
    #[validate(email)]
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

impl UserUpdateRequest {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.full_name.is_none() && self.password.is_none()
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct LoginRequest {
    /// Email address or username.
    #[validate(length(min = 1))]
    pub identifier: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_pattern() {
        assert!(USERNAME_RE.is_match("marta_01"));
        assert!(USERNAME_RE.is_match("a-b-c"));
        assert!(!USERNAME_RE.is_match("ab"));
        assert!(!USERNAME_RE.is_match("has space"));
        assert!(!USERNAME_RE.is_match("dots.not.allowed"));
    }

    #[test]
    fn register_request_validation() {
        let ok = RegisterRequest {
            email: "marta@example.dev".to_string(),
            username: "marta_01".to_string(),
            password: "long-enough-password".to_string(),
            full_name: None,
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterRequest {
            email: "not-an-email".to_string(),
            username: "x".to_string(),
            password: "short".to_string(),
            full_name: None,
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("username"));
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn username_hook_reports_its_own_code() {
        assert!(validate_username("marta_01").is_ok());
        let err = validate_username("has space").unwrap_err();
        assert_eq!(err.code, "invalid_username");
    }

    #[test]
    fn response_never_carries_the_hash() {
        let json = serde_json::to_value(schemars::schema_for!(UserResponse)).unwrap();
        assert!(!json.to_string().contains("hashed_password"));
    }
}
