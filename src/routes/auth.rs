use crate::auth::CurrentUser;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::{ClientIp, UserAgent};
use crate::models::auth::{AuthorizationUrlResponse, MessageResponse, OAuthCallbackRequest, TokenResponse};
use crate::models::user::{LoginRequest, RefreshRequest, RegisterRequest, UserResponse};
use crate::service::auth::AuthOrchestrator;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use validator::Validate;

/// Register a new account
#[openapi(tag = "Auth")]
#[post("/register", data = "<payload>")]
pub async fn register(auth: &State<AuthOrchestrator>, payload: JsonBody<RegisterRequest>) -> Result<(Status, Json<UserResponse>), AppError> {
    payload.validate()?;

    let user = auth.register(&payload).await?;
    Ok((Status::Created, Json(UserResponse::from(&user))))
}

/// Log in with email or username and password
#[openapi(tag = "Auth")]
#[post("/login", data = "<payload>")]
pub async fn login(
    auth: &State<AuthOrchestrator>,
    user_agent: UserAgent,
    client_ip: ClientIp,
    payload: JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    payload.validate()?;

    let response = auth
        .login(&payload.identifier, &payload.password, user_agent.0.as_deref(), client_ip.0.as_deref())
        .await?;
    Ok(Json(response))
}

/// Exchange a refresh token for a fresh access token
#[openapi(tag = "Auth")]
#[post("/refresh", data = "<payload>")]
pub async fn refresh(auth: &State<AuthOrchestrator>, payload: JsonBody<RefreshRequest>) -> Result<Json<TokenResponse>, AppError> {
    let response = auth.refresh(&payload.refresh_token).await?;
    Ok(Json(response))
}

/// Invalidate the calling session
#[openapi(tag = "Auth")]
#[post("/logout")]
pub async fn logout(auth: &State<AuthOrchestrator>, current_user: CurrentUser) -> Result<Json<MessageResponse>, AppError> {
    auth.logout(current_user.id, current_user.session_id).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

/// Invalidate every active session of the calling user
#[openapi(tag = "Auth")]
#[post("/logout-all")]
pub async fn logout_all(auth: &State<AuthOrchestrator>, current_user: CurrentUser) -> Result<Json<MessageResponse>, AppError> {
    let count = auth.logout_all(current_user.id).await?;
    Ok(Json(MessageResponse::new(format!("Invalidated {} sessions", count))))
}

/// Start the OAuth authorization-code flow
#[openapi(tag = "Auth")]
#[get("/oauth/login")]
pub async fn oauth_login(auth: &State<AuthOrchestrator>) -> Result<Json<AuthorizationUrlResponse>, AppError> {
    Ok(Json(auth.oauth_authorization_url()?))
}

/// Complete the OAuth flow with the provider's authorization code
#[openapi(tag = "Auth")]
#[post("/oauth/callback", data = "<payload>")]
pub async fn oauth_callback(
    auth: &State<AuthOrchestrator>,
    user_agent: UserAgent,
    client_ip: ClientIp,
    payload: JsonBody<OAuthCallbackRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let response = auth
        .oauth_callback(&payload.code, user_agent.0.as_deref(), client_ip.0.as_deref())
        .await?;
    Ok(Json(response))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![register, login, refresh, logout, logout_all, oauth_login, oauth_callback]
}
