use crate::auth::CurrentUser;
use crate::error::app_error::AppError;
use crate::models::auth::MessageResponse;
use crate::models::session::SessionInfo;
use crate::service::session::SessionManager;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

/// Session-gated probe endpoint
#[openapi(tag = "Protected")]
#[get("/dashboard")]
pub async fn dashboard(current_user: CurrentUser) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!("Welcome back, {}", current_user.username)))
}

/// The caller's resolved identity
#[openapi(tag = "Protected")]
#[get("/profile")]
pub async fn profile(current_user: CurrentUser) -> Json<CurrentUser> {
    Json(current_user)
}

/// The caller's sessions, newest first
#[openapi(tag = "Protected")]
#[get("/sessions?<active_only>")]
pub async fn sessions(
    session_manager: &State<SessionManager>,
    current_user: CurrentUser,
    active_only: Option<bool>,
) -> Result<Json<Vec<SessionInfo>>, AppError> {
    let mut sessions = session_manager
        .get_user_sessions(current_user.id, active_only.unwrap_or(false))
        .await?;
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(sessions.iter().map(SessionInfo::from).collect()))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![dashboard, profile, sessions]
}
