use crate::auth::{CurrentUser, Superuser};
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::models::pagination::PaginatedResponse;
use crate::models::user::{UserResponse, UserUpdateRequest};
use crate::service::user::UserService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, delete, get, put};
use rocket_okapi::openapi;
use uuid::Uuid;
use validator::Validate;

/// Get the calling user's profile
#[openapi(tag = "Users")]
#[get("/me")]
pub async fn get_me(users: &State<UserService>, current_user: CurrentUser) -> Result<Json<UserResponse>, AppError> {
    let user = users.get_by_id(current_user.id).await?.ok_or(AppError::UserNotFound)?;
    Ok(Json(UserResponse::from(&user)))
}

/// Update the calling user's profile
#[openapi(tag = "Users")]
#[put("/me", data = "<payload>")]
pub async fn put_me(
    users: &State<UserService>,
    current_user: CurrentUser,
    payload: JsonBody<UserUpdateRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let user = users.update(current_user.id, &payload).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// List accounts (admin only)
#[openapi(tag = "Users")]
#[get("/?<page>&<page_size>")]
pub async fn list_users(
    users: &State<UserService>,
    _admin: Superuser,
    page: Option<i64>,
    page_size: Option<i64>,
) -> Result<Json<PaginatedResponse<UserResponse>>, AppError> {
    let page = page.unwrap_or(1);
    let page_size = page_size.unwrap_or(50);
    let (items, total) = users.list(page, page_size).await?;
    let data = items.iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, page, page_size, total)))
}

/// Get one account (admin only)
#[openapi(tag = "Users")]
#[get("/<id>")]
pub async fn get_user(users: &State<UserService>, _admin: Superuser, id: &str) -> Result<Json<UserResponse>, AppError> {
    let id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid user id", e))?;
    let user = users.get_by_id(id).await?.ok_or(AppError::UserNotFound)?;
    Ok(Json(UserResponse::from(&user)))
}

/// Update one account (admin only)
#[openapi(tag = "Users")]
#[put("/<id>", data = "<payload>")]
pub async fn put_user(
    users: &State<UserService>,
    _admin: Superuser,
    id: &str,
    payload: JsonBody<UserUpdateRequest>,
) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid user id", e))?;
    let user = users.update(id, &payload).await?;
    Ok(Json(UserResponse::from(&user)))
}

/// Delete one account (admin only)
#[openapi(tag = "Users")]
#[delete("/<id>")]
pub async fn delete_user(users: &State<UserService>, _admin: Superuser, id: &str) -> Result<Status, AppError> {
    let id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid user id", e))?;
    users.delete(id).await?;
    Ok(Status::NoContent)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_me, put_me, list_users, get_user, put_user, delete_user]
}
