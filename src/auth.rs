use crate::error::app_error::AppError;
use crate::service::session::SessionManager;
use crate::service::token::{TokenKind, TokenService};
use crate::service::user::UserService;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use schemars::JsonSchema;
use serde::Serialize;
use uuid::Uuid;

pub const SESSION_HEADER: &str = "X-Session-Id";

/// Authenticated caller, resolved from the session header. The session's
/// cached access token is decoded and checked against the session it was
/// minted for before the account is loaded.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CurrentUser {
    pub id: Uuid,
    pub session_id: Uuid,
    pub email: String,
    pub username: String,
    pub is_superuser: bool,
}

async fn resolve_user(req: &Request<'_>) -> Result<CurrentUser, AppError> {
    let header = req.headers().get_one(SESSION_HEADER).ok_or(AppError::Unauthorized)?;
    let session_id = Uuid::parse_str(header).map_err(|_| AppError::Unauthorized)?;

    let sessions = req
        .rocket()
        .state::<SessionManager>()
        .ok_or_else(|| AppError::Upstream("Session manager not initialized".to_string()))?;
    let tokens = req
        .rocket()
        .state::<TokenService>()
        .ok_or_else(|| AppError::Upstream("Token service not initialized".to_string()))?;
    let users = req
        .rocket()
        .state::<UserService>()
        .ok_or_else(|| AppError::Upstream("User service not initialized".to_string()))?;

    let pair = sessions
        .get_session_tokens(session_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let claims = tokens.decode(&pair.access_token, TokenKind::Access)?;
    if claims.sid != session_id {
        return Err(AppError::InvalidToken);
    }

    let user = users.get_by_id(claims.sub).await?.ok_or(AppError::Unauthorized)?;
    if !user.is_active {
        return Err(AppError::Unauthorized);
    }

    Ok(CurrentUser {
        id: user.id,
        session_id,
        email: user.email,
        username: user.username,
        is_superuser: user.is_superuser,
    })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        match resolve_user(req).await {
            Ok(current_user) => {
                req.local_cache(|| Some(current_user.clone()));
                Outcome::Success(current_user)
            }
            Err(e) => {
                let status = match &e {
                    AppError::Db { .. } | AppError::Cache { .. } | AppError::Upstream(_) => Status::InternalServerError,
                    _ => Status::Unauthorized,
                };
                Outcome::Error((status, e))
            }
        }
    }
}

/// Guard for admin-only routes. Authenticated but non-superuser callers
/// are rejected with 403.
#[derive(Debug, Clone, Serialize)]
pub struct Superuser(pub CurrentUser);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Superuser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        match CurrentUser::from_request(req).await {
            Outcome::Success(user) if user.is_superuser => Outcome::Success(Superuser(user)),
            Outcome::Success(_) => Outcome::Error((Status::Forbidden, AppError::Forbidden)),
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}

fn session_security_scheme() -> (SecurityScheme, SecurityRequirement) {
    let security_scheme = SecurityScheme {
        description: Some("Session-based authentication. Log in via POST /api/auth/login and pass the returned session id in this header.".to_string()),
        data: SecuritySchemeData::ApiKey {
            name: SESSION_HEADER.to_string(),
            location: "header".to_string(),
        },
        extensions: Object::default(),
    };

    let mut security_req = SecurityRequirement::new();
    security_req.insert("sessionAuth".to_string(), Vec::new());

    (security_scheme, security_req)
}

impl<'a> OpenApiFromRequest<'a> for CurrentUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        let (scheme, requirement) = session_security_scheme();
        Ok(RequestHeaderInput::Security("sessionAuth".to_string(), scheme, requirement))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response};
        let mut responses = Responses::default();
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(Response {
                description: "Unauthorized - Authentication required".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

impl<'a> OpenApiFromRequest<'a> for Superuser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        let (scheme, requirement) = session_security_scheme();
        Ok(RequestHeaderInput::Security("sessionAuth".to_string(), scheme, requirement))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response};
        let mut responses = Responses::default();
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(Response {
                description: "Unauthorized - Authentication required".to_string(),
                ..Default::default()
            }),
        );
        responses.responses.insert(
            "403".to_string(),
            RefOr::Object(Response {
                description: "Forbidden - Superuser privileges required".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}
