use crate::error::app_error::AppError;
use crate::models::health::HealthResponse;
use crate::rpc::RpcClient;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

/// Liveness of the gateway and the record service behind it
#[openapi(tag = "Health")]
#[get("/")]
pub async fn healthcheck(rpc: &State<RpcClient>) -> Result<(Status, Json<HealthResponse>), AppError> {
    let backend = rpc.health_check().await?;
    let status = if backend.healthy { Status::Ok } else { Status::ServiceUnavailable };
    Ok((
        status,
        Json(HealthResponse {
            status: if backend.healthy { "ok" } else { "degraded" },
            version: backend.version,
            message: backend.message,
        }),
    ))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![healthcheck]
}
