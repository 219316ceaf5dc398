use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::{Data, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Correlation id minted per request and echoed back in `X-Request-Id`.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.local_cache(|| None::<RequestId>) {
            Some(id) => Outcome::Success(*id),
            // The fairing has not run (direct guard use in tests).
            None => Outcome::Success(RequestId::new()),
        }
    }
}

struct RequestStart(Instant);

/// Stamps each request with a correlation id and writes one structured
/// log line on arrival and one on completion, with elapsed time.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let id = RequestId::new();
        request.local_cache(|| Some(id));
        request.local_cache(|| RequestStart(Instant::now()));

        info!(request_id = %id, method = %request.method(), uri = %request.uri(), "incoming request");
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let id = request
            .local_cache(|| None::<RequestId>)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let elapsed_ms = request.local_cache(|| RequestStart(Instant::now())).0.elapsed().as_millis() as u64;
        let status = response.status();

        response.set_header(Header::new("X-Request-Id", id.clone()));
        response.set_header(Header::new("X-Content-Type-Options", "nosniff"));
        response.set_header(Header::new("X-Frame-Options", "DENY"));
        response.set_header(Header::new("Cache-Control", "no-store"));

        if status.class().is_client_error() || status.class().is_server_error() {
            warn!(
                request_id = %id,
                method = %request.method(),
                uri = %request.uri(),
                status = status.code,
                elapsed_ms = elapsed_ms,
                "request completed with error"
            );
        } else {
            info!(
                request_id = %id,
                method = %request.method(),
                uri = %request.uri(),
                status = status.code,
                elapsed_ms = elapsed_ms,
                "request completed"
            );
        }
    }
}

/// `User-Agent` header of the calling client, recorded on the session row.
pub struct UserAgent(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserAgent {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        Outcome::Success(UserAgent(req.headers().get_one("User-Agent").map(str::to_string)))
    }
}

impl<'a> OpenApiFromRequest<'a> for UserAgent {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

/// Client address as Rocket resolves it, recorded on the session row.
pub struct ClientIp(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        Outcome::Success(ClientIp(req.client_ip().map(|ip| ip.to_string())))
    }
}

impl<'a> OpenApiFromRequest<'a> for ClientIp {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_distinct() {
        assert_ne!(RequestId::new().0, RequestId::new().0);
    }
}
