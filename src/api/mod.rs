use rocket::{serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod admin;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, not_found, unprocessable]
}

/// Errors raised by Rocket itself before a handler runs still get the
/// structured error body.
fn rocket_error(kind: &str, req: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody {
        kind: kind.to_string(),
        reason: Some(format!("{} {}", req.method(), req.uri())),
        shortfall_km: None,
    })
}

#[catch(400)]
fn bad_request(req: &Request<'_>) -> Json<ErrorBody> {
    rocket_error("bad-request", req)
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> Json<ErrorBody> {
    rocket_error("not-found", req)
}

#[catch(422)]
fn unprocessable(req: &Request<'_>) -> Json<ErrorBody> {
    rocket_error("malformed-request", req)
}
