//! JSON-over-HTTP surface built on axum.
//!
//! Middleware runs outermost first: panic recovery, request tracing, admission control
//! (keyed by the connection's remote address), then bearer authentication. Handlers enforce
//! permissions themselves through [`Accounts::authorize`](crate::accounts::Accounts::authorize).

mod error;
mod json;
mod middleware;
mod movies;
mod tokens;
mod users;

pub use json::{JsonBody, decode_json};
pub use middleware::CurrentUser;

// std
use std::any::Any;
// crates.io
use axum::{
	Json, Router,
	extract::{DefaultBodyLimit, State},
	http::{HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
// self
use crate::{_prelude::*, app::App};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Builds the complete router over `app`.
pub fn router(app: App) -> Router {
	Router::new()
		.route("/v1/healthcheck", get(healthcheck))
		.route("/v1/movies", get(movies::list).post(movies::create))
		.route("/v1/movies/:id", get(movies::show).patch(movies::update).delete(movies::delete))
		.route("/v1/users", post(users::register))
		.route("/v1/users/activated", put(users::activate))
		.route("/v1/tokens/activation", post(tokens::create_activation))
		.route("/v1/tokens/authentication", post(tokens::create_authentication))
		.fallback(not_found)
		.layer(axum::middleware::from_fn_with_state(app.clone(), middleware::authenticate))
		.layer(axum::middleware::from_fn_with_state(app.clone(), middleware::admit))
		.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
		.layer(TraceLayer::new_for_http())
		.layer(CatchPanicLayer::custom(panic_response))
		.with_state(app)
}

async fn healthcheck(State(app): State<App>) -> Json<serde_json::Value> {
	Json(json!({
		"status": "available",
		"system_info": {
			"environment": app.config.env.as_str(),
			"version": env!("CARGO_PKG_VERSION"),
		},
	}))
}

async fn not_found() -> Error {
	Error::NotFound
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
	let detail = payload
		.downcast_ref::<&str>()
		.map(|s| (*s).to_owned())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "non-string panic payload".into());

	tracing::error!(panic = %detail, "request handler panicked");

	let mut response = (
		StatusCode::INTERNAL_SERVER_ERROR,
		Json(json!({ "error": error::SERVER_ERROR_MESSAGE })),
	)
		.into_response();

	response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));

	response
}
