//! Mapping from [`Error`] to status codes and the `{"error": ...}` envelope.

// crates.io
use axum::{
	Json,
	http::{HeaderValue, StatusCode, header},
	response::{IntoResponse, Response},
};
use serde_json::json;
// self
use crate::_prelude::*;

/// Body sent for every server-side fault; the detail only goes to the log.
pub const SERVER_ERROR_MESSAGE: &str =
	"the server encountered a problem and could not process your request";

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		if self.is_server_fault() {
			tracing::error!(error = %self, source = ?StdError::source(&self), "request failed");

			return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": SERVER_ERROR_MESSAGE })))
				.into_response();
		}

		let (status, body) = match &self {
			Error::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, json!(errors)),
			Error::DuplicateEmail => (
				StatusCode::UNPROCESSABLE_ENTITY,
				json!({ "email": "a user with this email address already exists" }),
			),
			Error::NotFound =>
				(StatusCode::NOT_FOUND, json!("the requested resource could not be found")),
			Error::EditConflict => (
				StatusCode::CONFLICT,
				json!("unable to update the record due to an edit conflict, please try again"),
			),
			Error::AdmissionDenied => (StatusCode::TOO_MANY_REQUESTS, json!("rate limit exceeded")),
			Error::BadRequest { message } => (StatusCode::BAD_REQUEST, json!(message)),
			Error::InvalidCredentials =>
				(StatusCode::UNAUTHORIZED, json!("invalid authentication credentials")),
			Error::InvalidToken =>
				(StatusCode::UNAUTHORIZED, json!("invalid or missing authentication token")),
			Error::AuthenticationRequired => (
				StatusCode::UNAUTHORIZED,
				json!("you must be authenticated to access this resource"),
			),
			Error::InactiveAccount => (
				StatusCode::FORBIDDEN,
				json!("your user account must be activated to access this resource"),
			),
			Error::NotPermitted => (
				StatusCode::FORBIDDEN,
				json!(
					"your user account doesn't have the necessary permissions to access this resource"
				),
			),
			_ => (StatusCode::INTERNAL_SERVER_ERROR, json!(SERVER_ERROR_MESSAGE)),
		};
		let mut response = (status, Json(json!({ "error": body }))).into_response();

		if matches!(self, Error::InvalidToken) {
			response.headers_mut().insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
		}

		response
	}
}
