//! `/v1/tokens` handlers.

// crates.io
use axum::{
	Json,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, app::App, http::JsonBody};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ActivationRequest {
	#[serde(default)]
	email: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct Credentials {
	#[serde(default)]
	email: String,
	#[serde(default)]
	password: String,
}

pub(super) async fn create_activation(
	State(app): State<App>,
	JsonBody(input): JsonBody<ActivationRequest>,
) -> Result<Response> {
	app.accounts.request_activation_token(&input.email).await?;

	Ok((
		StatusCode::ACCEPTED,
		Json(json!({ "message": "an email will be sent to you containing activation instructions" })),
	)
		.into_response())
}

pub(super) async fn create_authentication(
	State(app): State<App>,
	JsonBody(input): JsonBody<Credentials>,
) -> Result<Response> {
	let token = app.accounts.authenticate(&input.email, &input.password).await?;
	let expiry = token
		.expires_at
		.format(&Rfc3339)
		.map_err(|e| Error::internal(format!("unformattable token expiry: {e}")))?;

	Ok((
		StatusCode::CREATED,
		Json(json!({
			"authentication_token": {
				"token": token.plaintext.expose(),
				"expiry": expiry,
			},
		})),
	)
		.into_response())
}
