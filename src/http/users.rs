//! `/v1/users` handlers.

// crates.io
use axum::{
	Json,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use serde_json::json;
// self
use crate::{
	_prelude::*,
	accounts::Registration,
	app::App,
	http::JsonBody,
	models::User,
	store::Versioned,
};

#[derive(Debug, Serialize)]
struct UserView<'a> {
	id: i64,
	#[serde(with = "time::serde::rfc3339")]
	created_at: OffsetDateTime,
	name: &'a str,
	email: &'a str,
	activated: bool,
}
impl<'a> From<&'a Versioned<User>> for UserView<'a> {
	fn from(row: &'a Versioned<User>) -> Self {
		Self {
			id: row.id.get(),
			created_at: row.created_at,
			name: &row.data.name,
			email: &row.data.email,
			activated: row.data.activated,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct Activation {
	#[serde(default)]
	token: String,
}

pub(super) async fn register(
	State(app): State<App>,
	JsonBody(input): JsonBody<Registration>,
) -> Result<Response> {
	let user = app.accounts.register(input).await?;

	Ok((StatusCode::ACCEPTED, Json(json!({ "user": UserView::from(&user) }))).into_response())
}

pub(super) async fn activate(
	State(app): State<App>,
	JsonBody(input): JsonBody<Activation>,
) -> Result<Response> {
	let user = app.accounts.activate(&input.token).await?;

	Ok(Json(json!({ "user": UserView::from(&user) })).into_response())
}
