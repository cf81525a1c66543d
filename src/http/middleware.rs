//! Admission and authentication middleware.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	extract::{ConnectInfo, Request, State},
	http::{HeaderMap, HeaderValue, header},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	admission::{Admission, ClientIdentity, IdentityError},
	app::App,
	credentials::Tokens,
	models::{User, Validator},
	store::Versioned,
};

/// Caller identity attached to every request by [`authenticate`].
#[derive(Clone, Debug)]
pub enum CurrentUser {
	/// No `Authorization` header was sent.
	Anonymous,
	/// A valid bearer token was presented.
	User(Box<Versioned<User>>),
}
impl CurrentUser {
	/// The authenticated user, if any.
	pub fn user(&self) -> Option<&Versioned<User>> {
		match self {
			CurrentUser::Anonymous => None,
			CurrentUser::User(user) => Some(&**user),
		}
	}
}

/// Rejects clients that exceeded their request budget with 429.
///
/// A request without a transport-level remote address is a server fault, not a denial.
pub async fn admit(State(app): State<App>, request: Request, next: Next) -> Response {
	if !app.admission.config().enabled {
		return next.run(request).await;
	}

	let remote = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
	let Some(remote) = remote else {
		return Error::from(IdentityError::Missing).into_response();
	};

	match app.admission.admit(&ClientIdentity::from_socket_addr(remote)) {
		Admission::Allowed => next.run(request).await,
		Admission::Denied => Error::AdmissionDenied.into_response(),
	}
}

/// Resolves an optional `Authorization: Bearer <token>` header into a [`CurrentUser`].
pub async fn authenticate(State(app): State<App>, mut request: Request, next: Next) -> Response {
	let mut response = match current_user(&app, request.headers()).await {
		Ok(user) => {
			request.extensions_mut().insert(user);

			next.run(request).await
		},
		Err(e) => e.into_response(),
	};

	response.headers_mut().append(header::VARY, HeaderValue::from_static("Authorization"));

	response
}

async fn current_user(app: &App, headers: &HeaderMap) -> Result<CurrentUser> {
	let Some(value) = headers.get(header::AUTHORIZATION) else {
		return Ok(CurrentUser::Anonymous);
	};
	let token = value
		.to_str()
		.ok()
		.and_then(|raw| raw.strip_prefix("Bearer "))
		.ok_or(Error::InvalidToken)?;
	let mut v = Validator::new();

	Tokens::validate_plaintext(&mut v, token);

	if !v.valid() {
		return Err(Error::InvalidToken);
	}

	let user = app.accounts.authenticated_user(token).await?;

	Ok(CurrentUser::User(Box::new(user)))
}
