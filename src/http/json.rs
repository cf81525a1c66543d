//! Strict JSON request bodies.

// crates.io
use axum::{
	async_trait,
	body::Bytes,
	extract::{FromRequest, Request},
	http::StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;
// self
use crate::{_prelude::*, http::MAX_BODY_BYTES};

/// Extractor that decodes the body with [`decode_json`].
#[derive(Clone, Debug)]
pub struct JsonBody<T>(pub T);
#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
			if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
				Error::bad_request(format!("body must not be larger than {MAX_BODY_BYTES} bytes"))
			} else {
				Error::bad_request(rejection.body_text())
			}
		})?;

		decode_json(&bytes).map(Self)
	}
}

/// Decodes exactly one JSON value from `bytes`.
///
/// Empty bodies and trailing data are rejected. Type errors name the offending field path.
pub fn decode_json<T>(bytes: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Err(Error::bad_request("body must not be empty"));
	}

	let mut de = serde_json::Deserializer::from_slice(bytes);
	let value = serde_path_to_error::deserialize(&mut de).map_err(|e| {
		let path = e.path().to_string();
		let inner = e.into_inner();

		Error::bad_request(match inner.classify() {
			Category::Syntax | Category::Eof => format!(
				"body contains badly-formed JSON (at line {} column {})",
				inner.line(),
				inner.column()
			),
			Category::Data if path == "." => format!("body contains invalid JSON: {inner}"),
			Category::Data => format!("body contains incorrect JSON for field `{path}`: {inner}"),
			Category::Io => "body could not be read".to_owned(),
		})
	})?;

	de.end().map_err(|_| Error::bad_request("body must only contain a single JSON value"))?;

	Ok(value)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	#[serde(deny_unknown_fields)]
	struct Payload {
		year: i32,
	}

	fn message(result: Result<Payload>) -> String {
		match result {
			Err(Error::BadRequest { message }) => message,
			other => panic!("Expected a bad request, got {other:?}."),
		}
	}

	#[test]
	fn rejects_malformed_bodies_with_specific_messages() {
		assert_eq!(message(decode_json(b"  ")), "body must not be empty");
		assert!(message(decode_json(b"{\"year\": ")).starts_with("body contains badly-formed JSON"));
		assert!(message(decode_json(b"{\"year\": \"1999\"}")).contains("`year`"));
		assert!(message(decode_json(b"{\"year\": 1999, \"rating\": 5}")).contains("unknown field"));
		assert_eq!(
			message(decode_json(b"{\"year\": 1999} {}")),
			"body must only contain a single JSON value"
		);
	}

	#[test]
	fn accepts_a_single_value() {
		let payload: Payload = decode_json(b"{\"year\": 1999}\n").expect("Valid body should decode.");

		assert_eq!(payload.year, 1999);
	}
}
