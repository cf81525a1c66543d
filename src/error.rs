//! Crate-level error types shared across stores, credentials, admission, and the HTTP layer.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// `NotFound`, `EditConflict`, `Validation`, `DuplicateEmail`, and `AdmissionDenied` are
/// expected outcomes the caller can act on. Every other variant is a server-side fault and
/// is reported to clients without detail.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Password hashing failed for a reason other than a mismatch.
	#[error(transparent)]
	Password(#[from] crate::credentials::PasswordError),
	/// The transport-level client identity could not be derived.
	#[error(transparent)]
	Identity(#[from] crate::admission::IdentityError),
	/// Outbound mail delivery failed.
	#[error(transparent)]
	Mail(#[from] crate::mailer::MailError),

	/// The record or credential is absent, expired, or otherwise unusable.
	#[error("The requested resource could not be found.")]
	NotFound,
	/// The record changed since the caller last read it.
	#[error("Unable to update the record due to an edit conflict, please try again.")]
	EditConflict,
	/// Caller input violated one or more field constraints.
	#[error("Input failed validation: {0}.")]
	Validation(crate::models::ValidationErrors),
	/// Another user already owns the email address.
	#[error("A user with this email address already exists.")]
	DuplicateEmail,
	/// The client exhausted its request budget.
	#[error("Rate limit exceeded.")]
	AdmissionDenied,
	/// A store operation exceeded its deadline.
	#[error("Operation `{operation}` exceeded its deadline.")]
	Timeout {
		/// Operation label.
		operation: &'static str,
	},
	/// Email/password pair did not match a user.
	#[error("Invalid authentication credentials.")]
	InvalidCredentials,
	/// Bearer token was malformed, unknown, or expired.
	#[error("Invalid or missing authentication token.")]
	InvalidToken,
	/// The request itself could not be decoded.
	#[error("Malformed request: {message}.")]
	BadRequest {
		/// Client-facing description of the problem.
		message: String,
	},
	/// The route requires an authenticated user.
	#[error("You must be authenticated to access this resource.")]
	AuthenticationRequired,
	/// The route requires an activated user.
	#[error("Your user account must be activated to access this resource.")]
	InactiveAccount,
	/// The user lacks the permission code required by the route.
	#[error("Your user account doesn't have the necessary permissions to access this resource.")]
	NotPermitted,
	/// A programming invariant was violated.
	#[error("Internal error: {message}.")]
	Internal {
		/// Diagnostic message; never shown to clients.
		message: String,
	},
}
impl Error {
	/// Builds an [`Error::Internal`] from any displayable message.
	pub fn internal(message: impl Into<String>) -> Self {
		Self::Internal { message: message.into() }
	}

	/// Builds an [`Error::BadRequest`].
	pub fn bad_request(message: impl Into<String>) -> Self {
		Self::BadRequest { message: message.into() }
	}

	/// Returns `true` when the error is a server-side fault rather than a caller outcome.
	pub fn is_server_fault(&self) -> bool {
		matches!(
			self,
			Self::Storage(_)
				| Self::Config(_) | Self::Password(_)
				| Self::Identity(_)
				| Self::Mail(_) | Self::Timeout { .. }
				| Self::Internal { .. }
		)
	}
}
impl From<crate::models::ValidationErrors> for Error {
	fn from(errors: crate::models::ValidationErrors) -> Self {
		Self::Validation(errors)
	}
}

/// Configuration failures detected while loading or validating [`crate::config::Config`].
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// An environment variable held a value that could not be parsed.
	#[error("Environment variable `{key}` has an invalid value `{value}`.")]
	InvalidVar {
		/// Variable name.
		key: &'static str,
		/// Raw value.
		value: String,
	},
	/// The environment name is not one of the supported values.
	#[error("Environment must be one of development|staging|production, got `{0}`.")]
	UnknownEnvironment(String),
	/// Limiter rate must be strictly positive and finite.
	#[error("Limiter rate must be a positive number, got {0}.")]
	NonPositiveRate(f64),
	/// Limiter burst must allow at least one request.
	#[error("Limiter burst must be at least 1.")]
	ZeroBurst,
	/// A duration setting was zero.
	#[error("Setting `{0}` must be greater than zero.")]
	ZeroDuration(&'static str),
	/// The mailer relay URL could not be parsed.
	#[error("Mailer URL is invalid.")]
	InvalidMailerUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The bind address could not be opened.
	#[error("Unable to bind the listener.")]
	Bind {
		/// Underlying IO failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a listener bind failure.
	pub fn bind(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Bind { source: Box::new(src) }
	}
}
