//! User accounts.

// self
use crate::{
	_prelude::*,
	credentials::Password,
	models::{Validator, validator::EMAIL_RX},
	store::Record,
};

/// Upper bound on a name's byte length.
pub const MAX_NAME_BYTES: usize = 500;

/// Caller-visible and server-managed user fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	/// Display name.
	pub name: String,
	/// Login address; unique across users, compared case-insensitively.
	pub email: String,
	/// Password hash (and, transiently, the submitted plaintext).
	pub password: Password,
	/// Whether the email address was confirmed.
	pub activated: bool,
}
impl User {
	/// Records every field failure in `v`.
	///
	/// Returns [`Error::Internal`] when the user carries no password hash; that state can only
	/// come from a programming error.
	pub fn validate(&self, v: &mut Validator) -> Result<()> {
		validate_name(v, &self.name);
		validate_email(v, &self.email);

		if let Some(plaintext) = self.password.plaintext() {
			validate_password_plaintext(v, plaintext);
		}

		if !self.password.is_set() {
			return Err(Error::internal("missing password hash for user"));
		}

		Ok(())
	}
}
impl Record for User {
	const KIND: &'static str = "user";

	fn unique_key(&self) -> Option<String> {
		Some(normalize_email(&self.email))
	}
}

/// Canonical form used for uniqueness and lookups.
pub fn normalize_email(email: &str) -> String {
	email.to_lowercase()
}

/// Records a failure in `v` unless `name` is present and at most 500 bytes long.
pub fn validate_name(v: &mut Validator, name: &str) {
	v.check(!name.is_empty(), "name", "must be provided");
	v.check(name.len() <= MAX_NAME_BYTES, "name", "must not be more than 500 bytes long");
}

/// Records a failure in `v` unless `email` is present and well-formed.
pub fn validate_email(v: &mut Validator, email: &str) {
	v.check(!email.is_empty(), "email", "must be provided");
	v.check(EMAIL_RX.is_match(email), "email", "must be a valid email address");
}

/// Records a failure in `v` unless `plaintext` is 8 to 72 bytes long.
pub fn validate_password_plaintext(v: &mut Validator, plaintext: &str) {
	v.check(!plaintext.is_empty(), "password", "must be provided");
	v.check(plaintext.len() >= 8, "password", "must be at least 8 bytes long");
	v.check(plaintext.len() <= 72, "password", "must not be more than 72 bytes long");
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn validation_covers_name_email_and_password() {
		let user = User {
			name: String::new(),
			email: "nope".into(),
			password: Password::from_plaintext("short").expect("Hashing fixture should succeed."),
			activated: false,
		};
		let mut v = Validator::new();

		user.validate(&mut v).expect("Hashed user should not be an internal error.");

		let errors = v.finish().expect_err("Invalid user should fail validation.");

		assert_eq!(errors.get("name"), Some("must be provided"));
		assert_eq!(errors.get("email"), Some("must be a valid email address"));
		assert_eq!(errors.get("password"), Some("must be at least 8 bytes long"));
	}

	#[test]
	fn missing_hash_is_an_internal_error() {
		let user = User { name: "Alice".into(), email: "alice@example.com".into(), ..Default::default() };
		let mut v = Validator::new();

		assert!(matches!(user.validate(&mut v), Err(Error::Internal { .. })));
	}

	#[test]
	fn unique_key_ignores_case() {
		let user = User { email: "Alice@Example.COM".into(), ..Default::default() };

		assert_eq!(user.unique_key().as_deref(), Some("alice@example.com"));
	}
}
