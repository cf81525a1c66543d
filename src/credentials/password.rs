//! Salted, adaptive password hashing.

// self
use crate::{_prelude::*, credentials::TokenSecret};

/// bcrypt work factor applied to every stored password.
pub const BCRYPT_COST: u32 = 12;

/// Unexpected password hashing failure; a plain mismatch is never an error.
#[derive(Debug, ThisError)]
pub enum PasswordError {
	/// bcrypt rejected the input or the stored hash.
	#[error("Password hashing failed.")]
	Hash(
		#[from]
		#[source]
		bcrypt::BcryptError,
	),
	/// A user record reached a password operation without a stored hash.
	#[error("Missing password hash for user.")]
	MissingHash,
}

/// A user's password: the stored bcrypt hash plus, transiently, the plaintext it came from.
///
/// Only the hash is serialized.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
	#[serde(skip)]
	plaintext: Option<TokenSecret>,
	hash: Option<String>,
}
impl Password {
	/// Hashes `plaintext` at [`BCRYPT_COST`].
	///
	/// This is CPU-bound for a noticeable fraction of a second; async callers should run it on
	/// a blocking thread.
	pub fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
		let hash = bcrypt::hash(plaintext, BCRYPT_COST)?;

		self.plaintext = Some(TokenSecret::new(plaintext));
		self.hash = Some(hash);

		Ok(())
	}

	/// Builds a password from a plaintext, hashing it.
	pub fn from_plaintext(plaintext: &str) -> Result<Self, PasswordError> {
		let mut password = Self::default();

		password.set(plaintext)?;

		Ok(password)
	}

	/// Returns whether `plaintext` hashes to the stored value.
	pub fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
		let hash = self.hash.as_deref().ok_or(PasswordError::MissingHash)?;

		Ok(bcrypt::verify(plaintext, hash)?)
	}

	/// Plaintext supplied in this request, if any.
	pub fn plaintext(&self) -> Option<&str> {
		self.plaintext.as_ref().map(TokenSecret::expose)
	}

	/// Stored hash, if any.
	pub fn hash(&self) -> Option<&str> {
		self.hash.as_deref()
	}

	/// Returns `true` once a hash is present.
	pub fn is_set(&self) -> bool {
		self.hash.is_some()
	}

	/// Drops the transient plaintext, keeping only the hash.
	pub fn forget_plaintext(&mut self) {
		self.plaintext = None;
	}
}
impl Debug for Password {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Password").field("is_set", &self.is_set()).finish_non_exhaustive()
	}
}
