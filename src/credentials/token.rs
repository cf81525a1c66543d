//! Opaque bearer tokens: plaintext generation, one-way hashing, and scope labels.

// crates.io
use data_encoding::{BASE32_NOPAD, HEXLOWER};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, store::RecordId};

/// Length of every token plaintext: 16 random bytes in unpadded base-32.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// Category of action a token authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
	/// Confirms ownership of a freshly registered email address.
	Activation,
	/// Stateful bearer credential for API calls.
	Authentication,
}
impl TokenScope {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenScope::Activation => "activation",
			TokenScope::Authentication => "authentication",
		}
	}
}
impl Display for TokenScope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Plaintext credential material that never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a plaintext.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the plaintext. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// SHA-256 digest of a token plaintext; the only form that is ever stored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenHash([u8; 32]);
impl TokenHash {
	/// Hashes `plaintext`.
	pub fn of(plaintext: &str) -> Self {
		Self(Sha256::digest(plaintext.as_bytes()).into())
	}

	/// Raw digest bytes.
	pub fn as_bytes(&self) -> &[u8; 32] {
		&self.0
	}
}
impl Debug for TokenHash {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenHash({}..)", &HEXLOWER.encode(&self.0)[..8])
	}
}

/// A freshly issued token. The plaintext exists only in this value.
#[derive(Clone, Debug)]
pub struct Token {
	/// Value handed to the client exactly once.
	pub plaintext: TokenSecret,
	/// Digest persisted in the token store.
	pub hash: TokenHash,
	/// Owning user.
	pub user_id: RecordId,
	/// Instant after which the token no longer resolves.
	pub expires_at: OffsetDateTime,
	/// Authorized action.
	pub scope: TokenScope,
}
impl Token {
	/// Generates a token from 16 bytes of OS-seeded randomness.
	pub fn generate(
		user_id: RecordId,
		ttl: Duration,
		scope: TokenScope,
		now: OffsetDateTime,
	) -> Self {
		let bytes = rand::random::<[u8; 16]>();
		let plaintext = BASE32_NOPAD.encode(&bytes);
		let hash = TokenHash::of(&plaintext);

		Self { plaintext: TokenSecret(plaintext), hash, user_id, expires_at: now + ttl, scope }
	}

	/// The persisted form: everything except the plaintext.
	pub fn stored(&self) -> StoredToken {
		StoredToken {
			hash: self.hash,
			user_id: self.user_id,
			expires_at: self.expires_at,
			scope: self.scope,
		}
	}
}

/// Server-side token record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
	/// Digest of the plaintext.
	pub hash: TokenHash,
	/// Owning user.
	pub user_id: RecordId,
	/// Expiry instant.
	pub expires_at: OffsetDateTime,
	/// Authorized action.
	pub scope: TokenScope,
}
impl StoredToken {
	/// Returns `true` while `now` is strictly before the expiry.
	pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at > now
	}
}
