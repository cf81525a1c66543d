//! Credential lifecycle: opaque bearer tokens and user passwords.
//!
//! Token plaintexts are generated once, returned to the caller, and never stored. The
//! [`TokenStore`] only ever sees the SHA-256 digest, and every lookup hashes the presented
//! plaintext first. A lookup that matches nothing, matches the wrong scope, or matches an
//! expired record reports [`Error::NotFound`] in all three cases.

mod file;
mod password;
mod token;

pub use file::*;
pub use password::*;
pub use token::*;

// crates.io
use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self as tokio_time, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	clock::Clock,
	models::Validator,
	obs::Operation,
	store::{self, RecordId, StoreFuture},
};

/// Storage contract for hashed tokens.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists a token record.
	fn insert(&self, token: StoredToken) -> StoreFuture<'_, ()>;

	/// Returns the owner of the record whose hash and scope match and whose expiry is after
	/// `now`.
	fn find_active(
		&self,
		hash: TokenHash,
		scope: TokenScope,
		now: OffsetDateTime,
	) -> StoreFuture<'_, Option<RecordId>>;

	/// Deletes every token of `scope` owned by `user_id`; returns the count.
	fn delete_all_for(&self, scope: TokenScope, user_id: RecordId) -> StoreFuture<'_, usize>;

	/// Deletes every record whose expiry is at or before `now`; returns the count.
	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// In-process [`TokenStore`] keyed by hash.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(Arc<RwLock<HashMap<TokenHash, StoredToken>>>);
impl MemoryTokenStore {
	/// Number of records held, expired ones included.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl TokenStore for MemoryTokenStore {
	fn insert(&self, token: StoredToken) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(token.hash, token);

			Ok(())
		})
	}

	fn find_active(
		&self,
		hash: TokenHash,
		scope: TokenScope,
		now: OffsetDateTime,
	) -> StoreFuture<'_, Option<RecordId>> {
		let map = self.0.clone();

		Box::pin(async move {
			Ok(map
				.read()
				.get(&hash)
				.filter(|token| token.scope == scope && token.is_active_at(now))
				.map(|token| token.user_id))
		})
	}

	fn delete_all_for(&self, scope: TokenScope, user_id: RecordId) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();
			let before = guard.len();

			guard.retain(|_, token| !(token.scope == scope && token.user_id == user_id));

			Ok(before - guard.len())
		})
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.write();
			let before = guard.len();

			guard.retain(|_, token| token.is_active_at(now));

			Ok(before - guard.len())
		})
	}
}

/// Issues, resolves, and revokes tokens against a [`TokenStore`].
#[derive(Clone)]
pub struct Tokens {
	store: Arc<dyn TokenStore>,
	clock: Arc<dyn Clock>,
	deadline: Duration,
}
impl Tokens {
	/// Wraps `store`; every call is bounded by `deadline`.
	pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>, deadline: Duration) -> Self {
		Self { store, clock, deadline }
	}

	/// Records a failure in `v` unless `plaintext` has the exact token shape.
	pub fn validate_plaintext(v: &mut Validator, plaintext: &str) {
		v.check(!plaintext.is_empty(), "token", "must be provided");
		v.check(plaintext.len() == TOKEN_PLAINTEXT_LEN, "token", "must be 26 bytes long");
	}

	/// Generates and stores a token for `user_id` expiring `ttl` from now.
	pub async fn issue(&self, user_id: RecordId, ttl: Duration, scope: TokenScope) -> Result<Token> {
		let token = Token::generate(user_id, ttl, scope, self.clock.now());
		let stored = token.stored();

		store::with_deadline(Operation::Issue, "tokens.issue", self.deadline, async {
			Ok(self.store.insert(stored).await?)
		})
		.await?;

		tracing::debug!(user_id = %user_id, scope = %scope, "token issued");

		Ok(token)
	}

	/// Resolves a presented plaintext to its owner.
	///
	/// Malformed plaintexts are rejected without touching the store.
	pub async fn resolve(&self, scope: TokenScope, plaintext: &str) -> Result<RecordId> {
		if plaintext.len() != TOKEN_PLAINTEXT_LEN {
			return Err(Error::NotFound);
		}

		let hash = TokenHash::of(plaintext);
		let now = self.clock.now();

		store::with_deadline(Operation::Resolve, "tokens.resolve", self.deadline, async {
			self.store.find_active(hash, scope, now).await?.ok_or(Error::NotFound)
		})
		.await
	}

	/// Deletes every `scope` token owned by `user_id`.
	pub async fn revoke_all(&self, scope: TokenScope, user_id: RecordId) -> Result<()> {
		let revoked =
			store::with_deadline(Operation::Revoke, "tokens.revoke_all", self.deadline, async {
				Ok(self.store.delete_all_for(scope, user_id).await?)
			})
			.await?;

		tracing::debug!(user_id = %user_id, scope = %scope, revoked, "tokens revoked");

		Ok(())
	}

	/// Deletes expired records; returns the count.
	pub async fn purge_expired(&self) -> Result<usize> {
		let now = self.clock.now();

		store::with_deadline(Operation::Revoke, "tokens.purge_expired", self.deadline, async {
			Ok(self.store.purge_expired(now).await?)
		})
		.await
	}

	/// Runs [`purge_expired`](Self::purge_expired) every `period` until `shutdown` flips to
	/// `true` or its sender is dropped.
	pub fn spawn_purger(
		&self,
		period: Duration,
		mut shutdown: watch::Receiver<bool>,
	) -> JoinHandle<()> {
		let this = self.clone();
		let period = period.unsigned_abs();

		tokio::spawn(async move {
			let mut ticker = tokio_time::interval_at(tokio_time::Instant::now() + period, period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => match this.purge_expired().await {
						Ok(0) => {},
						Ok(purged) => tracing::debug!(purged, "expired tokens purged"),
						Err(e) => tracing::warn!(error = %e, "token purge failed"),
					},
					changed = shutdown.changed() => {
						if changed.is_err() || *shutdown.borrow() {
							break;
						}
					},
				}
			}
		})
	}
}
impl Debug for Tokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Tokens").field("deadline", &self.deadline).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn tokens() -> (Tokens, Arc<ManualClock>, MemoryTokenStore) {
		let clock = Arc::new(ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC)));
		let store = MemoryTokenStore::default();
		let tokens = Tokens::new(Arc::new(store.clone()), clock.clone(), Duration::seconds(3));

		(tokens, clock, store)
	}

	fn user(id: i64) -> RecordId {
		RecordId::new(id).expect("Fixture id should be positive.")
	}

	#[tokio::test]
	async fn scope_mismatch_and_expiry_are_indistinguishable() {
		let (tokens, clock, _) = tokens();
		let token = tokens
			.issue(user(1), Duration::hours(1), TokenScope::Activation)
			.await
			.expect("Issuing fixture token should succeed.");
		let plaintext = token.plaintext.expose();

		assert_eq!(
			tokens.resolve(TokenScope::Activation, plaintext).await.ok(),
			Some(user(1))
		);
		assert!(matches!(
			tokens.resolve(TokenScope::Authentication, plaintext).await,
			Err(Error::NotFound)
		));

		clock.advance(Duration::hours(1));

		assert!(matches!(
			tokens.resolve(TokenScope::Activation, plaintext).await,
			Err(Error::NotFound)
		));
	}

	#[tokio::test]
	async fn malformed_plaintext_is_rejected_before_lookup() {
		let (tokens, _, _) = tokens();

		assert!(matches!(tokens.resolve(TokenScope::Activation, "").await, Err(Error::NotFound)));
		assert!(matches!(
			tokens.resolve(TokenScope::Activation, "TOO-SHORT").await,
			Err(Error::NotFound)
		));

		let mut v = Validator::new();

		Tokens::validate_plaintext(&mut v, "TOO-SHORT");

		assert_eq!(
			v.finish().expect_err("Short plaintext should fail validation.").get("token"),
			Some("must be 26 bytes long")
		);
	}

	#[tokio::test]
	async fn revoke_all_only_touches_one_owner_and_scope() {
		let (tokens, _, store) = tokens();
		let ttl = Duration::days(3);
		let mine = tokens.issue(user(1), ttl, TokenScope::Activation).await.expect("Issue mine.");
		let session =
			tokens.issue(user(1), ttl, TokenScope::Authentication).await.expect("Issue session.");
		let theirs = tokens.issue(user(2), ttl, TokenScope::Activation).await.expect("Issue theirs.");

		tokens.revoke_all(TokenScope::Activation, user(1)).await.expect("Revocation should succeed.");

		assert!(tokens.resolve(TokenScope::Activation, mine.plaintext.expose()).await.is_err());
		assert!(tokens.resolve(TokenScope::Authentication, session.plaintext.expose()).await.is_ok());
		assert!(tokens.resolve(TokenScope::Activation, theirs.plaintext.expose()).await.is_ok());
		assert_eq!(store.len(), 2);
	}

	#[tokio::test]
	async fn purge_drops_only_expired_records() {
		let (tokens, clock, store) = tokens();

		tokens.issue(user(1), Duration::minutes(5), TokenScope::Authentication).await.expect("Issue short.");
		tokens.issue(user(1), Duration::hours(5), TokenScope::Authentication).await.expect("Issue long.");

		clock.advance(Duration::minutes(5));

		assert_eq!(tokens.purge_expired().await.ok(), Some(1));
		assert_eq!(store.len(), 1);
	}
}
