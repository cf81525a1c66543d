//! File-backed [`TokenStore`] that keeps issued tokens across restarts.

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	credentials::{StoredToken, TokenHash, TokenScope, TokenStore},
	store::{
		RecordId, StoreError, StoreFuture,
		file::{self as snapshot, run_blocking},
	},
};

type TokenMap = HashMap<TokenHash, StoredToken>;

const KIND: &str = "token";

/// Persists hashed token records to a JSON file after each mutation.
///
/// Writes stage a copy of the map and go through the same temp-file rename as
/// [`FileStore`](crate::store::FileStore). The in-memory map changes only after the snapshot is
/// on disk.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
	path: PathBuf,
	inner: Arc<RwLock<TokenMap>>,
}
impl FileTokenStore {
	/// Opens (or creates) a token snapshot at `path`, eagerly loading existing records.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		snapshot::ensure_parent_exists(&path)?;

		let tokens = match snapshot::read_existing(&path)? {
			Some(bytes) => serde_json::from_slice::<Vec<StoredToken>>(&bytes)
				.map_err(|e| StoreError::Serialization {
					message: format!("Failed to parse {}: {e}", path.display()),
				})?
				.into_iter()
				.map(|token| (token.hash, token))
				.collect(),
			None => TokenMap::new(),
		};

		Ok(Self { path, inner: Arc::new(RwLock::new(tokens)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Number of records held, expired ones included.
	pub fn len(&self) -> usize {
		self.inner.read().len()
	}

	/// Returns `true` if nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn persist(path: &Path, tokens: &TokenMap) -> Result<(), StoreError> {
		let rows = tokens.values().collect::<Vec<_>>();
		let serialized = serde_json::to_vec_pretty(&rows).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize {KIND} snapshot: {e}") }
		})?;

		snapshot::write_atomically(path, &serialized)
	}

	/// Applies `mutate` to a copy of the map and publishes it once it is on disk; `mutate`
	/// returns how many records it touched, and zero skips the write.
	async fn mutate<M>(&self, mutate: M) -> Result<usize, StoreError>
	where
		M: 'static + Send + FnOnce(&mut TokenMap) -> usize,
	{
		let inner = self.inner.clone();
		let path = self.path.clone();

		run_blocking(KIND, move || {
			let mut guard = inner.write();
			let mut staged = guard.clone();
			let touched = mutate(&mut staged);

			if touched > 0 {
				Self::persist(&path, &staged)?;

				*guard = staged;
			}

			Ok(touched)
		})
		.await
	}
}
impl TokenStore for FileTokenStore {
	fn insert(&self, token: StoredToken) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(move |tokens| {
				tokens.insert(token.hash, token);

				1
			})
			.await
			.map(|_| ())
		})
	}

	fn find_active(
		&self,
		hash: TokenHash,
		scope: TokenScope,
		now: OffsetDateTime,
	) -> StoreFuture<'_, Option<RecordId>> {
		Box::pin(async move {
			Ok(self
				.inner
				.read()
				.get(&hash)
				.filter(|token| token.scope == scope && token.is_active_at(now))
				.map(|token| token.user_id))
		})
	}

	fn delete_all_for(&self, scope: TokenScope, user_id: RecordId) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			self.mutate(move |tokens| {
				let before = tokens.len();

				tokens.retain(|_, token| !(token.scope == scope && token.user_id == user_id));

				before - tokens.len()
			})
			.await
		})
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move {
			self.mutate(move |tokens| {
				let before = tokens.len();

				tokens.retain(|_, token| token.is_active_at(now));

				before - tokens.len()
			})
			.await
		})
	}
}
