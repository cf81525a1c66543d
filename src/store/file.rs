//! File-backed [`RecordStore`] for lightweight single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{
		CompareAndSwapOutcome, InsertOutcome, Record, RecordId, RecordStore, StoreError,
		StoreFuture, Table, Versioned,
	},
};

#[derive(Serialize, Deserialize)]
struct Snapshot<T> {
	next_id: i64,
	rows: Vec<Versioned<T>>,
}

/// Persists records to a JSON file after each mutation.
///
/// Mutations are applied to a copy of the table, written to a temporary file, synced, and
/// renamed over the snapshot; only then does the copy become visible. A failed write leaves
/// both the file and the in-memory table untouched.
///
/// The disk work runs on the blocking pool, so a caller's deadline can abandon a stalled write.
/// An abandoned write keeps the table locked until the disk returns, and its copy is published
/// only if the rename succeeds.
///
/// Every write copies the whole table while holding the write lock. Writes are O(n) in the
/// number of records and fully serialized, which suits the small single-node data sets this
/// engine targets.
#[derive(Clone, Debug)]
pub struct FileStore<T> {
	path: PathBuf,
	inner: Arc<RwLock<Table<T>>>,
}
impl<T> FileStore<T>
where
	T: Record,
{
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		ensure_parent_exists(&path)?;

		let table = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(table)) })
	}

	/// Location of the snapshot file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Table<T>, StoreError> {
		let Some(bytes) = read_existing(path)? else {
			return Ok(Table::default());
		};
		let snapshot: Snapshot<T> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(Table::from_rows(snapshot.next_id, snapshot.rows))
	}

	fn persist(path: &Path, table: &Table<T>) -> Result<(), StoreError> {
		let snapshot = Snapshot { next_id: table.next_id(), rows: table.rows().cloned().collect() };
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize {} snapshot: {e}", T::KIND),
			})?;

		write_atomically(path, &serialized)
	}

	/// Applies `mutate` to a copy of the table and publishes the copy once it is on disk.
	///
	/// `changed` decides from the mutation's output whether anything needs persisting.
	async fn mutate<R, M, C>(&self, mutate: M, changed: C) -> Result<R, StoreError>
	where
		R: 'static + Send,
		M: 'static + Send + FnOnce(&mut Table<T>) -> R,
		C: 'static + Send + FnOnce(&R) -> bool,
	{
		let inner = self.inner.clone();
		let path = self.path.clone();

		run_blocking(T::KIND, move || {
			let mut guard = inner.write();
			let mut staged = guard.clone();
			let output = mutate(&mut staged);

			if changed(&output) {
				Self::persist(&path, &staged)?;

				*guard = staged;
			}

			Ok(output)
		})
		.await
	}
}
impl<T> RecordStore<T> for FileStore<T>
where
	T: Record,
{
	fn insert(&self, value: T, created_at: OffsetDateTime) -> StoreFuture<'_, InsertOutcome<T>> {
		Box::pin(async move {
			self.mutate(
				move |table| table.insert(value, created_at),
				|outcome| matches!(outcome, InsertOutcome::Inserted(_)),
			)
			.await
		})
	}

	fn fetch(&self, id: RecordId) -> StoreFuture<'_, Option<Versioned<T>>> {
		Box::pin(async move { Ok(self.inner.read().get(id)) })
	}

	fn find_unique<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Versioned<T>>> {
		Box::pin(async move { Ok(self.inner.read().get_unique(key)) })
	}

	fn compare_and_swap(
		&self,
		id: RecordId,
		expected_version: u32,
		value: T,
	) -> StoreFuture<'_, CompareAndSwapOutcome<T>> {
		Box::pin(async move {
			self.mutate(
				move |table| table.compare_and_swap(id, expected_version, value),
				|outcome| matches!(outcome, CompareAndSwapOutcome::Updated(_)),
			)
			.await
		})
	}

	fn remove(&self, id: RecordId) -> StoreFuture<'_, bool> {
		Box::pin(async move {
			self.mutate(move |table| table.remove(id), |removed: &bool| *removed).await
		})
	}

	fn scan(&self) -> StoreFuture<'_, Vec<Versioned<T>>> {
		Box::pin(async move { Ok(self.inner.read().rows().cloned().collect()) })
	}
}

/// Reads the snapshot at `path`; a missing or empty file yields `None`.
pub(crate) fn read_existing(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
	if !path.exists() {
		return Ok(None);
	}

	let bytes = fs::read(path).map_err(|e| StoreError::Backend {
		message: format!("Failed to read {}: {e}", path.display()),
	})?;

	Ok((!bytes.is_empty()).then_some(bytes))
}

pub(crate) fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store directory {}: {e}", parent.display()),
		})?;
	}

	Ok(())
}

/// Writes `bytes` to a sibling `.tmp` file, syncs it, and renames it over `path`.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
	ensure_parent_exists(path)?;

	let mut tmp_path = path.to_path_buf();

	tmp_path.set_extension("tmp");

	{
		let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(bytes).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
		message: format!("Failed to replace {}: {e}", path.display()),
	})
}

/// Runs a snapshot write on the blocking pool so callers can time out while it is stuck.
pub(crate) async fn run_blocking<R, F>(kind: &'static str, job: F) -> Result<R, StoreError>
where
	R: 'static + Send,
	F: 'static + Send + FnOnce() -> Result<R, StoreError>,
{
	tokio::task::spawn_blocking(job).await.map_err(|e| StoreError::Backend {
		message: format!("{kind} snapshot writer did not finish: {e}"),
	})?
}
