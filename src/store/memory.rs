//! Thread-safe in-memory [`RecordStore`] implementation for development and tests.

// self
use crate::{
	_prelude::*,
	store::{
		CompareAndSwapOutcome, InsertOutcome, Record, RecordId, RecordStore, StoreFuture, Table,
		Versioned,
	},
};

type TableRef<T> = Arc<RwLock<Table<T>>>;

/// Thread-safe storage backend that keeps records in-process.
#[derive(Clone, Debug)]
pub struct MemoryStore<T>(TableRef<T>);
impl<T> MemoryStore<T>
where
	T: Record,
{
	/// Creates an empty store whose first identity is 1.
	pub fn new() -> Self {
		Self(Default::default())
	}

	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().rows().count()
	}

	/// Returns `true` if no record is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl<T> Default for MemoryStore<T>
where
	T: Record,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<T> RecordStore<T> for MemoryStore<T>
where
	T: Record,
{
	fn insert(&self, value: T, created_at: OffsetDateTime) -> StoreFuture<'_, InsertOutcome<T>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().insert(value, created_at)) })
	}

	fn fetch(&self, id: RecordId) -> StoreFuture<'_, Option<Versioned<T>>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.read().get(id)) })
	}

	fn find_unique<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Versioned<T>>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.read().get_unique(key)) })
	}

	fn compare_and_swap(
		&self,
		id: RecordId,
		expected_version: u32,
		value: T,
	) -> StoreFuture<'_, CompareAndSwapOutcome<T>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().compare_and_swap(id, expected_version, value)) })
	}

	fn remove(&self, id: RecordId) -> StoreFuture<'_, bool> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.write().remove(id)) })
	}

	fn scan(&self) -> StoreFuture<'_, Vec<Versioned<T>>> {
		let table = self.0.clone();

		Box::pin(async move { Ok(table.read().rows().cloned().collect()) })
	}
}
