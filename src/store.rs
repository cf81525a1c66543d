//! Storage contracts and built-in engines for version-stamped records.
//!
//! Every engine provides the same primitive: a compare-and-swap on the record's version.
//! [`RecordStore::compare_and_swap`] replaces a record's fields and bumps its version by
//! exactly one, but only when the stored version still equals the caller's expected
//! version, and it does so as one indivisible step under the engine's write lock.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	obs::{self, OpSpan, Operation, Outcome},
};

/// Boxed future returned by [`RecordStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Payload type persisted by a [`RecordStore`].
pub trait Record
where
	Self: 'static + Clone + Send + Sync + Serialize + DeserializeOwned,
{
	/// Short label used in logs and error messages.
	const KIND: &'static str;

	/// Key that must be unique across all records of this kind, if any.
	fn unique_key(&self) -> Option<String> {
		None
	}
}

/// Positive, server-assigned record identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RecordId(i64);
impl RecordId {
	/// Wraps `value` when it is a valid (positive) identity.
	pub fn new(value: i64) -> Option<Self> {
		(value >= 1).then_some(Self(value))
	}

	/// Raw integer value.
	pub fn get(self) -> i64 {
		self.0
	}
}
impl Display for RecordId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl From<RecordId> for i64 {
	fn from(value: RecordId) -> Self {
		value.0
	}
}
impl TryFrom<i64> for RecordId {
	type Error = InvalidRecordId;

	fn try_from(value: i64) -> Result<Self, Self::Error> {
		Self::new(value).ok_or(InvalidRecordId)
	}
}
impl FromStr for RecordId {
	type Err = InvalidRecordId;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.parse::<i64>().ok().and_then(Self::new).ok_or(InvalidRecordId)
	}
}

/// Raised when a record identity is non-numeric or not positive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("Record identities must be positive integers.")]
pub struct InvalidRecordId;

/// A persisted record together with its server-managed metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
	/// Server-assigned identity.
	pub id: RecordId,
	/// Creation instant.
	pub created_at: OffsetDateTime,
	/// Starts at 1; incremented by exactly 1 on every successful update.
	pub version: u32,
	/// Caller-controlled fields.
	pub data: T,
}

/// Result of an insertion attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome<T> {
	/// The record was stored with version 1.
	Inserted(Versioned<T>),
	/// Another record already owns the unique key.
	Duplicate,
}

/// Result of a version compare-and-swap attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum CompareAndSwapOutcome<T> {
	/// The version matched; fields were replaced and the version bumped.
	Updated(Versioned<T>),
	/// The stored version differs from the expected one; nothing changed.
	VersionMismatch,
	/// No record has the identity.
	Missing,
	/// The new fields would take a unique key owned by another record; nothing changed.
	Duplicate,
}

/// Error type produced by [`RecordStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Storage backend contract for version-stamped records of one kind.
pub trait RecordStore<T>
where
	Self: Send + Sync,
	T: Record,
{
	/// Stores a new record with a fresh identity and version 1.
	fn insert(&self, value: T, created_at: OffsetDateTime) -> StoreFuture<'_, InsertOutcome<T>>;

	/// Fetches a record by identity.
	fn fetch(&self, id: RecordId) -> StoreFuture<'_, Option<Versioned<T>>>;

	/// Fetches the record owning `key`, if any.
	fn find_unique<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Versioned<T>>>;

	/// Atomically replaces the record's fields if its version equals `expected_version`.
	fn compare_and_swap(
		&self,
		id: RecordId,
		expected_version: u32,
		value: T,
	) -> StoreFuture<'_, CompareAndSwapOutcome<T>>;

	/// Removes a record; returns `false` when it did not exist.
	fn remove(&self, id: RecordId) -> StoreFuture<'_, bool>;

	/// Returns every record ordered by identity.
	fn scan(&self) -> StoreFuture<'_, Vec<Versioned<T>>>;
}

/// Runs a store call under `deadline`, instrumented and counted as `op`.
///
/// A call still pending at the deadline is dropped and reported as [`Error::Timeout`] with
/// `label` as the operation name.
pub(crate) async fn with_deadline<T, Fut>(
	op: Operation,
	label: &'static str,
	deadline: Duration,
	fut: Fut,
) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OpSpan::new(op, label);
	let result = match tokio::time::timeout(deadline.unsigned_abs(), span.instrument(fut)).await {
		Ok(result) => result,
		Err(_) => {
			tracing::warn!(operation = label, "store operation timed out");

			Err(Error::Timeout { operation: label })
		},
	};

	obs::record_op_outcome(op, Outcome::of(&result));

	result
}

/// In-process table shared by the built-in engines.
#[derive(Clone, Debug)]
pub(crate) struct Table<T> {
	next_id: i64,
	rows: BTreeMap<RecordId, Versioned<T>>,
	unique: HashMap<String, RecordId>,
}
impl<T> Table<T>
where
	T: Record,
{
	pub(crate) fn from_rows(next_id: i64, rows: Vec<Versioned<T>>) -> Self {
		let mut table = Self::default();

		for row in rows {
			if let Some(key) = row.data.unique_key() {
				table.unique.insert(key, row.id);
			}

			table.next_id = table.next_id.max(row.id.get() + 1);
			table.rows.insert(row.id, row);
		}

		table.next_id = table.next_id.max(next_id);

		table
	}

	pub(crate) fn next_id(&self) -> i64 {
		self.next_id
	}

	pub(crate) fn rows(&self) -> impl Iterator<Item = &Versioned<T>> {
		self.rows.values()
	}

	pub(crate) fn get(&self, id: RecordId) -> Option<Versioned<T>> {
		self.rows.get(&id).cloned()
	}

	pub(crate) fn get_unique(&self, key: &str) -> Option<Versioned<T>> {
		self.unique.get(key).and_then(|id| self.get(*id))
	}

	pub(crate) fn insert(&mut self, data: T, created_at: OffsetDateTime) -> InsertOutcome<T> {
		let key = data.unique_key();

		if key.as_ref().is_some_and(|key| self.unique.contains_key(key)) {
			return InsertOutcome::Duplicate;
		}

		let id = RecordId(self.next_id);
		let row = Versioned { id, created_at, version: 1, data };

		self.next_id += 1;

		if let Some(key) = key {
			self.unique.insert(key, id);
		}

		self.rows.insert(id, row.clone());

		InsertOutcome::Inserted(row)
	}

	pub(crate) fn compare_and_swap(
		&mut self,
		id: RecordId,
		expected_version: u32,
		data: T,
	) -> CompareAndSwapOutcome<T> {
		let Some(row) = self.rows.get_mut(&id) else {
			return CompareAndSwapOutcome::Missing;
		};

		if row.version != expected_version {
			return CompareAndSwapOutcome::VersionMismatch;
		}

		let old_key = row.data.unique_key();
		let new_key = data.unique_key();

		if new_key.as_ref().is_some_and(|key| self.unique.get(key).is_some_and(|owner| *owner != id)) {
			return CompareAndSwapOutcome::Duplicate;
		}

		row.data = data;
		row.version += 1;

		let updated = row.clone();

		if old_key != new_key {
			if let Some(key) = old_key {
				self.unique.remove(&key);
			}
			if let Some(key) = new_key {
				self.unique.insert(key, id);
			}
		}

		CompareAndSwapOutcome::Updated(updated)
	}

	pub(crate) fn remove(&mut self, id: RecordId) -> bool {
		match self.rows.remove(&id) {
			Some(row) => {
				if let Some(key) = row.data.unique_key() {
					self.unique.remove(&key);
				}

				true
			},
			None => false,
		}
	}
}
impl<T> Default for Table<T> {
	fn default() -> Self {
		Self { next_id: 1, rows: BTreeMap::new(), unique: HashMap::new() }
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
	struct Account {
		email: String,
	}
	impl Record for Account {
		const KIND: &'static str = "account";

		fn unique_key(&self) -> Option<String> {
			Some(self.email.clone())
		}
	}

	fn account(email: &str) -> Account {
		Account { email: email.into() }
	}

	fn inserted(outcome: InsertOutcome<Account>) -> Versioned<Account> {
		match outcome {
			InsertOutcome::Inserted(row) => row,
			InsertOutcome::Duplicate => panic!("Fixture insert should not collide."),
		}
	}

	#[test]
	fn record_ids_reject_non_positive_and_non_numeric() {
		assert_eq!("42".parse::<RecordId>().map(RecordId::get), Ok(42));
		assert!("0".parse::<RecordId>().is_err());
		assert!("-3".parse::<RecordId>().is_err());
		assert!("abc".parse::<RecordId>().is_err());
		assert!(serde_json::from_str::<RecordId>("0").is_err());
	}

	#[test]
	fn unique_keys_follow_updates_and_removals() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let mut table = <Table<Account>>::default();
		let alice = inserted(table.insert(account("a@example.com"), now));
		let bob = inserted(table.insert(account("b@example.com"), now));

		assert_eq!(table.insert(account("a@example.com"), now), InsertOutcome::Duplicate);
		assert_eq!(
			table.compare_and_swap(bob.id, 1, account("a@example.com")),
			CompareAndSwapOutcome::Duplicate
		);
		assert!(matches!(
			table.compare_and_swap(alice.id, 1, account("c@example.com")),
			CompareAndSwapOutcome::Updated(Versioned { version: 2, .. })
		));
		assert!(matches!(
			table.insert(account("a@example.com"), now),
			InsertOutcome::Inserted(_)
		));
		assert!(table.remove(bob.id));
		assert!(table.get_unique("b@example.com").is_none());
		assert!(!table.remove(bob.id));
	}

	#[tokio::test(start_paused = true)]
	async fn deadline_turns_stalls_into_timeouts() {
		let stalled = with_deadline(Operation::Get, "accounts.get", Duration::seconds(3), async {
			tokio::time::sleep(std::time::Duration::from_secs(10)).await;

			Ok(())
		})
		.await;

		assert!(matches!(stalled, Err(Error::Timeout { operation: "accounts.get" })));

		let quick =
			with_deadline(Operation::Get, "accounts.get", Duration::seconds(3), async { Ok(7) })
				.await;

		assert_eq!(quick.ok(), Some(7));
	}

	#[test]
	fn from_rows_rebuilds_identity_counter() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let row = Versioned {
			id: RecordId::new(7).expect("Fixture id should be positive."),
			created_at: now,
			version: 3,
			data: account("x@example.com"),
		};
		let mut table = Table::from_rows(1, vec![row]);

		assert_eq!(inserted(table.insert(account("y@example.com"), now)).id.get(), 8);
		assert_eq!(table.get_unique("x@example.com").map(|row| row.version), Some(3));
	}
}
