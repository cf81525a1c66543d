//! Per-user permission codes.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	obs::Operation,
	store::{self, CompareAndSwapOutcome, InsertOutcome, Record, RecordId, RecordStore},
};

/// Grants read access to the movie catalog.
pub const MOVIES_READ: &str = "movies:read";
/// Grants write access to the movie catalog.
pub const MOVIES_WRITE: &str = "movies:write";
/// Every code that can be granted.
pub const KNOWN_CODES: [&str; 2] = [MOVIES_READ, MOVIES_WRITE];

/// Codes held by one user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions(Vec<String>);
impl Permissions {
	/// Returns `true` when `code` is held.
	pub fn include(&self, code: &str) -> bool {
		self.0.iter().any(|held| held == code)
	}

	/// Held codes.
	pub fn codes(&self) -> &[String] {
		&self.0
	}
}
impl<S> FromIterator<S> for Permissions
where
	S: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = S>,
	{
		Self(iter.into_iter().map(Into::into).collect())
	}
}

/// Stored grant set; one per user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
	/// Owning user.
	pub user_id: RecordId,
	/// Granted codes.
	pub codes: BTreeSet<String>,
}
impl Record for PermissionGrant {
	const KIND: &'static str = "permission_grant";

	fn unique_key(&self) -> Option<String> {
		Some(self.user_id.to_string())
	}
}

/// Reads and extends user grants over a [`RecordStore`].
#[derive(Clone)]
pub struct PermissionStore {
	store: Arc<dyn RecordStore<PermissionGrant>>,
	clock: Arc<dyn Clock>,
	deadline: Duration,
}
impl PermissionStore {
	/// Wraps `store`; every call is bounded by `deadline`.
	pub fn new(
		store: Arc<dyn RecordStore<PermissionGrant>>,
		clock: Arc<dyn Clock>,
		deadline: Duration,
	) -> Self {
		Self { store, clock, deadline }
	}

	/// Codes granted to `user_id`; empty when nothing was granted.
	pub async fn get_all_for_user(&self, user_id: RecordId) -> Result<Permissions> {
		let key = user_id.to_string();

		store::with_deadline(Operation::Get, "permissions.get_all_for_user", self.deadline, async {
			let grant = self.store.find_unique(&key).await?;

			Ok(grant.map(|row| row.data.codes.into_iter().collect::<Permissions>()).unwrap_or_default())
		})
		.await
	}

	/// Adds `codes` to `user_id`'s grant. Unknown codes are ignored.
	pub async fn add_for_user(&self, user_id: RecordId, codes: &[&str]) -> Result<()> {
		let key = user_id.to_string();
		let wanted: BTreeSet<String> = codes
			.iter()
			.filter(|code| KNOWN_CODES.contains(*code))
			.map(|code| (*code).to_owned())
			.collect();

		store::with_deadline(Operation::Update, "permissions.add_for_user", self.deadline, async {
			// Another writer can land between the read and the swap; retry on a lost race.
			loop {
				match self.store.find_unique(&key).await? {
					None => {
						let grant = PermissionGrant { user_id, codes: wanted.clone() };

						match self.store.insert(grant, self.clock.now()).await? {
							InsertOutcome::Inserted(_) => return Ok(()),
							InsertOutcome::Duplicate => continue,
						}
					},
					Some(row) => {
						let mut codes = row.data.codes;

						codes.extend(wanted.iter().cloned());

						let grant = PermissionGrant { user_id, codes };

						match self.store.compare_and_swap(row.id, row.version, grant).await? {
							CompareAndSwapOutcome::Updated(_) => return Ok(()),
							CompareAndSwapOutcome::VersionMismatch
							| CompareAndSwapOutcome::Missing => continue,
							CompareAndSwapOutcome::Duplicate =>
								return Err(Error::internal("permission grant key collision")),
						}
					},
				}
			}
		})
		.await
	}
}
impl Debug for PermissionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PermissionStore").field("deadline", &self.deadline).finish_non_exhaustive()
	}
}
