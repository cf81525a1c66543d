//! Domain records and the store-facing models that guard them.
//!
//! [`Movies`] and [`Users`] translate engine outcomes into the crate's error taxonomy and
//! bound every engine call with the configured deadline. Updates always go through the
//! engine's version compare-and-swap: the caller passes the version it last read, and a
//! record that moved on since then yields [`Error::EditConflict`] with nothing written.

pub mod filters;
pub mod movie;
pub mod permissions;
pub mod user;
pub mod validator;

pub use filters::*;
pub use movie::*;
pub use permissions::*;
pub use user::*;
pub use validator::{ValidationErrors, Validator};

// self
use crate::{
	_prelude::*,
	clock::Clock,
	credentials::{TokenScope, Tokens},
	obs::Operation,
	store::{self, CompareAndSwapOutcome, InsertOutcome, RecordId, RecordStore, Versioned},
};

/// Parses a path identity; anything non-numeric or below 1 is [`Error::NotFound`].
pub fn parse_id(raw: &str) -> Result<RecordId> {
	raw.parse().map_err(|_| Error::NotFound)
}

/// Movie catalog operations.
#[derive(Clone)]
pub struct Movies {
	store: Arc<dyn RecordStore<Movie>>,
	clock: Arc<dyn Clock>,
	deadline: Duration,
}
impl Movies {
	/// Wraps `store`; every call is bounded by `deadline`.
	pub fn new(store: Arc<dyn RecordStore<Movie>>, clock: Arc<dyn Clock>, deadline: Duration) -> Self {
		Self { store, clock, deadline }
	}

	/// Stores a new movie at version 1.
	pub async fn insert(&self, movie: Movie) -> Result<Versioned<Movie>> {
		let now = self.clock.now();

		store::with_deadline(Operation::Insert, "movies.insert", self.deadline, async {
			match self.store.insert(movie, now).await? {
				InsertOutcome::Inserted(row) => Ok(row),
				InsertOutcome::Duplicate => Err(Error::internal("movies carry no unique key")),
			}
		})
		.await
	}

	/// Fetches one movie.
	pub async fn get(&self, id: RecordId) -> Result<Versioned<Movie>> {
		store::with_deadline(Operation::Get, "movies.get", self.deadline, async {
			self.store.fetch(id).await?.ok_or(Error::NotFound)
		})
		.await
	}

	/// Replaces a movie's fields if it is still at `expected_version`.
	pub async fn update(
		&self,
		id: RecordId,
		expected_version: u32,
		movie: Movie,
	) -> Result<Versioned<Movie>> {
		store::with_deadline(Operation::Update, "movies.update", self.deadline, async {
			match self.store.compare_and_swap(id, expected_version, movie).await? {
				CompareAndSwapOutcome::Updated(row) => Ok(row),
				CompareAndSwapOutcome::VersionMismatch => Err(Error::EditConflict),
				CompareAndSwapOutcome::Missing => Err(Error::NotFound),
				CompareAndSwapOutcome::Duplicate =>
					Err(Error::internal("movies carry no unique key")),
			}
		})
		.await
	}

	/// Removes a movie.
	pub async fn delete(&self, id: RecordId) -> Result<()> {
		store::with_deadline(Operation::Delete, "movies.delete", self.deadline, async {
			if self.store.remove(id).await? { Ok(()) } else { Err(Error::NotFound) }
		})
		.await
	}

	/// Returns one page of movies matching `title` and containing every genre in `genres`.
	///
	/// Every word of `title` must appear as a whole word of the movie title, ignoring case; an
	/// empty `title` or `genres` matches everything.
	pub async fn list(
		&self,
		title: &str,
		genres: &[String],
		filters: &Filters,
	) -> Result<(Vec<Versioned<Movie>>, Metadata)> {
		let wanted_words = words(title);

		store::with_deadline(Operation::List, "movies.list", self.deadline, async {
			let mut matched: Vec<_> = self
				.store
				.scan()
				.await?
				.into_iter()
				.filter(|row| {
					let title_words = words(&row.data.title);

					wanted_words.iter().all(|word| title_words.contains(word))
						&& genres.iter().all(|genre| row.data.genres.contains(genre))
				})
				.collect();

			matched.sort_by(|a, b| compare(a, b, filters.sort));

			let total = matched.len() as u64;
			let page = matched.into_iter().skip(filters.offset()).take(filters.limit()).collect();

			Ok((page, Metadata::calculate(total, filters.page, filters.page_size)))
		})
		.await
	}
}
impl Debug for Movies {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Movies").field("deadline", &self.deadline).finish_non_exhaustive()
	}
}

fn words(text: &str) -> BTreeSet<String> {
	text.split(|c: char| !c.is_alphanumeric())
		.filter(|word| !word.is_empty())
		.map(str::to_lowercase)
		.collect()
}

fn compare(a: &Versioned<Movie>, b: &Versioned<Movie>, sort: Sort) -> std::cmp::Ordering {
	let primary = match sort.field {
		SortField::Id => a.id.cmp(&b.id),
		SortField::Title => a.data.title.cmp(&b.data.title),
		SortField::Year => a.data.year.cmp(&b.data.year),
		SortField::Runtime => a.data.runtime.cmp(&b.data.runtime),
	};

	sort.direction.apply(primary).then_with(|| a.id.cmp(&b.id))
}

/// User account operations.
#[derive(Clone)]
pub struct Users {
	store: Arc<dyn RecordStore<User>>,
	tokens: Tokens,
	clock: Arc<dyn Clock>,
	deadline: Duration,
}
impl Users {
	/// Wraps `store`; token lookups go through `tokens`.
	pub fn new(
		store: Arc<dyn RecordStore<User>>,
		tokens: Tokens,
		clock: Arc<dyn Clock>,
		deadline: Duration,
	) -> Self {
		Self { store, tokens, clock, deadline }
	}

	/// Stores a new user; a taken email address yields [`Error::DuplicateEmail`].
	pub async fn insert(&self, mut user: User) -> Result<Versioned<User>> {
		if !user.password.is_set() {
			return Err(Error::internal("missing password hash for user"));
		}

		user.password.forget_plaintext();

		let now = self.clock.now();

		store::with_deadline(Operation::Insert, "users.insert", self.deadline, async {
			match self.store.insert(user, now).await? {
				InsertOutcome::Inserted(row) => Ok(row),
				InsertOutcome::Duplicate => Err(Error::DuplicateEmail),
			}
		})
		.await
	}

	/// Fetches one user.
	pub async fn get(&self, id: RecordId) -> Result<Versioned<User>> {
		store::with_deadline(Operation::Get, "users.get", self.deadline, async {
			self.store.fetch(id).await?.ok_or(Error::NotFound)
		})
		.await
	}

	/// Looks a user up by email address, ignoring case.
	pub async fn get_by_email(&self, email: &str) -> Result<Versioned<User>> {
		let key = normalize_email(email);

		store::with_deadline(Operation::Get, "users.get_by_email", self.deadline, async {
			self.store.find_unique(&key).await?.ok_or(Error::NotFound)
		})
		.await
	}

	/// Replaces a user's fields if it is still at `expected_version`.
	pub async fn update(
		&self,
		id: RecordId,
		expected_version: u32,
		mut user: User,
	) -> Result<Versioned<User>> {
		if !user.password.is_set() {
			return Err(Error::internal("missing password hash for user"));
		}

		user.password.forget_plaintext();

		store::with_deadline(Operation::Update, "users.update", self.deadline, async {
			match self.store.compare_and_swap(id, expected_version, user).await? {
				CompareAndSwapOutcome::Updated(row) => Ok(row),
				CompareAndSwapOutcome::VersionMismatch => Err(Error::EditConflict),
				CompareAndSwapOutcome::Missing => Err(Error::NotFound),
				CompareAndSwapOutcome::Duplicate => Err(Error::DuplicateEmail),
			}
		})
		.await
	}

	/// Resolves a token plaintext of `scope` to its owner.
	pub async fn get_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<Versioned<User>> {
		let user_id = self.tokens.resolve(scope, plaintext).await?;

		self.get(user_id).await
	}
}
impl Debug for Users {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Users").field("deadline", &self.deadline).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{clock::ManualClock, store::MemoryStore};

	fn movies() -> Movies {
		Movies::new(
			Arc::new(<MemoryStore<Movie>>::new()),
			Arc::new(ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC))),
			Duration::seconds(3),
		)
	}

	fn movie(title: &str, year: i32, runtime: i32, genres: &[&str]) -> Movie {
		Movie {
			title: title.into(),
			year,
			runtime: Runtime(runtime),
			genres: genres.iter().map(|g| (*g).to_owned()).collect(),
		}
	}

	async fn seed(movies: &Movies) {
		for fixture in [
			movie("The Breakfast Club", 1985, 96, &["comedy", "drama"]),
			movie("Black Panther", 2018, 134, &["action", "adventure"]),
			movie("Deadpool", 2016, 108, &["action", "comedy"]),
			movie("The Club", 1980, 96, &["drama"]),
		] {
			movies.insert(fixture).await.expect("Seeding movie fixture should succeed.");
		}
	}

	#[test]
	fn ids_parse_or_report_not_found() {
		assert_eq!(parse_id("3").map(RecordId::get).ok(), Some(3));
		assert!(matches!(parse_id("0"), Err(Error::NotFound)));
		assert!(matches!(parse_id("x"), Err(Error::NotFound)));
	}

	#[tokio::test]
	async fn title_search_matches_whole_words_case_insensitively() {
		let movies = movies();

		seed(&movies).await;

		let (page, meta) = movies
			.list("CLUB", &[], &Filters::default())
			.await
			.expect("Listing should succeed.");
		let titles: Vec<_> = page.iter().map(|row| row.data.title.as_str()).collect();

		assert_eq!(titles, ["The Breakfast Club", "The Club"]);
		assert_eq!(meta.total_records, 2);

		let (page, _) = movies.list("clu", &[], &Filters::default()).await.expect("Listing.");

		assert!(page.is_empty(), "Partial words must not match.");
	}

	#[tokio::test]
	async fn genres_must_all_be_present() {
		let movies = movies();

		seed(&movies).await;

		let (page, _) = movies
			.list("", &["action".into(), "comedy".into()], &Filters::default())
			.await
			.expect("Listing should succeed.");

		assert_eq!(page.len(), 1);
		assert_eq!(page[0].data.title, "Deadpool");
	}

	#[tokio::test]
	async fn sort_ties_break_on_ascending_id_and_pages_slice() {
		let movies = movies();

		seed(&movies).await;

		let filters = Filters {
			page: 1,
			page_size: 3,
			sort: "-runtime".parse().expect("Sort fixture should parse."),
		};
		let (page, meta) = movies.list("", &[], &filters).await.expect("Listing should succeed.");
		let ids: Vec<_> = page.iter().map(|row| row.id.get()).collect();

		assert_eq!(ids, [2, 3, 1]);
		assert_eq!(meta.last_page, 2);

		let (page, _) = movies
			.list("", &[], &Filters { page: 2, ..filters })
			.await
			.expect("Listing should succeed.");

		assert_eq!(page.iter().map(|row| row.id.get()).collect::<Vec<_>>(), [4]);
	}

	#[tokio::test]
	async fn stale_update_is_a_conflict_and_changes_nothing() {
		let movies = movies();
		let created = movies
			.insert(movie("Moana", 2016, 107, &["animation"]))
			.await
			.expect("Insert should succeed.");
		let mut edited = created.data.clone();

		edited.year = 2017;

		movies.update(created.id, 1, edited.clone()).await.expect("First update should succeed.");

		assert!(matches!(movies.update(created.id, 1, edited).await, Err(Error::EditConflict)));

		let current = movies.get(created.id).await.expect("Fetch should succeed.");

		assert_eq!(current.version, 2);
		assert_eq!(current.data.year, 2017);
		assert!(matches!(movies.delete(created.id).await, Ok(())));
		assert!(matches!(movies.delete(created.id).await, Err(Error::NotFound)));
		assert!(matches!(movies.get(created.id).await, Err(Error::NotFound)));
	}
}
