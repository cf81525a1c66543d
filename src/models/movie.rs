//! Movie catalog records.

// crates.io
use serde::{Deserializer, Serializer, de};
// self
use crate::{
	_prelude::*,
	models::{Validator, validator},
	store::Record,
};

/// Earliest accepted release year.
pub const MIN_YEAR: i32 = 1888;
/// Upper bound on a title's byte length.
pub const MAX_TITLE_BYTES: usize = 500;

/// Raised when a runtime is not written as `"<n> mins"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("invalid runtime format")]
pub struct InvalidRuntimeFormat;

/// Running time in minutes, serialized as `"<n> mins"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Runtime(pub i32);
impl Display for Runtime {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} mins", self.0)
	}
}
impl FromStr for Runtime {
	type Err = InvalidRuntimeFormat;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (minutes, unit) = s.split_once(' ').ok_or(InvalidRuntimeFormat)?;

		if unit != "mins" {
			return Err(InvalidRuntimeFormat);
		}

		minutes.parse().map(Self).map_err(|_| InvalidRuntimeFormat)
	}
}
impl Serialize for Runtime {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.collect_str(self)
	}
}
impl<'de> Deserialize<'de> for Runtime {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(de::Error::custom)
	}
}

/// Caller-controlled movie fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
	/// Display title.
	pub title: String,
	/// Release year.
	pub year: i32,
	/// Running time.
	pub runtime: Runtime,
	/// Genre labels; unique, 1 to 5 entries.
	pub genres: Vec<String>,
}
impl Movie {
	/// Records every field failure in `v`; `current_year` bounds the release year.
	pub fn validate(&self, v: &mut Validator, current_year: i32) {
		v.check(!self.title.is_empty(), "title", "must be provided");
		v.check(
			self.title.len() <= MAX_TITLE_BYTES,
			"title",
			"must not be more than 500 bytes long",
		);

		v.check(self.year != 0, "year", "must be provided");
		v.check(self.year >= MIN_YEAR, "year", "must be greater than 1888");
		v.check(self.year <= current_year, "year", "must not be in the future");

		v.check(self.runtime.0 != 0, "runtime", "must be provided");
		v.check(self.runtime.0 > 0, "runtime", "must be a positive integer");

		v.check(!self.genres.is_empty(), "genres", "must contain at least 1 genre");
		v.check(self.genres.len() <= 5, "genres", "must not contain more than 5 genres");
		v.check(validator::unique(&self.genres), "genres", "must not contain duplicate values");
	}
}
impl Record for Movie {
	const KIND: &'static str = "movie";
}
