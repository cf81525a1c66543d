//! Pagination and sort parameters for listings, plus the metadata returned alongside a page.

// std
use std::cmp::Ordering;
// self
use crate::{_prelude::*, models::Validator};

/// Largest accepted page number.
pub const MAX_PAGE: u64 = 10_000_000;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Column a listing may be ordered by.
///
/// Only these columns exist; an unknown name never gets past [`Sort::from_str`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortField {
	/// Record identity.
	#[default]
	Id,
	/// Movie title.
	Title,
	/// Release year.
	Year,
	/// Running time.
	Runtime,
}
impl SortField {
	/// Every accepted field name.
	pub const ALL: [SortField; 4] =
		[SortField::Id, SortField::Title, SortField::Year, SortField::Runtime];

	/// Query-string name of the field.
	pub const fn as_str(self) -> &'static str {
		match self {
			SortField::Id => "id",
			SortField::Title => "title",
			SortField::Year => "year",
			SortField::Runtime => "runtime",
		}
	}
}

/// Direction applied to the primary sort field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
	/// Smallest first.
	#[default]
	Ascending,
	/// Largest first.
	Descending,
}
impl SortDirection {
	/// Applies the direction to an ascending comparison.
	pub fn apply(self, ordering: Ordering) -> Ordering {
		match self {
			SortDirection::Ascending => ordering,
			SortDirection::Descending => ordering.reverse(),
		}
	}
}

/// A checked sort specification; `-` prefixes select descending order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Sort {
	/// Primary sort column.
	pub field: SortField,
	/// Direction of the primary column. The `id` tiebreak is always ascending.
	pub direction: SortDirection,
}
impl Display for Sort {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		if self.direction == SortDirection::Descending {
			f.write_str("-")?;
		}

		f.write_str(self.field.as_str())
	}
}
impl FromStr for Sort {
	type Err = InvalidSort;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (direction, name) = match s.strip_prefix('-') {
			Some(name) => (SortDirection::Descending, name),
			None => (SortDirection::Ascending, s),
		};
		let field = SortField::ALL
			.into_iter()
			.find(|field| field.as_str() == name)
			.ok_or(InvalidSort)?;

		Ok(Self { field, direction })
	}
}

/// Raised for a sort value outside the allow-list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("invalid sort value")]
pub struct InvalidSort;

/// Raw listing parameters as they arrive in the query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FilterParams {
	/// 1-based page number; defaults to 1.
	pub page: Option<String>,
	/// Records per page; defaults to 20.
	pub page_size: Option<String>,
	/// Sort specification; defaults to `id`.
	pub sort: Option<String>,
}

/// Validated listing window and order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Filters {
	/// 1-based page number.
	pub page: u64,
	/// Records per page.
	pub page_size: u64,
	/// Checked ordering.
	pub sort: Sort,
}
impl Filters {
	/// Parses and validates raw parameters, recording failures in `v`.
	///
	/// The returned value is only meaningful when `v` stays valid.
	pub fn parse(params: &FilterParams, v: &mut Validator) -> Self {
		let page = read_int(params.page.as_deref(), 1, "page", v);
		let page_size = read_int(params.page_size.as_deref(), 20, "page_size", v);
		let sort = match params.sort.as_deref() {
			None => Sort::default(),
			Some(raw) => raw.parse::<Sort>().unwrap_or_else(|e| {
				v.add_error("sort", &e.to_string());

				Sort::default()
			}),
		};
		let filters = Self { page, page_size, sort };

		filters.validate(v);

		filters
	}

	/// Records range failures in `v`.
	pub fn validate(&self, v: &mut Validator) {
		v.check(self.page > 0, "page", "must be greater than zero");
		v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
		v.check(self.page_size > 0, "page_size", "must be greater than zero");
		v.check(self.page_size <= MAX_PAGE_SIZE, "page_size", "must be a maximum of 100");
	}

	/// Number of records to skip.
	pub fn offset(&self) -> usize {
		usize::try_from(self.page.saturating_sub(1).saturating_mul(self.page_size))
			.unwrap_or(usize::MAX)
	}

	/// Number of records per page.
	pub fn limit(&self) -> usize {
		usize::try_from(self.page_size).unwrap_or(usize::MAX)
	}
}
impl Default for Filters {
	fn default() -> Self {
		Self { page: 1, page_size: 20, sort: Sort::default() }
	}
}

fn read_int(raw: Option<&str>, default: u64, field: &str, v: &mut Validator) -> u64 {
	let Some(raw) = raw else {
		return default;
	};

	match raw.parse::<i64>() {
		// Negative values fall through to the range checks as zero.
		Ok(value) => u64::try_from(value).unwrap_or(0),
		Err(_) => {
			v.add_error(field, "must be an integer value");

			default
		},
	}
}

/// Pagination summary; every field is zero (and omitted) when the listing is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
	/// Page returned.
	#[serde(skip_serializing_if = "is_zero")]
	pub current_page: u64,
	/// Requested page size.
	#[serde(skip_serializing_if = "is_zero")]
	pub page_size: u64,
	/// Always 1 for a non-empty listing.
	#[serde(skip_serializing_if = "is_zero")]
	pub first_page: u64,
	/// Last page holding records.
	#[serde(skip_serializing_if = "is_zero")]
	pub last_page: u64,
	/// Matching records across all pages.
	#[serde(skip_serializing_if = "is_zero")]
	pub total_records: u64,
}
impl Metadata {
	/// Computes the summary for `total_records` matches.
	pub fn calculate(total_records: u64, page: u64, page_size: u64) -> Self {
		if total_records == 0 || page_size == 0 {
			return Self::default();
		}

		Self {
			current_page: page,
			page_size,
			first_page: 1,
			last_page: total_records.div_ceil(page_size),
			total_records,
		}
	}
}

fn is_zero(value: &u64) -> bool {
	*value == 0
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn params(page: Option<&str>, page_size: Option<&str>, sort: Option<&str>) -> FilterParams {
		FilterParams {
			page: page.map(Into::into),
			page_size: page_size.map(Into::into),
			sort: sort.map(Into::into),
		}
	}

	#[test]
	fn sort_accepts_only_known_fields() {
		assert_eq!(
			"-year".parse::<Sort>(),
			Ok(Sort { field: SortField::Year, direction: SortDirection::Descending })
		);
		assert_eq!("title".parse::<Sort>().map(|s| s.to_string()), Ok("title".into()));

		for raw in ["", "-", "--id", "name", "id; DROP TABLE movies", "Title"] {
			assert_eq!(raw.parse::<Sort>(), Err(InvalidSort), "{raw:?} should be rejected.");
		}
	}

	#[test]
	fn defaults_apply_when_parameters_are_absent() {
		let mut v = Validator::new();
		let filters = Filters::parse(&FilterParams::default(), &mut v);

		assert!(v.valid());
		assert_eq!(filters, Filters::default());
	}

	#[test]
	fn range_and_type_failures_are_collected() {
		let mut v = Validator::new();

		Filters::parse(&params(Some("0"), Some("abc"), Some("rating")), &mut v);

		let errors = v.finish().expect_err("Invalid filters should fail validation.");

		assert_eq!(errors.get("page"), Some("must be greater than zero"));
		assert_eq!(errors.get("page_size"), Some("must be an integer value"));
		assert_eq!(errors.get("sort"), Some("invalid sort value"));

		let mut v = Validator::new();

		Filters::parse(&params(Some("10000001"), Some("101"), None), &mut v);

		let errors = v.finish().expect_err("Out-of-range filters should fail validation.");

		assert_eq!(errors.get("page"), Some("must be a maximum of 10 million"));
		assert_eq!(errors.get("page_size"), Some("must be a maximum of 100"));
	}

	#[test]
	fn metadata_rounds_last_page_up() {
		assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());
		assert_eq!(Metadata::calculate(41, 2, 20), Metadata {
			current_page: 2,
			page_size: 20,
			first_page: 1,
			last_page: 3,
			total_records: 41,
		});
		assert_eq!(
			serde_json::to_value(Metadata::default()).expect("Metadata should serialize."),
			serde_json::json!({})
		);
	}
}
