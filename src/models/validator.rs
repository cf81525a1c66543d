//! Field-level input validation that collects every failure before reporting.

// std
use std::{hash::Hash, sync::LazyLock};
// crates.io
use regex::Regex;
// self
use crate::_prelude::*;

/// Pattern an email address must match to pass validation.
pub static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
	)
	.expect("Email pattern is a valid regex.")
});

/// Field name to message map produced by a failed validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);
impl ValidationErrors {
	/// Returns `true` when no field failed.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Message recorded for `field`, if any.
	pub fn get(&self, field: &str) -> Option<&str> {
		self.0.get(field).map(String::as_str)
	}

	/// Iterates `(field, message)` pairs in field order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Builds a single-field error set.
	pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self(BTreeMap::from([(field.into(), message.into())]))
	}
}
impl Display for ValidationErrors {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		for (i, (field, message)) in self.iter().enumerate() {
			if i > 0 {
				f.write_str("; ")?;
			}

			write!(f, "{field}: {message}")?;
		}

		Ok(())
	}
}

/// Accumulates failures; only the first message per field is kept.
#[derive(Debug, Default)]
pub struct Validator {
	errors: ValidationErrors,
}
impl Validator {
	/// Creates an empty validator.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` while no failure was recorded.
	pub fn valid(&self) -> bool {
		self.errors.is_empty()
	}

	/// Records `message` for `field` unless the field already failed.
	pub fn add_error(&mut self, field: &str, message: &str) {
		self.errors.0.entry(field.to_owned()).or_insert_with(|| message.to_owned());
	}

	/// Records `message` for `field` when `ok` is false.
	pub fn check(&mut self, ok: bool, field: &str, message: &str) {
		if !ok {
			self.add_error(field, message);
		}
	}

	/// Consumes the validator, yielding the collected failures if there were any.
	pub fn finish(self) -> Result<(), ValidationErrors> {
		if self.errors.is_empty() { Ok(()) } else { Err(self.errors) }
	}
}

/// Returns `true` when every element appears once.
pub fn unique<T>(values: &[T]) -> bool
where
	T: Eq + Hash,
{
	let mut seen = std::collections::HashSet::with_capacity(values.len());

	values.iter().all(|value| seen.insert(value))
}

/// Returns `true` when `value` is one of `permitted`.
pub fn permitted_value<T>(value: &T, permitted: &[T]) -> bool
where
	T: PartialEq,
{
	permitted.contains(value)
}
