//! Observability helpers shared by the admission, store, and credential layers.
//!
//! # Feature Flags
//!
//! - Spans are always emitted through `tracing` under the `greenlight.op` name with the `op`
//!   and `stage` fields.
//! - Enable `metrics` to increment `greenlight_store_op_total` (labeled by `op` + `outcome`) and
//!   `greenlight_admission_total` (labeled by `decision`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Record insertion.
	Insert,
	/// Single-record read.
	Get,
	/// Versioned conditional update.
	Update,
	/// Record removal.
	Delete,
	/// Filtered listing.
	List,
	/// Credential issuance.
	Issue,
	/// Credential resolution.
	Resolve,
	/// Bulk credential revocation.
	Revoke,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Insert => "insert",
			Operation::Get => "get",
			Operation::Update => "update",
			Operation::Delete => "delete",
			Operation::List => "list",
			Operation::Issue => "issue",
			Operation::Resolve => "resolve",
			Operation::Revoke => "revoke",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Completed as requested.
	Success,
	/// Ended in an expected caller-facing outcome (not found, conflict, ...).
	Rejected,
	/// Failed with a server-side fault.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Success => "success",
			Outcome::Rejected => "rejected",
			Outcome::Failure => "failure",
		}
	}

	/// Classifies a result.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => Outcome::Success,
			Err(e) if e.is_server_fault() => Outcome::Failure,
			Err(_) => Outcome::Rejected,
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Log output format selected for the process-wide subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
	/// Human-readable lines.
	#[default]
	Text,
	/// One JSON object per event.
	Json,
}

/// Installs the process-wide `tracing` subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a subscriber was already installed.
pub fn init_subscriber(format: LogFormat) -> bool {
	// crates.io
	use tracing_subscriber::{EnvFilter, fmt};

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let builder = fmt().with_env_filter(filter).with_target(false);

	match format {
		LogFormat::Text => builder.try_init().is_ok(),
		LogFormat::Json => builder.json().try_init().is_ok(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcome_classifies_results() {
		assert_eq!(Outcome::of(&Ok::<_, Error>(())), Outcome::Success);
		assert_eq!(Outcome::of::<()>(&Err(Error::EditConflict)), Outcome::Rejected);
		assert_eq!(Outcome::of::<()>(&Err(Error::Timeout { operation: "x" })), Outcome::Failure);
	}
}
