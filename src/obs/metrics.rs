// self
use crate::{
	admission::Admission,
	obs::{Operation, Outcome},
};

/// Records a store or credential operation outcome via the global metrics recorder (when
/// enabled).
pub fn record_op_outcome(op: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"greenlight_store_op_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Records an admission decision via the global metrics recorder (when enabled).
pub fn record_admission(decision: Admission) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("greenlight_admission_total", "decision" => decision.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = decision;
	}
}
