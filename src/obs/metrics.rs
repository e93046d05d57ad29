//! Counter feed for the `metrics` feature; a no-op otherwise.

// self
use crate::obs::{OperationKind, OperationOutcome};

/// Bumps `oauth2_jsonapi_operation_total{operation, outcome}` on the global recorder.
pub fn record_operation_outcome(kind: OperationKind, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_jsonapi_operation_total",
			"operation" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
