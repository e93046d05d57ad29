//! Optional observability helpers for transport, refresh, and webhook operations.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `oauth2_jsonapi.operation` carrying the `operation`
//!   kind and the `stage` (call site).
//! - `metrics` increments the `oauth2_jsonapi_operation_total` counter labeled by `operation`
//!   and `outcome`. `RateLimited` errors count as `throttled`, not `failure`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operation kinds observed by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Authenticated REST request.
	Request,
	/// Access token refresh against the token endpoint.
	Refresh,
	/// Inbound webhook verification.
	Webhook,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Request => "request",
			OperationKind::Refresh => "refresh",
			OperationKind::Webhook => "webhook",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// The server or the local cooldown refused the call.
	Throttled,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Failure => "failure",
			OperationOutcome::Throttled => "throttled",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

impl OperationOutcome {
	/// Classifies a finished operation.
	pub fn of<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => OperationOutcome::Success,
			Err(Error::RateLimited { .. }) => OperationOutcome::Throttled,
			Err(_) => OperationOutcome::Failure,
		}
	}
}

/// Records the terminal outcome of `result` and hands it back unchanged.
pub(crate) fn record_result<T>(kind: OperationKind, result: Result<T>) -> Result<T> {
	record_operation_outcome(kind, OperationOutcome::of(&result));

	result
}
