//! Client-side rate-limit governance derived from server responses.
//!
//! Every outbound request passes [`RateLimiter::admit`] first. Responses are fed back through
//! [`RateLimiter::record_response`]; a `429` arms a cooldown taken from the `Retry-After`
//! header, the structured `retry_after_seconds` error field, or the configured default, in that
//! order. Admission and all counter/flag transitions happen under a single lock.

// crates.io
use time::PrimitiveDateTime;
// self
use crate::{
	_prelude::*,
	http::{HeaderMap, StatusCode, parse_retry_after},
};

/// Snapshot of the limiter's counters and cooldown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RateLimitState {
	/// Requests admitted so far.
	pub request_counter: u64,
	/// Non-2xx responses recorded so far.
	pub invalid_request_counter: u64,
	/// Whether the server throttled the most recent exchange.
	pub limited: bool,
	/// Instant when admissions resume while [`limited`](Self::limited) is set.
	pub retry_after_epoch: Option<OffsetDateTime>,
}
impl RateLimitState {
	fn cooldown_at(&self, now: OffsetDateTime) -> Option<Duration> {
		match (self.limited, self.retry_after_epoch) {
			(true, Some(until)) if now < until => Some(until - now),
			_ => None,
		}
	}
}

/// Proof that a request was admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Admission {
	/// Sequence number of the admitted request (1-based).
	pub request_number: u64,
}

/// Admission refusal carrying the remaining cooldown.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Request throttled until {earliest_retry_at}.")]
pub struct Throttled {
	/// Instant when it is safe to retry.
	pub earliest_retry_at: OffsetDateTime,
	/// Remaining cooldown measured at the refusal.
	pub retry_after: Duration,
}
impl From<Throttled> for Error {
	fn from(throttled: Throttled) -> Self {
		Error::RateLimited { retry_after: throttled.retry_after }
	}
}

/// Shared admission gate owned by a single client instance.
#[derive(Debug)]
pub struct RateLimiter {
	state: Mutex<RateLimitState>,
	default_cooldown: Duration,
}
impl RateLimiter {
	/// Cooldown applied when a `429` carries no retry metadata.
	pub const DEFAULT_COOLDOWN: Duration = Duration::seconds(60);
	/// Upper bound on any armed cooldown, whatever the server asks for.
	pub const MAX_COOLDOWN: Duration = Duration::days(1);

	/// Creates a limiter with the provided fallback cooldown.
	pub fn new(default_cooldown: Duration) -> Self {
		let default_cooldown = default_cooldown.clamp(Duration::ZERO, Self::MAX_COOLDOWN);

		Self { state: Mutex::new(RateLimitState::default()), default_cooldown }
	}

	/// Returns the fallback cooldown.
	pub fn default_cooldown(&self) -> Duration {
		self.default_cooldown
	}

	/// Admits the next request unless a cooldown is active.
	pub fn admit(&self) -> Result<Admission, Throttled> {
		self.admit_at(OffsetDateTime::now_utc())
	}

	/// [`admit`](Self::admit) against an explicit clock.
	pub fn admit_at(&self, now: OffsetDateTime) -> Result<Admission, Throttled> {
		let mut state = self.state.lock();

		if let Some(retry_after) = state.cooldown_at(now) {
			return Err(Throttled { earliest_retry_at: now + retry_after, retry_after });
		}

		state.request_counter += 1;

		Ok(Admission { request_number: state.request_counter })
	}

	/// Records a response; returns the armed cooldown when the response was a `429`.
	pub fn record_response(
		&self,
		status: StatusCode,
		headers: &HeaderMap,
		body_retry_after: Option<Duration>,
	) -> Option<Duration> {
		self.record_response_at(OffsetDateTime::now_utc(), status, headers, body_retry_after)
	}

	/// [`record_response`](Self::record_response) against an explicit clock.
	pub fn record_response_at(
		&self,
		now: OffsetDateTime,
		status: StatusCode,
		headers: &HeaderMap,
		body_retry_after: Option<Duration>,
	) -> Option<Duration> {
		if status.is_success() {
			let mut state = self.state.lock();

			state.limited = false;
			state.retry_after_epoch = None;

			return None;
		}

		let cooldown = (status == StatusCode::TOO_MANY_REQUESTS).then(|| {
			parse_retry_after(headers)
				.or(body_retry_after)
				.filter(|delay| !delay.is_negative())
				.unwrap_or(self.default_cooldown)
				.min(Self::MAX_COOLDOWN)
		});
		let mut state = self.state.lock();

		state.invalid_request_counter += 1;

		if let Some(cooldown) = cooldown {
			let until = now.checked_add(cooldown).unwrap_or(PrimitiveDateTime::MAX.assume_utc());

			state.limited = true;
			// Concurrent 429s keep the latest deadline.
			state.retry_after_epoch = Some(match state.retry_after_epoch {
				Some(existing) if existing > until => existing,
				_ => until,
			});

			#[cfg(feature = "tracing")]
			tracing::warn!(
				cooldown_secs = cooldown.whole_seconds(),
				invalid_requests = state.invalid_request_counter,
				"server throttled the client"
			);
		}

		cooldown
	}

	/// Returns the remaining cooldown, if any.
	pub fn cooldown_remaining_at(&self, now: OffsetDateTime) -> Option<Duration> {
		self.state.lock().cooldown_at(now)
	}

	/// Returns a copy of the current state.
	pub fn snapshot(&self) -> RateLimitState {
		*self.state.lock()
	}
}
impl Default for RateLimiter {
	fn default() -> Self {
		Self::new(Self::DEFAULT_COOLDOWN)
	}
}
