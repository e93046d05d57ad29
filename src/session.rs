//! Token lifecycle: staleness checks and single-flight refresh.
//!
//! Every request resolves its credential through [`TokenManager::ensure_fresh`]. When the
//! stored token is stale, or the server rejected it with `401`, the manager performs a
//! `grant_type=refresh_token` exchange. Refreshes are serialized through one async guard:
//! callers that queued behind an in-flight refresh re-read the store once they get the guard
//! and reuse the rotated token instead of spending the refresh token a second time.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::Token,
	http::HttpClient,
	oauth::TokenEndpoint,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::TokenStore,
};

/// Owns the token store handle and the refresh guard for one client.
pub struct TokenManager<C>
where
	C: HttpClient,
{
	store: Arc<dyn TokenStore>,
	endpoint: Option<TokenEndpoint<C>>,
	refresh_guard: AsyncMutex<()>,
	metrics: RefreshMetrics,
}
impl<C> TokenManager<C>
where
	C: HttpClient,
{
	/// Creates a manager; without an endpoint, stale tokens cannot be refreshed.
	pub fn new(store: Arc<dyn TokenStore>, endpoint: Option<TokenEndpoint<C>>) -> Self {
		Self { store, endpoint, refresh_guard: AsyncMutex::new(()), metrics: Default::default() }
	}

	/// Returns the underlying store.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Returns refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns the stored token without checking staleness.
	pub async fn current(&self) -> Result<Option<Token>> {
		Ok(self.store.get().await?)
	}

	/// Returns a usable token, refreshing a stale one first; `None` when nothing is stored.
	pub async fn ensure_fresh(&self) -> Result<Option<Token>> {
		match self.store.get().await? {
			Some(token) if token.is_stale() => self.refresh(&token).await.map(Some),
			other => Ok(other),
		}
	}

	/// Replaces `rejected` with a freshly issued token.
	///
	/// If another caller already rotated the token while this one waited for the guard, the
	/// rotated token is returned without contacting the token endpoint.
	pub async fn refresh(&self, rejected: &Token) -> Result<Token> {
		const KIND: OperationKind = OperationKind::Refresh;

		let span = OperationSpan::new(KIND, "refresh");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.refresh_single_flight(rejected)).await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		obs::record_result(KIND, result)
	}

	async fn refresh_single_flight(&self, rejected: &Token) -> Result<Token> {
		let _singleflight = self.refresh_guard.lock().await;
		let current = self.store.get().await?;

		if let Some(rotated) = current
			.as_ref()
			.filter(|token| token.access_token != rejected.access_token && !token.is_stale())
		{
			self.metrics.record_reused();

			#[cfg(feature = "tracing")]
			tracing::debug!("reusing token rotated by a concurrent refresh");

			return Ok(rotated.clone());
		}

		let endpoint = self.endpoint.as_ref().ok_or_else(|| Error::AuthRefreshFailed {
			reason: "no token endpoint is configured".into(),
		})?;
		let refresh_token = current
			.as_ref()
			.and_then(|token| token.refresh_token.clone())
			.or_else(|| rejected.refresh_token.clone())
			.ok_or_else(|| Error::AuthRefreshFailed {
				reason: "the stored token has no refresh token".into(),
			})?;
		let fresh = endpoint.refresh(&refresh_token).await?;

		self.store.put(fresh.clone()).await?;
		self.metrics.record_refreshed();

		#[cfg(feature = "tracing")]
		tracing::debug!(expires_in = fresh.expires_in, "access token refreshed");

		Ok(fresh)
	}
}
impl<C> Debug for TokenManager<C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("endpoint", &self.endpoint)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
