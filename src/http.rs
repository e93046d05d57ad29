//! HTTP boundary shared by the REST transport, the fetch-backed token store, and the token
//! endpoint.
//!
//! The crate only depends on [`HttpClient::execute`], which takes an
//! [`http::Request`](oauth2::http::Request) with a byte body and resolves to an
//! [`http::Response`](oauth2::http::Response). Header lookups on the response are
//! case-insensitive through [`HeaderMap`]. Tests inject their own implementation; production
//! code uses [`ReqwestHttpClient`] behind the `reqwest` feature.

pub use oauth2::http::{HeaderMap, HeaderValue, Method, StatusCode, header};

// crates.io
use oauth2::http::header::RETRY_AFTER;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Outbound request with a fully buffered body.
pub type HttpRequest = oauth2::HttpRequest;
/// Inbound response with a fully buffered body.
pub type HttpResponse = oauth2::HttpResponse;
/// Boxed future returned by [`HttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Minimal fetch capability the runtime depends on.
///
/// Implementations must not follow redirects on behalf of the caller and must surface every
/// HTTP status as a response; only network-level failures become [`TransportError`].
pub trait HttpClient
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and buffers the full response.
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_>;
}
impl<T> HttpClient for Arc<T>
where
	T: ?Sized + HttpClient,
{
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		(**self).execute(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that never follows redirects.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		Self(ReqwestClient::default())
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut buffered = HttpResponse::new(response.bytes().await?.to_vec());

			*buffered.status_mut() = status;
			*buffered.headers_mut() = headers;

			Ok(buffered)
		})
	}
}

/// Parses a `Retry-After` header given either as delta seconds or as an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	parse_retry_after_at(headers, OffsetDateTime::now_utc())
}

pub(crate) fn parse_retry_after_at(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
