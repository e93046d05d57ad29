//! Authenticated JSON:API transport with rate-limit governance and error classification.
//!
//! A request flows through four steps:
//!
//! 1. Resolve the credential (caller-supplied, or the stored token refreshed when stale). No
//!    credential means [`Error::MissingCredential`] before anything touches the network.
//! 2. Pass [`RateLimiter::admit`]; an active cooldown surfaces as [`Error::RateLimited`].
//! 3. Send and feed the response back into the limiter.
//! 4. Classify: success bodies decode into JSON, `429` follows the [`ThrottleFallback`], a `401`
//!    on a stored token triggers one refresh-and-retry, everything else becomes
//!    [`RemoteErrors`].

mod error;

pub use error::*;

// self
use crate::{
	_prelude::*,
	auth::{Token, TokenSecret},
	config::{ApiDescriptor, ThrottleFallback},
	error::ConfigError,
	http::{HeaderMap, HeaderValue, HttpClient, HttpResponse, Method, StatusCode, header},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	rate_limit::RateLimiter,
	session::TokenManager,
};

/// JSON:API media type used for `Accept` and `Content-Type`.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Per-request knobs for [`RestTransport::request`].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Explicit access token; overrides the stored token and disables refresh.
	pub access_token: Option<TokenSecret>,
	/// JSON body sent with the request.
	pub body: Option<Value>,
	/// Query pairs appended to the URL.
	pub query: Vec<(String, String)>,
	/// Sends the request without an `Authorization` header.
	pub anonymous: bool,
}
impl RequestOptions {
	/// Uses `token` instead of the stored token.
	pub fn with_access_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.access_token = Some(token.into());

		self
	}

	/// Attaches a JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Appends a query pair.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Marks the route as public.
	pub fn anonymous(mut self) -> Self {
		self.anonymous = true;

		self
	}
}

enum Credential {
	Anonymous,
	Supplied(TokenSecret),
	Stored(Token),
}
impl Credential {
	fn authorization(&self) -> Option<String> {
		match self {
			Credential::Anonymous => None,
			Credential::Supplied(secret) => Some(format!("Bearer {}", secret.expose())),
			Credential::Stored(token) => Some(token.authorization_header()),
		}
	}
}

struct Exchange {
	response: HttpResponse,
	cooldown: Option<Duration>,
}

/// Issues authenticated requests against one API.
pub struct RestTransport<C>
where
	C: HttpClient,
{
	http_client: Arc<C>,
	base_url: Url,
	default_headers: HeaderMap,
	tokens: Arc<TokenManager<C>>,
	limiter: Arc<RateLimiter>,
	throttle_fallback: ThrottleFallback,
}
impl<C> RestTransport<C>
where
	C: HttpClient,
{
	/// Creates a transport; default headers are computed here once and reused for every call.
	pub fn new(
		descriptor: &ApiDescriptor,
		http_client: impl Into<Arc<C>>,
		tokens: Arc<TokenManager<C>>,
	) -> Result<Self> {
		let mut default_headers = HeaderMap::new();
		let user_agent = HeaderValue::from_str(&descriptor.user_agent)
			.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;

		default_headers.insert(header::USER_AGENT, user_agent);
		default_headers.insert(header::ACCEPT, HeaderValue::from_static(JSONAPI_MEDIA_TYPE));

		Ok(Self {
			http_client: http_client.into(),
			base_url: descriptor.base_url.clone(),
			default_headers,
			tokens,
			limiter: Arc::new(RateLimiter::new(descriptor.default_cooldown())),
			throttle_fallback: descriptor.throttle_fallback,
		})
	}

	/// Returns the shared rate limiter.
	pub fn rate_limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	/// Returns the token manager.
	pub fn tokens(&self) -> &Arc<TokenManager<C>> {
		&self.tokens
	}

	/// Returns the headers attached to every request.
	pub fn default_headers(&self) -> &HeaderMap {
		&self.default_headers
	}

	/// Sends one request and returns the decoded JSON body (`None` for empty bodies or a
	/// tolerated throttle).
	pub async fn request(
		&self,
		method: Method,
		path: &str,
		options: RequestOptions,
	) -> Result<Option<Value>> {
		const KIND: OperationKind = OperationKind::Request;

		let span = OperationSpan::new(KIND, "request");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span.instrument(self.request_inner(method, path, options)).await;

		obs::record_result(KIND, result)
	}

	/// Resolves `path` against the base URL; absolute URLs must share the base URL's origin.
	pub fn resolve(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
		let invalid = || ConfigError::InvalidPath { path: path.to_owned() };
		let mut url = match Url::parse(path) {
			Ok(absolute) if absolute.origin() == self.base_url.origin() => absolute,
			Ok(_) => return Err(invalid().into()),
			Err(_) => self.base_url.join(path.trim_start_matches('/')).map_err(|_| invalid())?,
		};

		if !query.is_empty() {
			url.query_pairs_mut().extend_pairs(query);
		}

		Ok(url)
	}

	async fn request_inner(
		&self,
		method: Method,
		path: &str,
		options: RequestOptions,
	) -> Result<Option<Value>> {
		let url = self.resolve(path, &options.query)?;
		let body =
			options.body.as_ref().map(serde_json::to_vec).transpose().map_err(ConfigError::from)?;
		let credential = self.credential(&options).await?;
		let exchange = self.send(&method, &url, body.clone(), credential.authorization()).await?;
		let exchange = match &credential {
			// Only stored tokens can be rotated; the retry happens at most once.
			Credential::Stored(rejected)
				if exchange.response.status() == StatusCode::UNAUTHORIZED =>
			{
				#[cfg(feature = "tracing")]
				tracing::debug!(%url, "access token rejected; refreshing once");

				let fresh = self.tokens.refresh(rejected).await?;

				self.send(&method, &url, body, Some(fresh.authorization_header())).await?
			},
			_ => exchange,
		};

		self.classify(&method, exchange)
	}

	async fn credential(&self, options: &RequestOptions) -> Result<Credential> {
		if options.anonymous {
			return Ok(Credential::Anonymous);
		}
		if let Some(secret) = options.access_token.as_ref().filter(|s| !s.is_blank()) {
			return Ok(Credential::Supplied(secret.clone()));
		}

		self.tokens.ensure_fresh().await?.map(Credential::Stored).ok_or(Error::MissingCredential)
	}

	async fn send(
		&self,
		method: &Method,
		url: &Url,
		body: Option<Vec<u8>>,
		authorization: Option<String>,
	) -> Result<Exchange> {
		self.limiter.admit()?;

		let mut builder = oauth2::http::Request::builder().method(method.clone()).uri(url.as_str());

		if let Some(headers) = builder.headers_mut() {
			headers.extend(self.default_headers.clone());

			if let Some(authorization) = authorization {
				let mut value = HeaderValue::from_str(&authorization)
					.map_err(|e| ConfigError::from(oauth2::http::Error::from(e)))?;

				value.set_sensitive(true);
				headers.insert(header::AUTHORIZATION, value);
			}
			if body.is_some() {
				headers
					.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSONAPI_MEDIA_TYPE));
			}
		}

		let request = builder.body(body.unwrap_or_default()).map_err(ConfigError::from)?;
		let response = self.http_client.execute(request).await?;
		let status = response.status();
		let body_retry_after = (status == StatusCode::TOO_MANY_REQUESTS)
			.then(|| RemoteErrors::from_body(status.as_u16(), response.body()).retry_after())
			.flatten();
		let cooldown = self.limiter.record_response(status, response.headers(), body_retry_after);

		Ok(Exchange { response, cooldown })
	}

	fn classify(&self, method: &Method, exchange: Exchange) -> Result<Option<Value>> {
		let Exchange { response, cooldown } = exchange;
		let status = response.status();

		if status.is_success() {
			return decode_body(status, response.body());
		}
		if let Some(retry_after) = cooldown {
			let idempotent = matches!(*method, Method::GET | Method::HEAD);

			if idempotent && self.throttle_fallback == ThrottleFallback::EmptyOnFirst {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					retry_after_secs = retry_after.whole_seconds(),
					"throttled read resolved to an empty result"
				);

				return Ok(None);
			}

			return Err(Error::RateLimited { retry_after });
		}

		Err(RemoteErrors::from_body(status.as_u16(), response.body()).into())
	}
}
impl<C> Debug for RestTransport<C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RestTransport")
			.field("base_url", &self.base_url.as_str())
			.field("rate_limit", &self.limiter.snapshot())
			.field("throttle_fallback", &self.throttle_fallback)
			.finish_non_exhaustive()
	}
}

fn decode_body(status: StatusCode, body: &[u8]) -> Result<Option<Value>> {
	if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
		return Ok(None);
	}

	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map(Some)
		.map_err(|source| Error::MalformedResponse { source, status: Some(status.as_u16()) })
}
