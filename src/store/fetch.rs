//! [`TokenStore`] that proxies every operation to a remote HTTP endpoint.

// self
use crate::{
	_prelude::*,
	auth::Token,
	http::{HeaderMap, HeaderValue, HttpClient, HttpRequest, Method, StatusCode, header},
	store::{StoreError, StoreFuture, TokenStore},
};

/// Remote token store reached through the injectable [`HttpClient`].
///
/// `GET` treats any non-2xx answer as "no token" so a fresh deployment whose endpoint has not
/// been written yet behaves like an empty store. `PUT` failures are backend faults; `DELETE`
/// tolerates `404`.
#[derive(Clone, Debug)]
pub struct FetchTokenStore<C> {
	http_client: Arc<C>,
	endpoint: Url,
	headers: HeaderMap,
}
impl<C> FetchTokenStore<C>
where
	C: HttpClient,
{
	/// Creates a store that reads and writes the token at `endpoint`.
	pub fn new(http_client: impl Into<Arc<C>>, endpoint: Url) -> Self {
		Self { http_client: http_client.into(), endpoint, headers: HeaderMap::new() }
	}

	/// Adds a header (for example an API key) sent with every store request.
	pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Returns the remote endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	fn build_request(&self, method: Method, body: Vec<u8>) -> Result<HttpRequest, StoreError> {
		let mut builder = oauth2::http::Request::builder()
			.method(method.clone())
			.uri(self.endpoint.as_str())
			.header(header::ACCEPT, "application/json");

		if !body.is_empty() {
			builder = builder.header(header::CONTENT_TYPE, "application/json");
		}
		if let Some(headers) = builder.headers_mut() {
			headers.extend(self.headers.clone());
		}

		builder.body(body).map_err(|e| {
			StoreError::backend(format_args!("Failed to build {method} {}", self.endpoint), e)
		})
	}

	async fn send(
		&self,
		method: Method,
		body: Vec<u8>,
	) -> Result<(StatusCode, Vec<u8>), StoreError> {
		let request = self.build_request(method.clone(), body)?;
		let response = self.http_client.execute(request).await.map_err(|e| {
			StoreError::backend(format_args!("{method} {} failed", self.endpoint), e)
		})?;
		let status = response.status();

		Ok((status, response.into_body()))
	}
}
impl<C> TokenStore for FetchTokenStore<C>
where
	C: HttpClient,
{
	fn get(&self) -> StoreFuture<'_, Option<Token>> {
		Box::pin(async move {
			let (status, body) = self.send(Method::GET, Vec::new()).await?;

			if !status.is_success() || body.is_empty() {
				return Ok(None);
			}

			serde_json::from_slice(&body).map(Some).map_err(|e| {
				StoreError::serialization(
					format_args!("Failed to decode token from {}", self.endpoint),
					e,
				)
			})
		})
	}

	fn put(&self, token: Token) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let body = serde_json::to_vec(&token)
				.map_err(|e| StoreError::serialization("Failed to encode token", e))?;
			let (status, _) = self.send(Method::PUT, body).await?;

			if status.is_success() {
				Ok(())
			} else {
				Err(StoreError::backend(
					format_args!("PUT {} was rejected", self.endpoint),
					status,
				))
			}
		})
	}

	fn delete(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let (status, _) = self.send(Method::DELETE, Vec::new()).await?;

			if status.is_success() || status == StatusCode::NOT_FOUND {
				Ok(())
			} else {
				Err(StoreError::backend(
					format_args!("DELETE {} was rejected", self.endpoint),
					status,
				))
			}
		})
	}

	fn list(&self) -> StoreFuture<'_, Vec<Token>> {
		Box::pin(async move { Ok(self.get().await?.into_iter().collect()) })
	}
}
