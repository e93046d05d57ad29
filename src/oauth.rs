//! Token endpoint facade built on the [`oauth2`] crate.
//!
//! Refreshes are `grant_type=refresh_token` exchanges sent through the crate's own
//! [`HttpClient`], so tests and deployments share one HTTP seam.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{Token, TokenSecret},
	config::{ApiDescriptor, ApiDescriptorError, ClientAuthMethod, ClientCredentials},
	error::{ConfigError, TransportError},
	http::{HttpClient, HttpRequest, HttpResponse},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeResult = std::result::Result<HttpResponse, HttpClientError<TransportError>>;
type FacadeFuture<'c> = Pin<Box<dyn Future<Output = FacadeResult> + 'c + Send>>;

/// Configured OAuth token endpoint.
pub struct TokenEndpoint<C>
where
	C: HttpClient,
{
	oauth_client: ConfiguredBasicClient,
	handle: FacadeHandle<C>,
}
impl<C> TokenEndpoint<C>
where
	C: HttpClient,
{
	/// Builds the endpoint from the descriptor's token URL and the client identity.
	pub fn from_descriptor(
		descriptor: &ApiDescriptor,
		credentials: &ClientCredentials,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let token_endpoint = descriptor
			.token_endpoint
			.as_ref()
			.ok_or(ConfigError::Descriptor(ApiDescriptorError::MissingTokenEndpoint))?;
		let token_url = TokenUrl::new(token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
			.set_token_uri(token_url);

		if let Some(secret) = credentials.client_secret.as_ref() {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(secret.expose().to_owned()));
		}
		if matches!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, handle: FacadeHandle(http_client.into()) })
	}

	/// Exchanges `refresh_token` for a new token.
	///
	/// When the endpoint does not rotate the refresh token, the previous one is carried over.
	pub async fn refresh(&self, refresh_token: &TokenSecret) -> Result<Token> {
		let secret = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&secret)
			.request_async(&self.handle)
			.await
			.map_err(map_request_error)?;

		map_refresh_response(response, refresh_token)
	}
}
impl<C> Debug for TokenEndpoint<C>
where
	C: HttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenEndpoint")
			.field("token_url", &self.oauth_client.token_uri().url().as_str())
			.finish_non_exhaustive()
	}
}

/// Bridges [`HttpClient`] into the `oauth2` crate's async client contract.
struct FacadeHandle<C>(Arc<C>);
impl<'c, C> AsyncHttpClient<'c> for FacadeHandle<C>
where
	C: HttpClient,
{
	type Error = HttpClientError<TransportError>;
	type Future = FacadeFuture<'c>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.0.execute(request).await.map_err(|e| HttpClientError::Reqwest(Box::new(e)))
		})
	}
}

fn map_refresh_response(response: BasicTokenResponse, previous: &TokenSecret) -> Result<Token> {
	let expires_in = response
		.expires_in()
		.ok_or_else(|| refresh_failed("token endpoint omitted expires_in"))?
		.as_secs();
	let expires_in = i64::try_from(expires_in)
		.map_err(|_| refresh_failed("token endpoint returned an out-of-range expires_in"))?;
	let token_type: &str = response.token_type().as_ref();
	let refresh = response
		.refresh_token()
		.map(|token| token.secret().to_owned())
		.unwrap_or_else(|| previous.expose().to_owned());

	Token::builder()
		.access_token(response.access_token().secret().to_owned())
		.refresh_token(refresh)
		.token_type(token_type)
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::seconds(expires_in))
		.build()
		.map_err(refresh_failed)
}

fn map_request_error(err: BasicRequestTokenError<HttpClientError<TransportError>>) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response(&response),
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) => Error::Transport(*inner),
		RequestTokenError::Request(HttpClientError::Http(inner)) =>
			ConfigError::from(inner).into(),
		RequestTokenError::Request(HttpClientError::Io(inner)) => TransportError::Io(inner).into(),
		RequestTokenError::Request(HttpClientError::Other(message)) => refresh_failed(message),
		RequestTokenError::Request(_) => refresh_failed("token endpoint transport failed"),
		RequestTokenError::Parse(source, _body) =>
			refresh_failed(format_args!("token response is malformed at `{}`", source.path())),
		RequestTokenError::Other(message) => refresh_failed(format_args!(
			"token endpoint returned an unexpected response: {message}"
		)),
	}
}

fn map_server_response(response: &BasicErrorResponse) -> Error {
	let code: &str = response.error().as_ref();

	match response.error_description() {
		Some(description) => refresh_failed(format_args!("{code}: {description}")),
		None => refresh_failed(code),
	}
}

fn refresh_failed(reason: impl Display) -> Error {
	Error::AuthRefreshFailed { reason: reason.to_string() }
}
