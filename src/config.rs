//! Validated API metadata shared by the transport, the token endpoint, and the client.
//!
//! [`ApiDescriptor`] is transport-agnostic and serde-friendly so deployments can keep it in
//! configuration files. Construct it through [`ApiDescriptorBuilder`], which enforces HTTPS for
//! every non-loopback endpoint.

// std
use std::net::IpAddr;
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// What the transport does when the server answers an idempotent read with `429`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleFallback {
	/// Always surface [`Error::RateLimited`].
	#[default]
	Surface,
	/// Resolve the throttled read to an empty result; the cooldown still applies to later calls.
	EmptyOnFirst,
}

/// OAuth client identity presented to the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
	/// Public client identifier.
	pub client_id: String,
	/// Confidential client secret, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<TokenSecret>,
}
impl ClientCredentials {
	/// Creates credentials for a public client.
	pub fn new(client_id: impl Into<String>) -> Self {
		Self { client_id: client_id.into(), client_secret: None }
	}

	/// Attaches a client secret.
	pub fn with_secret(mut self, secret: impl Into<TokenSecret>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}
}

/// Immutable API descriptor consumed by the runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
	/// Base URL every request path is resolved against.
	pub base_url: Url,
	/// OAuth token endpoint used for refreshes.
	pub token_endpoint: Option<Url>,
	/// Client authentication mechanism for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
	/// Product token sent as the `User-Agent` header.
	pub user_agent: String,
	/// Behavior for throttled idempotent reads.
	pub throttle_fallback: ThrottleFallback,
	/// Cooldown (seconds) applied when a `429` carries no retry metadata.
	pub default_cooldown_secs: u64,
}
impl ApiDescriptor {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ApiDescriptorBuilder {
		ApiDescriptorBuilder::new(base_url)
	}

	/// Returns the fallback cooldown as a [`Duration`].
	pub fn default_cooldown(&self) -> Duration {
		Duration::seconds(i64::try_from(self.default_cooldown_secs).unwrap_or(i64::MAX))
	}

	/// Re-runs validation, for descriptors loaded through serde.
	pub fn validate(&self) -> Result<(), ApiDescriptorError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ApiDescriptorError::InvalidBaseUrl { url: self.base_url.to_string() });
		}

		validate_endpoint("base", &self.base_url)?;

		if let Some(token) = self.token_endpoint.as_ref() {
			validate_endpoint("token", token)?;
		}
		if self.user_agent.trim().is_empty() {
			return Err(ApiDescriptorError::EmptyUserAgent);
		}

		Ok(())
	}
}

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ApiDescriptorError {
	/// Refreshing requires a token endpoint.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// The base URL cannot carry relative paths.
	#[error("The base URL cannot be used as a base: {url}.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The user agent product token is blank.
	#[error("User agent must not be empty.")]
	EmptyUserAgent,
}

/// Builder for [`ApiDescriptor`] values.
#[derive(Debug)]
pub struct ApiDescriptorBuilder {
	base_url: Url,
	token_endpoint: Option<Url>,
	client_auth_method: ClientAuthMethod,
	user_agent: Option<String>,
	throttle_fallback: ThrottleFallback,
	default_cooldown: Duration,
}
impl ApiDescriptorBuilder {
	/// Creates a new builder seeded with the base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			token_endpoint: None,
			client_auth_method: ClientAuthMethod::default(),
			user_agent: None,
			throttle_fallback: ThrottleFallback::default(),
			default_cooldown: crate::rate_limit::RateLimiter::DEFAULT_COOLDOWN,
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Overrides the `User-Agent` product token.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Overrides the throttled-read behavior.
	pub fn throttle_fallback(mut self, fallback: ThrottleFallback) -> Self {
		self.throttle_fallback = fallback;

		self
	}

	/// Overrides the cooldown used when a `429` carries no retry metadata.
	pub fn default_cooldown(mut self, cooldown: Duration) -> Self {
		self.default_cooldown = cooldown;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiDescriptor, ApiDescriptorError> {
		let descriptor = ApiDescriptor {
			base_url: self.base_url,
			token_endpoint: self.token_endpoint,
			client_auth_method: self.client_auth_method,
			user_agent: self.user_agent.unwrap_or_else(default_user_agent),
			throttle_fallback: self.throttle_fallback,
			default_cooldown_secs: u64::try_from(self.default_cooldown.whole_seconds())
				.unwrap_or_default(),
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

/// `User-Agent` used when none is configured.
pub fn default_user_agent() -> String {
	format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ApiDescriptorError> {
	if url.scheme() == "https" || (url.scheme() == "http" && is_loopback(url)) {
		Ok(())
	} else {
		Err(ApiDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.is_ok_and(|ip| ip.is_loopback()),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("Test URL should parse.")
	}

	#[test]
	fn builder_applies_defaults() {
		let descriptor = ApiDescriptor::builder(url("https://api.example.com/v1/"))
			.build()
			.expect("Descriptor without token endpoint should build.");

		assert_eq!(descriptor.client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert_eq!(descriptor.throttle_fallback, ThrottleFallback::Surface);
		assert_eq!(descriptor.default_cooldown(), Duration::seconds(60));
		assert!(descriptor.user_agent.starts_with("oauth2-jsonapi/"));
	}

	#[test]
	fn rejects_plain_http_outside_loopback() {
		let err = ApiDescriptor::builder(url("https://api.example.com/"))
			.token_endpoint(url("http://auth.example.com/token"))
			.build()
			.expect_err("Plain HTTP token endpoints must be rejected.");

		assert_eq!(
			err,
			ApiDescriptorError::InsecureEndpoint {
				endpoint: "token",
				url: "http://auth.example.com/token".into(),
			}
		);

		for base in ["http://127.0.0.1:8080/", "http://localhost/", "http://[::1]:9000/"] {
			ApiDescriptor::builder(url(base))
				.build()
				.unwrap_or_else(|e| panic!("Loopback base {base} should be accepted: {e}"));
		}
	}

	#[test]
	fn rejects_blank_user_agent_and_opaque_base() {
		assert_eq!(
			ApiDescriptor::builder(url("https://api.example.com/")).user_agent("  ").build(),
			Err(ApiDescriptorError::EmptyUserAgent)
		);
		assert!(matches!(
			ApiDescriptor::builder(url("mailto:ops@example.com")).build(),
			Err(ApiDescriptorError::InvalidBaseUrl { .. })
		));
	}

	#[test]
	fn descriptor_round_trips_through_json() {
		let descriptor = ApiDescriptor::builder(url("https://api.example.com/"))
			.throttle_fallback(ThrottleFallback::EmptyOnFirst)
			.default_cooldown(Duration::seconds(15))
			.build()
			.expect("Descriptor should build.");
		let json = serde_json::to_value(&descriptor).expect("Descriptor should serialize.");

		assert_eq!(json["throttle_fallback"], "empty_on_first");
		assert_eq!(json["default_cooldown_secs"], 15);

		let restored: ApiDescriptor =
			serde_json::from_value(json).expect("Descriptor should deserialize.");

		assert_eq!(restored, descriptor);
	}
}
