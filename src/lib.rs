//! OAuth 2.0 protected JSON:API client runtime: a rate-limit aware REST transport, pluggable
//! token stores with single-flight refresh, a resource cache mirrored from responses, and signed
//! webhook parsing.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod jsonapi;
pub mod oauth;
pub mod obs;
pub mod rate_limit;
pub mod rest;
pub mod session;
pub mod store;
pub mod webhook;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		auth::Token,
		config::ApiDescriptor,
		error::TransportError,
		http::{HttpClient, HttpFuture, HttpRequest, HttpResponse, StatusCode},
	};

	/// Response script entry consumed by [`ScriptedHttpClient`].
	#[derive(Clone, Debug)]
	pub struct ScriptedResponse {
		/// HTTP status returned to the caller.
		pub status: u16,
		/// Header pairs attached to the response.
		pub headers: Vec<(&'static str, String)>,
		/// Raw response body.
		pub body: Vec<u8>,
	}
	impl ScriptedResponse {
		/// Builds a JSON response with the provided status.
		pub fn json(status: u16, body: impl Into<String>) -> Self {
			Self {
				status,
				headers: vec![("content-type", "application/vnd.api+json".into())],
				body: body.into().into_bytes(),
			}
		}

		/// Builds an empty response with the provided status.
		pub fn empty(status: u16) -> Self {
			Self { status, headers: Vec::new(), body: Vec::new() }
		}

		/// Adds a header to the response.
		pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
			self.headers.push((name, value.into()));

			self
		}
	}

	/// In-process [`HttpClient`] that replays queued responses and records every request.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedHttpClient {
		responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
		requests: Arc<Mutex<Vec<HttpRequest>>>,
	}
	impl ScriptedHttpClient {
		/// Creates a client that replays the provided responses in order.
		pub fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Self {
			Self {
				responses: Arc::new(Mutex::new(responses.into_iter().collect())),
				requests: Default::default(),
			}
		}

		/// Queues another response.
		pub fn push(&self, response: ScriptedResponse) {
			self.responses.lock().push_back(response);
		}

		/// Returns the number of requests issued so far.
		pub fn request_count(&self) -> usize {
			self.requests.lock().len()
		}

		/// Returns a snapshot of the recorded requests.
		pub fn requests(&self) -> Vec<HttpRequest> {
			self.requests.lock().clone()
		}
	}
	impl HttpClient for ScriptedHttpClient {
		fn execute(&self, request: HttpRequest) -> HttpFuture<'_> {
			Box::pin(async move {
				self.requests.lock().push(request);

				let scripted = self.responses.lock().pop_front().ok_or_else(|| {
					TransportError::network(std::io::Error::other("No scripted response left."))
				})?;
				let mut response = HttpResponse::new(scripted.body);

				*response.status_mut() = StatusCode::from_u16(scripted.status)
					.map_err(|e| TransportError::network(std::io::Error::other(e)))?;

				for (name, value) in scripted.headers {
					let value = value
						.parse()
						.map_err(|e| TransportError::network(std::io::Error::other(e)))?;

					response.headers_mut().insert(name, value);
				}

				Ok(response)
			})
		}
	}

	/// Builds a descriptor pointing at `https://api.example.com` for tests.
	pub fn test_descriptor() -> ApiDescriptor {
		ApiDescriptor::builder(
			Url::parse("https://api.example.com/").expect("Test base URL should parse."),
		)
		.token_endpoint(
			Url::parse("https://api.example.com/oauth/token")
				.expect("Test token endpoint should parse."),
		)
		.build()
		.expect("Test descriptor should build.")
	}

	/// Builds a token that expires `expires_in` from now.
	pub fn token_expiring_in(access: &str, refresh: Option<&str>, expires_in: Duration) -> Token {
		let mut builder = Token::builder().access_token(access).expires_in(expires_in);

		if let Some(refresh) = refresh {
			builder = builder.refresh_token(refresh);
		}

		builder.build().expect("Token fixture should build.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
