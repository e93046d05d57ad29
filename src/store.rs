//! Token storage contracts and built-in backends.
//!
//! [`TokenStore`] is the capability set the session layer depends on. Three families of
//! backends ship with the crate:
//!
//! - [`KvTokenStore`] over any [`KeyValueStore`] ([`MemoryKv`], [`FileKv`], or your own).
//! - [`FetchTokenStore`], which proxies every operation to a remote HTTP endpoint.
//! - [`CustomTokenStore`], assembled from four async closures.
//!
//! A missing token is `Ok(None)`; only genuine backend faults surface as [`StoreError`].

pub mod custom;
pub mod fetch;
pub mod file;
pub mod kv;
pub mod memory;

pub use custom::CustomTokenStore;
pub use fetch::FetchTokenStore;
pub use file::FileKv;
pub use kv::KvTokenStore;
pub use memory::MemoryKv;

// self
use crate::{_prelude::*, auth::Token};

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the client's OAuth token.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the active token, or `None` when nothing is stored.
	fn get(&self) -> StoreFuture<'_, Option<Token>>;

	/// Persists or replaces the active token.
	fn put(&self, token: Token) -> StoreFuture<'_, ()>;

	/// Removes the active token; removing an absent token is not an error.
	fn delete(&self) -> StoreFuture<'_, ()>;

	/// Lists every token visible to this store.
	fn list(&self) -> StoreFuture<'_, Vec<Token>>;
}

/// Async string key-value capability used by [`KvTokenStore`] and the cache's
/// [`KvCache`](crate::cache::KvCache).
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Writes `value` under `key`, replacing any previous value.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Removes `key`; removing an absent key is not an error.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Lists `(key, value)` pairs whose key starts with `prefix`.
	fn scan<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<(String, String)>>;
}

/// Error type produced by storage backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Stored data could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	pub(crate) fn serialization(context: impl Display, err: impl Display) -> Self {
		Self::Serialization { message: format!("{context}: {err}") }
	}

	pub(crate) fn backend(context: impl Display, err: impl Display) -> Self {
		Self::Backend { message: format!("{context}: {err}") }
	}
}

pub(crate) fn decode_token(key: &str, raw: &str) -> Result<Token, StoreError> {
	serde_json::from_str(raw)
		.map_err(|e| StoreError::serialization(format_args!("Failed to decode token `{key}`"), e))
}

pub(crate) fn encode_token(token: &Token) -> Result<String, StoreError> {
	serde_json::to_string(token).map_err(|e| StoreError::serialization("Failed to encode token", e))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn store_error_messages_carry_context() {
		let error = StoreError::backend("Failed to read tokens.json", "permission denied");

		assert_eq!(
			error.to_string(),
			"Backend failure: Failed to read tokens.json: permission denied."
		);
	}

	#[test]
	fn corrupt_tokens_are_serialization_faults() {
		let error = decode_token("oauth:token", "{not json").expect_err("Corrupt JSON must fail.");

		assert!(matches!(error, StoreError::Serialization { .. }));
		assert!(error.to_string().contains("oauth:token"));
	}
}
