//! [`TokenStore`] backed by any [`KeyValueStore`].

// self
use crate::{
	_prelude::*,
	auth::Token,
	store::{KeyValueStore, StoreFuture, TokenStore, decode_token, encode_token},
};

/// Stores the active token as JSON under a single key.
#[derive(Clone, Debug)]
pub struct KvTokenStore<K> {
	kv: K,
	key: String,
	namespace: String,
}
impl<K> KvTokenStore<K>
where
	K: KeyValueStore,
{
	/// Key used when none is configured.
	pub const DEFAULT_KEY: &'static str = "oauth:token";

	/// Wraps `kv`, storing the token under [`Self::DEFAULT_KEY`].
	pub fn new(kv: K) -> Self {
		Self::with_key(kv, Self::DEFAULT_KEY)
	}

	/// Wraps `kv`, storing the token under `key`.
	///
	/// [`TokenStore::list`] returns every token whose key shares the namespace before the last
	/// `:` in `key` (the whole key when it has no separator).
	pub fn with_key(kv: K, key: impl Into<String>) -> Self {
		let key = key.into();
		let namespace = match key.rfind(':') {
			Some(idx) => key[..=idx].to_owned(),
			None => key.clone(),
		};

		Self { kv, key, namespace }
	}

	/// Returns the key holding the active token.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Returns the wrapped key-value backend.
	pub fn backend(&self) -> &K {
		&self.kv
	}
}
impl<K> TokenStore for KvTokenStore<K>
where
	K: KeyValueStore,
{
	fn get(&self) -> StoreFuture<'_, Option<Token>> {
		Box::pin(async move {
			match self.kv.get(&self.key).await? {
				Some(raw) => decode_token(&self.key, &raw).map(Some),
				None => Ok(None),
			}
		})
	}

	fn put(&self, token: Token) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let raw = encode_token(&token)?;

			self.kv.set(&self.key, raw).await
		})
	}

	fn delete(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move { self.kv.remove(&self.key).await })
	}

	fn list(&self) -> StoreFuture<'_, Vec<Token>> {
		Box::pin(async move {
			self.kv
				.scan(&self.namespace)
				.await?
				.into_iter()
				.map(|(key, raw)| decode_token(&key, &raw))
				.collect()
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::token_expiring_in,
		store::{MemoryKv, StoreError},
	};

	#[tokio::test]
	async fn missing_key_is_none_not_error() {
		let store = KvTokenStore::new(MemoryKv::default());

		assert_eq!(store.get().await.expect("Absent tokens must not raise."), None);
		assert!(store.list().await.expect("Listing an empty store should succeed.").is_empty());
		store.delete().await.expect("Deleting an absent token must not raise.");
	}

	#[tokio::test]
	async fn put_replaces_wholesale() {
		let store = KvTokenStore::new(MemoryKv::default());

		store
			.put(token_expiring_in("access-1", Some("refresh-1"), Duration::hours(1)))
			.await
			.expect("First put should succeed.");
		store
			.put(token_expiring_in("access-2", None, Duration::hours(1)))
			.await
			.expect("Second put should succeed.");

		let stored = store.get().await.expect("Get should succeed.").expect("Token should exist.");

		assert_eq!(stored.access_token.expose(), "access-2");
		assert!(stored.refresh_token.is_none());
	}

	#[tokio::test]
	async fn list_spans_the_key_namespace() {
		let kv = MemoryKv::default();
		let primary = KvTokenStore::with_key(kv.clone(), "tokens:primary");
		let secondary = KvTokenStore::with_key(kv.clone(), "tokens:secondary");

		primary
			.put(token_expiring_in("access-a", None, Duration::hours(1)))
			.await
			.expect("Primary put should succeed.");
		secondary
			.put(token_expiring_in("access-b", None, Duration::hours(1)))
			.await
			.expect("Secondary put should succeed.");
		kv.set("other:key", "ignored".into()).await.expect("Unrelated set should succeed.");

		assert_eq!(primary.list().await.expect("List should succeed.").len(), 2);
	}

	#[tokio::test]
	async fn corrupt_value_is_a_fault() {
		let kv = MemoryKv::with_entries([(KvTokenStore::<MemoryKv>::DEFAULT_KEY, "{oops")]);
		let store = KvTokenStore::new(kv);
		let err = store.get().await.expect_err("Corrupt tokens must surface as faults.");

		assert!(matches!(err, StoreError::Serialization { .. }));
	}
}
