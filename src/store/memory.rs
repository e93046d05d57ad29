//! Thread-safe in-memory [`KeyValueStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreError, StoreFuture},
};

type KvMap = Arc<RwLock<BTreeMap<String, String>>>;

/// Process-local key-value map; clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryKv(KvMap);
impl MemoryKv {
	/// Creates a map seeded with the provided entries.
	pub fn with_entries<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Returns the number of stored entries.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn scan_now(map: &KvMap, prefix: &str) -> Vec<(String, String)> {
		map.read()
			.range(prefix.to_owned()..)
			.take_while(|(key, _)| key.starts_with(prefix))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect()
	}
}
impl KeyValueStore for MemoryKv {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let value = self.0.read().get(key).cloned();

		Box::pin(async move { Ok(value) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		self.0.write().insert(key.to_owned(), value);

		Box::pin(async { Ok::<_, StoreError>(()) })
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		self.0.write().remove(key);

		Box::pin(async { Ok::<_, StoreError>(()) })
	}

	fn scan<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<(String, String)>> {
		let entries = Self::scan_now(&self.0, prefix);

		Box::pin(async move { Ok(entries) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn scan_only_returns_matching_prefix() {
		let kv = MemoryKv::with_entries([
			("cache:issues:1", "a"),
			("cache:issues:2", "b"),
			("cache:users:1", "c"),
			("oauth:token", "d"),
		]);
		let issues = kv.scan("cache:issues:").await.expect("Scan should succeed.");

		assert_eq!(issues.len(), 2);
		assert!(issues.iter().all(|(key, _)| key.starts_with("cache:issues:")));
		assert_eq!(kv.scan("").await.expect("Scan should succeed.").len(), 4);
	}

	#[tokio::test]
	async fn remove_is_idempotent() {
		let kv = MemoryKv::default();

		kv.set("k", "v".into()).await.expect("Set should succeed.");
		kv.remove("k").await.expect("First remove should succeed.");
		kv.remove("k").await.expect("Second remove should succeed.");

		assert!(kv.is_empty());
		assert_eq!(kv.get("k").await.expect("Get should succeed."), None);
	}
}
