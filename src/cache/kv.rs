//! [`AsyncCacheBackend`] persisting JSON items in any [`KeyValueStore`].

// std
use std::{borrow::Cow, marker::PhantomData};
// self
use crate::{
	_prelude::*,
	cache::{AsyncCacheBackend, CacheItem},
	store::{KeyValueStore, StoreError, StoreFuture},
};

/// Stores each item as JSON under `<prefix><type>:<id>`.
///
/// `%` and `:` inside the type and id are percent-encoded, so every `(type, id)` pair maps to a
/// distinct key.
#[derive(Debug)]
pub struct KvCache<K, T> {
	kv: K,
	prefix: String,
	_item: PhantomData<fn() -> T>,
}
impl<K, T> KvCache<K, T>
where
	K: KeyValueStore,
{
	/// Prefix used when none is configured.
	pub const DEFAULT_PREFIX: &'static str = "cache:";

	/// Wraps `kv` using [`Self::DEFAULT_PREFIX`].
	pub fn new(kv: K) -> Self {
		Self::with_prefix(kv, Self::DEFAULT_PREFIX)
	}

	/// Wraps `kv` using a custom key prefix.
	pub fn with_prefix(kv: K, prefix: impl Into<String>) -> Self {
		Self { kv, prefix: prefix.into(), _item: PhantomData }
	}

	fn key(&self, resource_type: &str, id: &str) -> String {
		format!("{}{}:{}", self.prefix, escape(resource_type), escape(id))
	}
}
impl<K, T> AsyncCacheBackend<T> for KvCache<K, T>
where
	K: KeyValueStore,
	T: Serialize + DeserializeOwned + Send + Sync,
{
	fn get<'a>(
		&'a self,
		resource_type: &'a str,
		id: &'a str,
	) -> StoreFuture<'a, Option<CacheItem<T>>> {
		Box::pin(async move {
			let key = self.key(resource_type, id);

			match self.kv.get(&key).await? {
				Some(raw) => decode_item(&key, &raw).map(Some),
				None => Ok(None),
			}
		})
	}

	fn set(&self, item: CacheItem<T>) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let key = self.key(&item.resource_type, &item.id);
			let raw = serde_json::to_string(&item).map_err(|e| {
				StoreError::serialization(format_args!("Failed to encode cache item `{key}`"), e)
			})?;

			self.kv.set(&key, raw).await
		})
	}

	fn remove<'a>(&'a self, resource_type: &'a str, id: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let key = self.key(resource_type, id);

			self.kv.remove(&key).await
		})
	}

	fn list<'a>(&'a self, resource_type: Option<&'a str>) -> StoreFuture<'a, Vec<CacheItem<T>>> {
		Box::pin(async move {
			let prefix = match resource_type {
				Some(resource_type) => format!("{}{}:", self.prefix, escape(resource_type)),
				None => self.prefix.clone(),
			};
			let mut items = Vec::new();

			for (key, raw) in self.kv.scan(&prefix).await? {
				let item = decode_item::<T>(&key, &raw)?;

				if resource_type.is_none_or(|wanted| item.resource_type == wanted) {
					items.push(item);
				}
			}

			Ok(items)
		})
	}
}

fn escape(part: &str) -> Cow<'_, str> {
	if part.contains(['%', ':']) {
		Cow::Owned(part.replace('%', "%25").replace(':', "%3A"))
	} else {
		Cow::Borrowed(part)
	}
}

fn decode_item<T>(key: &str, raw: &str) -> Result<CacheItem<T>, StoreError>
where
	T: DeserializeOwned,
{
	serde_json::from_str(raw).map_err(|e| {
		StoreError::serialization(format_args!("Failed to decode cache item `{key}`"), e)
	})
}
