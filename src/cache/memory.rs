//! In-process [`SyncCacheBackend`].

// self
use crate::{
	_prelude::*,
	cache::{CacheItem, SyncCacheBackend},
	store::StoreError,
};

type CacheMap<T> = Arc<RwLock<BTreeMap<(String, String), T>>>;

/// Map keyed by `(type, id)`; clones share the same entries.
#[derive(Debug)]
pub struct MemoryCache<T>(CacheMap<T>);
impl<T> MemoryCache<T> {
	/// Returns the number of cached items.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl<T> Clone for MemoryCache<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}
impl<T> Default for MemoryCache<T> {
	fn default() -> Self {
		Self(Default::default())
	}
}
impl<T> SyncCacheBackend<T> for MemoryCache<T>
where
	T: Clone + Send + Sync,
{
	fn get(&self, resource_type: &str, id: &str) -> Result<Option<CacheItem<T>>, StoreError> {
		let key = (resource_type.to_owned(), id.to_owned());

		Ok(self.0.read().get(&key).map(|value| CacheItem::new(resource_type, id, value.clone())))
	}

	fn set(&self, item: CacheItem<T>) -> Result<(), StoreError> {
		self.0.write().insert((item.resource_type, item.id), item.value);

		Ok(())
	}

	fn remove(&self, resource_type: &str, id: &str) -> Result<(), StoreError> {
		self.0.write().remove(&(resource_type.to_owned(), id.to_owned()));

		Ok(())
	}

	fn list(&self, resource_type: Option<&str>) -> Result<Vec<CacheItem<T>>, StoreError> {
		Ok(self
			.0
			.read()
			.iter()
			.filter(|((kind, _), _)| resource_type.is_none_or(|wanted| kind == wanted))
			.map(|((kind, id), value)| CacheItem::new(kind.as_str(), id.as_str(), value.clone()))
			.collect())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clones_share_entries() {
		let cache = MemoryCache::default();
		let view = cache.clone();

		cache.set(CacheItem::new("tags", "rust", 1_u8)).expect("Set should succeed.");

		assert_eq!(view.len(), 1);
		assert_eq!(
			view.get("tags", "rust").expect("Get should succeed."),
			Some(CacheItem::new("tags", "rust", 1))
		);
		assert_eq!(view.get("tags", "go").expect("Get should succeed."), None);
	}
}
