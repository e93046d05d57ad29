//! Passive mirror of resources seen in API responses.
//!
//! [`ResourceCache`] presents one async interface over two backend families:
//!
//! - [`SyncCacheBackend`]: in-process maps such as [`MemoryCache`], selected with
//!   [`ResourceCache::create_sync`].
//! - [`AsyncCacheBackend`]: remote or persistent stores such as [`KvCache`], selected with
//!   [`ResourceCache::create_async`].
//!
//! The cache never issues network calls of its own. Entries are never expired by the cache;
//! only the backend may evict.

pub mod kv;
pub mod memory;

pub use kv::KvCache;
pub use memory::MemoryCache;

// self
use crate::{
	_prelude::*,
	jsonapi::{Document, Resource},
	store::{StoreError, StoreFuture},
};

/// Cached snapshot of one resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheItem<T> {
	/// Resource type.
	pub resource_type: String,
	/// Resource identifier, unique per type.
	pub id: String,
	/// Snapshot value.
	pub value: T,
}
impl<T> CacheItem<T> {
	/// Creates an item.
	pub fn new(resource_type: impl Into<String>, id: impl Into<String>, value: T) -> Self {
		Self { resource_type: resource_type.into(), id: id.into(), value }
	}
}
impl CacheItem<Resource> {
	/// Wraps a resource that carries an identifier.
	pub fn from_resource(resource: &Resource) -> Option<Self> {
		let id = resource.id.clone()?;

		Some(Self::new(resource.resource_type.clone(), id, resource.clone()))
	}
}

/// Construction options shared by both backend families.
#[derive(Clone, Debug)]
pub struct CacheStoreOptions<T> {
	/// Whether `put` on an absent key creates it.
	pub patch_unknown_item: bool,
	/// Items loaded before any request-driven write.
	pub initial: Vec<CacheItem<T>>,
}
impl<T> Default for CacheStoreOptions<T> {
	fn default() -> Self {
		Self { patch_unknown_item: false, initial: Vec::new() }
	}
}

/// Synchronous backend capability.
pub trait SyncCacheBackend<T>
where
	Self: Send + Sync,
{
	/// Reads one item.
	fn get(&self, resource_type: &str, id: &str) -> Result<Option<CacheItem<T>>, StoreError>;

	/// Writes one item, replacing any previous value at its key.
	fn set(&self, item: CacheItem<T>) -> Result<(), StoreError>;

	/// Removes one item; removing an absent key is not an error.
	fn remove(&self, resource_type: &str, id: &str) -> Result<(), StoreError>;

	/// Lists items, optionally restricted to one type.
	fn list(&self, resource_type: Option<&str>) -> Result<Vec<CacheItem<T>>, StoreError>;
}

/// Asynchronous backend capability.
pub trait AsyncCacheBackend<T>
where
	Self: Send + Sync,
{
	/// Reads one item.
	fn get<'a>(&'a self, resource_type: &'a str, id: &'a str)
	-> StoreFuture<'a, Option<CacheItem<T>>>;

	/// Writes one item, replacing any previous value at its key.
	fn set(&self, item: CacheItem<T>) -> StoreFuture<'_, ()>;

	/// Removes one item; removing an absent key is not an error.
	fn remove<'a>(&'a self, resource_type: &'a str, id: &'a str) -> StoreFuture<'a, ()>;

	/// Lists items, optionally restricted to one type.
	fn list<'a>(&'a self, resource_type: Option<&'a str>) -> StoreFuture<'a, Vec<CacheItem<T>>>;
}

enum Backend<T> {
	Sync(Arc<dyn SyncCacheBackend<T>>),
	Async(Arc<dyn AsyncCacheBackend<T>>),
}

/// How [`ResourceCache::absorb`] treats primary data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbsorbMode {
	/// Response to a read: primary resources are created or replaced.
	Fetch,
	/// Response to a create/update: primary resources follow the `put` rule.
	Mutation,
}

/// Keyed cache of resource snapshots over a sync or async backend.
pub struct ResourceCache<T = Resource> {
	backend: Backend<T>,
	patch_unknown_item: bool,
	writes: AsyncMutex<()>,
}
impl<T> ResourceCache<T>
where
	T: 'static + Clone + Send + Sync,
{
	/// Wraps a synchronous backend and loads the seed items.
	pub fn create_sync(
		backend: impl 'static + SyncCacheBackend<T>,
		options: CacheStoreOptions<T>,
	) -> Result<Self> {
		for item in options.initial {
			backend.set(item)?;
		}

		Ok(Self {
			backend: Backend::Sync(Arc::new(backend)),
			patch_unknown_item: options.patch_unknown_item,
			writes: AsyncMutex::new(()),
		})
	}

	/// Wraps an asynchronous backend and loads the seed items.
	pub async fn create_async(
		backend: impl 'static + AsyncCacheBackend<T>,
		options: CacheStoreOptions<T>,
	) -> Result<Self> {
		for item in options.initial {
			backend.set(item).await?;
		}

		Ok(Self {
			backend: Backend::Async(Arc::new(backend)),
			patch_unknown_item: options.patch_unknown_item,
			writes: AsyncMutex::new(()),
		})
	}

	/// Returns whether `put` creates absent keys.
	pub fn patch_unknown_item(&self) -> bool {
		self.patch_unknown_item
	}

	/// Reads one item.
	pub async fn get(&self, resource_type: &str, id: &str) -> Result<Option<CacheItem<T>>> {
		Ok(match &self.backend {
			Backend::Sync(backend) => backend.get(resource_type, id)?,
			Backend::Async(backend) => backend.get(resource_type, id).await?,
		})
	}

	/// Updates an item; an absent key is created only when `patch_unknown_item` is set.
	///
	/// Returns whether the write happened. A dropped write is not an error.
	pub async fn put(&self, resource_type: &str, id: &str, value: T) -> Result<bool> {
		let _ordered = self.writes.lock().await;

		if !self.patch_unknown_item && self.get(resource_type, id).await?.is_none() {
			return Ok(false);
		}

		self.write(CacheItem::new(resource_type, id, value)).await?;

		Ok(true)
	}

	/// Creates or replaces an item unconditionally.
	pub async fn upsert(&self, resource_type: &str, id: &str, value: T) -> Result<()> {
		let _ordered = self.writes.lock().await;

		self.write(CacheItem::new(resource_type, id, value)).await
	}

	/// Removes an item.
	pub async fn remove(&self, resource_type: &str, id: &str) -> Result<()> {
		let _ordered = self.writes.lock().await;

		match &self.backend {
			Backend::Sync(backend) => backend.remove(resource_type, id)?,
			Backend::Async(backend) => backend.remove(resource_type, id).await?,
		}

		Ok(())
	}

	/// Lists items, optionally restricted to one type.
	pub async fn list(&self, resource_type: Option<&str>) -> Result<Vec<CacheItem<T>>> {
		Ok(match &self.backend {
			Backend::Sync(backend) => backend.list(resource_type)?,
			Backend::Async(backend) => backend.list(resource_type).await?,
		})
	}

	async fn write(&self, item: CacheItem<T>) -> Result<()> {
		match &self.backend {
			Backend::Sync(backend) => backend.set(item)?,
			Backend::Async(backend) => backend.set(item).await?,
		}

		Ok(())
	}
}
impl ResourceCache<Resource> {
	/// Mirrors the resources of a response document; returns how many entries were written.
	///
	/// Primary data follows `mode`. Side-loaded (`included`) resources always follow the `put`
	/// rule. Resources without an identifier are skipped.
	pub async fn absorb(&self, document: &Document, mode: AbsorbMode) -> Result<usize> {
		let mut written = 0;

		for resource in document.primary() {
			let Some(id) = resource.id.as_deref() else { continue };

			match mode {
				AbsorbMode::Fetch => {
					self.upsert(&resource.resource_type, id, resource.clone()).await?;

					written += 1;
				},
				AbsorbMode::Mutation =>
					if self.put(&resource.resource_type, id, resource.clone()).await? {
						written += 1;
					},
			}
		}
		for resource in &document.included {
			let Some(id) = resource.id.as_deref() else { continue };

			if self.put(&resource.resource_type, id, resource.clone()).await? {
				written += 1;
			}
		}

		Ok(written)
	}
}
impl<T> Debug for ResourceCache<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResourceCache")
			.field("backend", &if self.is_async() { "async" } else { "sync" })
			.field("patch_unknown_item", &self.patch_unknown_item)
			.finish()
	}
}
impl<T> ResourceCache<T> {
	/// Returns `true` for async-backed caches.
	pub fn is_async(&self) -> bool {
		matches!(self.backend, Backend::Async(_))
	}
}
