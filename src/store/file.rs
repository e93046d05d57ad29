//! JSON-file [`KeyValueStore`] for lightweight deployments and bots.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreError, StoreFuture},
};

/// Persists entries to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileKv {
	path: PathBuf,
	inner: Arc<RwLock<BTreeMap<String, String>>>,
}
impl FileKv {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the backing file path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
		if !path.exists() {
			return Ok(BTreeMap::new());
		}

		let bytes = fs::read(path).map_err(|e| {
			StoreError::backend(format_args!("Failed to read {}", path.display()), e)
		})?;

		if bytes.is_empty() {
			return Ok(BTreeMap::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| {
			StoreError::serialization(format_args!("Failed to parse {}", path.display()), e)
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| {
				StoreError::backend(
					format_args!("Failed to create store directory {}", parent.display()),
					e,
				)
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &BTreeMap<String, String>) -> Result<(), StoreError> {
		let serialized = serde_json::to_vec_pretty(contents)
			.map_err(|e| StoreError::serialization("Failed to serialize store snapshot", e))?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| {
				StoreError::backend(format_args!("Failed to create {}", tmp_path.display()), e)
			})?;

			file.write_all(&serialized).map_err(|e| {
				StoreError::backend(format_args!("Failed to write {}", tmp_path.display()), e)
			})?;
			file.sync_all().map_err(|e| {
				StoreError::backend(format_args!("Failed to sync {}", tmp_path.display()), e)
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| {
			StoreError::backend(format_args!("Failed to replace {}", self.path.display()), e)
		})
	}
}
impl KeyValueStore for FileKv {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(key.to_owned(), value);
			self.persist_locked(&guard)
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(key).is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(())
		})
	}

	fn scan<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<(String, String)>> {
		Box::pin(async move {
			Ok(self
				.inner
				.read()
				.iter()
				.filter(|(key, _)| key.starts_with(prefix))
				.map(|(key, value)| (key.clone(), value.clone()))
				.collect())
		})
	}
}
