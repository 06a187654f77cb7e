//! Durable client-side key-value storage
//!
//! The bearer token survives restarts through this seam. [`FileStore`] keeps
//! one JSON document per key in a directory, the same way a browser origin
//! keeps its local storage; [`MemoryStore`] is the non-durable variant used
//! when no storage directory is configured.

use crate::types::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Minimal string key-value store
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
	/// Read the value stored under `key`, if any
	fn get(&self, key: &str) -> Result<Option<String>>;

	/// Store `value` under `key`, replacing any previous value
	fn set(&self, key: &str, value: &str) -> Result<()>;

	/// Remove `key`; removing a missing key is not an error
	fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed store, one JSON file per key
#[derive(Debug, Clone)]
pub struct FileStore {
	root: Arc<PathBuf>,
}

impl FileStore {
	/// Creates a store rooted at `root`, creating the directory if needed
	///
	/// # Errors
	/// Returns error if directory creation fails
	pub fn new(root: &Path) -> Result<Self> {
		if !root.exists() {
			std::fs::create_dir_all(root)
				.map_err(|_| Error::DirectoryCreationFailed(root.to_path_buf()))?;
		}

		Ok(Self {
			root: Arc::new(root.to_path_buf()),
		})
	}

	/// Returns the root directory path for this store
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn path_for(&self, key: &str) -> PathBuf {
		self.root.join(format!("{key}.json"))
	}
}

impl KeyValueStore for FileStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		let path = self.path_for(key);

		if !path.exists() {
			return Ok(None);
		}

		let file = std::fs::File::open(&path)
			.map_err(|e| Error::StorageError(format!("Failed to open {key}: {e}")))?;

		let value: String = serde_json::from_reader(file)
			.map_err(|e| Error::StorageError(format!("Failed to read {key}: {e}")))?;

		Ok(Some(value))
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		let path = self.path_for(key);
		let temp_path = path.with_extension("tmp");

		let file = std::fs::File::create(&temp_path)
			.map_err(|e| Error::StorageError(format!("Failed to create {key}: {e}")))?;

		serde_json::to_writer(file, value)
			.map_err(|e| Error::StorageError(format!("Failed to write {key}: {e}")))?;

		std::fs::rename(&temp_path, &path)
			.map_err(|e| Error::StorageError(format!("Failed to replace {key}: {e}")))?;

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		let path = self.path_for(key);

		if path.exists() {
			std::fs::remove_file(&path)
				.map_err(|e| Error::StorageError(format!("Failed to delete {key}: {e}")))?;
		}

		Ok(())
	}
}

/// In-process store; contents are lost when the process exits
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
	entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KeyValueStore for MemoryStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		let entries = self
			.entries
			.read()
			.map_err(|e| Error::StorageError(format!("Failed to acquire read lock: {e}")))?;
		Ok(entries.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		let mut entries = self
			.entries
			.write()
			.map_err(|e| Error::StorageError(format!("Failed to acquire write lock: {e}")))?;
		entries.insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		let mut entries = self
			.entries
			.write()
			.map_err(|e| Error::StorageError(format!("Failed to acquire write lock: {e}")))?;
		entries.remove(key);
		Ok(())
	}
}
