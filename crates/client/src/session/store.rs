//! Durable token storage
//!
//! The browser dashboard kept its credentials in `localStorage`; here the same
//! two keys live behind [`TokenStore`], either in memory or in a JSON file
//! that survives process restarts.

use crate::error::ClientError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Storage key of the access credential
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key of the refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key/value storage for session credentials
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Read a stored value
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;

    /// Store a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), ClientError>;
}

/// Process-local store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        let values = self
            .values
            .read()
            .map_err(|_| ClientError::Storage("token store lock poisoned".into()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let mut values = self
            .values
            .write()
            .map_err(|_| ClientError::Storage("token store lock poisoned".into()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        let mut values = self
            .values
            .write()
            .map_err(|_| ClientError::Storage("token store lock poisoned".into()))?;
        values.remove(key);
        Ok(())
    }
}

/// JSON file store
///
/// Every operation re-reads the file so that several processes sharing one
/// file observe each other's logins and logouts.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Create a store backed by `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store under the platform data directory (`.../taskboard/tokens.json`)
    pub fn in_default_location() -> Result<Self, ClientError> {
        let dirs = directories::ProjectDirs::from("", "", "taskboard").ok_or_else(|| {
            ClientError::Storage("could not determine a data directory".into())
        })?;
        Ok(Self::new(dirs.data_dir().join("tokens.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, ClientError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ClientError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let content = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .and_then(|()| restrict_permissions(&tmp))
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                ClientError::Storage(format!("failed to write {}: {e}", self.path.display()))
            })
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), ClientError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ClientError::Storage("token store lock poisoned".into()))?;
        let mut values = self.load()?;
        f(&mut values);
        self.save(&values)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);

        store.set(ACCESS_TOKEN_KEY, "abc").unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        store.remove(ACCESS_TOKEN_KEY).unwrap();
        store.remove(ACCESS_TOKEN_KEY).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let store = FileTokenStore::new(&path);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
        store.set(ACCESS_TOKEN_KEY, "access-1").unwrap();
        store.set(REFRESH_TOKEN_KEY, "refresh-1").unwrap();
        drop(store);

        let reopened = FileTokenStore::new(&path);
        assert_eq!(
            reopened.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
            Some("access-1")
        );
        assert_eq!(
            reopened.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("refresh-1")
        );

        reopened.remove(ACCESS_TOKEN_KEY).unwrap();
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(
            reopened.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("refresh-1")
        );
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert!(matches!(
            store.get(ACCESS_TOKEN_KEY),
            Err(ClientError::Serialization(_))
        ));
    }
}
