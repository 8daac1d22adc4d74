//! Key/value storage backends and on-disk path management.
//!
//! The session store only needs `get/set/delete` over string keys, so storage
//! sits behind [`KeyValueStorage`]. Backends report failures as `Err`; callers
//! higher up decide how to degrade.
//!
//! ## Backends
//!
//! - [`MemoryStorage`]: process-local map, used by tests and ephemeral shells
//! - [`FileStorage`]: one JSON file per key under a root directory, written
//!   atomically (temp file + rename)

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs_err as fs;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::{Result, ShellError};

pub trait KeyValueStorage: Send + Sync {
    /// `Ok(None)` when the key has never been written or was deleted.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Every stored key, sorted. Backends that cannot enumerate return empty.
    fn keys(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory backend
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// File backend
// ═══════════════════════════════════════════════════════════════════════════════

const RECORD_EXTENSION: &str = "json";

/// Stores each key as `<root>/<encoded-key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_key(key), RECORD_EXTENSION))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ShellError::io(format!("Failed to read record {key}"), err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|err| ShellError::io("Failed to create storage directory", err))?;

        let path = self.path_for(key);
        let mut temp_file = NamedTempFile::new_in(&self.root)
            .map_err(|err| ShellError::io("Temp file error", err))?;
        temp_file
            .write_all(value.as_bytes())
            .map_err(|err| ShellError::io("Failed to write temp record", err))?;
        temp_file
            .flush()
            .map_err(|err| ShellError::io("Failed to flush temp record", err))?;
        temp_file
            .persist(&path)
            .map_err(|err| ShellError::PersistFailed {
                path: path.clone(),
                source: err.error,
            })?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ShellError::io(format!("Failed to delete record {key}"), err)),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| {
                ShellError::StorageUnavailable(format!("Failed to list storage directory: {err}"))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION)
            {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_key)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9_.-]`.
///
/// Example: `nexus.workspace:ops floor` -> `nexus.workspace%3Aops%20floor`
pub fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' | b'-' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Reverses [`encode_key`]. `None` for malformed escapes or invalid UTF-8.
pub fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = encoded.get(index + 1..index + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Paths
// ═══════════════════════════════════════════════════════════════════════════════

/// Central configuration for all workspace shell paths.
///
/// Production code uses [`StorageConfig::from_home`], which points to
/// `~/.workspace-shell/`. Tests use [`StorageConfig::with_root`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ShellError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(".workspace-shell"),
        })
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one file per persisted session record.
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn session_storage(&self) -> FileStorage {
        FileStorage::new(self.sessions_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_storage_get_set_delete() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);

        storage.set("k", "v1").unwrap();
        storage.set("k", "v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v2"));

        storage.delete("k").unwrap();
        storage.delete("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_keys_sorted() {
        let storage = MemoryStorage::new();
        storage.set("b", "1").unwrap();
        storage.set("a", "2").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path().join("sessions"));

        assert_eq!(storage.get("nexus:ops").unwrap(), None);
        storage.set("nexus:ops", r#"{"version":1}"#).unwrap();
        assert_eq!(
            storage.get("nexus:ops").unwrap().as_deref(),
            Some(r#"{"version":1}"#)
        );
        assert!(storage.path_for("nexus:ops").exists());

        storage.delete("nexus:ops").unwrap();
        assert_eq!(storage.get("nexus:ops").unwrap(), None);
    }

    #[test]
    fn test_file_storage_delete_missing_is_ok() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path());
        assert!(storage.delete("never-written").is_ok());
    }

    #[test]
    fn test_file_storage_lists_decoded_keys() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path());
        storage.set("nexus.workspace:ops floor", "{}").unwrap();
        storage.set("nexus.workspace:bridge/7", "{}").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(
            storage.keys().unwrap(),
            vec!["nexus.workspace:bridge/7", "nexus.workspace:ops floor"]
        );
    }

    #[test]
    fn test_file_storage_keys_on_missing_root() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path().join("absent"));
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_file_storage_read_error_surfaces() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path());
        // A directory where the record file should be cannot be read as a string.
        std::fs::create_dir_all(storage.path_for("blocked")).unwrap();
        assert!(storage.get("blocked").is_err());
    }

    #[test]
    fn test_key_encoding_reverses() {
        for key in ["plain", "nexus.workspace:ops", "a b/c%d", "ünïcode"] {
            let encoded = encode_key(key);
            assert!(encoded
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"_.-%".contains(&b)));
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
        assert_eq!(encode_key("a:b"), "a%3Ab");
        assert_eq!(decode_key("bad%zz"), None);
        assert_eq!(decode_key("trunc%4"), None);
    }

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::with_root(PathBuf::from("/tmp/shell"));
        assert_eq!(config.sessions_dir(), PathBuf::from("/tmp/shell/sessions"));
        assert_eq!(config.config_file(), PathBuf::from("/tmp/shell/config.json"));
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/shell/logs"));
        assert_eq!(config.session_storage().root(), Path::new("/tmp/shell/sessions"));
    }
}
