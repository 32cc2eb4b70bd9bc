use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Имена "корзин" в хранилище.
pub const PASSWORDS_KEY: &str = "passwords";
pub const SETTINGS_KEY: &str = "settings";
pub const PIN_KEY: &str = "@password_manager_pin";
pub const WELCOME_KEY: &str = "hasSeenWelcome";

/// Переменная окружения, переопределяющая корень хранилища.
pub const HOME_ENV: &str = "PASSBOOK_HOME";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot determine data directory")]
    NoDataDir,
    #[error("storage I/O failed for `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value for `{key}` is not valid JSON: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Постоянное хранилище строк по ключу. Значения не шифруются.
pub trait KvStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StoreError>;
    /// Удалить вообще всё.
    fn clear(&mut self) -> Result<(), StoreError>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError>
    where
        Self: Sized,
    {
        match self.get_item(key)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })?;
        self.set_item(key, &raw)
    }
}

/// Корневая директория хранилища (например, ~/.local/share/passbook)
pub fn store_root() -> Result<PathBuf, StoreError> {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let mut dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
    dir.push("passbook");
    Ok(dir)
}

/// Один файл на ключ в корне хранилища.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        tracing::debug!(root = %root.display(), "opened file store");
        Ok(Self { root })
    }

    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(store_root()?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        key: key.to_string(),
        source,
    }
}

impl KvStore for FileStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.item_path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(key)(e)),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.item_path(key);
        fs::write(&path, value).map_err(io_err(key))?;
        // секреты лежат открытым текстом, так что хотя бы 0600
        set_perms_restrictive(&path).map_err(io_err(key))?;
        tracing::trace!(key, bytes = value.len(), "stored item");
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(key)(e)),
        }
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let root_key = self.root.display().to_string();
        let entries = fs::read_dir(&self.root).map_err(io_err(&root_key))?;
        for entry in entries {
            let path = entry.map_err(io_err(&root_key))?.path();
            let is_item = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "json")
                .unwrap_or(false);
            if is_item && path.is_file() {
                fs::remove_file(&path).map_err(io_err(&root_key))?;
            }
        }
        tracing::info!(root = %self.root.display(), "cleared store");
        Ok(())
    }
}

#[cfg(unix)]
pub(crate) fn set_perms_restrictive(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub(crate) fn set_perms_restrictive(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Хранилище в памяти для тестов.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: std::collections::HashMap<String, String>,
    pub fail_writes: bool,
}

#[cfg(test)]
impl KvStore for MemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StoreError> {
        self.items.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.items.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_key_reads_as_none() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get_item(PASSWORDS_KEY).unwrap(), None);
    }

    #[test]
    fn raw_and_json_values_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path().join("nested")).unwrap();

        store.set_item(PIN_KEY, "1234").unwrap();
        assert_eq!(store.get_item(PIN_KEY).unwrap().as_deref(), Some("1234"));

        store.set_json(SETTINGS_KEY, &vec![1, 2, 3]).unwrap();
        let back: Option<Vec<i32>> = store.get_json(SETTINGS_KEY).unwrap();
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn corrupt_json_is_reported() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set_item(PASSWORDS_KEY, "{not json").unwrap();
        let err = store.get_json::<Vec<String>>(PASSWORDS_KEY).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn clear_removes_every_bucket() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set_item(WELCOME_KEY, "true").unwrap();
        store.set_item(PIN_KEY, "0000").unwrap();
        store.remove_item("never-written").unwrap();

        store.clear().unwrap();
        assert_eq!(store.get_item(WELCOME_KEY).unwrap(), None);
        assert_eq!(store.get_item(PIN_KEY).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn items_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        store.set_item(PIN_KEY, "1234").unwrap();
        let mode = fs::metadata(store.item_path(PIN_KEY))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
