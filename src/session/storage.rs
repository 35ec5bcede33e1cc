//! Durable local storage for the session snapshot.

use std::{collections::HashMap, io, path::PathBuf, sync::Mutex};

use async_trait::async_trait;

#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self, key: &str) -> io::Result<Option<String>>;
    async fn store(&self, key: &str, value: &str) -> io::Result<()>;
    async fn remove(&self, key: &str) -> io::Result<()>;
}

/// Process memory only. Survives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("session storage lock poisoned"))
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn load(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> io::Result<()> {
        self.entries()?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn load(&self, key: &str) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn store(&self, key: &str, value: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path(key), value).await
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path(key)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// The browser's cookie session, for requests served over HTTP.
#[async_trait]
impl SessionStorage for tower_sessions::Session {
    async fn load(&self, key: &str) -> io::Result<Option<String>> {
        self.get::<String>(key).await.map_err(io::Error::other)
    }

    async fn store(&self, key: &str, value: &str) -> io::Result<()> {
        self.insert(key, value).await.map_err(io::Error::other)
    }

    async fn remove(&self, key: &str) -> io::Result<()> {
        self.remove_value(key)
            .await
            .map(|_| ())
            .map_err(io::Error::other)
    }
}
