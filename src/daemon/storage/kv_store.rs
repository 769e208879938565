use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use fs4::tokio::AsyncFileExt;
use serde_json::{Map, Value};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

/// Single modification inside [KeyValueStore::apply].
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Set(String, Value),
    Remove(String),
}

impl Change {
    pub fn set(key: &str, value: Value) -> Self {
        Change::Set(key.to_string(), value)
    }

    pub fn remove(key: &str) -> Self {
        Change::Remove(key.to_string())
    }
}

/// Interface for abstracting persistence of values under string keys.
pub trait KeyValueStore {
    /// Returns the value stored under `key`, `None` when it was never written.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>>;

    /// Applies every change or none of them.
    fn apply(&self, changes: Vec<Change>) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> {
        self.deref().get(key)
    }

    fn apply(&self, changes: Vec<Change>) -> impl Future<Output = Result<()>> {
        self.deref().apply(changes)
    }
}

fn apply_to_map(map: &mut Map<String, Value>, changes: Vec<Change>) {
    for change in changes {
        match change {
            Change::Set(key, value) => {
                map.insert(key, value);
            }
            Change::Remove(key) => {
                map.remove(&key);
            }
        }
    }
}

const STATE_FILE: &str = "state.json";
const LOCK_FILE: &str = "state.lock";

/// The main realization of [KeyValueStore]. All keys live in one JSON document. Writers
/// replace the document through a rename, so readers only ever see a complete one. The daemon
/// and the cli may access it at the same time, which is why every operation holds a lock on
/// a sibling lock file.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    async fn open_lock(&self) -> Result<File> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))
            .await?;
        Ok(file)
    }

    async fn read_document(&self) -> Result<Map<String, Value>> {
        let path = self.dir.join(STATE_FILE);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => Err(e)?,
        };

        match serde_json::from_slice::<Map<String, Value>>(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("State file {path:?} is corrupted, starting with empty state: {e}");
                Ok(Map::new())
            }
        }
    }

    async fn write_document(&self, map: &Map<String, Value>) -> Result<()> {
        let path = self.dir.join(STATE_FILE);
        let temp_path = path.with_extension("json.tmp");

        let buffer = serde_json::to_vec(map)?;
        let mut file = File::create(&temp_path).await?;
        file.write_all(&buffer).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let lock = self.open_lock().await?;
        lock.lock_shared()?;
        let result = self.read_document().await;
        lock.unlock_async().await?;

        Ok(result?.remove(key))
    }

    async fn apply(&self, changes: Vec<Change>) -> Result<()> {
        // Semi-safe acquire-release for a file
        let lock = self.open_lock().await?;
        lock.lock_exclusive()?;
        let result = async move {
            let mut map = self.read_document().await?;
            debug!("Applying {} changes", changes.len());
            apply_to_map(&mut map, changes);
            self.write_document(&map).await
        }
        .await;
        lock.unlock_async().await?;
        result
    }
}

/// Keeps everything in memory. Useful for tests and for embedding the counters without a disk.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything currently stored.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values
            .lock()
            .map(|values| values.clone().into_iter().collect())
            .unwrap_or_default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow!("Memory store lock is poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn apply(&self, changes: Vec<Change>) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow!("Memory store lock is poisoned"))?;
        apply_to_map(&mut values, changes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use super::{Change, JsonFileStore, KeyValueStore, MemoryStore, STATE_FILE};

    #[tokio::test]
    async fn test_file_store_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        assert_eq!(store.get("today").await?, None);

        store
            .apply(vec![
                Change::set("today", json!({"keyCount": 3})),
                Change::set("history", json!([])),
            ])
            .await?;

        let reopened = JsonFileStore::new(dir.path().to_owned())?;
        assert_eq!(reopened.get("today").await?, Some(json!({"keyCount": 3})));
        assert_eq!(reopened.get("history").await?, Some(json!([])));

        reopened.apply(vec![Change::remove("today")]).await?;
        assert_eq!(store.get("today").await?, None);
        assert_eq!(store.get("history").await?, Some(json!([])));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_store_corrupted_document() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join(STATE_FILE), b"{\"today\": {\"keyC")?;
        let store = JsonFileStore::new(dir.path().to_owned())?;

        assert_eq!(store.get("today").await?, None);

        store.apply(vec![Change::set("today", json!(1))]).await?;
        assert_eq!(store.get("today").await?, Some(json!(1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store_through_arc() -> Result<()> {
        let store = std::sync::Arc::new(MemoryStore::new());
        let shared = store.clone();
        shared.apply(vec![Change::set("a", json!("b"))]).await?;
        assert_eq!(store.get("a").await?, Some(json!("b")));
        assert_eq!(store.snapshot().len(), 1);
        Ok(())
    }
}
