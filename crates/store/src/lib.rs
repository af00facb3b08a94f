//! Mapping-backed document persistence: one pretty-printed JSON file
//! per key under a root directory, with per-key write serialization
//! and all-or-nothing batch commits.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Guards returned by [`DocumentStore::lock_keys`]. Holding them gives
/// the caller exclusive write access to the named documents until drop.
pub type KeyGuards = Vec<OwnedMutexGuard<()>>;

#[derive(Clone)]
pub struct DocumentStore {
    root: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Acquire the write locks for the given keys, in sorted key order
    /// so that two operations wanting overlapping key sets can never
    /// deadlock. Duplicate keys are collapsed.
    pub async fn lock_keys(&self, keys: &[&str]) -> KeyGuards {
        let mut wanted: Vec<&str> = keys.to_vec();
        wanted.sort_unstable();
        wanted.dedup();

        let mut guards = Vec::with_capacity(wanted.len());
        for key in wanted {
            let lock = {
                let mut registry = self.locks.lock().await;
                registry
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            };
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    /// Read the last committed value for `key`. Returns `None` when
    /// the document has never been written.
    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match std::fs::read_to_string(self.document_path(key)) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn put(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        self.put_many(&[(key, document.clone())])
    }

    /// Commit a batch of documents atomically: every document is first
    /// staged to a temp file, and only once all stages succeed are they
    /// renamed into place. A failure while staging leaves every
    /// previously committed document untouched.
    pub fn put_many(&self, documents: &[(&str, Value)]) -> Result<(), StoreError> {
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(documents.len());

        for (key, document) in documents {
            let final_path = self.document_path(key);
            let stage_path = self
                .root
                .join(format!("{key}.json.tmp-{}", uuid::Uuid::new_v4()));
            let raw = serde_json::to_string_pretty(document)?;
            if let Err(err) = std::fs::write(&stage_path, raw) {
                self.discard_staged(&staged, &stage_path);
                return Err(err.into());
            }
            staged.push((stage_path, final_path));
        }

        for (stage_path, final_path) in &staged {
            std::fs::rename(stage_path, final_path)?;
        }
        Ok(())
    }

    fn discard_staged(&self, staged: &[(PathBuf, PathBuf)], failed: &Path) {
        for (stage_path, _) in staged {
            if let Err(err) = std::fs::remove_file(stage_path) {
                tracing::warn!("Failed to remove staged document {stage_path:?}: {err}");
            }
        }
        let _ = std::fs::remove_file(failed);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::DocumentStore;

    fn temp_store() -> DocumentStore {
        let root = std::env::temp_dir().join(format!("store-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        DocumentStore::new(root)
    }

    #[test]
    fn get_returns_none_for_missing_document() {
        let store = temp_store();
        assert!(store.get("history").unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = temp_store();
        let doc = json!({"name": "Ada", "skills": ["rust"]});
        store.put("profile", &doc).unwrap();
        assert_eq!(store.get("profile").unwrap(), Some(doc));
    }

    #[test]
    fn put_replaces_previous_value() {
        let store = temp_store();
        store.put("profile", &json!({"v": 1})).unwrap();
        store.put("profile", &json!({"v": 2})).unwrap();
        assert_eq!(store.get("profile").unwrap(), Some(json!({"v": 2})));
    }

    #[test]
    fn failed_batch_leaves_committed_documents_untouched() {
        let store = temp_store();
        store.put("site", &json!({"markup": "old"})).unwrap();

        // The second key points into a directory that does not exist,
        // so its staging write fails after the first was staged.
        let result = store.put_many(&[
            ("site", json!({"markup": "new"})),
            ("missing/dir", json!({})),
        ]);
        assert!(result.is_err());
        assert_eq!(
            store.get("site").unwrap(),
            Some(json!({"markup": "old"}))
        );

        // No stray temp files left behind.
        let leftovers: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn batch_commits_all_documents() {
        let store = temp_store();
        store
            .put_many(&[
                ("history", json!([{"user": "hi", "bot": "hello"}])),
                ("profile", json!({"name": "Ada"})),
            ])
            .unwrap();
        assert!(store.get("history").unwrap().is_some());
        assert!(store.get("profile").unwrap().is_some());
    }

    #[tokio::test]
    async fn lock_keys_serializes_writers_on_the_same_key() {
        let store = temp_store();
        store.put("counter", &json!(0)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let _guards = store.lock_keys(&["counter"]).await;
                let current = store.get("counter").unwrap().unwrap().as_i64().unwrap();
                // Widen the race window: without the lock some of these
                // increments would be lost.
                tokio::time::sleep(Duration::from_millis(2)).await;
                store.put("counter", &json!(current + 1)).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("counter").unwrap(), Some(json!(8)));
    }

    #[tokio::test]
    async fn lock_keys_with_overlapping_sets_does_not_deadlock() {
        let store = temp_store();
        let a = store.clone();
        let b = store.clone();

        let first = tokio::spawn(async move {
            for _ in 0..50 {
                let _guards = a.lock_keys(&["profile", "history"]).await;
            }
        });
        let second = tokio::spawn(async move {
            for _ in 0..50 {
                let _guards = b.lock_keys(&["history", "profile"]).await;
            }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .expect("lock ordering should prevent deadlock");
    }

    #[tokio::test]
    async fn duplicate_keys_are_collapsed() {
        let store = temp_store();
        let _guards = store.lock_keys(&["profile", "profile"]).await;
    }
}
