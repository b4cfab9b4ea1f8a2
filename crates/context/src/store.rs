use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ContextError;

const CONTENT_EXT: &str = "context";
const META_EXT: &str = "meta.json";

/// One stored blob plus its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    pub key: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    pub stored_at: DateTime<Utc>,
}

/// On-disk sidecar written next to each content file.
#[derive(Debug, Serialize, Deserialize)]
struct MetaFile {
    key: String,
    stored_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

/// Keyed persistent store: one `<key>.context` file per record in a
/// namespace directory.
///
/// Writes go through a temporary file and a rename, so another instance
/// sharing the directory sees either the old record or the new one.
/// Concurrent writers to one key are last-writer-wins.
#[derive(Debug, Clone)]
pub struct ContextStore {
    root: PathBuf,
}

impl ContextStore {
    /// Open (creating if needed) the namespace directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ContextError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| ContextError::Namespace {
            path: root.clone(),
            source,
        })?;
        debug!(root = %root.display(), "Context store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the content file for `key`, whether or not it exists.
    pub fn content_path(&self, key: &str) -> Result<PathBuf, ContextError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{CONTENT_EXT}")))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{META_EXT}"))
    }

    /// Path of the content file for `key` if a record is stored there.
    pub async fn existing_path(&self, key: &str) -> Result<Option<PathBuf>, ContextError> {
        let path = self.content_path(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false).then_some(path))
    }

    /// Store `content` under `key`, replacing any previous record wholesale.
    pub async fn store(
        &self,
        key: &str,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<ContextRecord, ContextError> {
        let path = self.content_path(key)?;
        let record = ContextRecord {
            key: key.to_string(),
            content: content.to_string(),
            metadata,
            stored_at: Utc::now(),
        };
        self.write_record(&path, &record).await?;
        debug!(key = %key, bytes = content.len(), "Context stored");
        Ok(record)
    }

    /// Most recent record for `key`, or `None` if it was never stored.
    pub async fn recall(&self, key: &str) -> Result<Option<ContextRecord>, ContextError> {
        let path = self.content_path(key)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ContextError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };

        let meta_path = self.meta_path(key);
        let (stored_at, metadata) = match tokio::fs::read_to_string(&meta_path).await {
            Ok(raw) => {
                let meta: MetaFile =
                    serde_json::from_str(&raw).map_err(|source| ContextError::CorruptMetadata {
                        key: key.to_string(),
                        source,
                    })?;
                (meta.stored_at, meta.metadata)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (modified_at(&path).await.unwrap_or_else(Utc::now), None)
            }
            Err(source) => {
                return Err(ContextError::Io {
                    key: key.to_string(),
                    source,
                })
            }
        };

        Ok(Some(ContextRecord {
            key: key.to_string(),
            content,
            metadata,
            stored_at,
        }))
    }

    /// Append a timestamped entry to the record for `key`, creating it if
    /// absent. Existing metadata is kept.
    pub async fn append(&self, key: &str, text: &str) -> Result<ContextRecord, ContextError> {
        let path = self.content_path(key)?;
        let previous = self.recall(key).await?;
        let now = Utc::now();
        let entry = format!("\n\n[{}] {}", now.to_rfc3339(), text);

        let (content, metadata) = match previous {
            Some(prev) => (prev.content + &entry, prev.metadata),
            None => (entry, None),
        };
        let record = ContextRecord {
            key: key.to_string(),
            content,
            metadata,
            stored_at: now,
        };
        self.write_record(&path, &record).await?;
        debug!(key = %key, bytes = text.len(), "Context appended");
        Ok(record)
    }

    async fn write_record(&self, path: &Path, record: &ContextRecord) -> Result<(), ContextError> {
        let meta = MetaFile {
            key: record.key.clone(),
            stored_at: record.stored_at,
            metadata: record.metadata.clone(),
        };
        let meta_json = serde_json::to_string_pretty(&meta).map_err(|source| {
            ContextError::CorruptMetadata {
                key: record.key.clone(),
                source,
            }
        })?;

        let io_err = |source| ContextError::Io {
            key: record.key.clone(),
            source,
        };
        self.write_atomic(path, record.content.as_bytes())
            .await
            .map_err(io_err)?;
        self.write_atomic(&self.meta_path(&record.key), meta_json.as_bytes())
            .await
            .map_err(io_err)?;
        Ok(())
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = self.root.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

async fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.modified().ok().map(DateTime::<Utc>::from)
}

/// Keys double as file names: no separators, no traversal, no hidden files.
fn validate_key(key: &str) -> Result<(), ContextError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains("..")
        || key.contains(['/', '\\', '\0']);
    if bad {
        return Err(ContextError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, ContextStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::open(dir.path().join("ns")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_then_recall() {
        let (_dir, store) = temp_store();
        store.store("notes", "first draft", None).await.unwrap();

        let record = store.recall("notes").await.unwrap().unwrap();
        assert_eq!(record.key, "notes");
        assert_eq!(record.content, "first draft");
        assert!(record.metadata.is_none());
    }

    #[tokio::test]
    async fn test_second_store_overwrites_without_merge() {
        let (_dir, store) = temp_store();
        let meta = json!({"source": "a"}).as_object().cloned();
        store.store("k", "one", meta).await.unwrap();
        store.store("k", "two", None).await.unwrap();

        let record = store.recall("k").await.unwrap().unwrap();
        assert_eq!(record.content, "two");
        assert!(record.metadata.is_none());
    }

    #[tokio::test]
    async fn test_recall_missing_key_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.recall("never-stored").await.unwrap().is_none());
        assert!(store.existing_path("never-stored").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let (_dir, store) = temp_store();
        let meta = json!({"lang": "rust", "lines": 12}).as_object().cloned();
        let stored = store.store("m", "body", meta.clone()).await.unwrap();

        let record = store.recall("m").await.unwrap().unwrap();
        assert_eq!(record.metadata, meta);
        assert_eq!(record.stored_at, stored.stored_at);
    }

    #[tokio::test]
    async fn test_append_accumulates_with_timestamps() {
        let (_dir, store) = temp_store();
        store.append("memory", "rust:\nowns its data").await.unwrap();
        store.append("memory", "tokio:\nruns the loop").await.unwrap();

        let content = store.recall("memory").await.unwrap().unwrap().content;
        let first = content.find("rust:\nowns its data").unwrap();
        let second = content.find("tokio:\nruns the loop").unwrap();
        assert!(first < second);
        assert!(content.starts_with("\n\n["));
        assert_eq!(content.matches("\n\n[").count(), 2);
    }

    #[tokio::test]
    async fn test_append_keeps_metadata() {
        let (_dir, store) = temp_store();
        let meta = json!({"owner": "ops"}).as_object().cloned();
        store.store("log", "start", meta.clone()).await.unwrap();
        store.append("log", "next").await.unwrap();

        let record = store.recall("log").await.unwrap().unwrap();
        assert!(record.content.starts_with("start\n\n["));
        assert_eq!(record.metadata, meta);
    }

    #[tokio::test]
    async fn test_content_without_sidecar_uses_mtime() {
        let (_dir, store) = temp_store();
        let path = store.content_path("legacy").unwrap();
        std::fs::write(&path, "written elsewhere").unwrap();

        let record = store.recall("legacy").await.unwrap().unwrap();
        assert_eq!(record.content, "written elsewhere");
        assert!(record.metadata.is_none());
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let (_dir, store) = temp_store();
        for key in ["", "../escape", "a/b", "a\\b", ".hidden", "nul\0byte"] {
            let err = store.store(key, "x", None).await.unwrap_err();
            assert!(matches!(err, ContextError::InvalidKey(_)), "{key:?}");
        }
    }

    #[tokio::test]
    async fn test_store_shared_between_instances() {
        let dir = tempfile::tempdir().unwrap();
        let a = ContextStore::open(dir.path()).unwrap();
        let b = ContextStore::open(dir.path()).unwrap();

        a.store("shared", "from a", None).await.unwrap();
        b.store("shared", "from b", None).await.unwrap();
        assert_eq!(a.recall("shared").await.unwrap().unwrap().content, "from b");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (_dir, store) = temp_store();
        store.store("k", "v", None).await.unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_open_fails_on_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, "").unwrap();
        let err = ContextStore::open(&file).unwrap_err();
        assert!(matches!(err, ContextError::Namespace { .. }));
    }
}
