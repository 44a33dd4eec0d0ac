//! JSON file document store.
//!
//! The document lives in one file. Saves write a temporary file and rename
//! it over the target, so readers never see a partial document. Subscribers
//! are notified through file system events, which lets separate processes on
//! the same machine collaborate through a shared file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use notify::{RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{RemoteStore, SnapshotStream};
use crate::error::StoreResult;

/// A document store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the document file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing or empty file means there is no document.
    pub async fn read(&self) -> StoreResult<Option<Value>> {
        read_document(&self.path).await
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// A fresh temporary file next to the document.
    fn temp_path(&self) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.json".to_string());
        self.directory()
            .join(format!(
                ".{}.{}.{}.tmp",
                name,
                std::process::id(),
                NEXT.fetch_add(1, Ordering::Relaxed)
            ))
    }
}

async fn read_document(path: &Path) -> StoreResult<Option<Value>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&bytes)?))
}

#[async_trait]
impl RemoteStore for FileStore {
    async fn subscribe(&self) -> StoreResult<SnapshotStream> {
        let directory = self.directory();
        tokio::fs::create_dir_all(&directory).await?;

        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let (touch_tx, mut touch_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours {
                        let _ = touch_tx.send(());
                    }
                }
                Err(e) => warn!(error = %e, "File watcher error"),
            }
        })?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        let path = self.path.clone();
        let initial = match read_document(&path).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable document file, waiting for a valid write");
                None
            }
        };
        debug!(path = %path.display(), has_document = initial.is_some(), "FileStore subscribe");

        Ok(Box::pin(async_stream::stream! {
            // The watcher stops when dropped, which ends the subscription.
            let _watcher = watcher;
            let mut last = initial.clone();
            if let Some(doc) = initial {
                yield doc;
            }
            while touch_rx.recv().await.is_some() {
                match read_document(&path).await {
                    Ok(Some(doc)) if last.as_ref() != Some(&doc) => {
                        last = Some(doc.clone());
                        yield doc;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable document write");
                    }
                }
            }
        }))
    }

    async fn save(&self, document: Value) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&document)?;
        let temp = self.temp_path();
        tokio::fs::create_dir_all(self.directory()).await?;
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), "FileStore saved document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_no_document() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("party.json"));
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_read() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("nested").join("party.json"));

        store.save(json!({"scores": {"A": 3}})).await.unwrap();

        let doc = store.read().await.unwrap().unwrap();
        assert_eq!(doc["scores"]["A"], 3);

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("party.json")]);
    }

    #[tokio::test]
    async fn test_invalid_json_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("party.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(store.read().await.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_emits_existing_document() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("party.json"));
        store.save(json!({"predictionsLocked": true})).await.unwrap();

        let mut snapshots = store.subscribe().await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(5), snapshots.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first["predictionsLocked"], true);
    }

    #[tokio::test]
    async fn test_subscribe_sees_writes_from_another_handle() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("party.json");
        let reader = FileStore::new(&path);
        let writer = FileStore::new(&path);

        let mut snapshots = reader.subscribe().await.unwrap();
        writer.save(json!({"scores": {"B": 9}})).await.unwrap();

        let seen = tokio::time::timeout(Duration::from_secs(5), snapshots.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen["scores"]["B"], 9);
    }
}
