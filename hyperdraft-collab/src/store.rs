//! Draft persistence.
//!
//! A [`DraftStore`] keeps one [`Document`] per draft and applies change lists
//! to it. Change lists are applied to a copy first, so a list that fails
//! halfway leaves the stored draft untouched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use hyperdraft_editor::{ApplyError, DraftTree};
use hyperdraft_types::{Document, DocumentChange, DraftId};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Draft not found: {0}")]
    NotFound(DraftId),

    #[error("Invalid draft id: {0:?}")]
    InvalidId(String),

    #[error("Failed to apply changes to draft {draft}: {source}")]
    Apply {
        draft: DraftId,
        #[source]
        source: ApplyError,
    },

    #[error("Failed to access draft storage: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode draft: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Create an empty draft and return its id.
    async fn create_draft(&self) -> Result<DraftId, StoreError>;

    /// Load a draft, `None` if it does not exist.
    async fn fetch_draft(&self, id: &DraftId) -> Result<Option<Document>, StoreError>;

    /// Apply `changes` in order and return the updated draft.
    async fn apply_changes(
        &self,
        id: &DraftId,
        changes: &[DocumentChange],
    ) -> Result<Document, StoreError>;

    async fn delete_draft(&self, id: &DraftId) -> Result<(), StoreError>;
}

fn new_draft_id() -> DraftId {
    DraftId::new(Uuid::new_v4().to_string())
}

fn new_document(id: DraftId) -> Document {
    let mut doc = Document::new(id);
    doc.update_time = Some(Utc::now());
    doc
}

/// Replay `changes` on a copy of `doc` and stamp the update time.
fn apply_to_document(doc: &Document, changes: &[DocumentChange]) -> Result<Document, StoreError> {
    let mut tree = DraftTree::from_document(doc);
    tree.apply_all(changes).map_err(|source| StoreError::Apply {
        draft: doc.id.clone(),
        source,
    })?;
    let mut updated = tree.into_document();
    updated.update_time = Some(Utc::now());
    Ok(updated)
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<DraftId, Document>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a complete document, replacing any draft with the same id.
    pub fn insert(&self, doc: Document) {
        self.drafts.lock().insert(doc.id.clone(), doc);
    }

}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn create_draft(&self) -> Result<DraftId, StoreError> {
        let id = new_draft_id();
        self.insert(new_document(id.clone()));
        debug!(draft = %id, "created draft in memory");
        Ok(id)
    }

    async fn fetch_draft(&self, id: &DraftId) -> Result<Option<Document>, StoreError> {
        Ok(self.drafts.lock().get(id).cloned())
    }

    async fn apply_changes(
        &self,
        id: &DraftId,
        changes: &[DocumentChange],
    ) -> Result<Document, StoreError> {
        let mut drafts = self.drafts.lock();
        let doc = drafts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let updated = apply_to_document(doc, changes)?;
        *doc = updated.clone();
        Ok(updated)
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<(), StoreError> {
        if self.drafts.lock().remove(id).is_none() {
            debug!(draft = %id, "draft already deleted");
        }
        Ok(())
    }
}

// =============================================================================
// File store
// =============================================================================

/// One pretty-printed JSON file per draft under a directory.
#[derive(Debug)]
pub struct FileDraftStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles on draft files.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn draft_path(&self, id: &DraftId) -> Result<PathBuf, StoreError> {
        let raw = id.as_str();
        let valid = !raw.is_empty()
            && raw != "."
            && raw != ".."
            && !raw.contains(['/', '\\'])
            && !raw.contains('\0');
        if !valid {
            return Err(StoreError::InvalidId(raw.to_string()));
        }
        Ok(self.dir.join(format!("{raw}.json")))
    }

    async fn read(&self, id: &DraftId) -> Result<Option<Document>, StoreError> {
        let path = self.draft_path(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `doc` to a sibling temp file, then rename it over the draft so
    /// readers only ever see a complete file.
    async fn write(&self, doc: &Document) -> Result<(), StoreError> {
        let path = self.draft_path(&doc.id)?;
        let tmp = temp_path(&path);
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(doc)?;

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn create_draft(&self) -> Result<DraftId, StoreError> {
        let id = new_draft_id();
        let _guard = self.write_lock.lock().await;
        self.write(&new_document(id.clone())).await?;
        info!(draft = %id, dir = %self.dir.display(), "created draft");
        Ok(id)
    }

    async fn fetch_draft(&self, id: &DraftId) -> Result<Option<Document>, StoreError> {
        let _guard = self.write_lock.lock().await;
        self.read(id).await
    }

    async fn apply_changes(
        &self,
        id: &DraftId,
        changes: &[DocumentChange],
    ) -> Result<Document, StoreError> {
        let _guard = self.write_lock.lock().await;
        let doc = self
            .read(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let updated = apply_to_document(&doc, changes)?;
        self.write(&updated).await?;
        debug!(draft = %id, changes = changes.len(), "applied draft changes");
        Ok(updated)
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<(), StoreError> {
        let path = self.draft_path(id)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(draft = %id, "deleted draft");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(draft = %id, "draft already deleted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperdraft_types::ServerBlock;

    fn paragraph_changes(id: &str, text: &str, left: &str) -> Vec<DocumentChange> {
        vec![
            DocumentChange::move_block(id, "", left),
            DocumentChange::replace(ServerBlock::paragraph(id, text)),
        ]
    }

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryDraftStore::new();
        let id = store.create_draft().await.unwrap();

        let created = store.fetch_draft(&id).await.unwrap().unwrap();
        assert!(created.children.is_empty());
        assert!(created.update_time.is_some());

        let mut changes = paragraph_changes("a", "hello", "");
        changes.insert(
            0,
            DocumentChange::SetTitle {
                title: "Hello".into(),
            },
        );
        let updated = store.apply_changes(&id, &changes).await.unwrap();
        assert_eq!(updated.title, "Hello");
        assert_eq!(updated.children[0].block.text, "hello");
        assert_eq!(store.fetch_draft(&id).await.unwrap(), Some(updated));

        store.delete_draft(&id).await.unwrap();
        assert!(store.fetch_draft(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_apply_leaves_draft_untouched() {
        let store = MemoryDraftStore::new();
        let id = store.create_draft().await.unwrap();
        store
            .apply_changes(&id, &paragraph_changes("a", "kept", ""))
            .await
            .unwrap();
        let before = store.fetch_draft(&id).await.unwrap();

        let mut changes = paragraph_changes("b", "lost", "a");
        changes.push(DocumentChange::move_block("c", "missing", ""));
        let err = store.apply_changes(&id, &changes).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Apply {
                source: ApplyError::UnknownParent(_),
                ..
            }
        ));
        assert_eq!(store.fetch_draft(&id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_draft_errors_on_apply() {
        let store = MemoryDraftStore::new();
        let id = DraftId::new("nope");
        assert!(matches!(
            store.apply_changes(&id, &[]).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_safe_to_retry() {
        let memory = MemoryDraftStore::new();
        let id = memory.create_draft().await.unwrap();
        memory.delete_draft(&id).await.unwrap();
        memory.delete_draft(&id).await.unwrap();
        memory.delete_draft(&DraftId::new("never-existed")).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let files = FileDraftStore::new(dir.path());
        let id = files.create_draft().await.unwrap();
        files.delete_draft(&id).await.unwrap();
        files.delete_draft(&id).await.unwrap();
        assert!(files.fetch_draft(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_leaves_no_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path());
        let id = store.create_draft().await.unwrap();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            let left = if i == 0 { String::new() } else { format!("b{}", i - 1) };
            store
                .apply_changes(&id, &paragraph_changes(&format!("b{i}"), text, &left))
                .await
                .unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{id}.json")]);

        let raw = std::fs::read_to_string(dir.path().join(format!("{id}.json"))).unwrap();
        let doc: Document = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc.children.len(), 3);
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let path = Path::new("/drafts/abc.json");
        assert_eq!(temp_path(path), Path::new("/drafts/.abc.json.tmp"));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("drafts"));
        let id = store.create_draft().await.unwrap();
        store
            .apply_changes(&id, &paragraph_changes("a", "on disk", ""))
            .await
            .unwrap();

        let reopened = FileDraftStore::new(dir.path().join("drafts"));
        let doc = reopened.fetch_draft(&id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.children[0].block.text, "on disk");

        let raw = std::fs::read_to_string(dir.path().join("drafts").join(format!("{id}.json")))
            .unwrap();
        assert!(raw.contains("\"updateTime\""));

        reopened.delete_draft(&id).await.unwrap();
        assert!(store.fetch_draft(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path());

        for bad in ["", "..", "../etc/passwd", "a/b"] {
            assert!(matches!(
                store.fetch_draft(&DraftId::new(bad)).await,
                Err(StoreError::InvalidId(_))
            ));
        }
    }
}
