//! End-to-end autosave tests: coordinator, editor surface and stores together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyperdraft_collab::commands;
use hyperdraft_collab::store::{DraftStore, FileDraftStore, MemoryDraftStore, StoreError};
use hyperdraft_collab::{
    AutosaveCoordinator, DraftConfig, DraftStatus, EditorSurface, Phase, ReadyPhase,
    SaveIndicator, SharedEditor,
};
use hyperdraft_editor::{draft_changes, flatten, EditorBlock};
use hyperdraft_types::{
    BlockNode, Document, DocumentChange, DraftId, InlineContent, ServerBlock, StyleName, Styles,
};

/// Memory store whose saves take `delay` and can be made to fail.
struct TestStore {
    inner: MemoryDraftStore,
    delay: Duration,
    failures_left: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl TestStore {
    fn new(delay: Duration, failures: usize) -> Arc<Self> {
        let inner = MemoryDraftStore::new();
        let mut doc = Document::new(DraftId::new("d1"));
        doc.title = "Seed".into();
        doc.children = vec![BlockNode::new(ServerBlock::paragraph("a", "seed"))];
        inner.insert(doc);

        Arc::new(Self {
            inner,
            delay,
            failures_left: AtomicUsize::new(failures),
            apply_calls: AtomicUsize::new(0),
        })
    }

    fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DraftStore for TestStore {
    async fn create_draft(&self) -> Result<DraftId, StoreError> {
        self.inner.create_draft().await
    }

    async fn fetch_draft(&self, id: &DraftId) -> Result<Option<Document>, StoreError> {
        self.inner.fetch_draft(id).await
    }

    async fn apply_changes(
        &self,
        id: &DraftId,
        changes: &[DocumentChange],
    ) -> Result<Document, StoreError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Io(std::io::Error::other("store offline")));
        }
        self.inner.apply_changes(id, changes).await
    }

    async fn delete_draft(&self, id: &DraftId) -> Result<(), StoreError> {
        self.inner.delete_draft(id).await
    }
}

fn config() -> DraftConfig {
    DraftConfig {
        autosave_timeout: Duration::from_millis(500),
    }
}

fn idle(status: &DraftStatus) -> bool {
    status.phase == Phase::Ready(ReadyPhase::Idle)
}

fn paragraph(id: &str, text: &str) -> EditorBlock {
    EditorBlock::paragraph(id, vec![InlineContent::plain(text)])
}

#[tokio::test(start_paused = true)]
async fn test_change_during_save_is_not_dropped() {
    let store = TestStore::new(Duration::from_secs(1), 0);
    let editor = Arc::new(SharedEditor::new());
    let id = DraftId::new("d1");
    let handle = AutosaveCoordinator::spawn(id.clone(), store.clone(), editor.clone(), config());
    handle.wait_for(idle).await.unwrap();

    editor.edit(|blocks| blocks[0] = paragraph("a", "first edit"));
    handle.change(None).unwrap();
    handle
        .wait_for(|s| s.phase == Phase::Ready(ReadyPhase::Saving))
        .await
        .unwrap();

    // Lands while the first save is still in flight.
    editor.edit(|blocks| blocks.push(paragraph("b", "second edit")));
    handle.change(Some("Second".into())).unwrap();

    let status = handle
        .wait_for(|s| s.saves_completed == 2 && idle(s))
        .await
        .unwrap();
    assert_eq!(status.indicator, SaveIndicator::Saved);
    assert_eq!(status.last_error, None);
    assert_eq!(store.apply_calls(), 2);

    let stored = store.fetch_draft(&id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Second");
    let texts: Vec<&str> = stored.children.iter().map(|n| n.block.text.as_str()).collect();
    assert_eq!(texts, vec!["first edit", "second edit"]);

    // The stored draft now matches the editor exactly.
    let remaining = draft_changes(
        &flatten(&stored.children, ""),
        &stored.title,
        "Second",
        &editor.blocks(),
    );
    assert!(remaining.is_empty(), "unsaved changes: {remaining:?}");

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_save_is_retried_by_next_cycle() {
    let store = TestStore::new(Duration::from_millis(100), 1);
    let editor = Arc::new(SharedEditor::new());
    let id = DraftId::new("d1");
    let handle = AutosaveCoordinator::spawn(id.clone(), store.clone(), editor.clone(), config());
    handle.wait_for(idle).await.unwrap();

    editor.edit(|blocks| blocks[0] = paragraph("a", "edited"));
    handle.change(None).unwrap();

    let status = handle
        .wait_for(|s| s.last_error.is_some() && idle(s))
        .await
        .unwrap();
    assert_eq!(status.indicator, SaveIndicator::Error);
    assert_eq!(status.saves_completed, 0);
    assert!(status.last_error.unwrap().contains("store offline"));
    let stored = store.fetch_draft(&id).await.unwrap().unwrap();
    assert_eq!(stored.children[0].block.text, "seed");

    // Editing continues; the next cycle persists everything since the
    // last successful save.
    editor.edit(|blocks| blocks.push(paragraph("b", "more")));
    handle.change(None).unwrap();
    handle
        .wait_for(|s| s.saves_completed == 1 && idle(s))
        .await
        .unwrap();

    let status = handle.status();
    assert_eq!(status.indicator, SaveIndicator::Saved);
    assert_eq!(status.last_error, None);

    let stored = store.fetch_draft(&id).await.unwrap().unwrap();
    let texts: Vec<&str> = stored.children.iter().map(|n| n.block.text.as_str()).collect();
    assert_eq!(texts, vec!["edited", "more"]);
    assert_eq!(store.apply_calls(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_changes_is_coalesced() {
    let store = TestStore::new(Duration::from_millis(10), 0);
    let editor = Arc::new(SharedEditor::new());
    let handle =
        AutosaveCoordinator::spawn(DraftId::new("d1"), store.clone(), editor.clone(), config());
    handle.wait_for(idle).await.unwrap();

    for i in 0..5 {
        editor.edit(|blocks| blocks[0] = paragraph("a", &format!("edit {i}")));
        handle.change(None).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    handle
        .wait_for(|s| s.saves_completed == 1 && idle(s))
        .await
        .unwrap();

    assert_eq!(store.apply_calls(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_content_skips_store() {
    let store = TestStore::new(Duration::from_millis(10), 0);
    let editor = Arc::new(SharedEditor::new());
    let handle =
        AutosaveCoordinator::spawn(DraftId::new("d1"), store.clone(), editor.clone(), config());
    handle.wait_for(idle).await.unwrap();

    handle.change(None).unwrap();
    handle
        .wait_for(|s| s.saves_completed == 1 && idle(s))
        .await
        .unwrap();

    assert_eq!(store.apply_calls(), 0);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_save_command_writes_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn DraftStore> = Arc::new(FileDraftStore::new(dir.path()));
    let id = commands::create_draft(store.as_ref(), None).await.unwrap();

    let blocks = vec![
        EditorBlock::paragraph(
            "h",
            vec![
                InlineContent::plain("Meeting "),
                InlineContent::text("notes", Styles::none().with(StyleName::Bold)),
            ],
        ),
        paragraph("", "body"),
        paragraph("", ""),
    ];
    let tree = dir.path().join("tree.json");
    std::fs::write(&tree, serde_json::to_string(&blocks).unwrap()).unwrap();

    let fast = DraftConfig {
        autosave_timeout: Duration::from_millis(20),
    };
    let status = commands::save_tree(store.clone(), &id, &tree, None, fast)
        .await
        .unwrap();
    assert_eq!(status.title, "Meeting notes");

    let stored = store.fetch_draft(&id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Meeting notes");
    assert_eq!(stored.children.len(), 3);
    assert_eq!(stored.children[0].block.text, "Meeting notes");
    assert_eq!(stored.children[0].block.annotations.len(), 1);
    assert!(stored.children.iter().all(|n| !n.block.id.is_empty()));

    assert_eq!(commands::trim_draft(store.as_ref(), &id).await.unwrap(), 1);
    let trimmed = store.fetch_draft(&id).await.unwrap().unwrap();
    assert_eq!(trimmed.children.len(), 2);
}
