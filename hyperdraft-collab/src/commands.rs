//! CLI command implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use hyperdraft_editor::{draft_changes, flatten, title_from_content, trailing_empty_deletes, EditorBlock};
use hyperdraft_types::{Document, DocumentChange, DraftId};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::DraftConfig;
use crate::coordinator::{AutosaveCoordinator, DraftStatus};
use crate::machine::{Phase, ReadyPhase};
use crate::store::DraftStore;
use crate::surface::{EditorSurface, SharedEditor};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn fetch(store: &dyn DraftStore, id: &DraftId) -> Result<Document> {
    store
        .fetch_draft(id)
        .await?
        .with_context(|| format!("Draft not found: {id}"))
}

pub async fn create_draft(store: &dyn DraftStore, title: Option<String>) -> Result<DraftId> {
    let id = store.create_draft().await?;
    if let Some(title) = title {
        store
            .apply_changes(&id, &[DocumentChange::SetTitle { title }])
            .await?;
    }
    Ok(id)
}

pub async fn show_draft(store: &dyn DraftStore, id: &DraftId) -> Result<String> {
    let doc = fetch(store, id).await?;
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Change list that turns the document at `old` into the one at `new`.
pub fn diff_documents(old: &Path, new: &Path) -> Result<Vec<DocumentChange>> {
    let old: Document = read_json(old)?;
    let new: Document = read_json(new)?;
    Ok(draft_changes(
        &flatten(&old.children, ""),
        &old.title,
        &new.title,
        &new.children,
    ))
}

/// Load the draft through an autosave coordinator, swap in `tree` and wait
/// for the autosave to settle.
pub async fn save_tree(
    store: Arc<dyn DraftStore>,
    id: &DraftId,
    tree: &Path,
    title: Option<String>,
    config: DraftConfig,
) -> Result<DraftStatus> {
    let blocks: Vec<EditorBlock> = read_json(tree)?;
    let editor = Arc::new(SharedEditor::new());
    let handle = AutosaveCoordinator::spawn(id.clone(), store, editor.clone(), config);

    let loaded = handle.wait_for(|s| s.phase != Phase::Fetching).await?;
    if loaded.phase == Phase::Error {
        handle.shutdown().await;
        bail!(
            "{}",
            loaded.last_error.unwrap_or_else(|| "failed to load draft".into())
        );
    }

    let title = title.unwrap_or_else(|| title_from_content(&blocks));
    editor.replace_blocks(blocks);
    handle.change(Some(title))?;

    let settled = handle
        .wait_for(|s| {
            s.phase == Phase::Ready(ReadyPhase::Idle)
                && (s.saves_completed > 0 || s.last_error.is_some())
        })
        .await?;
    handle.shutdown().await;

    if let Some(error) = settled.last_error {
        bail!("{error}");
    }
    info!(draft = %id, title = %settled.title, "draft saved");
    Ok(settled)
}

/// Delete empty trailing blocks, returning how many were removed.
pub async fn trim_draft(store: &dyn DraftStore, id: &DraftId) -> Result<usize> {
    let doc = fetch(store, id).await?;
    let deletes = trailing_empty_deletes(&doc);
    if !deletes.is_empty() {
        store.apply_changes(id, &deletes).await?;
    }
    Ok(deletes.len())
}

pub async fn delete_draft(store: &dyn DraftStore, id: &DraftId) -> Result<()> {
    store.delete_draft(id).await?;
    Ok(())
}
