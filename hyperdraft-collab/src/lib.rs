//! Draft autosave for hyperdraft.
//!
//! Library entrypoint so other binaries can embed the coordinator and stores
//! without going through the `hyperdraft` CLI.

pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod machine;
pub mod store;
pub mod surface;

use std::sync::Arc;

use anyhow::Result;
use hyperdraft_types::DraftId;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::AppConfig;
use crate::store::{DraftStore, FileDraftStore};

pub use config::DraftConfig;
pub use coordinator::{AutosaveCoordinator, DraftHandle, DraftStatus};
pub use machine::{DraftEvent, DraftMachine, Effect, Phase, ReadyPhase, SaveIndicator};
pub use store::{MemoryDraftStore, StoreError};
pub use surface::{EditorSurface, SharedEditor};

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Run a CLI command (args parsed by the caller).
pub async fn run_with_cli(cli: Cli) -> Result<()> {
    init_tracing(cli.verbose)?;

    let cfg = AppConfig::from_cli(&cli)?;
    let store = Arc::new(FileDraftStore::new(cfg.store_dir.clone()));

    match cli.command {
        Command::Create { title } => {
            let id = commands::create_draft(store.as_ref(), title).await?;
            println!("{id}");
        }
        Command::Show { id } => {
            println!("{}", commands::show_draft(store.as_ref(), &DraftId::new(id)).await?);
        }
        Command::Diff { old, new } => {
            let changes = commands::diff_documents(&old, &new)?;
            println!("{}", serde_json::to_string_pretty(&changes)?);
        }
        Command::Save { id, tree, title } => {
            let store: Arc<dyn DraftStore> = store;
            let status =
                commands::save_tree(store, &DraftId::new(id), &tree, title, cfg.draft).await?;
            println!("saved ({} save cycles)", status.saves_completed);
        }
        Command::Trim { id } => {
            let removed = commands::trim_draft(store.as_ref(), &DraftId::new(id)).await?;
            println!("removed {removed} empty trailing blocks");
        }
        Command::Delete { id } => {
            commands::delete_draft(store.as_ref(), &DraftId::new(id)).await?;
        }
    }
    Ok(())
}
