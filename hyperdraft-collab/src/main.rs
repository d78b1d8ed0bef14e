//! hyperdraft: create, inspect and autosave drafts from the command line.

use anyhow::Result;
use clap::Parser;
use hyperdraft_collab::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    hyperdraft_collab::run_with_cli(Cli::parse()).await
}
