use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI for inspecting and editing stored drafts.
#[derive(Debug, Clone, Parser)]
#[command(name = "hyperdraft", version, about = "Draft storage and autosave tooling")]
pub struct Cli {
    /// Directory holding one JSON file per draft
    #[arg(long, env = "HYPERDRAFT_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Debounce between the last edit and the autosave, in milliseconds
    #[arg(long, env = "HYPERDRAFT_AUTOSAVE_MS", global = true)]
    pub autosave_ms: Option<u64>,

    /// Optional YAML config file
    #[arg(long, env = "HYPERDRAFT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create an empty draft and print its id
    Create {
        /// Initial title
        #[arg(long)]
        title: Option<String>,
    },

    /// Print a draft as JSON
    Show { id: String },

    /// Print the change list that turns one document into another
    Diff {
        /// Baseline document (JSON)
        old: PathBuf,
        /// Updated document (JSON)
        new: PathBuf,
    },

    /// Replace a draft's content with editor blocks and autosave it
    Save {
        id: String,

        /// Editor blocks (JSON array)
        tree: PathBuf,

        /// Title to save; defaults to the text of the first block
        #[arg(long)]
        title: Option<String>,
    },

    /// Delete empty blocks at the end of a draft
    Trim { id: String },

    /// Delete a draft
    Delete { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hyperdraft",
            "save",
            "d1",
            "tree.json",
            "--autosave-ms",
            "50",
            "--title",
            "Notes",
        ])
        .unwrap();

        assert_eq!(cli.autosave_ms, Some(50));
        match cli.command {
            Command::Save { id, tree, title } => {
                assert_eq!(id, "d1");
                assert_eq!(tree, PathBuf::from("tree.json"));
                assert_eq!(title.as_deref(), Some("Notes"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
