//! Editing surface seen by the autosave coordinator.

use std::sync::Arc;

use hyperdraft_editor::editor::assign_missing_ids;
use hyperdraft_editor::EditorBlock;
use parking_lot::RwLock;

/// Live, mutable tree of editor blocks.
///
/// The coordinator only reads the tree when a save starts and replaces it
/// once, after the draft is fetched.
pub trait EditorSurface: Send + Sync {
    /// Snapshot of the current top-level blocks
    fn blocks(&self) -> Vec<EditorBlock>;

    /// Replace the whole tree
    fn replace_blocks(&self, blocks: Vec<EditorBlock>);
}

/// In-process editor surface shared between the coordinator and whoever
/// edits the draft.
#[derive(Debug, Default, Clone)]
pub struct SharedEditor {
    blocks: Arc<RwLock<Vec<EditorBlock>>>,
}

impl SharedEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the tree in place. Blocks inserted without an id get one.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Vec<EditorBlock>) -> R) -> R {
        let mut blocks = self.blocks.write();
        let result = f(&mut blocks);
        assign_missing_ids(&mut blocks);
        result
    }
}

impl EditorSurface for SharedEditor {
    fn blocks(&self) -> Vec<EditorBlock> {
        self.blocks.read().clone()
    }

    fn replace_blocks(&self, mut blocks: Vec<EditorBlock>) {
        assign_missing_ids(&mut blocks);
        *self.blocks.write() = blocks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperdraft_types::InlineContent;

    #[test]
    fn test_edit_assigns_ids_to_new_blocks() {
        let editor = SharedEditor::new();
        editor.replace_blocks(vec![EditorBlock::paragraph("a", vec![InlineContent::plain("one")])]);

        editor.edit(|blocks| {
            blocks.push(EditorBlock::paragraph("", vec![InlineContent::plain("two")]));
        });

        let blocks = editor.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].id, "a");
        assert!(!blocks[1].id.is_empty());
    }

    #[test]
    fn test_clones_share_the_tree() {
        let editor = SharedEditor::new();
        let other = editor.clone();
        other.replace_blocks(vec![EditorBlock::paragraph("x", vec![])]);
        assert_eq!(editor.blocks()[0].id, "x");
    }
}
