//! Applying change lists to a stored draft.
//!
//! Persistence implementations keep a [`Document`] per draft and replay the
//! changes produced by the diff against it, in order.

use std::collections::HashMap;

use hyperdraft_types::{BlockId, BlockNode, Document, DocumentChange, DraftId, ServerBlock};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Unknown parent block: {0}")]
    UnknownParent(BlockId),

    #[error("Left sibling {left} is not a child of {parent:?}")]
    UnknownSibling { parent: BlockId, left: BlockId },

    #[error("Block {0} cannot be moved under itself or its descendants")]
    Cycle(BlockId),

    #[error("Block {0} was replaced before being positioned")]
    Unpositioned(BlockId),
}

/// Mutable, index-based form of a stored draft
#[derive(Debug, Clone)]
pub struct DraftTree {
    id: DraftId,
    title: String,
    blocks: HashMap<BlockId, ServerBlock>,
    parents: HashMap<BlockId, BlockId>,
    /// Ordered children per parent; `""` holds the top-level blocks
    children: HashMap<BlockId, Vec<BlockId>>,
}

impl DraftTree {
    pub fn new(id: DraftId) -> Self {
        Self {
            id,
            title: String::new(),
            blocks: HashMap::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
        }
    }

    pub fn from_document(doc: &Document) -> Self {
        let mut tree = Self::new(doc.id.clone());
        tree.title = doc.title.clone();
        tree.load(&doc.children, "");
        tree
    }

    fn load(&mut self, nodes: &[BlockNode], parent: &str) {
        for node in nodes {
            let id = node.block.id.clone();
            self.blocks.insert(id.clone(), node.block.clone());
            self.parents.insert(id.clone(), parent.to_string());
            self.children
                .entry(parent.to_string())
                .or_default()
                .push(id.clone());
            self.load(&node.children, &id);
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.contains_key(id)
    }

    /// Apply every change in order, stopping at the first failure.
    pub fn apply_all(&mut self, changes: &[DocumentChange]) -> Result<(), ApplyError> {
        for change in changes {
            self.apply(change)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, change: &DocumentChange) -> Result<(), ApplyError> {
        match change {
            DocumentChange::MoveBlock {
                block_id,
                parent,
                left_sibling,
            } => self.move_block(block_id, parent, left_sibling),
            DocumentChange::ReplaceBlock { block } => {
                if !self.parents.contains_key(&block.id) {
                    return Err(ApplyError::Unpositioned(block.id.clone()));
                }
                self.blocks.insert(block.id.clone(), block.clone());
                Ok(())
            }
            DocumentChange::DeleteBlock { block_id } => {
                if self.blocks.contains_key(block_id) {
                    self.detach(block_id);
                    self.remove_subtree(block_id);
                }
                Ok(())
            }
            DocumentChange::SetTitle { title } => {
                self.title = title.clone();
                Ok(())
            }
        }
    }

    fn move_block(&mut self, id: &str, parent: &str, left: &str) -> Result<(), ApplyError> {
        if !parent.is_empty() && !self.blocks.contains_key(parent) {
            return Err(ApplyError::UnknownParent(parent.to_string()));
        }
        if self.is_self_or_descendant(parent, id) {
            return Err(ApplyError::Cycle(id.to_string()));
        }
        let sibling_known = left.is_empty()
            || (left != id
                && self
                    .children
                    .get(parent)
                    .is_some_and(|siblings| siblings.iter().any(|s| s == left)));
        if !sibling_known {
            return Err(ApplyError::UnknownSibling {
                parent: parent.to_string(),
                left: left.to_string(),
            });
        }

        self.detach(id);
        let siblings = self.children.entry(parent.to_string()).or_default();
        let index = siblings
            .iter()
            .position(|s| s == left)
            .map_or(0, |i| i + 1);
        siblings.insert(index, id.to_string());
        self.parents.insert(id.to_string(), parent.to_string());
        // A move of an unknown block creates it; the following replace fills it.
        self.blocks
            .entry(id.to_string())
            .or_insert_with(|| ServerBlock::new(id, "paragraph"));
        Ok(())
    }

    /// Whether `candidate` is `ancestor` or sits somewhere below it
    fn is_self_or_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut current = candidate;
        while !current.is_empty() {
            if current == ancestor {
                return true;
            }
            match self.parents.get(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        false
    }

    fn detach(&mut self, id: &str) {
        if let Some(parent) = self.parents.remove(id) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|s| s != id);
            }
        }
    }

    fn remove_subtree(&mut self, id: &str) {
        self.blocks.remove(id);
        for child in self.children.remove(id).unwrap_or_default() {
            self.parents.remove(&child);
            self.remove_subtree(&child);
        }
    }

    /// Rebuild the nested block tree.
    pub fn to_nodes(&self) -> Vec<BlockNode> {
        self.build("")
    }

    fn build(&self, parent: &str) -> Vec<BlockNode> {
        let Some(ids) = self.children.get(parent) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| {
                let block = self.blocks.get(id)?.clone();
                Some(BlockNode::new(block).with_children(self.build(id)))
            })
            .collect()
    }

    pub fn into_document(self) -> Document {
        Document {
            children: self.to_nodes(),
            id: self.id,
            title: self.title,
            update_time: None,
        }
    }
}
