//! Change-set diffing between a persisted [`BlocksMap`] and a live tree.
//!
//! The new tree is walked in pre-order. Each block is compared with its
//! baseline entry: missing or structurally changed blocks get an
//! unconditional move followed by a replace, existing blocks get a move when
//! their position changed and a replace when their content changed. Blocks
//! in the baseline that the walk never reached become deletes.

use std::borrow::Cow;
use std::collections::HashSet;

use hyperdraft_types::{BlockId, BlockNode, DocumentChange, ServerBlock};
use tracing::debug;

use crate::blocks_map::BlocksMap;
use crate::editor::{to_server_block, EditorBlock, CHILDREN_TYPE, LIST_LEVEL};

/// Attributes whose change forces a move + replace regardless of content
pub const STRUCTURAL_ATTRIBUTES: [&str; 2] = [CHILDREN_TYPE, LIST_LEVEL];

/// Attributes compared by [`content_equal`]
pub const COMPARED_ATTRIBUTES: [&str; 8] = [
    CHILDREN_TYPE,
    "start",
    "level",
    "url",
    "size",
    "language",
    "view",
    "width",
];

/// A tree node the diff can walk: either a stored block node or a live
/// editor block.
pub trait DiffNode: Sized {
    fn block_id(&self) -> &str;

    /// Stored form of this node, without children
    fn server_block(&self) -> Cow<'_, ServerBlock>;

    fn child_nodes(&self) -> &[Self];
}

impl DiffNode for BlockNode {
    fn block_id(&self) -> &str {
        &self.block.id
    }

    fn server_block(&self) -> Cow<'_, ServerBlock> {
        Cow::Borrowed(&self.block)
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

impl DiffNode for EditorBlock {
    fn block_id(&self) -> &str {
        &self.id
    }

    fn server_block(&self) -> Cow<'_, ServerBlock> {
        Cow::Owned(to_server_block(self))
    }

    fn child_nodes(&self) -> &[Self] {
        &self.children
    }
}

/// Output of [`diff`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Moves and replaces in pre-order; parents precede descendants
    pub changes: Vec<DocumentChange>,
    /// Every block id visited in the new tree
    pub touched: HashSet<BlockId>,
}

/// Diff the forest `tree`, placed under `parent`, against `old`.
pub fn diff<N: DiffNode>(old: &BlocksMap, tree: &[N], parent: &str) -> ChangeSet {
    let mut set = ChangeSet::default();
    diff_into(old, tree, parent, &mut set);
    set
}

fn diff_into<N: DiffNode>(old: &BlocksMap, tree: &[N], parent: &str, set: &mut ChangeSet) {
    for (index, node) in tree.iter().enumerate() {
        let id = node.block_id();
        let left = match index {
            0 => "",
            _ => tree[index - 1].block_id(),
        };
        set.touched.insert(id.to_string());

        let block = node.server_block();
        match old.get(id) {
            Some(prev) if !structure_changed(&prev.block, &block) => {
                if prev.parent != parent || prev.left != left {
                    set.changes
                        .push(DocumentChange::move_block(id, parent, left));
                }
                if !content_equal(&prev.block, &block) {
                    set.changes
                        .push(DocumentChange::replace(block.into_owned()));
                }
            }
            // New block, or one whose list structure changed: position it
            // before writing content.
            _ => {
                set.changes
                    .push(DocumentChange::move_block(id, parent, left));
                set.changes
                    .push(DocumentChange::replace(block.into_owned()));
            }
        }

        diff_into(old, node.child_nodes(), id, set);
    }
}

/// Whether a structural attribute differs between two versions of a block.
pub fn structure_changed(prev: &ServerBlock, current: &ServerBlock) -> bool {
    STRUCTURAL_ATTRIBUTES
        .iter()
        .any(|key| prev.attr(key) != current.attr(key))
}

/// Content equality used to decide whether a block needs a replace.
///
/// Annotations are compared positionally, so the same annotations in a
/// different order count as a change and cause an extra replace.
pub fn content_equal(a: &ServerBlock, b: &ServerBlock) -> bool {
    a.text == b.text
        && a.reference == b.reference
        && a.kind == b.kind
        && COMPARED_ATTRIBUTES
            .iter()
            .all(|key| a.attr(key) == b.attr(key))
        && a.annotations == b.annotations
}

/// Every baseline block not visited by the diff becomes a delete, in id
/// order.
pub fn extract_deletes(old: &BlocksMap, touched: &HashSet<BlockId>) -> Vec<DocumentChange> {
    let mut deleted: Vec<&BlockId> = old.keys().filter(|id| !touched.contains(*id)).collect();
    deleted.sort();
    deleted
        .into_iter()
        .map(|id| DocumentChange::delete(id.clone()))
        .collect()
}

/// Full change list that turns the baseline into `tree`: a title change (if
/// any), then moves and replaces in pre-order, then deletes.
pub fn draft_changes<N: DiffNode>(
    baseline: &BlocksMap,
    baseline_title: &str,
    title: &str,
    tree: &[N],
) -> Vec<DocumentChange> {
    let ChangeSet { changes, touched } = diff(baseline, tree, "");
    let deletes = extract_deletes(baseline, &touched);

    debug!(
        changes = changes.len(),
        deletes = deletes.len(),
        title_changed = title != baseline_title,
        "computed draft changes"
    );

    let mut all = Vec::with_capacity(changes.len() + deletes.len() + 1);
    if title != baseline_title {
        all.push(DocumentChange::SetTitle {
            title: title.to_string(),
        });
    }
    all.extend(changes);
    all.extend(deletes);
    all
}
