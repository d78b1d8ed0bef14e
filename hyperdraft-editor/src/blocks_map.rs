//! Flat `(parent, left sibling)` representation of a block tree.
//!
//! The persisted draft is kept as a map from block id to its position and
//! content. Order is encoded by left-sibling pointers, so a move is a single
//! pointer update instead of an index shift.

use std::collections::HashMap;

use hyperdraft_types::{BlockId, BlockNode, ServerBlock};
use serde::{Deserialize, Serialize};

/// Position and content of one block in a [`BlocksMap`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocksMapItem {
    /// Parent block id, `""` for top-level blocks
    pub parent: BlockId,
    /// Left sibling id, `""` for the first child
    pub left: BlockId,
    pub block: ServerBlock,
}

/// Flattened block forest keyed by block id
pub type BlocksMap = HashMap<BlockId, BlocksMapItem>;

/// Flatten a block forest rooted at `parent` into a [`BlocksMap`].
///
/// Block ids are unique across the whole tree, so children merge into the
/// same map without collisions.
pub fn flatten(tree: &[BlockNode], parent: &str) -> BlocksMap {
    let mut map = BlocksMap::new();
    flatten_into(tree, parent, &mut map);
    map
}

fn flatten_into(tree: &[BlockNode], parent: &str, map: &mut BlocksMap) {
    for (index, node) in tree.iter().enumerate() {
        let left = match index {
            0 => BlockId::new(),
            _ => tree[index - 1].block.id.clone(),
        };
        map.insert(
            node.block.id.clone(),
            BlocksMapItem {
                parent: parent.to_string(),
                left,
                block: node.block.clone(),
            },
        );
        flatten_into(&node.children, &node.block.id, map);
    }
}
