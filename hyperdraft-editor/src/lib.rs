//! Editor-side document model for hyperdraft
//!
//! Converts between the editor's styled inline runs and the stored
//! text-plus-annotations form, flattens block trees into a pointer map and
//! computes the change list that brings a stored draft up to date with the
//! live editor tree.

pub mod annotations;
pub mod apply;
pub mod blocks_map;
pub mod diff;
pub mod editor;
pub mod title;

pub use annotations::{decode, encode, plain_text, EncodedText};
pub use apply::{ApplyError, DraftTree};
pub use blocks_map::{flatten, BlocksMap, BlocksMapItem};
pub use diff::{
    content_equal, diff, draft_changes, extract_deletes, structure_changed, ChangeSet, DiffNode,
};
pub use editor::{
    from_block_node, from_block_nodes, to_server_block, BlockProps, EditorBlock, EditorBlockKind,
};
pub use title::{title_from_content, trailing_empty_deletes};
