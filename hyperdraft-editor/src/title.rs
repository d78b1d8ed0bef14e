//! Draft title derivation and pre-publish cleanup.

use hyperdraft_types::{BlockNode, Document, DocumentChange, ServerBlock};

use crate::annotations::plain_text;
use crate::editor::EditorBlock;

/// Block types that count as content even without text
const MEDIA_TYPES: [&str; 4] = ["image", "embed", "file", "video"];

/// Title derived from the plain text of the first top-level block.
pub fn title_from_content(blocks: &[EditorBlock]) -> String {
    blocks
        .first()
        .map(|block| plain_text(&block.content))
        .unwrap_or_default()
}

fn has_content(block: &ServerBlock) -> bool {
    !block.text.is_empty() || MEDIA_TYPES.contains(&block.kind.as_str())
}

/// Deletes for the empty blocks at the end of a draft.
///
/// Walks back from the last top-level block and stops at the first one that
/// has text, is a media block, or has a child that does. Only direct children
/// are inspected.
pub fn trailing_empty_deletes(doc: &Document) -> Vec<DocumentChange> {
    doc.children
        .iter()
        .rev()
        .take_while(|node| !node_has_content(node))
        .map(|node| DocumentChange::delete(node.block.id.clone()))
        .collect()
}

fn node_has_content(node: &BlockNode) -> bool {
    has_content(&node.block) || node.children.iter().any(|child| has_content(&child.block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperdraft_types::{DraftId, InlineContent, StyleName, Styles};

    fn node(id: &str, text: &str, children: Vec<BlockNode>) -> BlockNode {
        BlockNode::new(ServerBlock::paragraph(id, text)).with_children(children)
    }

    fn doc(children: Vec<BlockNode>) -> Document {
        let mut doc = Document::new(DraftId::new("d"));
        doc.children = children;
        doc
    }

    #[test]
    fn test_title_from_first_block() {
        let blocks = vec![
            EditorBlock::paragraph(
                "a",
                vec![
                    InlineContent::plain("Hello "),
                    InlineContent::link(
                        "https://example.com",
                        vec![InlineContent::text("world", Styles::none().with(StyleName::Bold))],
                    ),
                ],
            ),
            EditorBlock::paragraph("b", vec![InlineContent::plain("ignored")]),
        ];

        assert_eq!(title_from_content(&blocks), "Hello world");
        assert_eq!(title_from_content(&[]), "");
        assert_eq!(title_from_content(&[EditorBlock::paragraph("a", vec![])]), "");
    }

    #[test]
    fn test_trailing_empty_blocks_deleted_from_the_end() {
        let doc = doc(vec![
            node("a", "text", vec![]),
            node("b", "", vec![]),
            node("c", "more", vec![]),
            node("d", "", vec![node("d1", "", vec![])]),
            node("e", "", vec![]),
        ]);

        assert_eq!(
            trailing_empty_deletes(&doc),
            vec![DocumentChange::delete("e"), DocumentChange::delete("d")]
        );
    }

    #[test]
    fn test_trailing_stops_at_media_and_non_empty_children() {
        let image = BlockNode::new(ServerBlock::new("img", "image"));
        assert!(trailing_empty_deletes(&doc(vec![image])).is_empty());

        let parent = node("p", "", vec![node("p1", "child", vec![])]);
        assert_eq!(
            trailing_empty_deletes(&doc(vec![parent, node("x", "", vec![])])),
            vec![DocumentChange::delete("x")]
        );

        // Grandchildren are not inspected.
        let deep = node("g", "", vec![node("g1", "", vec![node("g2", "deep", vec![])])]);
        assert_eq!(trailing_empty_deletes(&doc(vec![deep])), vec![DocumentChange::delete("g")]);
    }

    #[test]
    fn test_trailing_on_empty_document() {
        assert!(trailing_empty_deletes(&doc(vec![])).is_empty());
    }
}
