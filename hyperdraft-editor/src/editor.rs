//! Editor block model and conversion to and from stored blocks.

use hyperdraft_types::{BlockId, BlockNode, InlineContent, ServerBlock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotations::{decode, encode};

/// Attribute holding the list type of a block's children (ol, ul, group...)
pub const CHILDREN_TYPE: &str = "childrenType";
/// Attribute holding the nesting level of a list
pub const LIST_LEVEL: &str = "listLevel";

const IPFS_SCHEME: &str = "ipfs://";

/// Kinds of blocks the editor can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditorBlockKind {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "heading")]
    Heading,
    #[serde(rename = "codeBlock")]
    CodeBlock,
    #[serde(rename = "math")]
    Math,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "video")]
    Video,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "embed")]
    Embed,
    #[serde(rename = "web-embed")]
    WebEmbed,
}

impl EditorBlockKind {
    /// Block type string used in storage
    pub fn server_type(&self) -> &'static str {
        match self {
            EditorBlockKind::Paragraph => "paragraph",
            EditorBlockKind::Heading => "heading",
            EditorBlockKind::CodeBlock => "codeBlock",
            EditorBlockKind::Math => "math",
            EditorBlockKind::Image => "image",
            EditorBlockKind::Video => "video",
            EditorBlockKind::File => "file",
            EditorBlockKind::Embed => "embed",
            EditorBlockKind::WebEmbed => "web-embed",
        }
    }

    /// Editor kind for a stored block type. Unknown types open as paragraphs.
    pub fn from_server_type(kind: &str) -> Self {
        match kind {
            "heading" => EditorBlockKind::Heading,
            "codeBlock" => EditorBlockKind::CodeBlock,
            "math" | "equation" => EditorBlockKind::Math,
            "image" => EditorBlockKind::Image,
            "video" => EditorBlockKind::Video,
            "file" => EditorBlockKind::File,
            "embed" => EditorBlockKind::Embed,
            "web-embed" => EditorBlockKind::WebEmbed,
            _ => EditorBlockKind::Paragraph,
        }
    }

    /// Whether blocks of this kind carry inline content
    pub fn has_content(&self) -> bool {
        matches!(
            self,
            EditorBlockKind::Paragraph
                | EditorBlockKind::Heading
                | EditorBlockKind::CodeBlock
                | EditorBlockKind::Math
                | EditorBlockKind::Image
        )
    }

    /// Whether the block's media lives behind a url stored in `ref`
    fn is_media(&self) -> bool {
        matches!(
            self,
            EditorBlockKind::Image | EditorBlockKind::Video | EditorBlockKind::File
        )
    }
}

/// Per-block editor properties. Which ones apply depends on the kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
}

/// A block in the live editor tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorBlock {
    #[serde(default)]
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: EditorBlockKind,
    #[serde(default)]
    pub props: BlockProps,
    #[serde(default)]
    pub content: Vec<InlineContent>,
    #[serde(default)]
    pub children: Vec<EditorBlock>,
}

impl EditorBlock {
    pub fn new(id: impl Into<BlockId>, kind: EditorBlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            props: BlockProps::default(),
            content: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn paragraph(id: impl Into<BlockId>, content: Vec<InlineContent>) -> Self {
        Self::new(id, EditorBlockKind::Paragraph).with_content(content)
    }

    pub fn with_content(mut self, content: Vec<InlineContent>) -> Self {
        self.content = content;
        self
    }

    pub fn with_props(mut self, props: BlockProps) -> Self {
        self.props = props;
        self
    }

    pub fn with_children(mut self, children: Vec<EditorBlock>) -> Self {
        self.children = children;
        self
    }
}

/// Generate an id for a block created in the editor
pub fn new_block_id() -> BlockId {
    Uuid::new_v4().simple().to_string()
}

/// Give every block without an id a fresh one.
pub fn assign_missing_ids(blocks: &mut [EditorBlock]) {
    for block in blocks {
        if block.id.is_empty() {
            block.id = new_block_id();
        }
        assign_missing_ids(&mut block.children);
    }
}

/// Convert an editor block (without its children) into its stored form.
pub fn to_server_block(block: &EditorBlock) -> ServerBlock {
    let props = &block.props;
    let mut out = ServerBlock::new(block.id.clone(), block.kind.server_type());

    if block.kind.has_content() {
        let encoded = encode(&block.content);
        out.text = encoded.text;
        out.annotations = encoded.annotations;
    }

    match block.kind {
        EditorBlockKind::Paragraph | EditorBlockKind::Math => {}
        EditorBlockKind::Heading => set_attr(&mut out, "level", &props.level),
        EditorBlockKind::CodeBlock => set_attr(&mut out, "language", &props.language),
        EditorBlockKind::Image | EditorBlockKind::Video => {
            set_attr(&mut out, "name", &props.name);
            set_attr(&mut out, "width", &props.width);
            out.reference = media_ref(props.url.as_deref());
        }
        EditorBlockKind::File => {
            set_attr(&mut out, "name", &props.name);
            set_attr(&mut out, "size", &props.size);
            out.reference = media_ref(props.url.as_deref());
        }
        EditorBlockKind::Embed => {
            set_attr(&mut out, "view", &props.view);
            out.reference = props.url.clone().unwrap_or_default();
        }
        EditorBlockKind::WebEmbed => {
            out.reference = props.url.clone().unwrap_or_default();
        }
    }

    set_attr(&mut out, CHILDREN_TYPE, &props.children_type);
    set_attr(&mut out, LIST_LEVEL, &props.list_level);
    set_attr(&mut out, "start", &props.start);
    out
}

/// Convert a stored block tree into editor blocks.
pub fn from_block_nodes(nodes: &[BlockNode]) -> Vec<EditorBlock> {
    nodes.iter().map(from_block_node).collect()
}

/// Convert one stored block and its children into an editor block.
pub fn from_block_node(node: &BlockNode) -> EditorBlock {
    let block = &node.block;
    let kind = EditorBlockKind::from_server_type(&block.kind);
    let attr = |key: &str| block.attr(key).map(str::to_string);

    let url = if block.reference.is_empty() {
        None
    } else if kind.is_media() {
        Some(
            block
                .reference
                .strip_prefix(IPFS_SCHEME)
                .unwrap_or(&block.reference)
                .to_string(),
        )
    } else {
        Some(block.reference.clone())
    };

    let props = BlockProps {
        level: attr("level"),
        url,
        name: attr("name"),
        size: attr("size"),
        width: attr("width"),
        language: attr("language"),
        view: attr("view"),
        children_type: attr(CHILDREN_TYPE),
        list_level: attr(LIST_LEVEL),
        start: attr("start"),
    };

    let content = if kind.has_content() {
        decode(block)
    } else {
        Vec::new()
    };

    EditorBlock {
        id: block.id.clone(),
        kind,
        props,
        content,
        children: from_block_nodes(&node.children),
    }
}

fn set_attr(block: &mut ServerBlock, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        block.attributes.insert(key.to_string(), value.clone());
    }
}

/// Media urls without a scheme are content ids and get the ipfs scheme.
fn media_ref(url: Option<&str>) -> String {
    match url {
        None | Some("") => String::new(),
        Some(url) if url.starts_with("http") || url.starts_with(IPFS_SCHEME) => url.to_string(),
        Some(cid) => format!("{IPFS_SCHEME}{cid}"),
    }
}
