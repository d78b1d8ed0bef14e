//! Shared types for hyperdraft
//!
//! This crate provides the document model used on both sides of the
//! editor/storage boundary: styled inline runs as the editor sees them,
//! sparse annotations as storage sees them, block trees, and the change
//! operations that move a stored draft from one version to the next.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Draft identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(pub String);

impl DraftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DraftId {
    fn from(id: &str) -> Self {
        DraftId(id.to_string())
    }
}

/// Block identifier. Assigned once when the block is created and never
/// changes across edits or moves. The empty string stands for "no block"
/// (the document root as a parent, or "first child" as a left sibling).
pub type BlockId = String;

// =============================================================================
// Editor-side inline model
// =============================================================================

/// Inline style names understood by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleName {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
}

impl StyleName {
    pub const ALL: [StyleName; 5] = [
        StyleName::Bold,
        StyleName::Italic,
        StyleName::Underline,
        StyleName::Strike,
        StyleName::Code,
    ];

    /// Storage annotation type carrying this style
    pub fn annotation_type(self) -> AnnotationType {
        match self {
            StyleName::Bold => AnnotationType::Strong,
            StyleName::Italic => AnnotationType::Emphasis,
            StyleName::Underline => AnnotationType::Underline,
            StyleName::Strike => AnnotationType::Strike,
            StyleName::Code => AnnotationType::Code,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Set of styles applied to a text run.
///
/// Serialized as `{"bold": true, ...}` with absent keys meaning "off", so an
/// unstyled run and a run with every style explicitly false compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Styles {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
}

impl Styles {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, style: StyleName) -> Self {
        self.insert(style);
        self
    }

    pub fn contains(&self, style: StyleName) -> bool {
        match style {
            StyleName::Bold => self.bold,
            StyleName::Italic => self.italic,
            StyleName::Underline => self.underline,
            StyleName::Strike => self.strike,
            StyleName::Code => self.code,
        }
    }

    pub fn insert(&mut self, style: StyleName) {
        *self.slot(style) = true;
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Active styles in declaration order
    pub fn iter(&self) -> impl Iterator<Item = StyleName> + '_ {
        StyleName::ALL.into_iter().filter(|s| self.contains(*s))
    }

    fn slot(&mut self, style: StyleName) -> &mut bool {
        match style {
            StyleName::Bold => &mut self.bold,
            StyleName::Italic => &mut self.italic,
            StyleName::Underline => &mut self.underline,
            StyleName::Strike => &mut self.strike,
            StyleName::Code => &mut self.code,
        }
    }
}

impl FromIterator<StyleName> for Styles {
    fn from_iter<I: IntoIterator<Item = StyleName>>(iter: I) -> Self {
        let mut styles = Styles::none();
        for style in iter {
            styles.insert(style);
        }
        styles
    }
}

/// A run of text sharing one style set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default)]
    pub styles: Styles,
}

impl TextRun {
    pub fn new(text: impl Into<String>, styles: Styles) -> Self {
        Self {
            text: text.into(),
            styles,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Styles::none())
    }
}

/// A hyperlink wrapping styled runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRun {
    pub href: String,
    pub content: Vec<InlineContent>,
}

/// Editor inline content. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InlineContent {
    #[serde(rename = "text")]
    Text(TextRun),
    #[serde(rename = "link")]
    Link(LinkRun),
}

impl InlineContent {
    pub fn text(text: impl Into<String>, styles: Styles) -> Self {
        InlineContent::Text(TextRun::new(text, styles))
    }

    pub fn plain(text: impl Into<String>) -> Self {
        InlineContent::Text(TextRun::plain(text))
    }

    pub fn link(href: impl Into<String>, content: Vec<InlineContent>) -> Self {
        InlineContent::Link(LinkRun {
            href: href.into(),
            content,
        })
    }
}

// =============================================================================
// Storage-side block model
// =============================================================================

/// Annotation kinds stored alongside block text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    Strong,
    Emphasis,
    Underline,
    Strike,
    Code,
    Link,
}

impl AnnotationType {
    /// Editor style for this annotation (`None` for links)
    pub fn style(self) -> Option<StyleName> {
        match self {
            AnnotationType::Strong => Some(StyleName::Bold),
            AnnotationType::Emphasis => Some(StyleName::Italic),
            AnnotationType::Underline => Some(StyleName::Underline),
            AnnotationType::Strike => Some(StyleName::Strike),
            AnnotationType::Code => Some(StyleName::Code),
            AnnotationType::Link => None,
        }
    }
}

/// A sparse marker over a block's text.
///
/// `starts` and `ends` are parallel arrays of half-open character ranges
/// `[starts[i], ends[i])`. Ranges inside one annotation never overlap each
/// other; ranges of different annotations may.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: AnnotationType,
    pub starts: Vec<usize>,
    pub ends: Vec<usize>,
    /// Link target; only meaningful for `link`
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Annotation {
    pub fn span(kind: AnnotationType, start: usize, end: usize) -> Self {
        Self {
            kind,
            starts: vec![start],
            ends: vec![end],
            reference: None,
        }
    }

    pub fn link(href: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind: AnnotationType::Link,
            starts: vec![start],
            ends: vec![end],
            reference: Some(href.into()),
        }
    }

    /// Ranges as `(start, end)` pairs. Extra entries in the longer of the two
    /// arrays are ignored.
    pub fn ranges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.starts.iter().copied().zip(self.ends.iter().copied())
    }

    /// Same annotation with every range shifted right by `by`
    pub fn shifted(&self, by: usize) -> Self {
        Self {
            kind: self.kind,
            starts: self.starts.iter().map(|s| s + by).collect(),
            ends: self.ends.iter().map(|e| e + by).collect(),
            reference: self.reference.clone(),
        }
    }
}

/// A block as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBlock {
    pub id: BlockId,
    /// Block type (paragraph, heading, codeBlock, image, ...)
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
}

impl ServerBlock {
    pub fn new(id: impl Into<BlockId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            text: String::new(),
            annotations: Vec::new(),
            attributes: BTreeMap::new(),
            reference: String::new(),
        }
    }

    pub fn paragraph(id: impl Into<BlockId>, text: impl Into<String>) -> Self {
        Self::new(id, "paragraph").with_text(text)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_ref(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A block together with its ordered children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNode {
    pub block: ServerBlock,
    #[serde(default)]
    pub children: Vec<BlockNode>,
}

impl BlockNode {
    pub fn new(block: ServerBlock) -> Self {
        Self {
            block,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<BlockNode>) -> Self {
        self.children = children;
        self
    }
}

/// A stored draft: title plus top-level blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DraftId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub children: Vec<BlockNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(id: DraftId) -> Self {
        Self {
            id,
            title: String::new(),
            children: Vec::new(),
            update_time: None,
        }
    }
}

// =============================================================================
// Changes
// =============================================================================

/// One structural or content change to a stored draft.
///
/// A change list is applied strictly in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DocumentChange {
    /// Position `block_id` under `parent`, right after `left_sibling`
    /// (first child when empty)
    MoveBlock {
        block_id: BlockId,
        parent: BlockId,
        left_sibling: BlockId,
    },
    /// Overwrite the content of an already-positioned block
    ReplaceBlock { block: ServerBlock },
    /// Remove a block
    DeleteBlock { block_id: BlockId },
    /// Change the draft title
    SetTitle { title: String },
}

impl DocumentChange {
    pub fn move_block(
        block_id: impl Into<BlockId>,
        parent: impl Into<BlockId>,
        left_sibling: impl Into<BlockId>,
    ) -> Self {
        DocumentChange::MoveBlock {
            block_id: block_id.into(),
            parent: parent.into(),
            left_sibling: left_sibling.into(),
        }
    }

    pub fn replace(block: ServerBlock) -> Self {
        DocumentChange::ReplaceBlock { block }
    }

    pub fn delete(block_id: impl Into<BlockId>) -> Self {
        DocumentChange::DeleteBlock {
            block_id: block_id.into(),
        }
    }

    /// Block this change targets, if any
    pub fn block_id(&self) -> Option<&str> {
        match self {
            DocumentChange::MoveBlock { block_id, .. } | DocumentChange::DeleteBlock { block_id } => {
                Some(block_id)
            }
            DocumentChange::ReplaceBlock { block } => Some(&block.id),
            DocumentChange::SetTitle { .. } => None,
        }
    }
}
