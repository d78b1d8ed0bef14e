//! Conversion between editor inline runs and stored text + annotations.
//!
//! The editor holds a block's content as a flat sequence of styled runs with
//! links wrapping runs of their own. Storage holds one plain string and a
//! list of sparse, possibly overlapping annotations over it. Offsets count
//! `char`s, not bytes.

use hyperdraft_types::{
    Annotation, AnnotationType, InlineContent, LinkRun, ServerBlock, StyleName, Styles, TextRun,
};

/// Text and annotations produced by [`encode`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedText {
    pub text: String,
    pub annotations: Vec<Annotation>,
}

// =============================================================================
// Encode (editor -> storage)
// =============================================================================

/// Encode inline content into plain text plus annotations.
pub fn encode(content: &[InlineContent]) -> EncodedText {
    let mut encoder = Encoder::default();
    encoder.push_all(content);
    encoder.finish()
}

/// Running state for one level of encoding. Link content gets its own
/// encoder so styles opened inside a link never leak out of it.
#[derive(Default)]
struct Encoder {
    text: String,
    annotations: Vec<Annotation>,
    offset: usize,
    /// Styles currently open, with the offset they opened at, in open order
    open: Vec<(StyleName, usize)>,
}

impl Encoder {
    fn push_all(&mut self, content: &[InlineContent]) {
        for inline in content {
            match inline {
                InlineContent::Text(run) => self.push_run(run),
                InlineContent::Link(link) => self.push_link(link),
            }
        }
    }

    fn push_run(&mut self, run: &TextRun) {
        for style in run.styles.iter() {
            if !self.open.iter().any(|(open, _)| *open == style) {
                self.open.push((style, self.offset));
            }
        }

        let Encoder {
            open,
            annotations,
            offset,
            ..
        } = self;
        open.retain(|(style, start)| {
            if run.styles.contains(*style) {
                return true;
            }
            close_style(annotations, *style, *start, *offset);
            false
        });

        self.text.push_str(&run.text);
        self.offset += run.text.chars().count();
    }

    fn push_link(&mut self, link: &LinkRun) {
        let inner = encode(&link.content);
        let base = self.offset;
        let len = inner.text.chars().count();

        self.text.push_str(&inner.text);
        self.annotations
            .extend(inner.annotations.iter().map(|a| a.shifted(base)));
        if len > 0 {
            self.annotations
                .push(Annotation::link(link.href.clone(), base, base + len));
        }
        self.offset += len;
    }

    fn finish(mut self) -> EncodedText {
        for (style, start) in std::mem::take(&mut self.open) {
            close_style(&mut self.annotations, style, start, self.offset);
        }
        EncodedText {
            text: self.text,
            annotations: self.annotations,
        }
    }
}

fn close_style(annotations: &mut Vec<Annotation>, style: StyleName, start: usize, end: usize) {
    // Runs with empty text can open and close a style at the same offset.
    if start < end {
        annotations.push(Annotation::span(style.annotation_type(), start, end));
    }
}

// =============================================================================
// Decode (storage -> editor)
// =============================================================================

/// Decode a stored block's text and annotations into editor inline content.
pub fn decode(block: &ServerBlock) -> Vec<InlineContent> {
    decode_parts(&block.text, &block.annotations)
}

/// Decode plain text plus annotations into editor inline content.
///
/// Decoding is permissive: annotations with mismatched `starts`/`ends`,
/// empty or inverted ranges, and links overlapping an earlier link are
/// skipped; ranges running past the text are clipped.
pub fn decode_parts(text: &str, annotations: &[Annotation]) -> Vec<InlineContent> {
    let chars: Vec<char> = text.chars().collect();
    let styles = style_map(annotations, chars.len());

    let mut inlines = Vec::new();
    let mut cursor = 0;
    for span in link_spans(annotations, chars.len()) {
        inlines.extend(styled_runs(&chars, &styles, cursor, span.start));
        inlines.push(InlineContent::Link(LinkRun {
            href: span.href,
            content: styled_runs(&chars, &styles, span.start, span.end),
        }));
        cursor = span.end;
    }
    inlines.extend(styled_runs(&chars, &styles, cursor, chars.len()));

    if inlines.is_empty() {
        inlines.push(InlineContent::plain(""));
    }
    inlines
}

/// Plain text of inline content, links included.
pub fn plain_text(content: &[InlineContent]) -> String {
    let mut text = String::new();
    for inline in content {
        match inline {
            InlineContent::Text(run) => text.push_str(&run.text),
            InlineContent::Link(link) => text.push_str(&plain_text(&link.content)),
        }
    }
    text
}

struct LinkSpan {
    start: usize,
    end: usize,
    href: String,
}

/// Clipped, well-formed ranges of an annotation
fn valid_ranges(annotation: &Annotation, len: usize) -> Vec<(usize, usize)> {
    if annotation.starts.len() != annotation.ends.len() {
        return Vec::new();
    }
    annotation
        .ranges()
        .map(|(start, end)| (start, end.min(len)))
        .filter(|(start, end)| start < end)
        .collect()
}

/// Per-character style sets. Contributions from overlapping annotations
/// union together.
fn style_map(annotations: &[Annotation], len: usize) -> Vec<Styles> {
    let mut styles = vec![Styles::none(); len];
    for annotation in annotations {
        let Some(style) = annotation.kind.style() else {
            continue;
        };
        for (start, end) in valid_ranges(annotation, len) {
            for slot in &mut styles[start..end] {
                slot.insert(style);
            }
        }
    }
    styles
}

/// Non-overlapping link ranges in text order
fn link_spans(annotations: &[Annotation], len: usize) -> Vec<LinkSpan> {
    let mut spans: Vec<LinkSpan> = annotations
        .iter()
        .filter(|a| a.kind == AnnotationType::Link)
        .flat_map(|a| {
            let href = a.reference.clone().unwrap_or_default();
            valid_ranges(a, len)
                .into_iter()
                .map(move |(start, end)| LinkSpan {
                    start,
                    end,
                    href: href.clone(),
                })
        })
        .collect();
    spans.sort_by_key(|s| (s.start, s.end));

    let mut accepted: Vec<LinkSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if accepted.last().is_some_and(|prev| span.start < prev.end) {
            continue;
        }
        accepted.push(span);
    }
    accepted
}

/// Coalesce `chars[start..end]` into runs of identical style.
fn styled_runs(chars: &[char], styles: &[Styles], start: usize, end: usize) -> Vec<InlineContent> {
    let mut runs = Vec::new();
    let mut current: Option<TextRun> = None;

    for i in start..end {
        match current.as_mut() {
            Some(run) if run.styles == styles[i] => run.text.push(chars[i]),
            _ => {
                if let Some(run) = current.take() {
                    runs.push(InlineContent::Text(run));
                }
                current = Some(TextRun::new(chars[i].to_string(), styles[i]));
            }
        }
    }
    if let Some(run) = current {
        runs.push(InlineContent::Text(run));
    }
    runs
}
