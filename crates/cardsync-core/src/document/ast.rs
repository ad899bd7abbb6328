//! Block and inline node types
//!
//! Both enums are closed: every traversal below matches all variants
//! explicitly, so adding a node kind forces each visitor to be revisited.

/// A block-level node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A paragraph
    Paragraph(Vec<Inline>),
    /// Inline content directly inside a tight list item
    Plain(Vec<Inline>),
    /// ATX or setext heading, level 1 to 6
    Heading { level: u8, content: Vec<Inline> },
    /// Fenced or indented code; `info` is empty for indented code
    CodeBlock { info: String, literal: String },
    /// Block quote
    BlockQuote(Vec<Block>),
    /// Bullet list (`start` is `None`) or ordered list
    List {
        start: Option<u64>,
        tight: bool,
        items: Vec<Vec<Block>>,
    },
    /// Raw HTML block
    Html(String),
    /// Thematic break; a top-level rule divides question from answer
    Rule,
}

/// An inline node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Link {
        url: String,
        title: String,
        content: Vec<Inline>,
    },
    Image {
        url: String,
        title: String,
        alt: Vec<Inline>,
    },
    Html(String),
    SoftBreak,
    HardBreak,
}

/// Visit every inline node in `blocks`, depth first
pub fn walk_inlines<'a>(blocks: &'a [Block], visit: &mut impl FnMut(&'a Inline)) {
    for block in blocks {
        match block {
            Block::Paragraph(inlines) | Block::Plain(inlines) => walk_inline_seq(inlines, visit),
            Block::Heading { content, .. } => walk_inline_seq(content, visit),
            Block::BlockQuote(children) => walk_inlines(children, visit),
            Block::List { items, .. } => {
                for item in items {
                    walk_inlines(item, visit);
                }
            }
            Block::CodeBlock { .. } | Block::Html(_) | Block::Rule => {}
        }
    }
}

fn walk_inline_seq<'a>(inlines: &'a [Inline], visit: &mut impl FnMut(&'a Inline)) {
    for inline in inlines {
        visit(inline);
        match inline {
            Inline::Emphasis(children) | Inline::Strong(children) => {
                walk_inline_seq(children, visit)
            }
            Inline::Link { content, .. } => walk_inline_seq(content, visit),
            Inline::Image { alt, .. } => walk_inline_seq(alt, visit),
            Inline::Text(_)
            | Inline::Code(_)
            | Inline::Html(_)
            | Inline::SoftBreak
            | Inline::HardBreak => {}
        }
    }
}

/// Mutably visit every inline node in `blocks`, depth first
///
/// The visitor may fail; traversal stops at the first error.
pub fn try_walk_inlines_mut<E>(
    blocks: &mut [Block],
    visit: &mut impl FnMut(&mut Inline) -> Result<(), E>,
) -> Result<(), E> {
    for block in blocks {
        match block {
            Block::Paragraph(inlines) | Block::Plain(inlines) => {
                try_walk_inline_seq_mut(inlines, visit)?
            }
            Block::Heading { content, .. } => try_walk_inline_seq_mut(content, visit)?,
            Block::BlockQuote(children) => try_walk_inlines_mut(children, visit)?,
            Block::List { items, .. } => {
                for item in items {
                    try_walk_inlines_mut(item, visit)?;
                }
            }
            Block::CodeBlock { .. } | Block::Html(_) | Block::Rule => {}
        }
    }
    Ok(())
}

fn try_walk_inline_seq_mut<E>(
    inlines: &mut [Inline],
    visit: &mut impl FnMut(&mut Inline) -> Result<(), E>,
) -> Result<(), E> {
    for inline in inlines {
        visit(inline)?;
        match inline {
            Inline::Emphasis(children) | Inline::Strong(children) => {
                try_walk_inline_seq_mut(children, visit)?
            }
            Inline::Link { content, .. } => try_walk_inline_seq_mut(content, visit)?,
            Inline::Image { alt, .. } => try_walk_inline_seq_mut(alt, visit)?,
            Inline::Text(_)
            | Inline::Code(_)
            | Inline::Html(_)
            | Inline::SoftBreak
            | Inline::HardBreak => {}
        }
    }
    Ok(())
}

/// Append an inline, merging adjacent text nodes
pub(crate) fn push_inline(inlines: &mut Vec<Inline>, inline: Inline) {
    if let Inline::Text(text) = &inline {
        if let Some(Inline::Text(last)) = inlines.last_mut() {
            last.push_str(text);
            return;
        }
    }
    inlines.push(inline);
}
