//! Markdown parsing
//!
//! Folds the `pulldown-cmark` event stream into the `Block`/`Inline` tree.
//! Only CommonMark is enabled; tables, footnotes and other extensions are
//! left to the parser's plain-text fallback.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use tracing::trace;

use super::ast::{push_inline, Block, Inline};

/// Open block containers
enum Container {
    Root(Vec<Block>),
    Quote(Vec<Block>),
    List {
        start: Option<u64>,
        items: Vec<Vec<Block>>,
    },
    Item(Vec<Block>),
}

/// Open inline containers
enum InlineFrame {
    Paragraph(Vec<Inline>),
    /// Implicit frame for text directly inside a tight list item
    Plain(Vec<Inline>),
    Heading(u8, Vec<Inline>),
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
}

impl InlineFrame {
    fn children(&mut self) -> &mut Vec<Inline> {
        match self {
            InlineFrame::Paragraph(c)
            | InlineFrame::Plain(c)
            | InlineFrame::Heading(_, c)
            | InlineFrame::Emphasis(c)
            | InlineFrame::Strong(c) => c,
            InlineFrame::Link { content, .. } => content,
            InlineFrame::Image { alt, .. } => alt,
        }
    }
}

struct Builder {
    containers: Vec<Container>,
    inlines: Vec<InlineFrame>,
    code: Option<(String, String)>,
    html: Option<String>,
}

/// Parse markdown text into blocks
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut builder = Builder {
        containers: vec![Container::Root(Vec::new())],
        inlines: Vec::new(),
        code: None,
        html: None,
    };

    for event in Parser::new_ext(text, Options::empty()) {
        builder.event(event);
    }

    builder.finish()
}

impl Builder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some((_, literal)) = self.code.as_mut() {
                    literal.push_str(&text);
                } else if let Some(html) = self.html.as_mut() {
                    html.push_str(&text);
                } else {
                    self.push_inline(Inline::Text(text.into_string()));
                }
            }
            Event::Code(code) => self.push_inline(Inline::Code(code.into_string())),
            Event::Html(html) => match self.html.as_mut() {
                Some(block) => block.push_str(&html),
                None => self.push_inline(Inline::Html(html.into_string())),
            },
            Event::InlineHtml(html) => self.push_inline(Inline::Html(html.into_string())),
            Event::SoftBreak => self.push_inline(Inline::SoftBreak),
            Event::HardBreak => self.push_inline(Inline::HardBreak),
            Event::Rule => {
                self.close_plain();
                self.push_block(Block::Rule);
            }
            Event::FootnoteReference(label) => {
                self.push_inline(Inline::Text(format!("[^{}]", label)))
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_inline(Inline::Text(marker.to_string()))
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.close_plain();
                self.inlines.push(InlineFrame::Paragraph(Vec::new()));
            }
            Tag::Heading { level, .. } => {
                self.close_plain();
                self.inlines
                    .push(InlineFrame::Heading(heading_level(level), Vec::new()));
            }
            Tag::BlockQuote => {
                self.close_plain();
                self.containers.push(Container::Quote(Vec::new()));
            }
            Tag::CodeBlock(kind) => {
                self.close_plain();
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.into_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((info, String::new()));
            }
            Tag::HtmlBlock => {
                self.close_plain();
                self.html = Some(String::new());
            }
            Tag::List(start) => {
                self.close_plain();
                self.containers.push(Container::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => {
                self.close_plain();
                self.containers.push(Container::Item(Vec::new()));
            }
            Tag::Emphasis => {
                self.open_plain();
                self.inlines.push(InlineFrame::Emphasis(Vec::new()));
            }
            Tag::Strong => {
                self.open_plain();
                self.inlines.push(InlineFrame::Strong(Vec::new()));
            }
            Tag::Link {
                dest_url, title, ..
            } => {
                self.open_plain();
                self.inlines.push(InlineFrame::Link {
                    url: dest_url.into_string(),
                    title: title.into_string(),
                    content: Vec::new(),
                });
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                self.open_plain();
                self.inlines.push(InlineFrame::Image {
                    url: dest_url.into_string(),
                    title: title.into_string(),
                    alt: Vec::new(),
                });
            }
            other => trace!("ignoring markdown extension tag {:?}", other),
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if let Some(InlineFrame::Paragraph(inlines)) = self.inlines.pop() {
                    self.push_block(Block::Paragraph(inlines));
                }
            }
            TagEnd::Heading(_) => {
                if let Some(InlineFrame::Heading(level, content)) = self.inlines.pop() {
                    self.push_block(Block::Heading { level, content });
                }
            }
            TagEnd::BlockQuote => {
                self.close_plain();
                if let Some(Container::Quote(blocks)) = self.containers.pop() {
                    self.push_block(Block::BlockQuote(blocks));
                }
            }
            TagEnd::CodeBlock => {
                if let Some((info, literal)) = self.code.take() {
                    self.push_block(Block::CodeBlock { info, literal });
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html.take() {
                    self.push_block(Block::Html(html.trim_end().to_string()));
                }
            }
            TagEnd::List(_) => {
                self.close_plain();
                if let Some(Container::List { start, items }) = self.containers.pop() {
                    let tight = items
                        .iter()
                        .all(|item| !item.iter().any(|b| matches!(b, Block::Paragraph(_))));
                    self.push_block(Block::List {
                        start,
                        tight,
                        items,
                    });
                }
            }
            TagEnd::Item => {
                self.close_plain();
                if let Some(Container::Item(blocks)) = self.containers.pop() {
                    if let Some(Container::List { items, .. }) = self.containers.last_mut() {
                        items.push(blocks);
                    }
                }
            }
            TagEnd::Emphasis => self.close_inline(),
            TagEnd::Strong => self.close_inline(),
            TagEnd::Link => self.close_inline(),
            TagEnd::Image => self.close_inline(),
            other => trace!("ignoring markdown extension end {:?}", other),
        }
    }

    /// Pop an inline frame and attach it to its parent
    fn close_inline(&mut self) {
        let inline = match self.inlines.pop() {
            Some(InlineFrame::Emphasis(children)) => Inline::Emphasis(children),
            Some(InlineFrame::Strong(children)) => Inline::Strong(children),
            Some(InlineFrame::Link {
                url,
                title,
                content,
            }) => Inline::Link {
                url,
                title,
                content,
            },
            Some(InlineFrame::Image { url, title, alt }) => Inline::Image { url, title, alt },
            Some(frame @ InlineFrame::Paragraph(_))
            | Some(frame @ InlineFrame::Plain(_))
            | Some(frame @ InlineFrame::Heading(..)) => {
                // Unbalanced end event; keep the frame open
                self.inlines.push(frame);
                return;
            }
            None => return,
        };
        self.push_inline(inline);
    }

    fn push_inline(&mut self, inline: Inline) {
        self.open_plain();
        if let Some(frame) = self.inlines.last_mut() {
            push_inline(frame.children(), inline);
        }
    }

    fn open_plain(&mut self) {
        if self.inlines.is_empty() {
            self.inlines.push(InlineFrame::Plain(Vec::new()));
        }
    }

    fn close_plain(&mut self) {
        if let Some(InlineFrame::Plain(_)) = self.inlines.last() {
            if let Some(InlineFrame::Plain(inlines)) = self.inlines.pop() {
                self.push_block(Block::Plain(inlines));
            }
        }
    }

    fn push_block(&mut self, block: Block) {
        match self.containers.last_mut() {
            Some(Container::Root(blocks))
            | Some(Container::Quote(blocks))
            | Some(Container::Item(blocks)) => blocks.push(block),
            Some(Container::List { items, .. }) => match items.last_mut() {
                Some(item) => item.push(block),
                None => items.push(vec![block]),
            },
            None => self.containers.push(Container::Root(vec![block])),
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.close_plain();
        // Containers are balanced by the parser; fold anything left over
        while self.containers.len() > 1 {
            let block = match self.containers.pop() {
                Some(Container::Quote(blocks)) => Block::BlockQuote(blocks),
                Some(Container::List { start, items }) => Block::List {
                    start,
                    tight: false,
                    items,
                },
                Some(Container::Item(blocks)) => Block::List {
                    start: None,
                    tight: false,
                    items: vec![blocks],
                },
                Some(Container::Root(blocks)) => Block::BlockQuote(blocks),
                None => break,
            };
            self.push_block(block);
        }
        match self.containers.pop() {
            Some(Container::Root(blocks)) => blocks,
            _ => Vec::new(),
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_question_rule_answer() {
        let blocks = parse_blocks("What is Rust?\n\n---\n\nA systems language.\n");

        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![text("What is Rust?")]),
                Block::Rule,
                Block::Paragraph(vec![text("A systems language.")]),
            ]
        );
    }

    #[test]
    fn test_setext_heading_is_not_a_rule() {
        let blocks = parse_blocks("Q\n---\nA\n");

        assert!(matches!(blocks[0], Block::Heading { level: 2, .. }));
        assert!(!blocks.contains(&Block::Rule));
    }

    #[test]
    fn test_prompt_text_is_merged() {
        let blocks = parse_blocks("! what is the reverse\n");

        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![text("! what is the reverse")])]
        );
    }

    #[test]
    fn test_image_with_title() {
        let blocks = parse_blocks("See ![a cat](img/cat.png \"title\")\n");

        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("See "),
                Inline::Image {
                    url: "img/cat.png".to_string(),
                    title: "title".to_string(),
                    alt: vec![text("a cat")],
                },
            ])]
        );
    }

    #[test]
    fn test_tight_and_loose_lists() {
        let tight = parse_blocks("- one\n- two\n");
        assert_eq!(
            tight,
            vec![Block::List {
                start: None,
                tight: true,
                items: vec![
                    vec![Block::Plain(vec![text("one")])],
                    vec![Block::Plain(vec![text("two")])],
                ],
            }]
        );

        let loose = parse_blocks("1. one\n\n2. two\n");
        match &loose[0] {
            Block::List {
                start, tight, items, ..
            } => {
                assert_eq!(*start, Some(1));
                assert!(!tight);
                assert_eq!(items[1], vec![Block::Paragraph(vec![text("two")])]);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_code_block_keeps_literal() {
        let blocks = parse_blocks("```rust\nlet x = 1;\n```\n");

        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                info: "rust".to_string(),
                literal: "let x = 1;\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_nested_quote_with_emphasis() {
        let blocks = parse_blocks("> a *b* **c**\n");

        assert_eq!(
            blocks,
            vec![Block::BlockQuote(vec![Block::Paragraph(vec![
                text("a "),
                Inline::Emphasis(vec![text("b")]),
                text(" "),
                Inline::Strong(vec![text("c")]),
            ])])]
        );
    }

    #[test]
    fn test_breaks() {
        let blocks = parse_blocks("one\ntwo  \nthree\n");

        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("one"),
                Inline::SoftBreak,
                text("two"),
                Inline::HardBreak,
                text("three"),
            ])]
        );
    }
}
