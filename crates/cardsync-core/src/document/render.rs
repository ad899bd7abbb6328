//! Markdown serialization
//!
//! Two flavors share one writer:
//!
//! - `Wire`: what the remote store receives and what diffs compare. Soft
//!   breaks collapse to spaces, hard breaks become plain newlines and a rule
//!   is exactly `---`, the store's page separator.
//! - `Display`: what a person edits. Soft breaks stay as newlines, hard
//!   breaks use the backslash form and rules span the full text width.

use super::ast::{Block, Inline};

/// Width of a rule in the display flavor
const DISPLAY_COLUMNS: usize = 72;

/// Output flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Wire,
    Display,
}

/// Render blocks as markdown, terminated by a newline
pub fn render(blocks: &[Block], flavor: Flavor) -> String {
    let mut out = render_blocks(blocks, flavor);
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn render_blocks(blocks: &[Block], flavor: Flavor) -> String {
    blocks
        .iter()
        .map(|block| render_block(block, flavor))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(block: &Block, flavor: Flavor) -> String {
    match block {
        Block::Paragraph(inlines) | Block::Plain(inlines) => render_inlines(inlines, flavor),
        Block::Heading { level, content } => {
            let mut text = render_inlines(content, flavor);
            // A trailing run of `#` would read as the closing sequence
            let closing = matches!(content.last(), Some(Inline::Text(last)) if last.ends_with('#'));
            if closing && !text.ends_with("\\#") {
                text.insert(text.len() - 1, '\\');
            }
            format!("{} {}", "#".repeat(usize::from(*level)), text)
        }
        Block::CodeBlock { info, literal } => {
            let fence = "`".repeat(longest_run(literal, '`').max(2) + 1);
            let mut body = literal.clone();
            if !body.ends_with('\n') {
                body.push('\n');
            }
            format!("{fence}{info}\n{body}{fence}")
        }
        Block::BlockQuote(children) => render_blocks(children, flavor)
            .lines()
            .map(|line| {
                if line.is_empty() {
                    ">".to_string()
                } else {
                    format!("> {}", line)
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Block::List {
            start,
            tight,
            items,
        } => {
            let separator = if *tight { "\n" } else { "\n\n" };
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let marker = match start {
                        Some(first) => format!("{}. ", first + index as u64),
                        None => "- ".to_string(),
                    };
                    indent_item(&marker, &render_blocks(item, flavor))
                })
                .collect::<Vec<_>>()
                .join(separator)
        }
        Block::Html(html) => html.clone(),
        Block::Rule => match flavor {
            Flavor::Wire => "---".to_string(),
            Flavor::Display => "-".repeat(DISPLAY_COLUMNS),
        },
    }
}

/// Prefix the first line with the marker and indent the rest to match
fn indent_item(marker: &str, body: &str) -> String {
    let padding = " ".repeat(marker.len());
    let mut out = String::new();
    for (index, line) in body.split('\n').enumerate() {
        if index == 0 {
            out.push_str(marker);
            out.push_str(line);
        } else {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&padding);
                out.push_str(line);
            }
        }
    }
    if body.is_empty() {
        return marker.trim_end().to_string();
    }
    out
}

fn render_inlines(inlines: &[Inline], flavor: Flavor) -> String {
    render_run(inlines, flavor, false)
}

/// Render a run of sibling inlines; `in_emphasis` when directly inside `*..*`
fn render_run(inlines: &[Inline], flavor: Flavor, in_emphasis: bool) -> String {
    let mut out = String::new();
    for (index, inline) in inlines.iter().enumerate() {
        match inline {
            Inline::Text(text) => {
                let line_start = out.is_empty() || out.ends_with('\n');
                let before_link = matches!(inlines.get(index + 1), Some(Inline::Link { .. }));
                out.push_str(&escape_text(text, line_start, before_link));
            }
            other => out.push_str(&render_inline(other, flavor, in_emphasis)),
        }
    }
    out
}

fn render_inline(inline: &Inline, flavor: Flavor, in_emphasis: bool) -> String {
    match inline {
        Inline::Text(text) => escape_text(text, false, false),
        Inline::Code(code) => {
            let ticks = "`".repeat(longest_run(code, '`') + 1);
            if code.starts_with('`') || code.ends_with('`') {
                format!("{ticks} {code} {ticks}")
            } else {
                format!("{ticks}{code}{ticks}")
            }
        }
        // `**` would read back as strong; nested emphasis switches delimiter
        Inline::Emphasis(children) => {
            let delimiter = if in_emphasis { '_' } else { '*' };
            format!("{0}{1}{0}", delimiter, render_run(children, flavor, true))
        }
        Inline::Strong(children) => format!("**{}**", render_inlines(children, flavor)),
        Inline::Link {
            url,
            title,
            content,
        } => format!(
            "[{}]({})",
            render_inlines(content, flavor),
            destination(url, title)
        ),
        Inline::Image { url, title, alt } => format!(
            "![{}]({})",
            render_inlines(alt, flavor),
            destination(url, title)
        ),
        Inline::Html(html) => html.clone(),
        Inline::SoftBreak => match flavor {
            Flavor::Wire => " ".to_string(),
            Flavor::Display => "\n".to_string(),
        },
        Inline::HardBreak => match flavor {
            Flavor::Wire => "\n".to_string(),
            Flavor::Display => "\\\n".to_string(),
        },
    }
}

fn destination(url: &str, title: &str) -> String {
    let url = if url.contains([' ', '(', ')']) {
        format!("<{}>", url)
    } else {
        url.to_string()
    };
    if title.is_empty() {
        url
    } else {
        format!("{} \"{}\"", url, title.replace('"', "\\\""))
    }
}

/// Escape text so it reads back as the same text
///
/// At the start of a line, characters that would open a heading, quote,
/// list, rule, setext underline or fence are escaped too. A trailing `!`
/// before a link would turn the link into an image.
fn escape_text(text: &str, line_start: bool, before_link: bool) -> String {
    let marker = if line_start { block_marker(text) } else { None };
    let mut out = String::with_capacity(text.len() + 2);
    for (index, c) in text.char_indices() {
        let escape = matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<')
            || marker == Some(index)
            || (c == '&' && starts_entity(&text[index + 1..]))
            || (c == '!' && before_link && index + 1 == text.len());
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Byte offset of the character that opens a block construct at line start
fn block_marker(text: &str) -> Option<usize> {
    match text.chars().next()? {
        '#' | '>' | '-' | '+' | '=' | '~' => Some(0),
        '0'..='9' => {
            let digits = text.find(|c: char| !c.is_ascii_digit())?;
            matches!(text[digits..].chars().next(), Some('.' | ')')).then_some(digits)
        }
        _ => None,
    }
}

fn starts_entity(rest: &str) -> bool {
    rest.starts_with(|c: char| c == '#' || c.is_ascii_alphanumeric())
}

fn longest_run(text: &str, needle: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == needle {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}
