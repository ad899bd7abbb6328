//! Markdown card documents
//!
//! A document is a parsed markdown file holding one card: the question, a
//! top-level `---` rule, then the answer. From it we derive
//!
//! - the forward card (as written),
//! - the backward card (answer and question swapped), which only exists when
//!   the answer contains exactly one prompt override: a paragraph starting
//!   with `! `, `prompt: ` or `Prompt: `.
//!
//! The prompt override's text replaces the marker paragraph, emphasized, on
//! the question side; on the answer side the paragraph is dropped.

mod ast;
mod parse;
mod render;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use ast::{walk_inlines, Block, Inline};
pub use render::Flavor;

/// Tokens that open a prompt override paragraph
const PROMPT_TOKENS: [&str; 3] = ["!", "prompt:", "Prompt:"];

/// Structural errors in a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("expected exactly one `---` divider between question and answer, found {found}")]
    DividerCount { found: usize },

    #[error("expected at most one prompt override in the answer, found {found}")]
    MultiplePrompts { found: usize },
}

/// Orientation of a card derived from a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// As written: question first
    Forward,
    /// Swapped: answer first
    Backward,
}

impl Direction {
    /// Both directions, forward first
    pub const ALL: [Direction; 2] = [Direction::Forward, Direction::Backward];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media reference: the image destination and its title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub path: String,
    pub title: String,
}

/// A parsed card document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    /// Parse markdown text
    pub fn parse(text: &str) -> Self {
        Self {
            blocks: parse::parse_blocks(text),
        }
    }

    /// The block sequence
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Split into question and answer around the single top-level rule
    pub fn split(&self) -> Result<(&[Block], &[Block]), DocumentError> {
        split_blocks(&self.blocks)
    }

    /// Swap question and answer: `answer ++ rule ++ question`
    pub fn reversed(&self) -> Result<Document, DocumentError> {
        let (question, answer) = self.split()?;
        Ok(Document::joined(answer.to_vec(), question.to_vec()))
    }

    /// The document in the given orientation
    pub fn oriented(&self, direction: Direction) -> Result<Document, DocumentError> {
        match direction {
            Direction::Forward => Ok(self.clone()),
            Direction::Backward => self.reversed(),
        }
    }

    /// Whether the answer holds a prompt override, so a backward card exists
    ///
    /// More than one override is an error.
    pub fn has_reverse_prompt(&self) -> Result<bool, DocumentError> {
        let (_, answer) = self.split()?;
        let found = answer
            .iter()
            .filter(|block| match_prompt(block).is_some())
            .count();
        match found {
            0 => Ok(false),
            1 => Ok(true),
            found => Err(DocumentError::MultiplePrompts { found }),
        }
    }

    /// Apply prompt overrides
    ///
    /// In the question half each override paragraph is replaced by its text,
    /// emphasized; in the answer half override paragraphs are removed. A
    /// document without overrides comes back unchanged.
    pub fn prompted(&self) -> Result<Document, DocumentError> {
        let (question, answer) = self.split()?;

        let question = question
            .iter()
            .map(|block| match match_prompt(block) {
                Some(prompt) => Block::Paragraph(emphasized(prompt)),
                None => block.clone(),
            })
            .collect();

        let answer = answer
            .iter()
            .filter(|block| match_prompt(block).is_none())
            .cloned()
            .collect();

        Ok(Document::joined(question, answer))
    }

    /// Every media reference, in document order
    pub fn media_refs(&self) -> Vec<MediaRef> {
        let mut refs = Vec::new();
        walk_inlines(&self.blocks, &mut |inline| {
            if let Inline::Image { url, title, .. } = inline {
                refs.push(MediaRef {
                    path: url.clone(),
                    title: title.clone(),
                });
            }
        });
        refs
    }

    /// Replace every media reference through `rewrite`, in document order
    pub fn rewrite_media_refs<E>(
        &self,
        mut rewrite: impl FnMut(&MediaRef) -> Result<MediaRef, E>,
    ) -> Result<Document, E> {
        let mut blocks = self.blocks.clone();
        ast::try_walk_inlines_mut(&mut blocks, &mut |inline| {
            if let Inline::Image { url, title, .. } = inline {
                let rewritten = rewrite(&MediaRef {
                    path: url.clone(),
                    title: title.clone(),
                })?;
                *url = rewritten.path;
                *title = rewritten.title;
            }
            Ok(())
        })?;
        Ok(Document { blocks })
    }

    /// Serialize for the remote store (and for diffing against it)
    pub fn to_wire(&self) -> String {
        render::render(&self.blocks, Flavor::Wire)
    }

    /// Serialize for humans and editors
    pub fn to_display(&self) -> String {
        render::render(&self.blocks, Flavor::Display)
    }

    fn joined(mut first: Vec<Block>, second: Vec<Block>) -> Document {
        first.push(Block::Rule);
        first.extend(second);
        Document { blocks: first }
    }
}

fn split_blocks(blocks: &[Block]) -> Result<(&[Block], &[Block]), DocumentError> {
    let dividers: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, block)| matches!(block, Block::Rule))
        .map(|(index, _)| index)
        .collect();

    match dividers.as_slice() {
        [index] => Ok((&blocks[..*index], &blocks[*index + 1..])),
        other => Err(DocumentError::DividerCount { found: other.len() }),
    }
}

/// Wrap in emphasis unless the content already is a single emphasis
fn emphasized(inlines: Vec<Inline>) -> Vec<Inline> {
    match inlines.as_slice() {
        [Inline::Emphasis(_)] => inlines,
        _ => vec![Inline::Emphasis(inlines)],
    }
}

/// The override text if `block` is a prompt override paragraph
fn match_prompt(block: &Block) -> Option<Vec<Inline>> {
    let Block::Paragraph(inlines) = block else {
        return None;
    };
    let (Inline::Text(first), rest) = inlines.split_first()? else {
        return None;
    };

    let remainder = PROMPT_TOKENS.iter().find_map(|token| {
        first
            .strip_prefix(token)
            .and_then(|after| after.strip_prefix(' '))
    })?;

    let mut prompt = Vec::with_capacity(inlines.len());
    let remainder = remainder.trim_start();
    if !remainder.is_empty() {
        prompt.push(Inline::Text(remainder.to_string()));
    }
    prompt.extend(rest.iter().cloned());
    Some(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    fn para(s: &str) -> Block {
        Block::Paragraph(vec![text(s)])
    }

    #[test]
    fn test_split_requires_exactly_one_divider() {
        let none = Document::parse("Q\n\nA\n");
        assert_eq!(
            none.split().unwrap_err(),
            DocumentError::DividerCount { found: 0 }
        );

        let two = Document::parse("Q\n\n---\n\nA\n\n---\n\nB\n");
        assert_eq!(
            two.split().unwrap_err(),
            DocumentError::DividerCount { found: 2 }
        );

        let one = Document::parse("Q\n\n---\n\nA\n");
        let (question, answer) = one.split().unwrap();
        assert_eq!(question, &[para("Q")]);
        assert_eq!(answer, &[para("A")]);
    }

    #[test]
    fn test_rule_inside_quote_is_not_a_divider() {
        let doc = Document::parse("Q\n\n> x\n>\n> ---\n\n---\n\nA\n");
        assert!(doc.split().is_ok());
    }

    #[test]
    fn test_reversed_swaps_halves() {
        let doc = Document::parse("Q1\n\nQ2\n\n---\n\nA\n");
        let reversed = doc.reversed().unwrap();

        assert_eq!(
            reversed.blocks(),
            &[para("A"), Block::Rule, para("Q1"), para("Q2")]
        );
    }

    #[test]
    fn test_has_reverse_prompt_counts() {
        for token in ["!", "prompt:", "Prompt:"] {
            let doc = Document::parse(&format!("Q\n\n---\n\nA\n\n{} reverse\n", token));
            assert!(doc.has_reverse_prompt().unwrap(), "token {}", token);
        }

        let plain = Document::parse("Q\n\n---\n\nA\n");
        assert!(!plain.has_reverse_prompt().unwrap());

        let two = Document::parse("Q\n\n---\n\n! one\n\nprompt: two\n");
        assert_eq!(
            two.has_reverse_prompt().unwrap_err(),
            DocumentError::MultiplePrompts { found: 2 }
        );
    }

    #[test]
    fn test_prompt_needs_a_space_after_the_token() {
        let doc = Document::parse("Q\n\n---\n\nprompt:nospace\n\n!important\n");
        assert!(!doc.has_reverse_prompt().unwrap());
    }

    #[test]
    fn test_prompt_in_question_does_not_count() {
        let doc = Document::parse("! not a reverse prompt\n\n---\n\nA\n");
        assert!(!doc.has_reverse_prompt().unwrap());
    }

    #[test]
    fn test_forward_prompted_drops_override() {
        let doc = Document::parse("Q\n\n---\n\nA\n\n! reverse question\n");
        let forward = doc.prompted().unwrap();

        assert_eq!(forward.to_wire(), "Q\n\n---\n\nA\n");
    }

    #[test]
    fn test_backward_prompted_emphasizes_override() {
        let doc = Document::parse("Q\n\n---\n\nA\n\n! reverse *question*\n");
        let backward = doc.reversed().unwrap().prompted().unwrap();

        assert_eq!(
            backward.blocks(),
            &[
                para("A"),
                Block::Paragraph(vec![Inline::Emphasis(vec![
                    text("reverse "),
                    Inline::Emphasis(vec![text("question")]),
                ])]),
                Block::Rule,
                para("Q"),
            ]
        );
        assert_eq!(
            backward.to_wire(),
            "A\n\n*reverse _question_*\n\n---\n\nQ\n"
        );
        assert_eq!(Document::parse(&backward.to_wire()), backward);
    }

    #[test]
    fn test_emphasized_override_is_not_wrapped_twice() {
        let doc = Document::parse("Q\n\n---\n\nA\n\n! *question*\n");
        let backward = doc.reversed().unwrap().prompted().unwrap();

        assert_eq!(backward.to_wire(), "A\n\n*question*\n\n---\n\nQ\n");
    }

    #[test]
    fn test_prompted_without_override_is_identity() {
        let doc = Document::parse("Q\n\n---\n\nA\n\nmore\n");
        assert_eq!(doc.prompted().unwrap(), doc);
    }

    #[test]
    fn test_media_refs_and_rewrite() {
        let doc = Document::parse("![x](a.png)\n\n---\n\n> ![y](sub/b.png \"old\")\n");

        assert_eq!(
            doc.media_refs(),
            vec![
                MediaRef {
                    path: "a.png".to_string(),
                    title: String::new()
                },
                MediaRef {
                    path: "sub/b.png".to_string(),
                    title: "old".to_string()
                },
            ]
        );

        let mut next = 0;
        let rewritten = doc
            .rewrite_media_refs(|media| {
                next += 1;
                Ok::<_, ()>(MediaRef {
                    path: format!("@media/{}", next),
                    title: format!("{}-digest", media.path),
                })
            })
            .unwrap();

        assert_eq!(
            rewritten.to_wire(),
            "![x](@media/1 \"a.png-digest\")\n\n---\n\n> ![y](@media/2 \"sub/b.png-digest\")\n"
        );
        // Source document is untouched
        assert_eq!(doc.media_refs()[0].path, "a.png");
    }

    #[test]
    fn test_direction_serde() {
        assert_eq!(
            serde_json::to_string(&Direction::Backward).unwrap(),
            "\"backward\""
        );
        assert_eq!(Direction::Forward.to_string(), "forward");
    }

    fn arb_block() -> impl Strategy<Value = Block> {
        prop_oneof![
            "[a-z ]{1,12}".prop_map(|s| Block::Paragraph(vec![Inline::Text(s)])),
            ("[a-z]{1,8}", 1u8..=6).prop_map(|(s, level)| Block::Heading {
                level,
                content: vec![Inline::Text(s)],
            }),
            "[a-z]{0,8}".prop_map(|s| Block::CodeBlock {
                info: String::new(),
                literal: s,
            }),
        ]
    }

    fn arb_prompt() -> impl Strategy<Value = Block> {
        (prop::sample::select(PROMPT_TOKENS.to_vec()), "[a-z]{1,8}")
            .prop_map(|(token, s)| Block::Paragraph(vec![Inline::Text(format!("{} {}", token, s))]))
    }

    proptest! {
        #[test]
        fn prop_reversed_is_an_involution(
            question in prop::collection::vec(arb_block(), 0..5),
            answer in prop::collection::vec(arb_block(), 0..5),
        ) {
            let doc = Document::joined(question, answer);
            let twice = doc.reversed().unwrap().reversed().unwrap();
            prop_assert_eq!(twice, doc);
        }

        #[test]
        fn prop_has_reverse_prompt_matches_count(
            question in prop::collection::vec(arb_block(), 0..4),
            answer in prop::collection::vec(arb_block(), 0..4),
            prompts in prop::collection::vec(arb_prompt(), 0..4),
        ) {
            let count = prompts.len();
            let mut answer = answer;
            answer.extend(prompts);
            let doc = Document::joined(question, answer);

            match count {
                0 => prop_assert_eq!(doc.has_reverse_prompt(), Ok(false)),
                1 => prop_assert_eq!(doc.has_reverse_prompt(), Ok(true)),
                found => prop_assert_eq!(
                    doc.has_reverse_prompt(),
                    Err(DocumentError::MultiplePrompts { found })
                ),
            }
        }
    }
}
