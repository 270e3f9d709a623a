//! Text analysis: segmentation, case folding and phonetic expansion.
//!
//! The same pipeline feeds the index (through [`tokenizer::MarkupTokenizer`])
//! and the query planner, so indexed terms and query terms always agree.

pub mod phonetic;
pub mod segment;
pub mod tokenizer;

use std::collections::VecDeque;

use segment::Segmenter;

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A run of non-CJK letters or digits.
    Alphanumeric,
    /// A word cut from a CJK run.
    Cjk,
    /// A transliteration derived from the token at the same position.
    Phonetic,
}

/// A single analyzed term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    /// Word position; phonetic expansions share the position of their source.
    pub position: usize,
    /// Byte range of the source word in the analyzed text.
    pub offset_from: usize,
    pub offset_to: usize,
}

/// The analyzer. Stateless: every call to [`Analyzer::tokenize`] starts a
/// fresh stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer;

impl Analyzer {
    pub fn new() -> Self {
        Self
    }

    /// Tokenize `text` lazily.
    pub fn tokenize<'a>(&self, text: &'a str) -> Tokens<'a> {
        Tokens {
            segments: Segmenter::new(text),
            position: 0,
            expansions: VecDeque::new(),
        }
    }

    /// Distinct term texts of `text`, in first-seen order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for token in self.tokenize(text) {
            if !terms.contains(&token.text) {
                terms.push(token.text);
            }
        }
        terms
    }
}

/// Token stream returned by [`Analyzer::tokenize`].
pub struct Tokens<'a> {
    segments: Segmenter<'a>,
    position: usize,
    expansions: VecDeque<Token>,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if let Some(token) = self.expansions.pop_front() {
            return Some(token);
        }

        let segment = self.segments.next()?;
        let text = segment.text.to_lowercase();
        let position = self.position;
        self.position += 1;

        for term in phonetic::expand(&text) {
            self.expansions.push_back(Token {
                text: term,
                kind: TokenKind::Phonetic,
                position,
                offset_from: segment.offset_from,
                offset_to: segment.offset_to,
            });
        }

        Some(Token {
            text,
            kind: segment.kind,
            position,
            offset_from: segment.offset_from,
            offset_to: segment.offset_to,
        })
    }
}
