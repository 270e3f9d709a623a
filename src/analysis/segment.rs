//! Script-aware segmentation: CJK runs go through jieba, everything else
//! splits on whitespace and punctuation.

use std::collections::VecDeque;

use jieba_rs::{Jieba, TokenizeMode};
use once_cell::sync::Lazy;

use super::TokenKind;

/// Global jieba instance; loading the dictionary is expensive.
static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Check if a character belongs to a CJK script (Chinese, Japanese, Korean).
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}' |  // CJK Unified Ideographs
        '\u{3400}'..='\u{4dbf}' |  // CJK Extension A
        '\u{f900}'..='\u{faff}' |  // CJK Compatibility Ideographs
        '\u{3040}'..='\u{309f}' |  // Hiragana
        '\u{30a0}'..='\u{30ff}' |  // Katakana
        '\u{ac00}'..='\u{d7af}'    // Hangul Syllables
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Cjk,
    Word,
    Separator,
}

fn classify(c: char) -> CharClass {
    if is_cjk(c) {
        CharClass::Cjk
    } else if c.is_alphanumeric() {
        CharClass::Word
    } else {
        CharClass::Separator
    }
}

/// A slice of the input text produced by segmentation, with byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub kind: TokenKind,
    pub offset_from: usize,
    pub offset_to: usize,
}

/// Lazily walks `text`, yielding one segment per word. A CJK run is only
/// segmented when the walk reaches it.
pub struct Segmenter<'a> {
    text: &'a str,
    cursor: usize,
    pending: VecDeque<Segment<'a>>,
}

impl<'a> Segmenter<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            cursor: 0,
            pending: VecDeque::new(),
        }
    }

    /// Byte range `[start, end)` of the next run of non-separator characters
    /// sharing one class, or `None` at end of input.
    fn next_run(&mut self) -> Option<(CharClass, usize, usize)> {
        let rest = &self.text[self.cursor..];
        let (skip, first) = rest
            .char_indices()
            .find(|(_, c)| classify(*c) != CharClass::Separator)?;

        let start = self.cursor + skip;
        let class = classify(first);
        let end = self.text[start..]
            .char_indices()
            .find(|(_, c)| classify(*c) != class)
            .map(|(i, _)| start + i)
            .unwrap_or(self.text.len());

        self.cursor = end;
        Some((class, start, end))
    }

    fn segment_cjk(&mut self, start: usize, end: usize) {
        let run = &self.text[start..end];
        // jieba reports char positions; map them back to byte offsets.
        let byte_at: Vec<usize> = run
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(run.len()))
            .collect();

        for word in JIEBA.tokenize(run, TokenizeMode::Search, true) {
            let (Some(&from), Some(&to)) = (byte_at.get(word.start), byte_at.get(word.end))
            else {
                continue;
            };
            if from >= to {
                continue;
            }
            self.pending.push_back(Segment {
                text: &run[from..to],
                kind: TokenKind::Cjk,
                offset_from: start + from,
                offset_to: start + to,
            });
        }
    }
}

impl<'a> Iterator for Segmenter<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        loop {
            if let Some(segment) = self.pending.pop_front() {
                return Some(segment);
            }

            let (class, start, end) = self.next_run()?;
            match class {
                CharClass::Word => {
                    return Some(Segment {
                        text: &self.text[start..end],
                        kind: TokenKind::Alphanumeric,
                        offset_from: start,
                        offset_to: end,
                    });
                }
                CharClass::Cjk => self.segment_cjk(start, end),
                CharClass::Separator => unreachable!("next_run never yields separators"),
            }
        }
    }
}
