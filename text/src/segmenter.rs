//! Paragraph and sentence segmentation.
//!
//! The chunker and the summarizer only see the [`Segmenter`] trait, so the
//! regex heuristics here can be swapped for a model-based segmenter without
//! touching how segments are combined.

use regex_lite::Regex;

use crate::error::{Result, TextError};

/// Blank line, optionally holding spaces or tabs, plus any following whitespace.
const PARAGRAPH_BREAK: &str = r"\n[ \t]*\n\s*";

/// Terminal punctuation, optional closing quote or bracket, then whitespace.
///
/// No abbreviation handling: "e.g. this" splits after "e.g.".
const SENTENCE_BREAK: &str = r#"[.!?]+["')\]]*\s+"#;

/// Splits text into paragraphs and sentences.
pub trait Segmenter: Send + Sync {
    /// Non-empty, trimmed paragraphs in document order.
    fn paragraphs<'a>(&self, text: &'a str) -> Vec<&'a str>;

    /// Non-empty, trimmed sentences in document order. Punctuation stays
    /// with its sentence.
    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str>;

    /// Byte offset just past the first paragraph or sentence break in
    /// `text`, whichever comes first.
    fn next_boundary(&self, text: &str) -> Option<usize>;
}

/// Punctuation and blank-line heuristics.
#[derive(Debug, Clone)]
pub struct RegexSegmenter {
    paragraph: Regex,
    sentence: Regex,
}

impl RegexSegmenter {
    pub fn new() -> Result<Self> {
        Self::with_patterns(PARAGRAPH_BREAK, SENTENCE_BREAK)
    }

    /// Use custom break patterns. Each match is treated as a separator.
    pub fn with_patterns(paragraph: &str, sentence: &str) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| TextError::InvalidConfig(format!("bad pattern {pattern:?}: {e}")))
        };
        Ok(Self {
            paragraph: compile(paragraph)?,
            sentence: compile(sentence)?,
        })
    }
}

impl Segmenter for RegexSegmenter {
    fn paragraphs<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.paragraph
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut sentences = Vec::new();
        let mut start = 0;
        for m in self.sentence.find_iter(text) {
            sentences.push(text[start..m.end()].trim());
            start = m.end();
        }
        sentences.push(text[start..].trim());
        sentences.retain(|s| !s.is_empty());
        sentences
    }

    fn next_boundary(&self, text: &str) -> Option<usize> {
        let paragraph = self.paragraph.find(text).map(|m| m.end());
        let sentence = self.sentence.find(text).map(|m| m.end());
        match (paragraph, sentence) {
            (Some(p), Some(s)) => Some(p.min(s)),
            (p, s) => p.or(s),
        }
    }
}

/// Largest char boundary of `text` at or below `index`.
pub(crate) fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest char boundary of `text` at or above `index`.
pub(crate) fn ceil_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segmenter() -> RegexSegmenter {
        RegexSegmenter::new().unwrap()
    }

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        let text = "First line\nstill first.\n\n  \nSecond.\n \t\nThird.\n\n";
        assert_eq!(
            segmenter().paragraphs(text),
            vec!["First line\nstill first.", "Second.", "Third."]
        );
    }

    #[test]
    fn test_sentences_keep_punctuation() {
        let text = "Is it? Yes! It is. \"Quoted.\" Trailing";
        assert_eq!(
            segmenter().sentences(text),
            vec!["Is it?", "Yes!", "It is.", "\"Quoted.\"", "Trailing"]
        );
    }

    #[test]
    fn test_abbreviations_are_not_special() {
        assert_eq!(
            segmenter().sentences("Use e.g. this one."),
            vec!["Use e.g.", "this one."]
        );
    }

    #[test]
    fn test_next_boundary_prefers_earliest_break() {
        let s = segmenter();
        assert_eq!(s.next_boundary("abc. def\n\nghi"), Some(5));
        assert_eq!(s.next_boundary("abc\n\ndef. ghi"), Some(5));
        assert_eq!(s.next_boundary("no break here"), None);
    }

    #[test]
    fn test_char_boundaries() {
        let text = "aé";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(ceil_char_boundary(text, 2), 3);
        assert_eq!(floor_char_boundary(text, 10), 3);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = RegexSegmenter::with_patterns("(", r"\.").unwrap_err();
        assert!(matches!(err, TextError::InvalidConfig(_)));
    }
}
