//! Error type for tree-text parsing.
//!
//! A [ParseError] carries the offending character index and a window of
//! surrounding text so the operator can locate the problem in long trees.

use std::error::Error;
use std::fmt;

/// Number of characters shown on either side of the error position
const CONTEXT_RADIUS: usize = 20;

/// What went wrong while reading tree text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// `(` appeared after label text had started.
    OpenAfterLabel,
    /// A second `[` for a node that already has a comment.
    DuplicateComment,
    /// `[` inside an open comment.
    NestedComment,
    /// A quote where a quoted name cannot start.
    MisplacedQuote,
    /// Clade stack does not return to the root.
    UnbalancedParentheses,
    UnterminatedQuote,
    UnterminatedComment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    position: usize,
    character: Option<char>,
    before: String,
    after: String,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, position: usize, character: Option<char>) -> Self {
        Self {
            kind,
            position,
            character,
            before: String::new(),
            after: String::new(),
        }
    }

    /// Fill the context window from the full input text.
    pub(crate) fn with_context(mut self, text: &[char]) -> Self {
        let start = self.position.saturating_sub(CONTEXT_RADIUS);
        let end = (self.position + CONTEXT_RADIUS).min(text.len());
        let split = (self.position + 1).min(text.len());
        self.before = text[start.min(split)..split].iter().collect();
        self.after = text[split..end.max(split)].iter().collect();
        if self.character.is_none() {
            self.character = text.get(self.position).copied();
        }
        self
    }

    pub fn kind(&self) -> &ParseErrorKind {
        &self.kind
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Text around the error with the marker inserted after the bad character.
    pub fn context(&self) -> String {
        format!("{}[ERROR HERE]{}", self.before, self.after)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.character {
            Some(c) => write!(f, "Unexpected '{}' in '{}'", c, self.context())?,
            None => write!(f, "Unexpected end of input in '{}'", self.context())?,
        }
        let reason = match self.kind {
            ParseErrorKind::OpenAfterLabel => "'(' after label text",
            ParseErrorKind::DuplicateComment => "node already has a comment",
            ParseErrorKind::NestedComment => "nested comment",
            ParseErrorKind::MisplacedQuote => "quote inside a label",
            ParseErrorKind::UnbalancedParentheses => "unbalanced parentheses",
            ParseErrorKind::UnterminatedQuote => "unterminated quoted name",
            ParseErrorKind::UnterminatedComment => "unterminated comment",
        };
        write!(f, " ({} at position {})", reason, self.position)
    }
}

impl Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_window_is_clamped() {
        let text: Vec<char> = "(a,b)(".chars().collect();
        let err = ParseError::new(ParseErrorKind::OpenAfterLabel, 5, None).with_context(&text);
        assert_eq!(err.context(), "(a,b)([ERROR HERE]");
        assert!(err.to_string().starts_with("Unexpected '(' in"));
    }

    #[test]
    fn test_context_window_radius() {
        let text: Vec<char> = "x".repeat(30).chars().chain("!".chars()).chain("y".repeat(30).chars()).collect();
        let err = ParseError::new(ParseErrorKind::MisplacedQuote, 30, None).with_context(&text);
        assert_eq!(err.context(), format!("{}![ERROR HERE]{}", "x".repeat(20), "y".repeat(19)));
        assert_eq!(err.position(), 30);
    }
}
