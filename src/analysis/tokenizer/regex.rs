//! Regex-based tokenizer implementation.

use std::sync::Arc;

use regex::Regex;

use super::Tokenizer;
use crate::analysis::token::{Token, TokenStream};
use crate::error::{GlaiveError, Result};

/// A regex-based tokenizer that extracts tokens using regular expressions.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    /// The regex pattern used to extract tokens
    pattern: Arc<Regex>,
    /// Whether to extract gaps (text between matches) instead of matches
    gaps: bool,
}

impl RegexTokenizer {
    /// Create a new regex tokenizer with the default pattern `\w+`.
    pub fn new() -> Result<Self> {
        Self::with_pattern(r"\w+")
    }

    /// Create a new regex tokenizer with a custom pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| GlaiveError::analysis(format!("Invalid regex pattern: {e}")))?;

        Ok(RegexTokenizer {
            pattern: Arc::new(regex),
            gaps: false,
        })
    }

    /// Create a tokenizer that extracts gaps (text between matches) instead of matches.
    pub fn with_gaps(pattern: &str) -> Result<Self> {
        let mut tokenizer = Self::with_pattern(pattern)?;
        tokenizer.gaps = true;
        Ok(tokenizer)
    }

    /// Get the regex pattern used by this tokenizer.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Check if this tokenizer extracts gaps.
    pub fn gaps(&self) -> bool {
        self.gaps
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Result<TokenStream<'a>> {
        Ok(Box::new(RegexTokens {
            regex: Arc::clone(&self.pattern),
            text,
            gaps: self.gaps,
            gap_start: 0,
            search_from: 0,
            position: 0,
            done: false,
        }))
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}

struct RegexTokens<'a> {
    regex: Arc<Regex>,
    text: &'a str,
    gaps: bool,
    gap_start: usize,
    search_from: usize,
    position: u32,
    done: bool,
}

impl RegexTokens<'_> {
    fn emit(&mut self, start: usize, end: usize) -> Token {
        let token = Token::with_offsets(&self.text[start..end], self.position, start, end);
        self.position += 1;
        token
    }

    /// Next non-empty match, stepping over empty ones.
    fn next_match(&mut self) -> Option<(usize, usize)> {
        loop {
            let found = self.regex.find_at(self.text, self.search_from)?;
            if found.start() < found.end() {
                self.search_from = found.end();
                return Some((found.start(), found.end()));
            }
            let step = self.text[found.end()..].chars().next()?.len_utf8();
            self.search_from = found.end() + step;
        }
    }
}

impl Iterator for RegexTokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        while !self.done {
            match self.next_match() {
                Some((start, end)) if self.gaps => {
                    let gap_start = std::mem::replace(&mut self.gap_start, end);
                    if start > gap_start {
                        return Some(self.emit(gap_start, start));
                    }
                }
                Some((start, end)) => return Some(self.emit(start, end)),
                None => {
                    self.done = true;
                    if self.gaps && self.gap_start < self.text.len() {
                        return Some(self.emit(self.gap_start, self.text.len()));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_tokenizer() {
        let tokenizer = RegexTokenizer::new().unwrap();
        let tokens: Vec<Token> = tokenizer.tokenize("hello world").unwrap().collect();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].start_offset, 6);
        assert_eq!(tokens[1].end_offset, 11);
    }

    #[test]
    fn test_gaps() {
        let tokenizer = RegexTokenizer::with_gaps(r"[,;]\s*").unwrap();
        let tokens: Vec<String> = tokenizer
            .tokenize("red, green;blue")
            .unwrap()
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["red", "green", "blue"]);
    }

    #[test]
    fn test_empty_matches_are_skipped() {
        let tokenizer = RegexTokenizer::with_pattern(r"\d*").unwrap();
        let tokens: Vec<String> = tokenizer
            .tokenize("a12b3é")
            .unwrap()
            .map(|t| t.text)
            .collect();
        assert_eq!(tokens, vec!["12", "3"]);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(RegexTokenizer::with_pattern("(").is_err());
    }
}
