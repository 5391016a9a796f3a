//! Token types for text analysis.
//!
//! A [`Token`] is the unit flowing through an analysis pipeline. Tokenizers
//! assign every token an absolute `position`; filters keep it, so a dropped
//! stop word leaves a gap and two tokens emitted for the same input word
//! share one position.
//!
//! ```
//! use glaive::analysis::token::{Channel, Token};
//!
//! let token = Token::with_offsets("world", 1, 6, 11);
//! assert_eq!(token.position, 1);
//! assert_eq!(token.channel, Channel::Main);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Term channel of a token.
///
/// Stemmed (or otherwise normalized) forms live on the main channel. The
/// surface channel carries the unstemmed form so that prefix queries match
/// what the user actually typed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Normalized form used by term and phrase queries.
    Main,
    /// Unstemmed form used by prefix queries.
    Surface,
}

impl Channel {
    /// Stable one-byte tag used in the term dictionary.
    pub fn tag(self) -> u8 {
        match self {
            Channel::Main => 0,
            Channel::Surface => 1,
        }
    }

    /// Inverse of [`Channel::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Channel::Main),
            1 => Some(Channel::Surface),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Main => f.write_str("main"),
            Channel::Surface => f.write_str("surface"),
        }
    }
}

/// A token represents a single unit of text after tokenization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token.
    pub text: String,

    /// Position of the token in the field (0-based).
    pub position: u32,

    /// Byte offset where this token starts in the original text.
    pub start_offset: usize,

    /// Byte offset where this token ends in the original text.
    pub end_offset: usize,

    /// Channel the token is indexed on.
    pub channel: Channel,
}

impl Token {
    /// Create a main-channel token without offsets.
    pub fn new<S: Into<String>>(text: S, position: u32) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset: 0,
            end_offset: 0,
            channel: Channel::Main,
        }
    }

    /// Create a main-channel token with byte offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: u32,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
            channel: Channel::Main,
        }
    }

    /// Same token with different text.
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    /// Same token on another channel.
    pub fn on_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// An empty token at the same position and offsets.
    ///
    /// Stands in for a token a stage failed to process; indexers skip it.
    pub fn emptied(&self) -> Self {
        Token {
            text: String::new(),
            position: self.position,
            start_offset: self.start_offset,
            end_offset: self.end_offset,
            channel: self.channel,
        }
    }

    /// Whether the token has no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.text, self.position)
    }
}

/// A lazy stream of tokens borrowing the analyzed text.
pub type TokenStream<'a> = Box<dyn Iterator<Item = Token> + Send + 'a>;
