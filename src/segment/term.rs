//! Term keys of the dictionary.
//!
//! A term is `(field, channel, text)`. The dictionary stores it as
//! `field 0x00 channel-tag text`, which sorts by field, then channel, then
//! text, so every `(field, channel)` pair occupies one contiguous range and
//! prefix or range scans reduce to byte range scans.

use std::fmt;

use crate::analysis::token::Channel;
use crate::error::{GlaiveError, Result};

const FIELD_TERMINATOR: u8 = 0;

/// A fully qualified term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermKey {
    /// Field the term was indexed in.
    pub field: String,
    /// Channel the term was indexed on.
    pub channel: Channel,
    /// Term text after analysis.
    pub text: String,
}

impl TermKey {
    /// Create a term key.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, channel: Channel, text: T) -> Self {
        TermKey {
            field: field.into(),
            channel,
            text: text.into(),
        }
    }

    /// A main-channel term.
    pub fn main<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        Self::new(field, Channel::Main, text)
    }

    /// Encoded dictionary key.
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Self::scope(&self.field, self.channel);
        key.extend_from_slice(self.text.as_bytes());
        key
    }

    /// Decode a dictionary key.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let split = bytes
            .iter()
            .position(|&b| b == FIELD_TERMINATOR)
            .ok_or_else(|| GlaiveError::serialization("term key without field terminator"))?;
        let field = std::str::from_utf8(&bytes[..split])
            .map_err(|e| GlaiveError::serialization(format!("Invalid field name: {e}")))?;
        let channel = bytes
            .get(split + 1)
            .and_then(|&tag| Channel::from_tag(tag))
            .ok_or_else(|| GlaiveError::serialization("term key with unknown channel"))?;
        let text = std::str::from_utf8(&bytes[split + 2..])
            .map_err(|e| GlaiveError::serialization(format!("Invalid term text: {e}")))?;
        Ok(TermKey::new(field, channel, text))
    }

    /// Key prefix shared by all terms of `(field, channel)`.
    pub fn scope(field: &str, channel: Channel) -> Vec<u8> {
        let mut key = Vec::with_capacity(field.len() + 2);
        key.extend_from_slice(field.as_bytes());
        key.push(FIELD_TERMINATOR);
        key.push(channel.tag());
        key
    }

    /// Text part of an encoded key, given the length of its scope.
    pub fn text_of(encoded: &[u8], scope_len: usize) -> Result<&str> {
        std::str::from_utf8(encoded.get(scope_len..).unwrap_or_default())
            .map_err(|e| GlaiveError::serialization(format!("Invalid term text: {e}")))
    }
}

/// Check that a field name can be used in a term key.
pub fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GlaiveError::index("field name must not be empty"));
    }
    if name.as_bytes().contains(&FIELD_TERMINATOR) {
        return Err(GlaiveError::index(format!(
            "field name {name:?} contains a NUL byte"
        )));
    }
    Ok(())
}

impl fmt::Display for TermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Channel::Main => write!(f, "{}:{}", self.field, self.text),
            Channel::Surface => write!(f, "{}:~{}", self.field, self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_order_matches_key_order() {
        let mut keys = vec![
            TermKey::new("title", Channel::Surface, "a"),
            TermKey::main("body", "quick"),
            TermKey::main("title", "ab"),
            TermKey::main("title", "a"),
            TermKey::main("bod", "zzz"),
        ];
        let mut encoded: Vec<Vec<u8>> = keys.iter().map(TermKey::encode).collect();
        keys.sort();
        encoded.sort();

        let decoded: Vec<TermKey> = encoded
            .iter()
            .map(|bytes| TermKey::decode(bytes).unwrap())
            .collect();
        assert_eq!(decoded, keys);
    }

    #[test]
    fn test_scope_is_prefix() {
        let key = TermKey::new("body", Channel::Surface, "running");
        let scope = TermKey::scope("body", Channel::Surface);
        let encoded = key.encode();
        assert!(encoded.starts_with(&scope));
        assert_eq!(TermKey::text_of(&encoded, scope.len()).unwrap(), "running");
    }

    #[test]
    fn test_field_names() {
        assert!(validate_field_name("body").is_ok());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name("a\0b").is_err());
    }
}
