//! Core analyzer trait definition.
//!
//! ```text
//! Raw Text → Tokenizer → Filter 1 → ... → Filter N → Token Stream → Index
//! ```

use log::warn;

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// Trait for analyzers that convert text into processed tokens.
///
/// Every call to [`analyze`](Self::analyze) starts a fresh, independent
/// stream, so the same text can be analyzed again at any time.
pub trait Analyzer: Send + Sync {
    /// Analyze the given text and return a lazy stream of tokens.
    fn analyze<'a>(&self, text: &'a str) -> Result<TokenStream<'a>>;

    /// Analyze raw bytes that should hold UTF-8.
    ///
    /// Malformed sequences are replaced by U+FFFD before analysis; stages
    /// that cannot handle such tokens turn them into empty tokens.
    fn analyze_bytes(&self, bytes: &[u8]) -> Result<Vec<Token>> {
        let text = String::from_utf8_lossy(bytes);
        if text.contains(char::REPLACEMENT_CHARACTER) {
            warn!("Analyzing {} bytes of malformed UTF-8", bytes.len());
        }
        Ok(self.analyze(&text)?.collect())
    }

    /// Get the name of this analyzer (for debugging and configuration).
    fn name(&self) -> &str;

    /// Whether the analyzer emits surface-channel tokens.
    fn has_surface_channel(&self) -> bool {
        false
    }
}
