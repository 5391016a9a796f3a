//! Sorted term dictionary.
//!
//! The `.dict` file holds an arena with the bytes of every encoded
//! [`TermKey`] followed by a table of fixed-width entries in key order:
//!
//! ```text
//! term_count: u32
//! arena: varint length | bytes
//! entries: term_count x (key_offset u32 | key_len u32 | doc_freq u32 | postings_offset u64)
//! ```
//!
//! Fixed-width entries make exact lookups a binary search over the table
//! without decoding anything, and prefix or range scans a walk from the
//! lower bound.

use std::ops::Bound;

use byteorder::{ByteOrder, LittleEndian};

use crate::analysis::token::Channel;
use crate::error::{GlaiveError, Result};
use crate::segment::term::TermKey;
use crate::segment::write_framed;
use crate::storage::structured::{ByteReader, HEADER_LEN, verify_file};
use crate::storage::traits::{FileBytes, Storage};

/// Magic number of dictionary files ("GDIC").
pub const DICT_MAGIC: u32 = 0x4744_4943;

const ENTRY_LEN: usize = 20;

/// Dictionary statistics of one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermInfo {
    /// Number of documents containing the term, deleted ones included.
    pub doc_freq: u32,
    /// Offset of the posting list in the postings file.
    pub postings_offset: u64,
}

/// Collects dictionary entries in key order and writes the `.dict` file.
#[derive(Debug, Default)]
pub struct TermDictionaryBuilder {
    arena: Vec<u8>,
    entries: Vec<(u32, u32, TermInfo)>,
    last_key: Option<(usize, usize)>,
}

impl TermDictionaryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a term. Keys must arrive in strictly ascending order.
    pub fn insert(&mut self, encoded_key: &[u8], info: TermInfo) -> Result<()> {
        if let Some((start, end)) = self.last_key
            && self.arena[start..end] >= *encoded_key
        {
            return Err(GlaiveError::index(
                "term dictionary keys must be inserted in ascending order",
            ));
        }

        let offset = self.arena.len();
        self.arena.extend_from_slice(encoded_key);
        self.entries
            .push((offset as u32, encoded_key.len() as u32, info));
        self.last_key = Some((offset, self.arena.len()));
        Ok(())
    }

    /// Number of terms added.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no term was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the dictionary file.
    pub fn write(&self, storage: &dyn Storage, file_name: &str) -> Result<u64> {
        if self.arena.len() > u32::MAX as usize {
            return Err(GlaiveError::index("term dictionary arena exceeds 4 GiB"));
        }
        write_framed(storage, file_name, DICT_MAGIC, |writer| {
            writer.write_u32(self.entries.len() as u32)?;
            writer.write_bytes(&self.arena)?;
            for (offset, length, info) in &self.entries {
                writer.write_u32(*offset)?;
                writer.write_u32(*length)?;
                writer.write_u32(info.doc_freq)?;
                writer.write_u64(info.postings_offset)?;
            }
            Ok(())
        })
    }
}

/// Read-only view of a `.dict` file.
#[derive(Debug, Clone)]
pub struct TermDictionary {
    data: FileBytes,
    arena_start: usize,
    entries_start: usize,
    len: usize,
}

impl TermDictionary {
    /// Validate and open a dictionary file.
    pub fn open(file_name: &str, data: FileBytes) -> Result<Self> {
        let (_, body) = verify_file(file_name, &data, DICT_MAGIC, crate::segment::FORMAT_VERSION)?;
        let corrupt = |reason: &str| GlaiveError::corrupt(file_name, reason);

        let mut reader = ByteReader::new(body);
        let len = reader.read_u32().map_err(|_| corrupt("missing term count"))? as usize;
        let arena = reader.read_bytes().map_err(|_| corrupt("truncated arena"))?;
        let arena_start = HEADER_LEN + reader.position() - arena.len();
        let arena_len = arena.len();
        let entries_start = HEADER_LEN + reader.position();

        let table_len = body.len() - reader.position();
        if len.checked_mul(ENTRY_LEN) != Some(table_len) {
            return Err(corrupt("entry table length does not match term count"));
        }

        let dictionary = TermDictionary {
            data,
            arena_start,
            entries_start,
            len,
        };
        for index in 0..len {
            let (offset, length) = dictionary.key_span(index);
            if offset + length > arena_len {
                return Err(corrupt("term key outside of arena"));
            }
        }
        Ok(dictionary)
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the dictionary has no terms.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn entry(&self, index: usize) -> &[u8] {
        let start = self.entries_start + index * ENTRY_LEN;
        &self.data[start..start + ENTRY_LEN]
    }

    fn key_span(&self, index: usize) -> (usize, usize) {
        let entry = self.entry(index);
        (
            LittleEndian::read_u32(&entry[0..4]) as usize,
            LittleEndian::read_u32(&entry[4..8]) as usize,
        )
    }

    /// Encoded key of the `index`-th term.
    pub fn key(&self, index: usize) -> &[u8] {
        let (offset, length) = self.key_span(index);
        let start = self.arena_start + offset;
        &self.data[start..start + length]
    }

    /// Statistics of the `index`-th term.
    pub fn info(&self, index: usize) -> TermInfo {
        let entry = self.entry(index);
        TermInfo {
            doc_freq: LittleEndian::read_u32(&entry[8..12]),
            postings_offset: LittleEndian::read_u64(&entry[12..20]),
        }
    }

    /// Index of the first term whose key is `>= target`.
    pub fn lower_bound(&self, target: &[u8]) -> usize {
        let (mut low, mut high) = (0, self.len);
        while low < high {
            let mid = low + (high - low) / 2;
            if self.key(mid) < target {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low
    }

    /// Exact lookup of an encoded key.
    pub fn get_encoded(&self, encoded_key: &[u8]) -> Option<TermInfo> {
        let index = self.lower_bound(encoded_key);
        (index < self.len && self.key(index) == encoded_key).then(|| self.info(index))
    }

    /// Exact lookup of a term.
    pub fn get(&self, term: &TermKey) -> Option<TermInfo> {
        self.get_encoded(&term.encode())
    }

    /// Terms of `(field, channel)` starting with `prefix`, in order.
    pub fn prefix(&self, field: &str, channel: Channel, prefix: &str) -> TermRange<'_> {
        let scope = TermKey::scope(field, channel);
        let mut lower = scope.clone();
        lower.extend_from_slice(prefix.as_bytes());
        let start = self.lower_bound(&lower);
        TermRange {
            dictionary: self,
            scope_len: scope.len(),
            next: start,
            stop: Stop::Prefix(lower),
        }
    }

    /// Terms of `(field, channel)` whose text lies within the bounds.
    pub fn range(
        &self,
        field: &str,
        channel: Channel,
        lower: Bound<&str>,
        upper: Bound<&str>,
    ) -> TermRange<'_> {
        let scope = TermKey::scope(field, channel);
        let with_scope = |text: &str| {
            let mut key = scope.clone();
            key.extend_from_slice(text.as_bytes());
            key
        };

        let start = match lower {
            Bound::Included(text) => self.lower_bound(&with_scope(text)),
            Bound::Excluded(text) => {
                let key = with_scope(text);
                let index = self.lower_bound(&key);
                if index < self.len && self.key(index) == key.as_slice() {
                    index + 1
                } else {
                    index
                }
            }
            Bound::Unbounded => self.lower_bound(&scope),
        };
        let stop = match upper {
            Bound::Included(text) => Stop::Upper(with_scope(text), true),
            Bound::Excluded(text) => Stop::Upper(with_scope(text), false),
            Bound::Unbounded => Stop::Prefix(scope.clone()),
        };

        TermRange {
            dictionary: self,
            scope_len: scope.len(),
            next: start,
            stop: Stop::Both(Box::new(stop), scope),
        }
    }

    /// All terms in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], TermInfo)> + '_ {
        (0..self.len).map(move |index| (self.key(index), self.info(index)))
    }
}

#[derive(Debug, Clone)]
enum Stop {
    /// Stop at the first key without this prefix.
    Prefix(Vec<u8>),
    /// Stop after (inclusive) or at (exclusive) this key.
    Upper(Vec<u8>, bool),
    /// Both conditions, the second being a prefix.
    Both(Box<Stop>, Vec<u8>),
}

impl Stop {
    fn admits(&self, key: &[u8]) -> bool {
        match self {
            Stop::Prefix(prefix) => key.starts_with(prefix),
            Stop::Upper(upper, true) => key <= upper.as_slice(),
            Stop::Upper(upper, false) => key < upper.as_slice(),
            Stop::Both(inner, prefix) => key.starts_with(prefix) && inner.admits(key),
        }
    }
}

/// Ordered scan over a contiguous run of dictionary terms.
///
/// Yields the term text (without field and channel) and its statistics.
#[derive(Debug, Clone)]
pub struct TermRange<'a> {
    dictionary: &'a TermDictionary,
    scope_len: usize,
    next: usize,
    stop: Stop,
}

impl<'a> Iterator for TermRange<'a> {
    type Item = Result<(&'a str, TermInfo)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.dictionary.len {
            return None;
        }
        let key = self.dictionary.key(self.next);
        if !self.stop.admits(key) {
            self.next = self.dictionary.len;
            return None;
        }
        let info = self.dictionary.info(self.next);
        self.next += 1;
        Some(TermKey::text_of(key, self.scope_len).map(|text| (text, info)))
    }
}
