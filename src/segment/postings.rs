//! Postings lists with positions.
//!
//! Each term's list in the `.post` file is laid out as
//!
//! ```text
//! doc_count: varint
//! doc_count x (doc_delta: varint | freq: varint | positions: varint length | position deltas)
//! ```
//!
//! The positions block is length-prefixed so that iteration and `skip_to`
//! step over it without decoding; positions are only decoded when a phrase
//! matcher asks for them. Iterators decode one posting at a time straight
//! from the loaded file bytes.

use crate::error::{GlaiveError, Result};
use crate::segment::dictionary::TermInfo;
use crate::segment::{DocId, FORMAT_VERSION, TERMINATED};
use crate::storage::structured::{StructWriter, TRAILER_LEN, verify_file};
use crate::storage::traits::{FileBytes, Storage, StorageOutput};
use crate::util::varint::{decode_u64, write_u64};

/// Magic number of postings files ("GPST").
pub const POSTINGS_MAGIC: u32 = 0x4750_5354;

/// One document's occurrences of a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Document containing the term.
    pub doc_id: DocId,
    /// Ascending token positions; the term frequency is their count.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting.
    pub fn new(doc_id: DocId, positions: Vec<u32>) -> Self {
        Posting { doc_id, positions }
    }

    /// Term frequency within the document.
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Streams posting lists into a `.post` file.
pub struct PostingsWriter {
    writer: StructWriter<Box<dyn StorageOutput>>,
    scratch: Vec<u8>,
}

impl PostingsWriter {
    /// Create the postings file.
    pub fn create(storage: &dyn Storage, file_name: &str) -> Result<Self> {
        let output = storage.create_output(file_name)?;
        Ok(PostingsWriter {
            writer: StructWriter::with_header(output, POSTINGS_MAGIC, FORMAT_VERSION)?,
            scratch: Vec::new(),
        })
    }

    /// Append one term's postings, which must be sorted by doc id.
    ///
    /// Returns the dictionary entry for the list.
    pub fn write_term(&mut self, postings: &[Posting]) -> Result<TermInfo> {
        let offset = self.writer.position();
        self.writer.write_varint(postings.len() as u64)?;

        let mut previous: Option<DocId> = None;
        for posting in postings {
            let delta = match previous {
                None => posting.doc_id,
                Some(prev) if posting.doc_id > prev => posting.doc_id - prev,
                Some(prev) => {
                    return Err(GlaiveError::index(format!(
                        "postings out of order: doc {} after {prev}",
                        posting.doc_id
                    )));
                }
            };
            previous = Some(posting.doc_id);

            self.writer.write_varint(delta as u64)?;
            self.writer.write_varint(posting.frequency() as u64)?;

            self.scratch.clear();
            let mut last = 0u32;
            for &position in &posting.positions {
                write_u64(&mut self.scratch, position.saturating_sub(last) as u64)?;
                last = position;
            }
            self.writer.write_bytes(&self.scratch)?;
        }

        Ok(TermInfo {
            doc_freq: postings.len() as u32,
            postings_offset: offset,
        })
    }

    /// Seal the file.
    pub fn finish(self) -> Result<()> {
        let mut output = self.writer.finish()?;
        output.close()
    }
}

/// Read-only view of a `.post` file.
#[derive(Debug, Clone)]
pub struct PostingsFile {
    data: FileBytes,
}

impl PostingsFile {
    /// Validate and open a postings file.
    pub fn open(file_name: &str, data: FileBytes) -> Result<Self> {
        verify_file(file_name, &data, POSTINGS_MAGIC, FORMAT_VERSION)?;
        Ok(PostingsFile { data })
    }

    /// Iterator over the list described by `info`.
    pub fn iterator(&self, info: TermInfo) -> Result<PostingsIterator> {
        PostingsIterator::new(self.data.clone(), info.postings_offset as usize)
    }

    /// Decode a whole list.
    pub fn read_all(&self, info: TermInfo) -> Result<Vec<Posting>> {
        let mut iterator = self.iterator(info)?;
        let mut postings = Vec::with_capacity(info.doc_freq as usize);
        while !iterator.is_exhausted() {
            postings.push(Posting::new(iterator.doc_id(), iterator.positions()?));
            iterator.next()?;
        }
        Ok(postings)
    }
}

/// Lazy cursor over one posting list.
///
/// Positioned on the first posting when created; [`PostingsIterator::doc_id`]
/// returns [`TERMINATED`] once the list is exhausted.
#[derive(Debug, Clone)]
pub struct PostingsIterator {
    data: FileBytes,
    cursor: usize,
    end: usize,
    remaining: u32,
    doc_freq: u32,
    doc: DocId,
    freq: u32,
    positions: (usize, usize),
}

impl PostingsIterator {
    fn new(data: FileBytes, offset: usize) -> Result<Self> {
        let end = data.len().saturating_sub(TRAILER_LEN);
        let mut iterator = PostingsIterator {
            data,
            cursor: offset,
            end,
            remaining: 0,
            doc_freq: 0,
            doc: 0,
            freq: 0,
            positions: (0, 0),
        };
        let doc_freq = iterator.read_varint()? as u32;
        iterator.doc_freq = doc_freq;
        iterator.remaining = doc_freq;
        iterator.advance(true)?;
        Ok(iterator)
    }

    fn read_varint(&mut self) -> Result<u64> {
        if self.cursor >= self.end {
            return Err(GlaiveError::serialization("posting list runs past end of file"));
        }
        let (value, consumed) = decode_u64(&self.data[self.cursor..self.end])?;
        self.cursor += consumed;
        Ok(value)
    }

    fn advance(&mut self, first: bool) -> Result<bool> {
        if self.remaining == 0 {
            self.doc = TERMINATED;
            return Ok(false);
        }
        self.remaining -= 1;

        let delta = self.read_varint()? as DocId;
        self.doc = if first { delta } else { self.doc + delta };
        self.freq = self.read_varint()? as u32;
        let length = self.read_varint()? as usize;
        let start = self.cursor;
        if start + length > self.end {
            return Err(GlaiveError::serialization("positions run past end of file"));
        }
        self.positions = (start, start + length);
        self.cursor = start + length;
        Ok(true)
    }

    /// Current document, or [`TERMINATED`].
    pub fn doc_id(&self) -> DocId {
        self.doc
    }

    /// Move to the next posting.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<bool> {
        if self.is_exhausted() {
            return Ok(false);
        }
        self.advance(false)
    }

    /// Move to the first posting with doc id `>= target`.
    pub fn skip_to(&mut self, target: DocId) -> Result<bool> {
        while !self.is_exhausted() && self.doc < target {
            self.advance(false)?;
        }
        Ok(!self.is_exhausted())
    }

    /// Whether the list is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.doc == TERMINATED
    }

    /// Term frequency in the current document.
    pub fn term_freq(&self) -> u32 {
        if self.is_exhausted() { 0 } else { self.freq }
    }

    /// Number of documents in the list.
    pub fn doc_freq(&self) -> u32 {
        self.doc_freq
    }

    /// Decode the positions of the current posting.
    pub fn positions(&self) -> Result<Vec<u32>> {
        let (start, end) = self.positions;
        let mut positions = Vec::with_capacity(self.freq as usize);
        let mut cursor = start;
        let mut last = 0u32;
        while cursor < end {
            let (delta, consumed) = decode_u64(&self.data[cursor..end])?;
            cursor += consumed;
            last += delta as u32;
            positions.push(last);
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    fn write(lists: &[Vec<Posting>]) -> (PostingsFile, Vec<TermInfo>) {
        let storage = MemoryStorage::new();
        let mut writer = PostingsWriter::create(&storage, "t.post").unwrap();
        let infos: Vec<TermInfo> = lists.iter().map(|l| writer.write_term(l).unwrap()).collect();
        writer.finish().unwrap();
        let file = PostingsFile::open("t.post", storage.read_file("t.post").unwrap()).unwrap();
        (file, infos)
    }

    #[test]
    fn test_iterate_with_positions() {
        let list = vec![
            Posting::new(0, vec![1, 4]),
            Posting::new(3, vec![0]),
            Posting::new(9, vec![2, 3, 10]),
        ];
        let (file, infos) = write(&[vec![Posting::new(5, vec![0])], list.clone()]);
        assert_eq!(infos[1].doc_freq, 3);

        let mut iterator = file.iterator(infos[1]).unwrap();
        assert_eq!(iterator.doc_id(), 0);
        assert_eq!(iterator.term_freq(), 2);
        assert_eq!(iterator.positions().unwrap(), vec![1, 4]);
        assert!(iterator.next().unwrap());
        assert_eq!(iterator.doc_id(), 3);
        assert!(iterator.next().unwrap());
        assert_eq!(iterator.positions().unwrap(), vec![2, 3, 10]);
        assert!(!iterator.next().unwrap());
        assert_eq!(iterator.doc_id(), TERMINATED);

        assert_eq!(file.read_all(infos[1]).unwrap(), list);
    }

    #[test]
    fn test_skip_to() {
        let list: Vec<Posting> = (0..100).map(|d| Posting::new(d * 2, vec![0])).collect();
        let (file, infos) = write(&[list]);

        let mut iterator = file.iterator(infos[0]).unwrap();
        assert!(iterator.skip_to(51).unwrap());
        assert_eq!(iterator.doc_id(), 52);
        assert!(iterator.skip_to(52).unwrap());
        assert_eq!(iterator.doc_id(), 52);
        assert!(!iterator.skip_to(1000).unwrap());
        assert!(iterator.is_exhausted());
        assert_eq!(iterator.term_freq(), 0);
    }

    #[test]
    fn test_unsorted_postings_rejected() {
        let storage = MemoryStorage::new();
        let mut writer = PostingsWriter::create(&storage, "bad.post").unwrap();
        let result = writer.write_term(&[Posting::new(4, vec![0]), Posting::new(4, vec![1])]);
        assert!(result.is_err());
    }
}
