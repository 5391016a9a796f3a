//! The writer's in-memory segment.
//!
//! Documents are analyzed as they are added and their postings appended to
//! per-term lists; doc ids are handed out in insertion order, so every list
//! stays sorted without further work. [`SegmentBuilder::flush`] seals the
//! buffer into an immutable on-disk segment.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::analyzer::per_field::PerFieldAnalyzer;
use crate::analysis::token::Channel;
use crate::document::document::Document;
use crate::document::field::IndexPolicy;
use crate::document::field_value::FieldValue;
use crate::error::{GlaiveError, Result};
use crate::segment::doc_values::DocValuesWriter;
use crate::segment::field_lengths::FieldLengthsWriter;
use crate::segment::meta::{FieldInfo, SegmentInfo, SegmentSource};
use crate::segment::postings::Posting;
use crate::segment::stored::StoredFields;
use crate::segment::term::{TermKey, validate_field_name};
use crate::segment::writer::write_segment;
use crate::segment::DocId;
use crate::storage::traits::Storage;

/// Terms of one document before they are merged into the builder.
#[derive(Default)]
struct DocumentTerms {
    positions: AHashMap<Vec<u8>, Vec<u32>>,
    lengths: BTreeMap<String, u32>,
    surface_fields: Vec<String>,
    verbatim_fields: Vec<String>,
}

fn mark(fields: &mut Vec<String>, name: &str) {
    if !fields.iter().any(|f| f == name) {
        fields.push(name.to_string());
    }
}

/// Mutable segment that buffers documents until flushed.
pub struct SegmentBuilder {
    analyzer: Arc<PerFieldAnalyzer>,
    terms: AHashMap<Vec<u8>, Vec<Posting>>,
    stored: Vec<StoredFields>,
    lengths: FieldLengthsWriter,
    doc_values: DocValuesWriter,
    fields: BTreeMap<String, FieldInfo>,
    next_doc: DocId,
}

impl SegmentBuilder {
    /// Create an empty builder analyzing text with `analyzer`.
    pub fn new(analyzer: Arc<PerFieldAnalyzer>) -> Self {
        SegmentBuilder {
            analyzer,
            terms: AHashMap::new(),
            stored: Vec::new(),
            lengths: FieldLengthsWriter::new(),
            doc_values: DocValuesWriter::new(),
            fields: BTreeMap::new(),
            next_doc: 0,
        }
    }

    /// Number of buffered documents.
    pub fn num_docs(&self) -> u32 {
        self.next_doc
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.next_doc == 0
    }

    /// Number of distinct buffered terms.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// The analyzer used for text fields.
    pub fn analyzer(&self) -> &Arc<PerFieldAnalyzer> {
        &self.analyzer
    }

    /// Analyze and buffer a document, returning its local doc id.
    ///
    /// The builder is left untouched when the document is rejected.
    pub fn add_document(&mut self, document: &Document) -> Result<DocId> {
        if self.next_doc == DocId::MAX - 1 {
            return Err(GlaiveError::index("segment is full"));
        }
        let field_infos = self.check_fields(document)?;
        let doc_terms = self.analyze(document)?;

        let doc_id = self.next_doc;
        for (key, positions) in doc_terms.positions {
            self.terms
                .entry(key)
                .or_default()
                .push(Posting::new(doc_id, positions));
        }
        for (field, length) in &doc_terms.lengths {
            self.lengths.add(doc_id, field, *length);
        }
        for (field, mut info) in field_infos {
            info.has_surface = doc_terms.surface_fields.contains(&field);
            info.verbatim = doc_terms.verbatim_fields.contains(&field);
            match self.fields.get_mut(&field) {
                // types were checked above, so this only combines flags
                Some(existing) => existing.merge(&field, &info)?,
                None => {
                    self.fields.insert(field, info);
                }
            }
        }

        let mut stored = StoredFields::new();
        for field in document.fields() {
            self.doc_values.add(doc_id, &field.name, &field.value);
            if field.stored {
                stored.push(field.name.clone(), field.value.clone());
            }
        }
        self.stored.push(stored);

        self.next_doc += 1;
        Ok(doc_id)
    }

    /// Check names and value types, returning the infos of the document's
    /// fields.
    fn check_fields(&self, document: &Document) -> Result<BTreeMap<String, FieldInfo>> {
        let mut infos: BTreeMap<String, FieldInfo> = BTreeMap::new();
        for field in document.fields() {
            validate_field_name(&field.name)?;
            let value_type = field.value.value_type();
            let known = infos
                .get(&field.name)
                .or_else(|| self.fields.get(&field.name))
                .map(|info| info.value_type);
            if let Some(known) = known
                && known != value_type
            {
                return Err(GlaiveError::index(format!(
                    "field {} holds {known} values, got {value_type}",
                    field.name
                )));
            }
            let info = infos.entry(field.name.clone()).or_insert(FieldInfo {
                value_type,
                indexed: false,
                has_surface: false,
                verbatim: false,
            });
            info.indexed |= field.is_indexed();
        }
        Ok(infos)
    }

    fn analyze(&self, document: &Document) -> Result<DocumentTerms> {
        let mut doc_terms = DocumentTerms::default();
        let mut next_position: AHashMap<&str, u32> = AHashMap::new();

        for field in document.fields() {
            let base = next_position.get(field.name.as_str()).copied().unwrap_or(0);
            let mut last = None;

            match (&field.policy, &field.value) {
                (IndexPolicy::StoredOnly, _) => continue,
                (IndexPolicy::Analyzed, FieldValue::Text(text)) => {
                    let mut length = 0;
                    for token in self.analyzer.analyze_field(&field.name, text)? {
                        if token.is_empty() {
                            continue;
                        }
                        let position = base + token.position;
                        last = Some(last.map_or(position, |l: u32| l.max(position)));
                        match token.channel {
                            Channel::Main => length += 1,
                            Channel::Surface => mark(&mut doc_terms.surface_fields, &field.name),
                        }
                        let key = TermKey::new(field.name.as_str(), token.channel, token.text);
                        doc_terms
                            .positions
                            .entry(key.encode())
                            .or_default()
                            .push(position);
                    }
                    if length > 0 && !self.analyzer.field_has_surface_channel(&field.name) {
                        mark(&mut doc_terms.verbatim_fields, &field.name);
                    }
                    *doc_terms.lengths.entry(field.name.clone()).or_default() += length;
                }
                (_, value) => {
                    let key = TermKey::main(field.name.as_str(), value.canonical_key());
                    doc_terms
                        .positions
                        .entry(key.encode())
                        .or_default()
                        .push(base);
                    last = Some(base);
                    mark(&mut doc_terms.verbatim_fields, &field.name);
                    *doc_terms.lengths.entry(field.name.clone()).or_default() += 1;
                }
            }

            if let Some(last) = last {
                next_position.insert(field.name.as_str(), last + 1);
            }
        }

        for positions in doc_terms.positions.values_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
        Ok(doc_terms)
    }

    /// Seal the buffered documents as segment `name`.
    pub fn flush(self, storage: &dyn Storage, name: &str) -> Result<SegmentInfo> {
        let SegmentBuilder {
            terms,
            stored,
            lengths,
            doc_values,
            fields,
            next_doc,
            ..
        } = self;

        let mut terms: Vec<(Vec<u8>, Vec<Posting>)> = terms.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        write_segment(storage, name, SegmentSource::Flush, move |writer| {
            for (key, postings) in &terms {
                writer.add_term(key, postings)?;
            }
            for record in &stored {
                writer.add_stored(record)?;
            }
            writer.lengths = lengths;
            writer.doc_values = doc_values;
            for (field, info) in &fields {
                writer.add_field_info(field, info)?;
            }
            Ok(next_doc)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::analyzer::Analyzer;
    use crate::analysis::analyzer::keyword::KeywordAnalyzer;
    use crate::analysis::analyzer::language::Language;
    use crate::analysis::analyzer::snowball::SnowballAnalyzer;
    use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
    use crate::analysis::token_filter::stem::StemPrefixFilter;
    use crate::analysis::tokenizer::whitespace::WhitespaceTokenizer;
    use crate::segment::reader::SegmentReader;
    use crate::storage::memory::MemoryStorage;

    fn snowball_builder() -> SegmentBuilder {
        let default: Arc<dyn Analyzer> = Arc::new(SnowballAnalyzer::new(Language::English));
        let mut analyzer = PerFieldAnalyzer::new(default);
        analyzer.add_analyzer("id", Arc::new(KeywordAnalyzer::new()));
        SegmentBuilder::new(Arc::new(analyzer))
    }

    #[test]
    fn test_doc_ids_are_sequential() {
        let mut builder = snowball_builder();
        let first = Document::builder().add_text("body", "one").build();
        let second = Document::builder().add_text("body", "two").build();
        assert_eq!(builder.add_document(&first).unwrap(), 0);
        assert_eq!(builder.add_document(&second).unwrap(), 1);
        assert_eq!(builder.num_docs(), 2);
    }

    #[test]
    fn test_type_conflict_rejected_without_side_effects() {
        let mut builder = snowball_builder();
        builder
            .add_document(&Document::builder().add_integer("n", 1).build())
            .unwrap();
        let conflicting = Document::builder()
            .add_text("body", "hello")
            .add_float("n", 1.5)
            .build();
        assert!(builder.add_document(&conflicting).is_err());
        assert_eq!(builder.num_docs(), 1);
        assert_eq!(builder.term_count(), 1);
    }

    #[test]
    fn test_flush_and_read_back() {
        let storage = MemoryStorage::new();
        let mut builder = snowball_builder();
        builder
            .add_document(
                &Document::builder()
                    .add_keyword("id", "1")
                    .add_text("body", "Running dogs")
                    .add_text("body", "running")
                    .build(),
            )
            .unwrap();
        let info = builder.flush(&storage, "segment_000001").unwrap();
        assert_eq!(info.max_doc, 1);
        assert!(info.field("body").unwrap().has_surface);
        assert!(!info.field("id").unwrap().has_surface);
        assert!(info.field("id").unwrap().verbatim);
        assert!(!info.field("body").unwrap().verbatim);

        let reader = SegmentReader::open(&storage, &info.name, None).unwrap();
        let mut postings = reader
            .postings(&TermKey::main("body", "run"))
            .unwrap()
            .unwrap();
        assert_eq!(postings.term_freq(), 2);
        // the second value starts after the last position of the first
        assert_eq!(postings.positions().unwrap(), vec![0, 2]);
        assert!(!postings.next().unwrap());

        let surface = TermKey::new("body", Channel::Surface, "running");
        assert!(reader.postings(&surface).unwrap().is_some());
        assert_eq!(reader.field_length(0, "body"), 3);
        assert_eq!(reader.field_length(0, "id"), 1);
    }

    #[test]
    fn test_empty_tokens_are_not_indexed() {
        let storage = MemoryStorage::new();
        let pipeline = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()))
            .add_filter(Arc::new(StemPrefixFilter::new(Language::English)));
        let mut builder = SegmentBuilder::new(Arc::new(PerFieldAnalyzer::new(Arc::new(pipeline))));
        builder
            .add_document(&Document::builder().add_text("body", "good ca\u{FFFD}s").build())
            .unwrap();
        let info = builder.flush(&storage, "segment_000001").unwrap();

        let reader = SegmentReader::open(&storage, &info.name, None).unwrap();
        assert_eq!(reader.field_length(0, "body"), 1);
        // "good" on both channels, nothing for the undecodable word
        assert_eq!(reader.term_count(), 2);
    }
}
