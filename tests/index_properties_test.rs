use std::collections::BTreeSet;

use glaive::config::{IndexConfig, MergePolicyConfig};
use glaive::document::Document;
use glaive::index::Index;
use glaive::query::Query;
use glaive::segment::DocAddress;
use glaive::segment::term::TermKey;

fn doc(id: &str, body: &str) -> Document {
    Document::builder()
        .add_keyword("id", id)
        .add_text("body", body)
        .build()
}

fn manual_merges() -> IndexConfig {
    let mut config = IndexConfig::default();
    config.writer.merge_policy = MergePolicyConfig::None;
    config
}

fn ids(index: &Index, query: &Query) -> BTreeSet<String> {
    index
        .searcher()
        .search(query, None, 1000)
        .unwrap()
        .into_iter()
        .map(|result| result.unwrap().text("id").unwrap().to_string())
        .collect()
}

#[test]
fn test_every_analyzed_term_recalls_its_document() {
    let index = Index::open_in_memory(manual_merges()).unwrap();
    let mut writer = index.writer().unwrap();
    let texts = [
        "Connected devices talk to each other",
        "Searching through indexed documents",
        "Merging segments keeps searches fast",
    ];
    for (i, text) in texts.iter().enumerate() {
        writer.add_document(doc(&i.to_string(), text)).unwrap();
    }
    writer.commit().unwrap();

    let parser = index.query_parser();
    for (i, text) in texts.iter().enumerate() {
        for word in text.split_whitespace() {
            let query = parser.parse_field("body", word).unwrap();
            if let Query::Boolean(boolean) = &query
                && boolean.is_empty()
            {
                // stop word
                continue;
            }
            assert!(
                ids(&index, &query).contains(&i.to_string()),
                "{word} does not find document {i}"
            );
        }
    }
}

#[test]
fn test_deleted_documents_vanish_but_postings_remain() {
    let index = Index::open_in_memory(manual_merges()).unwrap();
    let mut writer = index.writer().unwrap();
    writer.add_document(doc("a", "shared word alpha")).unwrap();
    writer.add_document(doc("b", "shared word beta")).unwrap();
    writer.commit().unwrap();

    let deleted = writer.delete_documents(&Query::term("id", "a")).unwrap();
    assert_eq!(deleted, 1);
    writer.commit().unwrap();

    assert_eq!(ids(&index, &Query::term("body", "share")), BTreeSet::from(["b".to_string()]));
    assert!(ids(&index, &Query::term("body", "alpha")).is_empty());

    let snapshot = index.snapshot();
    let segment = &snapshot.segments()[0];
    assert_eq!(segment.doc_freq(&TermKey::main("body", "alpha")), 1);
    assert_eq!(segment.max_doc(), 2);
    assert_eq!(segment.num_docs(), 1);

    writer.force_merge(1).unwrap();
    let snapshot = index.snapshot();
    let merged = &snapshot.segments()[0];
    assert_eq!(merged.doc_freq(&TermKey::main("body", "alpha")), 0);
    assert_eq!(merged.max_doc(), 1);
}

#[test]
fn test_merge_keeps_exactly_the_live_documents() {
    let mut config = manual_merges();
    config.writer.max_buffered_docs = 3;
    let index = Index::open_in_memory(config).unwrap();
    let mut writer = index.writer().unwrap();
    for i in 0..10 {
        let parity = if i % 2 == 0 { "even" } else { "odd" };
        writer
            .add_document(doc(&format!("d{i}"), &format!("number {parity}")))
            .unwrap();
    }
    writer.commit().unwrap();
    writer.delete_term("id", "d4").unwrap();
    writer.delete_term("id", "d7").unwrap();
    writer.commit().unwrap();

    let before = ids(&index, &Query::term("body", "number"));
    writer.force_merge(1).unwrap();
    let after = ids(&index, &Query::term("body", "number"));

    assert_eq!(before, after);
    assert_eq!(after.len(), 8);
    assert!(!after.contains("d4") && !after.contains("d7"));
    assert_eq!(ids(&index, &Query::term("body", "even")).len(), 4);
    assert_eq!(ids(&index, &Query::term("body", "odd")).len(), 4);

    let snapshot = index.snapshot();
    assert_eq!(snapshot.segments().len(), 1);
    assert_eq!(snapshot.max_doc(), 8);
}

#[test]
fn test_prefix_and_exact_match_a_stemmed_word() {
    let index = Index::open_in_memory(IndexConfig::default()).unwrap();
    let mut writer = index.writer().unwrap();
    writer.add_document(doc("1", "running")).unwrap();
    writer.commit().unwrap();

    let parser = index.query_parser();
    for query in ["body:run*", "body:running", "body:runn*", "body:run"] {
        let parsed = parser.parse(query).unwrap();
        assert_eq!(ids(&index, &parsed).len(), 1, "{query}");
    }
    assert!(ids(&index, &parser.parse("body:runs*").unwrap()).is_empty());
}

#[test]
fn test_readers_are_isolated_from_later_commits() {
    let index = Index::open_in_memory(IndexConfig::default()).unwrap();
    let mut writer = index.writer().unwrap();
    writer.add_document(doc("old", "visible")).unwrap();
    writer.commit().unwrap();

    let before = index.reader();
    let searcher_before = index.searcher();

    writer.add_document(doc("new", "visible")).unwrap();
    writer.delete_term("id", "old").unwrap();
    writer.commit().unwrap();

    let query = Query::term("body", "visibl");
    let old_hits: Vec<String> = searcher_before
        .search(&query, None, 10)
        .unwrap()
        .into_iter()
        .map(|r| r.unwrap().text("id").unwrap().to_string())
        .collect();
    assert_eq!(old_hits, vec!["old"]);
    assert_eq!(before.searcher().count(&query).unwrap(), 1);
    assert_eq!(ids(&index, &query), BTreeSet::from(["new".to_string()]));
}

#[test]
fn test_equal_scores_rank_in_document_order() {
    let index = Index::open_in_memory(IndexConfig::default()).unwrap();
    let mut writer = index.writer().unwrap();
    writer.add_document(doc("1", "The quick fox")).unwrap();
    writer.add_document(doc("2", "A quick cat")).unwrap();
    writer.commit().unwrap();

    let results = index
        .searcher()
        .search(&Query::term("body", "quick"), None, 10)
        .unwrap();
    assert_eq!(results.total_hits(), 2);
    let hits: Vec<(DocAddress, String)> = results
        .into_iter()
        .map(|r| {
            let r = r.unwrap();
            (r.address, r.text("id").unwrap().to_string())
        })
        .collect();
    assert_eq!(
        hits,
        vec![
            (DocAddress::new(0, 0), "1".to_string()),
            (DocAddress::new(0, 1), "2".to_string())
        ]
    );
}
