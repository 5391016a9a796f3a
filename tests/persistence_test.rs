use std::fs;
use std::ops::Bound;

use chrono::{TimeZone, Utc};

use glaive::config::{IndexConfig, MergePolicyConfig, MergeSchedulerKind};
use glaive::document::{Document, SimpleIndexable, ValueType};
use glaive::index::{Index, LogMergePolicy};
use glaive::query::{Query, SearchRequest, SortDescriptor};

fn article(id: &str, title: &str, rank: i64, day: u32) -> Document {
    Document::builder()
        .add_keyword("id", id)
        .add_text("t", title)
        .add_integer("rank", rank)
        .add_date("s", Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap())
        .build()
}

#[test]
fn test_uncommitted_documents_are_lost_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = IndexConfig::default();
    config.writer.max_buffered_docs = 1;
    {
        let index = Index::open(dir.path(), config.clone()).unwrap();
        let mut writer = index.writer().unwrap();
        writer.add_document(article("1", "saved", 1, 1)).unwrap();
        writer.commit().unwrap();
        // flushed to disk but never committed
        writer.add_document(article("2", "lost", 2, 2)).unwrap();
    }

    let index = Index::open(dir.path(), config).unwrap();
    assert_eq!(index.snapshot().num_docs(), 1);
    assert_eq!(index.searcher().count(&Query::term("t", "lost")).unwrap(), 0);
    assert!(dir.path().join("segment_000002.meta").exists());

    let mut writer = index.writer().unwrap();
    assert!(!dir.path().join("segment_000002.meta").exists());
    writer.add_document(article("3", "later", 3, 3)).unwrap();
    let committed = writer.commit().unwrap();
    assert_eq!(committed.segment.as_deref(), Some("segment_000002"));
}

#[test]
fn test_corrupt_segment_detected_or_skipped() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = Index::open(dir.path(), IndexConfig::default()).unwrap();
        let mut writer = index.writer().unwrap();
        writer.add_document(article("1", "fragile", 1, 1)).unwrap();
        writer.commit().unwrap();
    }

    let postings = dir.path().join("segment_000001.post");
    let mut bytes = fs::read(&postings).unwrap();
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0xff;
    fs::write(&postings, bytes).unwrap();

    let err = Index::open(dir.path(), IndexConfig::default()).unwrap_err();
    assert!(err.is_corrupt_segment(), "unexpected error {err}");

    let mut tolerant = IndexConfig::default();
    tolerant.reader.tolerate_corrupt_segments = true;
    let index = Index::open(dir.path(), tolerant).unwrap();
    assert_eq!(index.snapshot().segments().len(), 0);
}

#[test]
fn test_parsed_queries_sorting_and_grouping() {
    let index = Index::open_in_memory(IndexConfig::default()).unwrap();
    let mut writer = index.writer().unwrap();
    writer.add_document(article("a", "Rust search engines", 3, 1)).unwrap();
    writer.add_document(article("b", "Searching with Rust", 1, 1)).unwrap();
    writer.add_document(article("c", "Gardening for beginners", 2, 2)).unwrap();
    writer.add_document(article("d", "Rust gardening robots", 5, 2)).unwrap();
    writer.commit().unwrap();

    let parser = index.query_parser();
    let query = parser.parse("rust -garden*").unwrap();
    let request = SearchRequest::new(query)
        .sort_by(SortDescriptor::parse("rank:integer:desc").unwrap())
        .project("id", ValueType::Text)
        .project("rank", ValueType::Integer);
    let results = index.searcher().execute(&request).unwrap();
    assert_eq!(results.total_hits(), 2);
    let ranked: Vec<(String, i64)> = results
        .into_iter()
        .map(|r| {
            let r = r.unwrap();
            (r.text("id").unwrap().to_string(), r.integer("rank").unwrap())
        })
        .collect();
    assert_eq!(ranked, vec![("a".to_string(), 3), ("b".to_string(), 1)]);

    let all = index
        .searcher()
        .search(
            &parser.parse("*").unwrap(),
            Some(&SortDescriptor::parse("s:date:asc").unwrap()),
            10,
        )
        .unwrap();
    let days = all.grouped_by_day("s").unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].results.len(), 2);
    assert_eq!(days[1].day.unwrap().to_string(), "2024-03-02");

    let by_rank = index
        .searcher()
        .search(
            &Query::range("rank", Bound::Included(2i64.into()), Bound::Unbounded),
            None,
            10,
        )
        .unwrap();
    assert_eq!(by_rank.total_hits(), 3);
}

#[test]
fn test_indexables_replace_by_identity() {
    let index = Index::open_in_memory(IndexConfig::default()).unwrap();
    let mut writer = index.writer().unwrap();
    for revision in ["first draft", "second draft", "final text"] {
        writer
            .add_indexable(&SimpleIndexable::new("note-1", 'n').with_field("v", revision))
            .unwrap();
    }
    writer.commit().unwrap();

    let searcher = index.searcher();
    assert_eq!(searcher.count(&Query::term("id", "note-1")).unwrap(), 1);
    assert_eq!(searcher.count(&Query::term("v", "final")).unwrap(), 1);
    assert_eq!(searcher.count(&Query::term("v", "draft")).unwrap(), 0);
}

#[test]
fn test_background_merges_install_on_later_commit() {
    let mut config = IndexConfig::default();
    config.writer.max_buffered_docs = 1;
    config.writer.merge_scheduler = MergeSchedulerKind::Background;
    config.writer.merge_policy = MergePolicyConfig::Log(LogMergePolicy {
        merge_factor: 2,
        min_merge_docs: 1,
        ..Default::default()
    });
    let index = Index::open_in_memory(config).unwrap();
    let mut writer = index.writer().unwrap();
    for i in 0..4 {
        writer
            .add_document(article(&i.to_string(), "merge me", i, 1))
            .unwrap();
    }
    writer.commit().unwrap();

    // merges scheduled by that commit finish eventually
    for _ in 0..200 {
        if writer.pending_merges() == 0 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
        writer.commit().unwrap();
    }
    writer.force_merge(1).unwrap();

    let snapshot = index.snapshot();
    assert_eq!(snapshot.segments().len(), 1);
    assert_eq!(snapshot.num_docs(), 4);
    assert_eq!(index.searcher().count(&Query::term("t", "merg")).unwrap(), 4);
}
