//! Integration tests for the index store, query modes and result presentation

mod common;

use common::*;
use std::collections::HashSet;
use tempfile::TempDir;
use weblog_search::search::*;

async fn ids(service: &SearchService, text: &str, field_names: &[&str], mode: QueryMode) -> HashSet<i64> {
    service
        .search(INDEX, text, &fields(field_names), 1, 100, mode)
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|hit| hit.id)
        .collect()
}

#[tokio::test]
async fn test_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    assert_eq!(store.add_document(INDEX, &document(1, "Hello World")).await.unwrap(), 1);

    let page = service
        .search(INDEX, "hello", &fields(&["title"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.pages, 1);
    assert_eq!(page.items.len(), 1);

    let hit = &page.items[0];
    assert_eq!(hit.id, 1);
    assert_eq!(
        hit.highlighted_title,
        "<span style=\"color: #f73131\">Hello</span> World"
    );
    assert_eq!(hit.summary, "summary of Hello World");
    assert_eq!(hit.create_time, "2024-03-15 10:30:00");
}

#[tokio::test]
async fn test_update_replaces_document() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    store.add_document(INDEX, &document(7, "Original heading")).await.unwrap();
    let affected = store
        .update_document(INDEX, &document(7, "Revised heading"), &MatchTerm::id(7))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    assert!(ids(&service, "original", &["title"], QueryMode::Standard).await.is_empty());
    assert_eq!(
        ids(&service, "revised", &["title"], QueryMode::Standard).await,
        HashSet::from([7])
    );
    assert_eq!(store.doc_count(INDEX).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_leaves_no_trace() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    store.add_document(INDEX, &document(3, "Ephemeral note")).await.unwrap();
    assert_eq!(store.delete_document(INDEX, &MatchTerm::id(3)).await.unwrap(), 1);
    assert_eq!(store.delete_document(INDEX, &MatchTerm::id(3)).await.unwrap(), 0);

    let query = service
        .query_builder()
        .build("ephemeral", &fields(&["title"]), QueryMode::Standard)
        .unwrap();
    assert_eq!(store.count(INDEX, &query).await.unwrap(), 0);
    assert!(store.search(INDEX, &query, 1, 10).await.unwrap().is_empty());
    assert!(store.get_document(INDEX, &MatchTerm::id(3)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_pagination_covers_every_match_once() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    let documents: Vec<ArticleDocument> = (1..=25)
        .map(|id| document(id, &format!("rust notes part {}", id)))
        .collect();
    assert_eq!(store.create_index(INDEX, &documents).await.unwrap(), 25);

    let mut seen = Vec::new();
    let mut sizes = Vec::new();
    for page in 1..=3 {
        let result = service
            .search(INDEX, "rust", &fields(&["title"]), page, 10, QueryMode::Standard)
            .await
            .unwrap();
        assert_eq!(result.total, 25);
        assert_eq!(result.pages, 3);
        assert_eq!(result.current, page);
        sizes.push(result.items.len());
        seen.extend(result.items.into_iter().map(|hit| hit.id));
    }

    assert_eq!(sizes, vec![10, 10, 5]);
    let distinct: HashSet<i64> = seen.iter().copied().collect();
    assert_eq!(distinct.len(), 25);
    assert_eq!(distinct, (1..=25).collect());

    let beyond = service
        .search(INDEX, "rust", &fields(&["title"]), 4, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(beyond.total, 25);
    assert!(beyond.items.is_empty());
}

#[tokio::test]
async fn test_create_index_discards_previous_content() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);

    store.add_document(INDEX, &document(1, "stale entry")).await.unwrap();
    store
        .create_index(INDEX, &[document(2, "fresh entry"), document(3, "another entry")])
        .await
        .unwrap();

    assert_eq!(store.doc_count(INDEX).await.unwrap(), 2);
    assert!(store.get_document(INDEX, &MatchTerm::id(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fuzzy_with_zero_edits_equals_standard() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    store
        .create_index(
            INDEX,
            &[
                document(1, "cat"),
                document(2, "category"),
                document(3, "catalog"),
                document(4, "dog"),
            ],
        )
        .await
        .unwrap();

    let standard = ids(&service, "cat", &["title"], QueryMode::Standard).await;
    let fuzzy = ids(&service, "cat", &["title"], QueryMode::fuzzy(0)).await;
    assert_eq!(standard, HashSet::from([1]));
    assert_eq!(fuzzy, standard);

    // One edit reaches "cat" from "cot" but not "dog"
    assert_eq!(
        ids(&service, "cot", &["title"], QueryMode::fuzzy(1)).await,
        HashSet::from([1])
    );
}

#[tokio::test]
async fn test_fuzzy_max_edits_is_clamped() {
    assert_eq!(QueryMode::fuzzy(5), QueryMode::Fuzzy { max_edits: 2 });
    assert_eq!(QueryMode::fuzzy(-1), QueryMode::Fuzzy { max_edits: 0 });

    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);
    store.add_document(INDEX, &document(1, "Hello World")).await.unwrap();

    let page = service
        .search(INDEX, "wrold", &fields(&["title"]), 1, 10, QueryMode::fuzzy(9))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items[0].highlighted_title.contains(">World<"));
}

#[tokio::test]
async fn test_wildcard_wraps_plain_terms() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    store
        .create_index(INDEX, &[document(1, "category overview"), document(2, "dog days")])
        .await
        .unwrap();

    assert_eq!(
        ids(&service, "cat", &["title"], QueryMode::Wildcard).await,
        HashSet::from([1])
    );
    assert_eq!(
        ids(&service, "cat*", &["title"], QueryMode::Wildcard).await,
        HashSet::from([1])
    );
    assert_eq!(
        ids(&service, "d?g", &["title"], QueryMode::Wildcard).await,
        HashSet::from([2])
    );
    assert!(ids(&service, "bird*", &["title"], QueryMode::Wildcard).await.is_empty());
}

#[tokio::test]
async fn test_wildcard_takes_precedence_over_fuzzy() {
    assert_eq!(QueryMode::from_flags(true, Some(1), true), QueryMode::Wildcard);
    assert_eq!(
        QueryMode::from_flags(true, None, false),
        QueryMode::Fuzzy { max_edits: 2 }
    );
    assert_eq!(QueryMode::from_flags(false, Some(1), false), QueryMode::Standard);
}

#[tokio::test]
async fn test_empty_query_matches_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);
    store.add_document(INDEX, &document(1, "anything")).await.unwrap();

    for mode in [QueryMode::Standard, QueryMode::fuzzy(2), QueryMode::Wildcard] {
        let page = service
            .search(INDEX, "   ", &fields(&["title"]), 1, 10, mode)
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }
}

#[tokio::test]
async fn test_cjk_segmentation() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    store
        .create_index(INDEX, &[document(1, "我爱北京天安门"), document(2, "上海的早晨")])
        .await
        .unwrap();

    let page = service
        .search(INDEX, "北京", &fields(&["title"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, 1);
    assert!(page.items[0]
        .highlighted_title
        .contains("<span style=\"color: #f73131\">北京</span>"));
}

#[tokio::test]
async fn test_latin_term_highlighted_in_mixed_title() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);
    store.add_document(INDEX, &document(1, "Rust编程指南")).await.unwrap();

    let page = service
        .search(INDEX, "rust", &fields(&["title"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(
        page.items[0].highlighted_title,
        "<span style=\"color: #f73131\">Rust</span>编程指南"
    );
}

#[tokio::test]
async fn test_long_title_ending_in_compound_word() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);
    let title = format!("{}中华人民共和国", "x ".repeat(47));
    store.add_document(INDEX, &document(1, &title)).await.unwrap();

    let page = service
        .search(INDEX, "中华人民共和国", &fields(&["title"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items[0].highlighted_title.contains("共和国</span>"));
}

#[tokio::test]
async fn test_default_fields_include_summary() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);

    let mut doc = document(1, "Plain title");
    doc.summary = "tokio runtime internals".to_string();
    store.add_document(INDEX, &doc).await.unwrap();

    let page = service
        .search(INDEX, "tokio", &[], 1, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    // No title match: the title comes back untouched
    assert_eq!(page.items[0].highlighted_title, "Plain title");
}

#[tokio::test]
async fn test_unknown_field_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    let service = strict_service(&store);
    store.add_document(INDEX, &document(1, "anything")).await.unwrap();

    let err = service
        .search(INDEX, "anything", &fields(&["body"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::UnknownField(_)));
}

#[tokio::test]
async fn test_failure_policy() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    store.add_document(INDEX, &document(1, "anything")).await.unwrap();

    let strict = strict_service(&store);
    let err = strict
        .search(INDEX, "nosuchfield:abc", &fields(&["title"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), SearchErrorKind::QuerySyntaxInvalid);

    let lenient = SearchService::new(search_config(&temp_dir, FailurePolicy::FailOpen)).unwrap();
    let page = lenient
        .search(INDEX, "nosuchfield:abc", &fields(&["title"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());

    let page = lenient
        .search("missing_index", "anything", &fields(&["title"]), 1, 10, QueryMode::Standard)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_stats_report_documents() {
    let temp_dir = TempDir::new().unwrap();
    let store = store(&temp_dir);
    store
        .create_index(INDEX, &[document(1, "one"), document(2, "two")])
        .await
        .unwrap();

    let stats = store.stats(INDEX).await.unwrap();
    assert_eq!(stats.total_documents, 2);
    assert!(stats.index_size_bytes > 0);
}
